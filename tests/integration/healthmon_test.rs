use std::path::Path;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use triplog::core::cancel::CancelToken;
use triplog::core::monitors::healthmon::{DiskProbe, HealthMonitor};
use triplog::core::registry::Registry;
use triplog::core::trip::Trip;
use triplog::error::Result;
use triplog::{Recorder, TripOptions};

/// Probe replaying a fixed sequence of (total, used) readings; the last one
/// repeats.
struct FakeProbe {
    readings: Vec<(u64, u64)>,
    next: usize,
}

impl DiskProbe for FakeProbe {
    fn usage(&mut self, _path: &Path) -> Result<(u64, u64)> {
        let reading = self.readings[self.next.min(self.readings.len() - 1)];
        self.next += 1;
        Ok(reading)
    }
}

fn healthmon_registry(readings: Vec<(u64, u64)>) -> Registry {
    let mut registry = Registry::empty();
    registry.register_monitor(
        "healthmon",
        Box::new(|_| true),
        Box::new(move |options, out_dir| {
            let mut config = options.monitors.healthmon.clone();
            config.frequency_hz = 50.0;
            let probe = FakeProbe {
                readings: readings.clone(),
                next: 0,
            };
            Ok(Box::new(HealthMonitor::with_probe(config, out_dir, Box::new(probe))))
        }),
    );
    registry
}

fn recorder_with(registry: Registry) -> (Recorder, TempDir) {
    let parent = TempDir::new().unwrap();
    let trip = Trip::create(parent.path(), TripOptions::default()).unwrap();
    (Recorder::with_registry(trip, registry), parent)
}

fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[test]
fn test_disk_full_cancels_the_shutdown_token() {
    // Healthy at start, then above the 95% threshold.
    let registry = healthmon_registry(vec![(1000, 500), (1000, 960)]);
    let (mut recorder, _parent) = recorder_with(registry);

    let token = CancelToken::new();
    recorder.start(&token).unwrap();
    assert_eq!(recorder.active_monitors(), 1);

    assert!(wait_until(Duration::from_secs(2), || token.is_cancelled()));
    recorder.stop();
}

#[test]
fn test_initially_full_disk_keeps_the_monitor_out() {
    let registry = healthmon_registry(vec![(1000, 999)]);
    let (mut recorder, _parent) = recorder_with(registry);

    let token = CancelToken::new();
    recorder.start(&token).unwrap();
    // The initial check failed, so the monitor never joined the active set
    // and no shutdown was requested.
    assert_eq!(recorder.active_monitors(), 0);
    assert!(!token.is_cancelled());
    recorder.stop();
}

#[test]
fn test_half_full_disk_records_a_whole_trip() {
    use std::sync::Arc as StdArc;

    use parking_lot::Mutex;
    use triplog::core::bus::{Outlet, Payload, Publisher, SensorDriver, Subscriber};
    use triplog::core::sensors::gps::{GpsFix, GpsOutput};

    struct BurstGps {
        done: StdArc<Mutex<bool>>,
    }

    impl SensorDriver for BurstGps {
        fn topics(&self) -> &[&'static str] {
            &["all"]
        }

        fn run(&mut self, outlet: &Outlet, cancel: &CancelToken) {
            for i in 0..10 {
                outlet.publish(
                    "all",
                    Payload::Gps(GpsFix {
                        longitude: i as f64,
                        ..Default::default()
                    }),
                );
            }
            *self.done.lock() = true;
            cancel.wait();
        }
    }

    // Disk stays at 50%: the watchdog runs the whole trip without tripping.
    let mut registry = healthmon_registry(vec![(1000, 500)]);
    let done = StdArc::new(Mutex::new(false));
    let driver_done = StdArc::clone(&done);
    let path = StdArc::new(Mutex::new(std::path::PathBuf::new()));
    let factory_path = StdArc::clone(&path);
    registry.register_sensor(
        "gps",
        Box::new(|_| true),
        Box::new(move |_, out_dir| {
            let csv = out_dir.join("gps.csv");
            *factory_path.lock() = csv.clone();
            let driver = BurstGps {
                done: StdArc::clone(&driver_done),
            };
            let publisher = Publisher::new("gps", Box::new(driver));
            let subscriber = Subscriber::new("gps-output", Box::new(GpsOutput::new(csv, 100)));
            Ok((publisher, Some(subscriber)))
        }),
    );
    registry.register_sensor("camera", Box::new(|_| false), Box::new(|_, _| unreachable!()));

    let (mut recorder, _parent) = recorder_with(registry);
    let token = CancelToken::new();
    recorder.start(&token).unwrap();
    assert!(recorder.is_running());
    assert_eq!(recorder.active_monitors(), 1);
    // The inactive camera entry was never built.
    assert_eq!(recorder.active_sensors(), 1);

    assert!(wait_until(Duration::from_secs(2), || *done.lock()));
    std::thread::sleep(Duration::from_millis(100));
    assert!(!token.is_cancelled());
    recorder.stop();
    assert!(!recorder.is_running());
    assert_eq!(recorder.active_sensors(), 0);

    let content = std::fs::read_to_string(&*path.lock()).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "timestamp,longitude,latitude,altitude");
    assert!(lines.len() > 1);
}

#[test]
fn test_healthy_disk_never_cancels() {
    let registry = healthmon_registry(vec![(1000, 500)]);
    let (mut recorder, _parent) = recorder_with(registry);

    let token = CancelToken::new();
    recorder.start(&token).unwrap();
    std::thread::sleep(Duration::from_millis(200));
    assert!(!token.is_cancelled());
    recorder.stop();
}
