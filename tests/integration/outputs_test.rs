use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tempfile::TempDir;

use triplog::core::bus::{Outlet, Payload, Publisher, SensorDriver, Subscriber};
use triplog::core::cancel::CancelToken;
use triplog::core::registry::Registry;
use triplog::core::sensors::gps::{GpsFix, GpsOutput};
use triplog::core::sensors::imu::{ImuOutput, ImuSample};
use triplog::core::trip::Trip;
use triplog::{Recorder, TripOptions};

/// Driver publishing a fixed number of GPS fixes, then idling until
/// cancelled.
struct ScriptedGps {
    fixes: usize,
    done: Arc<Mutex<bool>>,
}

impl SensorDriver for ScriptedGps {
    fn topics(&self) -> &[&'static str] {
        &["all"]
    }

    fn run(&mut self, outlet: &Outlet, cancel: &CancelToken) {
        for i in 0..self.fixes {
            outlet.publish(
                "all",
                Payload::Gps(GpsFix {
                    longitude: i as f64,
                    latitude: -(i as f64),
                    altitude: 100.0,
                }),
            );
        }
        *self.done.lock() = true;
        cancel.wait();
    }
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
fn test_recorded_trip_produces_ordered_gps_csv() {
    let parent = TempDir::new().unwrap();
    let trip = Trip::create(parent.path(), TripOptions::default()).unwrap();
    let csv_path = trip.directory().join("gps.csv");

    let done = Arc::new(Mutex::new(false));
    let driver_done = Arc::clone(&done);
    let csv = csv_path.clone();
    let mut registry = Registry::empty();
    registry.register_sensor(
        "gps",
        Box::new(|_| true),
        Box::new(move |_, _| {
            let driver = ScriptedGps {
                fixes: 25,
                done: Arc::clone(&driver_done),
            };
            let publisher = Publisher::new("gps", Box::new(driver));
            // Threshold above the fix count, so rows only hit disk on stop.
            let output = GpsOutput::new(csv.clone(), 100);
            let subscriber = Subscriber::new("gps-output", Box::new(output));
            Ok((publisher, Some(subscriber)))
        }),
    );

    let mut recorder = Recorder::with_registry(trip, registry);
    let token = CancelToken::new();
    recorder.start(&token).unwrap();
    assert!(wait_until(Duration::from_secs(2), || *done.lock()));
    // Give the consumer a moment to drain its queue before stopping.
    std::thread::sleep(Duration::from_millis(100));
    recorder.stop();

    let content = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "timestamp,longitude,latitude,altitude");

    // Fixes arrive in publish order; longitude counts up from 0.
    let longitudes: Vec<&str> = lines[1..]
        .iter()
        .map(|l| l.split(',').nth(1).unwrap())
        .collect();
    assert!(!longitudes.is_empty());
    for (i, lon) in longitudes.iter().enumerate() {
        assert_eq!(*lon, format!("{}", i));
    }
}

#[test]
fn test_imu_csv_write_threshold_batches_rows() {
    use triplog::core::bus::{Consumer, Message};

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("imu.csv");
    let mut output = ImuOutput::new(path.clone(), 3);

    output.on_start().unwrap();
    for i in 0..2 {
        let msg = Message::with_timestamp(
            i,
            "imu",
            "all",
            Payload::Imu(ImuSample::new([0.0; 3], [0.0, 0.0, 1.0])),
        );
        output.on_message(&msg).unwrap();
    }
    // Two of three buffered rows: nothing on disk yet, not even the header.
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

    let msg = Message::with_timestamp(
        2,
        "imu",
        "all",
        Payload::Imu(ImuSample::new([0.0; 3], [0.0, 0.0, 1.0])),
    );
    output.on_message(&msg).unwrap();
    output.on_stop().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("timestamp,gyro_x"));
}

#[test]
fn test_dry_run_sensor_writes_no_files() {
    let parent = TempDir::new().unwrap();
    let mut options = TripOptions::default();
    options.sensors.systeminfo.active = true;
    options.sensors.systeminfo.dry_run = true;
    let trip = Trip::create(parent.path(), options).unwrap();
    let trip_dir = trip.directory().to_path_buf();

    let mut recorder = Recorder::new(trip);
    let token = CancelToken::new();
    recorder.start(&token).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    recorder.stop();

    // Only the options snapshot, no sensor output.
    assert!(!trip_dir.join("systeminfo.csv").exists());
    assert!(trip_dir.join("trip_options.json").exists());
}
