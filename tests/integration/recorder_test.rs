use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use triplog::core::bus::{Consumer, Inlet, Message, Outlet, Publisher, SensorDriver, Subscriber};
use triplog::core::cancel::CancelToken;
use triplog::core::monitors::Monitor;
use triplog::core::registry::Registry;
use triplog::core::trip::Trip;
use triplog::error::{Result, TriplogError};
use triplog::{Recorder, TripOptions};

type EventLog = Arc<Mutex<Vec<String>>>;

struct NoopConsumer;

impl Consumer for NoopConsumer {
    fn on_message(&mut self, _msg: &Message) -> Result<()> {
        Ok(())
    }
}

struct FailingConsumer;

impl Consumer for FailingConsumer {
    fn on_start(&mut self) -> Result<()> {
        Err(TriplogError::sensor("output unavailable"))
    }

    fn on_message(&mut self, _msg: &Message) -> Result<()> {
        Ok(())
    }
}

struct LoggingMonitor {
    name: &'static str,
    events: EventLog,
    subscriber: Subscriber,
}

impl Monitor for LoggingMonitor {
    fn name(&self) -> &str {
        self.name
    }

    fn start(&mut self) -> Result<()> {
        self.events.lock().push(format!("start {}", self.name));
        self.subscriber.start()
    }

    fn stop(&mut self) {
        self.events.lock().push(format!("stop {}", self.name));
        self.subscriber.stop();
    }

    fn inlet(&self) -> Arc<Inlet> {
        self.subscriber.inlet()
    }
}

struct LoggingDriver {
    name: &'static str,
    events: EventLog,
}

impl SensorDriver for LoggingDriver {
    fn topics(&self) -> &[&'static str] {
        &["all"]
    }

    fn on_start(&mut self) -> Result<()> {
        self.events.lock().push(format!("start {}", self.name));
        Ok(())
    }

    fn run(&mut self, _outlet: &Outlet, cancel: &CancelToken) {
        cancel.wait();
    }

    fn on_stop(&mut self) -> Result<()> {
        self.events.lock().push(format!("stop {}", self.name));
        Ok(())
    }
}

fn register_monitor(registry: &mut Registry, name: &'static str, events: EventLog) {
    registry.register_monitor(
        name,
        Box::new(|_| true),
        Box::new(move |_, _| {
            Ok(Box::new(LoggingMonitor {
                name,
                events: Arc::clone(&events),
                subscriber: Subscriber::new(name, Box::new(NoopConsumer)),
            }))
        }),
    );
}

fn register_sensor(registry: &mut Registry, name: &'static str, events: EventLog) {
    registry.register_sensor(
        name,
        Box::new(|_| true),
        Box::new(move |_, _| {
            let driver = LoggingDriver {
                name,
                events: Arc::clone(&events),
            };
            Ok((Publisher::new(name, Box::new(driver)), None))
        }),
    );
}

fn recorder_with(registry: Registry) -> (Recorder, TempDir) {
    let parent = TempDir::new().unwrap();
    let trip = Trip::create(parent.path(), TripOptions::default()).unwrap();
    (Recorder::with_registry(trip, registry), parent)
}

#[test]
fn test_full_run_stops_components_in_reverse_order() {
    let events: EventLog = Arc::new(Mutex::new(Vec::new()));

    let mut registry = Registry::empty();
    register_monitor(&mut registry, "health", Arc::clone(&events));
    register_monitor(&mut registry, "screen", Arc::clone(&events));
    register_sensor(&mut registry, "imu", Arc::clone(&events));
    register_sensor(&mut registry, "gps", Arc::clone(&events));

    let (mut recorder, _parent) = recorder_with(registry);
    let token = CancelToken::new();
    recorder.start(&token).unwrap();
    assert_eq!(recorder.active_monitors(), 2);
    assert_eq!(recorder.active_sensors(), 2);
    recorder.stop();

    let events = events.lock();
    assert_eq!(
        *events,
        vec![
            "start health",
            "start screen",
            "start imu",
            "start gps",
            "stop gps",
            "stop imu",
            "stop screen",
            "stop health",
        ]
    );
}

#[test]
fn test_sensor_with_failing_output_does_not_affect_others() {
    let events: EventLog = Arc::new(Mutex::new(Vec::new()));

    let mut registry = Registry::empty();
    register_sensor(&mut registry, "good", Arc::clone(&events));
    let bad_events = Arc::clone(&events);
    registry.register_sensor(
        "bad",
        Box::new(|_| true),
        Box::new(move |_, _| {
            let driver = LoggingDriver {
                name: "bad",
                events: Arc::clone(&bad_events),
            };
            let publisher = Publisher::new("bad", Box::new(driver));
            let subscriber = Subscriber::new("bad-output", Box::new(FailingConsumer));
            Ok((publisher, Some(subscriber)))
        }),
    );

    let (mut recorder, _parent) = recorder_with(registry);
    let token = CancelToken::new();
    recorder.start(&token).unwrap();
    // The failing output keeps its whole sensor out of the active set.
    assert_eq!(recorder.active_sensors(), 1);
    recorder.stop();

    let events = events.lock();
    assert_eq!(*events, vec!["start good", "stop good"]);
}

#[test]
fn test_monitor_build_failure_is_skipped() {
    let events: EventLog = Arc::new(Mutex::new(Vec::new()));

    let mut registry = Registry::empty();
    registry.register_monitor(
        "broken",
        Box::new(|_| true),
        Box::new(|_, _| Err(TriplogError::start_failure("broken", "no such device"))),
    );
    register_sensor(&mut registry, "gps", Arc::clone(&events));

    let (mut recorder, _parent) = recorder_with(registry);
    let token = CancelToken::new();
    recorder.start(&token).unwrap();
    assert_eq!(recorder.active_monitors(), 0);
    assert_eq!(recorder.active_sensors(), 1);
    recorder.stop();
}

#[test]
fn test_monitors_receive_sensor_messages() {
    struct CountingConsumer {
        count: Arc<Mutex<usize>>,
    }

    impl Consumer for CountingConsumer {
        fn on_message(&mut self, _msg: &Message) -> Result<()> {
            *self.count.lock() += 1;
            Ok(())
        }
    }

    struct ChattyDriver;

    impl SensorDriver for ChattyDriver {
        fn topics(&self) -> &[&'static str] {
            &["all"]
        }

        fn run(&mut self, outlet: &Outlet, cancel: &CancelToken) {
            use triplog::core::bus::Payload;
            use triplog::core::sensors::gps::GpsFix;
            while !cancel.is_cancelled() {
                outlet.publish("all", Payload::Gps(GpsFix::default()));
                if cancel.wait_timeout(Duration::from_millis(5)) {
                    break;
                }
            }
        }
    }

    let count = Arc::new(Mutex::new(0usize));
    let mut registry = Registry::empty();
    let monitor_count = Arc::clone(&count);
    registry.register_monitor(
        "counter",
        Box::new(|_| true),
        Box::new(move |_, _| {
            Ok(Box::new(LoggingMonitor {
                name: "counter",
                events: Arc::new(Mutex::new(Vec::new())),
                subscriber: Subscriber::new(
                    "counter",
                    Box::new(CountingConsumer {
                        count: Arc::clone(&monitor_count),
                    }),
                ),
            }))
        }),
    );
    registry.register_sensor(
        "chatty",
        Box::new(|_| true),
        Box::new(|_, _| Ok((Publisher::new("chatty", Box::new(ChattyDriver)), None))),
    );

    let (mut recorder, _parent) = recorder_with(registry);
    let token = CancelToken::new();
    recorder.start(&token).unwrap();
    std::thread::sleep(Duration::from_millis(200));
    recorder.stop();

    assert!(*count.lock() > 0);
}
