use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use triplog::core::bus::{
    Consumer, LifecycleState, Message, Outlet, Payload, Publisher, SensorDriver, Subscriber,
};
use triplog::core::cancel::CancelToken;
use triplog::core::sensors::gps::GpsFix;
use triplog::error::Result;

struct Collector {
    seen: Arc<Mutex<Vec<(String, i64)>>>,
}

impl Consumer for Collector {
    fn on_message(&mut self, msg: &Message) -> Result<()> {
        self.seen.lock().push((msg.source.clone(), msg.timestamp_ms));
        Ok(())
    }
}

/// Driver publishing one fix per millisecond until cancelled.
struct TickingGps {
    published: Arc<Mutex<i64>>,
}

impl SensorDriver for TickingGps {
    fn topics(&self) -> &[&'static str] {
        &["all"]
    }

    fn run(&mut self, outlet: &Outlet, cancel: &CancelToken) {
        let mut tick = 0i64;
        while !cancel.is_cancelled() {
            outlet.publish(
                "all",
                Payload::Gps(GpsFix {
                    longitude: tick as f64,
                    ..Default::default()
                }),
            );
            tick += 1;
            *self.published.lock() = tick;
            if cancel.wait_timeout(Duration::from_millis(1)) {
                break;
            }
        }
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
fn test_publisher_fans_out_to_every_subscriber() {
    let published = Arc::new(Mutex::new(0));
    let mut publisher = Publisher::new(
        "gps",
        Box::new(TickingGps {
            published: Arc::clone(&published),
        }),
    );

    let seen_a = Arc::new(Mutex::new(Vec::new()));
    let seen_b = Arc::new(Mutex::new(Vec::new()));
    let mut sub_a = Subscriber::new("a", Box::new(Collector { seen: Arc::clone(&seen_a) }));
    let mut sub_b = Subscriber::new("b", Box::new(Collector { seen: Arc::clone(&seen_b) }));

    publisher.subscribe(&sub_a.inlet(), None);
    publisher.subscribe(&sub_b.inlet(), None);
    sub_a.start().unwrap();
    sub_b.start().unwrap();
    publisher.start().unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        seen_a.lock().len() >= 5 && seen_b.lock().len() >= 5
    }));

    publisher.stop();
    sub_a.stop();
    sub_b.stop();

    // Both sides saw the same stream from the same source.
    assert!(seen_a.lock().iter().all(|(src, _)| src == "gps"));
    assert!(seen_b.lock().iter().all(|(src, _)| src == "gps"));
}

#[test]
fn test_messages_to_stopped_subscriber_are_dropped_not_queued() {
    let published = Arc::new(Mutex::new(0));
    let mut publisher = Publisher::new(
        "gps",
        Box::new(TickingGps {
            published: Arc::clone(&published),
        }),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sub = Subscriber::new("late", Box::new(Collector { seen: Arc::clone(&seen) }));
    publisher.subscribe(&sub.inlet(), None);

    // Subscriber never started: publishing proceeds, nothing accumulates.
    publisher.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || *published.lock() >= 10));
    publisher.stop();

    assert!(seen.lock().is_empty());
    assert_eq!(sub.inlet().queue_len(), 0);
    assert!(sub.dropped_messages() >= 10);
}

#[test]
fn test_subscribe_survives_publisher_restart() {
    let published = Arc::new(Mutex::new(0));
    let mut publisher = Publisher::new(
        "gps",
        Box::new(TickingGps {
            published: Arc::clone(&published),
        }),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut sub = Subscriber::new("out", Box::new(Collector { seen: Arc::clone(&seen) }));
    publisher.subscribe(&sub.inlet(), None);
    sub.start().unwrap();

    publisher.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || !seen.lock().is_empty()));
    publisher.stop();
    assert_eq!(publisher.state(), LifecycleState::Stopped);

    let before = seen.lock().len();
    publisher.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || seen.lock().len() > before));
    publisher.stop();
    sub.stop();
}
