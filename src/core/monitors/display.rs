//! Status display: periodic one-line summaries of the latest message from
//! each sensor.
//!
//! The on-device screen hardware is out of scope; this renders the same
//! status lines into the log at the configured framerate.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::bus::{Consumer, Inlet, Message, Payload, Subscriber};
use crate::core::config::{DisplayConfig, TripOptions};
use crate::core::monitors::Monitor;
use crate::error::Result;

pub const DISPLAY_NAME: &str = "display";

/// Renders the latest known state per source, at most once per frame
/// interval. Sources are listed in the order they were first seen.
struct StatusDisplay {
    interval: Duration,
    last_render: Option<Instant>,
    latest: Vec<(String, String)>,
}

impl StatusDisplay {
    fn new(framerate: f64) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / framerate.max(0.001)),
            last_render: None,
            latest: Vec::new(),
        }
    }

    fn remember(&mut self, source: &str, line: String) {
        match self.latest.iter_mut().find(|(s, _)| s == source) {
            Some((_, existing)) => *existing = line,
            None => self.latest.push((source.to_string(), line)),
        }
    }

    fn render(&mut self) {
        for (source, line) in &self.latest {
            log::info!("[{}] {}", source, line);
        }
        self.last_render = Some(Instant::now());
    }

    fn frame_due(&self) -> bool {
        match self.last_render {
            Some(at) => at.elapsed() >= self.interval,
            None => true,
        }
    }
}

fn summarize(payload: &Payload) -> String {
    match payload {
        Payload::System(report) => report.summary(),
        Payload::Imu(sample) => format!(
            "tilt x {:.1}° y {:.1}°",
            sample.tilt[0], sample.tilt[1]
        ),
        Payload::Gps(fix) => format!(
            "lon {:.5} lat {:.5} alt {:.1}m",
            fix.longitude, fix.latitude, fix.altitude
        ),
        Payload::Frame(chunk) => format!("video {} bytes", chunk.video_size),
    }
}

impl Consumer for StatusDisplay {
    fn on_start(&mut self) -> Result<()> {
        self.last_render = None;
        self.latest.clear();
        Ok(())
    }

    fn on_message(&mut self, msg: &Message) -> Result<()> {
        self.remember(&msg.source, summarize(&msg.payload));
        if self.frame_due() {
            self.render();
        }
        Ok(())
    }
}

/// Monitor wrapper around the display subscriber. No shutdown authority.
pub struct DisplayMonitor {
    subscriber: Subscriber,
}

impl DisplayMonitor {
    pub fn new(config: &DisplayConfig) -> Self {
        Self {
            subscriber: Subscriber::new(DISPLAY_NAME, Box::new(StatusDisplay::new(config.framerate)))
                .dry_run(config.dry_run),
        }
    }
}

impl Monitor for DisplayMonitor {
    fn name(&self) -> &str {
        DISPLAY_NAME
    }

    fn start(&mut self) -> Result<()> {
        self.subscriber.start()
    }

    fn stop(&mut self) {
        self.subscriber.stop();
    }

    fn inlet(&self) -> Arc<Inlet> {
        self.subscriber.inlet()
    }
}

/// Factory used by the registry.
pub fn build(options: &TripOptions, _out_dir: &Path) -> Result<Box<dyn Monitor>> {
    Ok(Box::new(DisplayMonitor::new(&options.monitors.display)))
}
