//! Camera stream payloads and output writer.
//!
//! The encoder hands the bus chunks of the compressed stream. Every chunk's
//! bytes go straight into the continuous binary file; metadata rows are
//! written only when a frame completes, keyed by a monotonically increasing
//! frame counter. A frame delivered across several incomplete writes gets
//! the FIRST fragment's timestamp and the SUM of the fragment sizes.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::bus::{Consumer, Message, Payload, Publisher, SensorDriver, Subscriber};
use crate::core::config::CameraConfig;
use crate::core::sensors::CsvSink;
use crate::error::Result;

/// Kind of encoded frame a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Self-contained key frame.
    Key,
    /// Delta frame referencing earlier data.
    Delta,
    /// Codec header bytes (SPS/PPS and friends).
    Header,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Key => "key",
            FrameKind::Delta => "delta",
            FrameKind::Header => "header",
        }
    }
}

/// One physical write from the encoder.
#[derive(Debug, Clone)]
pub struct FrameChunk {
    /// Raw stream bytes; always appended to the binary output.
    pub bytes: Vec<u8>,
    /// Whether this chunk completes a frame.
    pub complete: bool,
    pub kind: FrameKind,
    /// Size of this chunk in bytes.
    pub frame_size: u64,
    /// Total stream bytes written by the encoder so far.
    pub video_size: u64,
}

/// Consumer writing the binary stream plus the per-frame metadata CSV.
pub struct CameraOutput {
    data_path: PathBuf,
    data: Option<BufWriter<File>>,
    metadata: CsvSink,
    frame_count: u64,
    /// (timestamp_ms, frame_size) of fragments awaiting their final chunk.
    pending: Vec<(i64, u64)>,
}

const HEADER: &[&str] = &["timestamp", "frame_num", "frame_type", "frame_size", "video_size"];

impl CameraOutput {
    pub fn new(
        data_path: impl Into<PathBuf>,
        metadata_path: impl Into<PathBuf>,
        metadata_threshold: usize,
    ) -> Self {
        Self {
            data_path: data_path.into(),
            data: None,
            metadata: CsvSink::new(metadata_path, HEADER, metadata_threshold),
            frame_count: 0,
            pending: Vec::new(),
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Consumer for CameraOutput {
    fn on_start(&mut self) -> Result<()> {
        self.data = Some(BufWriter::new(File::create(&self.data_path)?));
        self.metadata.open()?;
        self.frame_count = 0;
        self.pending.clear();
        Ok(())
    }

    fn on_stop(&mut self) -> Result<()> {
        self.metadata.close()?;
        if let Some(mut data) = self.data.take() {
            data.flush()?;
        }
        Ok(())
    }

    fn on_message(&mut self, msg: &Message) -> Result<()> {
        let Payload::Frame(chunk) = &msg.payload else {
            log::debug!("camera output: ignoring {} payload", msg.source);
            return Ok(());
        };

        if let Some(data) = self.data.as_mut() {
            data.write_all(&chunk.bytes)?;
        }

        if !chunk.complete {
            self.pending.push((msg.timestamp_ms, chunk.frame_size));
            return Ok(());
        }

        let mut timestamp = msg.timestamp_ms;
        let mut frame_size = chunk.frame_size;
        if let Some(&(first_ts, _)) = self.pending.first() {
            timestamp = first_ts;
            frame_size += self.pending.iter().map(|(_, size)| size).sum::<u64>();
            self.pending.clear();
        }

        let frame_num = self.frame_count;
        self.frame_count += 1;
        self.metadata.push(format!(
            "{},{},{},{},{}",
            timestamp,
            frame_num,
            chunk.kind.as_str(),
            frame_size,
            chunk.video_size
        ))
    }
}

/// Factory for hosts that supply a capture driver.
pub fn build_with_driver(
    config: &CameraConfig,
    out_dir: &Path,
    driver: Box<dyn SensorDriver>,
) -> (Publisher, Option<Subscriber>) {
    let publisher = Publisher::new("camera", driver);
    let subscriber = if config.dry_run {
        None
    } else {
        let output = CameraOutput::new(
            out_dir.join(&config.output_data),
            out_dir.join(&config.output_metadata),
            config.output_metadata_threshold,
        );
        Some(Subscriber::new("camera-output", Box::new(output)))
    };
    (publisher, subscriber)
}
