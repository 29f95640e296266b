//! Immutable message envelope carried by the bus.

use crate::core::sensors::camera::FrameChunk;
use crate::core::sensors::gps::GpsFix;
use crate::core::sensors::imu::ImuSample;
use crate::core::sensors::systeminfo::SystemReport;

/// Sensor-specific payload carried by a [`Message`].
///
/// The set of payloads is closed: every supported sensor family has exactly
/// one variant, so a consumer that forgets to handle a payload fails to
/// compile rather than at 2am on the road.
#[derive(Debug, Clone)]
pub enum Payload {
    /// System telemetry (filesystem usage, own process stats, temperatures).
    System(SystemReport),
    /// One inertial measurement sample.
    Imu(ImuSample),
    /// One GPS position fix.
    Gps(GpsFix),
    /// One chunk of an encoded video stream plus frame bookkeeping.
    Frame(FrameChunk),
}

/// Envelope for one published value.
///
/// Constructed by the publishing side and stamped with the wall-clock time of
/// the publish call. Immutable once built; subscribers share it behind an
/// `Arc` without any risk of mutation.
#[derive(Debug, Clone)]
pub struct Message {
    /// Wall-clock publish time, epoch milliseconds.
    pub timestamp_ms: i64,
    /// Name of the originating sensor.
    pub source: String,
    /// Channel within the sensor's published data.
    pub topic: String,
    pub payload: Payload,
}

impl Message {
    pub fn new(source: impl Into<String>, topic: impl Into<String>, payload: Payload) -> Self {
        Self {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            source: source.into(),
            topic: topic.into(),
            payload,
        }
    }

    /// Build a message with an explicit timestamp (tests, replays).
    pub fn with_timestamp(
        timestamp_ms: i64,
        source: impl Into<String>,
        topic: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            timestamp_ms,
            source: source.into(),
            topic: topic.into(),
            payload,
        }
    }
}
