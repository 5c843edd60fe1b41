//! Frame payloads and queue entries.

/// A single image frame.
///
/// Raw pixel data, either 8-bit grayscale (1 channel) or interleaved 8-bit
/// RGB (3 channels). The pipeline treats the payload as opaque bytes; only
/// the JPEG writer interprets the layout.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// 1 = grayscale, 3 = RGB
    pub channels: u8,

    /// Raw pixel data, row-major
    pub data: Vec<u8>,
}

impl Frame {
    /// Create an 8-bit grayscale frame.
    pub fn gray(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels: 1,
            data,
        }
    }

    /// Create an interleaved 8-bit RGB frame.
    pub fn rgb(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels: 3,
            data,
        }
    }

    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * (self.channels as usize)
    }

    pub fn is_valid(&self) -> bool {
        (self.channels == 1 || self.channels == 3) && self.data.len() == self.expected_len()
    }
}

/// One entry on the frame queue.
///
/// The queue entry owns its payload exclusively until the writer consumes it
/// or the queue is cleared. `sample_number` is pre-filled for trigger-driven
/// stills, which arrive already stamped on the sample clock; ordinary frames
/// carry only their arrival time and are resolved by the writer.
#[derive(Debug)]
pub struct PendingFrame {
    /// Software (wall-clock) arrival time, milliseconds.
    pub arrival_time: i64,

    /// Pre-resolved sample number, if the source already knows it.
    pub sample_number: Option<i64>,

    /// Image payload. `None` for timestamp-only entries.
    pub payload: Option<Frame>,

    /// JPEG quality for this entry, 1..=100.
    pub quality: u8,

    /// Failed resolution attempts so far. Maintained by the writer.
    pub attempts: u32,
}

impl PendingFrame {
    pub fn new(arrival_time: i64, payload: Option<Frame>, quality: u8) -> Self {
        Self {
            arrival_time,
            sample_number: None,
            payload,
            quality,
            attempts: 0,
        }
    }

    /// Entry whose sample-clock position is already known.
    pub fn pre_resolved(
        arrival_time: i64,
        sample_number: i64,
        payload: Option<Frame>,
        quality: u8,
    ) -> Self {
        Self {
            arrival_time,
            sample_number: Some(sample_number),
            payload,
            quality,
            attempts: 0,
        }
    }
}
