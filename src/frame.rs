use std::ops::Range;
use std::sync::Arc;

use crate::error::FrameError;

/// Bytes per sample of every frame handled by the pipeline (16-bit mono)
pub const BYTES_PER_SAMPLE: usize = 2;

/// A frame as delivered by a camera. Never mutated by the pipeline.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Name of the camera that produced the frame
    pub camera: String,
    /// Monotonically increasing source frame number
    pub frame_number: u64,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Row-major samples (shared ownership so whole-frame feeds can pass it through)
    pub data: Arc<Vec<u16>>,
}

impl RawFrame {
    pub fn new<S: Into<String>>(
        camera: S,
        frame_number: u64,
        width: u32,
        height: u32,
        data: Vec<u16>,
    ) -> Self {
        Self {
            camera: camera.into(),
            frame_number,
            width,
            height,
            data: Arc::new(data),
        }
    }

    /// Number of samples implied by the declared geometry
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Validate frame data size against the declared geometry
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_len()
    }

    pub fn ensure_valid(&self) -> Result<(), FrameError> {
        if self.validate_size() {
            Ok(())
        } else {
            Err(FrameError::SizeMismatch {
                camera: self.camera.clone(),
                frame_number: self.frame_number,
                expected: self.expected_len(),
                actual: self.data.len(),
            })
        }
    }

    /// Copy out a sub-rectangle as a new contiguous row-major buffer.
    ///
    /// `columns` and `rows` are 0-based half-open ranges that must lie inside
    /// the frame.
    pub fn crop(&self, columns: &Range<usize>, rows: &Range<usize>) -> Vec<u16> {
        let width = self.width as usize;
        let mut cropped = Vec::with_capacity(columns.len() * rows.len());

        for y in rows.clone() {
            let row_start = y * width;
            cropped.extend_from_slice(&self.data[row_start + columns.start..row_start + columns.end]);
        }

        cropped
    }
}

/// Output of a feed: a new frame with the feed's own identity and numbering.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFrame {
    /// Feed identifier, `"<camera>-<feed>"`
    pub feed: String,
    /// Frame number in the feed's own sequence
    pub frame_number: u64,
    pub width: u32,
    pub height: u32,
    pub data: Arc<Vec<u16>>,
}

impl DerivedFrame {
    pub fn bytes(&self) -> usize {
        self.data.len() * BYTES_PER_SAMPLE
    }
}
