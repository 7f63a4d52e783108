use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::spec::FeedSpec;
use crate::camera::CameraIdentity;
use crate::config::FeedConfig;
use crate::error::{ConfigurationError, FrameError};
use crate::frame::{DerivedFrame, RawFrame};

/// Processing policy selected by a feed's `feed_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Average,
    Interval,
    Slice,
}

impl FeedKind {
    pub fn parse(feed: &str, feed_type: &str) -> Result<Self, ConfigurationError> {
        match feed_type {
            "average" => Ok(FeedKind::Average),
            "interval" => Ok(FeedKind::Interval),
            "slice" => Ok(FeedKind::Slice),
            other => Err(ConfigurationError::UnknownFeedType {
                feed: feed.to_string(),
                feed_type: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedKind::Average => "average",
            FeedKind::Interval => "interval",
            FeedKind::Slice => "slice",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sequence number of the last frame a feed produced; -1 before the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameCounter(i64);

impl FrameCounter {
    fn new() -> Self {
        Self(-1)
    }

    fn advance(&mut self) -> u64 {
        self.0 += 1;
        self.0 as u64
    }
}

/// Emits the feed's region of every frame, keeping the source numbering.
#[derive(Debug, Clone)]
pub struct SliceFeed {
    spec: FeedSpec,
    counter: FrameCounter,
}

/// Emits the per-pixel integer mean of every `frames_to_average` frames.
#[derive(Debug, Clone)]
pub struct AverageFeed {
    spec: FeedSpec,
    counter: FrameCounter,
    frames_to_average: u32,
    sum: Option<Vec<u64>>,
    count: u32,
}

/// Emits frames whose source number modulo `cycle_length` is in `capture_frames`.
#[derive(Debug, Clone)]
pub struct IntervalFeed {
    spec: FeedSpec,
    counter: FrameCounter,
    cycle_length: u64,
    capture_frames: BTreeSet<u64>,
}

#[derive(Debug, Clone)]
pub enum FeedProcessor {
    Slice(SliceFeed),
    Average(AverageFeed),
    Interval(IntervalFeed),
}

impl FeedProcessor {
    /// Validate a feed definition against its source camera and create the
    /// processor for its type.
    pub fn build(camera: &CameraIdentity, config: &FeedConfig) -> Result<Self, ConfigurationError> {
        let kind = FeedKind::parse(&config.name, &config.feed_type)?;
        let spec = FeedSpec::new(camera, config)?;

        let processor = match kind {
            FeedKind::Slice => FeedProcessor::Slice(SliceFeed {
                spec,
                counter: FrameCounter::new(),
            }),
            FeedKind::Average => {
                let frames_to_average = config.frames_to_average.ok_or_else(|| {
                    ConfigurationError::MissingParameter {
                        feed: config.name.clone(),
                        parameter: "frames_to_average".to_string(),
                    }
                })?;
                if frames_to_average == 0 {
                    return Err(ConfigurationError::InvalidParameter {
                        feed: config.name.clone(),
                        parameter: "frames_to_average".to_string(),
                        details: "must be at least 1".to_string(),
                    });
                }

                FeedProcessor::Average(AverageFeed {
                    spec,
                    counter: FrameCounter::new(),
                    frames_to_average,
                    sum: None,
                    count: 0,
                })
            }
            FeedKind::Interval => {
                let cycle_length = config.cycle_length.ok_or_else(|| {
                    ConfigurationError::MissingParameter {
                        feed: config.name.clone(),
                        parameter: "cycle_length".to_string(),
                    }
                })?;
                if cycle_length == 0 {
                    return Err(ConfigurationError::InvalidParameter {
                        feed: config.name.clone(),
                        parameter: "cycle_length".to_string(),
                        details: "must be at least 1".to_string(),
                    });
                }

                let list = config.capture_frames.as_deref().ok_or_else(|| {
                    ConfigurationError::MissingParameter {
                        feed: config.name.clone(),
                        parameter: "capture_frames".to_string(),
                    }
                })?;
                let capture_frames = parse_capture_frames(&config.name, list, cycle_length)?;

                FeedProcessor::Interval(IntervalFeed {
                    spec,
                    counter: FrameCounter::new(),
                    cycle_length,
                    capture_frames,
                })
            }
        };

        Ok(processor)
    }

    pub fn kind(&self) -> FeedKind {
        match self {
            FeedProcessor::Slice(_) => FeedKind::Slice,
            FeedProcessor::Average(_) => FeedKind::Average,
            FeedProcessor::Interval(_) => FeedKind::Interval,
        }
    }

    pub fn spec(&self) -> &FeedSpec {
        match self {
            FeedProcessor::Slice(feed) => &feed.spec,
            FeedProcessor::Average(feed) => &feed.spec,
            FeedProcessor::Interval(feed) => &feed.spec,
        }
    }

    /// Number of the last frame this feed emitted, -1 if none since the last reset.
    pub fn frame_number(&self) -> i64 {
        match self {
            FeedProcessor::Slice(feed) => feed.counter.0,
            FeedProcessor::Average(feed) => feed.counter.0,
            FeedProcessor::Interval(feed) => feed.counter.0,
        }
    }

    /// Process one raw frame. Frames from other cameras are ignored; frames
    /// from the source camera must match its configured geometry.
    pub fn ingest(&mut self, frame: &RawFrame) -> Result<Vec<DerivedFrame>, FrameError> {
        let derived = match self {
            FeedProcessor::Slice(feed) => feed.ingest(frame)?,
            FeedProcessor::Average(feed) => feed.ingest(frame)?,
            FeedProcessor::Interval(feed) => feed.ingest(frame)?,
        };

        match derived {
            Some(derived) => {
                trace!(
                    "Feed '{}' emitted frame {} from source frame {}",
                    derived.feed,
                    derived.frame_number,
                    frame.frame_number
                );
                Ok(vec![derived])
            }
            None => Ok(Vec::new()),
        }
    }

    /// Clear accumulation state; called at the start of every film.
    pub fn reset(&mut self) {
        match self {
            FeedProcessor::Slice(feed) => feed.counter = FrameCounter::new(),
            FeedProcessor::Average(feed) => {
                feed.counter = FrameCounter::new();
                feed.sum = None;
                feed.count = 0;
            }
            FeedProcessor::Interval(feed) => feed.counter = FrameCounter::new(),
        }
    }
}

fn derived_frame(spec: &FeedSpec, frame_number: u64, data: Arc<Vec<u16>>) -> DerivedFrame {
    DerivedFrame {
        feed: spec.id().to_string(),
        frame_number,
        width: spec.x_pixels(),
        height: spec.y_pixels(),
        data,
    }
}

impl SliceFeed {
    fn ingest(&mut self, frame: &RawFrame) -> Result<Option<DerivedFrame>, FrameError> {
        let Some(data) = self.spec.select(frame)? else {
            return Ok(None);
        };
        self.counter = FrameCounter(frame.frame_number as i64);
        Ok(Some(derived_frame(&self.spec, frame.frame_number, data)))
    }
}

impl AverageFeed {
    fn ingest(&mut self, frame: &RawFrame) -> Result<Option<DerivedFrame>, FrameError> {
        let Some(data) = self.spec.select(frame)? else {
            return Ok(None);
        };

        match self.sum.as_mut() {
            Some(sum) => {
                for (total, &sample) in sum.iter_mut().zip(data.iter()) {
                    *total += sample as u64;
                }
            }
            None => self.sum = Some(data.iter().map(|&s| s as u64).collect()),
        }
        self.count += 1;

        if self.count < self.frames_to_average {
            return Ok(None);
        }

        let divisor = self.frames_to_average as u64;
        let averaged: Vec<u16> = self
            .sum
            .take()
            .unwrap_or_default()
            .into_iter()
            .map(|total| (total / divisor) as u16)
            .collect();
        self.count = 0;

        let number = self.counter.advance();
        Ok(Some(derived_frame(&self.spec, number, Arc::new(averaged))))
    }
}

impl IntervalFeed {
    fn ingest(&mut self, frame: &RawFrame) -> Result<Option<DerivedFrame>, FrameError> {
        let Some(data) = self.spec.select(frame)? else {
            return Ok(None);
        };

        // Selection follows the camera's numbering, output numbering is our own.
        if !self
            .capture_frames
            .contains(&(frame.frame_number % self.cycle_length))
        {
            return Ok(None);
        }

        let number = self.counter.advance();
        Ok(Some(derived_frame(&self.spec, number, data)))
    }
}

fn parse_capture_frames(
    feed: &str,
    list: &str,
    cycle_length: u64,
) -> Result<BTreeSet<u64>, ConfigurationError> {
    let invalid = |details: String| ConfigurationError::InvalidParameter {
        feed: feed.to_string(),
        parameter: "capture_frames".to_string(),
        details,
    };

    let mut frames = BTreeSet::new();
    for entry in list.split(',') {
        let entry = entry.trim();
        let position: u64 = entry
            .parse()
            .map_err(|_| invalid(format!("'{}' is not a frame number", entry)))?;
        if position >= cycle_length {
            return Err(invalid(format!(
                "{} is outside a cycle of length {}",
                position, cycle_length
            )));
        }
        frames.insert(position);
    }

    Ok(frames)
}
