use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

use super::info::FeedInfo;
use crate::camera::CameraIdentity;
use crate::config::FeedConfig;
use crate::coords::CoordinateModel;
use crate::error::{ConfigurationError, FrameError};
use crate::frame::{RawFrame, BYTES_PER_SAMPLE};

/// 0-based, half-open sub-rectangle of a camera frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropRegion {
    pub columns: Range<usize>,
    pub rows: Range<usize>,
}

/// Validated, immutable description of one feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSpec {
    id: String,
    camera: String,
    /// Geometry of the source camera's frames
    source_pixels: (u32, u32),
    /// `None` when the feed covers the whole camera frame
    crop: Option<CropRegion>,
    x_pixels: u32,
    y_pixels: u32,
    info: FeedInfo,
    coordinates: CoordinateModel,
}

impl FeedSpec {
    pub fn new(camera: &CameraIdentity, config: &FeedConfig) -> Result<Self, ConfigurationError> {
        let id = format!("{}-{}", camera.name, config.name);

        let x_start = config.x_start.unwrap_or(1);
        let x_end = config.x_end.unwrap_or(camera.x_pixels);
        let y_start = config.y_start.unwrap_or(1);
        let y_end = config.y_end.unwrap_or(camera.y_pixels);

        let invalid = |details: String| ConfigurationError::InvalidCrop {
            feed: config.name.clone(),
            camera: camera.name.clone(),
            details,
        };
        if x_start < 1 || x_end < x_start || x_end > camera.x_pixels {
            return Err(invalid(format!(
                "x range {}..={} is outside 1..={}",
                x_start, x_end, camera.x_pixels
            )));
        }
        if y_start < 1 || y_end < y_start || y_end > camera.y_pixels {
            return Err(invalid(format!(
                "y range {}..={} is outside 1..={}",
                y_start, y_end, camera.y_pixels
            )));
        }

        let x_pixels = x_end - x_start + 1;
        let y_pixels = y_end - y_start + 1;

        if x_pixels % 4 != 0 {
            return Err(ConfigurationError::CropNotAligned {
                feed: config.name.clone(),
                camera: camera.name.clone(),
                x_pixels,
            });
        }

        let full_frame = x_start == 1
            && x_end == camera.x_pixels
            && y_start == 1
            && y_end == camera.y_pixels;

        // The only place the 1-based inclusive bounds become buffer indices.
        let region = CropRegion {
            columns: (x_start - 1) as usize..x_end as usize,
            rows: (y_start - 1) as usize..y_end as usize,
        };
        let coordinates = camera
            .coordinates()
            .with_feed_region((region.columns.start, region.rows.start), (x_pixels, y_pixels));
        let crop = if full_frame { None } else { Some(region) };

        let info = FeedInfo {
            feed_name: id.clone(),
            bytes_per_frame: BYTES_PER_SAMPLE * x_pixels as usize * y_pixels as usize,
            colortable: config
                .colortable
                .clone()
                .unwrap_or_else(|| "none".to_string()),
            default_min: config.default_min.unwrap_or(camera.display.default_min),
            default_max: config.default_max.unwrap_or(camera.display.default_max),
            max_intensity: config.max_intensity.unwrap_or(camera.display.max_intensity),
            extension: config.name.clone(),
            flip_horizontal: camera.transform.flip_horizontal,
            flip_vertical: camera.transform.flip_vertical,
            transpose: camera.transform.transpose,
            is_camera: false,
            is_master: false,
            is_saved: config.save,
            width: x_pixels,
            height: y_pixels,
        };

        debug!(
            "Feed '{}': {}x{} pixels, crop {:?}",
            id, x_pixels, y_pixels, crop
        );

        Ok(Self {
            id,
            camera: camera.name.clone(),
            source_pixels: (camera.x_pixels, camera.y_pixels),
            crop,
            x_pixels,
            y_pixels,
            info,
            coordinates,
        })
    }

    /// Feed identifier, `"<camera>-<feed>"`
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the source camera
    pub fn camera(&self) -> &str {
        &self.camera
    }

    pub fn crop_region(&self) -> Option<&CropRegion> {
        self.crop.as_ref()
    }

    pub fn needs_crop(&self) -> bool {
        self.crop.is_some()
    }

    pub fn x_pixels(&self) -> u32 {
        self.x_pixels
    }

    pub fn y_pixels(&self) -> u32 {
        self.y_pixels
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.info.bytes_per_frame
    }

    pub fn info(&self) -> &FeedInfo {
        &self.info
    }

    pub fn coordinates(&self) -> &CoordinateModel {
        &self.coordinates
    }

    /// Extract this feed's region from a frame of its source camera, or `None`
    /// for frames from other cameras. Whole-frame feeds share the raw buffer.
    pub fn select(&self, frame: &RawFrame) -> Result<Option<Arc<Vec<u16>>>, FrameError> {
        if frame.camera != self.camera {
            return Ok(None);
        }

        frame.ensure_valid()?;
        let (width, height) = self.source_pixels;
        if frame.width != width || frame.height != height {
            return Err(FrameError::GeometryMismatch {
                camera: frame.camera.clone(),
                frame_number: frame.frame_number,
                width: frame.width,
                height: frame.height,
                expected_width: width,
                expected_height: height,
            });
        }

        Ok(Some(match &self.crop {
            None => Arc::clone(&frame.data),
            Some(region) => Arc::new(frame.crop(&region.columns, &region.rows)),
        }))
    }
}
