use crate::config::CameraConfig;
use crate::coords::{CoordinateModel, Transform};
use crate::error::ConfigurationError;
use crate::feed::FeedInfo;
use crate::frame::BYTES_PER_SAMPLE;

/// Display defaults shared by cameras and the feeds derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayDefaults {
    pub default_min: u32,
    pub default_max: u32,
    pub max_intensity: u32,
}

/// Immutable identity and geometry of a configured camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraIdentity {
    pub name: String,
    pub is_master: bool,
    pub x_pixels: u32,
    pub y_pixels: u32,
    pub x_bin: u32,
    pub y_bin: u32,
    pub x_start: u32,
    pub y_start: u32,
    pub x_chip: u32,
    pub y_chip: u32,
    pub transform: Transform,
    pub display: DisplayDefaults,
    pub extension: String,
    pub saved: bool,
}

impl CameraIdentity {
    /// Resolve a camera definition. Zero resolutions or bin factors and chip
    /// extents that do not fit in 32 bits are rejected.
    pub fn from_config(config: &CameraConfig) -> Result<Self, ConfigurationError> {
        let invalid = |details: String| ConfigurationError::InvalidCamera {
            camera: config.name.clone(),
            details,
        };

        if config.x_pixels == 0 || config.y_pixels == 0 {
            return Err(invalid(format!(
                "resolution {}x{} must be non-zero",
                config.x_pixels, config.y_pixels
            )));
        }
        if config.x_bin == 0 || config.y_bin == 0 {
            return Err(invalid(format!(
                "bin factors {}x{} must be non-zero",
                config.x_bin, config.y_bin
            )));
        }

        let x_chip = match config.x_chip {
            Some(x_chip) => x_chip,
            None => config.x_pixels.checked_mul(config.x_bin).ok_or_else(|| {
                invalid(format!(
                    "chip width {} x {} overflows",
                    config.x_pixels, config.x_bin
                ))
            })?,
        };
        let y_chip = match config.y_chip {
            Some(y_chip) => y_chip,
            None => config.y_pixels.checked_mul(config.y_bin).ok_or_else(|| {
                invalid(format!(
                    "chip height {} x {} overflows",
                    config.y_pixels, config.y_bin
                ))
            })?,
        };

        Ok(Self {
            name: config.name.clone(),
            is_master: config.master,
            x_pixels: config.x_pixels,
            y_pixels: config.y_pixels,
            x_bin: config.x_bin,
            y_bin: config.y_bin,
            x_start: config.x_start,
            y_start: config.y_start,
            x_chip,
            y_chip,
            transform: Transform {
                flip_horizontal: config.flip_horizontal,
                flip_vertical: config.flip_vertical,
                transpose: config.transpose,
            },
            display: DisplayDefaults {
                default_min: config.default_min,
                default_max: config.default_max,
                max_intensity: config.max_intensity,
            },
            extension: config.extension.clone(),
            saved: config.saved,
        })
    }

    pub fn bytes_per_frame(&self) -> usize {
        BYTES_PER_SAMPLE * self.x_pixels as usize * self.y_pixels as usize
    }

    pub fn coordinates(&self) -> CoordinateModel {
        CoordinateModel::for_camera(self)
    }

    /// Metadata describing the unmodified camera output as a pseudo-feed.
    /// The colortable is left empty for the display to fill in.
    pub fn feed_info(&self) -> FeedInfo {
        FeedInfo {
            feed_name: self.name.clone(),
            bytes_per_frame: self.bytes_per_frame(),
            colortable: String::new(),
            default_min: self.display.default_min,
            default_max: self.display.default_max,
            max_intensity: self.display.max_intensity,
            extension: self.extension.clone(),
            flip_horizontal: self.transform.flip_horizontal,
            flip_vertical: self.transform.flip_vertical,
            transpose: self.transform.transpose,
            is_camera: true,
            is_master: self.is_master,
            is_saved: self.saved,
            width: self.x_pixels,
            height: self.y_pixels,
        }
    }
}
