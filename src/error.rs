use thiserror::Error;

#[derive(Error, Debug)]
pub enum CamfeedError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Feed configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),
}

/// Errors raised while turning a configuration into feeds. Every variant names
/// the feed or camera it refers to so the configuration file can be fixed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Unknown feed type '{feed_type}' in feed '{feed}'")]
    UnknownFeedType { feed: String, feed_type: String },

    #[error("x size of {x_pixels} is not a multiple of 4 in feed '{feed}' (camera '{camera}')")]
    CropNotAligned {
        feed: String,
        camera: String,
        x_pixels: u32,
    },

    #[error("Feed '{feed}' references unknown camera '{camera}'")]
    UnknownCamera { feed: String, camera: String },

    #[error("Invalid crop window in feed '{feed}' (camera '{camera}'): {details}")]
    InvalidCrop {
        feed: String,
        camera: String,
        details: String,
    },

    #[error("Feed '{feed}' is missing required parameter '{parameter}'")]
    MissingParameter { feed: String, parameter: String },

    #[error("Invalid value for '{parameter}' in feed '{feed}': {details}")]
    InvalidParameter {
        feed: String,
        parameter: String,
        details: String,
    },

    #[error("Invalid geometry for camera '{camera}': {details}")]
    InvalidCamera { camera: String, details: String },

    #[error("Duplicate feed or camera name '{name}'")]
    DuplicateName { name: String },
}

/// Raw frames that break the caller contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame {frame_number} from '{camera}' has {actual} samples, expected {expected}")]
    SizeMismatch {
        camera: String,
        frame_number: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Frame {frame_number} from '{camera}' is {width}x{height}, camera is configured for {expected_width}x{expected_height}")]
    GeometryMismatch {
        camera: String,
        frame_number: u64,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, CamfeedError>;
