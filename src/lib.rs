pub mod camera;
pub mod config;
pub mod coords;
pub mod error;
pub mod events;
pub mod feed;
pub mod frame;
pub mod registry;
pub mod service;

pub use camera::{CameraIdentity, DisplayDefaults};
pub use crate::config::{CameraConfig, CamfeedConfig, FeedConfig, SystemConfig};
pub use coords::{CoordinateModel, Point, Transform};
pub use error::{CamfeedError, ConfigurationError, EventBusError, FrameError, Result};
pub use events::{EventBus, EventReceiver, FeedEvent};
pub use feed::{
    split_feed_name, CropRegion, FeedInfo, FeedInfoMap, FeedKind, FeedProcessor, FeedSpec,
};
pub use frame::{DerivedFrame, RawFrame};
pub use registry::FeedRegistry;
pub use service::{ControlMessage, ControlResponse, FeedService};
