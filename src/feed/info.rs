use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything display and saving need to know about a camera or feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedInfo {
    pub feed_name: String,
    pub bytes_per_frame: usize,
    pub colortable: String,
    pub default_min: u32,
    pub default_max: u32,
    pub max_intensity: u32,
    /// File name extension tag used when saving
    pub extension: String,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub transpose: bool,
    pub is_camera: bool,
    pub is_master: bool,
    pub is_saved: bool,
    pub width: u32,
    pub height: u32,
}

/// Feed identifier (cameras included) to metadata.
pub type FeedInfoMap = BTreeMap<String, FeedInfo>;

/// Split a feed identifier into camera and feed names.
///
/// `"camera1-avg"` gives `("camera1", Some("avg"))`, a bare camera name gives
/// `(name, None)`.
pub fn split_feed_name(feed_name: &str) -> (&str, Option<&str>) {
    match feed_name.split_once('-') {
        Some((camera, feed)) => (camera, Some(feed)),
        None => (feed_name, None),
    }
}
