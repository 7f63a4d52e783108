mod info;
mod processor;
mod spec;

pub use info::{split_feed_name, FeedInfo, FeedInfoMap};
pub use processor::{AverageFeed, FeedKind, FeedProcessor, IntervalFeed, SliceFeed};
pub use spec::{CropRegion, FeedSpec};
