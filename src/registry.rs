use std::collections::HashSet;

use tracing::{debug, info, trace};

use crate::camera::CameraIdentity;
use crate::config::{CamfeedConfig, FeedConfig};
use crate::error::{ConfigurationError, FrameError};
use crate::feed::{FeedInfoMap, FeedProcessor};
use crate::frame::{DerivedFrame, RawFrame};

/// Owns every feed of one configuration and fans raw frames out to them.
///
/// A registry is never edited in place: a new configuration builds a new
/// registry, discarding all accumulated feed state.
#[derive(Debug)]
pub struct FeedRegistry {
    cameras: Vec<CameraIdentity>,
    processors: Vec<FeedProcessor>,
    feed_configs: Vec<FeedConfig>,
    metadata: FeedInfoMap,
}

impl FeedRegistry {
    /// Build all cameras and feeds. Either every feed is valid or nothing is
    /// built.
    pub fn build(config: &CamfeedConfig) -> Result<Self, ConfigurationError> {
        let mut names = HashSet::new();
        let mut cameras = Vec::with_capacity(config.cameras.len());
        for camera_config in &config.cameras {
            if !names.insert(camera_config.name.clone()) {
                return Err(ConfigurationError::DuplicateName {
                    name: camera_config.name.clone(),
                });
            }
            cameras.push(CameraIdentity::from_config(camera_config)?);
        }

        let mut processors = Vec::with_capacity(config.feeds.len());
        for feed_config in &config.feeds {
            let camera = cameras
                .iter()
                .find(|c| c.name == feed_config.source)
                .ok_or_else(|| ConfigurationError::UnknownCamera {
                    feed: feed_config.name.clone(),
                    camera: feed_config.source.clone(),
                })?;

            let processor = FeedProcessor::build(camera, feed_config)?;
            if !names.insert(processor.spec().id().to_string()) {
                return Err(ConfigurationError::DuplicateName {
                    name: processor.spec().id().to_string(),
                });
            }

            debug!(
                "Created {} feed '{}' from camera '{}'",
                processor.kind(),
                processor.spec().id(),
                camera.name
            );
            processors.push(processor);
        }

        let mut metadata = FeedInfoMap::new();
        for camera in &cameras {
            metadata.insert(camera.name.clone(), camera.feed_info());
        }
        for processor in &processors {
            metadata.insert(processor.spec().id().to_string(), processor.spec().info().clone());
        }

        info!(
            "Feed registry built: {} camera(s), {} feed(s)",
            cameras.len(),
            processors.len()
        );

        Ok(Self {
            cameras,
            processors,
            feed_configs: config.feeds.clone(),
            metadata,
        })
    }

    pub fn has_feeds(&self) -> bool {
        !self.processors.is_empty()
    }

    pub fn cameras(&self) -> &[CameraIdentity] {
        &self.cameras
    }

    pub fn camera(&self, name: &str) -> Option<&CameraIdentity> {
        self.cameras.iter().find(|c| c.name == name)
    }

    /// Feeds in configuration order
    pub fn processors(&self) -> &[FeedProcessor] {
        &self.processors
    }

    /// Feed definitions this registry was built from
    pub fn feed_configs(&self) -> &[FeedConfig] {
        &self.feed_configs
    }

    /// Dispatch one raw frame to every feed in configuration order.
    ///
    /// A frame whose buffer disagrees with its declared or configured geometry
    /// is rejected before any feed sees it.
    pub fn on_frame(&mut self, frame: &RawFrame) -> Result<Vec<DerivedFrame>, FrameError> {
        frame.ensure_valid()?;

        match self.camera(&frame.camera) {
            Some(camera) => {
                if frame.width != camera.x_pixels || frame.height != camera.y_pixels {
                    return Err(FrameError::GeometryMismatch {
                        camera: frame.camera.clone(),
                        frame_number: frame.frame_number,
                        width: frame.width,
                        height: frame.height,
                        expected_width: camera.x_pixels,
                        expected_height: camera.y_pixels,
                    });
                }
            }
            None => {
                trace!("Frame from unconfigured camera '{}'", frame.camera);
                return Ok(Vec::new());
            }
        }

        let mut derived = Vec::new();
        for processor in &mut self.processors {
            derived.extend(processor.ingest(frame)?);
        }
        Ok(derived)
    }

    /// Clear the accumulation state of every feed.
    pub fn reset_all(&mut self) {
        debug!("Resetting {} feed(s)", self.processors.len());
        for processor in &mut self.processors {
            processor.reset();
        }
    }

    /// Metadata for every camera and feed, keyed by identifier.
    pub fn metadata_snapshot(&self) -> &FeedInfoMap {
        &self.metadata
    }

    /// Metadata with the master flags replaced, for cameras whose role is
    /// reported separately from their parameters.
    pub fn metadata_with_masters<'a, I>(&self, masters: I) -> FeedInfoMap
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        let mut metadata = self.metadata.clone();
        for (camera, is_master) in masters {
            if let Some(info) = metadata.get_mut(camera) {
                if info.is_camera {
                    info.is_master = is_master;
                }
            }
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraConfig;

    fn create_test_config() -> CamfeedConfig {
        let mut config = CamfeedConfig::default();
        let mut camera1 = CameraConfig::new("camera1", 8, 4);
        camera1.master = true;
        config.cameras.push(camera1);
        config.cameras.push(CameraConfig::new("camera2", 8, 4));

        let mut avg = FeedConfig::new("avg", "camera1", "average");
        avg.frames_to_average = Some(2);
        config.feeds.push(avg);

        config
            .feeds
            .push(FeedConfig::new("left", "camera1", "slice").with_crop((1, 4), (1, 4)));

        let mut odd = FeedConfig::new("odd", "camera2", "interval");
        odd.cycle_length = Some(2);
        odd.capture_frames = Some("1".to_string());
        config.feeds.push(odd);

        config
    }

    fn frame(camera: &str, number: u64) -> RawFrame {
        RawFrame::new(camera, number, 8, 4, (0..32).collect())
    }

    #[test]
    fn test_build_registry() {
        let registry = FeedRegistry::build(&create_test_config()).unwrap();

        assert!(registry.has_feeds());
        assert_eq!(registry.cameras().len(), 2);
        let ids: Vec<&str> = registry.processors().iter().map(|p| p.spec().id()).collect();
        assert_eq!(ids, vec!["camera1-avg", "camera1-left", "camera2-odd"]);
        assert_eq!(registry.feed_configs().len(), 3);
    }

    #[test]
    fn test_metadata_keys_are_cameras_and_feeds() {
        let registry = FeedRegistry::build(&create_test_config()).unwrap();
        let keys: Vec<&str> = registry
            .metadata_snapshot()
            .keys()
            .map(|k| k.as_str())
            .collect();

        assert_eq!(
            keys,
            vec!["camera1", "camera1-avg", "camera1-left", "camera2", "camera2-odd"]
        );
        assert!(registry.metadata_snapshot()["camera1"].is_master);
        assert!(!registry.metadata_snapshot()["camera2"].is_master);
        assert!(registry.metadata_snapshot()["camera2"].is_camera);
        assert_eq!(registry.metadata_snapshot()["camera1-left"].width, 4);
    }

    #[test]
    fn test_camera_only_configuration() {
        let mut config = create_test_config();
        config.feeds.clear();
        let mut registry = FeedRegistry::build(&config).unwrap();

        assert!(!registry.has_feeds());
        assert_eq!(registry.metadata_snapshot().len(), 2);
        assert!(registry.on_frame(&frame("camera1", 0)).unwrap().is_empty());
    }

    #[test]
    fn test_build_fails_atomically() {
        let mut config = create_test_config();
        config.feeds.push(FeedConfig::new("bad", "camera1", "median"));

        match FeedRegistry::build(&config) {
            Err(ConfigurationError::UnknownFeedType { feed, feed_type }) => {
                assert_eq!(feed, "bad");
                assert_eq!(feed_type, "median");
            }
            other => panic!("Expected unknown feed type, got {:?}", other),
        }
    }

    #[test]
    fn test_build_rejects_unknown_camera_and_duplicates() {
        let mut config = create_test_config();
        config.feeds.push(FeedConfig::new("x", "camera9", "slice"));
        assert_eq!(
            FeedRegistry::build(&config).unwrap_err(),
            ConfigurationError::UnknownCamera {
                feed: "x".to_string(),
                camera: "camera9".to_string(),
            }
        );

        let mut config = create_test_config();
        config.feeds.push(FeedConfig::new("left", "camera1", "slice"));
        assert_eq!(
            FeedRegistry::build(&config).unwrap_err(),
            ConfigurationError::DuplicateName {
                name: "camera1-left".to_string(),
            }
        );
    }

    #[test]
    fn test_build_rejects_invalid_camera_geometry() {
        let mut config = create_test_config();
        config.cameras[1].x_bin = 0;
        match FeedRegistry::build(&config) {
            Err(ConfigurationError::InvalidCamera { camera, .. }) => assert_eq!(camera, "camera2"),
            other => panic!("Expected invalid camera, got {:?}", other),
        }

        let mut config = create_test_config();
        config.cameras[0].x_pixels = 70_000;
        config.cameras[0].x_bin = 70_000;
        match FeedRegistry::build(&config) {
            Err(ConfigurationError::InvalidCamera { camera, details }) => {
                assert_eq!(camera, "camera1");
                assert!(details.contains("overflows"));
            }
            other => panic!("Expected invalid camera, got {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_in_configuration_order() {
        let mut registry = FeedRegistry::build(&create_test_config()).unwrap();

        let out = registry.on_frame(&frame("camera1", 0)).unwrap();
        let feeds: Vec<&str> = out.iter().map(|f| f.feed.as_str()).collect();
        assert_eq!(feeds, vec!["camera1-left"]);

        let out = registry.on_frame(&frame("camera1", 1)).unwrap();
        let feeds: Vec<&str> = out.iter().map(|f| f.feed.as_str()).collect();
        assert_eq!(feeds, vec!["camera1-avg", "camera1-left"]);

        let out = registry.on_frame(&frame("camera2", 1)).unwrap();
        let feeds: Vec<&str> = out.iter().map(|f| f.feed.as_str()).collect();
        assert_eq!(feeds, vec!["camera2-odd"]);
    }

    #[test]
    fn test_frame_from_unknown_camera_is_ignored() {
        let mut registry = FeedRegistry::build(&create_test_config()).unwrap();
        assert!(registry.on_frame(&frame("camera3", 0)).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_frames_abort_dispatch() {
        let mut registry = FeedRegistry::build(&create_test_config()).unwrap();

        let short = RawFrame::new("camera1", 0, 8, 4, vec![0; 31]);
        assert!(matches!(
            registry.on_frame(&short),
            Err(FrameError::SizeMismatch { .. })
        ));

        let wrong_shape = RawFrame::new("camera1", 0, 4, 8, vec![0; 32]);
        assert!(matches!(
            registry.on_frame(&wrong_shape),
            Err(FrameError::GeometryMismatch { .. })
        ));

        // Rejected frames do not count towards the average
        assert_eq!(registry.on_frame(&frame("camera1", 0)).unwrap().len(), 1);
        assert_eq!(registry.on_frame(&frame("camera1", 1)).unwrap().len(), 2);
    }

    #[test]
    fn test_reset_all() {
        let mut registry = FeedRegistry::build(&create_test_config()).unwrap();

        registry.on_frame(&frame("camera1", 0)).unwrap();
        registry.reset_all();
        let out = registry.on_frame(&frame("camera1", 1)).unwrap();
        assert!(out.iter().all(|f| f.feed != "camera1-avg"));
        assert_eq!(registry.processors()[0].frame_number(), -1);
    }

    #[test]
    fn test_rebuild_discards_accumulation() {
        let config = create_test_config();
        let mut registry = FeedRegistry::build(&config).unwrap();
        registry.on_frame(&frame("camera1", 0)).unwrap();

        let mut registry = FeedRegistry::build(&config).unwrap();
        let out = registry.on_frame(&frame("camera1", 1)).unwrap();
        assert!(out.iter().all(|f| f.feed != "camera1-avg"));
    }

    #[test]
    fn test_metadata_with_masters() {
        let registry = FeedRegistry::build(&create_test_config()).unwrap();
        let metadata = registry.metadata_with_masters([("camera1", false), ("camera2", true)]);

        assert!(!metadata["camera1"].is_master);
        assert!(metadata["camera2"].is_master);
        assert!(!metadata["camera2-odd"].is_master);
    }
}
