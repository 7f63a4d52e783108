use camfeed::{
    CamfeedConfig, ConfigurationError, ControlMessage, FeedEvent, FeedRegistry, FeedService,
    RawFrame,
};
use std::collections::BTreeSet;

const CONFIG: &str = r#"
[[cameras]]
name = "camera1"
master = true
x_pixels = 16
y_pixels = 4

[[cameras]]
name = "camera2"
x_pixels = 8
y_pixels = 4
flip_horizontal = true
transpose = true

[[feeds]]
name = "avg"
source = "camera1"
feed_type = "average"
frames_to_average = 3
x_start = 5
x_end = 12

[[feeds]]
name = "sampled"
source = "camera1"
feed_type = "interval"
cycle_length = 4
capture_frames = "0,2"

[[feeds]]
name = "roi"
source = "camera2"
feed_type = "slice"
x_start = 5
x_end = 8
y_start = 2
y_end = 3
"#;

fn camera1_frame(number: u64, fill: u16) -> RawFrame {
    RawFrame::new("camera1", number, 16, 4, vec![fill; 64])
}

fn camera2_frame(number: u64) -> RawFrame {
    RawFrame::new("camera2", number, 8, 4, (0..32).collect())
}

#[test]
fn metadata_covers_every_camera_and_feed() {
    let config = CamfeedConfig::from_toml_str(CONFIG).unwrap();
    let registry = FeedRegistry::build(&config).unwrap();

    let keys: BTreeSet<&str> = registry
        .metadata_snapshot()
        .keys()
        .map(|k| k.as_str())
        .collect();
    let expected: BTreeSet<&str> = [
        "camera1",
        "camera2",
        "camera1-avg",
        "camera1-sampled",
        "camera2-roi",
    ]
    .into_iter()
    .collect();
    assert_eq!(keys, expected);

    let roi = &registry.metadata_snapshot()["camera2-roi"];
    assert_eq!(roi.bytes_per_frame, 2 * 4 * 2);
    assert!(roi.flip_horizontal);
    assert!(roi.transpose);
    assert_eq!(roi.extension, "roi");

    for info in registry.metadata_snapshot().values() {
        assert_eq!(info.width % 4, 0);
    }
}

#[test]
fn feeds_follow_their_policies() {
    let config = CamfeedConfig::from_toml_str(CONFIG).unwrap();
    let mut registry = FeedRegistry::build(&config).unwrap();

    let mut outputs = Vec::new();
    for number in 0..8u64 {
        outputs.extend(registry.on_frame(&camera1_frame(number, number as u16)).unwrap());
        outputs.extend(registry.on_frame(&camera2_frame(100 + number)).unwrap());
    }

    let sampled: Vec<u64> = outputs
        .iter()
        .filter(|f| f.feed == "camera1-sampled")
        .map(|f| f.frame_number)
        .collect();
    assert_eq!(sampled, vec![0, 1, 2, 3]);

    let averaged: Vec<(u64, u16)> = outputs
        .iter()
        .filter(|f| f.feed == "camera1-avg")
        .map(|f| (f.frame_number, f.data[0]))
        .collect();
    // Mean of 0,1,2 and of 3,4,5; frames 6 and 7 are still accumulating.
    assert_eq!(averaged, vec![(0, 1), (1, 4)]);

    let roi: Vec<_> = outputs.iter().filter(|f| f.feed == "camera2-roi").collect();
    assert_eq!(roi.len(), 8);
    assert_eq!(roi[0].frame_number, 100);
    assert_eq!((roi[0].width, roi[0].height), (4, 2));
    assert_eq!(*roi[0].data, vec![12, 13, 14, 15, 20, 21, 22, 23]);
}

#[test]
fn configuration_errors_name_the_feed() {
    let bad_type = CONFIG.replace("feed_type = \"slice\"", "feed_type = \"lastfilm\"");
    let config = CamfeedConfig::from_toml_str(&bad_type).unwrap();
    let err = FeedRegistry::build(&config).unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::UnknownFeedType {
            feed: "roi".to_string(),
            feed_type: "lastfilm".to_string(),
        }
    );
    assert!(err.to_string().contains("roi"));

    let bad_width = CONFIG.replace("x_end = 12", "x_end = 10");
    let config = CamfeedConfig::from_toml_str(&bad_width).unwrap();
    let err = FeedRegistry::build(&config).unwrap_err();
    assert!(matches!(err, ConfigurationError::CropNotAligned { x_pixels: 6, .. }));
    assert!(err.to_string().contains("avg"));
}

#[test]
fn reconfiguration_discards_partial_averages() {
    let config = CamfeedConfig::from_toml_str(CONFIG).unwrap();
    let mut service = FeedService::with_capacity(64);
    let mut receiver = service.subscribe();

    service
        .handle(ControlMessage::NewParameters(Box::new(config.clone())))
        .unwrap();
    service.handle(ControlMessage::UpdatedParameters).unwrap();
    service.handle(ControlMessage::StartCamera).unwrap();

    // Two of three frames towards an average, then a new configuration.
    service.new_frame(&camera1_frame(1, 10)).unwrap();
    service.new_frame(&camera1_frame(3, 10)).unwrap();
    service
        .handle(ControlMessage::NewParameters(Box::new(config)))
        .unwrap();

    let out = service.new_frame(&camera1_frame(5, 10)).unwrap();
    assert!(out.iter().all(|f| f.feed != "camera1-avg"));

    match receiver.try_recv().unwrap() {
        Some(FeedEvent::FeedsInformation { feeds }) => assert_eq!(feeds.len(), 5),
        other => panic!("Unexpected event: {:?}", other),
    }
}
