use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::error::Result;

/// Annotated example configuration printed by `camfeed --print-config`
pub const EXAMPLE_CONFIG: &str = r#"# Camfeed Configuration File

[system]
# Capacity of the feed event bus
event_bus_capacity = 64

[[cameras]]
# Camera identifier; feeds reference it through `source`
name = "camera1"
# Whether this camera drives acquisition timing
master = true
# Frame size in (binned) pixels
x_pixels = 512
y_pixels = 512
# Binning and sensor start offsets
x_bin = 1
y_bin = 1
x_start = 1
y_start = 1
# Maximum chip extent (defaults to pixels * bin)
x_chip = 2048
y_chip = 2048
# Display orientation
flip_horizontal = false
flip_vertical = false
transpose = false
# Display defaults
default_min = 100
default_max = 2000
max_intensity = 65535
# Saving
extension = ""
saved = true

[[feeds]]
# Feed identifier becomes "camera1-average"
name = "average"
source = "camera1"
# One of "average", "interval", "slice"
feed_type = "average"
frames_to_average = 4
# Crop bounds, 1-based and inclusive; the width must be a multiple of 4
x_start = 129
x_end = 384
y_start = 129
y_end = 384

[[feeds]]
name = "even"
source = "camera1"
feed_type = "interval"
# Capture frames whose number modulo cycle_length is listed here
cycle_length = 2
capture_frames = "0"
save = false

[[feeds]]
name = "roi"
source = "camera1"
feed_type = "slice"
x_start = 1
x_end = 128
colortable = "gray"
"#;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CamfeedConfig {
    #[serde(default)]
    pub system: SystemConfig,

    /// Cameras in configuration order
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,

    /// Derived feeds in configuration order
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Capacity of the feed event bus
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

/// Geometry and display parameters of one camera.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Camera identifier, also used as the camera's pseudo-feed name
    pub name: String,

    /// Whether this camera drives acquisition timing
    #[serde(default)]
    pub master: bool,

    /// Frame width in (binned) pixels
    pub x_pixels: u32,

    /// Frame height in (binned) pixels
    pub y_pixels: u32,

    #[serde(default = "default_bin")]
    pub x_bin: u32,

    #[serde(default = "default_bin")]
    pub y_bin: u32,

    /// Sensor start offset along x, in chip pixels
    #[serde(default = "default_sensor_start")]
    pub x_start: u32,

    /// Sensor start offset along y, in chip pixels
    #[serde(default = "default_sensor_start")]
    pub y_start: u32,

    /// Maximum chip extent along x; defaults to `x_pixels * x_bin`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_chip: Option<u32>,

    /// Maximum chip extent along y; defaults to `y_pixels * y_bin`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_chip: Option<u32>,

    #[serde(default)]
    pub flip_horizontal: bool,

    #[serde(default)]
    pub flip_vertical: bool,

    #[serde(default)]
    pub transpose: bool,

    #[serde(default = "default_min_intensity")]
    pub default_min: u32,

    #[serde(default = "default_max_intensity")]
    pub default_max: u32,

    #[serde(default = "default_intensity_ceiling")]
    pub max_intensity: u32,

    /// File name extension tag used when the camera output is saved
    #[serde(default)]
    pub extension: String,

    #[serde(default = "default_saved")]
    pub saved: bool,
}

/// One derived feed. Crop bounds are 1-based and inclusive, in camera pixels.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FeedConfig {
    pub name: String,

    /// Name of the camera this feed is derived from
    pub source: String,

    /// One of `average`, `interval` or `slice`
    pub feed_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_start: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_end: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_start: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_end: Option<u32>,

    /// Average feeds: number of frames per output frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_to_average: Option<u32>,

    /// Interval feeds: length of the repeating frame window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_length: Option<u64>,

    /// Interval feeds: comma separated positions within the window to capture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_frames: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colortable: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_min: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_intensity: Option<u32>,

    #[serde(default = "default_saved")]
    pub save: bool,
}

impl CamfeedConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Self::builder()?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(
                Environment::with_prefix("CAMFEED")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: CamfeedConfig = settings.try_deserialize()?;

        info!(
            "Configuration loaded: {} camera(s), {} feed(s)",
            config.cameras.len(),
            config.feeds.len()
        );
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Parse an in-memory TOML document
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let settings = Self::builder()?
            .add_source(File::from_str(document, FileFormat::Toml))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Render the configuration as a TOML document
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn builder() -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder().set_default(
            "system.event_bus_capacity",
            default_event_bus_capacity() as i64,
        )
    }

    /// Validate camera geometry and system settings. Feed definitions are
    /// validated when the feed registry is built.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for camera in &self.cameras {
            if !names.insert(camera.name.as_str()) {
                return Err(ConfigError::Message(format!(
                    "Camera '{}' is defined more than once",
                    camera.name
                )));
            }

            if camera.x_pixels == 0 || camera.y_pixels == 0 {
                return Err(ConfigError::Message(format!(
                    "Camera '{}' resolution must be greater than 0",
                    camera.name
                )));
            }

            if camera.x_bin == 0 || camera.y_bin == 0 {
                return Err(ConfigError::Message(format!(
                    "Camera '{}' bin factors must be greater than 0",
                    camera.name
                )));
            }
        }

        Ok(())
    }

    pub fn camera(&self, name: &str) -> Option<&CameraConfig> {
        self.cameras.iter().find(|c| c.name == name)
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

impl CameraConfig {
    /// Unbinned, untransformed camera with display defaults
    pub fn new<S: Into<String>>(name: S, x_pixels: u32, y_pixels: u32) -> Self {
        Self {
            name: name.into(),
            master: false,
            x_pixels,
            y_pixels,
            x_bin: default_bin(),
            y_bin: default_bin(),
            x_start: default_sensor_start(),
            y_start: default_sensor_start(),
            x_chip: None,
            y_chip: None,
            flip_horizontal: false,
            flip_vertical: false,
            transpose: false,
            default_min: default_min_intensity(),
            default_max: default_max_intensity(),
            max_intensity: default_intensity_ceiling(),
            extension: String::new(),
            saved: default_saved(),
        }
    }
}

impl FeedConfig {
    /// Full-frame feed of the given type with no policy parameters
    pub fn new<S: Into<String>>(name: S, source: S, feed_type: S) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            feed_type: feed_type.into(),
            x_start: None,
            x_end: None,
            y_start: None,
            y_end: None,
            frames_to_average: None,
            cycle_length: None,
            capture_frames: None,
            colortable: None,
            default_min: None,
            default_max: None,
            max_intensity: None,
            save: default_saved(),
        }
    }

    pub fn with_crop(mut self, x: (u32, u32), y: (u32, u32)) -> Self {
        self.x_start = Some(x.0);
        self.x_end = Some(x.1);
        self.y_start = Some(y.0);
        self.y_end = Some(y.1);
        self
    }
}

// Default value functions
fn default_event_bus_capacity() -> usize {
    64
}
fn default_bin() -> u32 {
    1
}
fn default_sensor_start() -> u32 {
    1
}
fn default_min_intensity() -> u32 {
    100
}
fn default_max_intensity() -> u32 {
    2000
}
fn default_intensity_ceiling() -> u32 {
    65535
}
fn default_saved() -> bool {
    true
}
