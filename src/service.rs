//! Message-driven front-end around the feed registry.
//!
//! Tracks which cameras are running and which is the master, rebuilds the
//! registry when new parameters arrive, resets feeds at film boundaries and
//! publishes metadata and derived frames on the event bus.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::{CamfeedConfig, FeedConfig};
use crate::error::Result;
use crate::events::{EventBus, EventReceiver, FeedEvent};
use crate::feed::{FeedInfo, FeedInfoMap};
use crate::frame::{DerivedFrame, RawFrame};
use crate::registry::FeedRegistry;

/// Control messages understood by the feed service
#[derive(Debug, Clone)]
pub enum ControlMessage {
    /// A camera reports its identity at startup
    CameraConfiguration { camera: String, master: bool },
    /// A new parameter set was selected; feeds are rebuilt from it
    NewParameters(Box<CamfeedConfig>),
    /// The new parameter set is active; metadata is rebuilt and published
    UpdatedParameters,
    /// Configuration finished; publish the current metadata
    Configure,
    GetFeedInformation { feed: String },
    StartCamera,
    StopCamera,
    StartFilm,
    StopFilm,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlResponse {
    None,
    FeedInformation { feed: String, info: Option<FeedInfo> },
    /// Feed definitions in use during the film that just stopped
    FilmParameters(Vec<FeedConfig>),
}

pub struct FeedService {
    bus: EventBus,
    registry: Option<FeedRegistry>,
    masters: HashMap<String, bool>,
    feeds_info: FeedInfoMap,
    active: bool,
}

impl FeedService {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            registry: None,
            masters: HashMap::new(),
            feeds_info: FeedInfoMap::new(),
            active: false,
        }
    }

    pub fn with_capacity(event_bus_capacity: usize) -> Self {
        Self::new(EventBus::new(event_bus_capacity))
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.bus.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn registry(&self) -> Option<&FeedRegistry> {
        self.registry.as_ref()
    }

    pub fn feeds_info(&self) -> &FeedInfoMap {
        &self.feeds_info
    }

    pub fn handle(&mut self, message: ControlMessage) -> Result<ControlResponse> {
        match message {
            ControlMessage::CameraConfiguration { camera, master } => {
                debug!("Camera '{}' configured (master: {})", camera, master);
                self.masters.insert(camera, master);
            }
            ControlMessage::NewParameters(config) => {
                // A failed build keeps the previous registry.
                let registry = FeedRegistry::build(&config)?;
                info!(
                    "New parameters applied, {} feed(s) configured",
                    registry.processors().len()
                );
                self.registry = Some(registry);
            }
            ControlMessage::UpdatedParameters => {
                self.feeds_info = match &self.registry {
                    Some(registry) => registry.metadata_with_masters(
                        self.masters.iter().map(|(name, master)| (name.as_str(), *master)),
                    ),
                    None => FeedInfoMap::new(),
                };
                self.broadcast_feed_info();
            }
            ControlMessage::Configure => self.broadcast_feed_info(),
            ControlMessage::GetFeedInformation { feed } => {
                let info = self.feeds_info.get(&feed).cloned();
                return Ok(ControlResponse::FeedInformation { feed, info });
            }
            ControlMessage::StartCamera => self.active = true,
            ControlMessage::StopCamera => self.active = false,
            ControlMessage::StartFilm => {
                if let Some(registry) = self.feeding_registry() {
                    info!("Film started, resetting feeds");
                    registry.reset_all();
                }
            }
            ControlMessage::StopFilm => {
                if let Some(registry) = self.feeding_registry() {
                    info!("Film stopped, resetting feeds");
                    let parameters = registry.feed_configs().to_vec();
                    registry.reset_all();
                    return Ok(ControlResponse::FilmParameters(parameters));
                }
            }
        }

        Ok(ControlResponse::None)
    }

    /// Run a camera frame through the feeds and publish what they produce.
    /// Frames are dropped while the cameras are stopped.
    pub fn new_frame(&mut self, frame: &RawFrame) -> Result<Vec<DerivedFrame>> {
        if !self.active {
            warn!(
                "Dropping frame {} from '{}': cameras are not running",
                frame.frame_number, frame.camera
            );
            return Ok(Vec::new());
        }

        let derived = match self.feeding_registry() {
            Some(registry) => registry.on_frame(frame)?,
            None => return Ok(Vec::new()),
        };

        for frame in &derived {
            if let Err(e) = self.bus.publish(FeedEvent::NewFrame {
                frame: frame.clone(),
            }) {
                debug!("Derived frame not delivered: {}", e);
            }
        }

        Ok(derived)
    }

    /// The registry, when it has any feeds to drive.
    fn feeding_registry(&mut self) -> Option<&mut FeedRegistry> {
        self.registry.as_mut().filter(|registry| registry.has_feeds())
    }

    fn broadcast_feed_info(&self) {
        if let Err(e) = self.bus.publish(FeedEvent::FeedsInformation {
            feeds: self.feeds_info.clone(),
        }) {
            debug!("Feeds information not delivered: {}", e);
        }
    }
}
