use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::collections::BTreeMap;
use tracing::{error, info};

use camfeed::config::EXAMPLE_CONFIG;
use camfeed::{CamfeedConfig, ControlMessage, FeedRegistry, FeedService, RawFrame};

#[derive(Parser, Debug)]
#[command(name = "camfeed")]
#[command(about = "Derive cropped, averaged and interval-sampled feeds from camera frame streams")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "camfeed.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Validate configuration and exit
    #[arg(long, help = "Validate the configuration file, including every feed, and exit")]
    validate_config: bool,

    /// Print example configuration and exit
    #[arg(long, help = "Print an example configuration in TOML format and exit")]
    print_config: bool,

    /// Print feed metadata and exit
    #[arg(long, help = "Print the metadata of every camera and feed as JSON and exit")]
    print_feeds: bool,

    /// Run synthetic frames through the feeds
    #[arg(long, value_name = "FRAMES", help = "Feed FRAMES synthetic frames per camera through the feeds")]
    simulate: Option<u64>,
}

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl Args {
    fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", EXAMPLE_CONFIG);
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting camfeed v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match CamfeedConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    let registry = match FeedRegistry::build(&config) {
        Ok(registry) => registry,
        Err(e) => {
            error!("Feed configuration rejected: {}", e);
            eprintln!("✗ Feed configuration rejected: {}", e);
            std::process::exit(1);
        }
    };

    if args.validate_config {
        println!(
            "✓ Configuration is valid ({} camera(s), {} feed(s))",
            registry.cameras().len(),
            registry.processors().len()
        );
        return Ok(());
    }

    if args.print_feeds {
        println!("{}", serde_json::to_string_pretty(registry.metadata_snapshot())?);
        return Ok(());
    }

    if let Some(frames) = args.simulate {
        let counts = simulate(config, frames)?;
        for (feed, count) in &counts {
            println!("{:<32} {}", feed, count);
        }
        return Ok(());
    }

    println!(
        "{} camera(s), {} feed(s) configured; use --print-feeds or --simulate",
        registry.cameras().len(),
        registry.processors().len()
    );
    Ok(())
}

/// Film `frames` synthetic frames on every camera and count derived frames per feed.
fn simulate(config: CamfeedConfig, frames: u64) -> Result<BTreeMap<String, usize>> {
    let mut service = FeedService::with_capacity(config.system.event_bus_capacity);
    let cameras = config.cameras.clone();

    for camera in &cameras {
        service.handle(ControlMessage::CameraConfiguration {
            camera: camera.name.clone(),
            master: camera.master,
        })?;
    }
    service.handle(ControlMessage::NewParameters(Box::new(config)))?;
    service.handle(ControlMessage::UpdatedParameters)?;
    service.handle(ControlMessage::StartCamera)?;
    service.handle(ControlMessage::StartFilm)?;

    let mut counts: BTreeMap<String, usize> = service
        .feeds_info()
        .iter()
        .filter(|(_, info)| !info.is_camera)
        .map(|(name, _)| (name.clone(), 0))
        .collect();

    for number in 0..frames {
        for camera in &cameras {
            let (width, height) = (camera.x_pixels, camera.y_pixels);
            let data = (0..height)
                .flat_map(|y| (0..width).map(move |x| ((x + y) as u64 + number) as u16 & 0x0fff))
                .collect();
            let frame = RawFrame::new(camera.name.clone(), number, width, height, data);

            for derived in service.new_frame(&frame)? {
                *counts.entry(derived.feed).or_insert(0) += 1;
            }
        }
    }

    service.handle(ControlMessage::StopFilm)?;
    service.handle(ControlMessage::StopCamera)?;
    info!("Simulated {} frame(s) per camera", frames);

    Ok(counts)
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // RUST_LOG wins over the command line flags
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("camfeed={}", args.log_level())));

    let locations = args.debug;
    let fmt_layer = match args.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(false)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_file(locations)
            .with_line_number(locations)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}
