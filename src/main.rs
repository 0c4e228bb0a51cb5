use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, warn};

use tdoa_locator::{
    unix_time_ms, AccuracyValidator, BeaconLocator, DetectionParser, DetectionRepository, GeographicPoint,
    InMemoryDetectionRepository, LocalizationEngine, LocatorConfig,
};

/// TDoA beacon locator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(long, short, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, default_value_t = false, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Locate beacons from a feed of `receiver_id:lat:lon:beacon_id:time_slot:time_of_arrival` lines
    Locate {
        /// Detection feed, one message per line
        #[arg(long, short, value_name = "FILE")]
        input: PathBuf,

        /// Only locate this beacon (all beacons in the feed otherwise)
        #[arg(long, short, value_name = "ID")]
        beacon: Option<String>,
    },
    /// Estimate accuracy for a receiver layout under Gaussian timing noise
    Simulate {
        /// Receiver position as LAT,LON (repeat at least three times; the first is the reference)
        #[arg(long = "receiver", value_name = "LAT,LON", value_parser = parse_lat_lon, required = true)]
        receivers: Vec<GeographicPoint>,

        /// True source position as LAT,LON
        #[arg(long, value_name = "LAT,LON", value_parser = parse_lat_lon)]
        source: GeographicPoint,

        /// Timing noise standard deviation in nanoseconds
        #[arg(long, default_value_t = 1.0)]
        noise_ns: f64,

        #[arg(long, default_value_t = 100)]
        trials: usize,

        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => LocatorConfig::load_from_file(path)?,
        None => LocatorConfig::default(),
    };
    info!(
        signal_speed = config.signal_speed_m_s,
        min_receivers = config.min_receivers,
        max_iterations = config.solver.max_iterations,
        "configuration loaded"
    );

    match cli.command {
        Command::Locate { input, beacon } => run_locate(&config, &input, beacon.as_deref()),
        Command::Simulate { receivers, source, noise_ns, trials, seed } => {
            run_simulate(&config, &receivers, &source, noise_ns, trials, seed)
        }
    }
}

fn run_locate(config: &LocatorConfig, input: &Path, beacon: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let feed = fs::read_to_string(input)?;
    let (records, failures) = DetectionParser::new().parse_lines(&feed, unix_time_ms());
    if !failures.is_empty() {
        warn!("{} malformed detection(s) skipped", failures.len());
    }

    let mut repository = InMemoryDetectionRepository::new();
    for record in records {
        repository.save(record);
    }
    info!("{} detections loaded from {}", repository.len(), input.display());

    let beacons = match beacon {
        Some(id) => vec![id.to_string()],
        None => repository.beacon_ids(),
    };

    let locator = BeaconLocator::new(repository, config);
    let mut located = 0;
    for beacon_id in &beacons {
        match locator.locate(beacon_id) {
            Ok(report) => {
                println!("{}", report.to_json()?);
                located += 1;
            }
            Err(err) => error!(beacon = %beacon_id, "localization failed: {}", err),
        }
    }

    info!("{} of {} beacon(s) located", located, beacons.len());
    Ok(())
}

fn run_simulate(
    config: &LocatorConfig,
    receivers: &[GeographicPoint],
    source: &GeographicPoint,
    noise_ns: f64,
    trials: usize,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = LocalizationEngine::new(config.engine_config());
    let validator = AccuracyValidator::new(&engine, config.signal_speed_m_s);
    let mut rng = StdRng::seed_from_u64(seed);

    let statistics = validator
        .simulate(receivers, source, noise_ns * 1e-9, trials, &mut rng)
        .ok_or("simulation produced no estimates")?;
    println!("{}", serde_json::to_string_pretty(&statistics)?);
    Ok(())
}

fn parse_lat_lon(value: &str) -> Result<GeographicPoint, String> {
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got `{value}`"))?;
    let lat: f64 = lat.trim().parse().map_err(|_| format!("invalid latitude `{lat}`"))?;
    let lon: f64 = lon.trim().parse().map_err(|_| format!("invalid longitude `{lon}`"))?;
    let point = GeographicPoint::new(lat, lon);
    if point.is_valid() {
        Ok(point)
    } else {
        Err(format!("coordinate out of range: {value}"))
    }
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr);

    if verbose {
        subscriber.with_max_level(tracing::Level::DEBUG).init();
    } else {
        subscriber.with_max_level(tracing::Level::INFO).init();
    }
}
