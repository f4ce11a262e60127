//! vxdigi command-line interface.
//!
//! Digitizes charge deposits on the ladders described by a JSON
//! configuration and writes the resulting hits as JSON.
#![allow(clippy::uninlined_format_args)]

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use thiserror::Error;
use vxdigi_algorithms::{Digitizer, EventOutput};
use vxdigi_core::{ChargeDeposit, LadderGeometry, SegmentDigiHit, SensorConfig};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] vxdigi_core::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn default_ticks() -> usize {
    100
}

/// Contents of the `--config` file.
#[derive(Debug, Clone, Deserialize)]
struct DigitizerConfig {
    /// Clock periods simulated per event.
    #[serde(default = "default_ticks")]
    ticks: usize,
    /// One entry per ladder.
    sensors: Vec<SensorConfig>,
}

impl DigitizerConfig {
    fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        if config.sensors.is_empty() {
            return Err(CliError::Config(format!(
                "{} declares no sensors",
                path.display()
            )));
        }
        if config.ticks == 0 {
            return Err(CliError::Config("ticks must be at least 1".to_string()));
        }
        Ok(config)
    }
}

/// Pixel vertex-detector digitization.
#[derive(Parser)]
#[command(name = "vxdigi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Digitize one event of charge deposits
    Simulate {
        /// Digitizer configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Charge deposits (JSON array)
        #[arg(short, long)]
        deposits: PathBuf,

        /// Output file for the hits (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the pixel layout of every configured ladder
    Geometry {
        /// Digitizer configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn load_deposits(path: &Path) -> Result<Vec<ChargeDeposit>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn simulate(config: &DigitizerConfig, deposits: &[ChargeDeposit]) -> Result<EventOutput> {
    let mut digitizer = Digitizer::new(&config.sensors, config.ticks)?;
    Ok(digitizer.process_event(deposits)?)
}

fn write_hits(hits: &[SegmentDigiHit], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, hits)?;
            writer.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, hits)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

fn describe(config: &SensorConfig) -> Result<String> {
    let geometry = LadderGeometry::from_config(config)?;
    Ok(format!(
        "Ladder {}/{}: {} x {} pixels ({:.3} x {:.3} mm pitch), {} x {} sensors of {} x {} pixels",
        geometry.layer,
        geometry.ladder,
        geometry.rows,
        geometry.columns,
        geometry.pixel_size_x,
        geometry.pixel_size_y,
        geometry.x_segments,
        geometry.y_segments,
        geometry.sensor_rows,
        geometry.sensor_columns
    ))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Simulate {
            config,
            deposits,
            output,
        } => {
            let config = DigitizerConfig::load(&config)?;
            let deposits = load_deposits(&deposits)?;
            log::info!(
                "{} ladders, {} ticks, {} deposits",
                config.sensors.len(),
                config.ticks,
                deposits.len()
            );

            let start = Instant::now();
            let event = simulate(&config, &deposits)?;
            let elapsed = start.elapsed();

            write_hits(&event.hits, output.as_deref())?;

            let stats = event.stats;
            eprintln!("Digitized in {:.2}s", elapsed.as_secs_f64());
            eprintln!("Deposits: {} ({} unrouted)", stats.deposits, stats.unrouted);
            eprintln!(
                "Ignored: {} out of bounds, {} out of window",
                stats.out_of_bounds, stats.out_of_window
            );
            eprintln!("Clusters: {}", stats.clusters);
            eprintln!("Hits: {}", stats.hits);
        }

        Commands::Geometry { config } => {
            let config = DigitizerConfig::load(&config)?;
            println!("Ticks per event: {}", config.ticks);
            for sensor in &config.sensors {
                println!("{}", describe(sensor)?);
            }
        }
    }

    Ok(())
}
