mod bus;
mod config;
mod logging;
mod monitor;
mod store;

use std::fs;
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use tracing::{error, info};

use bus::DbusValueBus;
use config::{LogLevel, UserConfig};
use logging::LogMode;
use monitor::{BatteryMonitor, MonitorError, TickOutcome};
use store::IndexStore;

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the battery monitor (default)
    Run {
        /// Stay in the foreground (don't daemonize)
        #[arg(short, long)]
        foreground: bool,
    },

    /// Ask a running monitor to checkpoint its totals and exit
    Stop,

    /// Print the persisted energy totals
    Status,

    /// Show configuration
    Config {
        /// Print config file path
        #[arg(long)]
        path: bool,

        /// Reset config to defaults
        #[arg(long)]
        reset: bool,
    },
}

/// Battery charge/discharge energy accumulator for Victron Venus OS
#[derive(Debug, Parser)]
#[command(name = "coulomb", version, verbatim_doc_comment)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = UserConfig::load();
    let log_level_override = cli.log_level.as_deref().map(LogLevel::from_str);

    match cli.command.unwrap_or(Commands::Run { foreground: false }) {
        Commands::Run { foreground } => run_monitor(config, foreground, log_level_override),
        Commands::Stop => {
            let _guard = logging::init(config.log_level, LogMode::Stderr, log_level_override);
            run_stop()
        }
        Commands::Status => {
            let _guard = logging::init(config.log_level, LogMode::Stderr, log_level_override);
            run_status(&config)
        }
        Commands::Config { path, reset } => {
            let _guard = logging::init(config.log_level, LogMode::Stderr, log_level_override);
            run_config(&config, path, reset)
        }
    }
}

fn run_monitor(
    config: UserConfig,
    foreground: bool,
    log_level_override: Option<LogLevel>,
) -> Result<()> {
    fs::create_dir_all(config::runtime_dir())?;

    if !foreground {
        daemonize::Daemonize::new()
            .working_directory(config::runtime_dir())
            .start()
            .map_err(|e| eyre!("failed to daemonize: {}", e))?;
    }

    let mode = if foreground {
        LogMode::Both
    } else {
        LogMode::File
    };
    let guard = logging::init(config.log_level, mode, log_level_override);
    // Keep the non-blocking log writer alive for the process lifetime.
    std::mem::forget(guard);

    info!(version = env!("CARGO_PKG_VERSION"), "coulomb starting");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    if let Err(e) = runtime.block_on(run_monitor_loop(config)) {
        error!(error = %e, "monitor terminated with error");
        return Err(e.into());
    }

    Ok(())
}

async fn run_monitor_loop(config: UserConfig) -> std::result::Result<(), MonitorError> {
    let bus = DbusValueBus::connect(&config.bus.service).await?;
    let store = IndexStore::resolve(&config.storage.removable_dir)?;
    info!(dir = %store.directory().display(), "energy index directory resolved");

    let mut monitor =
        BatteryMonitor::init(&bus, store, config::sentinel_path(), Local::now()).await?;

    let mut ticker = tokio::time::interval(Duration::from_millis(config.update_interval_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if monitor.tick(Local::now()).await == TickOutcome::Shutdown {
                    info!("terminated on request");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                // Only the sentinel path guarantees a save; an interrupt
                // exits with whatever the last checkpoint holds.
                info!("interrupted, exiting without checkpoint");
                break;
            }
        }
    }

    let state = monitor.state();
    info!(
        charged_kwh = state.charged_energy,
        discharged_kwh = state.discharged_energy,
        "monitor stopped"
    );

    Ok(())
}

fn run_stop() -> Result<()> {
    let sentinel = config::sentinel_path();
    fs::create_dir_all(config::runtime_dir())?;
    fs::File::create(&sentinel)?;

    println!("Stop requested; the monitor checkpoints and exits on its next tick.");
    println!("Sentinel: {}", sentinel.display());

    Ok(())
}

fn run_status(config: &UserConfig) -> Result<()> {
    let store = IndexStore::resolve(&config.storage.removable_dir)?;

    println!("Index directory: {}", store.directory().display());
    print_index(&store, "Charged energy", store::CHARGED_INDEX)?;
    print_index(&store, "Discharged energy", store::DISCHARGED_INDEX)?;

    Ok(())
}

fn print_index(store: &IndexStore, label: &str, key: &str) -> Result<()> {
    match store.load(key)? {
        Some(value) => println!("{:<18} {:.3} kWh", format!("{}:", label), value),
        None => println!("{:<18} (no index yet)", format!("{}:", label)),
    }
    Ok(())
}

fn run_config(config: &UserConfig, path: bool, reset: bool) -> Result<()> {
    let config_file = config::config_path();

    if path {
        println!("{}", config_file.display());
        return Ok(());
    }

    if reset {
        let defaults = UserConfig::default();
        defaults.save()?;
        println!("Config reset to defaults at: {}", config_file.display());
        return Ok(());
    }

    println!("Config file: {}", config_file.display());
    println!();
    println!("{}", toml::to_string_pretty(config)?);

    Ok(())
}
