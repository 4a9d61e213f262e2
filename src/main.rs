//! Brewcore — host entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Relay<SysfsPin>    W1Thermometer    FileStore    LogNotifier  │
//! │  (ActuatorControl)  (TempReader)     (Stores)     (Notifier)   │
//! │  Relay<SimPin>      SimKettle                                  │
//! │  JsonConfigFile     HttpProbe                                  │
//! │  (ConfigPort)       (HealthProbe)                              │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │         BrewController · BrewingService                │    │
//! │  │  FSM · AdditionSchedule · Thermostat · Gateway         │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  TemperatureMonitor thread · SecurityWatchdog thread · Beeper  │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};

use brewcore::adapters::config_file::JsonConfigFile;
use brewcore::adapters::file_store::FileStore;
use brewcore::adapters::log_sink::LogNotifier;
use brewcore::adapters::probe::HttpProbe;
use brewcore::app::commands::BrewCommand;
use brewcore::app::controller::BrewController;
use brewcore::app::gateway::{ConfirmationGateway, RetryPolicy};
use brewcore::app::ports::{ConfigPort, LogStore, RecipeStore, SharedNotifier};
use brewcore::app::service::BrewingDeps;
use brewcore::config::SystemConfig;
use brewcore::drivers::beeper::Beeper;
use brewcore::drivers::relay::Relay;
use brewcore::drivers::sim_pin::SimPin;
use brewcore::drivers::sysfs_pin::SysfsPin;
use brewcore::drivers::task::spawn_worker;
use brewcore::drivers::{Actuator, Actuators};
use brewcore::model::Recipe;
use brewcore::safety::{AbortSignal, SecurityWatchdog, WatchdogSettings};
use brewcore::sensors::TemperatureMonitor;
use brewcore::sensors::thermometer::{SimKettle, W1Thermometer};
use brewcore::validate::check_recipe;

#[derive(Parser)]
#[command(name = "brewcore")]
#[command(author, version, about = "Brewing process orchestrator")]
struct Cli {
    /// Configuration file (defaults to <data_dir>/config.json)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Brew a stored recipe
    Run {
        /// Recipe id
        recipe: String,

        /// Use simulated relays and a simulated kettle instead of GPIO and
        /// the 1-Wire thermometer
        #[arg(long)]
        simulate: bool,

        /// Do not start the security watchdog
        #[arg(long)]
        no_watchdog: bool,
    },

    /// List stored recipes
    ListRecipes,

    /// List stored brewing logs
    ListLogs,

    /// Print one brewing log
    ShowLog {
        /// Log id
        id: i64,
    },

    /// Validate a recipe JSON file and store it
    Import {
        /// Path to the recipe file
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    brewcore::logging::init(cli.verbose).context("Failed to install logger")?;

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| SystemConfig::default().data_dir.join("config.json"));
    let config = JsonConfigFile::new(&config_path)
        .load()
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let store = Arc::new(FileStore::from_config(&config).context("Failed to open storage")?);

    match cli.command {
        Commands::Run {
            recipe,
            simulate,
            no_watchdog,
        } => run(&config, store, &recipe, simulate, no_watchdog),
        Commands::ListRecipes => {
            for s in store.recipe_summaries()? {
                println!("{:<24} {}  {}", s.id, s.date.format("%Y-%m-%d"), s.title);
            }
            Ok(())
        }
        Commands::ListLogs => {
            for s in store.log_summaries()? {
                println!("{:>4} {}  {}", s.id, s.date.format("%Y-%m-%d %H:%M"), s.title);
            }
            Ok(())
        }
        Commands::ShowLog { id } => {
            let log = store.get_log_by_id(id)?;
            println!("{} ({})", log.recipe().name, log.summary().description);
            for m in log.messages() {
                println!("{}  {:?}  {}", m.time.format("%H:%M:%S"), m.kind, m.text);
            }
            Ok(())
        }
        Commands::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let recipe: Recipe = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            check_recipe(&recipe)?;
            let id = store.save_recipe(&recipe)?;
            println!("Stored as '{}'", id);
            Ok(())
        }
    }
}

// ── Wiring ────────────────────────────────────────────────────

/// A relay on a sysfs GPIO line, or on a simulated pin when `simulate`.
fn relay(
    config: &SystemConfig,
    label: &'static str,
    gpio: u8,
    active_low: bool,
    simulate: bool,
) -> Result<Actuator> {
    let failed = || format!("Failed to initialise {} relay", label);
    if simulate {
        info!("{}: simulated pin", label);
        let relay = Relay::new(label, SimPin::new(), active_low)
            .map_err(brewcore::Error::from)
            .with_context(failed)?;
        return Ok(Actuator::new(label, relay));
    }

    info!("{}: GPIO {} (active {})", label, gpio, if active_low { "low" } else { "high" });
    let pin = SysfsPin::open(&config.gpio_sysfs_dir, gpio).with_context(failed)?;
    let relay = Relay::new(label, pin, active_low)
        .map_err(brewcore::Error::from)
        .with_context(failed)?;
    Ok(Actuator::new(label, relay))
}

fn run(
    config: &SystemConfig,
    store: Arc<FileStore>,
    recipe_id: &str,
    simulate: bool,
    no_watchdog: bool,
) -> Result<()> {
    info!("Brewcore v{}", env!("CARGO_PKG_VERSION"));

    let actuators = Actuators {
        heater: relay(config, "heater", config.heater_pin, config.heater_active_low, simulate)?,
        stirrer: relay(config, "stirrer", config.stirrer_pin, false, simulate)?,
        signal: relay(config, "signal", config.signal_pin, false, simulate)?,
    };
    let abort = AbortSignal::new();

    let monitor = if simulate {
        info!("Thermometer: simulated kettle");
        let kettle = SimKettle::new(actuators.heater.clone(), 20.0).with_rates(0.5, 0.02);
        TemperatureMonitor::new(kettle)
    } else {
        // Real relays never run against a simulated temperature.
        let thermometer = W1Thermometer::discover(&config.thermometer_device_dir)
            .context("No 1-Wire thermometer found (use --simulate to brew without hardware)")?;
        info!("Thermometer: {}", thermometer.path().display());
        TemperatureMonitor::new(thermometer)
    };
    let monitor = Arc::new(monitor);
    let _poller = monitor
        .spawn(Duration::from_millis(u64::from(config.temperature_poll_interval_ms)))
        .context("Failed to start temperature monitor")?;

    if no_watchdog {
        warn!("Watchdog: disabled from the command line");
    } else {
        let watchdog = SecurityWatchdog::new(
            WatchdogSettings::from_config(config),
            actuators.clone(),
            abort.clone(),
            HttpProbe::from_config(config),
        );
        watchdog.spawn().context("Failed to start watchdog")?;
    }

    let beeper = Beeper::spawn(
        actuators.signal.clone(),
        abort.clone(),
        config.beep_queue_capacity,
        Beeper::DEFAULT_UNIT,
    )
    .context("Failed to start beeper")?;

    let notifier: SharedNotifier = Arc::new(Mutex::new(LogNotifier::new()));
    let gateway = Arc::new(
        ConfirmationGateway::new(Arc::clone(&notifier), RetryPolicy::from_config(config))
            .context("Failed to start confirmation gateway")?,
    );

    let deps = BrewingDeps {
        actuators,
        monitor,
        gateway,
        notifier,
        logs: store.clone(),
        abort,
        beeper: Some(Arc::new(beeper)),
    };
    let controller = BrewController::new(config.clone(), deps, store);
    let log_id = controller
        .start_recipe(recipe_id)
        .with_context(|| format!("Failed to start recipe '{}'", recipe_id))?;
    info!("Brewing log {} started; commands: confirm | iodine <secs> | cancel | status", log_id);

    let (tx, rx) = mpsc::channel::<String>();
    spawn_worker("stdin", move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    })?;

    while controller.is_running() {
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(line) => {
                if let Err(e) = handle_line(&controller, line.trim()) {
                    warn!("{:#}", e);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(Duration::from_millis(500));
            }
        }
    }

    let state = controller.status().map(|s| s.state.state);
    info!("Brewing finished: {:?}", state);
    if let Some(path) = controller.saved_log() {
        println!("Log saved to {}", path.display());
    }
    Ok(())
}

fn handle_line(controller: &BrewController, line: &str) -> Result<()> {
    let mut words = line.split_whitespace();
    match words.next() {
        None => Ok(()),
        Some("confirm") => {
            let status = controller.status().context("No brewing process")?;
            controller.handle_command(BrewCommand::ConfirmStep {
                state: status.state,
            })?;
            Ok(())
        }
        Some("iodine") => {
            let duration: i64 = words
                .next()
                .context("usage: iodine <secs>")?
                .parse()
                .context("iodine duration must be a whole number of seconds")?;
            controller.handle_command(BrewCommand::ConfirmIodine { duration })?;
            Ok(())
        }
        Some("cancel") => {
            controller.handle_command(BrewCommand::Cancel)?;
            Ok(())
        }
        Some("status") => {
            let status = controller.status().context("No brewing process")?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Some(other) => bail!("unknown command '{}'", other),
    }
}
