use anyhow::{bail, Context, Result};
use azrefresh::azure::ArmClient;
use azrefresh::config::Config;
use azrefresh::inventory::{snapshot, InventoryStore, MemoryQueue, MemoryStore, WorkQueue};
use azrefresh::worker::Worker;
use azrefresh::{Refresher, Target, VERSION};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Targeted inventory refresh for Azure Resource Manager
#[derive(Parser, Debug)]
#[command(name = "azrefresh", version = VERSION, about, long_about = None)]
struct Args {
    /// Configuration file (.json, .yaml or .yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh targets of one manager against the live ARM endpoint
    Refresh {
        /// Manager name
        #[arg(short, long)]
        manager: String,

        /// Target as ASSOCIATION=NATURAL_KEY (e.g. vms=sub\rg\microsoft.compute/virtualmachines\vm1)
        #[arg(short, long = "target", required = true)]
        targets: Vec<String>,
    },
    /// Process queued follow-up refreshes
    Drain {
        /// Stop after this many items
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the effective region table
    Regions,
    /// Register a cloud manager and its network manager
    AddManager {
        #[arg(short, long)]
        name: String,

        /// Subscription id (defaults to the configured one)
        #[arg(short, long)]
        subscription: Option<String>,

        #[arg(short, long)]
        region: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("azrefresh started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("azrefresh").join("azrefresh.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".azrefresh").join("azrefresh.log");
    }
    PathBuf::from("azrefresh.log")
}

fn parse_target(manager: &azrefresh::inventory::Manager, raw: &str) -> Result<Target> {
    let (association, key) = raw
        .split_once('=')
        .with_context(|| format!("Target '{}' is not ASSOCIATION=KEY", raw))?;
    Ok(Target::new(manager.id, association.trim(), key.trim()))
}

fn build_refresher(config: &Config, store: Arc<MemoryStore>, queue: Arc<MemoryQueue>) -> Result<Refresher> {
    let token = config
        .access_token
        .as_deref()
        .with_context(|| format!("No access token configured. Set {}", azrefresh::config::ENV_ACCESS_TOKEN))?;
    let client = ArmClient::new(&config.arm_endpoint, token, config.request_timeout())
        .context("Failed to create ARM client")?;
    Ok(Refresher::new(
        Arc::new(client),
        store,
        queue,
        config.refresh_settings(),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let config = Config::load(args.config.as_deref())?;

    if let Command::Regions = args.command {
        for region in config.regions.all() {
            println!("{:<24} {}", region.name, region.description);
        }
        return Ok(());
    }

    let store_path = config.effective_store_path();
    let (store, queue) = snapshot::load(&store_path)
        .with_context(|| format!("Failed to load inventory snapshot {}", store_path.display()))?;
    let store = Arc::new(store);
    let queue = Arc::new(queue);

    let result = run(&args.command, &config, store.clone(), queue.clone()).await;

    snapshot::save(&store_path, &store, &queue)
        .with_context(|| format!("Failed to save inventory snapshot {}", store_path.display()))?;
    result
}

async fn run(command: &Command, config: &Config, store: Arc<MemoryStore>, queue: Arc<MemoryQueue>) -> Result<()> {
    match command {
        Command::AddManager {
            name,
            subscription,
            region,
        } => {
            if config.regions.find_by_name(region).is_none() {
                bail!("Unknown or disabled region '{}'", region);
            }
            let subscription = subscription
                .clone()
                .or_else(|| config.subscription_id.clone())
                .with_context(|| {
                    format!("No subscription given. Use --subscription or set {}", azrefresh::config::ENV_SUBSCRIPTION)
                })?;
            if store.manager_by_name(name)?.is_some() {
                bail!("Manager '{}' already exists", name);
            }
            let pair = store.create_manager_pair(name, &subscription, region)?;
            println!(
                "Registered manager '{}' (cloud {}, network {})",
                name, pair.cloud.id, pair.network.id
            );
            Ok(())
        }
        Command::Refresh { manager, targets } => {
            let manager = store
                .manager_by_name(manager)?
                .with_context(|| format!("Unknown manager '{}'", manager))?;
            let targets = targets
                .iter()
                .map(|raw| parse_target(&manager, raw))
                .collect::<Result<Vec<_>>>()?;

            let refresher = build_refresher(config, store, queue)?;
            let report = refresher.refresh_many(&targets).await;

            for rejected in &report.rejected {
                println!("rejected {}: {}", rejected.target, rejected.error);
            }
            for warning in report.warnings() {
                println!("warning: {}", warning);
            }
            for outcome in &report.managers {
                match &outcome.result {
                    Ok(r) => println!(
                        "manager {}: {} fetched, {} created, {} updated, {} removed, {} follow-ups queued",
                        outcome.manager,
                        r.fetched,
                        r.persisted.created,
                        r.persisted.updated,
                        r.persisted.removed,
                        r.followups
                    ),
                    Err(e) => println!("manager {}: failed: {}", outcome.manager, e),
                }
            }
            if !report.is_success() {
                bail!("Refresh failed");
            }
            Ok(())
        }
        Command::Drain { limit } => {
            let refresher = build_refresher(config, store, queue.clone())?;
            let worker = Worker::new(&refresher, config.queue_max_attempts);
            let report = worker.drain(*limit).await?;
            println!(
                "{} processed, {} succeeded, {} requeued, {} dropped, {} remaining",
                report.processed,
                report.succeeded,
                report.requeued,
                report.dropped,
                queue.len()?
            );
            Ok(())
        }
        Command::Regions => Ok(()),
    }
}
