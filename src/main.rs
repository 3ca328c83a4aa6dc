// Main entrypoint for init-database.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use init_database::config::{Config, ConfigTrait, Overrides};
use init_database::engine::local::LocalFactory;
use init_database::engine::EngineFactory;
use init_database::initializer::{BootstrapOutcome, Initializer};
use init_database::logging::{configure_logger, LogLevel};
use init_database::observer::{HttpObserver, LogObserver, Observer};
use init_database::shutdown::GracefulShutdown;

const CONFIG_PATH: &str = "cfg/init-database.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/init-database.cfg.local.yaml";
const LOG_OBSERVER_ID: &str = "init-database-log";
const FORWARD_OBSERVER_ID: &str = "init-database-forward";

/// Initializes a Senzing data store with a default configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,

    /// URL of the database to initialize
    #[arg(long, env = "SENZING_TOOLS_DATABASE_URL")]
    database_url: Option<String>,

    /// Data sources added to a new configuration, comma separated
    #[arg(long, env = "SENZING_TOOLS_DATASOURCES", value_delimiter = ',')]
    datasources: Option<Vec<String>>,

    /// Engine configuration JSON; wins over --database-url
    #[arg(long, env = "SENZING_TOOLS_ENGINE_CONFIGURATION_JSON")]
    engine_configuration_json: Option<String>,

    /// Verbose logging level passed to the engine
    #[arg(long, env = "SENZING_TOOLS_ENGINE_LOG_LEVEL")]
    engine_log_level: Option<i64>,

    /// Module name passed to the engine
    #[arg(long, env = "SENZING_TOOLS_ENGINE_MODULE_NAME")]
    engine_module_name: Option<String>,

    /// TRACE, DEBUG, INFO, WARN, ERROR, FATAL or PANIC
    #[arg(long, env = "SENZING_TOOLS_LOG_LEVEL")]
    log_level: Option<LogLevel>,

    /// Origin stamped on observer notifications
    #[arg(long, env = "SENZING_TOOLS_OBSERVER_ORIGIN")]
    observer_origin: Option<String>,

    /// HTTP endpoint that receives observer notifications as JSON
    #[arg(long, env = "SENZING_TOOLS_OBSERVER_URL")]
    observer_url: Option<String>,

    /// File backing the configuration store; in memory when unset
    #[arg(long, env = "SENZING_TOOLS_STORE_PATH")]
    store_path: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            database_url: self.database_url.clone(),
            datasources: self.datasources.clone(),
            engine_configuration_json: self.engine_configuration_json.clone(),
            engine_log_level: self.engine_log_level,
            engine_module_name: self.engine_module_name.clone(),
            log_level: self.log_level,
            observer_origin: self.observer_origin.clone(),
            observer_url: self.observer_url.clone(),
            store_path: self.store_path.clone(),
        }
    }
}

/// Loads the configuration struct from YAML file.
/// Tries local config first, then the default one. Without either, every
/// setting has to come from flags or the environment.
fn load_cfg(path: Option<&PathBuf>) -> Result<(Config, Option<PathBuf>)> {
    if let Some(custom_path) = path {
        let cfg = Config::load(custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path))?;
        return Ok((cfg, Some(custom_path.clone())));
    }

    for candidate in [CONFIG_PATH_LOCAL, CONFIG_PATH] {
        let candidate = PathBuf::from(candidate);
        if candidate.exists() {
            let cfg = Config::load(&candidate)
                .with_context(|| format!("failed to load config from {:?}", candidate))?;
            return Ok((cfg, Some(candidate)));
        }
    }

    Ok((Config::empty(), None))
}

fn main() -> Result<()> {
    let args = Args::parse();

    tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let (mut cfg, cfg_path) = load_cfg(args.cfg.as_ref())?;
    cfg.apply(args.overrides());

    let log_level = cfg.log_level().unwrap_or_default();
    let level_control = configure_logger(log_level, cfg.is_prod());

    match &cfg_path {
        Some(path) => info!(
            component = "config",
            event = "load_success",
            path = ?path,
            "config loaded"
        ),
        None => info!(
            component = "config",
            event = "load_skipped",
            "no config file found, using flags and environment"
        ),
    }

    let engine_config = cfg.engine_configuration_json()?;

    let factory: Arc<dyn EngineFactory> = match cfg.store_path() {
        Some(path) => Arc::new(
            LocalFactory::open(path)
                .await
                .with_context(|| format!("failed to open configuration store {:?}", path))?,
        ),
        None => {
            warn!(
                component = "main",
                event = "store_in_memory",
                "no store path configured, configuration will not outlive the process"
            );
            Arc::new(LocalFactory::in_memory())
        }
    };

    let shutdown =
        GracefulShutdown::new(CancellationToken::new(), TaskTracker::new(), cfg.drain_timeout());
    let signal_listener = shutdown.listen_for_signal();
    let ctx = shutdown.token();

    let engine = cfg.engine().cloned().unwrap_or_default();
    let mut builder = Initializer::builder(factory)
        .data_sources(cfg.datasources().iter().cloned())
        .engine_config(engine_config)
        .verbose_logging(engine.verbose_logging)
        .log_level(log_level)
        .level_control(level_control)
        .task_tracker(shutdown.tracker());
    if let Some(name) = engine.module_name {
        builder = builder.module_name(name);
    }
    if let Some(origin) = cfg.observers().and_then(|o| o.origin.clone()) {
        builder = builder.observer_origin(origin);
    }
    let initializer = builder.build()?;

    let result = run(&ctx, &cfg, &initializer).await;

    if let Err(e) = shutdown.finish().await {
        warn!(
            component = "main",
            event = "drain_failed",
            error = %e,
            "pending notifications dropped"
        );
    }
    signal_listener.abort();

    match result {
        Ok(outcome) => {
            info!(
                component = "main",
                event = "done",
                config_id = outcome.config_id(),
                created = outcome.is_created(),
                "data store initialized"
            );
            Ok(())
        }
        Err(e) => {
            error!(
                component = "main",
                event = "initialize_failed",
                error = %e,
                "failed to initialize data store"
            );
            Err(e)
        }
    }
}

/// Observers the configuration asks for: the log observer and, when a URL
/// is set, the forwarding observer.
fn configured_observers(cfg: &Config) -> Result<Vec<Arc<dyn Observer>>> {
    let mut observers: Vec<Arc<dyn Observer>> = Vec::new();
    let Some(settings) = cfg.observers() else {
        return Ok(observers);
    };
    if settings.log {
        observers.push(Arc::new(LogObserver::new(LOG_OBSERVER_ID)));
    }
    if let Some(url) = &settings.url {
        let forward = HttpObserver::new(FORWARD_OBSERVER_ID, url)
            .with_context(|| format!("failed to set up observer for {}", url))?;
        observers.push(Arc::new(forward));
    }
    Ok(observers)
}

async fn run(
    ctx: &CancellationToken,
    cfg: &Config,
    initializer: &Initializer,
) -> Result<BootstrapOutcome> {
    let observers = configured_observers(cfg)?;
    for observer in &observers {
        initializer.register_observer(ctx, observer.clone()).await?;
    }

    if let Some(level) = cfg.log_level() {
        initializer.set_log_level(ctx, level.as_str()).await?;
    }

    let outcome = initializer.initialize(ctx).await?;

    for observer in observers {
        initializer.unregister_observer(ctx, observer).await?;
    }
    Ok(outcome)
}
