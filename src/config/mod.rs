// Configuration loading and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::descriptor::{build_simple_system_configuration, EnginePaths};
use crate::logging::LogLevel;

pub const PROD: &str = "prod";
#[allow(dead_code)]
pub const DEV: &str = "dev";
pub const TEST: &str = "test";

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(rename = "init_database")]
    pub app: AppBox,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppBox {
    #[serde(default)]
    pub env: String,
    pub logs: Option<Logs>,
    pub engine: Option<Engine>,
    #[serde(default)]
    pub datasources: Vec<String>,
    pub observers: Option<Observers>,
    pub store: Option<Store>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<LogLevel>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Engine {
    #[serde(rename = "database_url")]
    pub database_url: Option<String>,
    #[serde(rename = "configuration_json")]
    pub configuration_json: Option<String>,
    #[serde(rename = "module_name")]
    pub module_name: Option<String>,
    #[serde(rename = "verbose_logging", default)]
    pub verbose_logging: i64,
    pub paths: Option<EnginePaths>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Observers {
    pub origin: Option<String>,
    /// Endpoint that receives every notification as a JSON POST.
    #[serde(default)]
    pub url: Option<String>,
    /// Registers the built-in log observer.
    #[serde(default)]
    pub log: bool,
    #[serde(rename = "drain_timeout", with = "humantime_serde", default)]
    pub drain_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Store {
    pub path: Option<PathBuf>,
}

/// Values supplied on the command line or through the environment. Any
/// value present replaces the one from the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub datasources: Option<Vec<String>>,
    pub engine_configuration_json: Option<String>,
    pub engine_log_level: Option<i64>,
    pub engine_module_name: Option<String>,
    pub log_level: Option<LogLevel>,
    pub observer_origin: Option<String>,
    pub observer_url: Option<String>,
    pub store_path: Option<PathBuf>,
}

pub trait ConfigTrait {
    fn is_prod(&self) -> bool;
    #[allow(dead_code)]
    fn is_test(&self) -> bool;
    fn log_level(&self) -> Option<LogLevel>;
    fn engine(&self) -> Option<&Engine>;
    fn datasources(&self) -> &[String];
    fn observers(&self) -> Option<&Observers>;
    fn store_path(&self) -> Option<&Path>;
    fn drain_timeout(&self) -> Duration;
    /// Engine configuration JSON, built from the database URL when it was
    /// not given verbatim.
    fn engine_configuration_json(&self) -> Result<String>;
}

impl ConfigTrait for Config {
    fn is_prod(&self) -> bool {
        self.app.env == PROD
    }

    fn is_test(&self) -> bool {
        self.app.env == TEST
    }

    fn log_level(&self) -> Option<LogLevel> {
        self.app.logs.as_ref().and_then(|l| l.level)
    }

    fn engine(&self) -> Option<&Engine> {
        self.app.engine.as_ref()
    }

    fn datasources(&self) -> &[String] {
        &self.app.datasources
    }

    fn observers(&self) -> Option<&Observers> {
        self.app.observers.as_ref()
    }

    fn store_path(&self) -> Option<&Path> {
        self.app.store.as_ref().and_then(|s| s.path.as_deref())
    }

    fn drain_timeout(&self) -> Duration {
        self.observers()
            .and_then(|o| o.drain_timeout)
            .unwrap_or(DEFAULT_DRAIN_TIMEOUT)
    }

    fn engine_configuration_json(&self) -> Result<String> {
        let engine = self
            .engine()
            .context("engine section is not configured")?;

        if let Some(json) = engine.configuration_json.as_deref().filter(|s| !s.trim().is_empty()) {
            return Ok(json.to_string());
        }

        let database_url = engine
            .database_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .context("either engine.configuration_json or engine.database_url is required")?;
        let paths = engine.paths.clone().unwrap_or_default();
        build_simple_system_configuration(database_url, &paths)
            .with_context(|| format!("build engine configuration from {}", database_url))
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        Self::from_yaml(&data).with_context(|| format!("unmarshal yaml from {:?}", abs_path))
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        let mut cfg: Config = serde_yaml::from_str(data)?;
        cfg.normalize();
        Ok(cfg)
    }

    /// Configuration used when no file is found: everything comes from flags.
    pub fn empty() -> Self {
        Self {
            app: AppBox::default(),
        }
    }

    pub fn apply(&mut self, overrides: Overrides) {
        let engine = self.app.engine.get_or_insert_with(Engine::default);
        if let Some(url) = overrides.database_url {
            engine.database_url = Some(url);
        }
        if let Some(json) = overrides.engine_configuration_json {
            engine.configuration_json = Some(json);
        }
        if let Some(name) = overrides.engine_module_name {
            engine.module_name = Some(name);
        }
        if let Some(level) = overrides.engine_log_level {
            engine.verbose_logging = level;
        }
        if let Some(datasources) = overrides.datasources {
            self.app.datasources = datasources;
        }
        if let Some(level) = overrides.log_level {
            self.app.logs = Some(Logs { level: Some(level) });
        }
        if let Some(origin) = overrides.observer_origin {
            let observers = self.app.observers.get_or_insert_with(Observers::default);
            observers.origin = Some(origin);
        }
        if let Some(url) = overrides.observer_url {
            let observers = self.app.observers.get_or_insert_with(Observers::default);
            observers.url = Some(url);
        }
        if let Some(path) = overrides.store_path {
            self.app.store = Some(Store { path: Some(path) });
        }
        self.normalize();
    }

    /// Trims data source names and drops blanks, e.g. from `--datasources "A, ,B"`.
    fn normalize(&mut self) {
        self.app.datasources = self
            .app
            .datasources
            .iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
    }
}

mod test_config;
#[allow(dead_code)]
pub use test_config::new_test_config;
