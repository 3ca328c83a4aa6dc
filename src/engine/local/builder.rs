// In-process config builder.

use anyhow::{bail, Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::{ConfigBuilder, ConfigHandle, EngineHandle, KIND_BASE};

use super::ensure_active;

/// Data sources every fresh configuration starts with.
pub const DEFAULT_DATA_SOURCES: [(i64, &str); 2] = [(1, "TEST"), (2, "SEARCH")];

/// IDs of user data sources start above this value.
const FIRST_USER_DSRC_ID: i64 = 1000;

const CONFIG_BASE_VERSION: &str = "4.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DataSource {
    #[serde(rename = "DSRC_ID")]
    pub id: i64,
    #[serde(rename = "DSRC_CODE")]
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigBody {
    #[serde(rename = "CFG_DSRC")]
    pub data_sources: Vec<DataSource>,
    #[serde(rename = "CONFIG_BASE_VERSION")]
    pub base_version: String,
}

/// Serialized shape of a configuration produced by [`LocalConfigBuilder::save`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigDocument {
    #[serde(rename = "G2_CONFIG")]
    pub body: ConfigBody,
}

impl ConfigDocument {
    fn with_defaults() -> Self {
        Self {
            body: ConfigBody {
                data_sources: DEFAULT_DATA_SOURCES
                    .iter()
                    .map(|(id, code)| DataSource {
                        id: *id,
                        code: code.to_string(),
                    })
                    .collect(),
                base_version: CONFIG_BASE_VERSION.to_string(),
            },
        }
    }

    /// Data source codes in insertion order.
    pub fn codes(&self) -> Vec<&str> {
        self.body.data_sources.iter().map(|d| d.code.as_str()).collect()
    }
}

#[derive(Deserialize)]
struct AddDataSourceRequest {
    #[serde(rename = "DSRC_CODE")]
    code: String,
}

#[derive(Serialize)]
struct AddDataSourceResponse {
    #[serde(rename = "DSRC_ID")]
    id: i64,
}

/// Keeps working copies of configurations keyed by handle.
pub struct LocalConfigBuilder {
    inited: AtomicBool,
    log_level: AtomicI64,
    next_handle: AtomicU64,
    configs: DashMap<u64, ConfigDocument>,
}

impl LocalConfigBuilder {
    pub fn new() -> Self {
        Self {
            inited: AtomicBool::new(false),
            log_level: AtomicI64::new(0),
            next_handle: AtomicU64::new(1),
            configs: DashMap::new(),
        }
    }

    pub fn log_level(&self) -> i64 {
        self.log_level.load(Ordering::Relaxed)
    }

    /// Number of working copies not yet closed.
    pub fn open_handles(&self) -> usize {
        self.configs.len()
    }

    fn ensure_inited(&self) -> Result<()> {
        if !self.inited.load(Ordering::Acquire) {
            bail!("config builder is not initialized");
        }
        Ok(())
    }
}

impl Default for LocalConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EngineHandle for LocalConfigBuilder {
    fn kind(&self) -> &str {
        KIND_BASE
    }

    async fn init(
        &self,
        ctx: &CancellationToken,
        module_name: &str,
        _engine_config: &str,
        verbose_logging: i64,
    ) -> Result<()> {
        ensure_active(ctx)?;
        if self.inited.swap(true, Ordering::AcqRel) {
            bail!("config builder is already initialized");
        }
        debug!(
            component = "local-config-builder",
            event = "init",
            module_name = module_name,
            verbose_logging = verbose_logging,
            "config builder initialized"
        );
        Ok(())
    }

    async fn set_log_level(&self, ctx: &CancellationToken, level: i64) -> Result<()> {
        ensure_active(ctx)?;
        self.log_level.store(level, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConfigBuilder for LocalConfigBuilder {
    async fn create(&self, ctx: &CancellationToken) -> Result<ConfigHandle> {
        ensure_active(ctx)?;
        self.ensure_inited()?;
        let raw = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.configs.insert(raw, ConfigDocument::with_defaults());
        Ok(ConfigHandle::new(raw))
    }

    async fn add_data_source(
        &self,
        ctx: &CancellationToken,
        handle: &ConfigHandle,
        descriptor: &str,
    ) -> Result<String> {
        ensure_active(ctx)?;
        self.ensure_inited()?;
        let request: AddDataSourceRequest = serde_json::from_str(descriptor)
            .with_context(|| format!("invalid data source descriptor: {}", descriptor))?;
        if request.code.trim().is_empty() {
            bail!("data source code must not be empty");
        }

        let mut doc = self
            .configs
            .get_mut(&handle.raw())
            .with_context(|| format!("unknown config handle {}", handle.raw()))?;

        // Re-adding a known code is a no-op that reports the existing ID.
        let existing = doc
            .body
            .data_sources
            .iter()
            .find(|d| d.code == request.code)
            .map(|d| d.id);
        let id = match existing {
            Some(id) => id,
            None => {
                let id = doc
                    .body
                    .data_sources
                    .iter()
                    .map(|d| d.id)
                    .max()
                    .unwrap_or(0)
                    .max(FIRST_USER_DSRC_ID)
                    + 1;
                doc.body.data_sources.push(DataSource {
                    id,
                    code: request.code,
                });
                id
            }
        };

        Ok(serde_json::to_string(&AddDataSourceResponse { id })?)
    }

    async fn save(&self, ctx: &CancellationToken, handle: &ConfigHandle) -> Result<String> {
        ensure_active(ctx)?;
        self.ensure_inited()?;
        let doc = self
            .configs
            .get(&handle.raw())
            .with_context(|| format!("unknown config handle {}", handle.raw()))?;
        Ok(serde_json::to_string(&*doc)?)
    }

    async fn close(&self, _ctx: &CancellationToken, handle: ConfigHandle) -> Result<()> {
        self.configs
            .remove(&handle.raw())
            .map(|_| ())
            .with_context(|| format!("unknown config handle {}", handle.raw()))
    }
}
