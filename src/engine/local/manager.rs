// In-process config manager over a ConfigStore.

use anyhow::{bail, Context, Result};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::{ConfigManager, EngineHandle, KIND_BASE};

use super::ensure_active;
use super::store::{ConfigRecord, ConfigStore};

pub struct LocalConfigManager {
    inited: AtomicBool,
    log_level: AtomicI64,
    store: Arc<ConfigStore>,
}

impl LocalConfigManager {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            inited: AtomicBool::new(false),
            log_level: AtomicI64::new(0),
            store,
        }
    }

    pub fn log_level(&self) -> i64 {
        self.log_level.load(Ordering::Relaxed)
    }

    /// Returns the serialized configuration stored under `config_id`.
    pub async fn get_config(&self, ctx: &CancellationToken, config_id: i64) -> Result<String> {
        ensure_active(ctx)?;
        self.ensure_inited()?;
        self.store
            .get(config_id)
            .await
            .map(|r| r.config)
            .with_context(|| format!("configuration {} does not exist", config_id))
    }

    /// Lists every stored configuration, oldest first.
    pub async fn get_config_list(&self, ctx: &CancellationToken) -> Result<Vec<ConfigRecord>> {
        ensure_active(ctx)?;
        self.ensure_inited()?;
        Ok(self.store.list().await)
    }

    fn ensure_inited(&self) -> Result<()> {
        if !self.inited.load(Ordering::Acquire) {
            bail!("config manager is not initialized");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EngineHandle for LocalConfigManager {
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
            bail!("config manager is already initialized");
        }
        debug!(
            component = "local-config-manager",
            event = "init",
            module_name = module_name,
            verbose_logging = verbose_logging,
            "config manager initialized"
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
impl ConfigManager for LocalConfigManager {
    async fn get_default_config_id(&self, ctx: &CancellationToken) -> Result<i64> {
        ensure_active(ctx)?;
        self.ensure_inited()?;
        Ok(self.store.default_config_id().await)
    }

    async fn add_config(
        &self,
        ctx: &CancellationToken,
        config: &str,
        comment: &str,
    ) -> Result<i64> {
        ensure_active(ctx)?;
        self.ensure_inited()?;
        serde_json::from_str::<serde_json::Value>(config)
            .context("configuration is not valid JSON")?;
        self.store.add(config, comment).await
    }

    async fn set_default_config_id(&self, ctx: &CancellationToken, config_id: i64) -> Result<()> {
        ensure_active(ctx)?;
        self.ensure_inited()?;
        self.store.set_default(config_id).await
    }
}
