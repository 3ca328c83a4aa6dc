//! In-process engine: a config builder, a config manager and the factory
//! that hands them out. Used by the CLI and the test-suite.

use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{ConfigBuilder, ConfigManager, EngineFactory};

pub mod builder;
pub mod manager;
pub mod store;


pub use builder::{ConfigDocument, DataSource, LocalConfigBuilder, DEFAULT_DATA_SOURCES};
pub use manager::LocalConfigManager;
pub use store::{ConfigRecord, ConfigStore};

fn ensure_active(ctx: &CancellationToken) -> Result<()> {
    if ctx.is_cancelled() {
        bail!("operation cancelled");
    }
    Ok(())
}

/// Hands out fresh local handles; every manager shares one [`ConfigStore`].
pub struct LocalFactory {
    store: Arc<ConfigStore>,
}

impl LocalFactory {
    /// Factory over a store that is discarded with the process.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(ConfigStore::in_memory()),
        }
    }

    /// Factory over a JSON file store at `path`.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            store: Arc::new(ConfigStore::open(path).await?),
        })
    }

    pub fn store(&self) -> Arc<ConfigStore> {
        self.store.clone()
    }
}

#[async_trait::async_trait]
impl EngineFactory for LocalFactory {
    async fn config_builder(&self, ctx: &CancellationToken) -> Result<Arc<dyn ConfigBuilder>> {
        ensure_active(ctx)?;
        Ok(Arc::new(LocalConfigBuilder::new()))
    }

    async fn config_manager(&self, ctx: &CancellationToken) -> Result<Arc<dyn ConfigManager>> {
        ensure_active(ctx)?;
        Ok(Arc::new(LocalConfigManager::new(self.store.clone())))
    }
}
