//! Contracts of the resolution-engine services the initializer drives, plus
//! an in-process implementation of them.

use anyhow::Result;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod descriptor;
pub mod local;


/// Kind reported by handles that must be initialized directly.
pub const KIND_BASE: &str = "base";
/// Kind reported by handles proxied over the network; the factory wires them.
pub const KIND_GRPC: &str = "grpc";

/// Which dependent service a handle provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    ConfigBuilder,
    ConfigManager,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::ConfigBuilder => f.write_str("config builder"),
            ServiceKind::ConfigManager => f.write_str("config manager"),
        }
    }
}

/// Opaque reference to an in-memory configuration held by a [`ConfigBuilder`].
///
/// Deliberately neither `Clone` nor `Copy`: a handle belongs to the single
/// bootstrap that created it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ConfigHandle(u64);

impl ConfigHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Operations every engine handle supports.
#[async_trait::async_trait]
pub trait EngineHandle: Send + Sync {
    /// Implementation kind, see [`KIND_BASE`] and [`KIND_GRPC`].
    fn kind(&self) -> &str;

    /// Initializes a directly-driven handle.
    async fn init(
        &self,
        ctx: &CancellationToken,
        module_name: &str,
        engine_config: &str,
        verbose_logging: i64,
    ) -> Result<()>;

    /// Sets the handle's numeric log level.
    async fn set_log_level(&self, ctx: &CancellationToken, level: i64) -> Result<()>;
}

/// Builds configurations in memory and serializes them.
#[async_trait::async_trait]
pub trait ConfigBuilder: EngineHandle {
    /// Creates a fresh configuration seeded with the engine defaults.
    async fn create(&self, ctx: &CancellationToken) -> Result<ConfigHandle>;

    /// Adds a data source described by a JSON document such as
    /// `{"DSRC_CODE": "CUSTOMERS"}`. Returns the engine's JSON response.
    async fn add_data_source(
        &self,
        ctx: &CancellationToken,
        handle: &ConfigHandle,
        descriptor: &str,
    ) -> Result<String>;

    /// Serializes the configuration behind `handle`.
    async fn save(&self, ctx: &CancellationToken, handle: &ConfigHandle) -> Result<String>;

    /// Releases the working copy behind `handle`.
    async fn close(&self, ctx: &CancellationToken, handle: ConfigHandle) -> Result<()>;
}

/// Persists configurations and tracks the default one.
#[async_trait::async_trait]
pub trait ConfigManager: EngineHandle {
    /// Returns the default configuration ID, 0 when none is set.
    async fn get_default_config_id(&self, ctx: &CancellationToken) -> Result<i64>;

    /// Stores a serialized configuration and returns its new ID.
    async fn add_config(
        &self,
        ctx: &CancellationToken,
        config: &str,
        comment: &str,
    ) -> Result<i64>;

    /// Marks `config_id` as the default configuration.
    async fn set_default_config_id(&self, ctx: &CancellationToken, config_id: i64) -> Result<()>;
}

/// Abstract factory for engine handles.
#[async_trait::async_trait]
pub trait EngineFactory: Send + Sync {
    async fn config_builder(&self, ctx: &CancellationToken) -> Result<Arc<dyn ConfigBuilder>>;

    async fn config_manager(&self, ctx: &CancellationToken) -> Result<Arc<dyn ConfigManager>>;
}
