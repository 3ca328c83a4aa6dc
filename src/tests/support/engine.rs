// Scriptable in-memory engine that records every call made against it.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::engine::{
    ConfigBuilder, ConfigHandle, ConfigManager, EngineFactory, EngineHandle, KIND_BASE,
};

#[derive(Debug, Clone)]
struct Script {
    kind: &'static str,
    fail_factory: bool,
    fail_init: bool,
    fail_data_source_at: Option<usize>,
    fail_set_default: bool,
    fail_set_log_level: bool,
    factory_delay: Option<Duration>,
    call_delay: Option<Duration>,
}

/// A stored configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredConfig {
    pub id: i64,
    pub config: String,
    pub comment: String,
}

#[derive(Default)]
struct State {
    calls: Mutex<Vec<String>>,
    data_sources: Mutex<Vec<String>>,
    configs: Mutex<Vec<StoredConfig>>,
    default_id: AtomicI64,
    next_id: AtomicI64,
}

impl State {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

/// Factory handing out recording builder and manager handles that share one
/// state.
pub struct MockFactory {
    script: Script,
    state: Arc<State>,
}

impl MockFactory {
    pub fn new() -> Self {
        let state = State {
            next_id: AtomicI64::new(100),
            ..Default::default()
        };
        Self {
            script: Script {
                kind: KIND_BASE,
                fail_factory: false,
                fail_init: false,
                fail_data_source_at: None,
                fail_set_default: false,
                fail_set_log_level: false,
                factory_delay: None,
                call_delay: None,
            },
            state: Arc::new(state),
        }
    }

    pub fn kind(mut self, kind: &'static str) -> Self {
        self.script.kind = kind;
        self
    }

    /// Store that already has a default configuration.
    pub fn with_default(self, config_id: i64) -> Self {
        self.state.default_id.store(config_id, Ordering::SeqCst);
        self
    }

    pub fn fail_factory(mut self) -> Self {
        self.script.fail_factory = true;
        self
    }

    pub fn fail_init(mut self) -> Self {
        self.script.fail_init = true;
        self
    }

    /// Fails the `n`th data source added (1-based).
    pub fn fail_data_source_at(mut self, n: usize) -> Self {
        self.script.fail_data_source_at = Some(n);
        self
    }

    pub fn fail_set_default(mut self) -> Self {
        self.script.fail_set_default = true;
        self
    }

    pub fn fail_set_log_level(mut self) -> Self {
        self.script.fail_set_log_level = true;
        self
    }

    /// Slows down handle construction, widening races between callers.
    pub fn factory_delay(mut self, delay: Duration) -> Self {
        self.script.factory_delay = Some(delay);
        self
    }

    /// Slows down every service call.
    pub fn call_delay(mut self, delay: Duration) -> Self {
        self.script.call_delay = Some(delay);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().clone()
    }

    /// Number of recorded calls starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.state
            .calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Data source codes in the order they were added.
    pub fn data_sources(&self) -> Vec<String> {
        self.state.data_sources.lock().clone()
    }

    pub fn configs(&self) -> Vec<StoredConfig> {
        self.state.configs.lock().clone()
    }

    pub fn default_id(&self) -> i64 {
        self.state.default_id.load(Ordering::SeqCst)
    }
}

impl Default for MockFactory {
    fn default() -> Self {
        Self::new()
    }
}

struct MockHandle {
    role: &'static str,
    script: Script,
    state: Arc<State>,
}

impl MockHandle {
    async fn call(&self, name: &str) {
        self.state.record(format!("{}.{}", self.role, name));
        if let Some(delay) = self.script.call_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl EngineHandle for MockHandle {
    fn kind(&self) -> &str {
        self.script.kind
    }

    async fn init(
        &self,
        _ctx: &CancellationToken,
        module_name: &str,
        _engine_config: &str,
        verbose_logging: i64,
    ) -> Result<()> {
        self.call(&format!("init:{}:{}", module_name, verbose_logging))
            .await;
        if self.script.fail_init {
            bail!("{} init rejected", self.role);
        }
        Ok(())
    }

    async fn set_log_level(&self, _ctx: &CancellationToken, level: i64) -> Result<()> {
        self.call(&format!("set_log_level:{}", level)).await;
        if self.script.fail_set_log_level {
            bail!("{} rejected log level {}", self.role, level);
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigBuilder for MockHandle {
    async fn create(&self, _ctx: &CancellationToken) -> Result<ConfigHandle> {
        self.call("create").await;
        Ok(ConfigHandle::new(1))
    }

    async fn add_data_source(
        &self,
        _ctx: &CancellationToken,
        _handle: &ConfigHandle,
        descriptor: &str,
    ) -> Result<String> {
        let value: serde_json::Value = serde_json::from_str(descriptor)?;
        let code = value["DSRC_CODE"]
            .as_str()
            .ok_or_else(|| anyhow!("descriptor without DSRC_CODE: {}", descriptor))?
            .to_string();
        self.call(&format!("add_data_source:{}", code)).await;

        let mut added = self.state.data_sources.lock();
        if self.script.fail_data_source_at == Some(added.len() + 1) {
            bail!("data source {} rejected", code);
        }
        added.push(code);
        Ok(format!(r#"{{"DSRC_ID":{}}}"#, 1000 + added.len()))
    }

    async fn save(&self, _ctx: &CancellationToken, _handle: &ConfigHandle) -> Result<String> {
        self.call("save").await;
        let codes = self.state.data_sources.lock().clone();
        Ok(serde_json::json!({ "data_sources": codes }).to_string())
    }

    async fn close(&self, _ctx: &CancellationToken, handle: ConfigHandle) -> Result<()> {
        self.call(&format!("close:{}", handle.raw())).await;
        Ok(())
    }
}

#[async_trait]
impl ConfigManager for MockHandle {
    async fn get_default_config_id(&self, _ctx: &CancellationToken) -> Result<i64> {
        self.call("get_default_config_id").await;
        Ok(self.state.default_id.load(Ordering::SeqCst))
    }

    async fn add_config(
        &self,
        _ctx: &CancellationToken,
        config: &str,
        comment: &str,
    ) -> Result<i64> {
        self.call("add_config").await;
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        self.state.configs.lock().push(StoredConfig {
            id,
            config: config.to_string(),
            comment: comment.to_string(),
        });
        Ok(id)
    }

    async fn set_default_config_id(
        &self,
        _ctx: &CancellationToken,
        config_id: i64,
    ) -> Result<()> {
        self.call(&format!("set_default_config_id:{}", config_id)).await;
        if self.script.fail_set_default {
            bail!("set default {} rejected", config_id);
        }
        self.state.default_id.store(config_id, Ordering::SeqCst);
        Ok(())
    }
}

impl MockFactory {
    async fn handle(&self, role: &'static str) -> Result<Arc<MockHandle>> {
        self.state.record(format!("factory.{}", role));
        if let Some(delay) = self.script.factory_delay {
            tokio::time::sleep(delay).await;
        }
        if self.script.fail_factory {
            bail!("{} unavailable", role);
        }
        Ok(Arc::new(MockHandle {
            role,
            script: self.script.clone(),
            state: self.state.clone(),
        }))
    }
}

#[async_trait]
impl EngineFactory for MockFactory {
    async fn config_builder(&self, _ctx: &CancellationToken) -> Result<Arc<dyn ConfigBuilder>> {
        let handle: Arc<dyn ConfigBuilder> = self.handle("builder").await?;
        Ok(handle)
    }

    async fn config_manager(&self, _ctx: &CancellationToken) -> Result<Arc<dyn ConfigManager>> {
        let handle: Arc<dyn ConfigManager> = self.handle("manager").await?;
        Ok(handle)
    }
}
