// Bootstraps the default engine configuration of a data store.

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::engine::{
    ConfigBuilder, ConfigHandle, ConfigManager, EngineFactory, EngineHandle, ServiceKind,
    KIND_BASE,
};
use crate::logging::{LevelControl, LogLevel};
use crate::observer::{Notification, Observer, ObserverRegistry, RegistryError};
use crate::singleton::Singleton;

use super::error::InitError;
use super::events;

const COMPONENT: &str = "initializer";

/// Terminal state of a bootstrap run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// A default configuration existed already; nothing was written.
    AlreadyPresent(i64),
    /// A configuration was persisted and made default.
    Created(i64),
}

impl BootstrapOutcome {
    pub fn config_id(self) -> i64 {
        match self {
            BootstrapOutcome::AlreadyPresent(id) | BootstrapOutcome::Created(id) => id,
        }
    }

    pub fn is_created(self) -> bool {
        matches!(self, BootstrapOutcome::Created(_))
    }
}

/// Settings of an [`Initializer`]. The engine configuration is left out on
/// purpose, it usually embeds database credentials.
#[derive(Serialize)]
struct Settings<'a> {
    data_sources: &'a [String],
    module_name: &'a str,
    verbose_logging: i64,
    log_level: LogLevel,
    observer_origin: Option<String>,
    observers: usize,
}

/// Creates the default configuration of a store exactly once.
///
/// The config builder and config manager are obtained lazily from the
/// factory, each at most once per initializer, and shared by all operations.
pub struct Initializer {
    data_sources: Vec<String>,
    engine_config: String,
    module_name: String,
    verbose_logging: i64,
    factory: Arc<dyn EngineFactory>,
    config_builder: Singleton<dyn ConfigBuilder>,
    config_manager: Singleton<dyn ConfigManager>,
    log_level: RwLock<LogLevel>,
    is_trace: AtomicBool,
    level_control: Option<LevelControl>,
    observer_origin: RwLock<Option<String>>,
    observers: Mutex<Option<Arc<ObserverRegistry>>>,
    tracker: TaskTracker,
}

/// Builder for [`Initializer`].
pub struct InitializerBuilder {
    factory: Arc<dyn EngineFactory>,
    data_sources: Vec<String>,
    engine_config: String,
    module_name: Option<String>,
    verbose_logging: i64,
    log_level: LogLevel,
    level_control: Option<LevelControl>,
    observer_origin: Option<String>,
    tracker: Option<TaskTracker>,
}

impl InitializerBuilder {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            data_sources: Vec::new(),
            engine_config: String::new(),
            module_name: None,
            verbose_logging: 0,
            log_level: LogLevel::default(),
            level_control: None,
            observer_origin: None,
            tracker: None,
        }
    }

    /// Data sources added to a fresh configuration, in this order.
    pub fn data_sources<I, S>(mut self, data_sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_sources = data_sources.into_iter().map(Into::into).collect();
        self
    }

    /// Opaque engine configuration JSON handed to `init`. Required.
    pub fn engine_config(mut self, engine_config: impl Into<String>) -> Self {
        self.engine_config = engine_config.into();
        self
    }

    /// Module name handed to `init`. An empty name counts as unset.
    pub fn module_name(mut self, module_name: impl Into<String>) -> Self {
        let module_name = module_name.into();
        self.module_name = (!module_name.is_empty()).then_some(module_name);
        self
    }

    pub fn verbose_logging(mut self, verbose_logging: i64) -> Self {
        self.verbose_logging = verbose_logging;
        self
    }

    /// Initial local log level. Nothing is propagated until `set_log_level`.
    pub fn log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    /// Process log filter that `set_log_level` should drive.
    pub fn level_control(mut self, level_control: LevelControl) -> Self {
        self.level_control = Some(level_control);
        self
    }

    pub fn observer_origin(mut self, origin: impl Into<String>) -> Self {
        self.observer_origin = Some(origin.into());
        self
    }

    /// Tracker for notification tasks, so the owner can wait for them on exit.
    pub fn task_tracker(mut self, tracker: TaskTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn build(self) -> Result<Initializer, InitError> {
        if self.engine_config.trim().is_empty() {
            return Err(InitError::MissingEngineConfiguration);
        }

        Ok(Initializer {
            data_sources: self.data_sources,
            engine_config: self.engine_config,
            module_name: self.module_name.unwrap_or_else(default_module_name),
            verbose_logging: self.verbose_logging,
            factory: self.factory,
            config_builder: Singleton::new(),
            config_manager: Singleton::new(),
            is_trace: AtomicBool::new(self.log_level.is_trace()),
            log_level: RwLock::new(self.log_level),
            level_control: self.level_control,
            observer_origin: RwLock::new(self.observer_origin),
            observers: Mutex::new(None),
            tracker: self.tracker.unwrap_or_default(),
        })
    }
}

/// Module name used when none is configured: unique per process start.
pub fn default_module_name() -> String {
    format!("init-database-{}-{}", Utc::now().timestamp(), std::process::id())
}

/// Runs a dependent-service call unless `ctx` fires first.
async fn cancellable<T, F>(ctx: &CancellationToken, call: F) -> Result<T, InitError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(InitError::Cancelled),
        res = call => res.map_err(InitError::Service),
    }
}

impl Initializer {
    pub fn builder(factory: Arc<dyn EngineFactory>) -> InitializerBuilder {
        InitializerBuilder::new(factory)
    }

    pub fn data_sources(&self) -> &[String] {
        &self.data_sources
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn verbose_logging(&self) -> i64 {
        self.verbose_logging
    }

    pub fn log_level(&self) -> LogLevel {
        *self.log_level.read()
    }

    pub fn is_trace(&self) -> bool {
        self.is_trace.load(Ordering::Relaxed)
    }

    pub fn observer_origin(&self) -> Option<String> {
        self.observer_origin.read().clone()
    }

    /// True while at least one observer is registered.
    pub fn has_observers(&self) -> bool {
        self.observers.lock().is_some()
    }

    // --- Bootstrap ----------------------------------------------------------

    /// Creates, persists and activates the default configuration unless the
    /// store already has one.
    ///
    /// The existence check and the write are not atomic across processes: two
    /// initializers racing on one store may both create a configuration.
    pub async fn initialize(&self, ctx: &CancellationToken) -> Result<BootstrapOutcome, InitError> {
        let entry_time = Utc::now();
        let started = Instant::now();
        self.trace_entry("initialize");
        self.debug_settings("initialize");

        let result = self.bootstrap(ctx, entry_time).await;

        self.trace_exit("initialize", started, &result);
        result
    }

    async fn bootstrap(
        &self,
        ctx: &CancellationToken,
        entry_time: DateTime<Utc>,
    ) -> Result<BootstrapOutcome, InitError> {
        let (builder, manager) = self.dependent_services(ctx).await?;

        let current = cancellable(ctx, manager.get_default_config_id(ctx)).await?;
        if current != 0 {
            info!(
                component = COMPONENT,
                event = "already_configured",
                config_id = current,
                "default configuration already exists, nothing to do"
            );
            self.notify(events::ALREADY_CONFIGURED, &[]);
            return Ok(BootstrapOutcome::AlreadyPresent(current));
        }

        let handle = cancellable(ctx, builder.create(ctx)).await?;
        let saved = self.fill_and_save(ctx, builder.as_ref(), &handle).await;
        if let Err(err) = builder.close(ctx, handle).await {
            warn!(
                component = COMPONENT,
                event = "close_failed",
                error = %err,
                "failed to release configuration handle"
            );
        }
        let serialized = saved?;

        let comment = format!(
            "Created by init-database at {}",
            entry_time.to_rfc3339_opts(SecondsFormat::Nanos, true)
        );
        let config_id = cancellable(ctx, manager.add_config(ctx, &serialized, &comment)).await?;

        if let Err(err) = cancellable(ctx, manager.set_default_config_id(ctx, config_id)).await {
            warn!(
                component = COMPONENT,
                event = "set_default_failed",
                config_id = config_id,
                error = %err,
                "configuration persisted but not made default"
            );
            return Err(err);
        }

        info!(
            component = COMPONENT,
            event = "config_created",
            config_id = config_id,
            comment = %comment,
            "default configuration created"
        );
        self.notify(events::CONFIG_CREATED, &[]);

        Ok(BootstrapOutcome::Created(config_id))
    }

    async fn fill_and_save(
        &self,
        ctx: &CancellationToken,
        builder: &dyn ConfigBuilder,
        handle: &ConfigHandle,
    ) -> Result<String, InitError> {
        self.add_data_sources(ctx, builder, handle).await?;
        cancellable(ctx, builder.save(ctx, handle)).await
    }

    async fn add_data_sources(
        &self,
        ctx: &CancellationToken,
        builder: &dyn ConfigBuilder,
        handle: &ConfigHandle,
    ) -> Result<(), InitError> {
        for data_source in &self.data_sources {
            let descriptor = serde_json::json!({ "DSRC_CODE": data_source }).to_string();
            if let Err(err) =
                cancellable(ctx, builder.add_data_source(ctx, handle, &descriptor)).await
            {
                warn!(
                    component = COMPONENT,
                    event = "data_source_failed",
                    data_source = %data_source,
                    error = %err,
                    "failed to add data source"
                );
                return Err(err);
            }
            info!(
                component = COMPONENT,
                event = "data_source_added",
                data_source = %data_source,
                "data source added"
            );
        }
        Ok(())
    }

    // --- Dependent services -------------------------------------------------

    async fn dependent_services(
        &self,
        ctx: &CancellationToken,
    ) -> Result<(Arc<dyn ConfigBuilder>, Arc<dyn ConfigManager>), InitError> {
        let builder = self.config_builder(ctx).await?;
        let manager = self.config_manager(ctx).await?;
        Ok((builder, manager))
    }

    async fn config_builder(
        &self,
        ctx: &CancellationToken,
    ) -> Result<Arc<dyn ConfigBuilder>, InitError> {
        self.config_builder
            .get_or_create(|| async {
                let handle = self.factory.config_builder(ctx).await?;
                self.init_handle(ctx, ServiceKind::ConfigBuilder, handle.as_ref())
                    .await?;
                Ok::<Arc<dyn ConfigBuilder>, anyhow::Error>(handle)
            })
            .await
            .map_err(|cause| InitError::Acquisition {
                kind: ServiceKind::ConfigBuilder,
                cause,
            })
    }

    async fn config_manager(
        &self,
        ctx: &CancellationToken,
    ) -> Result<Arc<dyn ConfigManager>, InitError> {
        self.config_manager
            .get_or_create(|| async {
                let handle = self.factory.config_manager(ctx).await?;
                self.init_handle(ctx, ServiceKind::ConfigManager, handle.as_ref())
                    .await?;
                Ok::<Arc<dyn ConfigManager>, anyhow::Error>(handle)
            })
            .await
            .map_err(|cause| InitError::Acquisition {
                kind: ServiceKind::ConfigManager,
                cause,
            })
    }

    /// Proxied handles come wired from the factory and must not be
    /// initialized a second time.
    async fn init_handle<H>(
        &self,
        ctx: &CancellationToken,
        kind: ServiceKind,
        handle: &H,
    ) -> anyhow::Result<()>
    where
        H: EngineHandle + ?Sized,
    {
        if handle.kind() != KIND_BASE {
            debug!(
                component = COMPONENT,
                event = "init_skipped",
                service = %kind,
                handle_kind = handle.kind(),
                "handle is not initialized directly"
            );
            return Ok(());
        }
        handle
            .init(ctx, &self.module_name, &self.engine_config, self.verbose_logging)
            .await?;
        debug!(
            component = COMPONENT,
            event = "init_done",
            service = %kind,
            module_name = %self.module_name,
            "handle initialized"
        );
        Ok(())
    }

    // --- Log level ----------------------------------------------------------

    /// Changes the log level here and in both dependent services.
    ///
    /// An unknown name changes nothing. Once the name is accepted the local
    /// level stays changed even if a dependent service rejects it.
    pub async fn set_log_level(
        &self,
        ctx: &CancellationToken,
        name: &str,
    ) -> Result<(), InitError> {
        let started = Instant::now();
        self.trace_entry("set_log_level");
        self.debug_settings("set_log_level");

        let result = self.apply_log_level(ctx, name).await;

        self.trace_exit("set_log_level", started, &result);
        result
    }

    async fn apply_log_level(&self, ctx: &CancellationToken, name: &str) -> Result<(), InitError> {
        let level: LogLevel = name
            .parse()
            .map_err(|_| InitError::InvalidLogLevel(name.to_string()))?;

        *self.log_level.write() = level;
        self.is_trace.store(level.is_trace(), Ordering::Relaxed);
        if let Some(control) = &self.level_control {
            control.apply(level).map_err(InitError::LogFilter)?;
        }

        let (builder, manager) = self.dependent_services(ctx).await?;
        let engine_level = level.as_engine_level();
        cancellable(ctx, builder.set_log_level(ctx, engine_level)).await?;
        cancellable(ctx, manager.set_log_level(ctx, engine_level)).await?;

        self.notify(
            events::LOG_LEVEL_CHANGED,
            &[(events::DETAIL_LOG_LEVEL_NAME, level.as_str())],
        );
        Ok(())
    }

    // --- Observers ----------------------------------------------------------

    /// Adds `observer`; registering the same ID twice keeps one entry.
    pub async fn register_observer(
        &self,
        ctx: &CancellationToken,
        observer: Arc<dyn Observer>,
    ) -> Result<(), InitError> {
        if ctx.is_cancelled() {
            return Err(InitError::Cancelled);
        }
        let observer_id = observer.observer_id();
        self.trace_entry("register_observer");

        let notice = self
            .notice(events::OBSERVER_REGISTERED)
            .with_detail(events::DETAIL_OBSERVER_ID, observer_id.clone());

        let mut slot = self.observers.lock();
        let registry =
            slot.get_or_insert_with(|| Arc::new(ObserverRegistry::new(self.tracker.clone())));
        registry.register(observer, notice);
        drop(slot);

        debug!(
            component = COMPONENT,
            event = "observer_registered",
            observer_id = %observer_id,
            "observer registered"
        );
        Ok(())
    }

    /// Removes `observer`. The observer is notified of its own removal.
    pub async fn unregister_observer(
        &self,
        ctx: &CancellationToken,
        observer: Arc<dyn Observer>,
    ) -> Result<(), InitError> {
        if ctx.is_cancelled() {
            return Err(InitError::Cancelled);
        }
        let observer_id = observer.observer_id();
        self.trace_entry("unregister_observer");

        let notice = self
            .notice(events::OBSERVER_UNREGISTERED)
            .with_detail(events::DETAIL_OBSERVER_ID, observer_id.clone());

        let mut slot = self.observers.lock();
        let registry = slot
            .as_ref()
            .ok_or_else(|| InitError::ObserverNotFound(observer_id.clone()))?;
        registry
            .unregister(&observer_id, notice)
            .map_err(|err| match err {
                RegistryError::NotFound(id) => InitError::ObserverNotFound(id),
            })?;
        if !registry.has_any() {
            *slot = None;
        }
        drop(slot);

        debug!(
            component = COMPONENT,
            event = "observer_unregistered",
            observer_id = %observer_id,
            "observer unregistered"
        );
        Ok(())
    }

    /// Sets the origin stamped on subsequent notifications.
    pub async fn set_observer_origin(
        &self,
        ctx: &CancellationToken,
        origin: &str,
    ) -> Result<(), InitError> {
        if ctx.is_cancelled() {
            return Err(InitError::Cancelled);
        }
        *self.observer_origin.write() = (!origin.is_empty()).then(|| origin.to_string());
        Ok(())
    }

    fn notice(&self, event_id: u32) -> Notification {
        Notification::new(events::PRODUCT_ID, event_id).with_origin(self.observer_origin())
    }

    fn notify(&self, event_id: u32, details: &[(&str, &str)]) {
        let Some(registry) = self.observers.lock().clone() else {
            return;
        };
        let notice = details
            .iter()
            .fold(self.notice(event_id), |n, (k, v)| n.with_detail(k, *v));
        registry.notify(notice);
    }

    // --- Diagnostics --------------------------------------------------------

    fn trace_entry(&self, operation: &'static str) {
        if self.is_trace() {
            trace!(component = COMPONENT, event = "entry", operation = operation, "enter");
        }
    }

    fn trace_exit<T>(
        &self,
        operation: &'static str,
        started: Instant,
        result: &Result<T, InitError>,
    ) {
        if self.is_trace() {
            trace!(
                component = COMPONENT,
                event = "exit",
                operation = operation,
                ok = result.is_ok(),
                error = ?result.as_ref().err(),
                elapsed = ?started.elapsed(),
                "exit"
            );
        }
    }

    fn debug_settings(&self, operation: &'static str) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        let settings = Settings {
            data_sources: &self.data_sources,
            module_name: &self.module_name,
            verbose_logging: self.verbose_logging,
            log_level: self.log_level(),
            observer_origin: self.observer_origin(),
            observers: self.observers.lock().as_ref().map_or(0, |r| r.len()),
        };
        match serde_json::to_string(&settings) {
            Ok(json) => debug!(
                component = COMPONENT,
                event = "settings",
                operation = operation,
                settings = %json,
                "initializer settings"
            ),
            Err(err) => warn!(
                component = COMPONENT,
                event = "settings_encode_failed",
                error = %err,
                "failed to encode initializer settings"
            ),
        }
    }
}
