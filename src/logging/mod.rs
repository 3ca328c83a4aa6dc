//! Structured logging setup and the log level vocabulary.

use anyhow::{Context, Result};
use tracing::debug;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter, Registry};

pub mod level;


pub use level::{LogLevel, LogLevelError};

/// Handle onto the process-wide log filter, used to apply level changes at
/// run time. A filter pinned by `RUST_LOG` is never replaced.
#[derive(Clone)]
pub struct LevelControl {
    handle: reload::Handle<EnvFilter, Registry>,
    pinned: bool,
}

impl LevelControl {
    /// Replaces the active filter with one for `level`, unless pinned.
    pub fn apply(&self, level: LogLevel) -> Result<()> {
        if self.pinned {
            debug!(
                component = "logging",
                event = "filter_pinned",
                level = %level,
                "RUST_LOG is set, log filter left unchanged"
            );
            return Ok(());
        }
        self.handle
            .reload(EnvFilter::new(level.as_filter_directive()))
            .with_context(|| format!("failed to apply log level {}", level))
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }
}

/// Wraps `filter` in a reload layer. `pinned` marks a filter that level
/// changes must leave alone.
pub fn reloadable_filter(
    filter: EnvFilter,
    pinned: bool,
) -> (reload::Layer<EnvFilter, Registry>, LevelControl) {
    let (layer, handle) = reload::Layer::new(filter);
    (layer, LevelControl { handle, pinned })
}

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set,
/// for the whole life of the process.
/// Production emits JSON lines, everything else the pretty console format.
pub fn configure_logger(level: LogLevel, is_prod: bool) -> LevelControl {
    let (filter, pinned) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(level.as_filter_directive()), false),
    };
    let (filter, control) = reloadable_filter(filter, pinned);

    if is_prod {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }

    control
}
