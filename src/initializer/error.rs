// Errors returned by the initializer.

use std::sync::Arc;

use crate::engine::ServiceKind;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    /// The factory or the handle's `init` failed. The cause is cached and
    /// shared by every later call on the same initializer.
    #[error("failed to acquire {kind}: {cause:#}")]
    Acquisition {
        kind: ServiceKind,
        cause: Arc<anyhow::Error>,
    },

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("failed to apply log filter: {0:#}")]
    LogFilter(anyhow::Error),

    /// A dependent service call failed; the error is passed through untouched.
    #[error(transparent)]
    Service(#[from] anyhow::Error),

    #[error("observer {0} is not registered")]
    ObserverNotFound(String),

    #[error("engine configuration JSON is required")]
    MissingEngineConfiguration,

    #[error("operation cancelled")]
    Cancelled,
}
