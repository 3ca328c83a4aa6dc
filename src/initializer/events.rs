// Identifiers stamped on notifications emitted by the initializer.

/// Subject ID of every notification the initializer emits.
pub const PRODUCT_ID: u32 = 6502;

/// A default configuration already existed; nothing was written.
pub const ALREADY_CONFIGURED: u32 = 8001;
/// A new configuration was persisted and made default.
pub const CONFIG_CREATED: u32 = 8002;
/// An observer was registered. Detail: `observerID`.
pub const OBSERVER_REGISTERED: u32 = 8003;
/// The log level changed. Detail: `logLevelName`.
pub const LOG_LEVEL_CHANGED: u32 = 8004;
/// An observer is being unregistered. Detail: `observerID`.
pub const OBSERVER_UNREGISTERED: u32 = 8005;

pub const DETAIL_OBSERVER_ID: &str = "observerID";
pub const DETAIL_LOG_LEVEL_NAME: &str = "logLevelName";
