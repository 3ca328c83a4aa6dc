//! Observer registry and asynchronous lifecycle notifications.

pub mod http_observer;
pub mod log_observer;
pub mod observer;
pub mod registry;


pub use http_observer::HttpObserver;
pub use log_observer::LogObserver;
pub use observer::{Notification, Observer};
pub use registry::{ObserverRegistry, RegistryError};
