//! The initializer: lazily acquires the engine's config services, creates
//! the default configuration once, and drives log levels and observers.

pub mod error;
pub mod events;
pub mod initializer;

pub use error::InitError;
pub use initializer::{default_module_name, BootstrapOutcome, Initializer, InitializerBuilder};
