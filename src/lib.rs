pub mod config;
pub mod engine;
pub mod initializer;
pub mod logging;
pub mod observer;
pub mod shutdown;
pub mod singleton;

#[cfg(test)]
mod tests;

#[cfg(test)]
pub use tests::support;
