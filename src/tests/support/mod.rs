// Shared test support code for the scenario suites and unit tests.

pub mod engine;
pub mod logs;
pub mod observer;

pub use engine::MockFactory;
pub use logs::CapturedLogs;
pub use observer::RecordingObserver;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::initializer::Initializer;

pub const ENGINE_CONFIG: &str =
    r#"{"PIPELINE":{},"SQL":{"CONNECTION":"sqlite3://na:na@/tmp/G2C.db"}}"#;

/// Builds an initializer over `factory` with the three customer data sources.
pub fn new_initializer(factory: Arc<MockFactory>, tracker: TaskTracker) -> Initializer {
    Initializer::builder(factory)
        .data_sources(["CUSTOMERS", "REFERENCE", "WATCHLIST"])
        .engine_config(ENGINE_CONFIG)
        .module_name("init-database-test")
        .task_tracker(tracker)
        .build()
        .expect("test initializer")
}

/// Waits for every notification spawned on `tracker`.
pub async fn drain(tracker: &TaskTracker) {
    tracker.close();
    tokio::time::timeout(Duration::from_secs(2), tracker.wait())
        .await
        .expect("notifications drained");
}

pub fn ctx() -> CancellationToken {
    CancellationToken::new()
}
