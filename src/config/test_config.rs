use super::{AppBox, Config, Engine, Logs, Observers};
use crate::logging::LogLevel;
use std::time::Duration;

/// Creates a new test configuration backed by an in-memory store.
pub fn new_test_config() -> Config {
    Config {
        app: AppBox {
            env: super::TEST.to_string(),
            logs: Some(Logs {
                level: Some(LogLevel::Debug),
            }),
            engine: Some(Engine {
                database_url: Some("sqlite3://na:na@/tmp/sqlite/G2C.db".to_string()),
                configuration_json: None,
                module_name: Some("init-database-test".to_string()),
                verbose_logging: 0,
                paths: None,
            }),
            datasources: vec![
                "CUSTOMERS".to_string(),
                "REFERENCE".to_string(),
                "WATCHLIST".to_string(),
            ],
            observers: Some(Observers {
                origin: Some("init-database-test".to_string()),
                url: None,
                log: false,
                drain_timeout: Some(Duration::from_secs(1)),
            }),
            store: None,
        },
    }
}
