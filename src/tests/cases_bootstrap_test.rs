// Scenario tests for the bootstrap sequence.

use std::sync::Arc;
use tokio_util::task::TaskTracker;

use crate::initializer::{BootstrapOutcome, InitError};
use crate::support::{ctx, new_initializer, MockFactory};

/// A store with a default configuration is left untouched.
#[tokio::test]
async fn test_existing_default_is_left_alone() {
    let factory = MockFactory::new().with_default(7).into_arc();
    let initializer = new_initializer(factory.clone(), TaskTracker::new());

    let outcome = initializer.initialize(&ctx()).await.unwrap();

    assert_eq!(outcome, BootstrapOutcome::AlreadyPresent(7));
    assert!(!outcome.is_created());
    assert_eq!(factory.count("builder.create"), 0);
    assert_eq!(factory.count("manager.add_config"), 0);
    assert_eq!(factory.count("manager.set_default_config_id"), 0);
}

#[tokio::test]
async fn test_empty_store_gets_a_default() {
    let factory = MockFactory::new().into_arc();
    let initializer = new_initializer(factory.clone(), TaskTracker::new());

    let outcome = initializer.initialize(&ctx()).await.unwrap();

    assert_eq!(outcome, BootstrapOutcome::Created(100));
    assert_eq!(factory.default_id(), 100);
    assert_eq!(factory.data_sources(), vec!["CUSTOMERS", "REFERENCE", "WATCHLIST"]);
    assert_eq!(
        factory.calls(),
        vec![
            "factory.builder",
            "builder.init:init-database-test:0",
            "factory.manager",
            "manager.init:init-database-test:0",
            "manager.get_default_config_id",
            "builder.create",
            "builder.add_data_source:CUSTOMERS",
            "builder.add_data_source:REFERENCE",
            "builder.add_data_source:WATCHLIST",
            "builder.save",
            "builder.close:1",
            "manager.add_config",
            "manager.set_default_config_id:100",
        ]
    );
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let factory = MockFactory::new().into_arc();
    let initializer = new_initializer(factory.clone(), TaskTracker::new());

    let first = initializer.initialize(&ctx()).await.unwrap();
    let second = initializer.initialize(&ctx()).await.unwrap();

    assert_eq!(first, BootstrapOutcome::Created(100));
    assert_eq!(second, BootstrapOutcome::AlreadyPresent(100));
    assert_eq!(factory.configs().len(), 1);
    assert_eq!(factory.count("factory."), 2);
    assert_eq!(factory.count("builder.init"), 1);
}

#[tokio::test]
async fn test_no_data_sources_still_creates_a_default() {
    let factory = MockFactory::new().into_arc();
    let initializer = crate::initializer::Initializer::builder(factory.clone())
        .engine_config(crate::support::ENGINE_CONFIG)
        .build()
        .unwrap();

    let outcome = initializer.initialize(&ctx()).await.unwrap();

    assert!(outcome.is_created());
    assert_eq!(factory.count("builder.add_data_source"), 0);
    assert_eq!(factory.count("builder.save"), 1);
}

/// The stored configuration was saved from the builder and carries the
/// creation comment.
#[tokio::test]
async fn test_persisted_config_and_comment() {
    let factory = MockFactory::new().into_arc();
    let initializer = new_initializer(factory.clone(), TaskTracker::new());

    let before = chrono::Utc::now();
    initializer.initialize(&ctx()).await.unwrap();

    let configs = factory.configs();
    assert_eq!(configs.len(), 1);
    let stored = &configs[0];
    assert_eq!(
        stored.config,
        r#"{"data_sources":["CUSTOMERS","REFERENCE","WATCHLIST"]}"#
    );

    let stamp = stored
        .comment
        .strip_prefix("Created by init-database at ")
        .expect("comment prefix");
    let stamped = chrono::DateTime::parse_from_rfc3339(stamp)
        .unwrap()
        .with_timezone(&chrono::Utc);
    assert!(stamped >= before - chrono::Duration::seconds(1));
    assert!(stamp.ends_with('Z'));
}

/// A rejected data source aborts the run before anything is persisted.
#[tokio::test]
async fn test_data_source_failure_aborts_before_persisting() {
    let factory = MockFactory::new().fail_data_source_at(2).into_arc();
    let initializer = new_initializer(factory.clone(), TaskTracker::new());

    let err = initializer.initialize(&ctx()).await.unwrap_err();

    assert!(matches!(err, InitError::Service(_)));
    assert!(err.to_string().contains("REFERENCE"));
    assert_eq!(factory.data_sources(), vec!["CUSTOMERS"]);
    assert_eq!(factory.count("builder.add_data_source:WATCHLIST"), 0);
    assert_eq!(factory.count("builder.save"), 0);
    assert_eq!(factory.count("builder.close:1"), 1);
    assert_eq!(factory.count("manager.add_config"), 0);
    assert_eq!(factory.default_id(), 0);
}

/// A failed activation leaves the saved configuration behind.
#[tokio::test]
async fn test_set_default_failure_leaves_config_persisted() {
    let factory = MockFactory::new().fail_set_default().into_arc();
    let initializer = new_initializer(factory.clone(), TaskTracker::new());

    let err = initializer.initialize(&ctx()).await.unwrap_err();

    assert!(matches!(err, InitError::Service(_)));
    assert_eq!(factory.configs().len(), 1);
    assert_eq!(factory.default_id(), 0);
}

#[tokio::test]
async fn test_factory_failure_surfaces_as_acquisition_error() {
    let factory = MockFactory::new().fail_factory().into_arc();
    let initializer = new_initializer(factory.clone(), TaskTracker::new());

    let err = initializer.initialize(&ctx()).await.unwrap_err();

    match err {
        InitError::Acquisition { kind, cause } => {
            assert_eq!(kind, crate::engine::ServiceKind::ConfigBuilder);
            assert!(cause.to_string().contains("builder unavailable"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_init_failure_surfaces_as_acquisition_error() {
    let factory = MockFactory::new().fail_init().into_arc();
    let initializer = new_initializer(factory.clone(), TaskTracker::new());

    let err = initializer.initialize(&ctx()).await.unwrap_err();

    assert!(matches!(err, InitError::Acquisition { .. }));
    assert!(err.to_string().contains("init rejected"));
    assert_eq!(factory.count("manager."), 0);
}

#[tokio::test]
async fn test_cancelled_context_stops_the_run() {
    let factory = MockFactory::new().into_arc();
    let initializer = new_initializer(factory.clone(), TaskTracker::new());
    let ctx = ctx();
    ctx.cancel();

    let err = initializer.initialize(&ctx).await.unwrap_err();

    assert!(matches!(err, InitError::Cancelled));
    assert_eq!(factory.count("manager.add_config"), 0);
    assert_eq!(factory.default_id(), 0);
}

#[tokio::test]
async fn test_cancellation_mid_run_skips_persisting() {
    let factory = MockFactory::new()
        .call_delay(std::time::Duration::from_millis(50))
        .into_arc();
    let initializer = Arc::new(new_initializer(factory.clone(), TaskTracker::new()));
    let ctx = ctx();

    let run = {
        let initializer = initializer.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move { initializer.initialize(&ctx).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(120)).await;
    ctx.cancel();

    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(err, InitError::Cancelled));
    assert_eq!(factory.count("manager.add_config"), 0);
}
