// Set of observers with fire-and-forget fan-out.

use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::warn;

use super::{Notification, Observer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("observer {0} is not registered")]
    NotFound(String),
}

/// Observers keyed by ID. Notifications run on detached tasks tracked by a
/// [`TaskTracker`], so the caller never waits on an observer.
pub struct ObserverRegistry {
    observers: DashMap<String, Arc<dyn Observer>>,
    tracker: TaskTracker,
}

impl ObserverRegistry {
    pub fn new(tracker: TaskTracker) -> Self {
        Self {
            observers: DashMap::new(),
            tracker,
        }
    }

    /// Adds `observer` unless its ID is already present, then emits `notice`.
    /// The new observer is among the recipients.
    pub fn register(&self, observer: Arc<dyn Observer>, notice: Notification) {
        self.observers
            .entry(observer.observer_id())
            .or_insert(observer);
        self.notify(notice);
    }

    /// Emits `notice` and then removes the observer, so the departing
    /// observer still receives it.
    pub fn unregister(&self, observer_id: &str, notice: Notification) -> Result<(), RegistryError> {
        if !self.observers.contains_key(observer_id) {
            return Err(RegistryError::NotFound(observer_id.to_string()));
        }
        self.notify(notice);
        self.observers
            .remove(observer_id)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound(observer_id.to_string()))
    }

    pub fn has_any(&self) -> bool {
        !self.observers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn contains(&self, observer_id: &str) -> bool {
        self.observers.contains_key(observer_id)
    }

    /// Spawns one task per current observer and returns immediately.
    pub fn notify(&self, notification: Notification) {
        let recipients: Vec<Arc<dyn Observer>> =
            self.observers.iter().map(|e| e.value().clone()).collect();
        if recipients.is_empty() {
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(
                    component = "observer-registry",
                    event = "notify_dropped",
                    event_id = notification.event_id,
                    "no async runtime, notification dropped"
                );
                return;
            }
        };

        let notification = Arc::new(notification);
        for observer in recipients {
            let notification = notification.clone();
            self.tracker.spawn_on(
                async move {
                    observer.update(notification).await;
                },
                &handle,
            );
        }
    }
}
