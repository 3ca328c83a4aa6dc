// Observer contract and the notification payload it receives.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lifecycle event delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    #[serde(rename = "subjectId")]
    pub product_id: u32,
    #[serde(rename = "messageId")]
    pub event_id: u32,
    #[serde(rename = "origin", skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Always `None` for the events emitted today.
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub details: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(product_id: u32, event_id: u32) -> Self {
        Self {
            product_id,
            event_id,
            origin: None,
            error: None,
            details: BTreeMap::new(),
        }
    }

    pub fn with_origin(mut self, origin: Option<String>) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }

    /// Flat JSON object: the fixed fields plus every detail as a top-level key.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Listener registered with an [`super::ObserverRegistry`].
#[async_trait::async_trait]
pub trait Observer: Send + Sync {
    /// Stable identifier; the registry keys observers by it.
    fn observer_id(&self) -> String;

    /// Receives one notification. Runs on a detached task.
    async fn update(&self, notification: Arc<Notification>);
}
