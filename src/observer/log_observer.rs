// Observer that writes notifications to the structured log.

use std::sync::Arc;
use tracing::info;

use super::{Notification, Observer};

pub struct LogObserver {
    id: String,
}

impl LogObserver {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait::async_trait]
impl Observer for LogObserver {
    fn observer_id(&self) -> String {
        self.id.clone()
    }

    async fn update(&self, notification: Arc<Notification>) {
        info!(
            component = "observer",
            event = "notification",
            observer_id = %self.id,
            subject_id = notification.product_id,
            message_id = notification.event_id,
            notification = %notification.to_json(),
            "notification received"
        );
    }
}
