// Observer that records every notification it receives.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::observer::{Notification, Observer};

pub struct RecordingObserver {
    id: String,
    delay: Option<Duration>,
    received: Mutex<Vec<Arc<Notification>>>,
    tx: mpsc::UnboundedSender<Arc<Notification>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Arc<Notification>>>,
}

impl RecordingObserver {
    pub fn new(id: &str) -> Arc<Self> {
        Self::build(id, None)
    }

    /// Observer that sleeps for `delay` before recording.
    pub fn with_delay(id: &str, delay: Duration) -> Arc<Self> {
        Self::build(id, Some(delay))
    }

    fn build(id: &str, delay: Option<Duration>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            id: id.to_string(),
            delay,
            received: Mutex::new(Vec::new()),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        })
    }

    /// Next notification in arrival order, or None after `timeout`.
    pub async fn next(&self, timeout: Duration) -> Option<Arc<Notification>> {
        let mut rx = self.rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    pub fn received(&self) -> Vec<Arc<Notification>> {
        self.received.lock().clone()
    }

    pub fn event_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.received().iter().map(|n| n.event_id).collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl Observer for RecordingObserver {
    fn observer_id(&self) -> String {
        self.id.clone()
    }

    async fn update(&self, notification: Arc<Notification>) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.received.lock().push(notification.clone());
        let _ = self.tx.send(notification);
    }
}
