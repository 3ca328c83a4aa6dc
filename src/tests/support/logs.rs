// In-memory log sink for asserting on emitted tracing events.

use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use tracing::Subscriber;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

/// Collects JSON log lines written by [`CapturedLogs::layer`].
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buf: Arc<Mutex<Vec<u8>>>,
}

pub struct CapturedWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CapturedWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.lock().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter {
            buf: self.buf.clone(),
        }
    }
}

impl CapturedLogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON formatting layer writing into this sink.
    pub fn layer<S>(&self) -> impl Layer<S>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fmt::layer().json().with_writer(self.clone())
    }

    /// Subscriber filtered by `directives` that writes into this sink.
    pub fn subscriber(&self, directives: &str) -> impl Subscriber + Send + Sync + 'static {
        tracing_subscriber::registry()
            .with(EnvFilter::new(directives))
            .with(self.layer())
    }

    /// Every captured record, one per line.
    pub fn records(&self) -> Vec<serde_json::Value> {
        let buf = self.buf.lock();
        String::from_utf8_lossy(&buf)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Records whose `component` and `event` fields match.
    pub fn events(&self, component: &str, event: &str) -> Vec<serde_json::Value> {
        self.records()
            .into_iter()
            .filter(|r| r["fields"]["component"] == component && r["fields"]["event"] == event)
            .collect()
    }

    pub fn clear(&self) {
        self.buf.lock().clear();
    }
}
