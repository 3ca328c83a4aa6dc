// Observer that forwards notifications to a remote endpoint as JSON.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{header, Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Notification, Observer};

pub const FORWARD_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

pub type ForwardClient = Client<HttpConnector, Full<Bytes>>;

/// Creates the plain HTTP/1.1 client used for forwarding.
pub fn create_client() -> ForwardClient {
    let mut connector = HttpConnector::new();
    connector.set_nodelay(true);
    connector.set_connect_timeout(Some(CONNECT_TIMEOUT));

    Client::builder(TokioExecutor::new()).build(connector)
}

/// POSTs every notification to `url`. Delivery failures are logged and
/// otherwise ignored; the bootstrap never waits on them.
pub struct HttpObserver {
    id: String,
    uri: Uri,
    client: ForwardClient,
    timeout: Duration,
}

impl HttpObserver {
    pub fn new(id: impl Into<String>, url: &str) -> Result<Self> {
        let uri: Uri = url
            .parse()
            .with_context(|| format!("invalid observer url {}", url))?;
        if uri.scheme_str() != Some("http") {
            bail!("observer url {} must use the http scheme", url);
        }
        if uri.host().is_none() {
            bail!("observer url {} has no host", url);
        }

        Ok(Self {
            id: id.into(),
            uri,
            client: create_client(),
            timeout: FORWARD_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Sends `notification` and returns the response status.
    pub async fn forward(&self, notification: &Notification) -> Result<StatusCode> {
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.uri.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(notification.to_json())))
            .context("build forward request")?;

        tokio::time::timeout(self.timeout, self.send(req))
            .await
            .with_context(|| format!("forward to {} timed out", self.uri))?
    }

    async fn send(&self, req: Request<Full<Bytes>>) -> Result<StatusCode> {
        let resp = self
            .client
            .request(req)
            .await
            .with_context(|| format!("forward to {}", self.uri))?;
        let status = resp.status();
        // Drain the body so the connection can go back to the pool.
        resp.into_body()
            .collect()
            .await
            .context("read forward response")?;
        Ok(status)
    }
}

#[async_trait::async_trait]
impl Observer for HttpObserver {
    fn observer_id(&self) -> String {
        self.id.clone()
    }

    async fn update(&self, notification: Arc<Notification>) {
        match self.forward(&notification).await {
            Ok(status) if status.is_success() => debug!(
                component = "observer",
                event = "forwarded",
                observer_id = %self.id,
                message_id = notification.event_id,
                status = status.as_u16(),
                "notification forwarded"
            ),
            Ok(status) => warn!(
                component = "observer",
                event = "forward_rejected",
                observer_id = %self.id,
                message_id = notification.event_id,
                status = status.as_u16(),
                "notification rejected by remote observer"
            ),
            Err(err) => warn!(
                component = "observer",
                event = "forward_failed",
                observer_id = %self.id,
                message_id = notification.event_id,
                error = %format!("{:#}", err),
                "failed to forward notification"
            ),
        }
    }
}
