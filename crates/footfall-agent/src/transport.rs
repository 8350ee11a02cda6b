//! # HTTP Transport
//!
//! Outbound requests to the collector.
//!
//! ## Delivery Modes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Transport Modes                                  │
//! │                                                                         │
//! │  post_json(request, body)                                              │
//! │  ───────────────────────                                               │
//! │  JSON POST, awaited. Ok only for a 2xx answer; anything else is        │
//! │  Rejected { status }. Used for visits and acknowledged delivery.       │
//! │                                                                         │
//! │  send_beacon(url, fields)                                              │
//! │  ───────────────────────                                               │
//! │  Form-encoded POST handed off to a background task. Returns whether    │
//! │  the hand-off was accepted; the answer is never observed.              │
//! │                                                                         │
//! │  No retries and no backoff here. An unacknowledged event stays in      │
//! │  the persisted queue and is replayed by the next tracker lifetime.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};

// =============================================================================
// Request Description
// =============================================================================

/// One acknowledged request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Absolute URL, or a path resolved against the transport's origin.
    pub url: String,

    /// Extra headers, in send order.
    pub headers: Vec<(String, String)>,

    /// Whether the host asked for ambient credentials on this request.
    pub with_credentials: bool,
}

impl OutboundRequest {
    pub fn new(url: impl Into<String>) -> Self {
        OutboundRequest {
            url: url.into(),
            headers: Vec::new(),
            with_credentials: false,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Request primitives the tracker is built on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `body` as JSON and waits for the answer.
    async fn post_json(&self, request: &OutboundRequest, body: &Value) -> TrackerResult<()>;

    /// Whether [`Transport::send_beacon`] is available at all.
    fn supports_beacon(&self) -> bool;

    /// Queues a fire-and-forget form POST. Returns false if it could not be
    /// queued.
    fn send_beacon(&self, url: &str, fields: Vec<(String, String)>) -> bool;
}

// =============================================================================
// reqwest Implementation
// =============================================================================

/// [`Transport`] over a shared reqwest client.
///
/// The client keeps no cookie jar, so `with_credentials` has no effect on the
/// request itself. It only steers the tracker away from beacons.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    origin: Option<Url>,
    beacon: bool,
}

impl HttpTransport {
    /// Creates a transport with the given request timeout.
    pub fn new(timeout: Duration) -> TrackerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpTransport {
            client,
            origin: None,
            beacon: true,
        })
    }

    /// Creates a transport using the configured request timeout.
    pub fn from_config(config: &TrackerConfig) -> TrackerResult<Self> {
        Self::new(config.request_timeout())
    }

    /// Resolves relative endpoint paths against `origin`.
    pub fn with_origin(mut self, origin: &str) -> TrackerResult<Self> {
        self.origin = Some(Url::parse(origin)?);
        Ok(self)
    }

    /// Disables the beacon mode, forcing acknowledged delivery.
    pub fn without_beacon(mut self) -> Self {
        self.beacon = false;
        self
    }

    fn resolve(&self, url: &str) -> TrackerResult<Url> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.origin {
                Some(origin) => Ok(origin.join(url)?),
                None => Err(TrackerError::InvalidUrl(format!(
                    "{} is relative and no origin is configured",
                    url
                ))),
            },
            Err(e) => Err(e.into()),
        }
    }

    fn header_map(headers: &[(String, String)]) -> TrackerResult<HeaderMap> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TrackerError::InvalidConfig(format!("header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TrackerError::InvalidConfig(format!("header {}: {}", name, e)))?;
            map.append(name, value);
        }
        Ok(map)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, request: &OutboundRequest, body: &Value) -> TrackerResult<()> {
        let url = self.resolve(&request.url)?;
        let headers = Self::header_map(&request.headers)?;

        debug!(url = %url, "POST");

        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TrackerError::Rejected {
                status: status.as_u16(),
            })
        }
    }

    fn supports_beacon(&self) -> bool {
        self.beacon && tokio::runtime::Handle::try_current().is_ok()
    }

    fn send_beacon(&self, url: &str, fields: Vec<(String, String)>) -> bool {
        if !self.beacon {
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => return false,
        };

        let url = match self.resolve(url) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Beacon not sent");
                return false;
            }
        };

        let client = self.client.clone();
        runtime.spawn(async move {
            match client.post(url).form(&fields).send().await {
                Ok(response) => debug!(status = %response.status(), "Beacon delivered"),
                Err(e) => debug!(error = %e, "Beacon lost"),
            }
        });
        true
    }
}
