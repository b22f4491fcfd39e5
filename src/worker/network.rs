//! Network Module
//!
//! The network seam used by the fetch handler, and its HTTP implementation.

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use tracing::debug;
use url::Url;

use crate::cache::{Request, Response, ResponseType};
use crate::error::{OfflineError, Result};

/// Headers that describe the hop, not the resource.
const HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "keep-alive",
    "upgrade",
];

// == Network Trait ==
#[async_trait]
pub trait Network: Send + Sync {
    /// Performs the request.
    ///
    /// HTTP error statuses are successful fetches; only failures to obtain a
    /// response at all are `NetworkFailure`.
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

// == HTTP Network ==
/// reqwest-backed network that forwards same-origin requests to an
/// upstream server.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
    origin: Url,
    upstream: Url,
}

impl HttpNetwork {
    pub fn new(origin: Url, upstream: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            origin,
            upstream,
        }
    }

    fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    /// Rewrites same-origin URLs onto the upstream server, below its base
    /// path.
    pub fn target_url(&self, url: &Url) -> Url {
        if !self.is_same_origin(url) {
            return url.clone();
        }

        let base = self.upstream.path().trim_end_matches('/');
        let mut target = self.upstream.clone();
        target.set_path(&format!("{}{}", base, url.path()));
        target.set_query(url.query());
        target
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            OfflineError::InvalidRequest(format!("bad method '{}': {}", request.method, e))
        })?;
        let target = self.target_url(&request.url);

        let mut builder = self.client.request(method, target.clone());
        for (name, value) in &request.headers {
            if HOP_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                builder = builder.header(name, value);
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let upstream = builder
            .send()
            .await
            .map_err(|e| OfflineError::NetworkFailure(format!("{}: {}", target, e)))?;

        let status = upstream.status().as_u16();
        let headers = upstream
            .headers()
            .iter()
            .filter(|(name, _)| !HOP_HEADERS.contains(&name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = upstream
            .bytes()
            .await
            .map_err(|e| OfflineError::NetworkFailure(format!("{}: {}", target, e)))?;

        debug!("{} {} -> {}", request.method, target, status);

        let response_type = if self.is_same_origin(&request.url) {
            ResponseType::Basic
        } else {
            ResponseType::Cors
        };

        Ok(Response {
            status,
            response_type,
            headers,
            body,
        })
    }
}
