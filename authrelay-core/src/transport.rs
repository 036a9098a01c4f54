//! Sending requests over the wire.
//!
//! The relay only needs [`Transport::send`]; [`ReqwestTransport`] is the
//! default implementation.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::RelayConfig;
use crate::error::TransportError;
use crate::model::{RequestDescriptor, Response};

/// Sends a fully decorated request and buffers the response.
///
/// Implementations return `Ok` for every HTTP response, whatever the status;
/// `Err` is reserved for requests that never produced one.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: RequestDescriptor) -> Result<Response, TransportError>;
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(reqwest::Client::new(), config.timeout())
    }

    /// The underlying client, for sharing its connection pool.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<Response, TransportError> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone())
            .timeout(self.timeout);

        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send().await?;
        let url = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        tracing::trace!(
            request_id = %request.id(),
            %status,
            body_len = body.len(),
            "received response"
        );

        Ok(Response::new(url, status, headers, body.to_vec()))
    }
}
