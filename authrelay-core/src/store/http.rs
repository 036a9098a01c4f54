//! Renewal over HTTP using the JWT refresh convention.
//!
//! `POST {"refresh": "<token>"}` returns `{"access": "<token>"}`, plus a new
//! `"refresh"` when the server rotates renewal tokens and an optional
//! `"token_type"`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::Renewer;
use crate::config::RelayConfig;
use crate::credential::Credential;
use crate::error::RenewalError;

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

/// [`Renewer`] that posts the renewal token to a refresh endpoint.
///
/// Every renewal request is bounded by a timeout, so a hung refresh endpoint
/// fails the renewal instead of stalling the requests queued behind it.
#[derive(Debug, Clone)]
pub struct HttpRenewer {
    client: reqwest::Client,
    refresh_url: Url,
    timeout: Duration,
}

impl HttpRenewer {
    /// Default renewal timeout, matching [`RelayConfig::default`].
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(client: reqwest::Client, refresh_url: Url) -> Self {
        Self {
            client,
            refresh_url,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Renewer for the configured refresh endpoint, bounded by `timeout_ms`.
    pub fn from_config(config: &RelayConfig) -> Result<Self, url::ParseError> {
        let refresh_url = config.refresh_endpoint()?;
        Ok(Self::new(reqwest::Client::new(), refresh_url).with_timeout(config.timeout()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn refresh_url(&self) -> &Url {
        &self.refresh_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Renewer for HttpRenewer {
    async fn renew(&self, current: &Credential) -> Result<Credential, RenewalError> {
        let renewal = current.renewal().ok_or(RenewalError::NoRenewalCredential)?;

        tracing::debug!(url = %self.refresh_url, "requesting credential renewal");

        let response = self
            .client
            .post(self.refresh_url.clone())
            .timeout(self.timeout)
            .json(&RefreshRequest {
                refresh: renewal.expose(),
            })
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    format!("timed out after {:?}", self.timeout)
                } else {
                    e.to_string()
                };
                RenewalError::Network { message }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenewalError::Rejected {
                status: status.as_u16(),
            });
        }

        let body: RefreshResponse =
            response
                .json()
                .await
                .map_err(|e| RenewalError::InvalidResponse {
                    message: e.to_string(),
                })?;

        // Keep the old renewal token unless the server rotated it
        let next_renewal = body
            .refresh
            .unwrap_or_else(|| renewal.expose().to_string());

        let mut renewed = Credential::new(body.access).with_renewal(next_renewal);
        if let Some(token_type) = body.token_type.as_deref().or(current.token_type()) {
            renewed = renewed.with_token_type(token_type);
        }
        Ok(renewed)
    }
}
