//! Error types for authrelay.
//!
//! - [`RelayError`] - what callers of the relay client observe
//! - [`TransportError`] - the request never produced an HTTP response
//! - [`RenewalError`] - the credential renewal call failed

use thiserror::Error;

use crate::model::Response;

/// Error returned to callers of the relay pipeline.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The credential was rejected and could not be renewed.
    ///
    /// Carries the original rejected response, not the renewal failure.
    #[error("credential expired: {} returned {}", .response.url(), .response.status())]
    CredentialExpired { response: Response },

    /// A replayed request was rejected again.
    #[error("credential rejected after renewal: {} returned {}", .response.url(), .response.status())]
    AlreadyRetried { response: Response },

    /// Any other non-success status. Passed through untouched.
    #[error("request to {} failed with status {}", .response.url(), .response.status())]
    Status { response: Response },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A request path could not be resolved against the base URL.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request or response body (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The continuation was dropped before it was resumed.
    #[error("request abandoned before the credential renewal resolved")]
    Abandoned,
}

impl RelayError {
    /// The response attached to this error, if the server produced one.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::CredentialExpired { response }
            | Self::AlreadyRetried { response }
            | Self::Status { response } => Some(response),
            _ => None,
        }
    }

    /// Whether this error requires the user to authenticate again.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            Self::CredentialExpired { .. } | Self::AlreadyRetried { .. }
        )
    }
}

/// Error from the underlying HTTP transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established.
    #[error("connection failed: {message}")]
    Connect { message: String },

    /// Any other failure while sending the request or reading the body.
    #[error("request failed: {message}")]
    Request { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect {
                message: err.to_string(),
            }
        } else {
            Self::Request {
                message: err.to_string(),
            }
        }
    }
}

/// Error from a credential renewal attempt.
///
/// Cloneable because one renewal outcome is shared by every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenewalError {
    /// No renewal credential is held.
    #[error("no renewal credential available")]
    NoRenewalCredential,

    /// The renewal endpoint rejected the request.
    #[error("renewal rejected with status {status}")]
    Rejected { status: u16 },

    /// The renewal request failed at the network level.
    #[error("network error during renewal: {message}")]
    Network { message: String },

    /// The renewal endpoint answered with an unusable body.
    #[error("invalid renewal response: {message}")]
    InvalidResponse { message: String },

    /// The renewal future panicked.
    #[error("renewal task panicked")]
    Panicked,
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
