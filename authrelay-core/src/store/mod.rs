//! Credential storage abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`CredentialStore`] - Trait the relay uses to read, renew, and drop credentials
//! - [`Renewer`] - Trait for the network call that exchanges a renewal token
//! - [`SessionStore`] - In-memory store delegating renewal to a [`Renewer`]
//! - [`HttpRenewer`] - [`Renewer`] posting to a JWT-style refresh endpoint
//!
//! # Example
//!
//! ```rust,ignore
//! use authrelay_core::store::{CredentialStore, HttpRenewer, SessionStore};
//! use authrelay_core::Credential;
//!
//! let renewer = HttpRenewer::new(reqwest::Client::new(), refresh_url);
//! let store = SessionStore::with_credential(
//!     Credential::new("access").with_renewal("refresh"),
//!     renewer,
//! );
//!
//! let mut session = store.subscribe();
//! // react to forced logout
//! session.changed().await?;
//! ```

use async_trait::async_trait;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::credential::Credential;
use crate::error::RenewalError;

mod http;
mod session;

pub use http::HttpRenewer;
pub use session::SessionStore;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value.
/// Memory is zeroed when the secret is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Lifecycle of the session held by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No credential has been provided yet.
    SignedOut,
    /// A credential is held.
    Active,
    /// The credential was dropped after an unrecoverable rejection;
    /// the user must authenticate again.
    Invalidated,
}

/// Holder of the current credential, as seen by the relay.
///
/// The relay reads [`current`](CredentialStore::current) on every dispatch,
/// calls [`renew`](CredentialStore::renew) at most once concurrently, commits
/// the result, and calls [`invalidate`](CredentialStore::invalidate) when the
/// session cannot be recovered.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The credential to attach to the next request.
    fn current(&self) -> Option<Credential>;

    /// Whether a renewal token is available.
    fn has_renewal_credential(&self) -> bool {
        self.current().is_some_and(|c| c.renewal().is_some())
    }

    /// Exchange the renewal token for a fresh credential.
    ///
    /// Must not commit the result; the caller does.
    async fn renew(&self) -> Result<Credential, RenewalError>;

    /// Replace the current credential.
    fn commit(&self, credential: Credential);

    /// Drop the current credential and require re-authentication.
    fn invalidate(&self);
}

/// The network call behind [`SessionStore::renew`].
#[async_trait]
pub trait Renewer: Send + Sync {
    /// Exchange `current`'s renewal token for a new credential.
    async fn renew(&self, current: &Credential) -> Result<Credential, RenewalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("super-secret");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_secret_display_redacted() {
        let secret = Secret::new("super-secret");
        let display = format!("{}", secret);
        assert!(!display.contains("super-secret"));
        assert!(display.contains("REDACTED"));
    }

    #[test]
    fn test_secret_into_inner() {
        let secret = Secret::new("value");
        assert_eq!(secret.clone().into_inner(), "value");
        assert_eq!(secret, Secret::new("value"));
    }
}
