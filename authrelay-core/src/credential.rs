//! The access/renewal token pair identifying a session.

use chrono::{DateTime, Utc};

use crate::store::Secret;

/// Scheme used in the authorization header when neither the credential nor
/// the configuration names one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Environment variable prefix used by [`Credential::from_env`].
pub const DEFAULT_ENV_PREFIX: &str = "AUTHRELAY";

/// A session credential: a short-lived access token plus an optional
/// long-lived renewal token.
///
/// The relay never inspects token contents; it only attaches the access
/// token to requests and hands the whole credential to the store for renewal.
#[derive(Debug, Clone)]
pub struct Credential {
    access: Secret,
    renewal: Option<Secret>,
    /// Scheme issued with the token; `None` defers to the configured scheme.
    token_type: Option<String>,
    issued_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential with only an access token.
    pub fn new(access: impl Into<String>) -> Self {
        Self {
            access: Secret::new(access),
            renewal: None,
            token_type: None,
            issued_at: Utc::now(),
        }
    }

    /// Attach a renewal token.
    pub fn with_renewal(mut self, renewal: impl Into<String>) -> Self {
        self.renewal = Some(Secret::new(renewal));
        self
    }

    /// Set the scheme the token was issued for, overriding the configured one.
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    pub fn access(&self) -> &Secret {
        &self.access
    }

    pub fn renewal(&self) -> Option<&Secret> {
        self.renewal.as_ref()
    }

    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    /// When this credential was created or last renewed.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Time since this credential was created or last renewed.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.issued_at
    }

    /// Load a credential from `{prefix}_ACCESS_TOKEN` and
    /// `{prefix}_REFRESH_TOKEN`.
    ///
    /// Returns `None` if the access token variable is unset or empty.
    pub fn from_env(prefix: &str) -> Option<Self> {
        let access = std::env::var(format!("{}_ACCESS_TOKEN", prefix))
            .ok()
            .filter(|v| !v.is_empty())?;

        let mut credential = Self::new(access);
        if let Some(renewal) = std::env::var(format!("{}_REFRESH_TOKEN", prefix))
            .ok()
            .filter(|v| !v.is_empty())
        {
            credential = credential.with_renewal(renewal);
        }

        tracing::debug!(
            prefix,
            has_renewal = credential.renewal.is_some(),
            "loaded credential from environment"
        );
        Some(credential)
    }
}
