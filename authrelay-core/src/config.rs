//! Relay configuration.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::HeaderName;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::credential::{DEFAULT_ENV_PREFIX, DEFAULT_TOKEN_TYPE};

/// Settings shared by the relay client, transport, and renewer.
///
/// Every field has a default, so a partial TOML file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL that relative request paths are resolved against.
    pub base_url: Url,

    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,

    /// Renewal endpoint, absolute or relative to `base_url`.
    pub refresh_url: String,

    /// Status code that signals an expired credential.
    pub expired_status: u16,

    /// Header the credential is attached to.
    pub auth_header: String,

    /// Scheme prefixed to the token in `auth_header`.
    pub auth_scheme: String,

    /// Prefix for credential environment variables.
    pub env_prefix: String,

    /// Logging level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: 10_000,
            refresh_url: "/token/refresh/".to_string(),
            expired_status: 401,
            auth_header: "Authorization".to_string(),
            auth_scheme: DEFAULT_TOKEN_TYPE.to_string(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            log_level: "info".to_string(),
        }
    }
}

fn default_base_url() -> Url {
    Url::parse("http://localhost:8000/api/v1/").expect("default base url should be valid")
}

impl RelayConfig {
    /// Create a config pointing at `base_url` with default settings.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve a request path against the base URL.
    ///
    /// Leading slashes are treated as relative to the base path, so
    /// `/articles/` under `https://host/api/v1/` becomes
    /// `https://host/api/v1/articles/`. Absolute URLs are kept as-is.
    pub fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
        if let Ok(absolute) = Url::parse(path) {
            return Ok(absolute);
        }
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
    }

    /// The renewal endpoint as an absolute URL.
    pub fn refresh_endpoint(&self) -> Result<Url, url::ParseError> {
        self.resolve(&self.refresh_url)
    }

    /// The expired-credential status as a [`StatusCode`].
    ///
    /// Falls back to 401 if the configured value is not a valid code.
    pub fn expired_status(&self) -> StatusCode {
        StatusCode::from_u16(self.expired_status).unwrap_or(StatusCode::UNAUTHORIZED)
    }

    /// The credential header as a [`HeaderName`].
    ///
    /// Falls back to `Authorization` if the configured name is invalid.
    pub fn auth_header(&self) -> HeaderName {
        HeaderName::from_bytes(self.auth_header.as_bytes())
            .unwrap_or(reqwest::header::AUTHORIZATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.expired_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(config.auth_header(), reqwest::header::AUTHORIZATION);
        assert_eq!(config.auth_scheme, "Bearer");
    }

    #[test]
    fn test_resolve_relative_paths() {
        let config = RelayConfig::new(Url::parse("https://host/api/v1").unwrap());

        assert_eq!(
            config.resolve("/article/source_articles/").unwrap().as_str(),
            "https://host/api/v1/article/source_articles/"
        );
        assert_eq!(
            config.resolve("pages/snapshot/").unwrap().as_str(),
            "https://host/api/v1/pages/snapshot/"
        );
        assert_eq!(
            config.resolve("https://other/x").unwrap().as_str(),
            "https://other/x"
        );
    }

    #[test]
    fn test_refresh_endpoint() {
        let config = RelayConfig::new(Url::parse("https://host/api/v1/").unwrap());
        assert_eq!(
            config.refresh_endpoint().unwrap().as_str(),
            "https://host/api/v1/token/refresh/"
        );
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = RelayConfig {
            expired_status: 42,
            auth_header: "bad header".to_string(),
            ..RelayConfig::default()
        };
        assert_eq!(config.expired_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(config.auth_header(), reqwest::header::AUTHORIZATION);
    }

    #[test]
    fn test_partial_deserialize() {
        let config: RelayConfig =
            serde_json::from_str(r#"{"base_url": "https://example.com/", "timeout_ms": 500}"#)
                .unwrap();
        assert_eq!(config.base_url.as_str(), "https://example.com/");
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.refresh_url, "/token/refresh/");
    }
}
