//! Attaches the current credential to outgoing requests.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::RelayConfig;
use crate::credential::Credential;
use crate::model::RequestDescriptor;

/// Builds the authorization header for a request.
///
/// Stateless. Called on every dispatch, including replays, so a request
/// built before a renewal still goes out with the fresh credential.
#[derive(Debug, Clone)]
pub struct RequestDecorator {
    header: HeaderName,
    scheme: String,
}

impl RequestDecorator {
    pub fn new(header: HeaderName, scheme: impl Into<String>) -> Self {
        Self {
            header,
            scheme: scheme.into(),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.auth_header(), config.auth_scheme.clone())
    }

    /// Return a copy of `descriptor` carrying `credential`.
    ///
    /// The credential's own token type wins over the configured scheme.
    /// Without a credential, or if the token cannot form a header value, the
    /// copy is returned without the header and a warning is logged.
    pub fn decorate(
        &self,
        descriptor: &RequestDescriptor,
        credential: Option<&Credential>,
    ) -> RequestDescriptor {
        let mut extra = HeaderMap::new();

        let Some(credential) = credential else {
            tracing::warn!(
                request_id = %descriptor.id(),
                url = %descriptor.url(),
                "no credential held, sending request without it"
            );
            return descriptor.decorated(extra);
        };

        let scheme = credential.token_type().unwrap_or(self.scheme.as_str());
        let value = format!("{} {}", scheme, credential.access().expose());
        match HeaderValue::from_str(&value) {
            Ok(mut value) => {
                value.set_sensitive(true);
                extra.insert(self.header.clone(), value);
            }
            Err(_) => {
                tracing::warn!(
                    request_id = %descriptor.id(),
                    "credential is not a valid header value, sending request without it"
                );
            }
        }

        descriptor.decorated(extra)
    }
}

impl Default for RequestDecorator {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}
