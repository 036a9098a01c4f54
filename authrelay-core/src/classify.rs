//! Classification of failed responses.

use reqwest::StatusCode;

use crate::config::RelayConfig;
use crate::model::Response;

/// What a failed response means for the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The credential was rejected; renewal may recover the request.
    CredentialExpired,
    /// Anything else. Passed through to the caller untouched.
    Other,
}

/// Decides whether a failure is an expired credential.
#[derive(Debug, Clone, Copy)]
pub struct FailureClassifier {
    expired_status: StatusCode,
}

impl FailureClassifier {
    pub fn new(expired_status: StatusCode) -> Self {
        Self { expired_status }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.expired_status())
    }

    pub fn classify(&self, failure: &Response) -> Classification {
        if failure.status() == self.expired_status {
            Classification::CredentialExpired
        } else {
            Classification::Other
        }
    }
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::new(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    fn response(status: u16) -> Response {
        Response::new(
            "https://host/a".parse().unwrap(),
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            "",
        )
    }

    #[test]
    fn test_unauthorized_is_expired() {
        let classifier = FailureClassifier::default();
        assert_eq!(
            classifier.classify(&response(401)),
            Classification::CredentialExpired
        );
    }

    #[test]
    fn test_other_statuses() {
        let classifier = FailureClassifier::default();
        for status in [400, 403, 404, 429, 500, 502] {
            assert_eq!(classifier.classify(&response(status)), Classification::Other);
        }
    }

    #[test]
    fn test_custom_status() {
        let classifier = FailureClassifier::new(StatusCode::from_u16(419).unwrap());
        assert_eq!(
            classifier.classify(&response(419)),
            Classification::CredentialExpired
        );
        assert_eq!(classifier.classify(&response(401)), Classification::Other);
    }
}
