//! # authrelay Core
//!
//! Client-side HTTP access layer that attaches short-lived credentials to
//! outgoing requests and recovers from credential expiry without disrupting
//! callers.
//!
//! This crate provides:
//! - [`RelayClient`] - authenticated client with single-flight credential renewal
//! - [`BareClient`] - unauthenticated client sharing the same conventions
//! - [`RefreshCoordinator`] - the renewal state machine and its waiter queue
//! - [`CredentialStore`] and [`SessionStore`] - where credentials live
//! - [`Transport`] and [`ReqwestTransport`] - how requests are sent
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use authrelay_core::{Credential, HttpRenewer, RelayClient, RelayConfig, SessionStore};
//!
//! async fn fetch(config: RelayConfig) -> Result<String, authrelay_core::RelayError> {
//!     let renewer = HttpRenewer::new(reqwest::Client::new(), config.refresh_endpoint()?);
//!     let store = Arc::new(SessionStore::with_credential(
//!         Credential::new("access").with_renewal("refresh"),
//!         renewer,
//!     ));
//!     let client = RelayClient::new(config, store);
//!
//!     // A 401 here triggers one renewal shared by every concurrent request,
//!     // then this request is replayed with the fresh credential.
//!     let response = client.get("/article/source_articles/").await?;
//!     Ok(response.text())
//! }
//! ```

pub mod classify;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod credential;
pub mod decorate;
pub mod error;
pub mod model;
pub mod store;
pub mod transport;

// Re-export commonly used types at crate root
pub use classify::{Classification, FailureClassifier};

pub use client::{BareClient, RelayClient};

pub use config::RelayConfig;

pub use coordinator::{Phase, RefreshCoordinator, Replay, SharedRenewal};

pub use credential::Credential;

pub use decorate::RequestDecorator;

pub use error::{RelayError, RenewalError, Result, TransportError};

pub use model::{Outcome, RequestDescriptor, Response};

pub use store::{
    CredentialStore,
    HttpRenewer,
    Renewer,
    Secret,
    SessionState,
    SessionStore,
};

pub use transport::{ReqwestTransport, Transport};
