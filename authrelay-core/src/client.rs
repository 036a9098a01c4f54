//! Relay clients.
//!
//! - [`RelayClient`] attaches the session credential to every request and
//!   recovers from expired credentials through the [`RefreshCoordinator`].
//! - [`BareClient`] sends requests as-is, for endpoints outside the session.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use reqwest::Method;
use serde::Serialize;

use crate::classify::{Classification, FailureClassifier};
use crate::config::RelayConfig;
use crate::coordinator::{RefreshCoordinator, Replay};
use crate::decorate::RequestDecorator;
use crate::error::{RelayError, Result};
use crate::model::{Outcome, RequestDescriptor, Response};
use crate::store::CredentialStore;
use crate::transport::{ReqwestTransport, Transport};

/// Decorator → transport → classifier → coordinator.
struct Pipeline<T> {
    transport: T,
    store: Arc<dyn CredentialStore>,
    decorator: RequestDecorator,
    classifier: FailureClassifier,
    coordinator: RefreshCoordinator,
}

impl<T: Transport + 'static> Pipeline<T> {
    async fn execute(self: Arc<Self>, descriptor: RequestDescriptor) -> Result<Response> {
        // Read at dispatch time so replays pick up the renewed credential
        let credential = self.store.current();
        let request = self.decorator.decorate(&descriptor, credential.as_ref());

        tracing::debug!(
            request_id = %descriptor.id(),
            method = %descriptor.method(),
            url = %descriptor.url(),
            retried = descriptor.is_retried(),
            "dispatching request"
        );

        let failure = match self.transport.send(request).await?.into_outcome() {
            Outcome::Success(response) => return Ok(response),
            Outcome::Failure(response) => response,
        };

        match self.classifier.classify(&failure) {
            Classification::Other => Err(RelayError::Status { response: failure }),
            Classification::CredentialExpired => {
                let coordinator = self.coordinator.clone();
                coordinator.handle_expired(self, descriptor, failure).await
            }
        }
    }
}

impl<T: Transport + 'static> Replay for Pipeline<T> {
    fn replay(self: Arc<Self>, descriptor: RequestDescriptor) -> BoxFuture<'static, Result<Response>> {
        self.execute(descriptor).boxed()
    }
}

/// HTTP client that carries the session credential.
///
/// Requests rejected with the configured expired status are held while the
/// credential is renewed (once, however many requests are rejected) and then
/// replayed. Cloning is cheap and clones share the session.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use authrelay_core::{Credential, HttpRenewer, RelayClient, RelayConfig, SessionStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RelayConfig::new("https://example.com/api/v1/".parse()?);
/// let renewer = HttpRenewer::new(reqwest::Client::new(), config.refresh_endpoint()?);
/// let store = Arc::new(SessionStore::with_credential(
///     Credential::new("access").with_renewal("refresh"),
///     renewer,
/// ));
///
/// let client = RelayClient::new(config, store);
/// let articles = client.get("/article/published_articles/").await?;
/// println!("{}", articles.text());
/// # Ok(())
/// # }
/// ```
pub struct RelayClient<T = ReqwestTransport> {
    config: Arc<RelayConfig>,
    pipeline: Arc<Pipeline<T>>,
}

impl RelayClient<ReqwestTransport> {
    /// Create a client using the default `reqwest` transport.
    pub fn new<S: CredentialStore + 'static>(config: RelayConfig, store: Arc<S>) -> Self {
        let transport = ReqwestTransport::from_config(&config);
        Self::with_transport(config, store, transport)
    }
}

impl<T: Transport + 'static> RelayClient<T> {
    /// Create a client over a custom transport.
    pub fn with_transport<S: CredentialStore + 'static>(
        config: RelayConfig,
        store: Arc<S>,
        transport: T,
    ) -> Self {
        let store: Arc<dyn CredentialStore> = store;
        let pipeline = Pipeline {
            transport,
            decorator: RequestDecorator::from_config(&config),
            classifier: FailureClassifier::from_config(&config),
            coordinator: RefreshCoordinator::new(Arc::clone(&store)),
            store,
        };

        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.pipeline.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.pipeline.coordinator
    }

    pub fn transport(&self) -> &T {
        &self.pipeline.transport
    }

    /// Build a descriptor for `path`, resolved against the base URL.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestDescriptor> {
        Ok(RequestDescriptor::new(method, self.config.resolve(path)?))
    }

    /// Run a descriptor through the pipeline.
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<Response> {
        Arc::clone(&self.pipeline).execute(descriptor).await
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        self.execute(self.request(Method::GET, path)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response> {
        self.execute(self.request(Method::DELETE, path)?).await
    }

    /// POST without a body.
    pub async fn post(&self, path: &str) -> Result<Response> {
        self.execute(self.request(Method::POST, path)?).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response> {
        self.execute(self.request(Method::POST, path)?.with_json(body)?)
            .await
    }

    pub async fn put_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response> {
        self.execute(self.request(Method::PUT, path)?.with_json(body)?)
            .await
    }

    pub async fn patch_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response> {
        self.execute(self.request(Method::PATCH, path)?.with_json(body)?)
            .await
    }
}

impl<T> Clone for RelayClient<T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

impl<T> std::fmt::Debug for RelayClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("coordinator", &self.pipeline.coordinator)
            .finish()
    }
}

/// HTTP client for endpoints that need no credential.
///
/// Never attaches a credential and never renews one; every non-success
/// status is returned as [`RelayError::Status`].
#[derive(Debug, Clone)]
pub struct BareClient<T = ReqwestTransport> {
    config: Arc<RelayConfig>,
    transport: T,
}

impl BareClient<ReqwestTransport> {
    pub fn new(config: RelayConfig) -> Self {
        let transport = ReqwestTransport::from_config(&config);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> BareClient<T> {
    pub fn with_transport(config: RelayConfig, transport: T) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn request(&self, method: Method, path: &str) -> Result<RequestDescriptor> {
        Ok(RequestDescriptor::new(method, self.config.resolve(path)?))
    }

    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<Response> {
        tracing::debug!(
            request_id = %descriptor.id(),
            method = %descriptor.method(),
            url = %descriptor.url(),
            "dispatching unauthenticated request"
        );

        match self.transport.send(descriptor).await?.into_outcome() {
            Outcome::Success(response) => Ok(response),
            Outcome::Failure(response) => Err(RelayError::Status { response }),
        }
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        self.execute(self.request(Method::GET, path)?).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response> {
        self.execute(self.request(Method::POST, path)?.with_json(body)?)
            .await
    }
}
