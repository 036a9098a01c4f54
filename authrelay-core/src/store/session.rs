//! In-memory session store.

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::watch;

use super::{CredentialStore, Renewer, SessionState};
use crate::credential::Credential;
use crate::error::RenewalError;

/// In-memory credential store that delegates renewal to a [`Renewer`].
///
/// Session state changes are published on a `watch` channel so the
/// surrounding application can react to forced logout.
///
/// # Thread Safety
///
/// This implementation uses interior mutability via `RwLock` and is
/// safe to share across threads.
pub struct SessionStore<R: Renewer> {
    credential: RwLock<Option<Credential>>,
    renewer: R,
    state: watch::Sender<SessionState>,
}

impl<R: Renewer> SessionStore<R> {
    /// Create a signed-out store.
    pub fn new(renewer: R) -> Self {
        let (state, _) = watch::channel(SessionState::SignedOut);
        Self {
            credential: RwLock::new(None),
            renewer,
            state,
        }
    }

    /// Create a store holding `credential`.
    pub fn with_credential(credential: Credential, renewer: R) -> Self {
        let store = Self::new(renewer);
        store.sign_in(credential);
        store
    }

    /// Install a credential obtained from an authentication flow.
    pub fn sign_in(&self, credential: Credential) {
        *self.credential.write() = Some(credential);
        self.state.send_replace(SessionState::Active);
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Subscribe to session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn renewer(&self) -> &R {
        &self.renewer
    }
}

impl<R: Renewer> std::fmt::Debug for SessionStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &self.state())
            .field("has_credential", &self.credential.read().is_some())
            .finish()
    }
}

#[async_trait]
impl<R: Renewer> CredentialStore for SessionStore<R> {
    fn current(&self) -> Option<Credential> {
        self.credential.read().clone()
    }

    async fn renew(&self) -> Result<Credential, RenewalError> {
        let current = self.current().ok_or(RenewalError::NoRenewalCredential)?;
        if current.renewal().is_none() {
            return Err(RenewalError::NoRenewalCredential);
        }
        tracing::debug!(
            credential_age_secs = current.age().num_seconds(),
            "renewing credential"
        );
        self.renewer.renew(&current).await
    }

    fn commit(&self, credential: Credential) {
        *self.credential.write() = Some(credential);
        self.state.send_replace(SessionState::Active);
    }

    fn invalidate(&self) {
        let dropped = self.credential.write().take();
        self.state.send_replace(SessionState::Invalidated);
        match dropped {
            Some(credential) => tracing::info!(
                credential_age_secs = credential.age().num_seconds(),
                "session invalidated, re-authentication required"
            ),
            None => tracing::debug!("session already invalidated"),
        }
    }
}
