//! Single-flight credential renewal.
//!
//! [`RefreshCoordinator`] decides what happens to a request whose credential
//! was rejected:
//!
//! - If no renewal is running, the request becomes the trigger: a renewal is
//!   started and the request is queued behind it.
//! - If a renewal is running, the request is queued behind it. No second
//!   renewal is started, however many requests fail.
//! - If the request was already replayed once, or there is no renewal
//!   credential, the session is invalidated and the request fails.
//!
//! When the renewal resolves, the queue is drained in arrival order. On
//! success the fresh credential is committed and every queued request is
//! replayed through the pipeline. On failure the session is invalidated and
//! every queued request fails with its own original rejection.
//!
//! The renewal and the replays run on a single spawned task, so they complete
//! and resolve every waiter even if the trigger's caller goes away.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::credential::Credential;
use crate::error::{RelayError, RenewalError};
use crate::model::{RequestDescriptor, Response};
use crate::store::CredentialStore;

/// A renewal in flight, awaitable by any number of observers.
pub type SharedRenewal = Shared<BoxFuture<'static, Result<Credential, RenewalError>>>;

/// Coordinator phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Refreshing,
}

/// Re-dispatches a descriptor through the full request pipeline.
///
/// Called at most once per descriptor, after its `retried` flag is set.
pub trait Replay: Send + Sync + 'static {
    fn replay(
        self: Arc<Self>,
        descriptor: RequestDescriptor,
    ) -> BoxFuture<'static, Result<Response, RelayError>>;
}

/// A request paused behind the in-flight renewal.
struct Continuation {
    descriptor: RequestDescriptor,
    /// The rejection that queued this request, surfaced if renewal fails.
    expired: Response,
    resume: oneshot::Sender<Result<Response, RelayError>>,
}

/// `inflight` is `Some` and `waiters` may be non-empty only while
/// `phase == Refreshing`.
struct RefreshState {
    phase: Phase,
    inflight: Option<SharedRenewal>,
    waiters: VecDeque<Continuation>,
}

impl RefreshState {
    fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            inflight: None,
            waiters: VecDeque::new(),
        }
    }

    /// Return to `Idle`, handing back every queued continuation.
    fn settle(&mut self) -> VecDeque<Continuation> {
        self.phase = Phase::Idle;
        self.inflight = None;
        std::mem::take(&mut self.waiters)
    }
}

/// Owner of the renewal state machine and its waiter queue.
///
/// Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct RefreshCoordinator {
    state: Arc<Mutex<RefreshState>>,
    store: Arc<dyn CredentialStore>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RefreshState::idle())),
            store,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// Number of requests queued behind the in-flight renewal.
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// The in-flight renewal, if any.
    pub fn pending_renewal(&self) -> Option<SharedRenewal> {
        self.state.lock().inflight.clone()
    }

    /// Recover a request whose credential was rejected with `expired`.
    ///
    /// Resolves to the replayed response, or to a terminal error once the
    /// renewal fails or the request has already been replayed.
    pub async fn handle_expired<R: Replay>(
        &self,
        replay: Arc<R>,
        mut descriptor: RequestDescriptor,
        expired: Response,
    ) -> Result<Response, RelayError> {
        let request_id = descriptor.id();

        if descriptor.is_retried() {
            tracing::warn!(
                %request_id,
                url = %descriptor.url(),
                "credential rejected after renewal, invalidating session"
            );
            self.store.invalidate();
            return Err(RelayError::AlreadyRetried { response: expired });
        }

        if !self.store.has_renewal_credential() {
            tracing::warn!(
                %request_id,
                url = %descriptor.url(),
                "credential rejected and no renewal credential held, invalidating session"
            );
            self.store.invalidate();
            return Err(RelayError::CredentialExpired { response: expired });
        }

        descriptor.mark_retried();
        let (resume, resumed) = oneshot::channel();

        let started = {
            let mut state = self.state.lock();
            state.waiters.push_back(Continuation {
                descriptor,
                expired,
                resume,
            });

            match state.phase {
                Phase::Refreshing => {
                    tracing::debug!(
                        %request_id,
                        waiters = state.waiters.len(),
                        "joined in-flight credential renewal"
                    );
                    None
                }
                Phase::Idle => {
                    let renewal = self.start_renewal();
                    state.phase = Phase::Refreshing;
                    state.inflight = Some(renewal.clone());
                    Some(renewal)
                }
            }
        };

        if let Some(renewal) = started {
            tracing::info!(%request_id, "credential rejected, starting renewal");
            tokio::spawn(self.clone().complete(renewal, replay));
        }

        resumed.await.map_err(|_| RelayError::Abandoned)?
    }

    fn start_renewal(&self) -> SharedRenewal {
        let store = Arc::clone(&self.store);
        async move {
            AssertUnwindSafe(store.renew())
                .catch_unwind()
                .await
                .unwrap_or(Err(RenewalError::Panicked))
        }
        .boxed()
        .shared()
    }

    /// Await the renewal, then drain the queue.
    async fn complete<R: Replay>(self, renewal: SharedRenewal, replay: Arc<R>) {
        let outcome = renewal.await;

        // Commit or invalidate in the same critical section as the return to
        // Idle, so a rejection arriving next sees the settled store.
        let waiters = {
            let mut state = self.state.lock();
            match &outcome {
                Ok(credential) => self.store.commit(credential.clone()),
                Err(_) => self.store.invalidate(),
            }
            state.settle()
        };

        match outcome {
            Ok(_) => {
                tracing::info!(
                    waiters = waiters.len(),
                    "credential renewed, replaying queued requests"
                );
                // Polled in queue order, so replays reach the transport in
                // arrival order; each waiter resumes as soon as its own
                // replay resolves.
                let replays = waiters.into_iter().map(|continuation| {
                    let replay = Arc::clone(&replay);
                    async move {
                        let result = replay.replay(continuation.descriptor).await;
                        let _ = continuation.resume.send(result);
                    }
                });
                future::join_all(replays).await;
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    waiters = waiters.len(),
                    "credential renewal failed, failing queued requests"
                );
                for continuation in waiters {
                    let _ = continuation.resume.send(Err(RelayError::CredentialExpired {
                        response: continuation.expired,
                    }));
                }
            }
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RefreshCoordinator")
            .field("phase", &state.phase)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}
