//! Integration tests for credential renewal through the relay client.
//!
//! These tests drive [`RelayClient`] against an in-process transport and
//! verify that:
//! - Concurrent rejections share a single renewal
//! - Every queued request is replayed once, in arrival order, with the fresh credential
//! - A failed renewal invalidates the session once and fails every queued request
//! - A replayed request is never renewed a second time
//! - Other failures bypass renewal entirely

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use reqwest::StatusCode;
use tokio::sync::Semaphore;

use authrelay_core::{
    BareClient, Credential, CredentialStore, Phase, RelayClient, RelayConfig, RelayError,
    RenewalError, Renewer, RequestDescriptor, Response, SessionState, SessionStore, Transport,
    TransportError,
};

/// One request as seen by the fake server.
#[derive(Debug, Clone)]
struct Sent {
    path: String,
    authorization: Option<String>,
    body: Option<Vec<u8>>,
}

/// Accepts only `Bearer fresh`, except for a few fixed paths:
/// - `/broken` always answers 500
/// - `/always-denied` always answers 401
/// - `/public` always answers 200
#[derive(Clone, Default)]
struct FakeServer {
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl FakeServer {
    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    fn sent_to(&self, path: &str) -> Vec<Sent> {
        self.sent().into_iter().filter(|s| s.path == path).collect()
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn send(&self, request: RequestDescriptor) -> Result<Response, TransportError> {
        let path = request.url().path().to_string();
        let authorization = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        self.sent.lock().push(Sent {
            path: path.clone(),
            authorization: authorization.clone(),
            body: request.body().map(<[u8]>::to_vec),
        });

        let status = match path.as_str() {
            "/broken" => StatusCode::INTERNAL_SERVER_ERROR,
            "/always-denied" => StatusCode::UNAUTHORIZED,
            "/public" => StatusCode::OK,
            _ if authorization.as_deref() == Some("Bearer fresh") => StatusCode::OK,
            _ => StatusCode::UNAUTHORIZED,
        };

        Ok(Response::new(
            request.url().clone(),
            status,
            HeaderMap::new(),
            format!("{} {}", status.as_u16(), path),
        ))
    }
}

/// Renewer that counts calls and waits for a permit before answering.
struct TestRenewer {
    calls: AtomicUsize,
    gate: Semaphore,
    succeed: bool,
}

impl TestRenewer {
    fn open(succeed: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            gate: Semaphore::new(Semaphore::MAX_PERMITS),
            succeed,
        }
    }

    fn gated(succeed: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            gate: Semaphore::new(0),
            succeed,
        }
    }

    fn release(&self) {
        self.gate.add_permits(1);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renewer for TestRenewer {
    async fn renew(&self, current: &Credential) -> Result<Credential, RenewalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| RenewalError::Network {
                message: e.to_string(),
            })?;

        if self.succeed {
            let renewal = current.renewal().map(|r| r.expose()).unwrap_or_default();
            Ok(Credential::new("fresh").with_renewal(renewal))
        } else {
            Err(RenewalError::Rejected { status: 401 })
        }
    }
}

/// Session store wrapper counting invalidations.
struct CountingStore {
    inner: SessionStore<TestRenewer>,
    invalidations: AtomicUsize,
}

impl CountingStore {
    fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    fn renewer(&self) -> &TestRenewer {
        self.inner.renewer()
    }
}

#[async_trait]
impl CredentialStore for CountingStore {
    fn current(&self) -> Option<Credential> {
        self.inner.current()
    }

    async fn renew(&self) -> Result<Credential, RenewalError> {
        self.inner.renew().await
    }

    fn commit(&self, credential: Credential) {
        self.inner.commit(credential);
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate();
    }
}

fn config() -> RelayConfig {
    RelayConfig::new("https://api.test/".parse().unwrap())
}

fn setup_with(
    credential: Credential,
    renewer: TestRenewer,
) -> (RelayClient<FakeServer>, Arc<CountingStore>) {
    let store = Arc::new(CountingStore {
        inner: SessionStore::with_credential(credential, renewer),
        invalidations: AtomicUsize::new(0),
    });
    let client = RelayClient::with_transport(config(), Arc::clone(&store), FakeServer::default());
    (client, store)
}

fn setup(renewer: TestRenewer) -> (RelayClient<FakeServer>, Arc<CountingStore>) {
    setup_with(Credential::new("stale").with_renewal("refresh"), renewer)
}

/// Spawn GETs one at a time, each only after the previous one has queued.
async fn spawn_queued(
    client: &RelayClient<FakeServer>,
    paths: &[&'static str],
) -> Vec<tokio::task::JoinHandle<Result<Response, RelayError>>> {
    let mut handles = Vec::new();
    for &path in paths {
        let task_client = client.clone();
        handles.push(tokio::spawn(async move { task_client.get(path).await }));
        while client.coordinator().waiting() < handles.len() {
            tokio::task::yield_now().await;
        }
    }
    handles
}

#[tokio::test]
async fn test_expired_request_is_replayed_with_fresh_credential() {
    let (client, store) = setup(TestRenewer::open(true));

    let response = client.get("/articles/").await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text(), "200 /articles/");
    assert_eq!(store.renewer().calls(), 1);

    let sent = client.transport().sent_to("/articles/");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].authorization.as_deref(), Some("Bearer stale"));
    assert_eq!(sent[1].authorization.as_deref(), Some("Bearer fresh"));

    assert_eq!(store.current().unwrap().access().expose(), "fresh");
    assert_eq!(client.coordinator().phase(), Phase::Idle);
}

#[tokio::test]
async fn test_concurrent_rejections_share_one_renewal() {
    let (client, store) = setup(TestRenewer::gated(true));

    let paths = ["/a/", "/b/", "/c/"];
    let handles = spawn_queued(&client, &paths).await;

    assert_eq!(client.coordinator().phase(), Phase::Refreshing);
    assert_eq!(store.renewer().calls(), 1);

    store.renewer().release();
    for (handle, path) in handles.into_iter().zip(paths) {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.text(), format!("200 {}", path));
    }

    assert_eq!(store.renewer().calls(), 1);
    assert_eq!(store.invalidations(), 0);

    // Each path: one rejected attempt, exactly one replay
    for path in paths {
        let sent = client.transport().sent_to(path);
        assert_eq!(sent.len(), 2, "{} should be sent twice", path);
        assert_eq!(sent[1].authorization.as_deref(), Some("Bearer fresh"));
    }

    // Replays go out in arrival order
    let replayed: Vec<String> = client
        .transport()
        .sent()
        .into_iter()
        .filter(|s| s.authorization.as_deref() == Some("Bearer fresh"))
        .map(|s| s.path)
        .collect();
    assert_eq!(replayed, paths);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_replays_keep_arrival_order_across_workers() {
    let paths: [&'static str; 16] = [
        "/p0/", "/p1/", "/p2/", "/p3/", "/p4/", "/p5/", "/p6/", "/p7/", "/p8/", "/p9/",
        "/p10/", "/p11/", "/p12/", "/p13/", "/p14/", "/p15/",
    ];

    for _ in 0..50 {
        let (client, store) = setup(TestRenewer::gated(true));
        let handles = spawn_queued(&client, &paths).await;

        store.renewer().release();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().status(), StatusCode::OK);
        }

        let replayed: Vec<String> = client
            .transport()
            .sent()
            .into_iter()
            .filter(|s| s.authorization.as_deref() == Some("Bearer fresh"))
            .map(|s| s.path)
            .collect();
        assert_eq!(replayed, paths);
        assert_eq!(store.renewer().calls(), 1);
    }
}

#[tokio::test]
async fn test_failed_renewal_fails_every_waiter_with_original_error() {
    let (client, store) = setup(TestRenewer::gated(false));
    let mut session = store.inner.subscribe();
    session.borrow_and_update();

    let paths = ["/a/", "/b/", "/c/"];
    let handles = spawn_queued(&client, &paths).await;

    store.renewer().release();
    for (handle, path) in handles.into_iter().zip(paths) {
        match handle.await.unwrap() {
            Err(RelayError::CredentialExpired { response }) => {
                assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
                assert_eq!(response.url().path(), path);
            }
            other => panic!("expected CredentialExpired, got {:?}", other),
        }
    }

    assert_eq!(store.renewer().calls(), 1);
    assert_eq!(store.invalidations(), 1);
    assert!(store.current().is_none());

    session.changed().await.unwrap();
    assert_eq!(*session.borrow(), SessionState::Invalidated);

    // No replays: one attempt per path
    for path in paths {
        assert_eq!(client.transport().sent_to(path).len(), 1);
    }
    assert_eq!(client.coordinator().phase(), Phase::Idle);
    assert_eq!(client.coordinator().waiting(), 0);
}

#[tokio::test]
async fn test_replay_rejected_again_is_terminal() {
    let (client, store) = setup(TestRenewer::open(true));

    let result = client.get("/always-denied").await;

    match result {
        Err(RelayError::AlreadyRetried { response }) => {
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
        other => panic!("expected AlreadyRetried, got {:?}", other),
    }
    assert_eq!(store.renewer().calls(), 1);
    assert_eq!(store.invalidations(), 1);

    let sent = client.transport().sent_to("/always-denied");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].authorization.as_deref(), Some("Bearer fresh"));
}

#[tokio::test]
async fn test_other_failures_bypass_renewal() {
    let (client, store) = setup(TestRenewer::open(true));

    let result = client.get("/broken").await;

    match result {
        Err(RelayError::Status { response }) => {
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
        other => panic!("expected Status, got {:?}", other),
    }
    assert_eq!(store.renewer().calls(), 0);
    assert_eq!(store.invalidations(), 0);
    assert_eq!(store.current().unwrap().access().expose(), "stale");
    assert_eq!(client.transport().sent_to("/broken").len(), 1);
}

#[tokio::test]
async fn test_no_renewal_credential_invalidates_session() {
    let (client, store) = setup_with(Credential::new("stale"), TestRenewer::open(true));

    let result = client.get("/articles/").await;

    assert!(matches!(result, Err(RelayError::CredentialExpired { .. })));
    assert!(result.unwrap_err().requires_reauthentication());
    assert_eq!(store.renewer().calls(), 0);
    assert_eq!(store.invalidations(), 1);
    assert_eq!(client.transport().sent_to("/articles/").len(), 1);
}

#[tokio::test]
async fn test_requests_after_renewal_use_fresh_credential_directly() {
    let (client, store) = setup(TestRenewer::open(true));

    client.get("/first/").await.unwrap();
    client.get("/second/").await.unwrap();

    let sent = client.transport().sent_to("/second/");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].authorization.as_deref(), Some("Bearer fresh"));
    assert_eq!(store.renewer().calls(), 1);
}

#[tokio::test]
async fn test_replay_preserves_method_and_body() {
    let (client, _store) = setup(TestRenewer::open(true));

    let body = serde_json::json!({"title": "draft", "content": "text"});
    client.patch_json("/article/7/", &body).await.unwrap();

    let sent = client.transport().sent_to("/article/7/");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].body, sent[1].body);
    let replayed: serde_json::Value = serde_json::from_slice(sent[1].body.as_ref().unwrap()).unwrap();
    assert_eq!(replayed, body);
}

#[tokio::test]
async fn test_renewal_cycles_back_to_idle() {
    let (client, store) = setup(TestRenewer::open(true));

    client.get("/one/").await.unwrap();
    assert_eq!(client.coordinator().phase(), Phase::Idle);

    // Credential expires again later: a second, separate renewal is allowed
    store.commit(Credential::new("stale").with_renewal("refresh"));
    client.get("/two/").await.unwrap();

    assert_eq!(store.renewer().calls(), 2);
    assert_eq!(client.coordinator().phase(), Phase::Idle);
}

#[tokio::test]
async fn test_bare_client_never_sends_credential() {
    let server = FakeServer::default();
    let client = BareClient::with_transport(config(), server.clone());

    let response = client.get("/public").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let denied = client.get("/articles/").await;
    assert!(matches!(denied, Err(RelayError::Status { .. })));

    assert!(server.sent().iter().all(|s| s.authorization.is_none()));
    assert_eq!(server.sent_to("/articles/").len(), 1);
}
