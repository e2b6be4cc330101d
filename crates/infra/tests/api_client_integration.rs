//! End-to-end tests for the API client
//!
//! Drives the real reqwest transport and backend identity client against a
//! wiremock server, with recording navigator and notifier ports.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use ecm_core::ports::SessionStore;
use ecm_core::session::MemorySessionStore;
use ecm_core::testing::{MockNavigator, MockNotifier};
use ecm_core::BootstrapError;
use ecm_domain::constants::{
    GENERIC_FAILURE_NOTICE, SESSION_EXPIRED_NOTICE, TIMEOUT_NOTICE, TOKEN_KEY,
};
use ecm_domain::{
    Credentials, EcmConfig, EcmError, InitStatus, RedirectReason, RequestDescriptor,
    StorageScope, TimeoutBudgets,
};
use ecm_infra::{ApiClient, ApiError, FileSessionStore};
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn jwt_expiring_in(seconds: i64) -> String {
    let payload = json!({ "exp": Utc::now().timestamp() + seconds });
    format!("eyJhbGciOiJub25lIn0.{}.sig", URL_SAFE_NO_PAD.encode(payload.to_string()))
}

struct Harness {
    server: MockServer,
    store: Arc<MemorySessionStore>,
    navigator: Arc<MockNavigator>,
    notifier: Arc<MockNotifier>,
    client: ApiClient,
}

impl Harness {
    async fn start(token: Option<&str>) -> Self {
        Self::start_with(token, |_| {}).await
    }

    async fn start_with(token: Option<&str>, configure: impl FnOnce(&mut EcmConfig)) -> Self {
        let server = MockServer::start().await;
        let store = Arc::new(MemorySessionStore::new());
        if let Some(token) = token {
            store.set(StorageScope::Persistent, TOKEN_KEY, token).unwrap();
        }
        let navigator = Arc::new(MockNavigator::at("/documents"));
        let notifier = Arc::new(MockNotifier::new());

        let mut config = EcmConfig::default();
        config.http.base_url = format!("{}/api", server.uri());
        configure(&mut config);

        let client = ApiClient::builder()
            .config(config)
            .session_store(store.clone())
            .navigator(navigator.clone())
            .notifier(notifier.clone())
            .build()
            .unwrap();

        Self { server, store, navigator, notifier, client }
    }

    async fn requests_to(&self, route: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|request| request.url.path() == route)
            .count()
    }

    fn stored_token(&self) -> Option<String> {
        self.store.get(StorageScope::Persistent, TOKEN_KEY).unwrap()
    }
}

/// Validates the concurrent 401 recovery scenario.
///
/// Assertions:
/// - The failed pre-flight refresh and the recovery refresh are the only
///   refresh calls, whatever the interleaving
/// - Every request succeeds on its single retry with the rotated token
/// - No redirect or notice is produced
#[tokio::test]
async fn concurrent_unauthorized_requests_recover_with_one_rotation() {
    let old = jwt_expiring_in(5);
    let fresh = jwt_expiring_in(3_600);
    let h = Harness::start(Some(&old)).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": fresh })))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/documents"))
        .and(header("authorization", format!("Bearer {old}").as_str()))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/documents"))
        .and(header("authorization", format!("Bearer {fresh}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
        .mount(&h.server)
        .await;

    let results = join_all((0..3).map(|_| h.client.get::<Value>("/documents"))).await;

    for result in results {
        assert_eq!(result.unwrap(), json!([{ "id": 1 }]));
    }
    assert_eq!(h.requests_to("/api/auth/refresh").await, 2);
    assert_eq!(h.requests_to("/api/documents").await, 6);
    assert_eq!(h.stored_token(), Some(fresh));
    assert!(h.navigator.redirects().is_empty());
    assert!(h.notifier.messages().is_empty());
}

/// Validates the rejected session scenario.
///
/// Assertions:
/// - Every request fails with the original 401
/// - Exactly one redirect and one session-expired notice
/// - Markers record the expiry and the credential is cleared
#[tokio::test]
async fn rejected_refresh_redirects_once() {
    let h = Harness::start(Some(&jwt_expiring_in(5))).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;

    let results = join_all((0..3).map(|_| h.client.get::<Value>("/documents"))).await;

    for result in results {
        assert!(matches!(result, Err(ApiError::Auth { status: 401, .. })));
    }
    assert_eq!(h.navigator.redirects(), vec!["/login?reason=session_expired".to_string()]);
    assert_eq!(h.notifier.count_of(SESSION_EXPIRED_NOTICE), 1);
    assert_eq!(h.stored_token(), None);
    assert_eq!(h.client.markers().init_status().unwrap(), Some(InitStatus::SessionExpired));
    assert_eq!(
        h.client.markers().redirect_reason().unwrap(),
        Some(RedirectReason::SessionExpired)
    );
}

#[tokio::test]
async fn revoked_token_is_retried_once_before_redirect() {
    // claims look valid, so recovery resends with the same token
    let h = Harness::start(Some(&jwt_expiring_in(3_600))).await;
    Mock::given(method("GET"))
        .and(path("/api/documents"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;

    let result = h.client.get::<Value>("/documents").await;

    assert!(matches!(result, Err(ApiError::Auth { .. })));
    assert_eq!(h.requests_to("/api/documents").await, 2);
    assert_eq!(h.requests_to("/api/auth/refresh").await, 0);
    assert_eq!(h.navigator.redirects().len(), 1);
}

#[tokio::test]
async fn timeout_is_retried_once_then_notified() {
    let h = Harness::start_with(None, |config| {
        config.http.timeouts = TimeoutBudgets { read_ms: 50, ..TimeoutBudgets::default() };
    })
    .await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(400)))
        .mount(&h.server)
        .await;

    let result = h.client.get::<Value>("/search").await;

    assert!(matches!(result, Err(ApiError::Timeout(_))));
    assert_eq!(h.requests_to("/api/search").await, 2);
    assert_eq!(h.notifier.messages(), vec![TIMEOUT_NOTICE.to_string()]);
}

#[tokio::test]
async fn timeout_retry_can_succeed_silently() {
    let h = Harness::start_with(None, |config| {
        config.http.timeouts = TimeoutBudgets { read_ms: 100, ..TimeoutBudgets::default() };
    })
    .await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "hits": 0 })))
        .mount(&h.server)
        .await;

    let result: Value = h.client.get("/search").await.unwrap();

    assert_eq!(result, json!({ "hits": 0 }));
    assert!(h.notifier.messages().is_empty());
}

#[tokio::test]
async fn other_failures_surface_server_message_or_generic_notice() {
    let h = Harness::start(None).await;
    Mock::given(method("POST"))
        .and(path("/api/folders"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({ "message": "Folder already exists" })),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let conflict = h.client.post::<_, Value>("/folders", &json!({ "name": "a" })).await;
    let failure = h.client.delete::<Value>("/folders/1").await;

    assert!(matches!(conflict, Err(ApiError::Client { status: 409, .. })));
    assert!(matches!(failure, Err(ApiError::Server { status: 500, .. })));
    assert_eq!(
        h.notifier.messages(),
        vec!["Folder already exists".to_string(), GENERIC_FAILURE_NOTICE.to_string()]
    );
    assert!(h.navigator.redirects().is_empty());
}

#[tokio::test]
async fn cancelled_request_bypasses_recovery() {
    let h = Harness::start(None).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&h.server)
        .await;

    let token = CancellationToken::new();
    let request = RequestDescriptor::get("/documents").with_cancellation(token.clone());
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
    });

    let result = h.client.send(request).await;
    canceller.await.unwrap();

    assert_eq!(result.unwrap_err(), ApiError::Cancelled);
    assert!(h.notifier.messages().is_empty());
    assert!(h.navigator.redirects().is_empty());
}

#[tokio::test]
async fn upload_and_download_use_transfer_budgets() {
    let h = Harness::start_with(Some(&jwt_expiring_in(3_600)), |config| {
        config.http.timeouts = TimeoutBudgets {
            read_ms: 50,
            write_ms: 50,
            upload_ms: 5_000,
            download_ms: 5_000,
        };
    })
    .await;
    Mock::given(method("POST"))
        .and(path("/api/nodes/upload"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "id": "n-1" }))
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/nodes/n-1/content"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"%PDF-1.7".to_vec())
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&h.server)
        .await;

    let progress = Mutex::new(Vec::new());
    let created = h
        .client
        .upload_file("/nodes/upload", "report.pdf", b"%PDF-1.7".to_vec(), |p| {
            progress.lock().push(p)
        })
        .await
        .unwrap();
    let bytes = h.client.download("/nodes/n-1/content").await.unwrap();

    assert_eq!(created, json!({ "id": "n-1" }));
    assert_eq!(*progress.lock(), vec![0, 100]);
    assert_eq!(bytes, b"%PDF-1.7".to_vec());
    assert!(h.notifier.messages().is_empty());
}

#[tokio::test]
async fn success_clears_session_expired_marker() {
    let h = Harness::start(None).await;
    h.client.markers().set_init_status(InitStatus::SessionExpired).unwrap();
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&h.server)
        .await;

    h.client.put::<_, ()>("/nodes/1", &json!({ "name": "b" })).await.unwrap();

    assert_eq!(h.client.markers().init_status().unwrap(), None);
}

#[tokio::test]
async fn initialize_records_failure_after_retries() {
    let h = Harness::start_with(Some(&jwt_expiring_in(5)), |config| {
        config.auth.init_retry_delay_ms = 1;
    })
    .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;

    let result = h.client.initialize().await;

    assert!(matches!(result, Err(BootstrapError::Failed(EcmError::Auth(_)))));
    assert_eq!(h.requests_to("/api/auth/refresh").await, 2);
    assert_eq!(h.client.markers().init_status().unwrap(), Some(InitStatus::Error));
}

/// Validates the default port wiring scenario.
///
/// Assertions:
/// - A client built from configuration alone logs in over HTTP
/// - The issued token is attached to later requests
/// - The token is persisted in the configured session file
#[tokio::test]
async fn client_built_from_config_persists_login() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("session.json");
    let issued = jwt_expiring_in(3_600);

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "token": issued, "user": { "username": "alice" } })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("authorization", format!("Bearer {issued}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "username": "alice" })))
        .mount(&server)
        .await;

    let mut config = EcmConfig::default();
    config.http.base_url = format!("{}/api", server.uri());
    config.session.storage_path = Some(session_file.clone());
    let client = ApiClient::builder().config(config).build().unwrap();

    client.login(&Credentials::new("alice", "secret")).await.unwrap();
    let me: Value = client.get("/auth/me").await.unwrap();

    assert_eq!(me, json!({ "username": "alice" }));
    let reopened = FileSessionStore::open(&session_file).unwrap();
    assert_eq!(reopened.get(StorageScope::Persistent, TOKEN_KEY).unwrap(), Some(issued));
}

/// Validates the manual sign-in after repeated redirect failures scenario.
///
/// Assertions:
/// - The configured back-off reaches both the client and the guard markers
/// - A successful login clears the failure count and resumes redirects
#[tokio::test]
async fn login_clears_redirect_failure_back_off() {
    let h = Harness::start_with(None, |config| {
        config.session.redirect_max_auto_attempts = 1;
        config.session.redirect_failure_cooldown_ms = 60_000;
    })
    .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "token": jwt_expiring_in(3_600) })),
        )
        .mount(&h.server)
        .await;

    let now = Utc::now();
    h.client.markers().record_redirect_failure(now).unwrap();
    assert!(h.client.markers().is_auto_redirect_paused(now).unwrap());
    assert!(h.client.pipeline().guard().markers().is_auto_redirect_paused(now).unwrap());

    h.client.login(&Credentials::new("alice", "secret")).await.unwrap();

    assert_eq!(h.client.markers().redirect_failure_count().unwrap(), 0);
    assert!(!h.client.pipeline().guard().markers().is_auto_redirect_paused(Utc::now()).unwrap());
}
