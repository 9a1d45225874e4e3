//! Stub scheduling API for integration tests.
//!
//! Serves the REST contract from an axum router on an ephemeral port, with
//! an [`InMemoryBackend`] holding the state. Bearer tokens map to fixed
//! actors; unknown tokens get 401.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use domain::models::{
    Actor, AlertSeverity, AlertStatus, AlertTransitionRequest, ApproveManualVerificationRequest,
    ListAlertsQuery, ProximityAlert, RejectManualVerificationRequest,
    SubmitManualVerificationRequest,
};
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

use visit_guard::config::BackendConfig;
use visit_guard::jobs::PollAlertsJob;
use visit_guard::{
    AlertFeed, AlertLifecycleManager, ClientError, HttpBackend, InMemoryBackend,
    ManualVerificationWorkflow, NoticeSink, ProximityBackend, RecordingNoticeSink,
};

pub const ADMIN_TOKEN: &str = "admin-token";
pub const SECOND_ADMIN_TOKEN: &str = "second-admin-token";
pub const THERAPIST_TOKEN: &str = "therapist-token";

struct StubState {
    backend: Arc<InMemoryBackend>,
    actors: HashMap<String, Actor>,
    requests: AtomicUsize,
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub backend: Arc<InMemoryBackend>,
    pub admin: Actor,
    pub second_admin: Actor,
    pub therapist: Actor,
    state: Arc<StubState>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_alerts(Vec::new()).await
    }

    pub async fn start_with_alerts(alerts: Vec<ProximityAlert>) -> Self {
        let admin = Actor::admin(Uuid::new_v4(), "Practice Admin");
        let second_admin = Actor::admin(Uuid::new_v4(), "Second Admin");
        let therapist = Actor::therapist(Uuid::new_v4(), "Home Therapist");

        let mut actors = HashMap::new();
        actors.insert(ADMIN_TOKEN.to_string(), admin.clone());
        actors.insert(SECOND_ADMIN_TOKEN.to_string(), second_admin.clone());
        actors.insert(THERAPIST_TOKEN.to_string(), therapist.clone());

        let backend = Arc::new(InMemoryBackend::with_alerts(alerts));
        let state = Arc::new(StubState {
            backend: Arc::clone(&backend),
            actors,
            requests: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/api/v1/alerts", get(list_alerts))
            .route("/api/v1/alerts/:id/acknowledge", post(acknowledge))
            .route("/api/v1/alerts/:id/resolve", post(resolve))
            .route("/api/v1/alerts/:id/mark_false_alarm", post(mark_false_alarm))
            .route(
                "/api/v1/visits/:id/request_manual_verification",
                post(request_verification),
            )
            .route(
                "/api/v1/visits/:id/approve_manual_verification",
                post(approve_verification),
            )
            .route(
                "/api/v1/visits/:id/reject_manual_verification",
                post(reject_verification),
            )
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind stub server");
        let addr = listener.local_addr().expect("No local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Stub server failed");
        });

        Self {
            addr,
            backend,
            admin,
            second_admin,
            therapist,
            state,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api/v1", self.addr)
    }

    /// HTTP requests received so far.
    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    pub fn http_backend(&self, token: &str) -> Arc<dyn ProximityBackend> {
        http_backend_at(&self.base_url(), token)
    }

    /// Poller, lifecycle manager and verification workflow sharing one feed.
    pub fn client(&self, token: &str) -> TestClient {
        TestClient::new(self.http_backend(token))
    }
}

pub fn http_backend_at(base_url: &str, token: &str) -> Arc<dyn ProximityBackend> {
    let config = BackendConfig {
        base_url: base_url.to_string(),
        access_token: token.to_string(),
        request_timeout_secs: 5,
    };
    Arc::new(HttpBackend::new(&config).expect("Failed to build HTTP backend"))
}

/// A base URL nothing listens on.
pub async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local address");
    drop(listener);
    format!("http://{}/api/v1", addr)
}

pub struct TestClient {
    pub feed: Arc<RwLock<AlertFeed>>,
    pub notices: Arc<RecordingNoticeSink>,
    pub poller: PollAlertsJob,
    pub lifecycle: AlertLifecycleManager,
    pub verification: ManualVerificationWorkflow,
}

impl TestClient {
    pub fn new(backend: Arc<dyn ProximityBackend>) -> Self {
        let feed = Arc::new(RwLock::new(AlertFeed::new()));
        let notices = Arc::new(RecordingNoticeSink::new());
        let sink: Arc<dyn NoticeSink> = notices.clone();

        Self {
            poller: PollAlertsJob::new(
                Arc::clone(&backend),
                Arc::clone(&feed),
                Arc::clone(&sink),
                30,
            ),
            lifecycle: AlertLifecycleManager::new(
                Arc::clone(&backend),
                Arc::clone(&feed),
                Arc::clone(&sink),
            ),
            verification: ManualVerificationWorkflow::new(backend, sink),
            feed,
            notices,
        }
    }

    pub async fn feed_ids(&self) -> Vec<Uuid> {
        self.feed.read().await.alerts().iter().map(|a| a.id).collect()
    }
}

pub fn alert_with(distance_meters: f64, severity: AlertSeverity) -> ProximityAlert {
    ProximityAlert::detected(
        Uuid::new_v4(),
        Uuid::new_v4(),
        distance_meters,
        severity,
        Utc::now(),
    )
}

// ----------------------------------------------------------------------------
// Handlers
// ----------------------------------------------------------------------------

type Shared = State<Arc<StubState>>;

fn authenticate(state: &StubState, headers: &HeaderMap) -> Result<Actor, Response> {
    state.requests.fetch_add(1, Ordering::SeqCst);
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| state.actors.get(token).cloned())
        .ok_or_else(|| {
            error_response(ClientError::Unauthorized(
                "Invalid or missing token".to_string(),
            ))
        })
}

fn error_response(err: ClientError) -> Response {
    let (status, code) = match &err {
        ClientError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
        ClientError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
        ClientError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
        ClientError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        ClientError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };
    let message = match err {
        ClientError::Validation(m)
        | ClientError::Unauthorized(m)
        | ClientError::Forbidden(m)
        | ClientError::NotFound(m)
        | ClientError::Conflict(m) => m,
        other => other.to_string(),
    };
    (status, Json(json!({ "error": code, "message": message }))).into_response()
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, ClientError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

fn no_content(result: Result<(), ClientError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

async fn list_alerts(
    State(state): Shared,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = authenticate(&state, &headers) {
        return resp;
    }
    let statuses: Vec<AlertStatus> = params
        .get("status")
        .map(|s| {
            s.split(',')
                .filter_map(|v| serde_json::from_value(json!(v)).ok())
                .collect()
        })
        .unwrap_or_else(|| AlertStatus::IN_FLIGHT.to_vec());
    let query = ListAlertsQuery { statuses };
    respond(StatusCode::OK, state.backend.list_alerts(&query).await)
}

async fn acknowledge(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<AlertTransitionRequest>,
) -> Response {
    let actor = match authenticate(&state, &headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        state.backend.acknowledge_alert(&actor, id, &body).await,
    )
}

async fn resolve(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<AlertTransitionRequest>,
) -> Response {
    let actor = match authenticate(&state, &headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };
    no_content(state.backend.resolve_alert(&actor, id, &body).await)
}

async fn mark_false_alarm(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<AlertTransitionRequest>,
) -> Response {
    let actor = match authenticate(&state, &headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };
    no_content(state.backend.mark_false_alarm(&actor, id, &body).await)
}

async fn request_verification(
    State(state): Shared,
    headers: HeaderMap,
    Path(visit_id): Path<Uuid>,
    Json(body): Json<SubmitManualVerificationRequest>,
) -> Response {
    let actor = match authenticate(&state, &headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::CREATED,
        state
            .backend
            .request_manual_verification(&actor, visit_id, &body)
            .await,
    )
}

async fn approve_verification(
    State(state): Shared,
    headers: HeaderMap,
    Path(visit_id): Path<Uuid>,
    Json(body): Json<ApproveManualVerificationRequest>,
) -> Response {
    let actor = match authenticate(&state, &headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        state
            .backend
            .approve_manual_verification(&actor, visit_id, &body)
            .await,
    )
}

async fn reject_verification(
    State(state): Shared,
    headers: HeaderMap,
    Path(visit_id): Path<Uuid>,
    Json(body): Json<RejectManualVerificationRequest>,
) -> Response {
    let actor = match authenticate(&state, &headers) {
        Ok(actor) => actor,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        state
            .backend
            .reject_manual_verification(&actor, visit_id, &body)
            .await,
    )
}
