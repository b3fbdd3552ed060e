//! REST endpoints that drive briefing sessions.
//!
//! Each session is addressed by a stable handle issued on creation. The
//! session id inside the snapshot changes on every start/reset, the handle
//! does not.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::controller::{Outcome, SessionController, SessionSnapshot};
use super::export;

/// Builds a fresh controller with its own interviewer.
pub type ControllerFactory = Arc<dyn Fn() -> SessionController + Send + Sync>;

struct RegistryEntry {
    controller: Arc<SessionController>,
    last_seen: Instant,
}

/// Live sessions keyed by handle.
pub struct SessionRegistry {
    factory: ControllerFactory,
    sessions: RwLock<HashMap<Uuid, RegistryEntry>>,
}

impl SessionRegistry {
    pub fn new(factory: ControllerFactory) -> Self {
        Self {
            factory,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new idle session and return its handle.
    pub async fn create(&self) -> (Uuid, Arc<SessionController>) {
        let handle = Uuid::new_v4();
        let controller = Arc::new((self.factory)());
        self.sessions.write().await.insert(
            handle,
            RegistryEntry {
                controller: controller.clone(),
                last_seen: Instant::now(),
            },
        );
        (handle, controller)
    }

    /// Look up a session and mark it as used.
    pub async fn get(&self, handle: Uuid) -> Option<Arc<SessionController>> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&handle)?;
        entry.last_seen = Instant::now();
        Some(entry.controller.clone())
    }

    pub async fn remove(&self, handle: Uuid) -> bool {
        self.sessions.write().await.remove(&handle).is_some()
    }

    /// Drop sessions nobody has touched for `ttl`. Returns how many went.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() < ttl);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(
                removed,
                remaining = sessions.len(),
                "Swept idle briefing sessions"
            );
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Periodically drop sessions idle for longer than `ttl`.
pub fn spawn_sweep_task(
    registry: Arc<SessionRegistry>,
    ttl: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            registry.sweep_idle(ttl).await;
        }
    })
}

/// Shared state for briefing routes.
#[derive(Clone)]
pub struct BriefingRouteState {
    pub registry: Arc<SessionRegistry>,
}

#[derive(Debug, Serialize)]
struct SessionBody {
    handle: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<Outcome>,
    session: SessionSnapshot,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    text: String,
}

fn not_found(handle: Uuid) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": format!("Unknown session {handle}")})),
    )
        .into_response()
}

async fn event_response(handle: Uuid, controller: &SessionController, outcome: Outcome) -> Response {
    let status = match outcome {
        Outcome::Rejected(_) => StatusCode::CONFLICT,
        _ => StatusCode::OK,
    };
    let body = SessionBody {
        handle,
        outcome: Some(outcome),
        session: controller.snapshot().await,
    };
    (status, Json(body)).into_response()
}

/// POST /api/sessions
///
/// Creates a session and starts the interview. Responds once the opening
/// turn is in place.
async fn create_session(State(state): State<BriefingRouteState>) -> Response {
    let (handle, controller) = state.registry.create().await;
    let outcome = controller.start().await;
    tracing::info!(%handle, ?outcome, "Briefing session created");
    let body = SessionBody {
        handle,
        outcome: Some(outcome),
        session: controller.snapshot().await,
    };
    (StatusCode::CREATED, Json(body)).into_response()
}

/// GET /api/sessions/{handle}
async fn get_session(
    State(state): State<BriefingRouteState>,
    Path(handle): Path<Uuid>,
) -> Response {
    match state.registry.get(handle).await {
        Some(controller) => Json(SessionBody {
            handle,
            outcome: None,
            session: controller.snapshot().await,
        })
        .into_response(),
        None => not_found(handle),
    }
}

/// POST /api/sessions/{handle}/messages
async fn post_message(
    State(state): State<BriefingRouteState>,
    Path(handle): Path<Uuid>,
    Json(body): Json<MessageBody>,
) -> Response {
    let Some(controller) = state.registry.get(handle).await else {
        return not_found(handle);
    };
    let outcome = controller.submit_user_turn(&body.text).await;
    event_response(handle, &controller, outcome).await
}

/// POST /api/sessions/{handle}/start
async fn restart(State(state): State<BriefingRouteState>, Path(handle): Path<Uuid>) -> Response {
    let Some(controller) = state.registry.get(handle).await else {
        return not_found(handle);
    };
    let outcome = controller.start().await;
    event_response(handle, &controller, outcome).await
}

/// POST /api/sessions/{handle}/finish
async fn finish(State(state): State<BriefingRouteState>, Path(handle): Path<Uuid>) -> Response {
    let Some(controller) = state.registry.get(handle).await else {
        return not_found(handle);
    };
    let outcome = controller.finish().await;
    event_response(handle, &controller, outcome).await
}

/// POST /api/sessions/{handle}/submit
async fn submit(State(state): State<BriefingRouteState>, Path(handle): Path<Uuid>) -> Response {
    let Some(controller) = state.registry.get(handle).await else {
        return not_found(handle);
    };
    let outcome = controller.submit().await;
    event_response(handle, &controller, outcome).await
}

/// POST /api/sessions/{handle}/reset
async fn reset(State(state): State<BriefingRouteState>, Path(handle): Path<Uuid>) -> Response {
    let Some(controller) = state.registry.get(handle).await else {
        return not_found(handle);
    };
    let outcome = controller.reset().await;
    event_response(handle, &controller, outcome).await
}

/// GET /api/sessions/{handle}/export
///
/// Downloads the record as CSV, or 409 if nothing has been extracted yet.
async fn export_csv(
    State(state): State<BriefingRouteState>,
    Path(handle): Path<Uuid>,
) -> Response {
    let Some(controller) = state.registry.get(handle).await else {
        return not_found(handle);
    };
    match controller.export_csv().await {
        Some(csv) => {
            let disposition = format!("attachment; filename=\"{}\"", export::file_name(Utc::now()));
            (
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                csv,
            )
                .into_response()
        }
        None => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"error": "No briefing record to export yet"})),
        )
            .into_response(),
    }
}

/// DELETE /api/sessions/{handle}
async fn delete_session(
    State(state): State<BriefingRouteState>,
    Path(handle): Path<Uuid>,
) -> Response {
    if state.registry.remove(handle).await {
        tracing::info!(%handle, "Briefing session closed");
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found(handle)
    }
}

/// Build the briefing REST routes.
pub fn briefing_routes(state: BriefingRouteState) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{handle}", get(get_session).delete(delete_session))
        .route("/api/sessions/{handle}/messages", post(post_message))
        .route("/api/sessions/{handle}/start", post(restart))
        .route("/api/sessions/{handle}/finish", post(finish))
        .route("/api/sessions/{handle}/submit", post(submit))
        .route("/api/sessions/{handle}/reset", post(reset))
        .route("/api/sessions/{handle}/export", get(export_csv))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::briefing::interviewer::Interviewer;
    use crate::briefing::model::{BriefingRecord, SessionId};
    use crate::error::{ExtractionError, LlmError, SinkError};
    use crate::sink::{Dispatched, SpreadsheetSink};

    struct EchoInterviewer;

    #[async_trait]
    impl Interviewer for EchoInterviewer {
        async fn begin_conversation(&self, _session: SessionId) -> Result<String, LlmError> {
            Ok("Qual o seu nome?".into())
        }

        async fn continue_conversation(
            &self,
            _session: SessionId,
            respondent_text: &str,
        ) -> Result<String, LlmError> {
            Ok(format!("Anotado: {respondent_text}"))
        }

        async fn extract(&self, _transcript_text: &str) -> Result<BriefingRecord, ExtractionError> {
            Ok(BriefingRecord {
                respondent_name: "Ana".into(),
                what: "Palestra".into(),
                who: "EJE".into(),
                how: "Online".into(),
                when: "Terça".into(),
                ..Default::default()
            })
        }
    }

    struct OkSink;

    #[async_trait]
    impl SpreadsheetSink for OkSink {
        async fn persist(&self, _record: &BriefingRecord) -> Result<Dispatched, SinkError> {
            Ok(Dispatched { status: Some(200) })
        }
    }

    fn app() -> (Router, Arc<SessionRegistry>) {
        let factory: ControllerFactory =
            Arc::new(|| SessionController::new(Arc::new(EchoInterviewer), Arc::new(OkSink)));
        let registry = Arc::new(SessionRegistry::new(factory));
        let router = briefing_routes(BriefingRouteState {
            registry: registry.clone(),
        });
        (router, registry)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = send(app, method, uri, body).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create(app: &Router) -> String {
        let (status, json) = send_json(app, "POST", "/api/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        json["handle"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn create_session_starts_interview() {
        let (app, registry) = app();
        let (status, json) = send_json(&app, "POST", "/api/sessions", None).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["outcome"], "applied");
        assert_eq!(json["session"]["phase"], "interviewing");
        assert_eq!(json["session"]["transcript"][0]["text"], "Qual o seu nome?");
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn full_flow_over_http() {
        let (app, _) = app();
        let handle = create(&app).await;

        let (status, json) = send_json(
            &app,
            "POST",
            &format!("/api/sessions/{handle}/messages"),
            Some(serde_json::json!({"text": "Ana, analista"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["session"]["transcript"].as_array().unwrap().len(), 3);
        assert_eq!(json["session"]["transcript"][2]["text"], "Anotado: Ana, analista");

        let (status, json) =
            send_json(&app, "POST", &format!("/api/sessions/{handle}/finish"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["session"]["phase"], "reviewing");
        assert_eq!(json["session"]["record"]["servidor_nome"], "Ana");

        let (status, json) =
            send_json(&app, "POST", &format!("/api/sessions/{handle}/submit"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["session"]["submitted"], true);

        let (status, json) =
            send_json(&app, "POST", &format!("/api/sessions/{handle}/submit"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["outcome"]["rejected"], "already_submitted");
    }

    #[tokio::test]
    async fn blank_message_is_a_conflict() {
        let (app, _) = app();
        let handle = create(&app).await;
        let (status, json) = send_json(
            &app,
            "POST",
            &format!("/api/sessions/{handle}/messages"),
            Some(serde_json::json!({"text": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["outcome"]["rejected"], "empty_text");
        assert_eq!(json["session"]["transcript"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn export_needs_a_record() {
        let (app, _) = app();
        let handle = create(&app).await;

        let (status, _) = send(&app, "GET", &format!("/api/sessions/{handle}/export"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        send(&app, "POST", &format!("/api/sessions/{handle}/finish"), None).await;
        let (status, bytes) =
            send(&app, "GET", &format!("/api/sessions/{handle}/export"), None).await;
        assert_eq!(status, StatusCode::OK);
        let csv = String::from_utf8(bytes).unwrap();
        assert!(csv.starts_with('\u{FEFF}'));
        assert!(csv.contains("\"Nome do Servidor\",\"Ana\""));
    }

    #[tokio::test]
    async fn reset_returns_to_idle_under_the_same_handle() {
        let (app, _) = app();
        let handle = create(&app).await;

        let (status, json) =
            send_json(&app, "POST", &format!("/api/sessions/{handle}/reset"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["handle"], handle.as_str());
        assert_eq!(json["session"]["phase"], "idle");

        let (status, json) =
            send_json(&app, "POST", &format!("/api/sessions/{handle}/start"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["session"]["phase"], "interviewing");
    }

    #[tokio::test]
    async fn idle_sessions_are_swept() {
        let (app, registry) = app();
        let stale = create(&app).await;

        assert_eq!(registry.sweep_idle(Duration::from_secs(3600)).await, 0);
        assert_eq!(registry.sweep_idle(Duration::ZERO).await, 1);
        assert!(registry.is_empty().await);

        let (status, _) = send(&app, "GET", &format!("/api/sessions/{stale}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_and_deleted_sessions_are_not_found() {
        let (app, registry) = app();
        let (status, _) = send(&app, "GET", &format!("/api/sessions/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let handle = create(&app).await;
        let (status, _) = send(&app, "DELETE", &format!("/api/sessions/{handle}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(registry.is_empty().await);

        let (status, _) = send(&app, "GET", &format!("/api/sessions/{handle}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
