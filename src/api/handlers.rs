//! HTTP request handlers
//!
//! Handlers only translate request bodies into session events; every
//! decision about the transcript is made by the session runtime.

use super::sse::sse_stream;
use super::types::{
    ActivitiesResponse, ActivityInfo, CreateSessionRequest, ErrorResponse, InputRequest,
    KeyRequest, ModelsResponse, QueuedResponse, SpeechErrorRequest, SpeechRequest,
    SubmitRequest, SuccessResponse,
};
use super::AppState;
use crate::activity::ActivityKind;
use crate::runtime::{RuntimeError, SessionSnapshot};
use crate::state_machine::{Event, KeyModifiers};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Catalog
        .route("/api/activities", get(list_activities))
        .route("/api/models", get(list_models))
        // Session lifecycle
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/stream", get(stream_session))
        .route("/api/sessions/:id/restart", post(restart_session))
        .route("/api/sessions/:id/close", post(close_session))
        // User input
        .route("/api/sessions/:id/input", post(update_input))
        .route("/api/sessions/:id/submit", post(submit))
        .route("/api/sessions/:id/key", post(key_press))
        .route("/api/sessions/:id/speech", post(speech))
        .route("/api/sessions/:id/speech-error", post(speech_error))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Catalog
// ============================================================

async fn list_activities() -> Json<ActivitiesResponse> {
    Json(ActivitiesResponse {
        activities: ActivityKind::ALL.into_iter().map(ActivityInfo::from).collect(),
    })
}

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let registry = &state.llm_registry;
    Json(ModelsResponse {
        models: registry.available_model_info(),
        default: registry
            .has_models()
            .then(|| registry.default_model_id().to_string()),
    })
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionSnapshot>), AppError> {
    let snapshot = state
        .runtime
        .create_session(req.activity, req.capabilities, req.responder)
        .await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(state.runtime.snapshot(&id).await?))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (snapshot, broadcast_rx) = state.runtime.subscribe(&id).await?;
    Ok(sse_stream(snapshot, broadcast_rx))
}

async fn restart_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QueuedResponse>, AppError> {
    queue(&state, &id, Event::Restart).await
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.runtime.close(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// User Input
// ============================================================

async fn queue(state: &AppState, id: &str, event: Event) -> Result<Json<QueuedResponse>, AppError> {
    state.runtime.send_event(id, event).await?;
    Ok(Json(QueuedResponse { queued: true }))
}

async fn update_input(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<InputRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    queue(&state, &id, Event::InputChanged { text: req.text }).await
}

async fn submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    queue(&state, &id, Event::Submit { text: req.text }).await
}

async fn key_press(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<KeyRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    let modifiers = KeyModifiers {
        shift: req.shift,
        ctrl: req.ctrl,
        alt: req.alt,
        meta: req.meta,
    };

    match Event::from_key_press(&req.key, modifiers) {
        Some(event) => queue(&state, &id, event).await,
        None => {
            // Other keys only edit the field; still report unknown sessions
            state.runtime.get(&id).await?;
            Ok(Json(QueuedResponse { queued: false }))
        }
    }
}

async fn speech(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SpeechRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    queue(
        &state,
        &id,
        Event::SpeechRecognized {
            transcript: req.transcript,
        },
    )
    .await
}

async fn speech_error(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SpeechErrorRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    queue(&state, &id, Event::SpeechFailed { reason: req.reason }).await
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("kid-explorer ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
}

impl From<RuntimeError> for AppError {
    fn from(e: RuntimeError) -> Self {
        match e {
            RuntimeError::NotFound(_) => AppError::NotFound(e.to_string()),
            RuntimeError::ResponderUnavailable(_) => AppError::BadRequest(e.to_string()),
            RuntimeError::TooManySessions(_) => AppError::Unavailable(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
