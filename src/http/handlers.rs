use super::state::AppState;
use crate::error::{ArchiveError, SessionError};
use crate::session::{SessionState, SessionStats};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub state: SessionState,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub state: SessionState,
    pub message: String,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn session_error_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::AlreadyRunning(_) => StatusCode::CONFLICT,
        SessionError::DeviceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::Transport(_) | SessionError::TransportClosed(_) => StatusCode::BAD_GATEWAY,
        SessionError::Config(_) => StatusCode::BAD_REQUEST,
        SessionError::ClientGone => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/start
/// Start a new conversation
pub async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("Starting live session");

    match state.client.start().await {
        Ok(()) => (
            StatusCode::OK,
            Json(StartSessionResponse {
                state: state.client.state(),
                message: "Session connecting".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to start session: {}", e);
            error_response(session_error_status(&e), e)
        }
    }
}

/// POST /session/stop
/// Stop the conversation (no-op when idle)
pub async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("Stopping live session");

    match state.client.stop().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(StopSessionResponse {
                state: stats.state,
                message: "Session stopped".to_string(),
                stats,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to stop session: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// GET /session/status
pub async fn get_session_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.client.snapshot().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => {
            error!("Failed to get session status: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// GET /session/transcript
/// Running transcript, partial messages included
pub async fn get_session_transcript(State(state): State<AppState>) -> impl IntoResponse {
    match state.client.snapshot().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot.transcript)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// GET /transcripts
pub async fn list_transcripts(State(state): State<AppState>) -> impl IntoResponse {
    match state.archive.list().await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => {
            error!("Failed to list transcripts: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// DELETE /transcripts/:id
pub async fn delete_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.archive.delete(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(ArchiveError::NotFound(_)) => error_response(
            StatusCode::NOT_FOUND,
            format!("Transcript {} not found", id),
        ),
        Err(e) => {
            error!("Failed to delete transcript {}: {}", id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// DELETE /transcripts
pub async fn clear_transcripts(State(state): State<AppState>) -> impl IntoResponse {
    match state.archive.clear().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to clear transcripts: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
