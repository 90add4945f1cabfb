//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    domain::{Meeting, MeetingId, ParticipantIdentity, SessionId, Username},
    infrastructure::dto::http::{
        LeaveRequest, LiveRoomDto, RegisterSessionRequest, RegisterSessionResponse,
        TracksReadyRequest,
    },
    ui::state::AppState,
    usecase::{LeaveError, QueryError},
};

fn bad_request<E: std::fmt::Display>(error: E) -> StatusCode {
    tracing::warn!("Rejecting request: {}", error);
    StatusCode::BAD_REQUEST
}

fn query_status(error: QueryError) -> StatusCode {
    match error {
        QueryError::MeetingNotFound(_) => StatusCode::NOT_FOUND,
        QueryError::StoreUnavailable(e) => {
            tracing::error!("Store unavailable: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn ok() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    ok()
}

/// Current meeting document
pub async fn get_meeting_info(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<Meeting>, StatusCode> {
    let meeting_id = MeetingId::new(room_id).map_err(bad_request)?;
    state
        .get_meeting_info_usecase
        .execute(&meeting_id)
        .await
        .map(Json)
        .map_err(query_status)
}

/// Announce that a participant's media tracks are ready.
///
/// Always succeeds for a valid body, even when nobody is connected.
pub async fn notify_tracks_ready(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Json(request): Json<TracksReadyRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    // Convert DTO -> Domain Model
    let meeting_id = MeetingId::new(room_id).map_err(bad_request)?;
    let identity = ParticipantIdentity::new(
        Username::new(request.username).map_err(bad_request)?,
        SessionId::new(request.session_id).map_err(bad_request)?,
    );

    state
        .notify_tracks_ready_usecase
        .execute(&meeting_id, &identity)
        .await;
    Ok(ok())
}

/// Out-of-band leave by session id
pub async fn leave_meeting(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Json(request): Json<LeaveRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let meeting_id = MeetingId::new(room_id).map_err(bad_request)?;
    let session_id = SessionId::new(request.session_id).map_err(bad_request)?;

    match state
        .leave_meeting_usecase
        .execute(&meeting_id, &session_id)
        .await
    {
        Ok(_) => Ok(ok()),
        Err(e @ LeaveError::SessionNotFound { .. }) => {
            tracing::warn!("Leave failed: {}", e);
            Err(StatusCode::NOT_FOUND)
        }
        Err(e @ LeaveError::StoreUnavailable(_)) => {
            tracing::error!("Leave failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Debug endpoint listing live rooms and their members
pub async fn debug_live_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<LiveRoomDto>> {
    let rooms = state.get_live_rooms_usecase.execute().await;

    // Domain Model から DTO への変換
    Json(rooms.into_iter().map(LiveRoomDto::from).collect())
}

/// Debug endpoint that seeds a session record into the store
pub async fn debug_register_session(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Json(request): Json<RegisterSessionRequest>,
) -> Result<(StatusCode, Json<RegisterSessionResponse>), StatusCode> {
    let meeting_id = MeetingId::new(room_id).map_err(bad_request)?;
    let username = Username::new(request.username).map_err(bad_request)?;
    let session_id = request
        .session_id
        .map(SessionId::new)
        .transpose()
        .map_err(bad_request)?;

    let session = state
        .register_session_usecase
        .execute(&meeting_id, username, session_id)
        .await
        .map_err(query_status)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterSessionResponse {
            room_id: meeting_id.into_string(),
            session_id: session.session_id.into_string(),
        }),
    ))
}
