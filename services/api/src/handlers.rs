//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for health
//! checks and meeting-bot management. It uses `utoipa` doc comments to
//! generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use persona_core::BridgeError;
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    bot::BotLauncher,
    models::{BotCreated, CreateBotPayload, ErrorResponse},
    state::AppState,
};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Unavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

fn launcher(state: &AppState) -> Result<&BotLauncher, ApiError> {
    state
        .bots
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Meeting bots are not configured".to_string()))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = String)
    )
)]
pub async fn health() -> &'static str {
    "ok"
}

/// Send a persona into a meeting.
#[utoipa::path(
    post,
    path = "/bots",
    request_body = CreateBotPayload,
    responses(
        (status = 201, description = "Participant created", body = BotCreated),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 404, description = "Unknown persona", body = ErrorResponse),
        (status = 503, description = "Meeting bots are not configured", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn create_bot(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBotPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let bots = launcher(&state)?;
    if payload.meeting_url.trim().is_empty() {
        return Err(ApiError::BadRequest("meeting_url must not be empty".to_string()));
    }
    let persona = state
        .personas
        .resolve(payload.persona.as_deref())
        .map_err(|e| match e {
            BridgeError::PersonaNotFound(_) => ApiError::NotFound(e.to_string()),
            other => ApiError::InternalServerError(other.into()),
        })?;
    let bot_name = payload
        .bot_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| persona.display_name.clone());

    let participant_id = bots
        .launch(&payload.meeting_url, &bot_name, &persona.key)
        .await?;
    info!(%participant_id, persona = %persona.key, "Bot sent to meeting");

    Ok((
        StatusCode::CREATED,
        Json(BotCreated {
            participant_id,
            persona: persona.key.clone(),
        }),
    ))
}

/// Remove a participant from its meeting.
#[utoipa::path(
    delete,
    path = "/bots/{id}",
    responses(
        (status = 204, description = "Participant left the meeting"),
        (status = 503, description = "Meeting bots are not configured", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "Participant ID")
    )
)]
pub async fn end_bot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    launcher(&state)?.client.end_participant(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
