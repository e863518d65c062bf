//! Comment endpoints. Writes are announced to the room's live sessions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::gateway::handler;
use crate::models::message::{normalize_body, Message};
use crate::store::{messages, rooms, roster};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/rooms/{room_id}/comments",
            get(list_comments).post(create_comment),
        )
        .route(
            "/comments/{message_id}",
            get(get_comment).patch(edit_comment).delete(delete_comment),
        )
}

fn parse_message_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found("Comment not found"))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentRequest {
    pub body: Option<String>,
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{room_id}/comments
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/comments",
    tag = "Comments",
    params(
        ("room_id" = String, Path, description = "Room ID"),
    ),
    responses(
        (status = 200, description = "Message log, oldest first", body = [Message]),
        (status = 404, description = "Room not found", body = ApiErrorBody),
    ),
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let mut conn = state.db.get().await?;
    rooms::find_room(&mut conn, &room_id).await?;
    Ok(Json(messages::list_messages(&mut conn, &room_id).await?))
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/{room_id}/comments
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/comments",
    tag = "Comments",
    security(("bearer" = [])),
    params(
        ("room_id" = String, Path, description = "Room ID"),
    ),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment posted", body = Message),
        (status = 400, description = "Empty body", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Banned or not seated", body = ApiErrorBody),
        (status = 404, description = "Room not found", body = ApiErrorBody),
        (status = 451, description = "Room is inactive", body = ApiErrorBody),
    ),
)]
pub async fn create_comment(
    AuthUser { member_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let standing = {
        let mut conn = state.db.get().await?;
        let room = rooms::find_room(&mut conn, &room_id).await?;
        roster::standing(&mut conn, &room, &member_id).await?
    };

    if standing.is_banned {
        return Err(ApiError::forbidden(
            "You are banned in this room, therefore you cannot send messages",
        ));
    }
    let team = standing.team.ok_or_else(|| {
        ApiError::forbidden("You are not a participant of any of the room's teams")
    })?;

    let message = handler::post_message(
        &state,
        &room_id,
        &member_id,
        team,
        body.body.as_deref().unwrap_or(""),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/comments/{message_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/comments/{message_id}",
    tag = "Comments",
    params(
        ("message_id" = String, Path, description = "Comment ID"),
    ),
    responses(
        (status = 200, description = "Comment", body = Message),
        (status = 404, description = "Comment not found", body = ApiErrorBody),
    ),
)]
pub async fn get_comment(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<Json<Message>, ApiError> {
    let message_id = parse_message_id(&message_id)?;
    let mut conn = state.db.get().await?;
    Ok(Json(messages::find_message(&mut conn, message_id).await?))
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/comments/{message_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    patch,
    path = "/api/v1/comments/{message_id}",
    tag = "Comments",
    security(("bearer" = [])),
    params(
        ("message_id" = String, Path, description = "Comment ID"),
    ),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Comment edited", body = Message),
        (status = 400, description = "Empty body", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not the author", body = ApiErrorBody),
        (status = 404, description = "Comment not found", body = ApiErrorBody),
    ),
)]
pub async fn edit_comment(
    AuthUser { member_id }: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(body): Json<CommentRequest>,
) -> Result<Json<Message>, ApiError> {
    let message_id = parse_message_id(&message_id)?;
    let text = normalize_body(body.body.as_deref().unwrap_or("")).map_err(ApiError::bad_request)?;

    let mut conn = state.db.get().await?;
    let message = messages::update_body(&mut conn, message_id, &member_id, text).await?;
    Ok(Json(message))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/comments/{message_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/comments/{message_id}",
    tag = "Comments",
    security(("bearer" = [])),
    params(
        ("message_id" = String, Path, description = "Comment ID"),
    ),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not the author", body = ApiErrorBody),
        (status = 404, description = "Comment not found", body = ApiErrorBody),
    ),
)]
pub async fn delete_comment(
    AuthUser { member_id }: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let message_id = parse_message_id(&message_id)?;
    let room_id = {
        let mut conn = state.db.get().await?;
        messages::find_message(&mut conn, message_id).await?.room_id
    };

    handler::delete_messages(&state, &room_id, &member_id, &[message_id]).await?;
    Ok(StatusCode::NO_CONTENT)
}
