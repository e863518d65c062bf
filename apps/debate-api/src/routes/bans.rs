//! Ban endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;

use crate::admission;
use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::ban::RoomBan;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms/{room_id}/bans", get(list_bans))
        .route(
            "/rooms/{room_id}/bans/{member_id}",
            put(ban_member).delete(unban_member),
        )
}

#[derive(Debug, Deserialize)]
pub struct BanPath {
    pub room_id: String,
    pub member_id: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/bans",
    tag = "Bans",
    params(
        ("room_id" = String, Path, description = "Room ID"),
    ),
    responses(
        (status = 200, description = "Banned members", body = [RoomBan]),
        (status = 404, description = "Room not found", body = ApiErrorBody),
    ),
)]
pub async fn list_bans(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<RoomBan>>, ApiError> {
    let mut conn = state.db.get().await?;
    Ok(Json(admission::list_bans(&mut conn, &room_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/rooms/{room_id}/bans/{member_id}",
    tag = "Bans",
    security(("bearer" = [])),
    params(
        ("room_id" = String, Path, description = "Room ID"),
        ("member_id" = String, Path, description = "Member to ban"),
    ),
    responses(
        (status = 202, description = "Member banned", body = RoomBan),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Caller is not a room admin", body = ApiErrorBody),
        (status = 404, description = "Room or member not found", body = ApiErrorBody),
        (status = 409, description = "Target is an admin or the creator", body = ApiErrorBody),
    ),
)]
pub async fn ban_member(
    AuthUser { member_id: actor_id }: AuthUser,
    State(state): State<AppState>,
    Path(path): Path<BanPath>,
) -> Result<(StatusCode, Json<RoomBan>), ApiError> {
    let mut conn = state.db.get().await?;
    let ban = admission::ban(&mut conn, &path.room_id, &path.member_id, &actor_id).await?;
    Ok((StatusCode::ACCEPTED, Json(ban)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/rooms/{room_id}/bans/{member_id}",
    tag = "Bans",
    security(("bearer" = [])),
    params(
        ("room_id" = String, Path, description = "Room ID"),
        ("member_id" = String, Path, description = "Member to unban"),
    ),
    responses(
        (status = 204, description = "Ban lifted"),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Caller is not a room admin", body = ApiErrorBody),
        (status = 404, description = "Room not found or member not banned", body = ApiErrorBody),
    ),
)]
pub async fn unban_member(
    AuthUser { member_id: actor_id }: AuthUser,
    State(state): State<AppState>,
    Path(path): Path<BanPath>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.db.get().await?;
    admission::unban(&mut conn, &path.room_id, &path.member_id, &actor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
