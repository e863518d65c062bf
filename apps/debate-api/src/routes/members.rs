//! Team roster endpoints and account deletion.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::admission;
use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::membership::Membership;
use crate::store::members;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/rooms/{room_id}/users",
            get(list_participants).post(join_team).delete(leave_team),
        )
        .route("/members/me", delete(delete_account))
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/users",
    tag = "Members",
    params(
        ("room_id" = String, Path, description = "Room ID"),
    ),
    responses(
        (status = 200, description = "Seated members", body = [Membership]),
        (status = 404, description = "Room not found", body = ApiErrorBody),
    ),
)]
pub async fn list_participants(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<Membership>>, ApiError> {
    let mut conn = state.db.get().await?;
    Ok(Json(admission::list_participants(&mut conn, &room_id).await?))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinTeamRequest {
    /// 1 or 2.
    pub team_number: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/users",
    tag = "Members",
    security(("bearer" = [])),
    params(
        ("room_id" = String, Path, description = "Room ID"),
    ),
    request_body = JoinTeamRequest,
    responses(
        (status = 202, description = "Seat taken", body = Membership),
        (status = 400, description = "Invalid team number", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Banned in this room", body = ApiErrorBody),
        (status = 404, description = "Room not found", body = ApiErrorBody),
        (status = 406, description = "Team is full", body = ApiErrorBody),
        (status = 409, description = "Already seated", body = ApiErrorBody),
        (status = 451, description = "Room is inactive", body = ApiErrorBody),
    ),
)]
pub async fn join_team(
    AuthUser { member_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<JoinTeamRequest>,
) -> Result<(StatusCode, Json<Membership>), ApiError> {
    let team_number = body
        .team_number
        .ok_or_else(|| ApiError::bad_request("team_number is required"))?;

    let mut conn = state.db.get().await?;
    let membership = admission::join(&mut conn, &room_id, &member_id, team_number).await?;
    Ok((StatusCode::ACCEPTED, Json(membership)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/rooms/{room_id}/users",
    tag = "Members",
    security(("bearer" = [])),
    params(
        ("room_id" = String, Path, description = "Room ID"),
    ),
    responses(
        (status = 204, description = "Seat released (or none held)"),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Room not found", body = ApiErrorBody),
    ),
)]
pub async fn leave_team(
    AuthUser { member_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.db.get().await?;
    admission::leave(&mut conn, &room_id, &member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/v1/members/me",
    tag = "Members",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Account and everything it owns deleted"),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Member not found", body = ApiErrorBody),
    ),
)]
pub async fn delete_account(
    AuthUser { member_id }: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.db.get().await?;
    members::delete_member(&mut conn, &member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
