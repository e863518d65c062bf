use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::room::VoteCounts;
use crate::tally;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/rooms/{room_id}/vote", post(vote))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    /// 1 or 2 to vote for a team, 0 to revoke.
    pub team_number: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/vote",
    tag = "Votes",
    security(("bearer" = [])),
    params(
        ("room_id" = String, Path, description = "Room ID"),
    ),
    request_body = VoteRequest,
    responses(
        (status = 202, description = "Vote recorded", body = VoteCounts),
        (status = 400, description = "Invalid team number", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Room not found", body = ApiErrorBody),
        (status = 406, description = "Same choice as the current vote", body = ApiErrorBody),
        (status = 451, description = "Room is inactive", body = ApiErrorBody),
    ),
)]
pub async fn vote(
    AuthUser { member_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<VoteRequest>,
) -> Result<(StatusCode, Json<VoteCounts>), ApiError> {
    let team_number = body
        .team_number
        .ok_or_else(|| ApiError::bad_request("team_number is required"))?;

    let mut conn = state.db.get().await?;
    let counts = tally::vote(&mut conn, &room_id, &member_id, team_number).await?;
    Ok((StatusCode::ACCEPTED, Json(counts)))
}
