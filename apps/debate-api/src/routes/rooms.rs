//! Room endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use debate_common::id::{prefix, prefixed_ulid};
use diesel_async::AsyncPgConnection;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::middleware::{AuthUser, MaybeAuthUser};
use crate::error::{ApiError, ApiErrorBody, FieldError, RoomError};
use crate::models::room::{Room, RoomResponse, TEAM_NAME_MAX_LENGTH, TITLE_MAX_LENGTH};
use crate::permissions;
use crate::store::rooms::{self, RoomDraft};
use crate::store::{members, roster};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", post(create_room).get(list_rooms))
        .route("/rooms/{room_id}", get(get_room).delete(delete_room))
        .route("/rooms/{room_id}/deactivate", post(deactivate_room))
}

pub(crate) async fn room_response(
    conn: &mut AsyncPgConnection,
    room: Room,
) -> Result<RoomResponse, ApiError> {
    let admins = rooms::admin_ids(conn, &room.id).await?;
    let (first, second) = roster::team_sizes(conn, &room.id).await?;
    Ok(RoomResponse {
        room,
        admins,
        first_team_participants: first,
        second_team_participants: second,
    })
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoomRequest {
    pub title: Option<String>,
    pub first_team_name: Option<String>,
    pub second_team_name: Option<String>,
    /// Defaults to the service-wide team capacity.
    pub max_participants_in_team: Option<i64>,
    /// Extra admins besides the creator.
    #[serde(default)]
    pub admins: Vec<String>,
}

fn required_text<'a>(
    field: &str,
    value: Option<&'a str>,
    max_len: usize,
    errors: &mut Vec<FieldError>,
) -> &'a str {
    let value = value.map(str::trim).unwrap_or("");
    if value.is_empty() {
        errors.push(FieldError::new(field, "This field is required"));
    } else if value.chars().count() > max_len {
        errors.push(FieldError::new(
            field,
            format!("Must be {max_len} characters or fewer"),
        ));
    }
    value
}

/// A missing admin is a field error; any other lookup failure aborts the
/// request.
fn unknown_admin(
    admin: &str,
    lookup: Result<(), RoomError>,
) -> Result<Option<FieldError>, ApiError> {
    match lookup {
        Ok(()) => Ok(None),
        Err(RoomError::NotFound(_)) => Ok(Some(FieldError::new(
            "admins",
            format!("Unknown member: {admin}"),
        ))),
        Err(err) => Err(err.into()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/rooms",
    tag = "Rooms",
    security(("bearer" = [])),
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = RoomResponse),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 409, description = "Title already taken", body = ApiErrorBody),
    ),
)]
pub async fn create_room(
    AuthUser { member_id }: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let mut errors = Vec::new();
    let title = required_text("title", body.title.as_deref(), TITLE_MAX_LENGTH, &mut errors);
    let first_team_name = required_text(
        "first_team_name",
        body.first_team_name.as_deref(),
        TEAM_NAME_MAX_LENGTH,
        &mut errors,
    );
    let second_team_name = required_text(
        "second_team_name",
        body.second_team_name.as_deref(),
        TEAM_NAME_MAX_LENGTH,
        &mut errors,
    );

    let max_capacity = state.config.max_team_capacity;
    let capacity = body
        .max_participants_in_team
        .unwrap_or(i64::from(state.config.default_team_capacity));
    if !(1..=i64::from(max_capacity)).contains(&capacity) {
        errors.push(FieldError::new(
            "max_participants_in_team",
            format!("Must be between 1 and {max_capacity}"),
        ));
    }

    let mut conn = state.db.get().await?;

    for admin in &body.admins {
        let lookup = members::find_member(&mut conn, admin).await.map(drop);
        errors.extend(unknown_admin(admin, lookup)?);
    }

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let room_id = prefixed_ulid(prefix::ROOM);
    let room = rooms::create_room(
        &mut conn,
        &room_id,
        &member_id,
        RoomDraft {
            title,
            first_team_name,
            second_team_name,
            max_participants_in_team: capacity as i32,
        },
        &body.admins,
    )
    .await?;

    tracing::info!(room_id = %room.id, creator_id = %member_id, "room created");

    let response = room_response(&mut conn, room).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListRoomsParams {
    /// `my` limits the list to rooms the caller holds a seat in.
    pub filter: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    tag = "Rooms",
    params(ListRoomsParams),
    responses(
        (status = 200, description = "Active rooms", body = [Room]),
        (status = 400, description = "Unknown filter", body = ApiErrorBody),
        (status = 401, description = "`my` requires a token", body = ApiErrorBody),
    ),
)]
pub async fn list_rooms(
    MaybeAuthUser(member_id): MaybeAuthUser,
    State(state): State<AppState>,
    Query(params): Query<ListRoomsParams>,
) -> Result<Json<Vec<Room>>, ApiError> {
    let participant = match params.filter.as_deref() {
        None => None,
        Some("my") => Some(
            member_id
                .as_deref()
                .ok_or_else(|| ApiError::unauthorized("Log in to list your rooms"))?,
        ),
        Some(other) => {
            return Err(ApiError::bad_request(format!("Unknown filter: {other}")));
        }
    };

    let mut conn = state.db.get().await?;
    let rooms = rooms::list_active_rooms(&mut conn, participant).await?;
    Ok(Json(rooms))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{room_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}",
    tag = "Rooms",
    params(
        ("room_id" = String, Path, description = "Room ID"),
    ),
    responses(
        (status = 200, description = "Room detail", body = RoomResponse),
        (status = 404, description = "Room not found", body = ApiErrorBody),
    ),
)]
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomResponse>, ApiError> {
    let mut conn = state.db.get().await?;
    let room = rooms::find_room(&mut conn, &room_id).await?;
    Ok(Json(room_response(&mut conn, room).await?))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/rooms/{room_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/rooms/{room_id}",
    tag = "Rooms",
    security(("bearer" = [])),
    params(
        ("room_id" = String, Path, description = "Room ID"),
    ),
    responses(
        (status = 204, description = "Room deleted"),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not the creator", body = ApiErrorBody),
        (status = 404, description = "Room not found", body = ApiErrorBody),
    ),
)]
pub async fn delete_room(
    AuthUser { member_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.db.get().await?;
    let room = rooms::find_room(&mut conn, &room_id).await?;
    permissions::require_creator(&room, &member_id, "delete")?;

    rooms::delete_room(&mut conn, &room_id).await?;
    tracing::info!(%room_id, "room deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /api/v1/rooms/{room_id}/deactivate
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{room_id}/deactivate",
    tag = "Rooms",
    security(("bearer" = [])),
    params(
        ("room_id" = String, Path, description = "Room ID"),
    ),
    responses(
        (status = 202, description = "Room deactivated", body = Room),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not the creator", body = ApiErrorBody),
        (status = 404, description = "Room not found", body = ApiErrorBody),
    ),
)]
pub async fn deactivate_room(
    AuthUser { member_id }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    let mut conn = state.db.get().await?;
    let room = rooms::find_room(&mut conn, &room_id).await?;
    permissions::require_creator(&room, &member_id, "deactivate")?;

    let room = rooms::deactivate_room(&mut conn, &room_id).await?;
    tracing::info!(%room_id, "room deactivated");
    Ok((StatusCode::ACCEPTED, Json(room)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_admins_are_field_errors() {
        assert!(unknown_admin("usr_1", Ok(())).unwrap().is_none());

        let field = unknown_admin("usr_1", Err(RoomError::not_found("Member not found")))
            .unwrap()
            .expect("field error");
        assert_eq!(field.field, "admins");

        let err = unknown_admin(
            "usr_1",
            Err(RoomError::Database(diesel::result::Error::RollbackTransaction)),
        )
        .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
