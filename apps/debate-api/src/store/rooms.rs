use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{AsyncConnection, AsyncPgConnection};
use scoped_futures::ScopedFutureExt;

use crate::db::schema::{memberships, room_admins, rooms};
use crate::error::RoomError;
use crate::models::membership::NewRoomAdmin;
use crate::models::room::{NewRoom, Room};
use crate::models::team::Team;

/// Unique constraint on `rooms.title`, named in the migration.
const TITLE_CONSTRAINT: &str = "rooms_title_key";

/// Validated fields of a room about to be created.
#[derive(Debug)]
pub struct RoomDraft<'a> {
    pub title: &'a str,
    pub first_team_name: &'a str,
    pub second_team_name: &'a str,
    pub max_participants_in_team: i32,
}

pub async fn find_room(conn: &mut AsyncPgConnection, room_id: &str) -> Result<Room, RoomError> {
    diesel_async::RunQueryDsl::get_result(
        rooms::table.find(room_id).select(Room::as_select()),
        conn,
    )
    .await
    .optional()?
    .ok_or_else(|| RoomError::not_found("Room not found"))
}

/// Read a room and hold its row lock until the surrounding transaction ends.
///
/// Every roster or tally mutation takes this lock first, which serializes
/// concurrent joins, bans and votes on the same room.
pub async fn lock_room(conn: &mut AsyncPgConnection, room_id: &str) -> Result<Room, RoomError> {
    diesel_async::RunQueryDsl::get_result(
        rooms::table
            .find(room_id)
            .for_update()
            .select(Room::as_select()),
        conn,
    )
    .await
    .optional()?
    .ok_or_else(|| RoomError::not_found("Room not found"))
}

/// Insert a room and its admin set. The creator is always an admin.
pub async fn create_room(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    creator_id: &str,
    draft: RoomDraft<'_>,
    admins: &[String],
) -> Result<Room, RoomError> {
    let now = Utc::now();

    let mut admin_ids: Vec<&str> = vec![creator_id];
    for admin in admins {
        if !admin_ids.contains(&admin.as_str()) {
            admin_ids.push(admin.as_str());
        }
    }

    conn.transaction::<_, RoomError, _>(|conn| {
        async move {
            let room: Room = diesel_async::RunQueryDsl::get_result(
                diesel::insert_into(rooms::table)
                    .values(NewRoom {
                        id: room_id,
                        title: draft.title,
                        first_team_name: draft.first_team_name,
                        second_team_name: draft.second_team_name,
                        creator_id,
                        is_active: true,
                        max_participants_in_team: draft.max_participants_in_team,
                        first_team_votes: 0,
                        second_team_votes: 0,
                        created_at: now,
                        updated_at: now,
                    })
                    .returning(Room::as_returning()),
                conn,
            )
            .await
            .map_err(|err| match &err {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)
                    if info.constraint_name() == Some(TITLE_CONSTRAINT) =>
                {
                    RoomError::ConstraintViolation(
                        "A room with this title already exists".to_string(),
                    )
                }
                _ => RoomError::from(err),
            })?;

            let rows: Vec<NewRoomAdmin<'_>> = admin_ids
                .iter()
                .map(|&member_id| NewRoomAdmin {
                    room_id,
                    member_id,
                })
                .collect();

            diesel_async::RunQueryDsl::execute(
                diesel::insert_into(room_admins::table).values(&rows),
                conn,
            )
            .await?;

            Ok(room)
        }
        .scope_boxed()
    })
    .await
}

/// Active rooms, newest first. With `participant`, only rooms where that
/// member holds a team seat.
pub async fn list_active_rooms(
    conn: &mut AsyncPgConnection,
    participant: Option<&str>,
) -> Result<Vec<Room>, RoomError> {
    let mut query = rooms::table
        .filter(rooms::is_active.eq(true))
        .order((rooms::created_at.desc(), rooms::id.desc()))
        .select(Room::as_select())
        .into_boxed();

    if let Some(member_id) = participant {
        query = query.filter(
            rooms::id.eq_any(
                memberships::table
                    .filter(memberships::member_id.eq(member_id.to_string()))
                    .select(memberships::room_id),
            ),
        );
    }

    Ok(diesel_async::RunQueryDsl::load(query, conn).await?)
}

/// One-way transition to inactive. Returns the updated room.
pub async fn deactivate_room(
    conn: &mut AsyncPgConnection,
    room_id: &str,
) -> Result<Room, RoomError> {
    diesel_async::RunQueryDsl::get_result(
        diesel::update(rooms::table.find(room_id))
            .set((rooms::is_active.eq(false), rooms::updated_at.eq(Utc::now())))
            .returning(Room::as_returning()),
        conn,
    )
    .await
    .optional()?
    .ok_or_else(|| RoomError::not_found("Room not found"))
}

/// Delete a room. Memberships, votes, bans, admins and messages cascade.
pub async fn delete_room(conn: &mut AsyncPgConnection, room_id: &str) -> Result<(), RoomError> {
    let deleted =
        diesel_async::RunQueryDsl::execute(diesel::delete(rooms::table.find(room_id)), conn)
            .await?;

    if deleted == 0 {
        return Err(RoomError::not_found("Room not found"));
    }
    Ok(())
}

pub async fn admin_ids(
    conn: &mut AsyncPgConnection,
    room_id: &str,
) -> Result<Vec<String>, RoomError> {
    Ok(diesel_async::RunQueryDsl::load(
        room_admins::table
            .filter(room_admins::room_id.eq(room_id))
            .order(room_admins::member_id.asc())
            .select(room_admins::member_id),
        conn,
    )
    .await?)
}

pub async fn is_admin(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    member_id: &str,
) -> Result<bool, RoomError> {
    let count: i64 = diesel_async::RunQueryDsl::get_result(
        room_admins::table
            .filter(room_admins::room_id.eq(room_id))
            .filter(room_admins::member_id.eq(member_id))
            .count(),
        conn,
    )
    .await?;

    Ok(count > 0)
}

/// Apply `delta` to one team's vote counter with a single SQL increment.
pub async fn adjust_votes(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    team: Team,
    delta: i32,
) -> Result<(), RoomError> {
    let target = rooms::table.find(room_id);
    let updated = match team {
        Team::First => {
            diesel_async::RunQueryDsl::execute(
                diesel::update(target)
                    .set(rooms::first_team_votes.eq(rooms::first_team_votes + delta)),
                conn,
            )
            .await?
        }
        Team::Second => {
            diesel_async::RunQueryDsl::execute(
                diesel::update(target)
                    .set(rooms::second_team_votes.eq(rooms::second_team_votes + delta)),
                conn,
            )
            .await?
        }
    };

    if updated == 0 {
        return Err(RoomError::not_found("Room not found"));
    }
    Ok(())
}
