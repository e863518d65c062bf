use chrono::Utc;
use diesel::prelude::*;
use diesel_async::AsyncPgConnection;

use crate::db::schema::{memberships, room_bans};
use crate::error::RoomError;
use crate::models::ban::{NewRoomBan, RoomBan};
use crate::models::membership::{Membership, NewMembership};
use crate::models::room::Room;
use crate::models::team::Team;
use crate::permissions;

/// What a member may do in a room, read once when a session connects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberStanding {
    pub is_banned: bool,
    pub team: Option<Team>,
}

pub async fn membership(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    member_id: &str,
) -> Result<Option<Membership>, RoomError> {
    Ok(diesel_async::RunQueryDsl::get_result(
        memberships::table
            .find((room_id, member_id))
            .select(Membership::as_select()),
        conn,
    )
    .await
    .optional()?)
}

pub async fn team_size(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    team: Team,
) -> Result<i64, RoomError> {
    Ok(diesel_async::RunQueryDsl::get_result(
        memberships::table
            .filter(memberships::room_id.eq(room_id))
            .filter(memberships::team_number.eq(team.number()))
            .count(),
        conn,
    )
    .await?)
}

/// Seats taken on (first, second) team.
pub async fn team_sizes(
    conn: &mut AsyncPgConnection,
    room_id: &str,
) -> Result<(i64, i64), RoomError> {
    let rows: Vec<(i16, i64)> = diesel_async::RunQueryDsl::load(
        memberships::table
            .filter(memberships::room_id.eq(room_id))
            .group_by(memberships::team_number)
            .select((memberships::team_number, diesel::dsl::count_star())),
        conn,
    )
    .await?;

    let mut sizes = (0, 0);
    for (team_number, count) in rows {
        match Team::from_stored(team_number) {
            Some(Team::First) => sizes.0 = count,
            Some(Team::Second) => sizes.1 = count,
            None => {}
        }
    }
    Ok(sizes)
}

pub async fn list_memberships(
    conn: &mut AsyncPgConnection,
    room_id: &str,
) -> Result<Vec<Membership>, RoomError> {
    Ok(diesel_async::RunQueryDsl::load(
        memberships::table
            .filter(memberships::room_id.eq(room_id))
            .order(memberships::joined_at.asc())
            .select(Membership::as_select()),
        conn,
    )
    .await?)
}

pub async fn insert_membership(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    member_id: &str,
    team: Team,
) -> Result<Membership, RoomError> {
    Ok(diesel_async::RunQueryDsl::get_result(
        diesel::insert_into(memberships::table)
            .values(NewMembership {
                room_id,
                member_id,
                team_number: team.number(),
                joined_at: Utc::now(),
            })
            .returning(Membership::as_returning()),
        conn,
    )
    .await?)
}

/// Returns whether a seat was removed.
pub async fn delete_membership(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    member_id: &str,
) -> Result<bool, RoomError> {
    let deleted = diesel_async::RunQueryDsl::execute(
        diesel::delete(memberships::table.find((room_id, member_id))),
        conn,
    )
    .await?;
    Ok(deleted > 0)
}

pub async fn is_banned(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    member_id: &str,
) -> Result<bool, RoomError> {
    let count: i64 = diesel_async::RunQueryDsl::get_result(
        room_bans::table
            .filter(room_bans::room_id.eq(room_id))
            .filter(room_bans::member_id.eq(member_id))
            .count(),
        conn,
    )
    .await?;
    Ok(count > 0)
}

/// Record a ban. Banning an already-banned member leaves the original row.
pub async fn insert_ban(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    member_id: &str,
    banned_by: &str,
) -> Result<RoomBan, RoomError> {
    diesel_async::RunQueryDsl::execute(
        diesel::insert_into(room_bans::table)
            .values(NewRoomBan {
                room_id,
                member_id,
                banned_by,
                created_at: Utc::now(),
            })
            .on_conflict_do_nothing(),
        conn,
    )
    .await?;

    Ok(diesel_async::RunQueryDsl::get_result(
        room_bans::table
            .find((room_id, member_id))
            .select(RoomBan::as_select()),
        conn,
    )
    .await?)
}

/// Returns whether a ban was lifted.
pub async fn delete_ban(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    member_id: &str,
) -> Result<bool, RoomError> {
    let deleted = diesel_async::RunQueryDsl::execute(
        diesel::delete(room_bans::table.find((room_id, member_id))),
        conn,
    )
    .await?;
    Ok(deleted > 0)
}

pub async fn list_bans(
    conn: &mut AsyncPgConnection,
    room_id: &str,
) -> Result<Vec<RoomBan>, RoomError> {
    Ok(diesel_async::RunQueryDsl::load(
        room_bans::table
            .filter(room_bans::room_id.eq(room_id))
            .order(room_bans::created_at.asc())
            .select(RoomBan::as_select()),
        conn,
    )
    .await?)
}

/// Ban and seat status for a connecting session. Creators and admins are
/// never treated as banned.
pub async fn standing(
    conn: &mut AsyncPgConnection,
    room: &Room,
    member_id: &str,
) -> Result<MemberStanding, RoomError> {
    let privileged = permissions::role_in(conn, room, member_id)
        .await?
        .is_moderator();
    let banned = !privileged && is_banned(conn, &room.id, member_id).await?;
    let team = membership(conn, &room.id, member_id)
        .await?
        .and_then(|seat| Team::from_stored(seat.team_number));

    Ok(MemberStanding {
        is_banned: banned,
        team,
    })
}
