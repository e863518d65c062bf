//! Admission control: team seats and bans.
//!
//! Every mutation locks the room row first, so the capacity check and the
//! insert that depends on it see the same roster. Two joins racing for the
//! last seat serialize on that lock and the loser sees a full team.

use diesel_async::{AsyncConnection, AsyncPgConnection};
use scoped_futures::ScopedFutureExt;

use crate::error::RoomError;
use crate::models::ban::RoomBan;
use crate::models::membership::Membership;
use crate::models::team::Team;
use crate::permissions;
use crate::store::{members, rooms, roster};

/// Seat `member_id` on team `team_number` of an active room.
pub async fn join(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    member_id: &str,
    team_number: i64,
) -> Result<Membership, RoomError> {
    let membership = conn
        .transaction::<_, RoomError, _>(|conn| {
            async move {
                let room = rooms::lock_room(conn, room_id).await?;
                if !room.is_active {
                    return Err(RoomError::inactive(
                        "You cannot become a participant of an inactive room",
                    ));
                }

                if roster::is_banned(conn, room_id, member_id).await? {
                    return Err(RoomError::forbidden("You are banned in this room"));
                }

                let team = Team::from_number(team_number).ok_or_else(|| {
                    RoomError::validation("team_number must be either 1 or 2")
                })?;

                if roster::membership(conn, room_id, member_id).await?.is_some() {
                    return Err(RoomError::conflict(
                        "You are already a participant of this room",
                    ));
                }

                let taken = roster::team_size(conn, room_id, team).await?;
                if taken >= i64::from(room.max_participants_in_team) {
                    return Err(RoomError::CapacityExceeded);
                }

                roster::insert_membership(conn, room_id, member_id, team).await
            }
            .scope_boxed()
        })
        .await?;

    tracing::debug!(
        room_id,
        member_id,
        team_number = membership.team_number,
        "member joined team"
    );
    Ok(membership)
}

/// Give up the caller's seat. Leaving without a seat is not an error.
/// Returns whether a seat was released.
pub async fn leave(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    member_id: &str,
) -> Result<bool, RoomError> {
    rooms::find_room(conn, room_id).await?;
    let removed = roster::delete_membership(conn, room_id, member_id).await?;
    if removed {
        tracing::debug!(room_id, member_id, "member left team");
    }
    Ok(removed)
}

/// Ban `target_id` from a room on behalf of `actor_id`.
///
/// Creators and admins can never be banned, whoever asks. Banning drops the
/// target's seat in the same transaction. Re-banning keeps the first ban.
pub async fn ban(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    target_id: &str,
    actor_id: &str,
) -> Result<RoomBan, RoomError> {
    let ban = conn
        .transaction::<_, RoomError, _>(|conn| {
            async move {
                let room = rooms::lock_room(conn, room_id).await?;

                if permissions::role_in(conn, &room, target_id)
                    .await?
                    .is_moderator()
                {
                    return Err(RoomError::conflict(
                        "Admins or the room creator cannot be banned",
                    ));
                }

                permissions::require_moderator(conn, &room, actor_id).await?;
                members::find_member(conn, target_id).await?;

                roster::delete_membership(conn, room_id, target_id).await?;
                roster::insert_ban(conn, room_id, target_id, actor_id).await
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(room_id, target_id, actor_id, "member banned");
    Ok(ban)
}

/// Lift a ban. `NotFound` when the target was not banned.
pub async fn unban(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    target_id: &str,
    actor_id: &str,
) -> Result<(), RoomError> {
    let room = rooms::find_room(conn, room_id).await?;
    permissions::require_moderator(conn, &room, actor_id).await?;

    if !roster::delete_ban(conn, room_id, target_id).await? {
        return Err(RoomError::not_found("Member is not banned in this room"));
    }

    tracing::info!(room_id, target_id, actor_id, "member unbanned");
    Ok(())
}

pub async fn list_bans(
    conn: &mut AsyncPgConnection,
    room_id: &str,
) -> Result<Vec<RoomBan>, RoomError> {
    rooms::find_room(conn, room_id).await?;
    roster::list_bans(conn, room_id).await
}

pub async fn list_participants(
    conn: &mut AsyncPgConnection,
    room_id: &str,
) -> Result<Vec<Membership>, RoomError> {
    rooms::find_room(conn, room_id).await?;
    roster::list_memberships(conn, room_id).await
}
