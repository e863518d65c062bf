use diesel_async::AsyncPgConnection;

use crate::error::RoomError;
use crate::models::room::Room;
use crate::store::rooms;

/// A member's authority over one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomRole {
    Creator,
    Admin,
    Member,
}

impl RoomRole {
    /// Creators and admins moderate the room and cannot be banned from it.
    pub fn is_moderator(self) -> bool {
        matches!(self, RoomRole::Creator | RoomRole::Admin)
    }
}

pub async fn role_in(
    conn: &mut AsyncPgConnection,
    room: &Room,
    member_id: &str,
) -> Result<RoomRole, RoomError> {
    if room.creator_id == member_id {
        return Ok(RoomRole::Creator);
    }
    if rooms::is_admin(conn, &room.id, member_id).await? {
        return Ok(RoomRole::Admin);
    }
    Ok(RoomRole::Member)
}

pub fn require_creator(room: &Room, member_id: &str, action: &str) -> Result<(), RoomError> {
    if room.creator_id != member_id {
        return Err(RoomError::forbidden(format!(
            "Only the room creator can {action} this room"
        )));
    }
    Ok(())
}

pub async fn require_moderator(
    conn: &mut AsyncPgConnection,
    room: &Room,
    member_id: &str,
) -> Result<RoomRole, RoomError> {
    let role = role_in(conn, room, member_id).await?;
    if !role.is_moderator() {
        return Err(RoomError::forbidden(
            "Only room admins can manage bans in this room",
        ));
    }
    Ok(role)
}
