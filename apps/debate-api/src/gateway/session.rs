//! Per-connection room session state.

use crate::error::RoomError;
use crate::models::team::Team;
use crate::store::roster::MemberStanding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Subscribed, snapshot not yet delivered.
    Connecting,
    Active,
    Closed,
}

/// State for a single WebSocket connection to a room.
///
/// The ban and seat flags are read once at connect time and only change
/// through this session's own `join_team` / `leave_team`.
#[derive(Debug)]
pub struct RoomSession {
    /// Unique session identifier (`rs_` prefixed ULID).
    pub session_id: String,
    pub room_id: String,
    /// `None` for anonymous viewers.
    pub member_id: Option<String>,
    pub phase: SessionPhase,
    pub is_banned: bool,
    pub team: Option<Team>,
}

impl RoomSession {
    pub fn new(
        session_id: String,
        room_id: String,
        member_id: Option<String>,
        standing: MemberStanding,
    ) -> Self {
        Self {
            session_id,
            room_id,
            member_id,
            phase: SessionPhase::Connecting,
            is_banned: standing.is_banned,
            team: standing.team,
        }
    }

    pub fn is_participant(&self) -> bool {
        self.team.is_some()
    }

    /// Snapshot sent. Inactive rooms close immediately afterwards.
    pub fn activate(&mut self, room_is_active: bool) {
        self.phase = if room_is_active {
            SessionPhase::Active
        } else {
            SessionPhase::Closed
        };
    }

    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    fn member(&self, action: &str) -> Result<&str, RoomError> {
        self.member_id.as_deref().ok_or_else(|| {
            RoomError::Unauthenticated(format!("Only authenticated users can {action}"))
        })
    }

    /// Author and team for a new message.
    pub fn poster(&self) -> Result<(&str, Team), RoomError> {
        let member = self.member("send messages")?;
        if self.is_banned {
            return Err(RoomError::forbidden(
                "You are banned in this room, therefore you cannot send messages",
            ));
        }
        let team = self.team.ok_or_else(|| {
            RoomError::forbidden("You are not a participant of any of the room's teams")
        })?;
        Ok((member, team))
    }

    pub fn deleter(&self) -> Result<&str, RoomError> {
        self.member("delete messages")
    }

    pub fn joiner(&self) -> Result<&str, RoomError> {
        let member = self.member("join a team")?;
        if self.is_banned {
            return Err(RoomError::forbidden("You are banned in this room"));
        }
        if self.is_participant() {
            return Err(RoomError::conflict(
                "You are already a participant of this room",
            ));
        }
        Ok(member)
    }

    pub fn leaver(&self) -> Result<&str, RoomError> {
        let member = self.member("leave a team")?;
        if !self.is_participant() {
            return Err(RoomError::conflict("You are not a participant of this room"));
        }
        Ok(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(member: Option<&str>, is_banned: bool, team: Option<Team>) -> RoomSession {
        RoomSession::new(
            "rs_1".to_string(),
            "room_1".to_string(),
            member.map(str::to_string),
            MemberStanding { is_banned, team },
        )
    }

    #[test]
    fn anonymous_can_only_watch() {
        let s = session(None, false, None);
        assert!(matches!(s.poster(), Err(RoomError::Unauthenticated(_))));
        assert!(matches!(s.deleter(), Err(RoomError::Unauthenticated(_))));
        assert!(matches!(s.joiner(), Err(RoomError::Unauthenticated(_))));
        assert!(matches!(s.leaver(), Err(RoomError::Unauthenticated(_))));
    }

    #[test]
    fn posting_needs_a_seat_and_no_ban() {
        let s = session(Some("usr_1"), false, None);
        assert!(matches!(s.poster(), Err(RoomError::PermissionDenied(_))));

        let s = session(Some("usr_1"), true, Some(Team::First));
        assert!(matches!(s.poster(), Err(RoomError::PermissionDenied(_))));

        let s = session(Some("usr_1"), false, Some(Team::Second));
        assert_eq!(s.poster().unwrap(), ("usr_1", Team::Second));
    }

    #[test]
    fn join_and_leave_guards() {
        let seated = session(Some("usr_1"), false, Some(Team::First));
        assert!(matches!(seated.joiner(), Err(RoomError::Conflict(_))));
        assert_eq!(seated.leaver().unwrap(), "usr_1");

        let unseated = session(Some("usr_1"), false, None);
        assert_eq!(unseated.joiner().unwrap(), "usr_1");
        assert!(matches!(unseated.leaver(), Err(RoomError::Conflict(_))));

        let banned = session(Some("usr_1"), true, None);
        assert!(matches!(banned.joiner(), Err(RoomError::PermissionDenied(_))));
    }

    #[test]
    fn phase_transitions() {
        let mut s = session(None, false, None);
        assert_eq!(s.phase, SessionPhase::Connecting);
        s.activate(true);
        assert_eq!(s.phase, SessionPhase::Active);
        s.close();
        assert_eq!(s.phase, SessionPhase::Closed);

        let mut s = session(None, false, None);
        s.activate(false);
        assert_eq!(s.phase, SessionPhase::Closed);
    }
}
