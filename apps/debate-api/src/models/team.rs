use serde::Serialize;

/// One of the two sides of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "i16")]
pub enum Team {
    First,
    Second,
}

/// Stored team number of a revoked vote.
pub const NO_VOTE: i16 = 0;

impl Team {
    pub fn number(self) -> i16 {
        match self {
            Team::First => 1,
            Team::Second => 2,
        }
    }

    pub fn from_number(n: i64) -> Option<Team> {
        match n {
            1 => Some(Team::First),
            2 => Some(Team::Second),
            _ => None,
        }
    }

    /// Decode a stored vote team number; `NO_VOTE` and anything unknown is `None`.
    pub fn from_stored(n: i16) -> Option<Team> {
        Team::from_number(n as i64)
    }
}

impl From<Team> for i16 {
    fn from(team: Team) -> i16 {
        team.number()
    }
}

/// Stored representation of a vote choice: `None` revokes.
pub fn vote_number(choice: Option<Team>) -> i16 {
    choice.map(Team::number).unwrap_or(NO_VOTE)
}
