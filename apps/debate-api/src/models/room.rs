use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::rooms;
use crate::models::team::Team;

pub const TITLE_MAX_LENGTH: usize = 50;
pub const TEAM_NAME_MAX_LENGTH: usize = 30;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = rooms)]
pub struct Room {
    pub id: String,
    pub title: String,
    pub first_team_name: String,
    pub second_team_name: String,
    pub creator_id: String,
    pub is_active: bool,
    pub max_participants_in_team: i32,
    pub first_team_votes: i32,
    pub second_team_votes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn votes_for(&self, team: Team) -> i32 {
        match team {
            Team::First => self.first_team_votes,
            Team::Second => self.second_team_votes,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = rooms)]
pub struct NewRoom<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub first_team_name: &'a str,
    pub second_team_name: &'a str,
    pub creator_id: &'a str,
    pub is_active: bool,
    pub max_participants_in_team: i32,
    pub first_team_votes: i32,
    pub second_team_votes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Room detail returned by the HTTP API: the row plus its roster sizes.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomResponse {
    #[serde(flatten)]
    pub room: Room,
    pub admins: Vec<String>,
    pub first_team_participants: i64,
    pub second_team_participants: i64,
}

/// Aggregate tally of a room after a vote commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct VoteCounts {
    pub first_team_votes: i32,
    pub second_team_votes: i32,
}

impl From<&Room> for VoteCounts {
    fn from(room: &Room) -> Self {
        Self {
            first_team_votes: room.first_team_votes,
            second_team_votes: room.second_team_votes,
        }
    }
}
