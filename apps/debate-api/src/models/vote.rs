use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::votes;

/// A member's current choice in a room. `team_number == 0` is a revoked vote.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = votes)]
pub struct Vote {
    pub room_id: String,
    pub member_id: String,
    pub team_number: i16,
    pub voted_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = votes)]
pub struct NewVote<'a> {
    pub room_id: &'a str,
    pub member_id: &'a str,
    pub team_number: i16,
    pub voted_at: DateTime<Utc>,
}
