use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::{memberships, room_admins};

/// A member's seat on one team of a room.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = memberships)]
pub struct Membership {
    pub room_id: String,
    pub member_id: String,
    pub team_number: i16,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = memberships)]
pub struct NewMembership<'a> {
    pub room_id: &'a str,
    pub member_id: &'a str,
    pub team_number: i16,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = room_admins)]
pub struct NewRoomAdmin<'a> {
    pub room_id: &'a str,
    pub member_id: &'a str,
}
