use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::room_bans;

#[derive(Debug, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = room_bans)]
pub struct RoomBan {
    pub room_id: String,
    pub member_id: String,
    pub banned_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = room_bans)]
pub struct NewRoomBan<'a> {
    pub room_id: &'a str,
    pub member_id: &'a str,
    pub banned_by: &'a str,
    pub created_at: DateTime<Utc>,
}
