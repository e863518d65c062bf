use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{AsyncConnection, AsyncPgConnection};
use scoped_futures::ScopedFutureExt;

use crate::db::schema::{members, votes};
use crate::error::RoomError;
use crate::models::member::{Member, NewMember};
use crate::models::team::{Team, NO_VOTE};
use crate::store::rooms;

/// Unique constraint on `members.username`, named in the migration.
const USERNAME_CONSTRAINT: &str = "members_username_key";

/// Register a member. Called through `auth::provision`.
pub async fn create_member(
    conn: &mut AsyncPgConnection,
    member_id: &str,
    username: &str,
) -> Result<Member, RoomError> {
    diesel_async::RunQueryDsl::get_result(
        diesel::insert_into(members::table)
            .values(NewMember {
                id: member_id,
                username,
                created_at: Utc::now(),
            })
            .returning(Member::as_returning()),
        conn,
    )
    .await
    .map_err(|err| match &err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)
            if info.constraint_name() == Some(USERNAME_CONSTRAINT) =>
        {
            RoomError::conflict("This username is already taken")
        }
        _ => RoomError::from(err),
    })
}

pub async fn find_member(
    conn: &mut AsyncPgConnection,
    member_id: &str,
) -> Result<Member, RoomError> {
    diesel_async::RunQueryDsl::get_result(
        members::table
            .find(member_id)
            .select(Member::as_select()),
        conn,
    )
    .await
    .optional()?
    .ok_or_else(|| RoomError::not_found("Member not found"))
}

/// Delete an account and everything hanging off it.
///
/// Live votes are first subtracted from their rooms' counters, with the
/// room rows locked in id order, so the tally stays equal to the number of
/// non-zero votes once the cascade removes the vote rows.
pub async fn delete_member(
    conn: &mut AsyncPgConnection,
    member_id: &str,
) -> Result<(), RoomError> {
    conn.transaction::<_, RoomError, _>(|conn| {
        async move {
            let live_votes: Vec<(String, i16)> = diesel_async::RunQueryDsl::load(
                votes::table
                    .filter(votes::member_id.eq(member_id))
                    .filter(votes::team_number.ne(NO_VOTE))
                    .order(votes::room_id.asc())
                    .select((votes::room_id, votes::team_number)),
                conn,
            )
            .await?;

            for (room_id, team_number) in &live_votes {
                rooms::lock_room(conn, room_id).await?;
                if let Some(team) = Team::from_stored(*team_number) {
                    rooms::adjust_votes(conn, room_id, team, -1).await?;
                }
            }

            let deleted = diesel_async::RunQueryDsl::execute(
                diesel::delete(members::table.find(member_id)),
                conn,
            )
            .await?;

            if deleted == 0 {
                return Err(RoomError::not_found("Member not found"));
            }

            tracing::info!(
                member_id,
                reversed_votes = live_votes.len(),
                "member deleted"
            );
            Ok(())
        }
        .scope_boxed()
    })
    .await
}
