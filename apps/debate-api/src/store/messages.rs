use chrono::Utc;
use debate_common::snowflake::snowflake_datetime;
use debate_common::SnowflakeGenerator;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use scoped_futures::ScopedFutureExt;

use crate::db::schema::{messages, rooms};
use crate::error::RoomError;
use crate::models::message::{Message, NewMessage};
use crate::models::team::Team;

/// The room's message log, oldest first.
pub async fn list_messages(
    conn: &mut AsyncPgConnection,
    room_id: &str,
) -> Result<Vec<Message>, RoomError> {
    Ok(diesel_async::RunQueryDsl::load(
        messages::table
            .filter(messages::room_id.eq(room_id))
            .order(messages::id.asc())
            .select(Message::as_select()),
        conn,
    )
    .await?)
}

pub async fn find_message(
    conn: &mut AsyncPgConnection,
    message_id: i64,
) -> Result<Message, RoomError> {
    diesel_async::RunQueryDsl::get_result(
        messages::table
            .find(message_id)
            .select(Message::as_select()),
        conn,
    )
    .await
    .optional()?
    .ok_or_else(|| RoomError::not_found("Comment not found"))
}

/// Append a message to an active room.
///
/// The activation flag is re-read under a share lock in the insert
/// transaction, so a room deactivated after the caller checked it still
/// rejects the post.
pub async fn create_message(
    conn: &mut AsyncPgConnection,
    snowflake: &SnowflakeGenerator,
    room_id: &str,
    author_id: &str,
    body: &str,
    team: Team,
) -> Result<Message, RoomError> {
    conn.transaction::<_, RoomError, _>(|conn| {
        async move {
            let is_active: bool = diesel_async::RunQueryDsl::get_result(
                rooms::table
                    .find(room_id)
                    .for_share()
                    .select(rooms::is_active),
                conn,
            )
            .await
            .optional()?
            .ok_or_else(|| RoomError::not_found("Room not found"))?;

            if !is_active {
                return Err(RoomError::inactive(
                    "Room is inactive, messages cannot be updated.",
                ));
            }

            let id = snowflake.generate();
            let message: Message = diesel_async::RunQueryDsl::get_result(
                diesel::insert_into(messages::table)
                    .values(NewMessage {
                        id,
                        room_id,
                        author_id,
                        body,
                        team_number: team.number(),
                        created_at: snowflake_datetime(id),
                    })
                    .returning(Message::as_returning()),
                conn,
            )
            .await?;

            Ok(message)
        }
        .scope_boxed()
    })
    .await
}

/// Replace a message body. Only its author may edit it.
pub async fn update_body(
    conn: &mut AsyncPgConnection,
    message_id: i64,
    author_id: &str,
    body: &str,
) -> Result<Message, RoomError> {
    let message = find_message(conn, message_id).await?;
    if message.author_id != author_id {
        return Err(RoomError::forbidden("You can only edit your own comments"));
    }

    Ok(diesel_async::RunQueryDsl::get_result(
        diesel::update(messages::table.find(message_id))
            .set((
                messages::body.eq(body),
                messages::edited_at.eq(Some(Utc::now())),
            ))
            .returning(Message::as_returning()),
        conn,
    )
    .await?)
}

/// Delete a batch of messages authored by `author_id` in `room_id`.
///
/// The batch is all-or-nothing: any id that is missing, belongs to another
/// room, or was written by someone else rejects the whole request and
/// deletes nothing. Returns the number of rows removed.
pub async fn delete_authored(
    conn: &mut AsyncPgConnection,
    room_id: &str,
    author_id: &str,
    ids: &[i64],
) -> Result<usize, RoomError> {
    let mut wanted: Vec<i64> = ids.to_vec();
    wanted.sort_unstable();
    wanted.dedup();

    if wanted.is_empty() {
        return Err(RoomError::validation(
            "You have to specify ids of the comments to delete",
        ));
    }

    conn.transaction::<_, RoomError, _>(|conn| {
        async move {
            let found: Vec<(i64, String)> = diesel_async::RunQueryDsl::load(
                messages::table
                    .filter(messages::room_id.eq(room_id))
                    .filter(messages::id.eq_any(&wanted))
                    .for_update()
                    .select((messages::id, messages::author_id)),
                conn,
            )
            .await?;

            if found.len() != wanted.len() {
                return Err(RoomError::not_found("Some of the comments do not exist"));
            }
            if found.iter().any(|(_, author)| author != author_id) {
                return Err(RoomError::forbidden(
                    "You can only delete your own comments",
                ));
            }

            let deleted = diesel_async::RunQueryDsl::execute(
                diesel::delete(messages::table.filter(messages::id.eq_any(&wanted))),
                conn,
            )
            .await?;

            Ok(deleted)
        }
        .scope_boxed()
    })
    .await
}
