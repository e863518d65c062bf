//! Room session connect flow and inbound event handling.

use debate_common::id::{prefix, prefixed_ulid};

use crate::admission;
use crate::error::RoomError;
use crate::models::message::{normalize_body, Message};
use crate::models::room::Room;
use crate::models::team::Team;
use crate::store::{messages, rooms, roster};
use crate::AppState;

use super::events::{ClientEvent, ServerEvent};
use super::session::{RoomSession, SessionPhase};

pub async fn load_room(state: &AppState, room_id: &str) -> Result<Room, RoomError> {
    let mut conn = state.db.get().await?;
    rooms::find_room(&mut conn, room_id).await
}

/// Build the session for a connection that is already subscribed to the
/// room, and read the snapshot it starts from.
pub async fn connect(
    state: &AppState,
    room: &Room,
    member_id: Option<String>,
) -> Result<(RoomSession, Vec<Message>), RoomError> {
    let mut conn = state.db.get().await?;

    let standing = match member_id.as_deref() {
        Some(member_id) => roster::standing(&mut conn, room, member_id).await?,
        None => Default::default(),
    };
    let comments = messages::list_messages(&mut conn, &room.id).await?;

    let session = RoomSession::new(
        prefixed_ulid(prefix::SESSION),
        room.id.clone(),
        member_id,
        standing,
    );
    Ok((session, comments))
}

/// Handle one decoded event. Errors go back to the caller only.
pub async fn dispatch(
    state: &AppState,
    session: &mut RoomSession,
    event: ClientEvent,
) -> Result<(), RoomError> {
    if session.phase != SessionPhase::Active {
        return Err(RoomError::inactive(
            "Room is inactive, messages cannot be updated.",
        ));
    }

    match event {
        ClientEvent::NewMessage { body } => {
            let (author, team) = session.poster()?;
            post_message(state, &session.room_id, author, team, &body).await?;
        }
        ClientEvent::DeleteMessages { ids } => {
            let author = session.deleter()?;
            delete_messages(state, &session.room_id, author, &ids).await?;
        }
        ClientEvent::JoinTeam => {
            let member_id = session.joiner()?;
            let mut conn = state.db.get().await?;
            let seat = roster::membership(&mut conn, &session.room_id, member_id)
                .await?
                .ok_or_else(|| {
                    RoomError::forbidden("You are not a participant of any of the room's teams")
                })?;
            session.team = Team::from_stored(seat.team_number);
        }
        ClientEvent::LeaveTeam => {
            let member_id = session.leaver()?;
            let mut conn = state.db.get().await?;
            admission::leave(&mut conn, &session.room_id, member_id).await?;
            session.team = None;
        }
    }
    Ok(())
}

/// Store a message and announce it to the room.
pub async fn post_message(
    state: &AppState,
    room_id: &str,
    author_id: &str,
    team: Team,
    body: &str,
) -> Result<Message, RoomError> {
    let body = normalize_body(body).map_err(RoomError::validation)?;
    let mut conn = state.db.get().await?;

    state
        .broadcast
        .commit_then_publish(room_id, async {
            let message = messages::create_message(
                &mut conn,
                &state.snowflake,
                room_id,
                author_id,
                body,
                team,
            )
            .await?;
            let event = ServerEvent::NewMessage {
                comment: message.clone(),
            };
            Ok((message, event))
        })
        .await
}

/// Delete a batch of the caller's messages and tell the room to reload.
pub async fn delete_messages(
    state: &AppState,
    room_id: &str,
    author_id: &str,
    ids: &[i64],
) -> Result<usize, RoomError> {
    let mut conn = state.db.get().await?;

    state
        .broadcast
        .commit_then_publish(room_id, async {
            let deleted = messages::delete_authored(&mut conn, room_id, author_id, ids).await?;
            Ok((deleted, ServerEvent::DeleteMessages))
        })
        .await
}
