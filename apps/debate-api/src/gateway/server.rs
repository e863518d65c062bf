//! WebSocket upgrade handler and per-connection event loop.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::auth::middleware::MaybeAuthUser;
use crate::error::RoomError;
use crate::AppState;

use super::events::{ClientEvent, ServerEvent, Snapshot};
use super::fanout::RoomSubscription;
use super::handler;
use super::session::{RoomSession, SessionPhase};

type WsSink = SplitSink<WebSocket, Message>;

/// Close codes (4000-range for application-level).
const CLOSE_UNKNOWN_ERROR: u16 = 4000;
const CLOSE_ROOM_NOT_FOUND: u16 = 4004;
const CLOSE_ROOM_INACTIVE: u16 = 4010;

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway/rooms/{room_id}", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    MaybeAuthUser(member_id): MaybeAuthUser,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, room_id, member_id))
}

async fn handle_connection(
    socket: WebSocket,
    state: AppState,
    room_id: String,
    member_id: Option<String>,
) {
    let (mut ws_tx, ws_rx) = socket.split();

    let room = match handler::load_room(&state, &room_id).await {
        Ok(room) => room,
        Err(err) => {
            let (code, reason) = load_failure_close(&err);
            if code == CLOSE_ROOM_NOT_FOUND {
                tracing::debug!(%room_id, %err, "room session rejected");
            } else {
                tracing::error!(%room_id, ?err, "room lookup failed");
            }
            let _ = send_event(&mut ws_tx, &ServerEvent::error(err.client_message())).await;
            let _ = send_close(&mut ws_tx, code, reason).await;
            return;
        }
    };

    // Subscribe before reading the snapshot so nothing committed in between
    // is missed.
    let subscription = state.broadcast.subscribe(&room.id);

    let (mut session, comments) = match handler::connect(&state, &room, member_id).await {
        Ok(result) => result,
        Err(err) => {
            let _ = send_event(&mut ws_tx, &ServerEvent::error(err.client_message())).await;
            let _ = send_close(&mut ws_tx, CLOSE_UNKNOWN_ERROR, "Session setup failed").await;
            return;
        }
    };

    if send_json(&mut ws_tx, &Snapshot { comments: &comments })
        .await
        .is_err()
    {
        return;
    }

    session.activate(room.is_active);
    if session.phase == SessionPhase::Closed {
        let message = "Room is inactive, messages cannot be updated.";
        let _ = send_event(&mut ws_tx, &ServerEvent::error(message)).await;
        let _ = send_close(&mut ws_tx, CLOSE_ROOM_INACTIVE, "Room is inactive").await;
        return;
    }

    tracing::info!(
        session_id = %session.session_id,
        room_id = %session.room_id,
        member_id = session.member_id.as_deref().unwrap_or("anonymous"),
        "room session established"
    );

    run_session(&state, &mut session, ws_tx, ws_rx, subscription).await;
    session.close();

    tracing::info!(
        session_id = %session.session_id,
        room_id = %session.room_id,
        "room session ended"
    );
}

/// Close code and reason for a connection whose room could not be loaded.
fn load_failure_close(err: &RoomError) -> (u16, &'static str) {
    match err {
        RoomError::NotFound(_) => (CLOSE_ROOM_NOT_FOUND, "Room not found"),
        _ => (CLOSE_UNKNOWN_ERROR, "Room lookup failed"),
    }
}

/// Main session loop: handle client events and forward room broadcasts.
/// Returning drops the subscription, which leaves the room's group.
async fn run_session(
    state: &AppState,
    session: &mut RoomSession,
    mut ws_tx: WsSink,
    mut ws_rx: SplitStream<WebSocket>,
    mut subscription: RoomSubscription,
) {
    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match ClientEvent::decode(&text) {
                            Ok(event) => handler::dispatch(state, session, event)
                                .await
                                .err()
                                .map(|err| {
                                    if matches!(err, RoomError::Database(_) | RoomError::Pool(_)) {
                                        tracing::error!(session_id = %session.session_id, ?err, "room event failed");
                                    }
                                    ServerEvent::error(err.client_message())
                                }),
                            Err(err) => {
                                tracing::debug!(session_id = %session.session_id, %err, "bad client event");
                                Some(ServerEvent::error(err.to_string()))
                            }
                        };

                        if let Some(reply) = reply {
                            if send_event(&mut ws_tx, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, session_id = %session.session_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            result = subscription.recv() => {
                match result {
                    Ok(event) => {
                        if send_event(&mut ws_tx, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            session_id = %session.session_id,
                            room_id = subscription.room_id(),
                            skipped = n,
                            "room session lagged behind broadcast"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

async fn send_event(ws_tx: &mut WsSink, event: &ServerEvent) -> Result<(), axum::Error> {
    send_json(ws_tx, event).await
}

async fn send_json<T: Serialize>(ws_tx: &mut WsSink, value: &T) -> Result<(), axum::Error> {
    let json = serde_json::to_string(value).map_err(axum::Error::new)?;
    ws_tx.send(Message::Text(json.into())).await
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(ws_tx: &mut WsSink, code: u16, reason: &str) -> Result<(), axum::Error> {
    ws_tx
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })))
        .await
}
