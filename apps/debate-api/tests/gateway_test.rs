mod common;

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start a real listener for WebSocket tests, plus an in-process HTTP test
/// server sharing the same state.
async fn start() -> (SocketAddr, TestServer, debate_api::AppState) {
    let (app, state) = common::test_app().await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let served = app.clone();
    tokio::spawn(async move {
        axum::serve(listener, served).await.unwrap();
    });

    (addr, TestServer::new(app).expect("test server"), state)
}

fn room_url(addr: SocketAddr, room_id: &str, member: Option<&common::TestMember>) -> String {
    match member {
        Some(m) => format!("ws://{addr}/gateway/rooms/{room_id}?access_token={}", m.token),
        None => format!("ws://{addr}/gateway/rooms/{room_id}"),
    }
}

async fn next_frame(ws: &mut Ws) -> tungstenite::Message {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");
        match msg {
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => return other,
        }
    }
}

async fn next_json(ws: &mut Ws) -> Value {
    let text = next_frame(ws).await.into_text().expect("not text");
    serde_json::from_str(&text).expect("parse frame")
}

async fn send(ws: &mut Ws, event: Value) {
    ws.send(tungstenite::Message::Text(event.to_string().into()))
        .await
        .expect("send");
}

/// Nothing arrives within a short window.
async fn assert_quiet(ws: &mut Ws) {
    let result = time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(result.is_err(), "unexpected frame: {result:?}");
}

/// Connect and consume the snapshot.
async fn open(
    addr: SocketAddr,
    room_id: &str,
    member: Option<&common::TestMember>,
) -> (Ws, Value) {
    let (mut ws, _) = tokio_tungstenite::connect_async(room_url(addr, room_id, member))
        .await
        .expect("ws connect");
    let snapshot = next_json(&mut ws).await;
    assert!(snapshot["comments"].is_array(), "first frame is the snapshot");
    (ws, snapshot)
}

async fn expect_close(ws: &mut Ws, code: u16) {
    match next_frame(ws).await {
        tungstenite::Message::Close(Some(frame)) => {
            assert_eq!(
                frame.code,
                tungstenite::protocol::frame::coding::CloseCode::from(code)
            );
        }
        other => panic!("Expected Close frame, got: {other:?}"),
    }
}

async fn post_comment(server: &TestServer, member: &common::TestMember, room_id: &str, body: &str) -> String {
    let resp = server
        .post(&format!("/api/v1/rooms/{room_id}/comments"))
        .add_header(AUTHORIZATION, member.bearer())
        .json(&json!({ "body": body }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    resp.json::<Value>()["id"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Connect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn snapshot_lists_existing_comments() {
    let (addr, server, state) = start().await;
    let creator = common::create_member(&state, "host").await;
    let room_id = common::create_room(&server, &creator, 5).await;
    common::join(&server, &creator, &room_id, 1).await;
    post_comment(&server, &creator, &room_id, "opening statement").await;

    let (_ws, snapshot) = open(addr, &room_id, None).await;
    let comments = snapshot["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["body"], "opening statement");
    assert_eq!(comments[0]["creator"], creator.id);

    common::cleanup_members(&state.db, &[&creator.id]).await;
}

#[tokio::test]
async fn missing_room_is_closed() {
    let (addr, _server, _state) = start().await;

    let (mut ws, _) = tokio_tungstenite::connect_async(room_url(addr, "room_missing", None))
        .await
        .expect("ws connect");
    let error = next_json(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["error_message"], "Room not found");
    expect_close(&mut ws, 4004).await;
}

#[tokio::test]
async fn inactive_room_sends_snapshot_then_closes() {
    let (addr, server, state) = start().await;
    let creator = common::create_member(&state, "host").await;
    let room_id = common::create_room(&server, &creator, 5).await;
    common::deactivate(&server, &creator, &room_id).await;

    let (mut ws, _) = open(addr, &room_id, Some(&creator)).await;
    let error = next_json(&mut ws).await;
    assert_eq!(
        error,
        json!({ "type": "error", "error_message": "Room is inactive, messages cannot be updated." })
    );
    expect_close(&mut ws, 4010).await;

    common::cleanup_members(&state.db, &[&creator.id]).await;
}

#[tokio::test]
async fn unknown_token_is_rejected_at_upgrade() {
    let (addr, server, state) = start().await;
    let creator = common::create_member(&state, "host").await;
    let room_id = common::create_room(&server, &creator, 5).await;

    let url = format!("ws://{addr}/gateway/rooms/{room_id}?access_token=pat_bogus");
    match tokio_tungstenite::connect_async(url).await {
        Err(tungstenite::Error::Http(resp)) => {
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
        other => panic!("expected HTTP 401, got {other:?}"),
    }

    common::cleanup_members(&state.db, &[&creator.id]).await;
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_message_reaches_every_session_in_the_room_only() {
    let (addr, server, state) = start().await;
    let creator = common::create_member(&state, "host").await;
    let author = common::create_member(&state, "author").await;
    let room_id = common::create_room(&server, &creator, 5).await;
    let other_room = common::create_room(&server, &creator, 5).await;
    common::join(&server, &author, &room_id, 1).await;

    let (mut author_ws, _) = open(addr, &room_id, Some(&author)).await;
    let (mut viewer_a, _) = open(addr, &room_id, None).await;
    let (mut viewer_b, _) = open(addr, &room_id, Some(&creator)).await;
    let (mut elsewhere, _) = open(addr, &other_room, None).await;

    send(
        &mut author_ws,
        json!({ "type": "new_message", "data": { "body": "hello room" } }),
    )
    .await;

    let mut ids = Vec::new();
    for ws in [&mut author_ws, &mut viewer_a, &mut viewer_b] {
        let event = next_json(ws).await;
        assert_eq!(event["type"], "new_message");
        assert_eq!(event["comment"]["body"], "hello room");
        assert_eq!(event["comment"]["creator"], author.id);
        assert_eq!(event["comment"]["team_number"], 1);
        ids.push(event["comment"]["id"].clone());
    }
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_quiet(&mut elsewhere).await;

    // Comments posted over HTTP are announced too.
    post_comment(&server, &author, &room_id, "from http").await;
    let event = next_json(&mut viewer_a).await;
    assert_eq!(event["comment"]["body"], "from http");

    common::cleanup_members(&state.db, &[&creator.id, &author.id]).await;
}

#[tokio::test]
async fn events_arrive_in_commit_order() {
    let (addr, server, state) = start().await;
    let creator = common::create_member(&state, "host").await;
    let author = common::create_member(&state, "author").await;
    let room_id = common::create_room(&server, &creator, 5).await;
    common::join(&server, &author, &room_id, 2).await;

    let (mut author_ws, _) = open(addr, &room_id, Some(&author)).await;
    let (mut viewer, _) = open(addr, &room_id, None).await;

    for i in 0..5 {
        send(
            &mut author_ws,
            json!({ "type": "new_message", "data": { "body": format!("m{i}") } }),
        )
        .await;
    }

    let mut seen = Vec::new();
    for _ in 0..5 {
        let event = next_json(&mut viewer).await;
        seen.push(event["comment"]["body"].as_str().unwrap().to_string());
    }
    assert_eq!(seen, ["m0", "m1", "m2", "m3", "m4"]);

    common::cleanup_members(&state.db, &[&creator.id, &author.id]).await;
}

// ---------------------------------------------------------------------------
// Inbound rejections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_events_only_answer_the_caller() {
    let (addr, server, state) = start().await;
    let creator = common::create_member(&state, "host").await;
    let unseated = common::create_member(&state, "unseated").await;
    let seated = common::create_member(&state, "seated").await;
    let room_id = common::create_room(&server, &creator, 5).await;
    common::join(&server, &seated, &room_id, 1).await;

    let (mut anon, _) = open(addr, &room_id, None).await;
    let (mut unseated_ws, _) = open(addr, &room_id, Some(&unseated)).await;
    let (mut seated_ws, _) = open(addr, &room_id, Some(&seated)).await;

    send(&mut anon, json!({ "type": "new_message", "data": { "body": "hi" } })).await;
    let error = next_json(&mut anon).await;
    assert_eq!(error["type"], "error");
    assert_eq!(
        error["error_message"],
        "Only authenticated users can send messages"
    );

    send(
        &mut unseated_ws,
        json!({ "type": "new_message", "data": { "body": "hi" } }),
    )
    .await;
    assert_eq!(next_json(&mut unseated_ws).await["type"], "error");

    send(
        &mut seated_ws,
        json!({ "type": "new_message", "data": { "body": "  " } }),
    )
    .await;
    assert_eq!(next_json(&mut seated_ws).await["type"], "error");

    // Malformed frames get an error and the session stays open.
    seated_ws
        .send(tungstenite::Message::Text("{not json".into()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut seated_ws).await["type"], "error");
    send(&mut seated_ws, json!({ "type": "shout", "data": {} })).await;
    assert_eq!(next_json(&mut seated_ws).await["type"], "error");

    send(
        &mut seated_ws,
        json!({ "type": "new_message", "data": { "body": "still here" } }),
    )
    .await;
    assert_eq!(next_json(&mut seated_ws).await["type"], "new_message");

    // Nobody else saw the rejections; the anonymous viewer only sees the
    // final broadcast.
    assert_eq!(next_json(&mut anon).await["type"], "new_message");
    assert_eq!(next_json(&mut unseated_ws).await["type"], "new_message");

    common::cleanup_members(&state.db, &[&creator.id, &unseated.id, &seated.id]).await;
}

#[tokio::test]
async fn delete_messages_is_all_or_nothing() {
    let (addr, server, state) = start().await;
    let creator = common::create_member(&state, "host").await;
    let author = common::create_member(&state, "author").await;
    let other = common::create_member(&state, "other").await;
    let room_id = common::create_room(&server, &creator, 5).await;
    common::join(&server, &author, &room_id, 1).await;
    common::join(&server, &other, &room_id, 2).await;

    let own_a = post_comment(&server, &author, &room_id, "a").await;
    let own_b = post_comment(&server, &author, &room_id, "b").await;
    let theirs = post_comment(&server, &other, &room_id, "c").await;

    let (mut author_ws, _) = open(addr, &room_id, Some(&author)).await;
    let (mut viewer, _) = open(addr, &room_id, None).await;

    send(
        &mut author_ws,
        json!({ "type": "delete_messages", "data": { "ids": [own_a, theirs] } }),
    )
    .await;
    assert_eq!(next_json(&mut author_ws).await["type"], "error");

    send(
        &mut author_ws,
        json!({ "type": "delete_messages", "data": { "ids": [] } }),
    )
    .await;
    assert_eq!(next_json(&mut author_ws).await["type"], "error");

    let log: Vec<Value> = server
        .get(&format!("/api/v1/rooms/{room_id}/comments"))
        .await
        .json();
    assert_eq!(log.len(), 3);

    send(
        &mut author_ws,
        json!({ "type": "delete_messages", "data": { "ids": [own_a, own_b] } }),
    )
    .await;
    for ws in [&mut author_ws, &mut viewer] {
        assert_eq!(next_json(ws).await, json!({ "type": "delete_messages" }));
    }

    let log: Vec<Value> = server
        .get(&format!("/api/v1/rooms/{room_id}/comments"))
        .await
        .json();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["id"], theirs);

    common::cleanup_members(&state.db, &[&creator.id, &author.id, &other.id]).await;
}

// ---------------------------------------------------------------------------
// Connect-time standing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn banned_member_cannot_post_over_the_socket() {
    let (addr, server, state) = start().await;
    let creator = common::create_member(&state, "host").await;
    let troll = common::create_member(&state, "troll").await;
    let room_id = common::create_room(&server, &creator, 5).await;
    common::join(&server, &troll, &room_id, 1).await;

    server
        .put(&format!("/api/v1/rooms/{room_id}/bans/{}", troll.id))
        .add_header(AUTHORIZATION, creator.bearer())
        .await
        .assert_status(StatusCode::ACCEPTED);

    let (mut troll_ws, _) = open(addr, &room_id, Some(&troll)).await;
    let (mut viewer, _) = open(addr, &room_id, None).await;

    send(
        &mut troll_ws,
        json!({ "type": "new_message", "data": { "body": "let me talk" } }),
    )
    .await;
    let error = next_json(&mut troll_ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(
        error["error_message"],
        "You are banned in this room, therefore you cannot send messages"
    );

    send(&mut troll_ws, json!({ "type": "join_team" })).await;
    assert_eq!(next_json(&mut troll_ws).await["type"], "error");

    assert_quiet(&mut viewer).await;
    let log: Vec<Value> = server
        .get(&format!("/api/v1/rooms/{room_id}/comments"))
        .await
        .json();
    assert!(log.is_empty());

    common::cleanup_members(&state.db, &[&creator.id, &troll.id]).await;
}

#[tokio::test]
async fn stale_bans_do_not_silence_moderators() {
    let (addr, server, state) = start().await;
    let creator = common::create_member(&state, "host").await;
    let admin = common::create_member(&state, "mod").await;

    let resp = server
        .post("/api/v1/rooms")
        .add_header(AUTHORIZATION, creator.bearer())
        .json(&json!({
            "title": common::unique_title("moderated"),
            "first_team_name": "A",
            "second_team_name": "B",
            "admins": [admin.id],
        }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let room_id = resp.json::<Value>()["id"].as_str().unwrap().to_string();
    common::join(&server, &creator, &room_id, 1).await;
    common::join(&server, &admin, &room_id, 2).await;

    // Ban rows the API would refuse to create, e.g. left over from before a
    // promotion.
    {
        let mut conn = state.db.get().await.expect("pool");
        for moderator in [&creator, &admin] {
            debate_api::store::roster::insert_ban(&mut conn, &room_id, &moderator.id, &creator.id)
                .await
                .expect("insert ban");
        }
    }

    let (mut creator_ws, _) = open(addr, &room_id, Some(&creator)).await;
    let (mut admin_ws, _) = open(addr, &room_id, Some(&admin)).await;

    for (ws, body) in [(&mut creator_ws, "from the creator"), (&mut admin_ws, "from an admin")] {
        send(ws, json!({ "type": "new_message", "data": { "body": body } })).await;
    }

    for ws in [&mut creator_ws, &mut admin_ws] {
        let mut bodies = Vec::new();
        for _ in 0..2 {
            let event = next_json(ws).await;
            assert_eq!(event["type"], "new_message");
            bodies.push(event["comment"]["body"].as_str().unwrap().to_string());
        }
        bodies.sort();
        assert_eq!(bodies, ["from an admin", "from the creator"]);
    }

    common::cleanup_members(&state.db, &[&creator.id, &admin.id]).await;
}

#[tokio::test]
async fn deactivation_mid_session_stops_new_messages() {
    let (addr, server, state) = start().await;
    let creator = common::create_member(&state, "host").await;
    let author = common::create_member(&state, "author").await;
    let room_id = common::create_room(&server, &creator, 5).await;
    common::join(&server, &author, &room_id, 1).await;

    let (mut author_ws, _) = open(addr, &room_id, Some(&author)).await;
    let (mut viewer, _) = open(addr, &room_id, None).await;

    send(
        &mut author_ws,
        json!({ "type": "new_message", "data": { "body": "before" } }),
    )
    .await;
    assert_eq!(next_json(&mut author_ws).await["type"], "new_message");
    assert_eq!(next_json(&mut viewer).await["type"], "new_message");

    common::deactivate(&server, &creator, &room_id).await;

    send(
        &mut author_ws,
        json!({ "type": "new_message", "data": { "body": "after" } }),
    )
    .await;
    assert_eq!(
        next_json(&mut author_ws).await,
        json!({ "type": "error", "error_message": "Room is inactive, messages cannot be updated." })
    );
    assert_quiet(&mut viewer).await;

    let log: Vec<Value> = server
        .get(&format!("/api/v1/rooms/{room_id}/comments"))
        .await
        .json();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["body"], "before");

    common::cleanup_members(&state.db, &[&creator.id, &author.id]).await;
}

// ---------------------------------------------------------------------------
// join_team / leave_team
// ---------------------------------------------------------------------------

#[tokio::test]
async fn join_and_leave_team_update_the_session() {
    let (addr, server, state) = start().await;
    let creator = common::create_member(&state, "host").await;
    let member = common::create_member(&state, "member").await;
    let room_id = common::create_room(&server, &creator, 5).await;

    let (mut ws, _) = open(addr, &room_id, Some(&member)).await;

    // No seat in the store yet.
    send(&mut ws, json!({ "type": "join_team" })).await;
    assert_eq!(next_json(&mut ws).await["type"], "error");

    common::join(&server, &member, &room_id, 2).await;
    send(&mut ws, json!({ "type": "join_team" })).await;
    assert_quiet(&mut ws).await;

    send(&mut ws, json!({ "type": "join_team" })).await;
    assert_eq!(next_json(&mut ws).await["type"], "error");

    send(
        &mut ws,
        json!({ "type": "new_message", "data": { "body": "now seated" } }),
    )
    .await;
    let event = next_json(&mut ws).await;
    assert_eq!(event["type"], "new_message");
    assert_eq!(event["comment"]["team_number"], 2);

    send(&mut ws, json!({ "type": "leave_team" })).await;
    assert_quiet(&mut ws).await;

    let seats: Vec<Value> = server
        .get(&format!("/api/v1/rooms/{room_id}/users"))
        .await
        .json();
    assert!(seats.is_empty());

    send(
        &mut ws,
        json!({ "type": "new_message", "data": { "body": "gone" } }),
    )
    .await;
    assert_eq!(next_json(&mut ws).await["type"], "error");

    send(&mut ws, json!({ "type": "leave_team" })).await;
    assert_eq!(next_json(&mut ws).await["type"], "error");

    common::cleanup_members(&state.db, &[&creator.id, &member.id]).await;
}

#[tokio::test]
async fn last_session_leaving_closes_the_group() {
    let (addr, server, state) = start().await;
    let creator = common::create_member(&state, "host").await;
    let room_id = common::create_room(&server, &creator, 5).await;

    let (ws_a, _) = open(addr, &room_id, None).await;
    let (ws_b, _) = open(addr, &room_id, None).await;
    assert_eq!(state.broadcast.subscriber_count(&room_id), 2);

    drop(ws_a);
    drop(ws_b);

    let mut remaining = usize::MAX;
    for _ in 0..50 {
        remaining = state.broadcast.subscriber_count(&room_id);
        if remaining == 0 {
            break;
        }
        time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(remaining, 0);

    common::cleanup_members(&state.db, &[&creator.id]).await;
}
