//! End-to-end tests: real WebSocket clients against a full server.
//!
//! Each test binds its own server on port 0 with a single-word bank
//! ("cat" at every difficulty) so round outcomes are deterministic.

use std::time::Duration;

use easel::{Config, EaselServer};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

type Ws = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

// =========================================================================
// Harness
// =========================================================================

static WORDS_FILE_SEQ: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

fn write_words_file() -> std::path::PathBuf {
    let seq = WORDS_FILE_SEQ.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "easel-e2e-words-{}-{seq}.json",
        std::process::id()
    ));
    std::fs::write(
        &path,
        br#"{"easy": ["cat"], "medium": ["cat"], "hard": ["cat"]}"#,
    )
    .unwrap();
    path
}

async fn start_server() -> String {
    let words = write_words_file();
    let words = words.to_string_lossy().into_owned();

    let mut config = Config::default();
    config.word_bank.easy_words_file = words.clone();
    config.word_bank.medium_words_file = words.clone();
    config.word_bank.hard_words_file = words;

    let server = EaselServer::builder()
        .bind("127.0.0.1:0")
        .config(config)
        .build()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    addr
}

async fn connect(addr: &str) -> Ws {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .unwrap();
    ws
}

async fn send(ws: &mut Ws, kind: &str, data: Value) {
    let frame = json!({ "type": kind, "data": data }).to_string();
    ws.send(Message::text(frame)).await.unwrap();
}

/// Reads frames until one of the wanted type arrives, skipping the rest
/// (timers, chat, list updates).
async fn recv_kind(ws: &mut Ws, kind: &str) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let msg = ws
                .next()
                .await
                .expect("connection open")
                .expect("clean read");
            if let Message::Text(text) = msg {
                let envelope: Value = serde_json::from_str(text.as_str()).unwrap();
                if envelope["type"] == kind {
                    return envelope;
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {kind}"))
}

/// Connects a client and upgrades its guest identity.
async fn connect_as(addr: &str, username: &str, avatar: &str) -> Ws {
    let mut ws = connect(addr).await;
    send(
        &mut ws,
        "connect",
        json!({ "username": username, "avatar": avatar }),
    )
    .await;
    // The server confirms with a system chat line.
    let confirmation = recv_kind(&mut ws, "chat_message").await;
    assert_eq!(confirmation["data"]["is_system"], true);
    ws
}

/// Creates a room and returns (code, room_id).
async fn create_room(ws: &mut Ws, max_players: usize, max_rounds: u32) -> (String, String) {
    send(
        ws,
        "create_room",
        json!({
            "room_name": "Doodle",
            "room_type": "public",
            "max_players": max_players,
            "round_time": 60,
            "max_rounds": max_rounds,
            "difficulty": "easy",
        }),
    )
    .await;
    let created = recv_kind(ws, "room_created").await;
    let data = &created["data"];
    assert_eq!(data["player_count"], 1);
    assert_eq!(data["state"], "lobby");
    (
        data["code"].as_str().unwrap().to_owned(),
        data["id"].as_str().unwrap().to_owned(),
    )
}

async fn join_room(ws: &mut Ws, code: &str) -> Value {
    send(ws, "join_room", json!({ "room_code": code })).await;
    recv_kind(ws, "room_joined").await
}

async fn mark_ready(ws: &mut Ws) {
    send(ws, "player_ready", json!({ "ready": true })).await;
    recv_kind(ws, "player_ready").await;
}

// =========================================================================
// Room lifecycle
// =========================================================================

#[tokio::test]
async fn test_create_room_and_list_public() {
    let addr = start_server().await;
    let mut alice = connect_as(&addr, "Alice", "🎨").await;
    let (_, room_id) = create_room(&mut alice, 4, 2).await;

    let mut bob = connect_as(&addr, "Bob", "🖌️").await;
    send(&mut bob, "list_public_rooms", json!({})).await;
    let listing = recv_kind(&mut bob, "public_rooms_list").await;

    assert_eq!(listing["data"]["total"], 1);
    let room = &listing["data"]["rooms"][0];
    assert_eq!(room["id"], room_id.as_str());
    assert_eq!(room["name"], "Doodle");
    assert_eq!(room["player_count"], 1);
    assert_eq!(room["can_join"], true);
}

#[tokio::test]
async fn test_join_by_code_normalizes_and_notifies() {
    let addr = start_server().await;
    let mut alice = connect_as(&addr, "Alice", "🎨").await;
    let (code, _) = create_room(&mut alice, 4, 2).await;

    let mut bob = connect_as(&addr, "Bob", "🖌️").await;
    // Codes are case-insensitive and whitespace-tolerant.
    let sloppy = format!("  {}  ", code.to_lowercase());
    let joined = join_room(&mut bob, &sloppy).await;
    assert_eq!(joined["data"]["player_count"], 2);

    let notified = recv_kind(&mut alice, "player_joined").await;
    assert_eq!(notified["data"]["username"], "Bob");
}

#[tokio::test]
async fn test_join_rejects_bad_and_unknown_codes() {
    let addr = start_server().await;
    let mut bob = connect_as(&addr, "Bob", "🖌️").await;

    send(&mut bob, "join_room", json!({ "room_code": "xy" })).await;
    let err = recv_kind(&mut bob, "error").await;
    assert_eq!(err["data"]["code"], "INVALID_ROOM_CODE");

    send(&mut bob, "join_room", json!({ "room_code": "ZZZZ22" })).await;
    let err = recv_kind(&mut bob, "error").await;
    assert_eq!(err["data"]["code"], "ROOM_NOT_FOUND");
}

#[tokio::test]
async fn test_full_room_rejects_join() {
    let addr = start_server().await;
    let mut alice = connect_as(&addr, "Alice", "🎨").await;
    let (code, _) = create_room(&mut alice, 2, 2).await;

    let mut bob = connect_as(&addr, "Bob", "🖌️").await;
    join_room(&mut bob, &code).await;

    let mut carol = connect_as(&addr, "Carol", "⭐").await;
    send(&mut carol, "join_room", json!({ "room_code": code })).await;
    let err = recv_kind(&mut carol, "error").await;
    assert_eq!(err["data"]["code"], "JOIN_FAILED");
}

#[tokio::test]
async fn test_invalid_username_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    send(&mut ws, "connect", json!({ "username": "ab", "avatar": "" })).await;
    let err = recv_kind(&mut ws, "error").await;
    assert_eq!(err["data"]["code"], "INVALID_USERNAME");
}

#[tokio::test]
async fn test_unknown_message_type_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    send(&mut ws, "fly_to_moon", json!({})).await;
    let err = recv_kind(&mut ws, "error").await;
    assert_eq!(err["data"]["code"], "UNKNOWN_MESSAGE_TYPE");
}

#[tokio::test]
async fn test_leave_transfers_host() {
    let addr = start_server().await;
    let mut alice = connect_as(&addr, "Alice", "🎨").await;
    let (code, _) = create_room(&mut alice, 4, 2).await;
    let mut bob = connect_as(&addr, "Bob", "🖌️").await;
    join_room(&mut bob, &code).await;

    send(&mut alice, "leave_room", json!({})).await;
    let left = recv_kind(&mut bob, "player_left").await;
    assert_eq!(left["data"]["username"], "Alice");

    // Bob is host now: starting alone fails on the player count, not on
    // host rights.
    send(&mut bob, "start_game", json!({})).await;
    let err = recv_kind(&mut bob, "error").await;
    assert_eq!(err["data"]["code"], "CANNOT_START");
}

// =========================================================================
// Game flow
// =========================================================================

#[tokio::test]
async fn test_start_game_requires_host_and_readiness() {
    let addr = start_server().await;
    let mut alice = connect_as(&addr, "Alice", "🎨").await;
    let (code, _) = create_room(&mut alice, 4, 2).await;
    let mut bob = connect_as(&addr, "Bob", "🖌️").await;
    join_room(&mut bob, &code).await;

    send(&mut bob, "start_game", json!({})).await;
    let err = recv_kind(&mut bob, "error").await;
    assert_eq!(err["data"]["code"], "NOT_HOST");

    // Nobody is ready yet.
    send(&mut alice, "start_game", json!({})).await;
    let err = recv_kind(&mut alice, "error").await;
    assert_eq!(err["data"]["code"], "CANNOT_START");
}

#[tokio::test]
async fn test_full_game_scoring_and_rotation() {
    let addr = start_server().await;
    let mut alice = connect_as(&addr, "Alice", "🎨").await;
    let (code, _) = create_room(&mut alice, 4, 2).await;
    let mut bob = connect_as(&addr, "Bob", "🖌️").await;
    join_room(&mut bob, &code).await;

    mark_ready(&mut alice).await;
    mark_ready(&mut bob).await;
    send(&mut alice, "start_game", json!({})).await;

    recv_kind(&mut alice, "game_started").await;
    recv_kind(&mut bob, "game_started").await;

    // Round 1: Alice (first in join order) draws. Only she sees the word.
    let round = recv_kind(&mut alice, "new_round").await;
    assert_eq!(round["data"]["round"], 1);
    assert_eq!(round["data"]["drawer_name"], "Alice");
    assert_eq!(round["data"]["word"], "cat");
    assert_eq!(round["data"]["word_hint"], "_ _ _");

    let round = recv_kind(&mut bob, "new_round").await;
    assert!(round["data"].get("word").is_none(), "guesser saw the word");
    assert_eq!(round["data"]["word_hint"], "_ _ _");

    // The countdown is running.
    let timer = recv_kind(&mut bob, "timer").await;
    assert_eq!(timer["data"]["phase"], "drawing");
    assert!(timer["data"]["time_left"].as_u64().unwrap() <= 60);

    // Guess matching is trimmed and case-insensitive. With the default
    // table, an instant first guess among two players scores
    // 100 + 50 + 50 + 25 = 225.
    send(&mut bob, "send_guess", json!({ "guess": "  CAT " })).await;
    let result = recv_kind(&mut bob, "guess_result").await;
    assert_eq!(result["data"]["correct"], true);
    assert_eq!(result["data"]["word"], "cat");
    assert_eq!(result["data"]["guess_order"], 1);
    assert_eq!(result["data"]["points"], 225);
    assert_eq!(result["data"]["round_ending"], true);

    let awarded = recv_kind(&mut alice, "points_awarded").await;
    assert_eq!(awarded["data"]["username"], "Bob");
    assert_eq!(awarded["data"]["points"], 225);
    assert_eq!(awarded["data"]["total_score"], 225);

    // Round ends: drawer gets 20 + 15 × 1 = 35.
    let ended = recv_kind(&mut alice, "round_ended").await;
    assert_eq!(ended["data"]["word"], "cat");
    assert_eq!(ended["data"]["drawer_name"], "Alice");
    assert_eq!(ended["data"]["drawer_points"], 35);
    assert_eq!(ended["data"]["next_round"], 2);
    let guessers = ended["data"]["guessers"].as_array().unwrap();
    assert_eq!(guessers.len(), 1);
    assert_eq!(guessers[0]["username"], "Bob");
    assert_eq!(guessers[0]["guessed"], true);
    assert_eq!(guessers[0]["points"], 225);
    recv_kind(&mut bob, "round_ended").await;

    // Round 2: the drawer rotates to Bob.
    let round = recv_kind(&mut bob, "new_round").await;
    assert_eq!(round["data"]["round"], 2);
    assert_eq!(round["data"]["drawer_name"], "Bob");
    assert_eq!(round["data"]["word"], "cat");
    let round = recv_kind(&mut alice, "new_round").await;
    assert!(round["data"].get("word").is_none());

    send(&mut alice, "send_guess", json!({ "guess": "cat" })).await;
    let result = recv_kind(&mut alice, "guess_result").await;
    assert_eq!(result["data"]["points"], 225);
    assert_eq!(result["data"]["total_score"], 260, "35 drawer + 225 guess");

    let ended = recv_kind(&mut bob, "round_ended").await;
    assert_eq!(ended["data"]["next_round"], 0, "final round signals game end");

    // Both end at 260; Alice joined first and takes the tie-break.
    let game_over = recv_kind(&mut alice, "game_ended").await;
    assert_eq!(game_over["data"]["winner"]["username"], "Alice");
    assert_eq!(game_over["data"]["winner"]["score"], 260);
    let board = game_over["data"]["leaderboard"].as_array().unwrap();
    assert_eq!(board[0]["username"], "Alice");
    assert_eq!(board[1]["username"], "Bob");
    assert_eq!(board[1]["score"], 260);
    assert_eq!(game_over["data"]["game_stats"]["total_rounds"], 2);
    recv_kind(&mut bob, "game_ended").await;

    // The room is a lobby again.
    send(&mut alice, "list_public_rooms", json!({})).await;
    let listing = recv_kind(&mut alice, "public_rooms_list").await;
    assert_eq!(listing["data"]["rooms"][0]["state"], "lobby");
    assert_eq!(listing["data"]["rooms"][0]["current_round"], 0);
}

#[tokio::test]
async fn test_wrong_guess_echoes_as_chat_without_result() {
    let addr = start_server().await;
    let mut alice = connect_as(&addr, "Alice", "🎨").await;
    let (code, _) = create_room(&mut alice, 4, 1).await;
    let mut bob = connect_as(&addr, "Bob", "🖌️").await;
    join_room(&mut bob, &code).await;
    mark_ready(&mut alice).await;
    mark_ready(&mut bob).await;
    send(&mut alice, "start_game", json!({})).await;
    recv_kind(&mut bob, "new_round").await;

    send(&mut bob, "send_guess", json!({ "guess": "dog" })).await;

    // The miss shows up as chat for everyone, drawer included.
    let chat = recv_kind(&mut alice, "chat_message").await;
    assert_eq!(chat["data"]["message"], "dog");
    assert_eq!(chat["data"]["username"], "Bob");
    assert_eq!(chat["data"]["is_system"], false);
    let chat = recv_kind(&mut bob, "chat_message").await;
    assert_eq!(chat["data"]["message"], "dog");

    // A correct guess afterwards still works and ends the round.
    send(&mut bob, "send_guess", json!({ "guess": "cat" })).await;
    let result = recv_kind(&mut bob, "guess_result").await;
    assert_eq!(result["data"]["correct"], true);
    assert_eq!(result["data"]["round_ending"], true);
}

#[tokio::test]
async fn test_drawer_and_repeat_guesser_chat_still_broadcast() {
    let addr = start_server().await;
    let mut alice = connect_as(&addr, "Alice", "🎨").await;
    let (code, _) = create_room(&mut alice, 4, 1).await;
    let mut bob = connect_as(&addr, "Bob", "🖌️").await;
    join_room(&mut bob, &code).await;
    let mut carol = connect_as(&addr, "Carol", "⭐").await;
    join_room(&mut carol, &code).await;

    mark_ready(&mut alice).await;
    mark_ready(&mut bob).await;
    mark_ready(&mut carol).await;
    send(&mut alice, "start_game", json!({})).await;
    recv_kind(&mut bob, "new_round").await;

    // The drawer's banter is not the secret; it reaches the room as
    // ordinary chat.
    send(&mut alice, "send_guess", json!({ "guess": "getting warmer" })).await;
    let chat = recv_kind(&mut bob, "chat_message").await;
    assert_eq!(chat["data"]["message"], "getting warmer");
    assert_eq!(chat["data"]["username"], "Alice");
    let chat = recv_kind(&mut carol, "chat_message").await;
    assert_eq!(chat["data"]["message"], "getting warmer");

    // Bob guesses right; with Carol still in play the round continues.
    send(&mut bob, "send_guess", json!({ "guess": "cat" })).await;
    let result = recv_kind(&mut bob, "guess_result").await;
    assert_eq!(result["data"]["correct"], true);
    assert_eq!(result["data"]["round_ending"], false);

    // Having guessed, Bob can still talk to the room.
    send(&mut bob, "send_guess", json!({ "guess": "banana" })).await;
    let chat = recv_kind(&mut carol, "chat_message").await;
    assert_eq!(chat["data"]["message"], "banana");
    assert_eq!(chat["data"]["username"], "Bob");

    // Carol finishes the round; the results table shows Bob's single
    // award, so neither chat line was scored.
    send(&mut carol, "send_guess", json!({ "guess": "cat" })).await;
    let ended = recv_kind(&mut carol, "round_ended").await;
    let guessers = ended["data"]["guessers"].as_array().unwrap();
    let bob_row = guessers
        .iter()
        .find(|g| g["username"] == "Bob")
        .expect("bob in results");
    assert_eq!(bob_row["guess_order"], 1);
}

#[tokio::test]
async fn test_double_correct_guess_awards_once() {
    let addr = start_server().await;
    let mut alice = connect_as(&addr, "Alice", "🎨").await;
    let (code, _) = create_room(&mut alice, 4, 1).await;
    let mut bob = connect_as(&addr, "Bob", "🖌️").await;
    join_room(&mut bob, &code).await;
    let mut carol = connect_as(&addr, "Carol", "⭐").await;
    join_room(&mut carol, &code).await;

    mark_ready(&mut alice).await;
    mark_ready(&mut bob).await;
    mark_ready(&mut carol).await;
    send(&mut alice, "start_game", json!({})).await;
    recv_kind(&mut bob, "new_round").await;

    send(&mut bob, "send_guess", json!({ "guess": "cat" })).await;
    let first = recv_kind(&mut bob, "guess_result").await;
    assert_eq!(first["data"]["correct"], true);
    assert_eq!(first["data"]["round_ending"], false, "Carol is still guessing");
    let bob_points = first["data"]["points"].as_u64().unwrap();

    // Submitting the word again is ignored outright.
    send(&mut bob, "send_guess", json!({ "guess": "cat" })).await;

    send(&mut carol, "send_guess", json!({ "guess": "cat" })).await;
    recv_kind(&mut carol, "guess_result").await;

    let ended = recv_kind(&mut bob, "round_ended").await;
    let guessers = ended["data"]["guessers"].as_array().unwrap();
    let bob_row = guessers
        .iter()
        .find(|g| g["username"] == "Bob")
        .expect("bob in results");
    assert_eq!(bob_row["points"].as_u64().unwrap(), bob_points);
    assert_eq!(bob_row["guess_order"], 1);
}

#[tokio::test]
async fn test_only_drawer_may_draw() {
    let addr = start_server().await;
    let mut alice = connect_as(&addr, "Alice", "🎨").await;
    let (code, _) = create_room(&mut alice, 4, 1).await;
    let mut bob = connect_as(&addr, "Bob", "🖌️").await;
    join_room(&mut bob, &code).await;
    mark_ready(&mut alice).await;
    mark_ready(&mut bob).await;
    send(&mut alice, "start_game", json!({})).await;
    recv_kind(&mut bob, "new_round").await;

    send(
        &mut bob,
        "draw_start",
        json!({ "x": 1.0, "y": 2.0, "color": "#000000", "size": 3.0 }),
    )
    .await;
    let err = recv_kind(&mut bob, "error").await;
    assert_eq!(err["data"]["code"], "NOT_DRAWER");

    // The drawer's strokes reach the guessers.
    send(
        &mut alice,
        "draw_start",
        json!({ "x": 10.0, "y": 20.0, "color": "#ff0000", "size": 4.0 }),
    )
    .await;
    send(&mut alice, "draw_move", json!({ "x": 11.0, "y": 21.0 })).await;

    let stroke = recv_kind(&mut bob, "draw_data").await;
    assert_eq!(stroke["data"]["type"], "start");
    assert_eq!(stroke["data"]["color"], "#ff0000");
    let stroke = recv_kind(&mut bob, "draw_data").await;
    assert_eq!(stroke["data"]["type"], "move");
    assert_eq!(stroke["data"]["x"], 11.0);
}

#[tokio::test]
async fn test_guess_outside_round_is_invalid_state() {
    let addr = start_server().await;
    let mut alice = connect_as(&addr, "Alice", "🎨").await;
    create_room(&mut alice, 4, 1).await;

    send(&mut alice, "send_guess", json!({ "guess": "cat" })).await;
    let err = recv_kind(&mut alice, "error").await;
    assert_eq!(err["data"]["code"], "INVALID_STATE");
}

#[tokio::test]
async fn test_drawer_leaving_ends_round_without_drawer_points() {
    let addr = start_server().await;
    let mut alice = connect_as(&addr, "Alice", "🎨").await;
    let (code, _) = create_room(&mut alice, 4, 2).await;
    let mut bob = connect_as(&addr, "Bob", "🖌️").await;
    join_room(&mut bob, &code).await;
    let mut carol = connect_as(&addr, "Carol", "⭐").await;
    join_room(&mut carol, &code).await;

    mark_ready(&mut alice).await;
    mark_ready(&mut bob).await;
    mark_ready(&mut carol).await;
    send(&mut alice, "start_game", json!({})).await;
    recv_kind(&mut bob, "new_round").await;

    // The drawer walks out mid-round.
    send(&mut alice, "leave_room", json!({})).await;

    let ended = recv_kind(&mut bob, "round_ended").await;
    assert_eq!(ended["data"]["drawer_points"], 0);

    // The game carries on: a new round starts with a remaining player
    // drawing.
    let round = recv_kind(&mut bob, "new_round").await;
    let drawer = round["data"]["drawer_name"].as_str().unwrap();
    assert!(drawer == "Bob" || drawer == "Carol");
}
