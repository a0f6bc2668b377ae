use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use corkboard_db::Database;
use corkboard_types::events::ServerEvent;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> String {
    let db = Database::open_in_memory().unwrap();
    let router = corkboard_server::app(corkboard_server::build_gateway(db));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("ws://{}/board", addr)
}

async fn connect(url: &str) -> Client {
    let (client, _) = connect_async(url).await.unwrap();
    client
}

async fn send(client: &mut Client, frame: Value) {
    client.send(Message::text(frame.to_string())).await.unwrap();
}

async fn next_event(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for an event")
            .expect("connection closed")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn join(client: &mut Client, board_id: i64) -> Value {
    send(client, json!({ "event": "join_board", "data": { "boardId": board_id } })).await;
    let state = next_event(client).await;
    assert_eq!(state["event"], "board_state");
    state
}

#[tokio::test]
async fn two_clients_share_a_board() {
    let url = start_server().await;
    let mut alice = connect(&url).await;
    let mut bob = connect(&url).await;

    let state = join(&mut alice, 7).await;
    assert_eq!(state["data"], json!({ "boardId": 7, "stickers": [] }));
    join(&mut bob, 7).await;

    send(
        &mut alice,
        json!({
            "event": "create_sticker",
            "id": 1,
            "data": { "boardId": 7, "authorId": 1, "x": 0, "y": 0, "text": "hi" }
        }),
    )
    .await;

    let created = next_event(&mut alice).await;
    assert_eq!(created["event"], "sticker_created");
    let sticker = created["data"]["sticker"].clone();
    assert_eq!(sticker["text"], "hi");
    assert_eq!(sticker["color"], 0);
    assert!(sticker["id"].as_str().is_some_and(|id| id.len() == 36));
    assert!(sticker["createdAt"].is_string());

    let ack = next_event(&mut alice).await;
    assert_eq!(ack["event"], "ack");
    assert_eq!(ack["data"]["id"], 1);
    assert_eq!(ack["data"]["ok"], true);
    assert_eq!(ack["data"]["sticker"], sticker);

    assert_eq!(next_event(&mut bob).await, created);

    // Bob moves it; both see the update with only x changed
    send(
        &mut bob,
        json!({ "event": "update_sticker", "data": { "id": sticker["id"], "x": 120 } }),
    )
    .await;
    let updated = next_event(&mut bob).await;
    assert_eq!(updated["event"], "sticker_updated");
    assert_eq!(updated["data"]["sticker"]["x"], 120);
    assert_eq!(updated["data"]["sticker"]["text"], "hi");
    assert_eq!(next_event(&mut alice).await, updated);

    // A later joiner sees the current state
    let mut carol = connect(&url).await;
    let state = join(&mut carol, 7).await;
    assert_eq!(state["data"]["stickers"][0]["x"], 120);

    send(&mut carol, json!({ "event": "delete_sticker", "data": { "id": sticker["id"] } }))
        .await;
    let deleted = json!({
        "event": "sticker_deleted",
        "data": { "boardId": 7, "id": sticker["id"] }
    });
    assert_eq!(next_event(&mut carol).await, deleted);
    assert_eq!(next_event(&mut alice).await, deleted);
    assert_eq!(next_event(&mut bob).await, deleted);
}

#[tokio::test]
async fn rejections_go_to_the_sender_only() {
    let url = start_server().await;
    let mut outsider = connect(&url).await;
    let mut member = connect(&url).await;
    join(&mut member, 3).await;

    send(
        &mut outsider,
        json!({
            "event": "create_sticker",
            "id": 5,
            "data": { "boardId": 3, "authorId": 9, "x": 1, "y": 1, "text": "let me in" }
        }),
    )
    .await;
    let event: ServerEvent = serde_json::from_value(next_event(&mut outsider).await).unwrap();
    let err = match event {
        ServerEvent::Exception(err) => err,
        other => panic!("expected exception, got {:?}", other),
    };
    assert_eq!(err.id, Some(json!(5)));
    assert_eq!(err.code.as_deref(), Some("NOT_IN_BOARD"));
    assert_eq!(err.board_id, Some(3));

    send(
        &mut member,
        json!({ "event": "join_board", "data": { "boardId": 3, "role": "owner" } }),
    )
    .await;
    let rejected = next_event(&mut member).await;
    assert_eq!(rejected["event"], "exception");
    assert_eq!(rejected["data"]["message"], "Validation failed");
    assert_eq!(rejected["data"]["errors"][0]["keyword"], "additionalProperties");

    // The member saw nothing of the outsider's attempt: the next thing it
    // receives is the answer to its own request.
    join(&mut member, 3).await;
}

#[tokio::test]
async fn garbage_frames_do_not_drop_the_connection() {
    let url = start_server().await;
    let mut client = connect(&url).await;

    client.send(Message::text("definitely not json".to_string())).await.unwrap();
    send(&mut client, json!({ "event": "no_such_event", "data": {} })).await;

    let state = join(&mut client, 1).await;
    assert_eq!(state["data"]["boardId"], 1);
}
