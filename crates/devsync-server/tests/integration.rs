//! End-to-end integration tests using a real WebSocket client.

use std::sync::Arc;
use std::time::Duration;

use devsync_core::{RoomId, UserId};
use devsync_server::auth::JwtAuthenticator;
use devsync_server::config::ServerConfig;
use devsync_server::server::DevsyncServer;
use devsync_store::SqliteStore;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);
const SECRET: &[u8] = b"integration-secret";

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct TestServer {
    server: DevsyncServer,
    store: Arc<SqliteStore>,
    auth: JwtAuthenticator,
    base: String,
}

/// Boot a server on an ephemeral port backed by an in-memory store.
async fn boot_server() -> TestServer {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let server = DevsyncServer::new(
        ServerConfig::default(),
        store.clone(),
        store.clone(),
        Arc::new(JwtAuthenticator::new(SECRET)),
    );
    let (addr, _handle) = server.listen().await.unwrap();
    TestServer {
        server,
        store,
        auth: JwtAuthenticator::new(SECRET),
        base: format!("{addr}"),
    }
}

impl TestServer {
    fn token(&self, user: UserId) -> String {
        self.auth.issue(user, Duration::from_secs(3600)).unwrap()
    }

    /// Connect as `user`, consume the `connected` frame, and wait until the
    /// hub routes to this connection.
    async fn connect(&self, user: UserId) -> WsStream {
        let url = format!("ws://{}/ws?token={}", self.base, self.token(user));
        let (mut ws, _) = timeout(TIMEOUT, connect_async(url)).await.unwrap().unwrap();
        let hello = recv_json(&mut ws).await;
        assert_eq!(hello["type"], "system");
        assert_eq!(hello["content"], "connected");
        self.wait_online(user).await;
        ws
    }

    async fn wait_online(&self, user: UserId) {
        timeout(TIMEOUT, async {
            while !self.server.hub().is_online(user) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    async fn post(&self, path: &str, user: UserId, body: Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("http://{}{path}", self.base))
            .bearer_auth(self.token(user))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

/// Next text frame as JSON, skipping control frames.
async fn recv_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send_json(ws: &mut WsStream, value: &Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Wait for the server to end the session (close frame or stream end).
async fn expect_closed(ws: &mut WsStream) {
    timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_) | Ok(Message::Close(_))) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .expect("connection was not closed");
}

#[tokio::test]
async fn direct_message_reaches_receiver_only() {
    let t = boot_server().await;
    let mut ws1 = t.connect(UserId::new(1)).await;
    let mut ws2 = t.connect(UserId::new(2)).await;

    send_json(
        &mut ws1,
        &json!({"type": "direct_message", "receiver_id": 2, "content": "hello"}),
    )
    .await;

    let got = recv_json(&mut ws2).await;
    assert_eq!(got["type"], "direct_message");
    assert_eq!(got["content"], "hello");
    assert_eq!(got["sender_id"], 1);

    // Nothing else was queued for user 2 ahead of this marker
    send_json(&mut ws1, &json!({"type": "chat", "receiver_id": 2, "content": "marker"})).await;
    assert_eq!(recv_json(&mut ws2).await["content"], "marker");
}

#[tokio::test]
async fn group_message_skips_offline_member_and_sender() {
    let t = boot_server().await;
    let u1 = t.store.create_user("alice").await.unwrap();
    let u2 = t.store.create_user("bob").await.unwrap();
    let u3 = t.store.create_user("carol").await.unwrap();
    let room: RoomId = t.store.create_room("general", u1).await.unwrap();
    assert!(t.store.join_room(room, u2).await.unwrap());
    assert!(t.store.join_room(room, u3).await.unwrap());

    let mut ws1 = t.connect(u1).await;
    let mut ws3 = t.connect(u3).await;

    let resp = t
        .post(
            &format!("/api/chat-rooms/{room}/messages"),
            u1,
            json!({"content": "standup in 5"}),
        )
        .await;
    assert_eq!(resp.status(), 201);

    let got = recv_json(&mut ws3).await;
    assert_eq!(got["type"], "group_message");
    assert_eq!(got["room_id"], room.get());
    assert_eq!(got["content"], "standup in 5");
    assert_eq!(got["sender_name"], "alice");

    // The sender receives nothing from its own post
    send_json(&mut ws3, &json!({"type": "chat", "receiver_id": u1.get(), "content": "ack"})).await;
    assert_eq!(recv_json(&mut ws1).await["content"], "ack");
}

#[tokio::test]
async fn reconnect_replaces_first_connection() {
    let t = boot_server().await;
    let user = UserId::new(1);
    let mut first = t.connect(user).await;
    let mut second = t.connect(user).await;

    expect_closed(&mut first).await;
    assert_eq!(t.server.hub().connection_count(), 1);

    let mut ws2 = t.connect(UserId::new(2)).await;
    send_json(&mut ws2, &json!({"type": "chat", "receiver_id": 1, "content": "to you"})).await;
    assert_eq!(recv_json(&mut second).await["content"], "to you");
}

#[tokio::test]
async fn rest_direct_message_is_pushed_with_sender_name() {
    let t = boot_server().await;
    let alice = t.store.create_user("alice").await.unwrap();
    let bob = t.store.create_user("bob").await.unwrap();
    let mut ws_bob = t.connect(bob).await;

    let resp = t
        .post(&format!("/api/messages/{bob}"), alice, json!({"content": "ping"}))
        .await;
    assert_eq!(resp.status(), 201);
    let stored: Value = resp.json().await.unwrap();
    assert_eq!(stored["content"], "ping");

    let got = recv_json(&mut ws_bob).await;
    assert_eq!(got["type"], "direct_message");
    assert_eq!(got["sender_id"], alice.get());
    assert_eq!(got["sender_name"], "alice");
}

#[tokio::test]
async fn rest_direct_message_to_offline_user_still_succeeds() {
    let t = boot_server().await;
    let alice = t.store.create_user("alice").await.unwrap();
    let bob = t.store.create_user("bob").await.unwrap();
    let resp = t
        .post(&format!("/api/messages/{bob}"), alice, json!({"content": "later"}))
        .await;
    assert_eq!(resp.status(), 201);
}

#[tokio::test]
async fn upgrade_without_token_is_unauthorized() {
    let t = boot_server().await;
    let resp = reqwest::get(format!("http://{}/ws", t.base)).await.unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "token required");
    assert_eq!(t.server.hub().connection_count(), 0);
}

#[tokio::test]
async fn upgrade_with_bad_token_is_refused() {
    let t = boot_server().await;
    let result = connect_async(format!("ws://{}/ws?token=nope", t.base)).await;
    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
            assert_eq!(resp.status(), 401);
        }
        Err(e) => panic!("expected HTTP 401, got {e}"),
        Ok(_) => panic!("upgrade succeeded with a bad token"),
    }
}

#[tokio::test]
async fn malformed_frame_keeps_connection_alive() {
    let t = boot_server().await;
    let mut ws1 = t.connect(UserId::new(1)).await;
    let mut ws2 = t.connect(UserId::new(2)).await;

    ws1.send(Message::Text("{not json".into())).await.unwrap();
    send_json(&mut ws2, &json!({"type": "chat", "receiver_id": 1, "content": "still there?"})).await;

    assert_eq!(recv_json(&mut ws1).await["content"], "still there?");
    assert!(t.server.hub().is_online(UserId::new(1)));
}

#[tokio::test]
async fn spoofed_sender_is_overwritten() {
    let t = boot_server().await;
    let mut ws1 = t.connect(UserId::new(1)).await;
    let mut ws2 = t.connect(UserId::new(2)).await;

    send_json(
        &mut ws1,
        &json!({"type": "chat", "sender_id": 2, "receiver_id": 2, "content": "me?"}),
    )
    .await;
    let got = recv_json(&mut ws2).await;
    assert_eq!(got["sender_id"], 1);
}

#[tokio::test]
async fn client_close_unregisters() {
    let t = boot_server().await;
    let mut ws = t.connect(UserId::new(1)).await;
    ws.close(None).await.unwrap();

    timeout(TIMEOUT, async {
        while t.server.hub().is_online(UserId::new(1)) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn shutdown_closes_live_sessions() {
    let t = boot_server().await;
    let mut ws = t.connect(UserId::new(1)).await;

    let drained = t.server.graceful_shutdown().await;
    expect_closed(&mut ws).await;
    assert!(drained);
    assert_eq!(t.server.hub().connection_count(), 0);
}

#[tokio::test]
async fn health_reports_live_connections() {
    let t = boot_server().await;
    let _ws = t.connect(UserId::new(7)).await;
    let body: Value = reqwest::get(format!("http://{}/health", t.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 1);
}
