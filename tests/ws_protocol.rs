//! End-to-end websocket protocol tests over a real socket.
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use plus_db_agent::Database;
use plus_db_agent::api::build_app;
use plus_db_agent::app_state::AppState;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn app_state() -> AppState {
    let Ok(pool) = PgPoolOptions::new().connect_lazy("postgres://postgres@127.0.0.1:1/none") else {
        panic!("lazy pool");
    };
    AppState::new(Database::from_pool(pool), 16)
}

async fn spawn_app() -> SocketAddr {
    let state = app_state();
    if state.connections.start_queue_processor().await.is_none() {
        panic!("queue processor");
    }
    serve(state).await
}

async fn serve(state: AppState) -> SocketAddr {
    let app = build_app(state);

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn connect(addr: SocketAddr, clinic_id: i64) -> Socket {
    let Ok((socket, _)) = connect_async(format!("ws://{addr}/ws/{clinic_id}")).await else {
        panic!("ws connect");
    };
    socket
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let Ok(Some(Ok(frame))) = timeout(Duration::from_secs(2), socket.next()).await else {
            panic!("expected a frame");
        };
        match frame {
            Message::Text(text) => {
                let Ok(value) = serde_json::from_str(text.as_str()) else {
                    panic!("frame is not JSON: {text}");
                };
                return value;
            }
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

async fn send(socket: &mut Socket, body: &str) {
    if socket.send(Message::text(body)).await.is_err() {
        panic!("send failed");
    }
}

#[tokio::test]
async fn handshake_assigns_uuid_and_accepts_token() {
    let addr = spawn_app().await;
    let mut socket = connect(addr, 7).await;

    let greeting = next_json(&mut socket).await;
    assert_eq!(greeting["messageType"], 8);
    assert_eq!(greeting["clinicId"], 7);
    assert_eq!(greeting["data"]["uuid"].as_str().map(str::len), Some(32));

    send(
        &mut socket,
        &json!({ "messageType": 7, "clinicId": 7, "data": { "token": "abc" } }).to_string(),
    )
    .await;
    let ack = next_json(&mut socket).await;
    assert_eq!(ack["messageType"], 7);
    assert_eq!(ack["clinicId"], 7);

    send(&mut socket, &json!({ "messageType": 9, "clinicId": 7 }).to_string()).await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["messageType"], 9);
}

#[tokio::test]
async fn malformed_message_gets_invalid_reply() {
    let addr = spawn_app().await;
    let mut socket = connect(addr, 2).await;
    let _ = next_json(&mut socket).await;

    send(&mut socket, "{ not json").await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["messageType"], 9);
    assert_eq!(reply["clinicId"], 2);
}

#[tokio::test]
async fn message_without_token_closes_connection() {
    let addr = spawn_app().await;
    let mut socket = connect(addr, 3).await;
    let _ = next_json(&mut socket).await;

    send(&mut socket, &json!({ "messageType": 11, "clinicId": 3 }).to_string()).await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["messageType"], 10);
    assert_eq!(reply["data"]["error"], "invalid token");

    let closed = timeout(Duration::from_secs(2), socket.next()).await;
    assert!(matches!(
        closed,
        Ok(Some(Ok(Message::Close(_))) | None | Some(Err(_)))
    ));
}

#[tokio::test]
async fn router_alone_drains_the_message_queue() {
    let addr = serve(app_state()).await;
    let mut socket = connect(addr, 4).await;
    let _ = next_json(&mut socket).await;

    send(
        &mut socket,
        &json!({ "messageType": 7, "clinicId": 4, "data": { "token": "abc" } }).to_string(),
    )
    .await;
    let ack = next_json(&mut socket).await;
    assert_eq!(ack["messageType"], 7);
    assert_eq!(ack["clinicId"], 4);
}
