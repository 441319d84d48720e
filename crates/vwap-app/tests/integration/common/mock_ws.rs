//! Mock level2 WebSocket server for integration tests.
//!
//! Provides a simple WebSocket server that can:
//! - Accept connections
//! - Answer subscribe requests with a subscriptions ack
//! - Push scripted frames after the ack
//! - Record received messages

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// What the server does after acknowledging a subscription.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Text frames pushed after the ack.
    pub frames: Vec<String>,
    /// Close the connection once the frames are sent.
    pub close_after_frames: bool,
}

/// A mock WebSocket server for testing.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
}

impl MockWsServer {
    /// Start a server that only acknowledges subscriptions.
    pub async fn start() -> Self {
        Self::start_with(MockBehavior::default()).await
    }

    /// Start a new mock WebSocket server on an available port.
    pub async fn start_with(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let connections: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let messages_clone = messages.clone();
        let connections_clone = connections.clone();
        let behavior = Arc::new(behavior);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        let messages = messages_clone.clone();
                        let connections = connections_clone.clone();
                        let behavior = behavior.clone();
                        tokio::spawn(handle_connection(stream, messages, connections, behavior));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            messages,
            connections,
        }
    }

    /// Get the server's WebSocket URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Get the number of connections received.
    pub async fn connection_count(&self) -> u32 {
        *self.connections.lock().await
    }

    /// Get all received messages.
    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.iter().cloned().collect()
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
    behavior: Arc<MockBehavior>,
) {
    {
        let mut count = connections.lock().await;
        *count += 1;
    }

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                {
                    let mut msgs = messages.lock().await;
                    msgs.push_back(text.clone());
                }

                let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&text) else {
                    continue;
                };
                if parsed.get("type") != Some(&json!("subscribe")) {
                    continue;
                }

                let channels: Vec<_> = parsed["channels"]
                    .as_array()
                    .cloned()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|name| json!({"name": name, "product_ids": parsed["product_ids"]}))
                    .collect();
                let ack = json!({"type": "subscriptions", "channels": channels});
                if write.send(Message::Text(ack.to_string())).await.is_err() {
                    return;
                }

                for frame in &behavior.frames {
                    if write.send(Message::Text(frame.clone())).await.is_err() {
                        return;
                    }
                }

                if behavior.close_after_frames {
                    let _ = write.send(Message::Close(None)).await;
                    return;
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }
}

/// An l2update frame with one buy change per (price, size).
pub fn l2update(product_id: &str, changes: &[(&str, &str)]) -> String {
    let changes: Vec<_> = changes
        .iter()
        .map(|(price, size)| json!(["buy", price, size]))
        .collect();
    json!({
        "type": "l2update",
        "product_id": product_id,
        "changes": changes,
        "time": "2022-01-17T02:57:26.530613Z"
    })
    .to_string()
}
