// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! WebSocket server for live subscribers
//!
//! Every connection is one bus subscriber. Frames sent to clients:
//! `{"type": "welcome", ...}` once, then `{"type": "reading-update" | "alert",
//! "data": {...}}` per event.

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::core::{EventBus, Subscription};

/// WebSocket server
pub struct WebSocketServer {
    bus: Arc<EventBus>,
    max_clients: usize,
    clients: Arc<AtomicUsize>,
}

impl WebSocketServer {
    pub fn new(bus: Arc<EventBus>, max_clients: usize) -> Self {
        Self {
            bus,
            max_clients,
            clients: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bind and accept in the background. Returns the bound address.
    pub async fn start(&self, addr: &str, mut shutdown: broadcast::Receiver<()>) -> Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;

        info!("WebSocket server listening on ws://{}", local);

        let bus = self.bus.clone();
        let clients = self.clients.clone();
        let max_clients = self.max_clients;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, addr)) => {
                                if clients.load(Ordering::SeqCst) >= max_clients {
                                    warn!("Max clients reached, rejecting connection from {}", addr);
                                    continue;
                                }

                                clients.fetch_add(1, Ordering::SeqCst);
                                let subscription = bus.subscribe();
                                let clients = clients.clone();
                                let shutdown = shutdown.resubscribe();

                                tokio::spawn(async move {
                                    handle_connection(stream, addr, subscription, shutdown).await;
                                    clients.fetch_sub(1, Ordering::SeqCst);
                                });
                            }
                            Err(e) => {
                                error!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("WebSocket server shutting down");
                        break;
                    }
                }
            }
        });

        Ok(local)
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    mut subscription: Subscription,
    mut shutdown: broadcast::Receiver<()>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    info!("Subscriber connected from {} (id: {})", addr, subscription.id());

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let welcome = serde_json::json!({
        "type": "welcome",
        "subscriber_id": subscription.id(),
        "server": "AgroTrack",
        "version": env!("CARGO_PKG_VERSION"),
    });

    if let Err(e) = ws_sender.send(Message::Text(welcome.to_string())).await {
        warn!("Failed to send welcome: {}", e);
    }

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Received from {}: {}", addr, text);

                        let is_ping = serde_json::from_str::<serde_json::Value>(&text)
                            .ok()
                            .and_then(|cmd| cmd.get("type").and_then(|v| v.as_str()).map(|t| t == "ping"))
                            .unwrap_or(false);

                        if is_ping {
                            let pong = serde_json::json!({"type": "pong"});
                            let _ = ws_sender.send(Message::Text(pong.to_string())).await;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket closed by client {}", addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }

            event = subscription.recv() => {
                let Some(event) = event else { break };

                let frame = match serde_json::to_string(&event.payload) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to encode {} event: {}", event.payload.kind(), e);
                        continue;
                    }
                };

                if let Err(e) = ws_sender.send(Message::Text(frame)).await {
                    warn!("Failed to send to {}: {}", addr, e);
                    break;
                }
            }

            _ = shutdown.recv() => {
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    info!("Subscriber {} disconnected", addr);
    // Dropping the subscription removes it from the bus
}
