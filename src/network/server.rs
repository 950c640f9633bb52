//! WebSocket Leaderboard Server
//!
//! Async WebSocket server exposing the leaderboard read path.
//! Each connection is handled on its own task; all of them share one
//! aggregator, so cached snapshots are served without touching the ledger.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::config::ServerConfig;
use crate::leaderboard::LeaderboardAggregator;
use crate::network::protocol::{
    ClientMessage, ServerMessage, LeaderboardSnapshot, Encoding, ErrorCode,
};

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Connected client state.
struct ConnectedClient {
    /// Connection time.
    connected_at: Instant,
    /// Requests served.
    requests: u64,
}

/// The leaderboard server.
pub struct LeaderboardServer {
    /// Server configuration.
    config: ServerConfig,
    /// Shared aggregator.
    aggregator: Arc<LeaderboardAggregator>,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl LeaderboardServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, aggregator: Arc<LeaderboardAggregator>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            aggregator,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and run until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.run_with_listener(listener).await
    }

    /// Run on an already bound listener until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), ServerError> {
        info!("Leaderboard server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                tokio::spawn(reject_overloaded(stream));
                                continue;
                            }

                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let aggregator = self.aggregator.clone();
        let default_limit = self.config.default_limit;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<Message>(64);

            clients.write().await.insert(addr, ConnectedClient {
                connected_at: Instant::now(),
                requests: 0,
            });

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let closing = matches!(msg, Message::Close(_));
                    if ws_sender.send(msg).await.is_err() || closing {
                        break;
                    }
                }
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let reply = match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => {
                                        if let Some(client) = clients.write().await.get_mut(&addr) {
                                            client.requests += 1;
                                        }
                                        Self::handle_client_message(client_msg, &aggregator, default_limit).await
                                    }
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        text_frame(&ServerMessage::error(
                                            ErrorCode::InvalidInput,
                                            "Invalid message format",
                                        ))
                                    }
                                };

                                if let Some(frame) = reply {
                                    if msg_tx.send(frame).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Some(Ok(Message::Binary(_))) => {
                                send_frame(&msg_tx, text_frame(&ServerMessage::error(
                                    ErrorCode::InvalidInput,
                                    "Requests must be JSON text frames",
                                ))).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        send_frame(&msg_tx, text_frame(&ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        })).await;
                        let _ = msg_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            // Let queued frames flush before the connection drops.
            drop(msg_tx);
            let _ = sender_task.await;

            if let Some(client) = clients.write().await.remove(&addr) {
                debug!(
                    "Client {} cleaned up after {:?}, {} requests",
                    addr,
                    client.connected_at.elapsed(),
                    client.requests
                );
            }
        });
    }

    /// Build the reply to one client message.
    async fn handle_client_message(
        msg: ClientMessage,
        aggregator: &LeaderboardAggregator,
        default_limit: usize,
    ) -> Option<Message> {
        match msg {
            ClientMessage::GetLeaderboard { limit, encoding } => {
                let entries = aggregator.get_leaderboard().await;
                let snapshot = LeaderboardSnapshot::new(entries, limit.unwrap_or(default_limit));

                match encoding {
                    Encoding::Json => text_frame(&ServerMessage::Leaderboard(snapshot)),
                    Encoding::Bincode => match snapshot.to_bytes() {
                        Ok(bytes) => Some(Message::Binary(bytes)),
                        Err(e) => {
                            error!("Failed to encode snapshot: {}", e);
                            text_frame(&ServerMessage::error(
                                ErrorCode::InternalError,
                                "Failed to encode leaderboard",
                            ))
                        }
                    },
                }
            }
            ClientMessage::Ping { timestamp } => text_frame(&ServerMessage::Pong {
                timestamp,
                server_time: chrono::Utc::now().timestamp_millis().max(0) as u64,
            }),
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

/// Serialize a message into a text frame.
fn text_frame(msg: &ServerMessage) -> Option<Message> {
    match msg.to_json() {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            error!("Failed to serialize message: {}", e);
            None
        }
    }
}

/// Tell a client over the connection limit why it is being turned away.
async fn reject_overloaded(stream: TcpStream) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };
    if let Some(frame) = text_frame(&ServerMessage::error(
        ErrorCode::ServerOverloaded,
        "Too many connections",
    )) {
        let _ = ws.send(frame).await;
    }
    let _ = ws.close(None).await;
}

/// Queue a frame if there is one. A closed channel means the client is gone.
async fn send_frame(tx: &mpsc::Sender<Message>, frame: Option<Message>) {
    if let Some(frame) = frame {
        let _ = tx.send(frame).await;
    }
}
