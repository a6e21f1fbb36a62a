//! WebSocket Game Server
//!
//! Async WebSocket edge. Each connection introduces itself with `hello`,
//! receives a one-time sync payload, then exchanges JSON text frames: inbound
//! frames become coordinator commands, and coordinator broadcasts are
//! forwarded back out through a per-connection sender task.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::game::types::ParticipantId;
use crate::network::gateway::{BroadcastGateway, OutboundEvent};
use crate::network::protocol::{ClientEnvelope, ClientMessage, ServerMessage};
use crate::vote::ballot::{VoteSpec, DEFAULT_VOTE_TIMEOUT_MS};
use crate::vote::coordinator::{Command, CoordinatorHandle};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().expect("static addr"),
            max_connections: 1000,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// The game server: accept loop plus per-connection tasks.
pub struct GameServer {
    config: ServerConfig,
    coordinator: CoordinatorHandle,
    gateway: BroadcastGateway,
    connections: Arc<AtomicUsize>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    pub fn new(
        config: ServerConfig,
        coordinator: CoordinatorHandle,
        gateway: BroadcastGateway,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            coordinator,
            gateway,
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Run the accept loop until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(addr = %self.config.bind_addr, version = %self.config.version, "game server listening");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connections.load(Ordering::Relaxed) >= self.config.max_connections {
                                warn!(%addr, "connection limit reached, rejecting");
                                continue;
                            }
                            debug!(%addr, "new connection");
                            self.spawn_connection(stream, addr);
                        }
                        Err(e) => error!("accept error: {e}"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }
        Ok(())
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let coordinator = self.coordinator.clone();
        let events = self.gateway.subscribe();
        let connections = self.connections.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        connections.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, coordinator, events, &mut shutdown_rx).await {
                debug!(%addr, "connection closed: {e}");
            }
            connections.fetch_sub(1, Ordering::Relaxed);
            debug!(%addr, "connection cleaned up");
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    coordinator: CoordinatorHandle,
    mut events: broadcast::Receiver<OutboundEvent>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> Result<(), GameServerError> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

    // Dedicated writer task; everything funnels through msg_tx.
    let sender_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            let text = match msg.to_json() {
                Ok(text) => text,
                Err(e) => {
                    error!("failed to serialize message: {e}");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Identity is set by the first `hello`.
    let mut participant: Option<ParticipantId> = None;

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let envelope = match ClientEnvelope::from_json(&text) {
                            Ok(envelope) => envelope,
                            Err(e) => {
                                debug!(%addr, "invalid message: {e}");
                                let _ = msg_tx
                                    .send(ServerMessage::Error {
                                        message: "invalid message format".to_string(),
                                    })
                                    .await;
                                continue;
                            }
                        };
                        handle_envelope(envelope, &mut participant, &coordinator, &msg_tx).await;
                    }
                    Some(Ok(Message::Ping(_)) | Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%addr, "client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(%addr, "websocket error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if msg_tx.send(event_to_message(event)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // The next game_state broadcast resynchronizes.
                        warn!(%addr, skipped, "slow consumer dropped events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = shutdown_rx.recv() => {
                debug!(%addr, "closing for shutdown");
                break;
            }
        }
    }

    if let Some(participant) = participant {
        let _ = coordinator.send(Command::Leave { participant }).await;
    }
    sender_task.abort();
    Ok(())
}

async fn handle_envelope(
    envelope: ClientEnvelope,
    participant: &mut Option<ParticipantId>,
    coordinator: &CoordinatorHandle,
    msg_tx: &mpsc::Sender<ServerMessage>,
) {
    let seq = envelope.seq;

    // `hello` first; everything else needs an identity.
    if participant.is_none() {
        match envelope.command {
            ClientMessage::Hello { participant_id, name } => {
                *participant = Some(participant_id.clone());
                let _ = coordinator
                    .send(Command::Join { participant: participant_id, name })
                    .await;
                match coordinator.sync().await {
                    Ok(payload) => {
                        let _ = msg_tx.send(ServerMessage::Sync { payload }).await;
                    }
                    Err(e) => error!("sync failed: {e}"),
                }
                let _ = msg_tx.send(ServerMessage::Ack { seq, ok: true }).await;
            }
            _ => {
                let _ = msg_tx
                    .send(ServerMessage::Error { message: "say hello first".to_string() })
                    .await;
            }
        }
        return;
    }
    let Some(me) = participant.clone() else {
        return;
    };

    match envelope.command {
        ClientMessage::Hello { .. } => {
            let _ = msg_tx
                .send(ServerMessage::Error { message: "already introduced".to_string() })
                .await;
        }
        ClientMessage::StartGame => {
            acked_command(coordinator, msg_tx, seq, |ack| Command::StartGame { ack }).await;
        }
        ClientMessage::StopGame => {
            acked_command(coordinator, msg_tx, seq, |ack| Command::StopGame { ack }).await;
        }
        ClientMessage::PauseGame => {
            acked_command(coordinator, msg_tx, seq, |ack| Command::PauseGame { ack }).await;
        }
        ClientMessage::ResumeGame => {
            acked_command(coordinator, msg_tx, seq, |ack| Command::ResumeGame { ack }).await;
        }
        ClientMessage::StartVote { timeout_ms } => {
            let spec = VoteSpec {
                timeout_ms: Some(timeout_ms.unwrap_or(DEFAULT_VOTE_TIMEOUT_MS)),
                round_effects: Vec::new(),
            };
            acked_command(coordinator, msg_tx, seq, |ack| Command::StartVote { spec, ack }).await;
        }
        ClientMessage::RecordChoice { vote_id, choice } => {
            let _ = coordinator
                .send(Command::RecordChoice { participant: me, vote_id, choice })
                .await;
        }
        ClientMessage::SetVoteTimeout { vote_id, timeout_ms, paused } => {
            let _ = coordinator
                .send(Command::SetVoteTimeout { vote_id, timeout_ms, paused })
                .await;
        }
        ClientMessage::EndVote { vote_id } => {
            let _ = coordinator.send(Command::EndVote { vote_id }).await;
        }
        ClientMessage::CancelVote { vote_id } => {
            let _ = coordinator.send(Command::CancelVote { vote_id }).await;
        }
        ClientMessage::Chat { text } => {
            let _ = coordinator.send(Command::Chat { participant: me, text }).await;
        }
        ClientMessage::Rename { name } => {
            let _ = coordinator.send(Command::Rename { participant: me, name }).await;
        }
    }
}

/// Send a command that carries an ack channel and relay the result.
async fn acked_command(
    coordinator: &CoordinatorHandle,
    msg_tx: &mpsc::Sender<ServerMessage>,
    seq: Option<u64>,
    make: impl FnOnce(Option<oneshot::Sender<bool>>) -> Command,
) {
    let (ack_tx, ack_rx) = oneshot::channel();
    if coordinator.send(make(Some(ack_tx))).await.is_err() {
        let _ = msg_tx
            .send(ServerMessage::Error { message: "coordinator unavailable".to_string() })
            .await;
        return;
    }
    let ok = ack_rx.await.unwrap_or(false);
    let _ = msg_tx.send(ServerMessage::Ack { seq, ok }).await;
}

fn event_to_message(event: OutboundEvent) -> ServerMessage {
    match event {
        OutboundEvent::VoteStarted(vote) => ServerMessage::VoteStarted { vote },
        OutboundEvent::VoteUpdated(vote) => ServerMessage::VoteUpdated { vote },
        OutboundEvent::VoteEnded(vote) => ServerMessage::VoteEnded { vote },
        OutboundEvent::VoteCancel(vote) => ServerMessage::VoteCancel { vote },
        OutboundEvent::GameState(state) => ServerMessage::GameState { state },
        OutboundEvent::Chat(entry) => ServerMessage::ChatMessage { entry },
        OutboundEvent::ClientsUpdate(clients) => ServerMessage::ClientsUpdate { clients },
    }
}
