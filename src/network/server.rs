//! WebSocket Game Server
//!
//! Async WebSocket front end. Each connection joins the open room, feeds
//! its commands into the session and receives the session's snapshots.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::game::state::PlayerId;
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::network::session::{run_session_loop, SessionConfig, SessionError, SessionManager};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// How often empty rooms are swept.
    pub cleanup_interval: Duration,
    /// Template for every room.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            cleanup_interval: Duration::from_secs(60),
            session: SessionConfig::default(),
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

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// What a connection is bound to.
#[derive(Debug, Default)]
struct ConnectedClient {
    /// Player identifier, after a join.
    player_id: Option<PlayerId>,
}

type Clients = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Session manager.
    sessions: Arc<SessionManager>,
    /// Connected clients.
    clients: Clients,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            sessions: Arc::new(SessionManager::new(config.session.clone())),
            config,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Run the server.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Game server listening on {}", self.config.bind_addr);

        let cleanup_sessions = self.sessions.clone();
        let cleanup_every = self.config.cleanup_interval;
        let cleanup_handle = tokio::spawn(async move {
            let mut ticker = interval(cleanup_every);
            loop {
                ticker.tick().await;
                cleanup_sessions.cleanup().await;
            }
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
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

        cleanup_handle.abort();
        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let sessions = self.sessions.clone();
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
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            clients.write().await.insert(addr, ConnectedClient::default());

            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => {
                                        Self::handle_client_message(addr, client_msg, &clients, &sessions, &msg_tx).await;
                                    }
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx
                                            .send(ServerMessage::error(ErrorCode::InvalidMessage, "Invalid message format"))
                                            .await;
                                    }
                                }
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
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            sender_task.abort();

            let client = clients.write().await.remove(&addr);
            if let Some(player_id) = client.and_then(|c| c.player_id) {
                Self::drop_player(&sessions, &player_id).await;
            }

            info!("Client {} cleaned up", addr);
        });
    }

    /// A connection went away without saying goodbye. Lobby players are
    /// forgotten; match players get the reconnect window.
    async fn drop_player(sessions: &Arc<SessionManager>, player_id: &PlayerId) {
        let Some(session) = sessions.get_player_session(player_id).await else {
            return;
        };
        let still_member = {
            let mut s = session.write().await;
            s.mark_disconnected(player_id, false);
            s.has_player(player_id)
        };
        if !still_member {
            sessions.unregister_player(player_id).await;
        }
    }

    /// Handle a client message.
    async fn handle_client_message(
        addr: SocketAddr,
        msg: ClientMessage,
        clients: &Clients,
        sessions: &Arc<SessionManager>,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let bound = clients.read().await.get(&addr).and_then(|c| c.player_id.clone());

        match (msg, bound) {
            (ClientMessage::Join { player_id }, None) => {
                Self::handle_join(addr, player_id, clients, sessions, sender).await;
            }
            (ClientMessage::Join { .. }, Some(_)) => {
                let _ = sender.send(ServerMessage::error(ErrorCode::MatchInProgress, "Already joined")).await;
            }
            (ClientMessage::Ping { timestamp }, bound) => {
                let server_tick = match bound {
                    Some(id) => match sessions.get_player_session(&id).await {
                        Some(s) => s.read().await.current_tick(),
                        None => 0,
                    },
                    None => 0,
                };
                let _ = sender.send(ServerMessage::Pong { timestamp, server_tick }).await;
            }
            (_, None) => {
                let _ = sender.send(ServerMessage::error(ErrorCode::NotInMatch, "Join a match first")).await;
            }
            (ClientMessage::Input { command }, Some(id)) => {
                if let Some(session) = sessions.get_player_session(&id).await {
                    if let Err(e) = session.write().await.push_input(&id, command) {
                        debug!(player = %id, "input dropped: {}", e);
                    }
                }
            }
            (ClientMessage::LevelUpChoice { choice }, Some(id)) => {
                if let Some(session) = sessions.get_player_session(&id).await {
                    if let Err(e) = session.write().await.choose_upgrade(&id, choice) {
                        debug!(player = %id, "upgrade choice dropped: {}", e);
                    }
                }
            }
            (ClientMessage::Start, Some(id)) => {
                if let Some(session) = sessions.get_player_session(&id).await {
                    if let Err(e) = session.write().await.start_match() {
                        let _ = sender.send(ServerMessage::error(e.code(), e.to_string())).await;
                    }
                }
            }
            (ClientMessage::Leave, Some(id)) => {
                Self::handle_leave(addr, &id, clients, sessions).await;
            }
        }
    }

    /// Join the open room, or rejoin a running match.
    async fn handle_join(
        addr: SocketAddr,
        requested: Option<String>,
        clients: &Clients,
        sessions: &Arc<SessionManager>,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let player_id = PlayerId(requested.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string()));

        let joined = match sessions.get_player_session(&player_id).await {
            Some(session) => {
                let mut s = session.write().await;
                s.reconnect_player(&player_id, sender.clone()).map(|_| {
                    let team = s.world().players.get(&player_id).map(|p| p.team).unwrap_or(0);
                    (s.id, s.match_id(), team, s.config.match_config.tick_rate)
                })
            }
            None => {
                let (session_id, session, created) = sessions.open_session().await;
                if created {
                    tokio::spawn(run_session_loop(sessions.clone(), session_id));
                }
                let mut s = session.write().await;
                s.add_player(player_id.clone(), sender.clone())
                    .map(|team| (s.id, s.match_id(), team, s.config.match_config.tick_rate))
            }
        };

        match joined {
            Ok((session_id, match_id, team, tick_rate)) => {
                sessions.register_player(player_id.clone(), session_id).await;
                if let Some(client) = clients.write().await.get_mut(&addr) {
                    client.player_id = Some(player_id.clone());
                }
                info!(player = %player_id, %match_id, team, "join accepted");
                let _ = sender
                    .send(ServerMessage::Joined { player_id: player_id.0, team, match_id, tick_rate })
                    .await;
            }
            Err(e) => {
                warn!(player = %player_id, "join rejected: {}", e);
                let _ = sender.send(ServerMessage::error(e.code(), e.to_string())).await;
            }
        }
    }

    /// Leave for good. The player's entity stays dead in a running match.
    async fn handle_leave(addr: SocketAddr, player_id: &PlayerId, clients: &Clients, sessions: &Arc<SessionManager>) {
        if let Some(session) = sessions.get_player_session(player_id).await {
            session.write().await.mark_disconnected(player_id, true);
        }
        sessions.unregister_player(player_id).await;

        if let Some(client) = clients.write().await.get_mut(&addr) {
            client.player_id = None;
        }
        info!(player = %player_id, "player left");
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        self.sessions.session_count().await
    }
}
