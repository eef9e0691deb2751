//! Match Session Management
//!
//! A session is one room: it collects players in the lobby, owns the world
//! once the match runs, buffers their commands between ticks and fans
//! snapshots back out. The simulation never sees sockets; it only sees
//! commands and a player's `alive` flag.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::rng::{derive_match_seed, DeterministicRng};
use crate::game::config::MatchConfig;
use crate::game::events::GameEventData;
use crate::game::input::{InputLog, InputQueue, PlayerCommand};
use crate::game::state::{MatchPhase, PlayerId, TeamIndex, WorldState};
use crate::game::tick::{self, TickResult};
use crate::network::protocol::{ErrorCode, ServerMessage, WorldSnapshot};

/// Unique session identifier.
pub type SessionId = [u8; 16];

/// Connection state for reconnection support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Player is connected.
    Connected,
    /// Player dropped, waiting for reconnect.
    Disconnected {
        /// Tick the connection dropped on.
        since_tick: u64,
    },
    /// Player left or ran out of grace. The entity stays in the world.
    Left,
}

/// Configuration for a match session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Humans needed before the match starts on its own.
    pub expected_players: usize,
    /// Fixed team per player id. Unlisted players go to the smallest team.
    pub team_assignments: BTreeMap<PlayerId, TeamIndex>,
    /// Grace window for reconnects, in ticks (30 s at 20 Hz).
    pub reconnect_timeout_ticks: u64,
    /// Simulation tuning.
    pub match_config: MatchConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expected_players: 4,
            team_assignments: BTreeMap::new(),
            reconnect_timeout_ticks: 600,
            match_config: MatchConfig::default(),
        }
    }
}

/// A human connected to a session.
#[derive(Debug)]
pub struct SessionPlayer {
    /// Player identifier.
    pub player_id: PlayerId,
    /// Assigned team.
    pub team: TeamIndex,
    /// Connection state.
    pub connection_state: ConnectionState,
    /// Respawn countdown held while disconnected.
    parked_respawn_ms: f32,
    /// Message channel to this player.
    pub sender: mpsc::Sender<ServerMessage>,
}

impl SessionPlayer {
    /// Check if player is connected.
    pub fn is_connected(&self) -> bool {
        matches!(self.connection_state, ConnectionState::Connected)
    }
}

/// A match session.
pub struct MatchSession {
    /// Unique session identifier.
    pub id: SessionId,
    /// Session configuration.
    pub config: SessionConfig,
    world: WorldState,
    inputs: InputQueue,
    input_log: InputLog,
    players: BTreeMap<PlayerId, SessionPlayer>,
    game_over_sent: bool,
    closed: bool,
}

impl MatchSession {
    /// Create a new session in the lobby.
    pub fn new(id: SessionId, config: SessionConfig) -> Self {
        let world = WorldState::new(&config.match_config, 0);
        Self {
            id,
            config,
            world,
            inputs: InputQueue::new(),
            input_log: InputLog::new(0),
            players: BTreeMap::new(),
            game_over_sent: false,
            closed: false,
        }
    }

    /// Hex form of the session id, as sent to clients.
    pub fn match_id(&self) -> String {
        hex::encode(self.id)
    }

    /// Current match phase.
    pub fn phase(&self) -> MatchPhase {
        self.world.phase
    }

    /// Current tick.
    pub fn current_tick(&self) -> u64 {
        self.world.tick
    }

    /// The simulated world.
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Every command applied so far, for replay.
    pub fn input_log(&self) -> &InputLog {
        &self.input_log
    }

    /// Humans in the session, connected or not.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Whether a player belongs to this session.
    pub fn has_player(&self, player_id: &PlayerId) -> bool {
        self.players.contains_key(player_id)
    }

    /// Whether the lobby emptied out or the match was torn down.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether a fresh player may still join.
    pub fn is_open(&self) -> bool {
        !self.closed && self.world.phase == MatchPhase::Waiting
    }

    fn capacity(&self) -> usize {
        let cfg = &self.config.match_config;
        cfg.map.num_teams as usize * cfg.player.players_per_team
    }

    /// Add a human to the lobby. Starts the match once the expected number
    /// of players is in. Returns the assigned team.
    pub fn add_player(
        &mut self,
        player_id: PlayerId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<TeamIndex, SessionError> {
        if self.world.phase != MatchPhase::Waiting {
            return Err(SessionError::MatchInProgress);
        }
        if self.players.contains_key(&player_id) {
            return Err(SessionError::AlreadyInSession);
        }
        if self.players.len() >= self.capacity() {
            return Err(SessionError::SessionFull);
        }

        let assigned = self.config.team_assignments.get(&player_id).copied();
        if let Some(team) = assigned {
            let Some(roster) = self.world.teams.get(team as usize) else {
                return Err(SessionError::InvalidTeam);
            };
            if roster.players.len() >= self.config.match_config.player.players_per_team {
                return Err(SessionError::SessionFull);
            }
        }

        self.world.add_player(player_id.clone(), assigned, false, &self.config.match_config);
        let team = self.world.players.get(&player_id).map(|p| p.team).ok_or(SessionError::InvalidState)?;

        info!(session = %self.match_id(), player = %player_id, team, "player joined");
        self.players.insert(player_id.clone(), SessionPlayer {
            player_id,
            team,
            connection_state: ConnectionState::Connected,
            parked_respawn_ms: 0.0,
            sender,
        });

        if self.players.len() >= self.config.expected_players {
            self.start_match()?;
        }
        Ok(team)
    }

    /// Start the match now. Empty slots are filled with bots when the match
    /// config asks for it.
    pub fn start_match(&mut self) -> Result<(), SessionError> {
        if self.world.phase != MatchPhase::Waiting || self.closed {
            return Err(SessionError::MatchInProgress);
        }

        let match_id = self.match_id();
        let ids: Vec<&str> = self.players.keys().map(|id| id.as_str()).collect();
        let seed = derive_match_seed(&match_id, &ids);

        self.world.rng_seed = seed;
        self.world.rng = DeterministicRng::new(seed);
        self.input_log = InputLog::new(seed);

        tick::start_match(&mut self.world, &self.config.match_config);
        info!(session = %match_id, humans = self.players.len(), seed, "session started");
        Ok(())
    }

    /// Buffer a command for the next tick.
    pub fn push_input(&mut self, player_id: &PlayerId, command: PlayerCommand) -> Result<(), SessionError> {
        if self.world.phase != MatchPhase::Playing {
            return Err(SessionError::MatchNotInProgress);
        }
        if !self.players.contains_key(player_id) {
            return Err(SessionError::PlayerNotFound);
        }
        self.inputs.push(player_id.clone(), command);
        Ok(())
    }

    /// Buffer a level-up pick for the next tick. Unknown or unoffered
    /// choices are dropped when the tick applies them.
    pub fn choose_upgrade(&mut self, player_id: &PlayerId, choice: String) -> Result<(), SessionError> {
        self.push_input(player_id, PlayerCommand::ChooseUpgrade { choice })
    }

    /// Handle a dropped or departing connection.
    ///
    /// In the lobby the player is simply removed. During a match the entity
    /// stays put and goes dead; `consented` departures get no grace window.
    pub fn mark_disconnected(&mut self, player_id: &PlayerId, consented: bool) -> bool {
        if !self.players.contains_key(player_id) {
            return false;
        }

        if self.world.phase == MatchPhase::Waiting {
            self.players.remove(player_id);
            if let Some(player) = self.world.players.remove(player_id) {
                if let Some(team) = self.world.teams.get_mut(player.team as usize) {
                    team.players.retain(|id| id != player_id);
                }
            }
            if self.players.is_empty() {
                self.closed = true;
            }
            return true;
        }

        let since_tick = self.world.tick;
        let mut parked = 0.0;
        if let Some(player) = self.world.players.get_mut(player_id) {
            parked = player.respawn_timer;
            player.alive = false;
            player.respawn_timer = 0.0;
            player.attack_target = None;
        }

        if let Some(p) = self.players.get_mut(player_id) {
            p.parked_respawn_ms = parked;
            p.connection_state = if consented {
                ConnectionState::Left
            } else {
                ConnectionState::Disconnected { since_tick }
            };
        }
        info!(session = %self.match_id(), player = %player_id, consented, "player disconnected");
        true
    }

    /// Check if a player can reconnect (is disconnected but not timed out).
    pub fn can_reconnect(&self, player_id: &PlayerId) -> bool {
        match self.players.get(player_id).map(|p| p.connection_state) {
            Some(ConnectionState::Disconnected { since_tick }) => {
                self.world.tick.saturating_sub(since_tick) <= self.config.reconnect_timeout_ticks
            }
            _ => false,
        }
    }

    /// Reattach a dropped player to a new channel. Returns the current tick.
    pub fn reconnect_player(
        &mut self,
        player_id: &PlayerId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<u64, SessionError> {
        if !self.players.contains_key(player_id) {
            return Err(SessionError::PlayerNotFound);
        }
        if !self.can_reconnect(player_id) {
            return Err(SessionError::InvalidState);
        }

        let Some(p) = self.players.get_mut(player_id) else {
            return Err(SessionError::PlayerNotFound);
        };
        p.connection_state = ConnectionState::Connected;
        p.sender = sender;
        let parked = std::mem::take(&mut p.parked_respawn_ms);

        if let Some(player) = self.world.players.get_mut(player_id) {
            if parked > 0.0 {
                player.respawn_timer = parked;
            } else if player.hp > 0.0 {
                player.alive = true;
            }
        }
        info!(session = %self.match_id(), player = %player_id, tick = self.world.tick, "player reconnected");
        Ok(self.world.tick)
    }

    /// Abandon players whose grace window ran out. Their entities stay in
    /// the world, dead, for the rest of the match.
    pub fn check_reconnect_timeouts(&mut self) -> Vec<PlayerId> {
        let now = self.world.tick;
        let timeout = self.config.reconnect_timeout_ticks;

        let timed_out: Vec<PlayerId> = self
            .players
            .iter()
            .filter_map(|(id, p)| match p.connection_state {
                ConnectionState::Disconnected { since_tick } if now.saturating_sub(since_tick) > timeout => {
                    Some(id.clone())
                }
                _ => None,
            })
            .collect();

        for id in &timed_out {
            if let Some(p) = self.players.get_mut(id) {
                p.connection_state = ConnectionState::Left;
            }
            warn!(session = %self.match_id(), player = %id, "reconnect window expired");
        }
        timed_out
    }

    /// Run a single game tick. `None` while still in the lobby.
    pub fn run_tick(&mut self) -> Option<TickResult> {
        if self.closed || self.world.phase == MatchPhase::Waiting {
            return None;
        }

        self.check_reconnect_timeouts();
        let result = tick::tick(&mut self.world, &mut self.inputs, &self.config.match_config);
        self.input_log.record(self.world.tick, &result.applied);
        Some(result)
    }

    /// Snapshot of the current world.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(&self.world)
    }

    /// Address a message to one player, if connected.
    pub fn send_to(&self, outbox: &mut Outbox, player_id: &PlayerId, message: ServerMessage) {
        if let Some(player) = self.players.get(player_id).filter(|p| p.is_connected()) {
            outbox.push(player, message);
        }
    }

    /// Address a message to all connected players.
    pub fn broadcast(&self, outbox: &mut Outbox, message: ServerMessage) {
        for player in self.players.values().filter(|p| p.is_connected()) {
            outbox.push(player, message.clone());
        }
    }

    /// Turn tick events into client messages: level-up prompts to the human
    /// who leveled, and the game-over message once.
    pub fn dispatch_events(&mut self, outbox: &mut Outbox, result: &TickResult) {
        for event in &result.events {
            match &event.data {
                GameEventData::LevelUp { player, level, choices, is_bot: false } => {
                    let msg = ServerMessage::LevelUpChoices { level: *level, choices: *choices };
                    self.send_to(outbox, player, msg);
                }
                GameEventData::MatchEnded { winner_team, damage_by_team } if !self.game_over_sent => {
                    self.game_over_sent = true;
                    self.broadcast(outbox, ServerMessage::game_over(*winner_team, damage_by_team));
                }
                _ => {}
            }
        }
    }
}

/// Messages addressed while a session is locked, delivered once the lock is
/// released.
#[derive(Debug, Default)]
pub struct Outbox {
    queued: Vec<(PlayerId, mpsc::Sender<ServerMessage>, ServerMessage)>,
}

impl Outbox {
    /// Create an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, player: &SessionPlayer, message: ServerMessage) {
        self.queued.push((player.player_id.clone(), player.sender.clone(), message));
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Hand every message to its channel without waiting. A client whose
    /// channel is full misses the message. Returns how many were delivered.
    pub fn deliver(self) -> usize {
        let mut delivered = 0;
        for (player_id, sender, message) in self.queued {
            match sender.try_send(message) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(player = %player_id, "client lagging, message dropped");
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Session is full.
    #[error("Session is full")]
    SessionFull,

    /// Player already in session.
    #[error("Already in session")]
    AlreadyInSession,

    /// Match is in progress.
    #[error("Match in progress")]
    MatchInProgress,

    /// Match not in progress.
    #[error("Match not in progress")]
    MatchNotInProgress,

    /// Player not found.
    #[error("Player not found")]
    PlayerNotFound,

    /// Assigned team does not exist.
    #[error("Invalid team")]
    InvalidTeam,

    /// Invalid session state.
    #[error("Invalid session state")]
    InvalidState,
}

impl SessionError {
    /// Wire error code for this rejection.
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::SessionFull | SessionError::InvalidTeam => ErrorCode::SessionFull,
            SessionError::AlreadyInSession | SessionError::MatchInProgress => ErrorCode::MatchInProgress,
            SessionError::MatchNotInProgress => ErrorCode::MatchNotInProgress,
            SessionError::PlayerNotFound => ErrorCode::NotInMatch,
            SessionError::InvalidState => ErrorCode::ReconnectFailed,
        }
    }
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Manages all active sessions.
pub struct SessionManager {
    /// Template for new rooms.
    config: SessionConfig,
    /// Active sessions.
    sessions: RwLock<BTreeMap<SessionId, Arc<RwLock<MatchSession>>>>,
    /// Player to session mapping.
    player_sessions: RwLock<BTreeMap<PlayerId, SessionId>>,
    /// Lobby currently taking joins.
    open_room: RwLock<Option<SessionId>>,
}

impl SessionManager {
    /// Create new session manager.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(BTreeMap::new()),
            player_sessions: RwLock::new(BTreeMap::new()),
            open_room: RwLock::new(None),
        }
    }

    /// Tick rate of rooms created by this manager.
    pub fn tick_rate(&self) -> u32 {
        self.config.match_config.tick_rate
    }

    /// Create a new session.
    pub async fn create_session(&self, config: SessionConfig) -> SessionId {
        let id = uuid::Uuid::new_v4().into_bytes();
        let session = MatchSession::new(id, config);

        let mut sessions = self.sessions.write().await;
        sessions.insert(id, Arc::new(RwLock::new(session)));

        id
    }

    /// The room taking joins, creating one if needed. The flag is true when
    /// the room is new and still needs a tick driver.
    pub async fn open_session(&self) -> (SessionId, Arc<RwLock<MatchSession>>, bool) {
        let mut open = self.open_room.write().await;

        if let Some(id) = *open {
            if let Some(session) = self.get_session(&id).await {
                if session.read().await.is_open() {
                    return (id, session, false);
                }
            }
        }

        let id = uuid::Uuid::new_v4().into_bytes();
        let session = Arc::new(RwLock::new(MatchSession::new(id, self.config.clone())));
        self.sessions.write().await.insert(id, session.clone());
        *open = Some(id);
        debug!(session = %hex::encode(id), "opened room");

        (id, session, true)
    }

    /// Get a session by ID.
    pub async fn get_session(&self, id: &SessionId) -> Option<Arc<RwLock<MatchSession>>> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    /// Session a player belongs to.
    pub async fn player_session_id(&self, player_id: &PlayerId) -> Option<SessionId> {
        self.player_sessions.read().await.get(player_id).copied()
    }

    /// Get session for a player.
    pub async fn get_player_session(&self, player_id: &PlayerId) -> Option<Arc<RwLock<MatchSession>>> {
        let session_id = self.player_session_id(player_id).await?;
        self.get_session(&session_id).await
    }

    /// Register player in a session.
    pub async fn register_player(&self, player_id: PlayerId, session_id: SessionId) {
        let mut player_sessions = self.player_sessions.write().await;
        player_sessions.insert(player_id, session_id);
    }

    /// Unregister player from session.
    pub async fn unregister_player(&self, player_id: &PlayerId) {
        let mut player_sessions = self.player_sessions.write().await;
        player_sessions.remove(player_id);
    }

    /// Remove a session and every mapping into it.
    pub async fn remove_session(&self, id: &SessionId) {
        self.sessions.write().await.remove(id);
        self.player_sessions.write().await.retain(|_, s| s != id);

        let mut open = self.open_room.write().await;
        if *open == Some(*id) {
            *open = None;
        }
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Drop sessions whose lobby emptied out.
    pub async fn cleanup(&self) {
        let snapshot: Vec<(SessionId, Arc<RwLock<MatchSession>>)> =
            self.sessions.read().await.iter().map(|(id, s)| (*id, s.clone())).collect();

        for (id, session) in snapshot {
            if session.read().await.is_closed() {
                self.remove_session(&id).await;
            }
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

/// Drive one session at its tick rate until the match ends or the room
/// closes, then remove it from the manager.
pub async fn run_session_loop(manager: Arc<SessionManager>, id: SessionId) {
    let Some(session) = manager.get_session(&id).await else {
        return;
    };
    let tick_rate = session.read().await.config.match_config.tick_rate.max(1);

    let mut ticker = interval(Duration::from_secs_f64(1.0 / tick_rate as f64));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let mut outbox = Outbox::new();
        let finished = {
            let mut s = session.write().await;
            if s.is_closed() {
                break;
            }
            let Some(result) = s.run_tick() else { continue };

            s.dispatch_events(&mut outbox, &result);
            let snapshot = s.snapshot();
            s.broadcast(&mut outbox, ServerMessage::State(snapshot));

            if result.match_ended {
                info!(session = %s.match_id(), tick = s.current_tick(), winner = ?result.winner, "session finished");
            }
            result.match_ended
        };

        outbox.deliver();
        if finished {
            break;
        }
    }

    manager.remove_session(&id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::leveling;

    fn solo_config() -> SessionConfig {
        SessionConfig { expected_players: 1, ..Default::default() }
    }

    fn channel() -> (mpsc::Sender<ServerMessage>, mpsc::Receiver<ServerMessage>) {
        mpsc::channel(64)
    }

    #[tokio::test]
    async fn test_join_assigns_teams() {
        let mut config = SessionConfig::default();
        config.team_assignments.insert(PlayerId::from("carol"), 3);
        let mut session = MatchSession::new([0; 16], config);

        let (tx, _rx) = channel();
        assert_eq!(session.add_player(PlayerId::from("alice"), tx.clone()), Ok(0));
        assert_eq!(session.add_player(PlayerId::from("bob"), tx.clone()), Ok(1));
        assert_eq!(session.add_player(PlayerId::from("carol"), tx), Ok(3));
        assert_eq!(session.player_count(), 3);
        assert_eq!(session.phase(), MatchPhase::Waiting);
    }

    #[tokio::test]
    async fn test_join_rejections() {
        let mut config = SessionConfig { expected_players: 99, ..Default::default() };
        config.team_assignments.insert(PlayerId::from("ghost"), 7);
        let mut session = MatchSession::new([0; 16], config);
        let (tx, _rx) = channel();

        session.add_player(PlayerId::from("alice"), tx.clone()).unwrap();
        assert_eq!(session.add_player(PlayerId::from("alice"), tx.clone()), Err(SessionError::AlreadyInSession));
        assert_eq!(session.add_player(PlayerId::from("ghost"), tx.clone()), Err(SessionError::InvalidTeam));

        for i in 0..11 {
            session.add_player(PlayerId(format!("p{}", i)), tx.clone()).unwrap();
        }
        assert_eq!(session.add_player(PlayerId::from("late"), tx), Err(SessionError::SessionFull));
    }

    #[tokio::test]
    async fn test_auto_start_at_expected_count() {
        let config = SessionConfig { expected_players: 2, ..Default::default() };
        let mut session = MatchSession::new([9; 16], config);
        let (tx, _rx) = channel();

        session.add_player(PlayerId::from("bob"), tx.clone()).unwrap();
        assert_eq!(session.phase(), MatchPhase::Waiting);
        session.add_player(PlayerId::from("alice"), tx.clone()).unwrap();
        assert_eq!(session.phase(), MatchPhase::Playing);

        // Bots fill the remaining slots
        assert_eq!(session.world().players.len(), 12);
        let expected = derive_match_seed(&hex::encode([9u8; 16]), &["alice", "bob"]);
        assert_eq!(session.world().rng_seed, expected);
        assert_eq!(session.input_log().rng_seed, expected);

        assert_eq!(session.add_player(PlayerId::from("carol"), tx), Err(SessionError::MatchInProgress));
        assert_eq!(session.start_match(), Err(SessionError::MatchInProgress));
    }

    #[tokio::test]
    async fn test_input_only_while_playing() {
        let config = SessionConfig { expected_players: 2, ..Default::default() };
        let mut session = MatchSession::new([1; 16], config);
        let (tx, _rx) = channel();
        let alice = PlayerId::from("alice");

        session.add_player(alice.clone(), tx).unwrap();
        let early = session.push_input(&alice, PlayerCommand::Stop);
        assert_eq!(early, Err(SessionError::MatchNotInProgress));
        assert!(session.run_tick().is_none());

        session.start_match().unwrap();
        assert_eq!(session.push_input(&PlayerId::from("stranger"), PlayerCommand::Stop), Err(SessionError::PlayerNotFound));

        let start = session.world().players[&alice].position;
        session.push_input(&alice, PlayerCommand::Move { x: start.x + 200.0, y: start.y }).unwrap();
        let result = session.run_tick().unwrap();

        assert_eq!(result.applied.len(), 1);
        assert_eq!(session.current_tick(), 1);
        assert!(session.world().players[&alice].position.x > start.x);
        assert_eq!(session.input_log().commands_at(1).count(), 1);
    }

    #[tokio::test]
    async fn test_lobby_leave_removes_player_and_closes_room() {
        let mut session = MatchSession::new([0; 16], SessionConfig::default());
        let (tx, _rx) = channel();
        let alice = PlayerId::from("alice");

        session.add_player(alice.clone(), tx).unwrap();
        assert!(session.mark_disconnected(&alice, false));

        assert_eq!(session.player_count(), 0);
        assert!(session.world().players.is_empty());
        assert!(session.world().teams[0].players.is_empty());
        assert!(session.is_closed());
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_disconnect_and_reconnect_within_window() {
        let mut session = MatchSession::new([0; 16], solo_config());
        let (tx, _rx) = channel();
        let alice = PlayerId::from("alice");
        session.add_player(alice.clone(), tx).unwrap();
        session.run_tick();

        assert!(session.mark_disconnected(&alice, false));
        assert!(!session.world().players[&alice].alive);
        assert!(session.can_reconnect(&alice));

        for _ in 0..10 {
            session.run_tick();
        }
        // Still dead: the simulation never revives a disconnected player
        assert!(!session.world().players[&alice].alive);

        let (new_tx, _new_rx) = channel();
        assert_eq!(session.reconnect_player(&alice, new_tx), Ok(11));
        assert!(session.world().players[&alice].alive);
    }

    #[tokio::test]
    async fn test_disconnect_while_dead_keeps_respawn_countdown() {
        let mut session = MatchSession::new([0; 16], solo_config());
        let (tx, _rx) = channel();
        let alice = PlayerId::from("alice");
        session.add_player(alice.clone(), tx).unwrap();

        if let Some(p) = session.world.players.get_mut(&alice) {
            p.alive = false;
            p.hp = 0.0;
            p.respawn_timer = 3000.0;
        }
        session.mark_disconnected(&alice, false);
        assert_eq!(session.world().players[&alice].respawn_timer, 0.0);

        let (new_tx, _new_rx) = channel();
        session.reconnect_player(&alice, new_tx).unwrap();
        let player = &session.world().players[&alice];
        assert!(!player.alive);
        assert_eq!(player.respawn_timer, 3000.0);
    }

    #[tokio::test]
    async fn test_consented_leave_has_no_grace() {
        let mut session = MatchSession::new([0; 16], solo_config());
        let (tx, _rx) = channel();
        let alice = PlayerId::from("alice");
        session.add_player(alice.clone(), tx).unwrap();

        session.mark_disconnected(&alice, true);
        assert!(!session.world().players[&alice].alive);
        assert!(!session.can_reconnect(&alice));

        let (new_tx, _new_rx) = channel();
        assert_eq!(session.reconnect_player(&alice, new_tx), Err(SessionError::InvalidState));
    }

    #[tokio::test]
    async fn test_reconnect_timeout_leaves_husk() {
        let config = SessionConfig { expected_players: 1, reconnect_timeout_ticks: 5, ..Default::default() };
        let mut session = MatchSession::new([0; 16], config);
        let (tx, _rx) = channel();
        let alice = PlayerId::from("alice");
        session.add_player(alice.clone(), tx).unwrap();

        session.mark_disconnected(&alice, false);
        for _ in 0..7 {
            session.run_tick();
        }

        assert!(!session.can_reconnect(&alice));
        assert_eq!(session.players[&alice].connection_state, ConnectionState::Left);
        // The entity keeps its slot
        assert!(session.world().players.contains_key(&alice));
        assert!(session.world().teams[0].players.contains(&alice));
    }

    #[tokio::test]
    async fn test_level_up_prompt_goes_to_human() {
        let mut session = MatchSession::new([0; 16], solo_config());
        let (tx, mut rx) = channel();
        let alice = PlayerId::from("alice");
        session.add_player(alice.clone(), tx).unwrap();

        let xp = session.config.match_config.leveling.xp_base;
        let config = session.config.match_config.clone();
        leveling::award_xp(&mut session.world, &alice, xp, &config);
        let result = TickResult { events: session.world.take_events(), ..Default::default() };
        let mut outbox = Outbox::new();
        session.dispatch_events(&mut outbox, &result);
        assert_eq!(outbox.deliver(), 1);

        let Ok(ServerMessage::LevelUpChoices { level, choices }) = rx.try_recv() else {
            panic!("expected a level-up prompt");
        };
        assert_eq!(level, 2);
        assert!(rx.try_recv().is_err());
        assert_eq!(session.world().players[&alice].pending_level_ups.len(), 1);
    }

    #[tokio::test]
    async fn test_upgrade_choice_waits_for_tick() {
        let mut session = MatchSession::new([0; 16], solo_config());
        let (tx, _rx) = channel();
        let alice = PlayerId::from("alice");
        session.add_player(alice.clone(), tx).unwrap();

        let config = session.config.match_config.clone();
        leveling::award_xp(&mut session.world, &alice, config.leveling.xp_base, &config);
        let choices = session.world().players[&alice].pending_level_ups.front().copied().unwrap();
        let mut expected = session.world().players[&alice].clone();
        leveling::apply_upgrade(&mut expected, choices[0], &config.leveling);

        let unoffered = leveling::ALL_UPGRADES
            .iter()
            .find(|k| !choices.contains(*k))
            .map(|k| k.as_str())
            .unwrap_or("mana");
        for pick in [unoffered, "mana", choices[0].as_str(), choices[1].as_str()] {
            session.choose_upgrade(&alice, pick.to_string()).unwrap();
        }

        // Nothing changes until the tick drains the queue
        assert!(session.world().players[&alice].has_pending_level_up());
        session.run_tick();

        let p = &session.world().players[&alice];
        assert!(!p.has_pending_level_up());
        assert_eq!(p.bonus, expected.bonus);
        let logged = session
            .input_log()
            .entries()
            .iter()
            .filter(|e| matches!(e.command, PlayerCommand::ChooseUpgrade { .. }))
            .count();
        assert_eq!(logged, 4);
    }

    #[tokio::test]
    async fn test_game_over_sent_once() {
        let mut session = MatchSession::new([0; 16], solo_config());
        let (tx, mut rx) = channel();
        session.add_player(PlayerId::from("alice"), tx).unwrap();

        session.world.objective.damage_by_team.insert(2, 500.0);
        session.world.objective.hp = 0.0;
        let result = session.run_tick().unwrap();
        assert!(result.match_ended);
        let mut outbox = Outbox::new();
        session.dispatch_events(&mut outbox, &result);
        session.dispatch_events(&mut outbox, &result);
        outbox.deliver();

        let mut game_overs = 0;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMessage::GameOver { winner_team, damage_by_team } = msg {
                assert_eq!(winner_team, 2);
                assert_eq!(damage_by_team["2"], 500.0);
                game_overs += 1;
            }
        }
        assert_eq!(game_overs, 1);
    }

    #[tokio::test]
    async fn test_broadcast_skips_disconnected() {
        let config = SessionConfig { expected_players: 2, ..Default::default() };
        let mut session = MatchSession::new([0; 16], config);
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        session.add_player(PlayerId::from("alice"), tx1).unwrap();
        session.add_player(PlayerId::from("bob"), tx2).unwrap();
        session.mark_disconnected(&PlayerId::from("bob"), false);

        let mut outbox = Outbox::new();
        session.broadcast(&mut outbox, ServerMessage::State(session.snapshot()));
        assert_eq!(outbox.len(), 1);
        outbox.deliver();
        assert!(matches!(rx1.try_recv(), Ok(ServerMessage::State(_))));
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_channel_drops_instead_of_waiting() {
        let mut session = MatchSession::new([0; 16], solo_config());
        let (tx, mut rx) = mpsc::channel(1);
        session.add_player(PlayerId::from("alice"), tx).unwrap();

        let mut outbox = Outbox::new();
        for _ in 0..3 {
            session.broadcast(&mut outbox, ServerMessage::State(session.snapshot()));
        }
        assert_eq!(outbox.deliver(), 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stalled_client_does_not_freeze_match() {
        let manager = Arc::new(SessionManager::new(solo_config()));
        let (id, session, _) = manager.open_session().await;
        // Never drained
        let (tx, _rx) = mpsc::channel(1);
        session.write().await.add_player(PlayerId::from("alice"), tx).unwrap();

        let driver = tokio::spawn(run_session_loop(manager.clone(), id));
        tokio::time::sleep(Duration::from_millis(300)).await;

        let first = tokio::time::timeout(Duration::from_millis(500), session.read())
            .await
            .expect("tick loop must not hold the session")
            .current_tick();
        assert!(first > 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let mut s = tokio::time::timeout(Duration::from_millis(500), session.write())
            .await
            .expect("tick loop must not hold the session");
        assert!(s.current_tick() > first);
        assert!(s.push_input(&PlayerId::from("alice"), PlayerCommand::Stop).is_ok());
        drop(s);

        driver.abort();
    }

    #[tokio::test]
    async fn test_session_manager_open_room() {
        let manager = SessionManager::new(SessionConfig { expected_players: 1, ..Default::default() });

        let (first, session, created) = manager.open_session().await;
        assert!(created);
        let (again, _, created) = manager.open_session().await;
        assert_eq!(first, again);
        assert!(!created);

        // Once the room starts, the next join gets a fresh one
        let (tx, _rx) = channel();
        session.write().await.add_player(PlayerId::from("alice"), tx).unwrap();
        let (second, _, created) = manager.open_session().await;
        assert_ne!(first, second);
        assert!(created);
        assert_eq!(manager.session_count().await, 2);
    }

    #[tokio::test]
    async fn test_player_session_mapping() {
        let manager = SessionManager::default();
        let session_id = manager.create_session(SessionConfig::default()).await;
        let player_id = PlayerId::from("alice");

        manager.register_player(player_id.clone(), session_id).await;
        assert!(manager.get_player_session(&player_id).await.is_some());

        manager.unregister_player(&player_id).await;
        assert!(manager.get_player_session(&player_id).await.is_none());

        manager.register_player(player_id.clone(), session_id).await;
        manager.remove_session(&session_id).await;
        assert_eq!(manager.session_count().await, 0);
        assert!(manager.player_session_id(&player_id).await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_drops_empty_lobbies() {
        let manager = SessionManager::default();
        let (id, session, _) = manager.open_session().await;
        let (tx, _rx) = channel();
        {
            let mut s = session.write().await;
            s.add_player(PlayerId::from("alice"), tx).unwrap();
            s.mark_disconnected(&PlayerId::from("alice"), true);
        }

        manager.cleanup().await;
        assert!(manager.get_session(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_session_loop_stops_at_match_end() {
        let manager = Arc::new(SessionManager::new(solo_config()));
        let (id, session, _) = manager.open_session().await;
        let (tx, mut rx) = channel();
        {
            let mut s = session.write().await;
            s.add_player(PlayerId::from("alice"), tx).unwrap();
            s.world.objective.hp = 0.0;
        }

        run_session_loop(manager.clone(), id).await;
        assert!(manager.get_session(&id).await.is_none());

        let mut saw_game_over = false;
        let mut saw_state = false;
        while let Ok(msg) = rx.try_recv() {
            match msg {
                ServerMessage::GameOver { .. } => saw_game_over = true,
                ServerMessage::State(s) => saw_state = s.phase == MatchPhase::Finished,
                _ => {}
            }
        }
        assert!(saw_game_over);
        assert!(saw_state);
    }

    #[tokio::test]
    async fn test_snapshot_matches_world() {
        let mut session = MatchSession::new([0; 16], solo_config());
        let (tx, _rx) = channel();
        session.add_player(PlayerId::from("alice"), tx).unwrap();
        session.run_tick();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.tick, 1);
        assert_eq!(snapshot.players.len(), 12);
        assert_eq!(snapshot.state_hash, hex::encode(session.world().compute_hash()));
        assert!(snapshot.players.iter().all(|p| p.position.is_finite() && p.position != Vec2::ZERO));
    }
}
