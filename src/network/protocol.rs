//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Messages are JSON text frames tagged by `type`. Snapshots can also be
//! encoded with bincode for recording.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use crate::game::input::PlayerCommand;
use crate::game::leveling::UpgradeKind;
use crate::game::state::{
    Base, MatchPhase, Minion, Objective, Player, Projectile, Team, TeamIndex, Tower, WorldState,
};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the open room, or rejoin a match with a previous id.
    Join {
        /// Id from an earlier `joined`, for reconnecting
        #[serde(default, rename = "playerId")]
        player_id: Option<String>,
    },

    /// One gameplay command.
    Input { command: PlayerCommand },

    /// Answer to a level-up prompt. Unknown kinds are ignored.
    LevelUpChoice { choice: String },

    /// Start the match now, filling empty slots with bots.
    Start,

    /// Leave the match for good.
    Leave,

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join accepted.
    Joined {
        #[serde(rename = "playerId")]
        player_id: String,
        team: TeamIndex,
        #[serde(rename = "matchId")]
        match_id: String,
        #[serde(rename = "tickRate")]
        tick_rate: u32,
    },

    /// Full world snapshot, every tick.
    State(WorldSnapshot),

    /// A human player leveled up and must pick one of two upgrades.
    LevelUpChoices {
        level: u32,
        choices: [UpgradeKind; 2],
    },

    /// Match is over. Sent once.
    GameOver {
        #[serde(rename = "winnerTeam")]
        winner_team: TeamIndex,
        /// Objective damage per team, keyed by team index
        #[serde(rename = "damageByTeam")]
        damage_by_team: BTreeMap<String, f32>,
    },

    /// Pong response.
    Pong {
        timestamp: u64,
        #[serde(rename = "serverTick")]
        server_tick: u64,
    },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

impl ServerMessage {
    /// Game-over message from the final objective damage tally.
    pub fn game_over(winner_team: TeamIndex, damage_by_team: &BTreeMap<TeamIndex, f32>) -> Self {
        ServerMessage::GameOver {
            winner_team,
            damage_by_team: damage_by_team.iter().map(|(t, d)| (t.to_string(), *d)).collect(),
        }
    }

    /// Error message with a code.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError { code, message: message.into() })
    }
}

/// Everything a client can see, as of one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub phase: MatchPhase,
    #[serde(rename = "winnerTeam")]
    pub winner_team: Option<TeamIndex>,
    pub players: Vec<Player>,
    pub minions: Vec<Minion>,
    pub projectiles: Vec<Projectile>,
    pub teams: Vec<Team>,
    pub bases: Vec<Base>,
    pub towers: Vec<Tower>,
    pub objective: Objective,
    /// Hex SHA-256 of the simulation state
    #[serde(rename = "stateHash")]
    pub state_hash: String,
}

impl WorldSnapshot {
    /// Copy the client-visible state out of the world.
    pub fn capture(world: &WorldState) -> Self {
        Self {
            tick: world.tick,
            phase: world.phase,
            winner_team: world.winner,
            players: world.players.values().cloned().collect(),
            minions: world.minions.values().cloned().collect(),
            projectiles: world.projectiles.values().cloned().collect(),
            teams: world.teams.clone(),
            bases: world.bases.values().cloned().collect(),
            towers: world.towers.values().cloned().collect(),
            objective: world.objective.clone(),
            state_hash: hex::encode(world.compute_hash()),
        }
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

/// Server error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Unparseable message.
    InvalidMessage,
    /// No room for another player.
    SessionFull,
    /// The match already started.
    MatchInProgress,
    /// The match is not running.
    MatchNotInProgress,
    /// The connection has not joined a match.
    NotInMatch,
    /// Reconnect refused.
    ReconnectFailed,
    /// Internal error.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::MatchConfig;
    use crate::game::state::PlayerId;

    #[test]
    fn test_client_input_wire_format() {
        let msg = ClientMessage::from_json(
            r#"{"type":"input","command":{"type":"attack","targetId":"tower_2"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Input { command: PlayerCommand::Attack { target_id: "tower_2".into() } }
        );

        let msg = ClientMessage::from_json(r#"{"type":"input","command":{"type":"move","x":10,"y":20.5}}"#).unwrap();
        assert_eq!(msg, ClientMessage::Input { command: PlayerCommand::Move { x: 10.0, y: 20.5 } });
    }

    #[test]
    fn test_join_with_and_without_id() {
        assert_eq!(ClientMessage::from_json(r#"{"type":"join"}"#).unwrap(), ClientMessage::Join { player_id: None });
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"join","playerId":"abc"}"#).unwrap(),
            ClientMessage::Join { player_id: Some("abc".into()) }
        );
    }

    #[test]
    fn test_level_up_choice_and_leave() {
        let msg = ClientMessage::from_json(r#"{"type":"level_up_choice","choice":"maxHp"}"#).unwrap();
        assert_eq!(msg, ClientMessage::LevelUpChoice { choice: "maxHp".into() });
        assert_eq!(ClientMessage::from_json(r#"{"type":"leave"}"#).unwrap(), ClientMessage::Leave);
    }

    #[test]
    fn test_malformed_client_message_rejected() {
        assert!(ClientMessage::from_json(r#"{"type":"teleport"}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
    }

    #[test]
    fn test_game_over_wire_format() {
        let tally: BTreeMap<TeamIndex, f32> = [(0, 10000.0), (1, 4000.0), (2, 0.0), (3, 0.0)].into_iter().collect();
        let json = ServerMessage::game_over(0, &tally).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "game_over");
        assert_eq!(value["winnerTeam"], 0);
        assert_eq!(value["damageByTeam"]["0"], 10000.0);
        assert_eq!(value["damageByTeam"]["1"], 4000.0);
        assert_eq!(value["damageByTeam"]["3"], 0.0);
    }

    #[test]
    fn test_level_up_choices_use_upgrade_names() {
        let msg = ServerMessage::LevelUpChoices { level: 2, choices: [UpgradeKind::MaxHp, UpgradeKind::Defense] };
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""choices":["maxHp","defense"]"#));
    }

    #[test]
    fn test_error_codes() {
        let json = ServerMessage::error(ErrorCode::SessionFull, "room is full").to_json().unwrap();
        assert!(json.contains("session_full"));
    }

    #[test]
    fn test_snapshot_carries_state_hash() {
        let config = MatchConfig::default();
        let mut world = WorldState::new(&config, 5);
        world.add_player(PlayerId::from("p1"), Some(2), false, &config);

        let snapshot = WorldSnapshot::capture(&world);
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.bases.len(), 4);
        assert_eq!(snapshot.state_hash, hex::encode(world.compute_hash()));
        assert_eq!(snapshot.state_hash.len(), 64);

        let json = ServerMessage::State(snapshot).to_json().unwrap();
        assert!(json.starts_with(r#"{"type":"state""#));
    }

    #[test]
    fn test_snapshot_binary_roundtrip() {
        let config = MatchConfig::default();
        let mut world = WorldState::new(&config, 5);
        world.add_player(PlayerId::from("p1"), Some(1), false, &config);
        let snapshot = WorldSnapshot::capture(&world);

        let bytes = snapshot.to_bytes().unwrap();
        let parsed = WorldSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.state_hash, snapshot.state_hash);
        assert_eq!(parsed.players[0].team, 1);
        assert_eq!(parsed.objective.hp, 10000.0);
    }
}
