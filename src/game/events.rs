//! Game Events
//!
//! Notable state transitions collected during a tick. The session layer
//! turns some of them into outbound messages (level-up prompts, game over);
//! the rest exist for logs and replay inspection.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use crate::game::leveling::UpgradeKind;
use crate::game::state::{PlayerId, TeamIndex};

/// Which spawner produced a minion wave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveKind {
    /// Per-team wave from a base
    Base,
    /// Neutral wave from the objective
    Objective,
    /// Neutral wave from lane towers
    Tower,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEventData {
    /// Player hp reached zero
    PlayerKilled {
        victim: PlayerId,
        /// Player credited with the kill, if any
        killer: Option<PlayerId>,
        respawn_ms: f32,
    },

    /// Player came back at their base
    PlayerRespawned { player: PlayerId },

    /// Base hp reached zero
    BaseDestroyed {
        team: TeamIndex,
        captured_by: Option<TeamIndex>,
    },

    /// Lane tower hp reached zero
    TowerDestroyed { lane_team: TeamIndex },

    /// Team lost its base and every living player
    TeamEliminated { team: TeamIndex },

    /// Minions spawned on a wave timer
    WaveSpawned { kind: WaveKind, count: u32 },

    /// Player reached a new level
    LevelUp {
        player: PlayerId,
        level: u32,
        choices: [UpgradeKind; 2],
        is_bot: bool,
    },

    /// Upgrade applied to a player
    UpgradeApplied { player: PlayerId, kind: UpgradeKind },

    /// Match finished
    MatchEnded {
        winner_team: TeamIndex,
        damage_by_team: BTreeMap<TeamIndex, f32>,
    },
}

/// A game event stamped with its tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u64,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u64, data: GameEventData) -> Self {
        Self { tick, data }
    }

    /// Player involved, if any.
    pub fn player(&self) -> Option<&PlayerId> {
        match &self.data {
            GameEventData::PlayerKilled { victim, .. } => Some(victim),
            GameEventData::PlayerRespawned { player }
            | GameEventData::LevelUp { player, .. }
            | GameEventData::UpgradeApplied { player, .. } => Some(player),
            _ => None,
        }
    }

    /// Create player killed event.
    pub fn player_killed(tick: u64, victim: PlayerId, killer: Option<PlayerId>, respawn_ms: f32) -> Self {
        Self::new(tick, GameEventData::PlayerKilled { victim, killer, respawn_ms })
    }

    /// Create base destroyed event.
    pub fn base_destroyed(tick: u64, team: TeamIndex, captured_by: Option<TeamIndex>) -> Self {
        Self::new(tick, GameEventData::BaseDestroyed { team, captured_by })
    }

    /// Create level up event.
    pub fn level_up(tick: u64, player: PlayerId, level: u32, choices: [UpgradeKind; 2], is_bot: bool) -> Self {
        Self::new(tick, GameEventData::LevelUp { player, level, choices, is_bot })
    }

    /// Create match ended event.
    pub fn match_ended(tick: u64, winner_team: TeamIndex, damage_by_team: BTreeMap<TeamIndex, f32>) -> Self {
        Self::new(tick, GameEventData::MatchEnded { winner_team, damage_by_team })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_player_lookup() {
        let victim = PlayerId::from("p1");
        let event = GameEvent::player_killed(10, victim.clone(), None, 6000.0);
        assert_eq!(event.player(), Some(&victim));

        let event = GameEvent::base_destroyed(10, 2, Some(1));
        assert_eq!(event.player(), None);
    }

    #[test]
    fn test_event_json_shape() {
        let event = GameEvent::base_destroyed(42, 2, Some(1));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"base_destroyed\""));
        assert!(json.contains("\"captured_by\":1"));
    }
}
