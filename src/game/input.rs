//! Player Commands and the Input Queue
//!
//! Commands arrive asynchronously from connections and are only buffered
//! here. The tick drains the queue once, applies every command in arrival
//! order, and the queue starts empty for the next tick.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::config::MatchConfig;
use crate::game::leveling::{self, UpgradeKind};
use crate::game::state::{PlayerId, WorldState};
use crate::game::target::TargetRef;

/// Commands beyond this many per player per tick are dropped.
pub const MAX_COMMANDS_PER_TICK: usize = 32;

// =============================================================================
// COMMANDS
// =============================================================================

/// A player command as sent by a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerCommand {
    /// Walk to a point; cancels the attack target
    Move { x: f32, y: f32 },
    /// Lock an attack target
    Attack {
        #[serde(rename = "targetId")]
        target_id: String,
    },
    /// Reserved
    Ability {
        #[serde(rename = "targetX", default)]
        target_x: f32,
        #[serde(rename = "targetY", default)]
        target_y: f32,
    },
    /// Hold position and drop the target
    Stop,
    /// Resolve the oldest pending level-up with one of its two offers
    ChooseUpgrade { choice: String },
}

/// Apply one command to its player.
///
/// Unknown players, and non-finite coordinates, are ignored. Dead players
/// can still pick upgrades but nothing else.
pub fn apply_command(world: &mut WorldState, player_id: &PlayerId, command: &PlayerCommand, config: &MatchConfig) {
    if let PlayerCommand::ChooseUpgrade { choice } = command {
        if let Some(kind) = UpgradeKind::parse(choice) {
            leveling::choose_upgrade(world, player_id, kind, config);
        }
        return;
    }

    let Some(player) = world.players.get_mut(player_id) else {
        return;
    };
    if !player.alive {
        return;
    }

    match command {
        PlayerCommand::Move { x, y } => {
            let goal = Vec2::new(*x, *y);
            if !goal.is_finite() {
                return;
            }
            player.goal = goal;
            player.attack_target = None;
        }
        PlayerCommand::Attack { target_id } => {
            player.attack_target = TargetRef::parse(target_id);
            player.goal = player.position;
        }
        PlayerCommand::Ability { .. } => {}
        PlayerCommand::Stop => {
            player.goal = player.position;
            player.attack_target = None;
        }
        PlayerCommand::ChooseUpgrade { .. } => {}
    }
}

// =============================================================================
// QUEUE
// =============================================================================

/// Per-player command buffers awaiting the next tick.
#[derive(Clone, Debug, Default)]
pub struct InputQueue {
    pending: BTreeMap<PlayerId, Vec<PlayerCommand>>,
}

impl InputQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a command for the next tick.
    pub fn push(&mut self, player_id: PlayerId, command: PlayerCommand) {
        let queue = self.pending.entry(player_id).or_default();
        if queue.len() < MAX_COMMANDS_PER_TICK {
            queue.push(command);
        }
    }

    /// Number of buffered commands.
    pub fn len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.values().all(Vec::is_empty)
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Take all buffered commands, each player's in arrival order.
    pub fn drain(&mut self) -> Vec<(PlayerId, PlayerCommand)> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .flat_map(|(id, cmds)| cmds.into_iter().map(move |c| (id.clone(), c)))
            .collect()
    }

    /// Drain the queue into the world. Returns what was applied.
    pub fn apply_all(&mut self, world: &mut WorldState, config: &MatchConfig) -> Vec<(PlayerId, PlayerCommand)> {
        let drained = self.drain();
        for (id, command) in &drained {
            apply_command(world, id, command, config);
        }
        drained
    }
}

// =============================================================================
// REPLAY LOG
// =============================================================================

/// A command applied on a specific tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggedCommand {
    /// Tick the command was applied on
    pub tick: u64,
    /// Issuing player
    pub player_id: PlayerId,
    /// The command
    pub command: PlayerCommand,
}

/// Every command a match applied, for deterministic replay.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InputLog {
    /// RNG seed of the recorded match
    pub rng_seed: u64,
    entries: Vec<LoggedCommand>,
}

impl InputLog {
    /// Create an empty log for a seed.
    pub fn new(rng_seed: u64) -> Self {
        Self { rng_seed, entries: Vec::new() }
    }

    /// Record commands applied on `tick`.
    pub fn record(&mut self, tick: u64, applied: &[(PlayerId, PlayerCommand)]) {
        self.entries.extend(applied.iter().map(|(id, c)| LoggedCommand {
            tick,
            player_id: id.clone(),
            command: c.clone(),
        }));
    }

    /// Commands applied on `tick`, in order.
    pub fn commands_at(&self, tick: u64) -> impl Iterator<Item = &LoggedCommand> {
        self.entries.iter().filter(move |e| e.tick == tick)
    }

    /// All entries.
    pub fn entries(&self) -> &[LoggedCommand] {
        &self.entries
    }

    /// Encode as JSON for storage.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// =============================================================================
// TESTS
// =============================================================================
