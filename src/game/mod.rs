//! Game Logic Module
//!
//! The whole match simulation. Nothing in here does I/O or reads a clock;
//! given the same seed, roster and commands it produces the same world.
//!
//! ## Module Structure
//!
//! - `config`: Match tuning, loadable from JSON
//! - `map`: Radial layout of spawns, bases, towers and lanes
//! - `state`: World state and every entity in it
//! - `target`: Attack target references and their resolution
//! - `input`: Player commands, the per-tick input queue, replay log
//! - `movement`: Player movement
//! - `minion_ai`: Minion state machine
//! - `bot_ai`: Bot decision ladder
//! - `collision`: Circle separation
//! - `combat`: Damage, regen, respawns, player and minion attacks
//! - `structures`: Structure fire and projectiles
//! - `leveling`: XP, level-ups and upgrades
//! - `waves`: Minion wave schedules
//! - `win`: Win conditions
//! - `events`: Notable state transitions
//! - `tick`: The per-tick pipeline

pub mod bot_ai;
pub mod collision;
pub mod combat;
pub mod config;
pub mod events;
pub mod input;
pub mod leveling;
pub mod map;
pub mod minion_ai;
pub mod movement;
pub mod state;
pub mod structures;
pub mod target;
pub mod tick;
pub mod waves;
pub mod win;

// Re-export key types
pub use config::{ConfigError, MatchConfig};
pub use events::{GameEvent, GameEventData, WaveKind};
pub use input::{InputLog, InputQueue, PlayerCommand};
pub use leveling::UpgradeKind;
pub use state::{MatchPhase, MinionId, PlayerId, TeamIndex, WorldState};
pub use target::TargetRef;
pub use tick::{replay_match, start_match, tick, TickResult};
