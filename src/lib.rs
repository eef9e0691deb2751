//! # Radial Siege Game Server
//!
//! Authoritative simulation for Radial Siege, a four-team arena where
//! players, bots and minion waves push lanes toward a shared central
//! objective.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   RADIAL SIEGE SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── vec2.rs     - 2D vector math                            │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── hash.rs     - SHA-256 state hashing                     │
//! │                                                              │
//! │  game/           - Match simulation (deterministic)          │
//! │  ├── state.rs    - World, players, minions, structures       │
//! │  ├── input.rs    - Commands, input queue, replay log         │
//! │  ├── tick.rs     - Per-tick pipeline                         │
//! │  ├── minion_ai.rs, bot_ai.rs - Unit behavior                 │
//! │  ├── combat.rs, structures.rs - Damage and projectiles       │
//! │  └── waves.rs, win.rs, leveling.rs                           │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── protocol.rs - Message types                             │
//! │  └── session.rs  - Rooms and the tick driver                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! The `core/` and `game/` modules never read a clock or iterate a hash
//! map, and draw all randomness from the world's seeded RNG. Given the same
//! seed, roster and command log, [`game::replay_match`] reproduces a match
//! down to its state hash.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use core::vec2::Vec2;
pub use game::config::MatchConfig;
pub use game::input::{InputLog, InputQueue, PlayerCommand};
pub use game::state::{MatchPhase, PlayerId, TeamIndex, WorldState};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default simulation tick rate (Hz)
pub const TICK_RATE: u32 = 20;
