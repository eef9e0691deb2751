//! State Hashing for Verification
//!
//! Deterministic SHA-256 digests of world state, used to confirm that two
//! runs (or a server and a replay) reached the same state.

use sha2::{Sha256, Digest};
use super::vec2::Vec2;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for game state.
///
/// Wraps SHA-256 with helpers for world types. Floats are hashed by bit
/// pattern. Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for world state.
    pub fn for_world_state() -> Self {
        Self::new(b"RADIAL_SIEGE_STATE_V1")
    }

    /// Update with a length-prefixed string.
    #[inline]
    pub fn update_str(&mut self, value: &str) {
        self.update_u32(value.len() as u32);
        self.hasher.update(value.as_bytes());
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an f32 by bit pattern.
    #[inline]
    pub fn update_f32(&mut self, value: f32) {
        self.update_u32(value.to_bits());
    }

    /// Update with a Vec2.
    #[inline]
    pub fn update_vec2(&mut self, value: Vec2) {
        self.update_f32(value.x);
        self.update_f32(value.y);
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with an optional team index (`0xFF` for none).
    #[inline]
    pub fn update_team(&mut self, team: Option<u8>) {
        self.update_u8(team.unwrap_or(u8::MAX));
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute state hash for replay verification.
///
/// Called by `WorldState::compute_hash()`. The closure adds the
/// entity data after the tick and RNG state.
pub fn compute_state_hash<F>(tick: u64, rng_state: [u64; 2], add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_world_state();

    hasher.update_u64(tick);
    hasher.update_u64(rng_state[0]);
    hasher.update_u64(rng_state[1]);

    add_state(&mut hasher);

    hasher.finalize()
}

// =============================================================================
// TESTS
// =============================================================================
