//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ algorithm for fast, high-quality, deterministic randomness.
//! Given the same seed, produces identical sequence on all platforms.
//!
//! The simulation draws every random value (spawn jitter, level-up choices,
//! bot upgrade picks) from one world-owned instance so a match can be replayed
//! from its seed and command log.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use super::vec2::Vec2;

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use radial_siege::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        (self.next_u64() % max as u64) as u32
    }

    /// Generate a float in [0, 1).
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        // 24 high bits fill the f32 mantissa exactly
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Generate a float in [min, max).
    #[inline]
    pub fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        if min >= max {
            return min;
        }
        min + self.next_f32() * (max - min)
    }

    /// Random offset with each component in [-amount, amount).
    pub fn jitter(&mut self, amount: f32) -> Vec2 {
        let x = self.range_f32(-amount, amount);
        let y = self.range_f32(-amount, amount);
        Vec2::new(x, y)
    }

    /// Draw two distinct elements (by position) from a slice.
    ///
    /// Returns `None` when the slice holds fewer than two elements.
    pub fn choose_two<T: Copy>(&mut self, slice: &[T]) -> Option<[T; 2]> {
        if slice.len() < 2 {
            return None;
        }
        let first = self.next_int(slice.len() as u32) as usize;
        // Draw from the remaining n-1 slots and skip over `first`
        let mut second = self.next_int(slice.len() as u32 - 1) as usize;
        if second >= first {
            second += 1;
        }
        Some([slice[first], slice[second]])
    }

    /// Get current state (for checkpointing/debugging).
    pub fn state(&self) -> [u64; 2] {
        self.state
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a match seed from the room id and its roster.
///
/// `player_ids` are sorted before hashing so join order does not change
/// the seed.
pub fn derive_match_seed(match_id: &str, player_ids: &[&str]) -> u64 {
    let mut sorted: Vec<&str> = player_ids.to_vec();
    sorted.sort_unstable();

    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"RADIAL_SIEGE_SEED_V1");
    hasher.update(match_id.as_bytes());
    for pid in sorted {
        // Length prefix keeps ("ab","c") distinct from ("a","bc")
        hasher.update((pid.len() as u32).to_le_bytes());
        hasher.update(pid.as_bytes());
    }

    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================
