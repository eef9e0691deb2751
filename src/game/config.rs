//! Match Tuning
//!
//! Every number the simulation reads lives here. All structs implement
//! `Default` with the reference tuning and deserialize with `#[serde(default)]`,
//! so a JSON file only needs to name the values it overrides.
//!
//! Time values are milliseconds; speeds are units per second; distances are
//! world units.

use std::path::Path;

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Errors raised while loading a tuning file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid tuning JSON
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),

    /// Values parse but cannot drive a match
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full simulation configuration for one match.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Ticks per second
    pub tick_rate: u32,
    /// Map geometry
    pub map: MapConfig,
    /// Player stats
    pub player: PlayerConfig,
    /// Minion stats
    pub minions: MinionConfig,
    /// Base, tower, objective and projectile stats
    pub structures: StructureConfig,
    /// Health regeneration
    pub regen: RegenConfig,
    /// XP and upgrades
    pub leveling: LevelingConfig,
    /// Bot decision tuning
    pub bots: BotConfig,
    /// Minion wave schedule
    pub waves: WaveConfig,
    /// Entity caps
    pub limits: LimitsConfig,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            tick_rate: crate::TICK_RATE,
            map: MapConfig::default(),
            player: PlayerConfig::default(),
            minions: MinionConfig::default(),
            structures: StructureConfig::default(),
            regen: RegenConfig::default(),
            leveling: LevelingConfig::default(),
            bots: BotConfig::default(),
            waves: WaveConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl MatchConfig {
    /// Parse a (partial) JSON tuning document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a (partial) JSON tuning file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick_rate must be positive".into()));
        }
        if self.map.num_teams < 2 {
            return Err(ConfigError::Invalid("num_teams must be at least 2".into()));
        }
        if self.map.radius <= 0.0 {
            return Err(ConfigError::Invalid("map radius must be positive".into()));
        }
        if self.leveling.max_level == 0 {
            return Err(ConfigError::Invalid("max_level must be at least 1".into()));
        }
        Ok(())
    }

    /// Seconds per tick.
    #[inline]
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Milliseconds per tick.
    #[inline]
    pub fn dt_ms(&self) -> f32 {
        1000.0 / self.tick_rate as f32
    }
}

/// Map geometry. Teams sit on evenly spaced bearings around the center.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Map radius; the center is at `(radius, radius)`
    pub radius: f32,
    /// Number of teams
    pub num_teams: u8,
    /// Player spawn ring as a fraction of the radius
    pub spawn_ring: f32,
    /// Base ring as a fraction of the radius
    pub base_ring: f32,
    /// Lane tower ring as a fraction of the radius
    pub tower_ring: f32,
    /// Team display colors (RGB)
    pub team_colors: Vec<u32>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            radius: 2000.0,
            num_teams: 4,
            spawn_ring: 0.75,
            base_ring: 0.85,
            tower_ring: 0.5,
            team_colors: vec![0xff4444, 0x4444ff, 0x44ff44, 0xffff44],
        }
    }
}

/// Player stats.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Starting max hp
    pub max_hp: f32,
    /// Movement speed
    pub speed: f32,
    /// Auto-attack damage
    pub attack_damage: f32,
    /// Auto-attack range (edge padding is added for structures)
    pub attack_range: f32,
    /// Auto-attack cooldown (ms)
    pub attack_cooldown_ms: f32,
    /// Ability cooldown (ms)
    pub ability_cooldown_ms: f32,
    /// Respawn delay before the per-death penalty (ms)
    pub respawn_base_ms: f32,
    /// Extra respawn delay per death (ms)
    pub respawn_per_death_ms: f32,
    /// Respawn position jitter
    pub respawn_jitter: f32,
    /// Collision radius
    pub radius: f32,
    /// Humans per team before bots fill the rest
    pub players_per_team: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_hp: 500.0,
            speed: 150.0,
            attack_damage: 50.0,
            attack_range: 60.0,
            attack_cooldown_ms: 1000.0,
            ability_cooldown_ms: 5000.0,
            respawn_base_ms: 5000.0,
            respawn_per_death_ms: 1000.0,
            respawn_jitter: 20.0,
            radius: 16.0,
            players_per_team: 3,
        }
    }
}

/// Stats for one minion type.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MinionStats {
    /// Max hp
    pub max_hp: f32,
    /// Hit damage
    pub attack_damage: f32,
    /// Attack range
    pub attack_range: f32,
    /// Attack cooldown (ms)
    pub attack_cooldown_ms: f32,
    /// Aggro scan range
    pub aggro_range: f32,
    /// Collision radius
    pub radius: f32,
}

impl Default for MinionStats {
    fn default() -> Self {
        MinionConfig::default_melee()
    }
}

/// Minion stats by type.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MinionConfig {
    /// Walking speed (shared)
    pub speed: f32,
    /// Melee minion stats
    pub melee: MinionStats,
    /// Caster minion stats
    pub caster: MinionStats,
    /// Disengage when the target drifts beyond aggro range times this
    pub leash_factor: f32,
    /// Distance at which a lane goal counts as reached
    pub arrive_distance: f32,
}

impl MinionConfig {
    fn default_melee() -> MinionStats {
        MinionStats {
            max_hp: 200.0,
            attack_damage: 20.0,
            attack_range: 40.0,
            attack_cooldown_ms: 1500.0,
            aggro_range: 150.0,
            radius: 12.0,
        }
    }

    fn default_caster() -> MinionStats {
        MinionStats {
            max_hp: 120.0,
            attack_damage: 25.0,
            attack_range: 120.0,
            attack_cooldown_ms: 1800.0,
            aggro_range: 180.0,
            radius: 10.0,
        }
    }
}

impl Default for MinionConfig {
    fn default() -> Self {
        Self {
            speed: 80.0,
            melee: Self::default_melee(),
            caster: Self::default_caster(),
            leash_factor: 1.5,
            arrive_distance: 5.0,
        }
    }
}

/// Stats for one structure kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureStats {
    /// Max hp
    pub max_hp: f32,
    /// Collision and targeting radius
    pub radius: f32,
    /// Attack range (measured from the structure's edge)
    pub attack_range: f32,
    /// Projectile damage
    pub attack_damage: f32,
    /// Attack cooldown (ms)
    pub attack_cooldown_ms: f32,
}

impl Default for StructureStats {
    fn default() -> Self {
        StructureConfig::default_tower()
    }
}

/// Structure and projectile tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Team bases
    pub base: StructureStats,
    /// Lane towers
    pub tower: StructureStats,
    /// Central objective
    pub objective: StructureStats,
    /// Projectile speed
    pub projectile_speed: f32,
    /// Extra arrival distance beyond one tick of travel
    pub projectile_slack: f32,
}

impl StructureConfig {
    fn default_tower() -> StructureStats {
        StructureStats {
            max_hp: 2000.0,
            radius: 32.0,
            attack_range: 200.0,
            attack_damage: 50.0,
            attack_cooldown_ms: 1200.0,
        }
    }
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            base: StructureStats {
                max_hp: 3000.0,
                radius: 48.0,
                attack_range: 220.0,
                attack_damage: 60.0,
                attack_cooldown_ms: 1200.0,
            },
            tower: Self::default_tower(),
            objective: StructureStats {
                max_hp: 10000.0,
                radius: 64.0,
                attack_range: 250.0,
                attack_damage: 40.0,
                attack_cooldown_ms: 1500.0,
            },
            projectile_speed: 400.0,
            projectile_slack: 5.0,
        }
    }
}

/// Player health regeneration (hp per second).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RegenConfig {
    /// Everywhere
    pub base_per_sec: f32,
    /// Near the player's own intact base (replaces the baseline)
    pub near_base_per_sec: f32,
    /// Distance from the base center that counts as near
    pub base_proximity: f32,
}

impl Default for RegenConfig {
    fn default() -> Self {
        Self {
            base_per_sec: 2.0,
            near_base_per_sec: 25.0,
            base_proximity: 300.0,
        }
    }
}

/// XP rewards, level curve and upgrade increments.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelingConfig {
    /// Highest attainable level
    pub max_level: u32,
    /// XP for level 1 -> 2
    pub xp_base: u32,
    /// Additional XP per level after the first
    pub xp_per_level: u32,
    /// XP for killing a player
    pub xp_player_kill: u32,
    /// XP for killing a minion
    pub xp_minion_kill: u32,
    /// XP per hit on a structure
    pub xp_structure_hit: u32,
    /// Damage upgrade increment
    pub damage_increment: f32,
    /// Max hp upgrade increment
    pub max_hp_increment: f32,
    /// Speed upgrade increment
    pub speed_increment: f32,
    /// Regen upgrade increment (hp/s)
    pub regen_increment: f32,
    /// Defense upgrade increment
    pub defense_increment: f32,
}

impl Default for LevelingConfig {
    fn default() -> Self {
        Self {
            max_level: 10,
            xp_base: 100,
            xp_per_level: 50,
            xp_player_kill: 100,
            xp_minion_kill: 20,
            xp_structure_hit: 5,
            damage_increment: 10.0,
            max_hp_increment: 50.0,
            speed_increment: 15.0,
            regen_increment: 2.0,
            defense_increment: 5.0,
        }
    }
}

/// Bot decision tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Fill teams up to `players_per_team` with bots at match start
    pub fill_teams: bool,
    /// Minimum time a chosen target is held (ms)
    pub decision_interval_ms: f32,
    /// Retreat below this fraction of max hp
    pub retreat_fraction: f32,
    /// Enemy units this close to the own base trigger defense
    pub defend_radius: f32,
    /// Range for acquiring enemy players and minions
    pub scan_range: f32,
    /// Players this close are taken regardless of lane, as a multiple of attack range
    pub close_override_factor: f32,
    /// A friendly minion this close to a structure counts as an escort
    pub escort_radius: f32,
    /// Extra distance kept outside a structure's reach when unescorted
    pub standoff_buffer: f32,
    /// Forward waypoint as a fraction of the map radius from the center
    pub waypoint_ring: f32,
    /// Distance at which the forward waypoint counts as reached
    pub waypoint_arrive: f32,
    /// Lane wedge half-width is PI / (num_teams * this)
    pub lane_width_factor: f32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            fill_teams: true,
            decision_interval_ms: 2000.0,
            retreat_fraction: 0.3,
            defend_radius: 350.0,
            scan_range: 400.0,
            close_override_factor: 3.0,
            escort_radius: 200.0,
            standoff_buffer: 30.0,
            waypoint_ring: 0.25,
            waypoint_arrive: 300.0,
            lane_width_factor: 0.8,
        }
    }
}

/// Composition of one spawn group.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveComposition {
    /// Melee minions in the front rank
    pub melee: u32,
    /// Casters in the back rank
    pub casters: u32,
}

impl Default for WaveComposition {
    fn default() -> Self {
        Self { melee: 3, casters: 2 }
    }
}

/// Minion wave schedule.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    /// Interval between base waves (ms)
    pub base_interval_ms: f32,
    /// Interval between neutral objective waves (ms)
    pub objective_interval_ms: f32,
    /// Interval between neutral tower waves (ms)
    pub tower_interval_ms: f32,
    /// Per-team base wave
    pub base_wave: WaveComposition,
    /// Objective wave, per targeted base
    pub objective_wave: WaveComposition,
    /// Tower wave, per tower
    pub tower_wave: WaveComposition,
    /// Spacing between minions in a rank
    pub rank_spacing: f32,
    /// Distance between the front and back rank
    pub rank_depth: f32,
    /// Spawn position jitter
    pub jitter: f32,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 30000.0,
            objective_interval_ms: 45000.0,
            tower_interval_ms: 40000.0,
            base_wave: WaveComposition { melee: 3, casters: 2 },
            objective_wave: WaveComposition { melee: 2, casters: 1 },
            tower_wave: WaveComposition { melee: 2, casters: 1 },
            rank_spacing: 20.0,
            rank_depth: 40.0,
            jitter: 3.0,
        }
    }
}

/// Caps that bound entity accumulation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Wave spawns stop once this many minions are alive
    pub max_minions: usize,
    /// Structures hold fire once this many projectiles are in flight
    pub max_projectiles: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_minions: 240,
            max_projectiles: 256,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.dt_ms(), 50.0);
        assert_eq!(config.map.team_colors.len(), config.map.num_teams as usize);
    }

    #[test]
    fn test_partial_json_overrides() {
        let json = r#"{ "tick_rate": 30, "player": { "max_hp": 800 }, "bots": { "fill_teams": false } }"#;
        let config = MatchConfig::from_json_str(json).unwrap();

        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.player.max_hp, 800.0);
        assert!(!config.bots.fill_teams);
        // Untouched values keep their defaults
        assert_eq!(config.player.speed, 150.0);
        assert_eq!(config.structures.objective.max_hp, 10000.0);
    }

    #[test]
    fn test_rejects_zero_tick_rate() {
        let err = MatchConfig::from_json_str(r#"{ "tick_rate": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_json() {
        let err = MatchConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = MatchConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
