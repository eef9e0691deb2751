//! World State
//!
//! Every entity of a match lives in one `WorldState`, owned by the tick
//! driver. Entities are id-keyed `BTreeMap`s so iteration order is stable and
//! all cross-entity links are ids resolved through `game::target`.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::core::rng::DeterministicRng;
use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::game::config::{MatchConfig, MinionStats};
use crate::game::events::GameEvent;
use crate::game::leveling::UpgradeKind;
use crate::game::map;
use crate::game::target::TargetRef;

/// Team index, `0..num_teams`.
pub type TeamIndex = u8;

// =============================================================================
// IDS
// =============================================================================

/// Player identifier (session id for humans, `bot_<team>_<n>` for bots).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minion identifier; renders as `minion_<n>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MinionId(pub u64);

impl MinionId {
    /// Parse the `minion_<n>` wire form.
    pub fn parse(s: &str) -> Option<Self> {
        s.strip_prefix("minion_")?.parse().ok().map(Self)
    }
}

impl fmt::Display for MinionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "minion_{}", self.0)
    }
}

/// Projectile identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectileId(pub u64);

/// Monotonic id source owned by the world.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdAllocator {
    next_minion: u64,
    next_projectile: u64,
}

impl IdAllocator {
    /// Allocate a fresh minion id.
    pub fn minion(&mut self) -> MinionId {
        let id = MinionId(self.next_minion);
        self.next_minion += 1;
        id
    }

    /// Allocate a fresh projectile id.
    pub fn projectile(&mut self) -> ProjectileId {
        let id = ProjectileId(self.next_projectile);
        self.next_projectile += 1;
        id
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// Additive stat bonuses bought with level-up upgrades.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BonusStats {
    /// Added to attack damage
    pub damage: f32,
    /// Added to max hp
    pub max_hp: f32,
    /// Added to movement speed
    pub speed: f32,
    /// Added to regen (hp/s)
    pub regen: f32,
    /// Subtracted from incoming damage
    pub defense: f32,
}

/// A player (human or bot).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    /// Unique player ID
    pub id: PlayerId,
    /// Team
    pub team: TeamIndex,
    /// Current position
    pub position: Vec2,
    /// Movement goal when no attack target is set
    pub goal: Vec2,
    /// Current attack target
    pub attack_target: Option<TargetRef>,
    /// Current hp
    pub hp: f32,
    /// Max hp including bonus
    pub max_hp: f32,
    /// Attack cooldown remaining (ms)
    pub attack_cooldown: f32,
    /// Ability cooldown remaining (ms)
    pub ability_cooldown: f32,
    /// Alive flag
    pub alive: bool,
    /// Respawn countdown (ms); zero while alive or when respawn is blocked
    pub respawn_timer: f32,
    /// Death count
    pub deaths: u32,
    /// Landed an auto-attack this tick
    pub is_attacking: bool,
    /// Controlled by bot AI
    pub is_bot: bool,
    /// Current level
    pub level: u32,
    /// XP toward the next level
    pub xp: u32,
    /// XP needed for the next level
    pub xp_to_next_level: u32,
    /// Upgrade bonuses
    pub bonus: BonusStats,
    /// Bot decision timer (ms)
    #[serde(skip)]
    pub bot_decision_timer: f32,
    /// Upgrade pairs awaiting a choice, oldest first
    #[serde(skip)]
    pub pending_level_ups: VecDeque<[UpgradeKind; 2]>,
}

impl Player {
    /// Create a player at a spawn position.
    pub fn new(id: PlayerId, team: TeamIndex, position: Vec2, is_bot: bool, config: &MatchConfig) -> Self {
        Self {
            id,
            team,
            position,
            goal: position,
            attack_target: None,
            hp: config.player.max_hp,
            max_hp: config.player.max_hp,
            attack_cooldown: 0.0,
            ability_cooldown: 0.0,
            alive: true,
            respawn_timer: 0.0,
            deaths: 0,
            is_attacking: false,
            is_bot,
            level: 1,
            xp: 0,
            xp_to_next_level: config.leveling.xp_base,
            bonus: BonusStats::default(),
            bot_decision_timer: 0.0,
            pending_level_ups: VecDeque::new(),
        }
    }

    /// Movement speed including bonus.
    #[inline]
    pub fn speed(&self, config: &MatchConfig) -> f32 {
        config.player.speed + self.bonus.speed
    }

    /// Auto-attack damage including bonus.
    #[inline]
    pub fn attack_damage(&self, config: &MatchConfig) -> f32 {
        config.player.attack_damage + self.bonus.damage
    }

    /// Whether a level-up choice is waiting.
    #[inline]
    pub fn has_pending_level_up(&self) -> bool {
        !self.pending_level_ups.is_empty()
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_str(self.id.as_str());
        hasher.update_u8(self.team);
        hasher.update_vec2(self.position);
        hasher.update_vec2(self.goal);
        hasher.update_str(&self.attack_target.as_ref().map(|t| t.to_string()).unwrap_or_default());
        hasher.update_f32(self.hp);
        hasher.update_f32(self.max_hp);
        hasher.update_f32(self.attack_cooldown);
        hasher.update_f32(self.ability_cooldown);
        hasher.update_bool(self.alive);
        hasher.update_bool(self.is_attacking);
        hasher.update_f32(self.respawn_timer);
        hasher.update_u32(self.deaths);
        hasher.update_u32(self.level);
        hasher.update_u32(self.xp);
        hasher.update_f32(self.bonus.damage);
        hasher.update_f32(self.bonus.max_hp);
        hasher.update_f32(self.bonus.speed);
        hasher.update_f32(self.bonus.regen);
        hasher.update_f32(self.bonus.defense);
        hasher.update_f32(self.bot_decision_timer);
        hasher.update_u32(self.pending_level_ups.len() as u32);
    }
}

// =============================================================================
// MINIONS & PROJECTILES
// =============================================================================

/// Minion type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinionKind {
    /// Short range, instant hits
    Melee,
    /// Ranged; fires projectiles at units
    Caster,
}

impl MinionKind {
    /// Stats for this type.
    #[inline]
    pub fn stats(self, config: &MatchConfig) -> &MinionStats {
        match self {
            MinionKind::Melee => &config.minions.melee,
            MinionKind::Caster => &config.minions.caster,
        }
    }
}

/// Minion AI state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinionState {
    /// Just created
    Spawning,
    /// Following the lane goal
    Walking,
    /// Locked on a target
    Attacking,
    /// Terminal
    Dead,
}

/// A lane minion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Minion {
    /// Unique id
    pub id: MinionId,
    /// Melee or caster
    pub kind: MinionKind,
    /// Owning team; `None` for neutral minions
    pub team: Option<TeamIndex>,
    /// Current position
    pub position: Vec2,
    /// Current hp
    pub hp: f32,
    /// Max hp
    pub max_hp: f32,
    /// AI state
    pub state: MinionState,
    /// Locked attack target
    pub target: Option<TargetRef>,
    /// Base this minion marches on instead of the center
    pub goal_base: Option<TeamIndex>,
    /// Attack cooldown remaining (ms)
    pub attack_cooldown: f32,
    /// Collision radius
    pub radius: f32,
}

impl Minion {
    /// Whether the minion still counts as present.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.hp > 0.0 && self.state != MinionState::Dead
    }
}

/// A structure or caster shot homing on a unit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Projectile {
    /// Unique id
    pub id: ProjectileId,
    /// Current position
    pub position: Vec2,
    /// Where it was fired from
    pub origin: Vec2,
    /// Homing target
    pub target: TargetRef,
    /// Damage on impact
    pub damage: f32,
    /// Travel speed
    pub speed: f32,
    /// Team credited with the hit
    pub source_team: Option<TeamIndex>,
}

// =============================================================================
// STRUCTURES
// =============================================================================

/// A team base.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Base {
    /// Original owner
    pub team: TeamIndex,
    /// Position
    pub position: Vec2,
    /// Current hp
    pub hp: f32,
    /// Max hp
    pub max_hp: f32,
    /// Collision radius
    pub radius: f32,
    /// Destroyed flag (one-way)
    pub destroyed: bool,
    /// Team that landed the killing blow, if not neutral
    pub captured_by: Option<TeamIndex>,
    /// Attack cooldown remaining (ms)
    pub attack_cooldown: f32,
}

impl Base {
    /// Team the base currently works for.
    #[inline]
    pub fn owner(&self) -> TeamIndex {
        self.captured_by.unwrap_or(self.team)
    }
}

/// A neutral lane tower.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tower {
    /// Lane it stands in
    pub lane_team: TeamIndex,
    /// Position
    pub position: Vec2,
    /// Current hp
    pub hp: f32,
    /// Max hp
    pub max_hp: f32,
    /// Collision radius
    pub radius: f32,
    /// Destroyed flag (one-way)
    pub destroyed: bool,
    /// Attack cooldown remaining (ms)
    pub attack_cooldown: f32,
}

/// The central objective.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Objective {
    /// Position (map center)
    pub position: Vec2,
    /// Current hp
    pub hp: f32,
    /// Max hp
    pub max_hp: f32,
    /// Collision radius
    pub radius: f32,
    /// Cumulative damage dealt per team
    pub damage_by_team: BTreeMap<TeamIndex, f32>,
    /// Attack cooldown remaining (ms)
    pub attack_cooldown: f32,
}

/// A team.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Team {
    /// Index
    pub index: TeamIndex,
    /// Display color (RGB)
    pub color: u32,
    /// Eliminated flag (one-way)
    pub eliminated: bool,
    /// Roster
    pub players: Vec<PlayerId>,
}

// =============================================================================
// MATCH PHASE
// =============================================================================

/// Current phase of the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Waiting for players
    #[default]
    Waiting,
    /// Active gameplay
    Playing,
    /// Winner decided
    Finished,
}

/// Accumulators for the three wave schedules (ms since last wave).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WaveTimers {
    /// Base waves
    pub base: f32,
    /// Objective waves
    pub objective: f32,
    /// Tower waves
    pub tower: f32,
}

// =============================================================================
// WORLD STATE
// =============================================================================

/// Complete state of a match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldState {
    /// Current tick
    pub tick: u64,
    /// Current phase
    pub phase: MatchPhase,
    /// Winner, once decided
    pub winner: Option<TeamIndex>,
    /// RNG seed (for replay)
    pub rng_seed: u64,
    /// Deterministic RNG
    #[serde(skip)]
    pub rng: DeterministicRng,
    /// All players
    pub players: BTreeMap<PlayerId, Player>,
    /// All minions
    pub minions: BTreeMap<MinionId, Minion>,
    /// Projectiles in flight
    pub projectiles: BTreeMap<ProjectileId, Projectile>,
    /// Teams by index
    pub teams: Vec<Team>,
    /// Bases by owning team
    pub bases: BTreeMap<TeamIndex, Base>,
    /// Towers by lane
    pub towers: BTreeMap<TeamIndex, Tower>,
    /// Central objective
    pub objective: Objective,
    /// Wave schedule accumulators
    pub wave_timers: WaveTimers,
    /// Id source
    #[serde(skip)]
    pub ids: IdAllocator,
    /// Events generated this tick
    #[serde(skip)]
    pub pending_events: Vec<GameEvent>,
}

impl WorldState {
    /// Lay out teams, bases, towers and the objective for a new match.
    pub fn new(config: &MatchConfig, rng_seed: u64) -> Self {
        let map_cfg = &config.map;
        let s = &config.structures;

        let teams = (0..map_cfg.num_teams)
            .map(|index| Team {
                index,
                color: map_cfg.team_colors.get(index as usize).copied().unwrap_or(0xffffff),
                eliminated: false,
                players: Vec::new(),
            })
            .collect();

        let bases = (0..map_cfg.num_teams)
            .map(|team| {
                (team, Base {
                    team,
                    position: map::base_position(map_cfg, team),
                    hp: s.base.max_hp,
                    max_hp: s.base.max_hp,
                    radius: s.base.radius,
                    destroyed: false,
                    captured_by: None,
                    attack_cooldown: 0.0,
                })
            })
            .collect();

        let towers = (0..map_cfg.num_teams)
            .map(|lane| {
                (lane, Tower {
                    lane_team: lane,
                    position: map::tower_position(map_cfg, lane),
                    hp: s.tower.max_hp,
                    max_hp: s.tower.max_hp,
                    radius: s.tower.radius,
                    destroyed: false,
                    attack_cooldown: 0.0,
                })
            })
            .collect();

        let objective = Objective {
            position: map::center(map_cfg),
            hp: s.objective.max_hp,
            max_hp: s.objective.max_hp,
            radius: s.objective.radius,
            damage_by_team: (0..map_cfg.num_teams).map(|t| (t, 0.0)).collect(),
            attack_cooldown: 0.0,
        };

        Self {
            tick: 0,
            phase: MatchPhase::Waiting,
            winner: None,
            rng_seed,
            rng: DeterministicRng::new(rng_seed),
            players: BTreeMap::new(),
            minions: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            teams,
            bases,
            towers,
            objective,
            wave_timers: WaveTimers::default(),
            ids: IdAllocator::default(),
            pending_events: Vec::new(),
        }
    }

    /// Team with the fewest rostered players (lowest index on ties).
    pub fn fewest_players_team(&self) -> TeamIndex {
        self.teams
            .iter()
            .min_by_key(|t| (t.players.len(), t.index))
            .map(|t| t.index)
            .unwrap_or(0)
    }

    /// Add a player at their team's spawn point.
    ///
    /// `team` outside the valid range, or `None`, falls back to the team with
    /// the fewest players. Re-adding an existing id is a no-op.
    pub fn add_player(&mut self, id: PlayerId, team: Option<TeamIndex>, is_bot: bool, config: &MatchConfig) -> PlayerId {
        if self.players.contains_key(&id) {
            return id;
        }
        let team = team
            .filter(|t| (*t as usize) < self.teams.len())
            .unwrap_or_else(|| self.fewest_players_team());
        let spawn = map::spawn_position(&config.map, team);

        self.players.insert(id.clone(), Player::new(id.clone(), team, spawn, is_bot, config));
        if let Some(t) = self.teams.get_mut(team as usize) {
            t.players.push(id.clone());
        }
        id
    }

    /// Create a minion and return its id.
    pub fn spawn_minion(
        &mut self,
        kind: MinionKind,
        team: Option<TeamIndex>,
        position: Vec2,
        goal_base: Option<TeamIndex>,
        config: &MatchConfig,
    ) -> MinionId {
        let id = self.ids.minion();
        let stats = kind.stats(config);
        self.minions.insert(id, Minion {
            id,
            kind,
            team,
            position,
            hp: stats.max_hp,
            max_hp: stats.max_hp,
            state: MinionState::Spawning,
            target: None,
            goal_base,
            attack_cooldown: 0.0,
            radius: stats.radius,
        });
        id
    }

    /// Launch a projectile and return its id.
    pub fn spawn_projectile(
        &mut self,
        origin: Vec2,
        target: TargetRef,
        damage: f32,
        speed: f32,
        source_team: Option<TeamIndex>,
    ) -> ProjectileId {
        let id = self.ids.projectile();
        self.projectiles.insert(id, Projectile {
            id,
            position: origin,
            origin,
            target,
            damage,
            speed,
            source_team,
        });
        id
    }

    /// Intact base of a team.
    #[inline]
    pub fn intact_base(&self, team: TeamIndex) -> Option<&Base> {
        self.bases.get(&team).filter(|b| !b.destroyed)
    }

    /// Living players on a team.
    pub fn alive_player_count(&self, team: TeamIndex) -> usize {
        self.players.values().filter(|p| p.team == team && p.alive).count()
    }

    /// Living minions.
    pub fn alive_minion_count(&self) -> usize {
        self.minions.values().filter(|m| m.is_alive()).count()
    }

    /// Whether a team is still in the match.
    #[inline]
    pub fn is_team_active(&self, team: TeamIndex) -> bool {
        self.teams.get(team as usize).map(|t| !t.eliminated).unwrap_or(false)
    }

    /// Whether the match is over.
    pub fn is_finished(&self) -> bool {
        self.phase == MatchPhase::Finished
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.rng.state(), |hasher| {
            hasher.update_u8(self.phase as u8);
            hasher.update_team(self.winner);

            for player in self.players.values() {
                player.hash_into(hasher);
            }

            for (id, m) in &self.minions {
                hasher.update_u64(id.0);
                hasher.update_u8(m.kind as u8);
                hasher.update_team(m.team);
                hasher.update_vec2(m.position);
                hasher.update_f32(m.hp);
                hasher.update_f32(m.max_hp);
                hasher.update_f32(m.radius);
                hasher.update_u8(m.state as u8);
                hasher.update_team(m.goal_base);
                hasher.update_str(&m.target.as_ref().map(|t| t.to_string()).unwrap_or_default());
                hasher.update_f32(m.attack_cooldown);
            }

            for (id, p) in &self.projectiles {
                hasher.update_u64(id.0);
                hasher.update_vec2(p.position);
                hasher.update_vec2(p.origin);
                hasher.update_str(&p.target.to_string());
                hasher.update_f32(p.damage);
                hasher.update_f32(p.speed);
                hasher.update_team(p.source_team);
            }

            for team in &self.teams {
                hasher.update_u8(team.index);
                hasher.update_bool(team.eliminated);
            }

            for base in self.bases.values() {
                hasher.update_u8(base.team);
                hasher.update_f32(base.hp);
                hasher.update_bool(base.destroyed);
                hasher.update_team(base.captured_by);
                hasher.update_f32(base.attack_cooldown);
            }

            for tower in self.towers.values() {
                hasher.update_u8(tower.lane_team);
                hasher.update_f32(tower.hp);
                hasher.update_bool(tower.destroyed);
                hasher.update_f32(tower.attack_cooldown);
            }

            hasher.update_f32(self.objective.hp);
            hasher.update_f32(self.objective.attack_cooldown);
            for (team, dmg) in &self.objective.damage_by_team {
                hasher.update_u8(*team);
                hasher.update_f32(*dmg);
            }

            hasher.update_f32(self.wave_timers.base);
            hasher.update_f32(self.wave_timers.objective);
            hasher.update_f32(self.wave_timers.tower);
        })
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event stamped with the current tick.
    pub fn push_event(&mut self, data: crate::game::events::GameEventData) {
        self.pending_events.push(GameEvent::new(self.tick, data));
    }
}

// =============================================================================
// TESTS
// =============================================================================
