//! Combat Resolution
//!
//! Cooldowns, regeneration, player auto-attacks, respawns, minion attacks
//! and the shared damage path. Structure fire and projectile flight live in
//! `game::structures` but are driven from [`update_combat`] so the whole
//! damage step runs as one phase.

use tracing::{debug, info};

use crate::game::config::MatchConfig;
use crate::game::events::GameEventData;
use crate::game::leveling::award_xp;
use crate::game::state::{MinionKind, MinionState, PlayerId, TeamIndex, WorldState};
use crate::game::structures::{update_projectiles, update_structure_attacks};
use crate::game::target::{is_hostile, resolve, TargetKind, TargetRef};

// =============================================================================
// DAMAGE
// =============================================================================

/// Who dealt a hit.
#[derive(Clone, Debug, Default)]
pub struct DamageSource {
    /// Attacking side (`None` = neutral)
    pub team: Option<TeamIndex>,
    /// Player credited for XP, if the hit came from a player
    pub player: Option<PlayerId>,
}

impl DamageSource {
    /// Hit from a player.
    pub fn player(id: PlayerId, team: TeamIndex) -> Self {
        Self { team: Some(team), player: Some(id) }
    }

    /// Hit from a minion, structure or projectile.
    pub fn team(team: Option<TeamIndex>) -> Self {
        Self { team, player: None }
    }
}

/// What a hit did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Target was already gone
    NoEffect,
    /// Damage landed
    Hit,
    /// Damage landed and finished the target
    Killed,
}

/// Damage actually taken by a player after defense (at least 1).
#[inline]
pub fn mitigated_damage(amount: f32, defense: f32) -> f32 {
    (amount - defense).max(1.0)
}

/// Apply one hit to a target and award XP to the attacking player.
///
/// Dead, destroyed or unknown targets take nothing.
pub fn apply_damage(
    world: &mut WorldState,
    target: &TargetRef,
    amount: f32,
    source: &DamageSource,
    config: &MatchConfig,
) -> DamageOutcome {
    let outcome = match target {
        TargetRef::Player(id) => {
            let Some(victim) = world.players.get_mut(id).filter(|p| p.alive) else {
                return DamageOutcome::NoEffect;
            };
            victim.hp = (victim.hp - mitigated_damage(amount, victim.bonus.defense)).max(0.0);
            if victim.hp <= 0.0 {
                kill_player(world, id, source.player.clone(), config);
                DamageOutcome::Killed
            } else {
                DamageOutcome::Hit
            }
        }
        TargetRef::Minion(id) => {
            let Some(minion) = world.minions.get_mut(id).filter(|m| m.is_alive()) else {
                return DamageOutcome::NoEffect;
            };
            minion.hp = (minion.hp - amount).max(0.0);
            if minion.hp <= 0.0 {
                minion.state = MinionState::Dead;
                minion.target = None;
                DamageOutcome::Killed
            } else {
                DamageOutcome::Hit
            }
        }
        TargetRef::Objective => {
            let objective = &mut world.objective;
            if objective.hp <= 0.0 {
                return DamageOutcome::NoEffect;
            }
            objective.hp = (objective.hp - amount).max(0.0);
            if let Some(team) = source.team {
                *objective.damage_by_team.entry(team).or_insert(0.0) += amount;
            }
            if objective.hp <= 0.0 {
                info!(tick = world.tick, by = ?source.team, "objective destroyed");
                DamageOutcome::Killed
            } else {
                DamageOutcome::Hit
            }
        }
        TargetRef::Base(team) => {
            let Some(base) = world.bases.get_mut(team).filter(|b| !b.destroyed) else {
                return DamageOutcome::NoEffect;
            };
            base.hp = (base.hp - amount).max(0.0);
            if base.hp <= 0.0 {
                base.destroyed = true;
                base.captured_by = source.team.filter(|t| t != team);
                let captured_by = base.captured_by;
                info!(tick = world.tick, team, ?captured_by, "base destroyed");
                world.push_event(GameEventData::BaseDestroyed { team: *team, captured_by });
                DamageOutcome::Killed
            } else {
                DamageOutcome::Hit
            }
        }
        TargetRef::Tower(lane) => {
            let Some(tower) = world.towers.get_mut(lane).filter(|t| !t.destroyed) else {
                return DamageOutcome::NoEffect;
            };
            tower.hp = (tower.hp - amount).max(0.0);
            if tower.hp <= 0.0 {
                tower.destroyed = true;
                debug!(tick = world.tick, lane, "tower destroyed");
                world.push_event(GameEventData::TowerDestroyed { lane_team: *lane });
                DamageOutcome::Killed
            } else {
                DamageOutcome::Hit
            }
        }
    };

    if let Some(attacker) = &source.player {
        let xp = match (target, outcome) {
            (TargetRef::Player(_), DamageOutcome::Killed) => config.leveling.xp_player_kill,
            (TargetRef::Minion(_), DamageOutcome::Killed) => config.leveling.xp_minion_kill,
            (t, DamageOutcome::Hit | DamageOutcome::Killed) if t.is_structure() => {
                config.leveling.xp_structure_hit
            }
            _ => 0,
        };
        award_xp(world, attacker, xp, config);
    }

    outcome
}

/// Mark a player dead and start the respawn countdown.
pub fn kill_player(world: &mut WorldState, id: &PlayerId, killer: Option<PlayerId>, config: &MatchConfig) {
    let Some(player) = world.players.get_mut(id) else { return };
    if !player.alive {
        return;
    }
    player.alive = false;
    player.hp = 0.0;
    player.deaths += 1;
    player.respawn_timer =
        config.player.respawn_base_ms + player.deaths as f32 * config.player.respawn_per_death_ms;
    player.attack_target = None;
    player.is_attacking = false;

    let respawn_ms = player.respawn_timer;
    debug!(tick = world.tick, victim = %id, killer = ?killer, respawn_ms, "player killed");
    world.push_event(GameEventData::PlayerKilled { victim: id.clone(), killer, respawn_ms });
}

// =============================================================================
// TARGET SELECTION
// =============================================================================

/// Nearest hostile target within `range` of `position`.
///
/// Candidates are scanned players, minions, objective, bases, towers; the
/// earliest category wins ties. Structures are ranked by distance to their
/// edge and are in range when their edge is.
pub fn nearest_enemy_in_range(
    world: &WorldState,
    position: crate::core::vec2::Vec2,
    team: Option<TeamIndex>,
    range: f32,
) -> Option<TargetRef> {
    let mut best: Option<(f32, TargetRef)> = None;
    let mut consider = |score: f32, in_range: bool, target: TargetRef| {
        if in_range && best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, target));
        }
    };

    for p in world.players.values().filter(|p| p.alive && is_hostile(team, Some(p.team))) {
        let d = position.distance(p.position);
        consider(d, d <= range, TargetRef::Player(p.id.clone()));
    }
    for m in world.minions.values().filter(|m| m.is_alive() && is_hostile(team, m.team)) {
        let d = position.distance(m.position);
        consider(d, d <= range, TargetRef::Minion(m.id));
    }
    if world.objective.hp > 0.0 && is_hostile(team, None) {
        let d = position.distance(world.objective.position);
        let r = world.objective.radius;
        consider(d - r, d <= range + r, TargetRef::Objective);
    }
    for b in world.bases.values().filter(|b| !b.destroyed && is_hostile(team, Some(b.owner()))) {
        let d = position.distance(b.position);
        consider(d - b.radius, d <= range + b.radius, TargetRef::Base(b.team));
    }
    for t in world.towers.values().filter(|t| !t.destroyed && is_hostile(team, None)) {
        let d = position.distance(t.position);
        consider(d - t.radius, d <= range + t.radius, TargetRef::Tower(t.lane_team));
    }

    best.map(|(_, target)| target)
}

/// Pick what a ready player swings at this tick.
///
/// A valid hostile explicit target is the only candidate while it is set:
/// out of range means no attack. Without one, the nearest enemy in range.
fn select_player_target(world: &WorldState, id: &PlayerId, config: &MatchConfig) -> Option<TargetRef> {
    let player = world.players.get(id)?;
    let range = config.player.attack_range;

    if let Some(explicit) = &player.attack_target {
        if let Some(resolved) = resolve(world, explicit) {
            if is_hostile(Some(player.team), resolved.team) {
                let in_range = player.position.distance(resolved.position) <= range + resolved.radius;
                return in_range.then(|| explicit.clone());
            }
        }
    }

    nearest_enemy_in_range(world, player.position, Some(player.team), range)
}

// =============================================================================
// PHASES
// =============================================================================

/// Run the whole combat phase.
pub fn update_combat(world: &mut WorldState, config: &MatchConfig) {
    tick_player_cooldowns(world, config);
    apply_regen(world, config);
    update_player_attacks(world, config);
    update_respawns(world, config);
    update_structure_attacks(world, config);
    update_projectiles(world, config);
    update_minion_attacks(world, config);
    purge_dead_minions(world);
}

fn tick_player_cooldowns(world: &mut WorldState, config: &MatchConfig) {
    let dt_ms = config.dt_ms();
    for p in world.players.values_mut() {
        p.attack_cooldown = (p.attack_cooldown - dt_ms).max(0.0);
        p.ability_cooldown = (p.ability_cooldown - dt_ms).max(0.0);
        p.is_attacking = false;
    }
}

/// Regenerate living players; faster near their own intact base.
pub fn apply_regen(world: &mut WorldState, config: &MatchConfig) {
    let dt = config.dt();
    let regen = &config.regen;
    let bases = &world.bases;

    for p in world.players.values_mut().filter(|p| p.alive && p.hp < p.max_hp) {
        let near_base = bases
            .get(&p.team)
            .filter(|b| !b.destroyed)
            .map_or(false, |b| b.position.distance(p.position) <= regen.base_proximity);
        let rate = if near_base { regen.near_base_per_sec } else { regen.base_per_sec } + p.bonus.regen;
        p.hp = (p.hp + rate * dt).min(p.max_hp);
    }
}

fn update_player_attacks(world: &mut WorldState, config: &MatchConfig) {
    let ids: Vec<PlayerId> = world
        .players
        .values()
        .filter(|p| p.alive && p.attack_cooldown <= 0.0)
        .map(|p| p.id.clone())
        .collect();

    for id in ids {
        // A kill earlier in this loop may have taken this player out
        let Some(player) = world.players.get(&id).filter(|p| p.alive) else { continue };
        let team = player.team;
        let damage = player.attack_damage(config);

        let Some(target) = select_player_target(world, &id, config) else { continue };
        apply_damage(world, &target, damage, &DamageSource::player(id.clone(), team), config);

        if let Some(p) = world.players.get_mut(&id) {
            p.attack_cooldown = config.player.attack_cooldown_ms;
            p.is_attacking = true;
        }
    }
}

/// Count down dead players and bring them back at their base.
///
/// A player whose base is destroyed when the countdown ends stays dead with
/// the timer held at zero.
pub fn update_respawns(world: &mut WorldState, config: &MatchConfig) {
    let dt_ms = config.dt_ms();
    let mut ready = Vec::new();

    for p in world.players.values_mut().filter(|p| !p.alive && p.respawn_timer > 0.0) {
        p.respawn_timer = (p.respawn_timer - dt_ms).max(0.0);
        if p.respawn_timer <= 0.0 {
            ready.push(p.id.clone());
        }
    }

    for id in ready {
        let Some(team) = world.players.get(&id).map(|p| p.team) else { continue };
        let Some(base_pos) = world.intact_base(team).map(|b| b.position) else {
            continue;
        };
        let spawn = base_pos + world.rng.jitter(config.player.respawn_jitter);

        if let Some(p) = world.players.get_mut(&id) {
            p.alive = true;
            p.hp = p.max_hp;
            p.position = spawn;
            p.goal = spawn;
            p.attack_target = None;
            p.attack_cooldown = 0.0;
        }
        world.push_event(GameEventData::PlayerRespawned { player: id });
    }
}

fn update_minion_attacks(world: &mut WorldState, config: &MatchConfig) {
    let dt_ms = config.dt_ms();
    let ids: Vec<_> = world.minions.keys().copied().collect();

    for id in ids {
        let Some(minion) = world.minions.get_mut(&id) else { continue };
        minion.attack_cooldown = (minion.attack_cooldown - dt_ms).max(0.0);
        if !minion.is_alive() || minion.state != MinionState::Attacking || minion.attack_cooldown > 0.0 {
            continue;
        }

        let kind = minion.kind;
        let team = minion.team;
        let position = minion.position;
        let stats = kind.stats(config);

        let resolved = minion.target.clone().and_then(|t| resolve(world, &t).map(|r| (t, r)));
        let Some((target, rt)) = resolved.filter(|(_, rt)| is_hostile(team, rt.team)) else {
            if let Some(m) = world.minions.get_mut(&id) {
                m.state = MinionState::Walking;
                m.target = None;
            }
            continue;
        };

        if position.distance(rt.position) > stats.attack_range + rt.radius {
            continue;
        }

        if kind == MinionKind::Caster && rt.kind == TargetKind::Unit {
            if world.projectiles.len() >= config.limits.max_projectiles {
                continue;
            }
            world.spawn_projectile(
                position,
                target,
                stats.attack_damage,
                config.structures.projectile_speed,
                team,
            );
        } else {
            apply_damage(world, &target, stats.attack_damage, &DamageSource::team(team), config);
        }

        if let Some(m) = world.minions.get_mut(&id) {
            m.attack_cooldown = stats.attack_cooldown_ms;
        }
    }
}

/// Remove minions that died this tick.
pub fn purge_dead_minions(world: &mut WorldState) {
    world.minions.retain(|_, m| m.is_alive());
}

/// Eliminate every team with a destroyed base and no living players.
///
/// Elimination is one-way and also removes the team's minions.
pub fn check_team_elimination(world: &mut WorldState) {
    let newly: Vec<TeamIndex> = world
        .teams
        .iter()
        .filter(|t| !t.eliminated)
        .map(|t| t.index)
        .filter(|&t| world.bases.get(&t).map_or(true, |b| b.destroyed) && world.alive_player_count(t) == 0)
        .collect();

    for team in newly {
        if let Some(t) = world.teams.get_mut(team as usize) {
            t.eliminated = true;
        }
        world.minions.retain(|_, m| m.team != Some(team));
        info!(tick = world.tick, team, "team eliminated");
        world.push_event(GameEventData::TeamEliminated { team });
    }
}

// =============================================================================
// TESTS
// =============================================================================
