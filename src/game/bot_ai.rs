//! Bot AI
//!
//! Bots are ordinary players whose commands come from a priority ladder
//! evaluated every tick instead of from a connection. The first rule that
//! applies wins:
//!
//! 1. Retreat to the own base when hp drops below the retreat fraction.
//! 2. Defend the own base against enemy units inside the defend radius.
//! 3. Hold a valid target until the decision timer runs out.
//! 4. Acquire a new target (players, lane minions, lane tower, forward
//!    waypoint, objective).
//!
//! Structures are never attacked without a friendly minion escort; an
//! unescorted bot waits at a standoff point outside the structure's reach.

use crate::core::vec2::Vec2;
use crate::game::config::{MatchConfig, StructureStats};
use crate::game::map;
use crate::game::state::{PlayerId, TeamIndex, WorldState};
use crate::game::target::{is_hostile, resolve, TargetRef};

/// Result of a target search.
#[derive(Clone, Debug, PartialEq)]
pub enum Acquisition {
    /// Attack this target
    Attack(TargetRef),
    /// Walk to a lane waypoint without attacking
    Advance(Vec2),
    /// Nothing to do
    Idle,
}

/// Run the decision ladder for every living bot.
pub fn update_bots(world: &mut WorldState, config: &MatchConfig) {
    let bots: Vec<PlayerId> = world
        .players
        .values()
        .filter(|p| p.is_bot && p.alive)
        .map(|p| p.id.clone())
        .collect();

    for id in bots {
        decide(world, &id, config);
    }
}

fn decide(world: &mut WorldState, id: &PlayerId, config: &MatchConfig) {
    let bots = &config.bots;
    let Some(bot) = world.players.get_mut(id) else { return };
    bot.bot_decision_timer = (bot.bot_decision_timer - config.dt_ms()).max(0.0);

    let team = bot.team;
    let position = bot.position;
    let timer = bot.bot_decision_timer;
    let current = bot.attack_target.clone();
    let low_hp = bot.hp < bot.max_hp * bots.retreat_fraction;

    // 1. Retreat (no base, no retreat)
    if low_hp {
        if let Some(base) = world.intact_base(team).map(|b| b.position) {
            set_orders(world, id, None, Some(base), None);
            return;
        }
    }

    // 2. Defend
    if let Some(threat) = find_base_threat(world, team, config) {
        let already_defending = current
            .as_ref()
            .is_some_and(|t| *t == threat || is_near_own_base(world, team, t, config));
        if !already_defending {
            set_orders(world, id, Some(threat), None, Some(bots.decision_interval_ms));
            return;
        }
    }

    // 3. Hold
    let held = current.filter(|t| {
        resolve(world, t).is_some_and(|rt| is_hostile(Some(team), rt.team))
    });
    if let Some(target) = held {
        if timer > 0.0 {
            if let Some(standoff) = unescorted_standoff(world, team, position, &target, config) {
                set_orders(world, id, None, Some(standoff), None);
            }
            return;
        }
    }

    // 4. Acquire
    let interval = Some(bots.decision_interval_ms);
    match find_bot_target(world, team, position, config) {
        Acquisition::Attack(target) => {
            match unescorted_standoff(world, team, position, &target, config) {
                Some(standoff) => set_orders(world, id, None, Some(standoff), interval),
                None => set_orders(world, id, Some(target), None, interval),
            }
        }
        Acquisition::Advance(waypoint) => set_orders(world, id, None, Some(waypoint), interval),
        Acquisition::Idle => set_orders(world, id, None, None, interval),
    }
}

fn set_orders(
    world: &mut WorldState,
    id: &PlayerId,
    target: Option<TargetRef>,
    goal: Option<Vec2>,
    timer: Option<f32>,
) {
    let Some(bot) = world.players.get_mut(id) else { return };
    bot.attack_target = target;
    if let Some(goal) = goal {
        bot.goal = goal;
    }
    if let Some(timer) = timer {
        bot.bot_decision_timer = timer;
    }
}

/// Nearest enemy unit inside the defend radius of a team's intact base.
pub fn find_base_threat(world: &WorldState, team: TeamIndex, config: &MatchConfig) -> Option<TargetRef> {
    let base = world.intact_base(team)?.position;
    let radius = config.bots.defend_radius;

    let players = world
        .players
        .values()
        .filter(|p| p.alive && p.team != team)
        .map(|p| (base.distance(p.position), TargetRef::Player(p.id.clone())));
    let minions = world
        .minions
        .values()
        .filter(|m| m.is_alive() && is_hostile(Some(team), m.team))
        .map(|m| (base.distance(m.position), TargetRef::Minion(m.id)));

    players
        .chain(minions)
        .filter(|(d, _)| *d < radius)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, t)| t)
}

fn is_near_own_base(world: &WorldState, team: TeamIndex, target: &TargetRef, config: &MatchConfig) -> bool {
    if target.is_structure() {
        return false;
    }
    let Some(base) = world.intact_base(team) else { return false };
    resolve(world, target).is_some_and(|rt| base.position.distance(rt.position) < config.bots.defend_radius)
}

fn structure_stats<'a>(target: &TargetRef, config: &'a MatchConfig) -> Option<&'a StructureStats> {
    match target {
        TargetRef::Objective => Some(&config.structures.objective),
        TargetRef::Base(_) => Some(&config.structures.base),
        TargetRef::Tower(_) => Some(&config.structures.tower),
        TargetRef::Player(_) | TargetRef::Minion(_) => None,
    }
}

/// Where an unescorted bot should wait instead of attacking a structure.
///
/// `None` when the target is not a structure, no longer exists, or has a
/// friendly minion within the escort radius.
pub fn unescorted_standoff(
    world: &WorldState,
    team: TeamIndex,
    position: Vec2,
    target: &TargetRef,
    config: &MatchConfig,
) -> Option<Vec2> {
    let stats = structure_stats(target, config)?;
    let structure = resolve(world, target)?;

    let escorted = world.minions.values().any(|m| {
        m.is_alive()
            && m.team == Some(team)
            && m.position.distance(structure.position) < config.bots.escort_radius
    });
    if escorted {
        return None;
    }

    let safe = stats.attack_range + structure.radius + config.bots.standoff_buffer;
    Some(position.at_distance_from(structure.position, safe))
}

/// Search for something for a bot to do.
pub fn find_bot_target(world: &WorldState, team: TeamIndex, position: Vec2, config: &MatchConfig) -> Acquisition {
    let bots = &config.bots;
    let in_lane = |pos: Vec2| map::is_in_lane(&config.map, team, pos, bots.lane_width_factor);

    // Enemy players: anyone very close, otherwise the nearest in lane
    let mut nearest_any: Option<(f32, &PlayerId)> = None;
    let mut nearest_lane: Option<(f32, &PlayerId)> = None;
    for p in world.players.values().filter(|p| p.alive && p.team != team) {
        let d = position.distance(p.position);
        if d >= bots.scan_range {
            continue;
        }
        if nearest_any.map_or(true, |(best, _)| d < best) {
            nearest_any = Some((d, &p.id));
        }
        if in_lane(p.position) && nearest_lane.map_or(true, |(best, _)| d < best) {
            nearest_lane = Some((d, &p.id));
        }
    }
    if let Some((d, id)) = nearest_any {
        if d < config.player.attack_range * bots.close_override_factor {
            return Acquisition::Attack(TargetRef::Player(id.clone()));
        }
    }
    if let Some((_, id)) = nearest_lane {
        return Acquisition::Attack(TargetRef::Player(id.clone()));
    }

    let lane_minion = world
        .minions
        .values()
        .filter(|m| m.is_alive() && is_hostile(Some(team), m.team) && in_lane(m.position))
        .map(|m| (position.distance(m.position), m.id))
        .filter(|(d, _)| *d < bots.scan_range)
        .min_by(|a, b| a.0.total_cmp(&b.0));
    if let Some((_, id)) = lane_minion {
        return Acquisition::Attack(TargetRef::Minion(id));
    }

    if world.towers.get(&team).is_some_and(|t| !t.destroyed) {
        return Acquisition::Attack(TargetRef::Tower(team));
    }

    let waypoint = map::ring_point(&config.map, team, bots.waypoint_ring);
    if position.distance(waypoint) > bots.waypoint_arrive {
        return Acquisition::Advance(waypoint);
    }

    if world.objective.hp > 0.0 {
        return Acquisition::Attack(TargetRef::Objective);
    }
    Acquisition::Idle
}

// =============================================================================
// TESTS
// =============================================================================
