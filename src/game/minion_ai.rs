//! Minion AI
//!
//! `spawning -> walking <-> attacking`, with `dead` terminal. Walking minions
//! march on their lane goal and scan for aggro; attacking minions close to
//! attack range of their locked target. Hits themselves are dealt in the
//! combat phase.

use crate::core::vec2::Vec2;
use crate::game::config::MatchConfig;
use crate::game::map;
use crate::game::state::{Minion, MinionId, MinionState, WorldState};
use crate::game::target::{is_hostile, resolve, TargetRef};

/// How far inside attack range a pursuing minion stops.
const PURSUIT_MARGIN: f32 = 1.0;

/// Run one AI step for every minion.
pub fn update_minion_ai(world: &mut WorldState, config: &MatchConfig) {
    let ids: Vec<MinionId> = world.minions.keys().copied().collect();

    for id in ids {
        let Some(state) = world.minions.get(&id).filter(|m| m.is_alive()).map(|m| m.state) else {
            continue;
        };
        match state {
            MinionState::Spawning => {
                if let Some(m) = world.minions.get_mut(&id) {
                    m.state = MinionState::Walking;
                }
            }
            MinionState::Walking => walk_lane(world, id, config),
            MinionState::Attacking => pursue(world, id, config),
            MinionState::Dead => {}
        }
    }
}

/// Where a walking minion is heading; clears a goal base that is gone.
fn lane_goal(world: &mut WorldState, id: MinionId, config: &MatchConfig) -> Vec2 {
    let center = map::center(&config.map);
    let Some(goal_base) = world.minions.get(&id).and_then(|m| m.goal_base) else {
        return center;
    };
    match world.intact_base(goal_base) {
        Some(base) => base.position,
        None => {
            if let Some(m) = world.minions.get_mut(&id) {
                m.goal_base = None;
            }
            center
        }
    }
}

fn walk_lane(world: &mut WorldState, id: MinionId, config: &MatchConfig) {
    let goal = lane_goal(world, id, config);
    let step = config.minions.speed * config.dt();

    let Some(m) = world.minions.get_mut(&id) else { return };
    if m.position.distance(goal) >= config.minions.arrive_distance {
        m.position = m.position.step_toward(goal, step);
    }

    let Some(m) = world.minions.get(&id) else { return };
    if let Some(target) = scan_for_aggro(world, m, config) {
        if let Some(m) = world.minions.get_mut(&id) {
            m.state = MinionState::Attacking;
            m.target = Some(target);
        }
    }
}

/// Pick an aggro target for a minion.
///
/// Enemy players, then enemy minions, by distance within aggro range. Team
/// minions then consider towers and the objective; neutral minions consider
/// bases. Structures count from their edge.
pub fn scan_for_aggro(world: &WorldState, minion: &Minion, config: &MatchConfig) -> Option<TargetRef> {
    let aggro = minion.kind.stats(config).aggro_range;
    let pos = minion.position;
    let team = minion.team;

    let nearest = |candidates: Vec<(f32, TargetRef)>| {
        candidates
            .into_iter()
            .filter(|(d, _)| *d < aggro)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, t)| t)
    };

    let players = world
        .players
        .values()
        .filter(|p| p.alive && is_hostile(team, Some(p.team)))
        .map(|p| (pos.distance(p.position), TargetRef::Player(p.id.clone())))
        .collect();
    if let Some(t) = nearest(players) {
        return Some(t);
    }

    let minions = world
        .minions
        .values()
        .filter(|m| m.id != minion.id && m.is_alive() && is_hostile(team, m.team))
        .map(|m| (pos.distance(m.position), TargetRef::Minion(m.id)))
        .collect();
    if let Some(t) = nearest(minions) {
        return Some(t);
    }

    if team.is_some() {
        let towers = world
            .towers
            .values()
            .filter(|t| !t.destroyed)
            .map(|t| (pos.distance(t.position) - t.radius, TargetRef::Tower(t.lane_team)))
            .collect();
        if let Some(t) = nearest(towers) {
            return Some(t);
        }

        let o = &world.objective;
        if o.hp > 0.0 && pos.distance(o.position) - o.radius < aggro {
            return Some(TargetRef::Objective);
        }
        None
    } else {
        let bases = world
            .bases
            .values()
            .filter(|b| !b.destroyed)
            .map(|b| (pos.distance(b.position) - b.radius, TargetRef::Base(b.team)))
            .collect();
        nearest(bases)
    }
}

fn pursue(world: &mut WorldState, id: MinionId, config: &MatchConfig) {
    let Some(m) = world.minions.get(&id) else { return };
    let stats = m.kind.stats(config);
    let position = m.position;
    let team = m.team;

    let resolved = m
        .target
        .as_ref()
        .and_then(|t| resolve(world, t))
        .filter(|rt| is_hostile(team, rt.team));

    let Some(m) = world.minions.get_mut(&id) else { return };
    let Some(rt) = resolved else {
        m.state = MinionState::Walking;
        m.target = None;
        return;
    };

    let dist = position.distance(rt.position);
    if dist > stats.aggro_range * config.minions.leash_factor + rt.radius {
        m.state = MinionState::Walking;
        m.target = None;
        return;
    }

    let effective = stats.attack_range + rt.radius;
    if dist > effective {
        let step = (config.minions.speed * config.dt()).min(dist - effective + PURSUIT_MARGIN);
        m.position = position.step_toward(rt.position, step);
    }
}

// =============================================================================
// TESTS
// =============================================================================
