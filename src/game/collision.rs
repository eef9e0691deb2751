//! Collision Resolution
//!
//! Circle-vs-circle separation. Overlapping units push each other apart by
//! half the overlap each; a unit overlapping a structure is pushed out by the
//! full overlap. Coincident centers have no defined push direction and are
//! left alone.

use crate::core::vec2::Vec2;
use crate::game::config::MatchConfig;
use crate::game::state::{Base, MinionId, PlayerId, TeamIndex, WorldState};

/// Check if two circles overlap.
#[inline]
pub fn circles_overlap(pos_a: Vec2, radius_a: f32, pos_b: Vec2, radius_b: f32) -> bool {
    let combined = radius_a + radius_b;
    pos_a.distance(pos_b) < combined
}

/// Push two mobile circles apart symmetrically.
pub fn separate_pair(a: &mut Vec2, radius_a: f32, b: &mut Vec2, radius_b: f32) {
    let delta = *b - *a;
    let dist = delta.length();
    let overlap = radius_a + radius_b - dist;
    if overlap <= 0.0 || dist == 0.0 {
        return;
    }
    let push = delta * (overlap / 2.0 / dist);
    *a = *a - push;
    *b += push;
}

/// Push a mobile circle fully out of a static one.
pub fn separate_from_static(pos: &mut Vec2, radius: f32, static_pos: Vec2, static_radius: f32) {
    let delta = *pos - static_pos;
    let dist = delta.length();
    let overlap = radius + static_radius - dist;
    if overlap <= 0.0 || dist == 0.0 {
        return;
    }
    *pos += delta * (overlap / dist);
}

/// Whether a base physically blocks a unit of `team`.
///
/// Bases never block their own team. A destroyed base only keeps blocking
/// if some team captured it, and then not that team.
pub fn base_blocks(base: &Base, team: Option<TeamIndex>) -> bool {
    if team == Some(base.team) {
        return false;
    }
    if base.destroyed {
        return match base.captured_by {
            Some(capturer) => team != Some(capturer),
            None => false,
        };
    }
    true
}

enum Body {
    Player(PlayerId),
    Minion(MinionId),
}

struct Mobile {
    body: Body,
    position: Vec2,
    radius: f32,
    team: Option<TeamIndex>,
}

/// Resolve all unit overlaps for this tick.
pub fn resolve_collisions(world: &mut WorldState, config: &MatchConfig) {
    let mut mobiles: Vec<Mobile> = world
        .players
        .values()
        .filter(|p| p.alive)
        .map(|p| Mobile {
            body: Body::Player(p.id.clone()),
            position: p.position,
            radius: config.player.radius,
            team: Some(p.team),
        })
        .chain(world.minions.values().filter(|m| m.is_alive()).map(|m| Mobile {
            body: Body::Minion(m.id),
            position: m.position,
            radius: m.radius,
            team: m.team,
        }))
        .collect();

    // Unit pairs, in stable order
    for i in 0..mobiles.len() {
        let (head, tail) = mobiles.split_at_mut(i + 1);
        let a = &mut head[i];
        for b in tail.iter_mut() {
            separate_pair(&mut a.position, a.radius, &mut b.position, b.radius);
        }
    }

    // Units against structures
    let objective = (world.objective.hp > 0.0).then_some((world.objective.position, world.objective.radius));
    for m in mobiles.iter_mut() {
        if let Some((pos, radius)) = objective {
            separate_from_static(&mut m.position, m.radius, pos, radius);
        }
        for base in world.bases.values() {
            if base_blocks(base, m.team) {
                separate_from_static(&mut m.position, m.radius, base.position, base.radius);
            }
        }
        for tower in world.towers.values().filter(|t| !t.destroyed) {
            separate_from_static(&mut m.position, m.radius, tower.position, tower.radius);
        }
    }

    for m in mobiles {
        match m.body {
            Body::Player(id) => {
                if let Some(p) = world.players.get_mut(&id) {
                    p.position = m.position;
                }
            }
            Body::Minion(id) => {
                if let Some(minion) = world.minions.get_mut(&id) {
                    minion.position = m.position;
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
