//! Structure Fire and Projectiles
//!
//! Bases, lane towers and the objective shoot homing projectiles at the
//! nearest hostile unit in reach, minions before players. Bases fight for
//! their current owner; towers and the objective are neutral and shoot at
//! every team's units.

use crate::core::vec2::Vec2;
use crate::game::combat::{apply_damage, DamageSource};
use crate::game::config::{MatchConfig, StructureStats};
use crate::game::state::{ProjectileId, TeamIndex, WorldState};
use crate::game::target::{is_hostile, resolve, TargetRef};

#[derive(Clone, Copy, Debug)]
enum Shooter {
    Base(TeamIndex),
    Tower(TeamIndex),
    Objective,
}

/// Nearest hostile unit within `reach`: minions first, then players.
pub fn find_structure_target(
    world: &WorldState,
    position: Vec2,
    reach: f32,
    owner: Option<TeamIndex>,
) -> Option<TargetRef> {
    let nearest_minion = world
        .minions
        .values()
        .filter(|m| m.is_alive() && is_hostile(owner, m.team))
        .map(|m| (position.distance(m.position), m.id))
        .filter(|(d, _)| *d <= reach)
        .min_by(|a, b| a.0.total_cmp(&b.0));
    if let Some((_, id)) = nearest_minion {
        return Some(TargetRef::Minion(id));
    }

    world
        .players
        .values()
        .filter(|p| p.alive && is_hostile(owner, Some(p.team)))
        .map(|p| (position.distance(p.position), &p.id))
        .filter(|(d, _)| *d <= reach)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, id)| TargetRef::Player(id.clone()))
}

/// Tick structure cooldowns and fire at targets in reach.
pub fn update_structure_attacks(world: &mut WorldState, config: &MatchConfig) {
    let dt_ms = config.dt_ms();

    let mut shooters: Vec<Shooter> = world
        .bases
        .values()
        .filter(|b| !b.destroyed)
        .map(|b| Shooter::Base(b.team))
        .collect();
    shooters.extend(world.towers.values().filter(|t| !t.destroyed).map(|t| Shooter::Tower(t.lane_team)));
    if world.objective.hp > 0.0 {
        shooters.push(Shooter::Objective);
    }

    for shooter in shooters {
        let (position, owner, stats) = match shooter {
            Shooter::Base(team) => {
                let Some(b) = world.bases.get(&team) else { continue };
                (b.position, Some(b.owner()), &config.structures.base)
            }
            Shooter::Tower(lane) => {
                let Some(t) = world.towers.get(&lane) else { continue };
                (t.position, None, &config.structures.tower)
            }
            Shooter::Objective => (world.objective.position, None, &config.structures.objective),
        };

        let Some(cooldown) = cooldown_mut(world, shooter) else { continue };
        if *cooldown > 0.0 {
            *cooldown = (*cooldown - dt_ms).max(0.0);
            continue;
        }

        if world.projectiles.len() >= config.limits.max_projectiles {
            continue;
        }
        let Some(target) = find_structure_target(world, position, reach(stats), owner) else {
            continue;
        };

        world.spawn_projectile(position, target, stats.attack_damage, config.structures.projectile_speed, owner);
        if let Some(cooldown) = cooldown_mut(world, shooter) {
            *cooldown = stats.attack_cooldown_ms;
        }
    }
}

#[inline]
fn reach(stats: &StructureStats) -> f32 {
    stats.attack_range + stats.radius
}

fn cooldown_mut(world: &mut WorldState, shooter: Shooter) -> Option<&mut f32> {
    match shooter {
        Shooter::Base(team) => world.bases.get_mut(&team).map(|b| &mut b.attack_cooldown),
        Shooter::Tower(lane) => world.towers.get_mut(&lane).map(|t| &mut t.attack_cooldown),
        Shooter::Objective => Some(&mut world.objective.attack_cooldown),
    }
}

/// Move projectiles toward their targets and resolve impacts.
///
/// A projectile whose target is no longer valid disappears without effect.
pub fn update_projectiles(world: &mut WorldState, config: &MatchConfig) {
    let dt = config.dt();
    let ids: Vec<ProjectileId> = world.projectiles.keys().copied().collect();

    for id in ids {
        let Some(proj) = world.projectiles.get(&id) else { continue };
        let Some(target) = resolve(world, &proj.target) else {
            world.projectiles.remove(&id);
            continue;
        };

        let travel = proj.speed * dt;
        let dist = proj.position.distance(target.position);
        if dist <= travel + config.structures.projectile_slack {
            let (target_ref, damage, team) = (proj.target.clone(), proj.damage, proj.source_team);
            world.projectiles.remove(&id);
            apply_damage(world, &target_ref, damage, &DamageSource::team(team), config);
        } else if let Some(proj) = world.projectiles.get_mut(&id) {
            proj.position = proj.position.step_toward(target.position, travel);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
