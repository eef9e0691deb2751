//! Player Movement
//!
//! A player with an attack target walks into range of it and stops there;
//! otherwise it walks to its goal. Minion movement is driven by minion AI.

use crate::game::config::MatchConfig;
use crate::game::state::WorldState;
use crate::game::target::resolve;

/// Distance at which a goal counts as reached.
pub const ARRIVE_DISTANCE: f32 = 2.0;

/// How far inside the effective range a chasing player stops.
pub const RANGE_STOP_MARGIN: f32 = 2.0;

/// Advance every living player by one tick.
pub fn update_movement(world: &mut WorldState, config: &MatchConfig) {
    let dt = config.dt();
    let ids: Vec<_> = world.players.keys().cloned().collect();

    for id in ids {
        let Some(player) = world.players.get(&id) else { continue };
        if !player.alive {
            continue;
        }
        let step = player.speed(config) * dt;
        let position = player.position;

        // Target chase takes precedence over the goal
        if let Some(target_ref) = &player.attack_target {
            match resolve(world, target_ref) {
                Some(target) => {
                    let effective = config.player.attack_range + target.radius;
                    let dist = position.distance(target.position);
                    let next = if dist <= effective {
                        position
                    } else if dist - step <= effective {
                        let stop = (effective - RANGE_STOP_MARGIN).max(0.0);
                        position.at_distance_from(target.position, stop)
                    } else {
                        position.step_toward(target.position, step)
                    };
                    if let Some(p) = world.players.get_mut(&id) {
                        p.position = next;
                    }
                    continue;
                }
                None => {
                    if let Some(p) = world.players.get_mut(&id) {
                        p.attack_target = None;
                    }
                }
            }
        }

        let Some(player) = world.players.get_mut(&id) else { continue };
        if player.position.distance(player.goal) < ARRIVE_DISTANCE {
            continue;
        }
        player.position = player.position.step_toward(player.goal, step);
    }
}

// =============================================================================
// TESTS
// =============================================================================
