//! Minion Waves
//!
//! Three independent schedules, each an accumulator of elapsed ms:
//!
//! - base waves: every intact base spawns for its team, every captured base
//!   for its capturer, marching on the center
//! - objective waves: neutral minions from the objective toward each intact base
//! - tower waves: neutral minions from each intact tower toward its lane's base
//!
//! Every wave is a melee front rank with casters one rank behind, relative to
//! the direction of travel.

use tracing::debug;

use crate::core::vec2::Vec2;
use crate::game::config::{MatchConfig, WaveComposition};
use crate::game::events::{GameEventData, WaveKind};
use crate::game::map;
use crate::game::state::{MinionKind, TeamIndex, WorldState};

/// Where a wave forms up and who it belongs to.
#[derive(Clone, Copy, Debug)]
struct WaveOrder {
    origin: Vec2,
    heading: Vec2,
    team: Option<TeamIndex>,
    goal_base: Option<TeamIndex>,
}

/// Advance the wave timers and spawn any waves that are due.
pub fn update_waves(world: &mut WorldState, config: &MatchConfig) {
    let dt_ms = config.dt_ms();
    let waves = &config.waves;

    world.wave_timers.base += dt_ms;
    world.wave_timers.objective += dt_ms;
    world.wave_timers.tower += dt_ms;

    if world.wave_timers.base >= waves.base_interval_ms {
        world.wave_timers.base = 0.0;
        spawn_base_waves(world, config);
    }
    if world.wave_timers.objective >= waves.objective_interval_ms {
        world.wave_timers.objective = 0.0;
        spawn_objective_waves(world, config);
    }
    if world.wave_timers.tower >= waves.tower_interval_ms {
        world.wave_timers.tower = 0.0;
        spawn_tower_waves(world, config);
    }
}

/// One wave per intact base for its owner, and per captured base for the
/// capturer. Eliminated teams get nothing.
pub fn spawn_base_waves(world: &mut WorldState, config: &MatchConfig) -> u32 {
    let center = map::center(&config.map);
    let orders: Vec<WaveOrder> = world
        .bases
        .values()
        .filter_map(|b| {
            let team = if b.destroyed { b.captured_by? } else { b.team };
            Some(WaveOrder {
                origin: b.position,
                heading: (center - b.position).normalize(),
                team: Some(team),
                goal_base: None,
            })
        })
        .filter(|o| o.team.is_some_and(|t| world.is_team_active(t)))
        .collect();

    spawn_orders(world, config, &orders, config.waves.base_wave, WaveKind::Base)
}

/// Neutral waves from the objective, one toward each intact base.
pub fn spawn_objective_waves(world: &mut WorldState, config: &MatchConfig) -> u32 {
    let objective = &world.objective;
    if objective.hp <= 0.0 {
        return 0;
    }
    let (center, offset) = (objective.position, objective.radius + config.waves.rank_depth);

    let orders: Vec<WaveOrder> = world
        .bases
        .values()
        .filter(|b| !b.destroyed)
        .map(|b| {
            let heading = (b.position - center).normalize();
            WaveOrder {
                origin: center + heading * offset,
                heading,
                team: None,
                goal_base: Some(b.team),
            }
        })
        .collect();

    spawn_orders(world, config, &orders, config.waves.objective_wave, WaveKind::Objective)
}

/// Neutral waves from each intact tower toward the base of its lane, while
/// that base stands.
pub fn spawn_tower_waves(world: &mut WorldState, config: &MatchConfig) -> u32 {
    let orders: Vec<WaveOrder> = world
        .towers
        .values()
        .filter(|t| !t.destroyed)
        .filter_map(|t| {
            let base = world.intact_base(t.lane_team)?;
            let heading = (base.position - t.position).normalize();
            Some(WaveOrder {
                origin: t.position + heading * (t.radius + config.waves.rank_depth),
                heading,
                team: None,
                goal_base: Some(t.lane_team),
            })
        })
        .collect();

    spawn_orders(world, config, &orders, config.waves.tower_wave, WaveKind::Tower)
}

fn spawn_orders(
    world: &mut WorldState,
    config: &MatchConfig,
    orders: &[WaveOrder],
    composition: WaveComposition,
    kind: WaveKind,
) -> u32 {
    let mut count = 0;
    for order in orders {
        count += spawn_formation(world, config, order, composition);
    }
    if count > 0 {
        debug!(tick = world.tick, ?kind, count, "wave spawned");
        world.push_event(GameEventData::WaveSpawned { kind, count });
    }
    count
}

/// Lay out one wave. Stops early at the minion cap.
fn spawn_formation(world: &mut WorldState, config: &MatchConfig, order: &WaveOrder, composition: WaveComposition) -> u32 {
    let waves = &config.waves;
    let side = Vec2::new(-order.heading.y, order.heading.x);
    let back = order.origin - order.heading * waves.rank_depth;

    let ranks = [
        (MinionKind::Melee, composition.melee, order.origin),
        (MinionKind::Caster, composition.casters, back),
    ];

    let mut spawned = 0;
    for (kind, count, anchor) in ranks {
        for i in 0..count {
            if world.minions.len() >= config.limits.max_minions {
                return spawned;
            }
            // Centered across the rank
            let lateral = (i as f32 - (count as f32 - 1.0) / 2.0) * waves.rank_spacing;
            let jitter = world.rng.jitter(waves.jitter);
            let position = anchor + side * lateral + jitter;
            world.spawn_minion(kind, order.team, position, order.goal_base, config);
            spawned += 1;
        }
    }
    spawned
}

// =============================================================================
// TESTS
// =============================================================================
