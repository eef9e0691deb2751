//! Authoritative Simulation Tick
//!
//! One call to [`tick`] runs the whole pipeline against the world in a
//! fixed order. Every phase sees the results of the phases before it in the
//! same tick and nothing from the phases after it.

use tracing::info;

use crate::game::bot_ai::update_bots;
use crate::game::collision::resolve_collisions;
use crate::game::combat::{check_team_elimination, update_combat};
use crate::game::config::MatchConfig;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::{InputLog, InputQueue, PlayerCommand};
use crate::game::minion_ai::update_minion_ai;
use crate::game::movement::update_movement;
use crate::game::state::{MatchPhase, PlayerId, TeamIndex, WorldState};
use crate::game::waves::update_waves;
use crate::game::win::check_win_conditions;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Commands applied this tick, in order
    pub applied: Vec<(PlayerId, PlayerCommand)>,
    /// Whether the match is over
    pub match_ended: bool,
    /// Winning team once the match is over
    pub winner: Option<TeamIndex>,
}

/// Fill every team up to `players_per_team` with bots named
/// `bot_<team>_<n>`. Returns how many were added.
pub fn fill_bots(world: &mut WorldState, config: &MatchConfig) -> usize {
    let per_team = config.player.players_per_team;
    let mut added = 0;

    for team in 0..world.teams.len() as TeamIndex {
        let mut n = 0;
        while world.teams[team as usize].players.len() < per_team {
            let id = PlayerId(format!("bot_{}_{}", team, n));
            n += 1;
            if world.players.contains_key(&id) {
                continue;
            }
            world.add_player(id, Some(team), true, config);
            added += 1;
        }
    }
    added
}

/// Move a waiting match into play, filling empty slots with bots when
/// configured. Returns false if the match was not waiting.
pub fn start_match(world: &mut WorldState, config: &MatchConfig) -> bool {
    if world.phase != MatchPhase::Waiting {
        return false;
    }
    let bots = if config.bots.fill_teams { fill_bots(world, config) } else { 0 };
    world.phase = MatchPhase::Playing;
    info!(players = world.players.len(), bots, seed = world.rng_seed, "match started");
    true
}

/// Run one simulation tick.
///
/// Only a `Playing` match advances. Input arriving in any other phase is
/// discarded, and a finished match keeps reporting its winner.
pub fn tick(world: &mut WorldState, inputs: &mut InputQueue, config: &MatchConfig) -> TickResult {
    let mut result = TickResult::default();

    match world.phase {
        MatchPhase::Waiting => {
            inputs.clear();
            return result;
        }
        MatchPhase::Finished => {
            inputs.clear();
            result.match_ended = true;
            result.winner = world.winner;
            return result;
        }
        MatchPhase::Playing => {}
    }

    #[cfg(feature = "debug-tracing")]
    let started = std::time::Instant::now();

    // 0. Advance tick counter
    world.tick += 1;

    // 1. Drain buffered commands
    result.applied = inputs.apply_all(world, config);

    // 2. Bot decisions, feeding movement like any other commands
    update_bots(world, config);

    // 3. Player movement
    update_movement(world, config);

    // 4. Minion AI
    update_minion_ai(world, config);

    // 5. Collisions
    resolve_collisions(world, config);

    // 6. Combat: cooldowns, regen, attacks, respawns, structures, projectiles
    update_combat(world, config);

    // 7. Team elimination
    check_team_elimination(world);

    // 8. Minion waves
    update_waves(world, config);

    // 9. Win conditions
    if let Some(winner) = check_win_conditions(world) {
        end_match(world, winner);
    }

    result.match_ended = world.is_finished();
    result.winner = world.winner;
    result.events = world.take_events();

    #[cfg(feature = "debug-tracing")]
    tracing::trace!(tick = world.tick, elapsed_us = started.elapsed().as_micros() as u64, "tick");

    result
}

fn end_match(world: &mut WorldState, winner: TeamIndex) {
    world.phase = MatchPhase::Finished;
    world.winner = Some(winner);

    let damage_by_team = world.objective.damage_by_team.clone();
    info!(tick = world.tick, winner, ?damage_by_team, "match ended");
    world.push_event(GameEventData::MatchEnded { winner_team: winner, damage_by_team });
}

/// Replay a recorded match from its seed, roster and command log.
///
/// The roster is `(id, team, is_bot)` in join order. Returns the final world
/// and every event produced.
pub fn replay_match(
    config: &MatchConfig,
    roster: &[(PlayerId, Option<TeamIndex>, bool)],
    log: &InputLog,
    tick_count: u64,
) -> (WorldState, Vec<GameEvent>) {
    let mut world = WorldState::new(config, log.rng_seed);
    for (id, team, is_bot) in roster {
        world.add_player(id.clone(), *team, *is_bot, config);
    }
    start_match(&mut world, config);

    let mut queue = InputQueue::new();
    let mut all_events = Vec::new();

    for _ in 0..tick_count {
        for entry in log.commands_at(world.tick + 1) {
            queue.push(entry.player_id.clone(), entry.command.clone());
        }
        let result = tick(&mut world, &mut queue, config);
        all_events.extend(result.events);
        if result.match_ended {
            break;
        }
    }

    (world, all_events)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::target::TargetRef;

    fn playing_world(config: &MatchConfig, seed: u64) -> WorldState {
        let mut world = WorldState::new(config, seed);
        world.add_player(PlayerId::from("alice"), Some(0), false, config);
        world.add_player(PlayerId::from("bob"), Some(1), false, config);
        start_match(&mut world, config);
        world
    }

    #[test]
    fn test_waiting_match_discards_input() {
        let config = MatchConfig::default();
        let mut world = WorldState::new(&config, 1);
        let mut queue = InputQueue::new();
        queue.push(PlayerId::from("x"), PlayerCommand::Stop);

        let result = tick(&mut world, &mut queue, &config);
        assert!(!result.match_ended);
        assert_eq!(world.tick, 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_start_fills_bots() {
        let config = MatchConfig::default();
        let world = playing_world(&config, 1);
        assert_eq!(world.phase, MatchPhase::Playing);
        assert_eq!(world.players.len(), 12);
        assert!(world.players.contains_key(&PlayerId::from("bot_0_0")));
        assert!(world.players.contains_key(&PlayerId::from("bot_2_2")));
        assert!(!world.players[&PlayerId::from("alice")].is_bot);
        for team in &world.teams {
            assert_eq!(team.players.len(), 3);
        }
    }

    #[test]
    fn test_start_only_once() {
        let config = MatchConfig::default();
        let mut world = playing_world(&config, 1);
        assert!(!start_match(&mut world, &config));
    }

    #[test]
    fn test_tick_applies_input_then_moves() {
        let mut config = MatchConfig::default();
        config.bots.fill_teams = false;
        let mut world = playing_world(&config, 2);
        let alice = PlayerId::from("alice");
        let start = world.players[&alice].position;

        let mut queue = InputQueue::new();
        queue.push(alice.clone(), PlayerCommand::Move { x: start.x + 100.0, y: start.y });
        let result = tick(&mut world, &mut queue, &config);

        assert_eq!(world.tick, 1);
        assert_eq!(result.applied.len(), 1);
        assert!(world.players[&alice].position.x > start.x);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_objective_kill_ends_match_once() {
        let mut config = MatchConfig::default();
        config.bots.fill_teams = false;
        let mut world = playing_world(&config, 3);
        world.objective.damage_by_team.insert(0, 10000.0);
        world.objective.damage_by_team.insert(1, 4000.0);
        world.objective.hp = 0.0;

        let mut queue = InputQueue::new();
        let result = tick(&mut world, &mut queue, &config);
        assert!(result.match_ended);
        assert_eq!(result.winner, Some(0));
        let ended: Vec<_> = result
            .events
            .iter()
            .filter(|e| matches!(e.data, GameEventData::MatchEnded { .. }))
            .collect();
        assert_eq!(ended.len(), 1);

        // Finished is sticky
        let tick_before = world.tick;
        let again = tick(&mut world, &mut queue, &config);
        assert!(again.match_ended);
        assert_eq!(again.winner, Some(0));
        assert!(again.events.is_empty());
        assert_eq!(world.tick, tick_before);
    }

    #[test]
    fn test_last_team_standing() {
        let mut config = MatchConfig::default();
        config.bots.fill_teams = false;
        let mut world = playing_world(&config, 4);
        for t in [1usize, 2, 3] {
            world.teams[t].eliminated = true;
        }

        let result = tick(&mut world, &mut InputQueue::new(), &config);
        assert_eq!(result.winner, Some(0));
        assert_eq!(world.phase, MatchPhase::Finished);
    }

    #[test]
    fn test_tick_determinism() {
        let config = MatchConfig::default();
        let mut a = playing_world(&config, 12345);
        let mut b = playing_world(&config, 12345);
        let mut qa = InputQueue::new();
        let mut qb = InputQueue::new();

        for t in 0..400 {
            if t % 50 == 0 {
                let cmd = PlayerCommand::Move { x: 2000.0, y: 1200.0 + t as f32 };
                qa.push(PlayerId::from("alice"), cmd.clone());
                qb.push(PlayerId::from("alice"), cmd);
            }
            tick(&mut a, &mut qa, &config);
            tick(&mut b, &mut qb, &config);
        }

        assert_eq!(a.tick, b.tick);
        assert_eq!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn test_replay_reproduces_match() {
        let mut config = MatchConfig::default();
        config.waves.base_interval_ms = 2000.0;
        let seed = 777;
        let mut world = WorldState::new(&config, seed);
        let roster = vec![
            (PlayerId::from("alice"), Some(0), false),
            (PlayerId::from("bob"), Some(1), false),
        ];
        for (id, team, is_bot) in &roster {
            world.add_player(id.clone(), *team, *is_bot, &config);
        }
        start_match(&mut world, &config);

        let mut log = InputLog::new(seed);
        let mut queue = InputQueue::new();
        for t in 0..300u64 {
            if t == 10 {
                queue.push(PlayerId::from("alice"), PlayerCommand::Move { x: 2000.0, y: 1500.0 });
            }
            if t == 120 {
                queue.push(PlayerId::from("bob"), PlayerCommand::Attack { target_id: TargetRef::Tower(1).to_string() });
            }
            let result = tick(&mut world, &mut queue, &config);
            log.record(world.tick, &result.applied);
        }

        let (replayed, events) = replay_match(&config, &roster, &log, 300);
        assert_eq!(replayed.tick, world.tick);
        assert_eq!(replayed.compute_hash(), world.compute_hash());
        assert!(events.iter().any(|e| matches!(e.data, GameEventData::WaveSpawned { .. })));
    }

    #[test]
    fn test_replay_reproduces_upgrade_choices() {
        let mut config = MatchConfig::default();
        config.bots.fill_teams = false;
        config.player.attack_range = 5000.0;
        config.leveling.xp_base = 1;
        let seed = 91;
        let alice = PlayerId::from("alice");
        let roster = vec![(alice.clone(), Some(0), false)];

        let mut world = WorldState::new(&config, seed);
        world.add_player(alice.clone(), Some(0), false, &config);
        start_match(&mut world, &config);

        let mut log = InputLog::new(seed);
        let mut queue = InputQueue::new();
        let result = tick(&mut world, &mut queue, &config);
        log.record(world.tick, &result.applied);

        // First structure hit pays for a level-up the human must resolve
        let offered = world.players[&alice].pending_level_ups.front().copied().unwrap();
        queue.push(alice.clone(), PlayerCommand::ChooseUpgrade { choice: offered[0].as_str().to_string() });
        for _ in 0..5 {
            let result = tick(&mut world, &mut queue, &config);
            log.record(world.tick, &result.applied);
        }

        assert!(!world.players[&alice].has_pending_level_up());
        assert!(log.entries().iter().any(|e| matches!(e.command, PlayerCommand::ChooseUpgrade { .. })));

        let (replayed, _) = replay_match(&config, &roster, &log, world.tick);
        assert_eq!(replayed.players[&alice].bonus, world.players[&alice].bonus);
        assert_eq!(replayed.compute_hash(), world.compute_hash());
    }

    #[test]
    fn test_minion_waves_appear_on_schedule() {
        let mut config = MatchConfig::default();
        config.bots.fill_teams = false;
        let mut world = playing_world(&config, 5);
        let ticks = (config.waves.base_interval_ms / config.dt_ms()) as u64;

        let mut queue = InputQueue::new();
        for _ in 0..ticks {
            tick(&mut world, &mut queue, &config);
        }
        assert!(world.minions.len() >= 20);
    }
}
