//! Win Conditions

use crate::game::state::{TeamIndex, WorldState};

/// Team with the most cumulative objective damage.
///
/// Scans in team order and only a strictly larger total replaces the
/// leader, so ties go to the lower team index and an all-zero tally goes to
/// team 0.
pub fn team_with_most_objective_damage(world: &WorldState) -> TeamIndex {
    let mut best_team = 0;
    let mut best_damage = 0.0;
    for (&team, &damage) in &world.objective.damage_by_team {
        if damage > best_damage {
            best_damage = damage;
            best_team = team;
        }
    }
    best_team
}

/// Evaluate win conditions. Returns the winning team, if any.
///
/// 1. Objective destroyed: most objective damage wins.
/// 2. Exactly one team left: that team wins.
/// 3. No team left: most objective damage wins.
pub fn check_win_conditions(world: &WorldState) -> Option<TeamIndex> {
    if world.objective.hp <= 0.0 {
        return Some(team_with_most_objective_damage(world));
    }

    let mut surviving = world.teams.iter().filter(|t| !t.eliminated).map(|t| t.index);
    match (surviving.next(), surviving.next()) {
        (Some(last), None) => Some(last),
        (None, _) => Some(team_with_most_objective_damage(world)),
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::MatchConfig;

    fn world() -> WorldState {
        WorldState::new(&MatchConfig::default(), 3)
    }

    #[test]
    fn test_match_continues() {
        assert_eq!(check_win_conditions(&world()), None);
    }

    #[test]
    fn test_objective_destroyed_most_damage_wins() {
        let mut w = world();
        w.objective.damage_by_team.insert(0, 10000.0);
        w.objective.damage_by_team.insert(1, 4000.0);
        w.objective.hp = 0.0;

        assert_eq!(check_win_conditions(&w), Some(0));
        let tally: Vec<f32> = w.objective.damage_by_team.values().copied().collect();
        assert_eq!(tally, vec![10000.0, 4000.0, 0.0, 0.0]);
    }

    #[test]
    fn test_equal_damage_goes_to_first_team_scanned() {
        let mut w = world();
        w.objective.damage_by_team.insert(1, 5000.0);
        w.objective.damage_by_team.insert(3, 5000.0);
        w.objective.hp = 0.0;
        assert_eq!(check_win_conditions(&w), Some(1));
    }

    #[test]
    fn test_last_team_standing() {
        let mut w = world();
        for t in [0, 1, 3] {
            w.teams[t].eliminated = true;
        }
        assert_eq!(check_win_conditions(&w), Some(2));
    }

    #[test]
    fn test_everyone_eliminated_falls_back_to_damage() {
        let mut w = world();
        for team in w.teams.iter_mut() {
            team.eliminated = true;
        }
        w.objective.damage_by_team.insert(2, 10.0);
        assert_eq!(check_win_conditions(&w), Some(2));
    }

    #[test]
    fn test_no_damage_at_all_defaults_to_team_zero() {
        let mut w = world();
        w.objective.hp = 0.0;
        assert_eq!(check_win_conditions(&w), Some(0));
    }
}
