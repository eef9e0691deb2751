//! Radial Map Geometry
//!
//! Teams sit on evenly spaced bearings around the map center. Team 0 faces
//! north; bearings advance clockwise in screen space (y grows downward).
//! Spawns, bases, towers and bot waypoints are all points on a team's
//! bearing at some fraction of the map radius.

use std::f32::consts::PI;

use crate::core::vec2::Vec2;
use crate::game::config::MapConfig;
use crate::game::state::TeamIndex;

/// Map center.
#[inline]
pub fn center(map: &MapConfig) -> Vec2 {
    Vec2::new(map.radius, map.radius)
}

/// Bearing of a team's lane from the center, in radians.
#[inline]
pub fn team_angle(team: TeamIndex, num_teams: u8) -> f32 {
    (team as f32 / num_teams as f32) * 2.0 * PI - PI / 2.0
}

/// Point on a team's bearing at `fraction` of the map radius.
pub fn ring_point(map: &MapConfig, team: TeamIndex, fraction: f32) -> Vec2 {
    center(map).polar_offset(team_angle(team, map.num_teams), map.radius * fraction)
}

/// Initial player spawn for a team.
#[inline]
pub fn spawn_position(map: &MapConfig, team: TeamIndex) -> Vec2 {
    ring_point(map, team, map.spawn_ring)
}

/// Base location for a team.
#[inline]
pub fn base_position(map: &MapConfig, team: TeamIndex) -> Vec2 {
    ring_point(map, team, map.base_ring)
}

/// Lane tower location for a team's lane.
#[inline]
pub fn tower_position(map: &MapConfig, team: TeamIndex) -> Vec2 {
    ring_point(map, team, map.tower_ring)
}

/// Wrap an angle into [-PI, PI].
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a < -PI {
        a += 2.0 * PI;
    }
    a
}

/// Half-width of a lane wedge.
#[inline]
pub fn lane_half_width(num_teams: u8, width_factor: f32) -> f32 {
    PI / (num_teams as f32 * width_factor)
}

/// Whether `pos` lies inside `team`'s lane wedge.
pub fn is_in_lane(map: &MapConfig, team: TeamIndex, pos: Vec2, width_factor: f32) -> bool {
    let bearing = center(map).angle_to(pos);
    let diff = normalize_angle(bearing - team_angle(team, map.num_teams));
    diff.abs() <= lane_half_width(map.num_teams, width_factor)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-2
    }

    #[test]
    fn test_team_zero_faces_north() {
        let map = MapConfig::default();
        let base = base_position(&map, 0);
        assert!(approx(base.x, 2000.0));
        assert!(approx(base.y, 2000.0 - 0.85 * 2000.0));

        let spawn = spawn_position(&map, 0);
        assert!(approx(spawn.y, 2000.0 - 0.75 * 2000.0));
    }

    #[test]
    fn test_bases_evenly_spaced() {
        let map = MapConfig::default();
        let c = center(&map);
        for team in 0..map.num_teams {
            let d = base_position(&map, team).distance(c);
            assert!(approx(d, 1700.0));
        }
        // Team 1 sits east of center
        let east = base_position(&map, 1);
        assert!(east.x > c.x + 1600.0);
    }

    #[test]
    fn test_is_in_lane() {
        let map = MapConfig::default();
        let tower0 = tower_position(&map, 0);
        assert!(is_in_lane(&map, 0, tower0, 0.8));
        assert!(!is_in_lane(&map, 1, tower0, 0.8));
        assert!(is_in_lane(&map, 1, tower_position(&map, 1), 0.8));
    }

    #[test]
    fn test_lane_wedge_wraps_past_pi() {
        // Team 2 faces south at +PI/2; team 3 faces west at PI.
        // A point just below the west axis must still count as team 3's lane.
        let map = MapConfig::default();
        let c = center(&map);
        let p = Vec2::new(c.x - 500.0, c.y - 10.0);
        assert!(is_in_lane(&map, 3, p, 0.8));
        let q = Vec2::new(c.x - 500.0, c.y + 10.0);
        assert!(is_in_lane(&map, 3, q, 0.8));
    }

    proptest! {
        #[test]
        fn prop_normalize_angle_in_range(a in -100.0f32..100.0) {
            let n = normalize_angle(a);
            prop_assert!(n >= -PI - 1e-4 && n <= PI + 1e-4);
            // Same direction as the input
            prop_assert!((n.cos() - a.cos()).abs() < 1e-3);
            prop_assert!((n.sin() - a.sin()).abs() < 1e-3);
        }
    }
}
