//! Target References
//!
//! Units and structures refer to each other through `TargetRef`, never by
//! holding the entity itself. Every system that needs a target's position
//! goes through [`resolve`], so "is this target still valid" has exactly one
//! answer per tick.
//!
//! On the wire a reference is a string: `objective`, `base_<team>`,
//! `tower_<lane>`, `minion_<n>` or a bare player id.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::state::{MinionId, PlayerId, TeamIndex, WorldState};

/// Reference to something a unit can attack or walk toward.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TargetRef {
    /// A player by id
    Player(PlayerId),
    /// A minion by id
    Minion(MinionId),
    /// The central objective
    Objective,
    /// A team's base
    Base(TeamIndex),
    /// The tower in a team's lane
    Tower(TeamIndex),
}

/// Broad category of a resolved target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
    /// Player or minion
    Unit,
    /// Base, tower or objective
    Structure,
}

/// Live data for a valid target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedTarget {
    /// Current position
    pub position: Vec2,
    /// Edge padding for range checks (zero for units)
    pub radius: f32,
    /// Unit or structure
    pub kind: TargetKind,
    /// Allegiance (`None` = neutral)
    pub team: Option<TeamIndex>,
}

impl TargetRef {
    /// Whether the reference names a structure.
    #[inline]
    pub fn is_structure(&self) -> bool {
        matches!(self, TargetRef::Objective | TargetRef::Base(_) | TargetRef::Tower(_))
    }

    /// Parse a wire reference. Unknown prefixes are treated as player ids.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        if s == "objective" {
            return Some(TargetRef::Objective);
        }
        if let Some(rest) = s.strip_prefix("base_") {
            return rest.parse().ok().map(TargetRef::Base);
        }
        if let Some(rest) = s.strip_prefix("tower_") {
            return rest.parse().ok().map(TargetRef::Tower);
        }
        if let Some(id) = MinionId::parse(s) {
            return Some(TargetRef::Minion(id));
        }
        Some(TargetRef::Player(PlayerId::from(s)))
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetRef::Player(id) => write!(f, "{}", id),
            TargetRef::Minion(id) => write!(f, "{}", id),
            TargetRef::Objective => write!(f, "objective"),
            TargetRef::Base(team) => write!(f, "base_{}", team),
            TargetRef::Tower(lane) => write!(f, "tower_{}", lane),
        }
    }
}

impl FromStr for TargetRef {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(())
    }
}

impl From<TargetRef> for String {
    fn from(target: TargetRef) -> Self {
        target.to_string()
    }
}

impl From<String> for TargetRef {
    fn from(s: String) -> Self {
        // Empty strings never reach serde: targets are Option<TargetRef>
        Self::parse(&s).unwrap_or(TargetRef::Player(PlayerId(s)))
    }
}

/// Resolve a reference against the current world.
///
/// Returns `None` for anything that no longer counts as a target: dead
/// players, minions at zero hp, destroyed bases and towers, a destroyed
/// objective, or ids that were never allocated.
pub fn resolve(world: &WorldState, target: &TargetRef) -> Option<ResolvedTarget> {
    match target {
        TargetRef::Player(id) => {
            let p = world.players.get(id).filter(|p| p.alive)?;
            Some(ResolvedTarget {
                position: p.position,
                radius: 0.0,
                kind: TargetKind::Unit,
                team: Some(p.team),
            })
        }
        TargetRef::Minion(id) => {
            let m = world.minions.get(id).filter(|m| m.is_alive())?;
            Some(ResolvedTarget {
                position: m.position,
                radius: 0.0,
                kind: TargetKind::Unit,
                team: m.team,
            })
        }
        TargetRef::Objective => {
            let o = &world.objective;
            (o.hp > 0.0).then(|| ResolvedTarget {
                position: o.position,
                radius: o.radius,
                kind: TargetKind::Structure,
                team: None,
            })
        }
        TargetRef::Base(team) => {
            let b = world.bases.get(team).filter(|b| !b.destroyed)?;
            Some(ResolvedTarget {
                position: b.position,
                radius: b.radius,
                kind: TargetKind::Structure,
                team: Some(b.owner()),
            })
        }
        TargetRef::Tower(lane) => {
            let t = world.towers.get(lane).filter(|t| !t.destroyed)?;
            Some(ResolvedTarget {
                position: t.position,
                radius: t.radius,
                kind: TargetKind::Structure,
                team: None,
            })
        }
    }
}

/// Whether two allegiances fight each other. Neutral units are hostile to
/// every team but not to other neutral units.
#[inline]
pub fn is_hostile(a: Option<TeamIndex>, b: Option<TeamIndex>) -> bool {
    a != b
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::MatchConfig;
    use crate::game::state::MinionKind;

    #[test]
    fn test_parse_wire_forms() {
        assert_eq!(TargetRef::parse("objective"), Some(TargetRef::Objective));
        assert_eq!(TargetRef::parse("base_2"), Some(TargetRef::Base(2)));
        assert_eq!(TargetRef::parse("tower_3"), Some(TargetRef::Tower(3)));
        assert_eq!(TargetRef::parse("minion_17"), Some(TargetRef::Minion(MinionId(17))));
        assert_eq!(
            TargetRef::parse("abc-123"),
            Some(TargetRef::Player(PlayerId::from("abc-123")))
        );
        assert_eq!(TargetRef::parse(""), None);
        assert_eq!(TargetRef::parse("base_x"), None);
    }

    #[test]
    fn test_display_matches_parse() {
        for s in ["objective", "base_0", "tower_1", "minion_5", "bot_2_1"] {
            let parsed = TargetRef::parse(s).unwrap();
            assert_eq!(parsed.to_string(), s);
        }
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&TargetRef::Base(1)).unwrap();
        assert_eq!(json, "\"base_1\"");
        let back: TargetRef = serde_json::from_str("\"tower_2\"").unwrap();
        assert_eq!(back, TargetRef::Tower(2));
    }

    #[test]
    fn test_resolve_validity() {
        let config = MatchConfig::default();
        let mut world = WorldState::new(&config, 1);
        let pid = world.add_player(PlayerId::from("p0"), Some(0), false, &config);
        let mid = world.spawn_minion(MinionKind::Melee, Some(1), Vec2::new(100.0, 100.0), None, &config);

        let p = resolve(&world, &TargetRef::Player(pid.clone())).unwrap();
        assert_eq!(p.kind, TargetKind::Unit);
        assert_eq!(p.radius, 0.0);
        assert_eq!(p.team, Some(0));

        assert!(resolve(&world, &TargetRef::Minion(mid)).is_some());
        assert!(resolve(&world, &TargetRef::Objective).is_some());

        let base = resolve(&world, &TargetRef::Base(1)).unwrap();
        assert_eq!(base.kind, TargetKind::Structure);
        assert_eq!(base.radius, config.structures.base.radius);

        // Invalidate each
        world.players.get_mut(&pid).unwrap().alive = false;
        world.minions.get_mut(&mid).unwrap().hp = 0.0;
        world.objective.hp = 0.0;
        world.bases.get_mut(&1).unwrap().destroyed = true;
        world.towers.get_mut(&2).unwrap().destroyed = true;

        assert!(resolve(&world, &TargetRef::Player(pid)).is_none());
        assert!(resolve(&world, &TargetRef::Minion(mid)).is_none());
        assert!(resolve(&world, &TargetRef::Objective).is_none());
        assert!(resolve(&world, &TargetRef::Base(1)).is_none());
        assert!(resolve(&world, &TargetRef::Tower(2)).is_none());
        assert!(resolve(&world, &TargetRef::Minion(MinionId(999))).is_none());
        assert!(resolve(&world, &TargetRef::Base(9)).is_none());
    }

    #[test]
    fn test_hostility() {
        assert!(is_hostile(Some(0), Some(1)));
        assert!(is_hostile(None, Some(1)));
        assert!(!is_hostile(Some(2), Some(2)));
        assert!(!is_hostile(None, None));
    }
}
