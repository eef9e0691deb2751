//! XP and Upgrades
//!
//! Players earn XP from kills and structure hits. Each level-up offers two
//! distinct upgrades drawn from the world RNG: bots take one immediately,
//! humans get a pending choice resolved by a later `level_up_choice` message.

use std::fmt;

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::game::config::{LevelingConfig, MatchConfig};
use crate::game::events::GameEventData;
use crate::game::state::{Player, PlayerId, WorldState};

/// Stat an upgrade raises.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpgradeKind {
    /// Attack damage
    Damage,
    /// Max hp (also heals by the same amount)
    MaxHp,
    /// Movement speed
    Speed,
    /// Regeneration
    Regen,
    /// Flat damage reduction
    Defense,
}

/// Every upgrade, in draw order.
pub const ALL_UPGRADES: [UpgradeKind; 5] = [
    UpgradeKind::Damage,
    UpgradeKind::MaxHp,
    UpgradeKind::Speed,
    UpgradeKind::Regen,
    UpgradeKind::Defense,
];

impl UpgradeKind {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            UpgradeKind::Damage => "damage",
            UpgradeKind::MaxHp => "maxHp",
            UpgradeKind::Speed => "speed",
            UpgradeKind::Regen => "regen",
            UpgradeKind::Defense => "defense",
        }
    }

    /// Parse the wire name.
    pub fn parse(s: &str) -> Option<Self> {
        ALL_UPGRADES.into_iter().find(|k| k.as_str() == s)
    }

    /// Configured increment for this stat.
    pub fn increment(self, config: &LevelingConfig) -> f32 {
        match self {
            UpgradeKind::Damage => config.damage_increment,
            UpgradeKind::MaxHp => config.max_hp_increment,
            UpgradeKind::Speed => config.speed_increment,
            UpgradeKind::Regen => config.regen_increment,
            UpgradeKind::Defense => config.defense_increment,
        }
    }
}

impl fmt::Display for UpgradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// XP needed to go from `level` to `level + 1`.
#[inline]
pub fn xp_for_level(level: u32, config: &LevelingConfig) -> u32 {
    config.xp_base + config.xp_per_level * level.saturating_sub(1)
}

/// Raise the stat named by `kind` by its increment.
pub fn apply_upgrade(player: &mut Player, kind: UpgradeKind, config: &LevelingConfig) {
    let inc = kind.increment(config);
    match kind {
        UpgradeKind::Damage => player.bonus.damage += inc,
        UpgradeKind::MaxHp => {
            player.bonus.max_hp += inc;
            player.max_hp += inc;
            if player.alive {
                player.hp += inc;
            }
        }
        UpgradeKind::Speed => player.bonus.speed += inc,
        UpgradeKind::Regen => player.bonus.regen += inc,
        UpgradeKind::Defense => player.bonus.defense += inc,
    }
}

/// Grant XP, processing every level-up it pays for.
///
/// XP stops accruing at the level cap.
pub fn award_xp(world: &mut WorldState, player_id: &PlayerId, amount: u32, config: &MatchConfig) {
    let cfg = &config.leveling;
    let mut events = Vec::new();

    {
        let Some(player) = world.players.get_mut(player_id) else {
            return;
        };
        if amount == 0 || player.level >= cfg.max_level {
            return;
        }

        player.xp += amount;
        while player.level < cfg.max_level && player.xp >= player.xp_to_next_level {
            player.xp -= player.xp_to_next_level;
            player.level += 1;
            player.xp_to_next_level = xp_for_level(player.level, cfg);

            let Some(choices) = world.rng.choose_two(&ALL_UPGRADES) else {
                continue;
            };
            debug!(player = %player.id, level = player.level, ?choices, "level up");
            events.push(GameEventData::LevelUp {
                player: player.id.clone(),
                level: player.level,
                choices,
                is_bot: player.is_bot,
            });

            if player.is_bot {
                let pick = if world.rng.next_int(2) == 0 { choices[0] } else { choices[1] };
                apply_upgrade(player, pick, cfg);
                events.push(GameEventData::UpgradeApplied { player: player.id.clone(), kind: pick });
            } else {
                player.pending_level_ups.push_back(choices);
            }
        }

        if player.level >= cfg.max_level {
            player.xp = 0;
        }
    }

    for event in events {
        world.push_event(event);
    }
}

/// Resolve the oldest pending level-up of a human player.
///
/// Returns `false` (and changes nothing) when no choice is pending or the
/// pick was not one of the two offered.
pub fn choose_upgrade(world: &mut WorldState, player_id: &PlayerId, kind: UpgradeKind, config: &MatchConfig) -> bool {
    let Some(player) = world.players.get_mut(player_id) else {
        return false;
    };
    let offered = match player.pending_level_ups.front() {
        Some(pair) => pair.contains(&kind),
        None => false,
    };
    if !offered {
        return false;
    }

    player.pending_level_ups.pop_front();
    apply_upgrade(player, kind, &config.leveling);
    let id = player.id.clone();
    world.push_event(GameEventData::UpgradeApplied { player: id, kind });
    true
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::BonusStats;
    use proptest::prelude::*;

    fn setup(is_bot: bool) -> (WorldState, PlayerId, MatchConfig) {
        let config = MatchConfig::default();
        let mut world = WorldState::new(&config, 11);
        let id = world.add_player(PlayerId::from("p"), Some(0), is_bot, &config);
        (world, id, config)
    }

    #[test]
    fn test_upgrade_names_round_trip() {
        for kind in ALL_UPGRADES {
            assert_eq!(UpgradeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(UpgradeKind::parse("mana"), None);
        assert_eq!(serde_json::to_string(&UpgradeKind::MaxHp).unwrap(), "\"maxHp\"");
    }

    #[test]
    fn test_xp_curve() {
        let cfg = LevelingConfig::default();
        assert_eq!(xp_for_level(1, &cfg), 100);
        assert_eq!(xp_for_level(2, &cfg), 150);
        assert_eq!(xp_for_level(5, &cfg), 300);
    }

    #[test]
    fn test_human_level_up_is_pending() {
        let (mut world, id, config) = setup(false);
        award_xp(&mut world, &id, 120, &config);

        let p = &world.players[&id];
        assert_eq!(p.level, 2);
        assert_eq!(p.xp, 20);
        assert_eq!(p.xp_to_next_level, 150);
        assert!(p.has_pending_level_up());
        let [a, b] = p.pending_level_ups[0];
        assert_ne!(a, b);
        // Nothing applied yet
        assert_eq!(p.bonus, BonusStats::default());

        let events = world.take_events();
        assert!(matches!(events[0].data, GameEventData::LevelUp { level: 2, is_bot: false, .. }));
    }

    #[test]
    fn test_bot_level_up_auto_applies() {
        let (mut world, id, config) = setup(true);
        award_xp(&mut world, &id, 100, &config);

        let p = &world.players[&id];
        assert_eq!(p.level, 2);
        assert!(!p.has_pending_level_up());
        assert_ne!(p.bonus, BonusStats::default());

        let events = world.take_events();
        assert!(events.iter().any(|e| matches!(e.data, GameEventData::UpgradeApplied { .. })));
    }

    #[test]
    fn test_multiple_level_ups_queue() {
        let (mut world, id, config) = setup(false);
        // 100 + 150 = 250 pays for two levels
        award_xp(&mut world, &id, 260, &config);
        let p = &world.players[&id];
        assert_eq!(p.level, 3);
        assert_eq!(p.xp, 10);
        assert_eq!(p.pending_level_ups.len(), 2);
    }

    #[test]
    fn test_level_cap() {
        let (mut world, id, config) = setup(true);
        award_xp(&mut world, &id, 1_000_000, &config);
        let p = &world.players[&id];
        assert_eq!(p.level, config.leveling.max_level);
        assert_eq!(p.xp, 0);

        award_xp(&mut world, &id, 500, &config);
        assert_eq!(world.players[&id].xp, 0);
    }

    #[test]
    fn test_choose_upgrade_applies_offered_choice() {
        let (mut world, id, config) = setup(false);
        award_xp(&mut world, &id, 100, &config);
        let [offered, _] = world.players[&id].pending_level_ups[0];

        assert!(choose_upgrade(&mut world, &id, offered, &config));
        let p = &world.players[&id];
        assert!(!p.has_pending_level_up());

        // Already resolved: no-op
        let before = p.bonus;
        assert!(!choose_upgrade(&mut world, &id, offered, &config));
        assert_eq!(world.players[&id].bonus, before);
    }

    #[test]
    fn test_choose_upgrade_rejects_unlisted() {
        let (mut world, id, config) = setup(false);
        award_xp(&mut world, &id, 100, &config);
        let pair = world.players[&id].pending_level_ups[0];
        let unlisted = ALL_UPGRADES.into_iter().find(|k| !pair.contains(k)).unwrap();

        assert!(!choose_upgrade(&mut world, &id, unlisted, &config));
        assert!(world.players[&id].has_pending_level_up());
        assert_eq!(world.players[&id].bonus, BonusStats::default());
    }

    #[test]
    fn test_max_hp_upgrade_heals() {
        let (mut world, id, config) = setup(false);
        let p = world.players.get_mut(&id).unwrap();
        p.hp = 300.0;
        apply_upgrade(p, UpgradeKind::MaxHp, &config.leveling);
        assert_eq!(p.max_hp, 550.0);
        assert_eq!(p.hp, 350.0);
        assert_eq!(p.bonus.max_hp, 50.0);
    }

    fn bonus_of(b: &BonusStats, kind: UpgradeKind) -> f32 {
        match kind {
            UpgradeKind::Damage => b.damage,
            UpgradeKind::MaxHp => b.max_hp,
            UpgradeKind::Speed => b.speed,
            UpgradeKind::Regen => b.regen,
            UpgradeKind::Defense => b.defense,
        }
    }

    proptest! {
        #[test]
        fn prop_upgrades_accumulate_additively(picks in proptest::collection::vec(0usize..5, 0..20)) {
            let config = MatchConfig::default();
            let mut player = Player::new(PlayerId::from("p"), 0, Default::default(), false, &config);
            for &i in &picks {
                apply_upgrade(&mut player, ALL_UPGRADES[i], &config.leveling);
            }
            for kind in ALL_UPGRADES {
                let n = picks.iter().filter(|&&i| ALL_UPGRADES[i] == kind).count() as f32;
                let expected = n * kind.increment(&config.leveling);
                prop_assert!((bonus_of(&player.bonus, kind) - expected).abs() < 1e-3);
            }
        }
    }
}
