use battleroom::{
    check_win, find_target, random_fleet, resolve_shot, Cell, PlayerId, RoomId, ShipPlacement,
    ShotResult,
};
use proptest::prelude::*;
use rand::{rngs::SmallRng, SeedableRng};

fn enemy_fleet(seed: u64) -> Vec<ShipPlacement> {
    let mut rng = SmallRng::seed_from_u64(seed);
    random_fleet(&mut rng)
        .unwrap()
        .into_iter()
        .map(|spec| ShipPlacement::new(PlayerId::from("enemy"), RoomId(1), spec))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// The same board and cell always select the same ship.
    #[test]
    fn target_lookup_is_deterministic(seed in any::<u64>(), x in 0u8..10, y in 0u8..10) {
        let fleet = enemy_fleet(seed);
        let cell = Cell::new(x, y);
        prop_assert_eq!(find_target(&fleet, cell), find_target(&fleet, cell));
        let mut first = fleet.clone();
        let mut second = fleet.clone();
        prop_assert_eq!(resolve_shot(&mut first, x, y), resolve_shot(&mut second, x, y));
    }

    /// An untouched non-empty fleet is never a win.
    #[test]
    fn fresh_fleet_is_not_beaten(seed in any::<u64>()) {
        prop_assert!(!check_win(&enemy_fleet(seed)));
    }

    /// Sweeping the whole board sinks every ship exactly once, and only the
    /// final sinking shot completes the win.
    #[test]
    fn full_sweep_sinks_everything(seed in any::<u64>()) {
        let mut fleet = enemy_fleet(seed);
        let mut hits = 0;
        let mut sunk = 0;
        for y in 0..10u8 {
            for x in 0..10u8 {
                prop_assert!(!check_win(&fleet) || hits == 20);
                match resolve_shot(&mut fleet, x, y).outcome {
                    ShotResult::Miss => {}
                    ShotResult::Hit => hits += 1,
                    ShotResult::Sunk => {
                        hits += 1;
                        sunk += 1;
                    }
                }
            }
        }
        prop_assert_eq!(hits, 20);
        prop_assert_eq!(sunk, 10);
        prop_assert!(check_win(&fleet));
    }
}
