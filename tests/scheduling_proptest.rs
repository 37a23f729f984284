//! Property-based tests for schedule generation and standings.
//!
//! These exercise the pure parts of the engine: format generators, the
//! campus allocator and the tie-break chain. No database involved.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use tourney_engine::results::standings::{standings, MatchOutcome};
use tourney_engine::schedule::campus::{CampusAllocator, CampusScheduleConfig};
use tourney_engine::schedule::formats;
use tourney_engine::schedule::PENDING_SLOT;
use tourney_engine::tournament::models::{PointTable, UserId};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn allocator(campuses: usize, fields: u32) -> CampusAllocator {
    let ids: Vec<i64> = (1..=campuses as i64).collect();
    CampusAllocator::new(
        &ids,
        start(),
        CampusScheduleConfig {
            match_minutes: 60,
            break_minutes: 15,
            parallel_fields: fields,
        },
        &HashMap::new(),
    )
}

fn roster(n: usize) -> Vec<UserId> {
    (1..=n as UserId).collect()
}

// Strategy for a batch of match outcomes over a small roster
fn outcomes_strategy(n: usize) -> impl Strategy<Value = Vec<MatchOutcome>> {
    prop::collection::vec(
        (1..=n as UserId, 1..=n as UserId, 0i64..6, 0i64..6).prop_filter_map(
            "players must differ",
            |(home, away, hg, ag)| {
                (home != away).then_some(MatchOutcome {
                    home,
                    away,
                    home_goals: hg,
                    away_goals: ag,
                })
            },
        ),
        0..30,
    )
}

proptest! {
    #[test]
    fn league_plays_every_pair_exactly_once(n in 2usize..=16) {
        let sessions = formats::league(&roster(n), &mut allocator(2, 2)).unwrap();
        prop_assert_eq!(sessions.len(), n * (n - 1) / 2);

        let mut pairs = HashSet::new();
        for s in &sessions {
            prop_assert_eq!(s.participants.len(), 2);
            let (a, b) = (s.participants[0], s.participants[1]);
            prop_assert_ne!(a, b);
            prop_assert!(pairs.insert((a.min(b), a.max(b))), "pair repeated");
        }
    }

    #[test]
    fn knockout_halves_each_round(k in 1u32..=5) {
        let n = 1usize << k;
        let sessions = formats::knockout(&roster(n), &mut allocator(1, 4)).unwrap();
        prop_assert_eq!(sessions.len(), n - 1);

        for round in 1..=k {
            let in_round = sessions.iter().filter(|s| s.round_number == round).count();
            prop_assert_eq!(in_round, n >> round);
        }
        // Round one holds the full roster, later rounds only placeholders
        let mut first_round: Vec<UserId> = sessions
            .iter()
            .filter(|s| s.round_number == 1)
            .flat_map(|s| s.participants.iter().copied())
            .collect();
        first_round.sort_unstable();
        prop_assert_eq!(first_round, roster(n));
        prop_assert!(sessions
            .iter()
            .filter(|s| s.round_number > 1)
            .all(|s| s.participants.iter().all(|&p| p == PENDING_SLOT)));
    }

    #[test]
    fn bracket_seeds_are_a_permutation(k in 1u32..=6) {
        let n = 1usize << k;
        let sessions = formats::knockout(&roster(n), &mut allocator(1, 1)).unwrap();
        // Each round-one pair's seeds sum to n + 1 under standard seeding
        for s in sessions.iter().filter(|s| s.round_number == 1) {
            prop_assert_eq!(s.participants[0] + s.participants[1], (n + 1) as i64);
        }
    }

    #[test]
    fn group_partition_is_balanced(groups in 2usize..=6, size in 2usize..=5) {
        let n = groups * size;
        let partition = formats::partition_groups(&roster(n), size);
        prop_assert_eq!(partition.len(), groups);

        let mut seen = HashSet::new();
        for group in &partition {
            prop_assert_eq!(group.len(), size);
            for &user in group {
                prop_assert!(seen.insert(user), "user appears in two groups");
            }
        }
        prop_assert_eq!(seen.len(), n);
    }

    #[test]
    fn allocator_never_double_books(
        campuses in 1usize..=3,
        fields in 1u32..=4,
        sessions in 1usize..=40,
    ) {
        let mut alloc = allocator(campuses, fields);
        let mut by_field: HashMap<(i64, u32), Vec<DateTime<Utc>>> = HashMap::new();
        for _ in 0..sessions {
            let slot = alloc.allocate();
            by_field
                .entry((slot.campus_id, slot.field_index))
                .or_default()
                .push(slot.start_time);
        }
        for starts in by_field.values() {
            for pair in starts.windows(2) {
                prop_assert!(pair[1] - pair[0] >= chrono::Duration::minutes(60));
            }
        }
    }

    #[test]
    fn standings_are_deterministic_and_total(
        outcomes in outcomes_strategy(6),
        shuffle_seed in any::<u64>(),
    ) {
        let table = PointTable::default();
        let players = roster(6);
        let forward = standings(&players, &outcomes, &table);

        // Same outcomes in a different order produce the identical table
        let mut shuffled = outcomes.clone();
        let len = shuffled.len();
        if len > 1 {
            for i in 0..len {
                let j = (shuffle_seed as usize).wrapping_mul(i + 1) % len;
                shuffled.swap(i, j);
            }
        }
        let reordered = standings(&players, &shuffled, &table);
        prop_assert_eq!(&forward, &reordered);

        // Every player ranked exactly once
        let ranked: HashSet<UserId> = forward.iter().map(|s| s.user_id).collect();
        prop_assert_eq!(ranked.len(), players.len());
    }

    #[test]
    fn standings_points_match_record(outcomes in outcomes_strategy(5)) {
        let table = PointTable::default();
        for s in standings(&roster(5), &outcomes, &table) {
            prop_assert_eq!(s.played, s.wins + s.draws + s.losses);
            prop_assert_eq!(
                s.points,
                s.wins as i64 * table.win + s.draws as i64 * table.draw + s.losses as i64 * table.loss
            );
        }
    }

    #[test]
    fn swiss_pairs_cover_an_even_field(half in 1usize..=8, seed in any::<u64>()) {
        let n = half * 2;
        let order = roster(n);
        // A pseudo-random set of already-played pairs
        let mut played = HashSet::new();
        for a in 1..=n as UserId {
            for b in (a + 1)..=n as UserId {
                if seed.wrapping_mul(a as u64 + 7).wrapping_add(b as u64) % 3 == 0 {
                    played.insert((a, b));
                }
            }
        }

        let pairs = formats::swiss_pairs(&order, &played);
        prop_assert_eq!(pairs.len(), half);
        let mut seen = HashSet::new();
        for (a, b) in pairs {
            prop_assert_ne!(a, b);
            prop_assert!(seen.insert(a));
            prop_assert!(seen.insert(b));
        }
        prop_assert_eq!(seen.len(), n);
    }

    #[test]
    fn swiss_avoids_rematches_when_possible(half in 1usize..=6) {
        let n = half * 2;
        let order = roster(n);
        // Only round-one pairs played so far: (i, i + half)
        let played: HashSet<(UserId, UserId)> =
            (1..=half as UserId).map(|i| (i, i + half as UserId)).collect();

        for (a, b) in formats::swiss_pairs(&order, &played) {
            let key = (a.min(b), a.max(b));
            // With one round played a rematch is always avoidable for n >= 4
            if n >= 4 {
                prop_assert!(!played.contains(&key), "rematch {key:?}");
            }
        }
    }
}
