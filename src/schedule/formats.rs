//! Pure schedule generators, one per competition format.
//!
//! Every generator is deterministic in the roster's seeding order and fails
//! fast (creating nothing) when the roster cardinality is invalid for the
//! format. Venue assignment comes from the caller's [`CampusAllocator`];
//! generators call `sync_phase` between rounds so cross-campus phases stay
//! aligned.

use super::campus::CampusAllocator;
use super::errors::{ScheduleError, ScheduleResult};
use super::models::{knockout_round_label, PlannedSession, PENDING_SLOT};
use crate::tournament::models::{TournamentFormat, UserId};
use std::collections::HashSet;

/// All rounds of a circle-method round robin.
///
/// Odd rosters get a bye each round (the pair is simply dropped).
fn round_robin_rounds(roster: &[UserId]) -> Vec<Vec<(UserId, UserId)>> {
    let mut players: Vec<UserId> = roster.to_vec();
    if players.len() % 2 == 1 {
        players.push(PENDING_SLOT); // bye marker
    }
    let m = players.len();
    let mut rounds = Vec::with_capacity(m - 1);

    for _ in 0..m - 1 {
        let mut pairs = Vec::with_capacity(m / 2);
        for i in 0..m / 2 {
            let (a, b) = (players[i], players[m - 1 - i]);
            if a != PENDING_SLOT && b != PENDING_SLOT {
                pairs.push((a, b));
            }
        }
        rounds.push(pairs);
        // Rotate everyone but the first player
        let last = players.pop().expect("roster is non-empty");
        players.insert(1, last);
    }
    rounds
}

/// HEAD_TO_HEAD: every unordered pair exactly once, `n*(n-1)/2` sessions.
pub fn league(roster: &[UserId], alloc: &mut CampusAllocator) -> ScheduleResult<Vec<PlannedSession>> {
    if roster.len() < 2 {
        return Err(ScheduleError::InvalidRosterCardinality {
            format: TournamentFormat::HeadToHead,
            size: roster.len(),
        });
    }

    let mut sessions = Vec::new();
    for (round_idx, pairs) in round_robin_rounds(roster).into_iter().enumerate() {
        let round = round_idx as u32 + 1;
        for (home, away) in pairs {
            let slot = alloc.allocate();
            sessions.push(PlannedSession {
                campus_id: slot.campus_id,
                field_index: slot.field_index,
                scheduled_at: slot.start_time,
                phase: format!("league-round-{round}"),
                round_number: round,
                bracket_slot: None,
                participants: vec![home, away],
            });
        }
        alloc.sync_phase();
    }
    Ok(sessions)
}

/// Standard bracket seeding order for a field of `n = 2^k`.
///
/// Position pairs read off as round-one matches: seed 1 meets seed n,
/// and the top two seeds cannot meet before the final.
pub(crate) fn bracket_seeds(n: usize) -> Vec<usize> {
    debug_assert!(n.is_power_of_two());
    let mut seeds = vec![1usize];
    while seeds.len() < n {
        let m = seeds.len() * 2;
        let mut next = Vec::with_capacity(m);
        for &s in &seeds {
            next.push(s);
            next.push(m + 1 - s);
        }
        seeds = next;
    }
    seeds
}

/// KNOCKOUT: single elimination over a power-of-two roster.
///
/// Produces `n-1` sessions across `log2(n)` rounds. Round one carries real
/// participants in seeded order; later rounds hold [`PENDING_SLOT`]
/// placeholders that result submission fills as winners propagate.
pub fn knockout(roster: &[UserId], alloc: &mut CampusAllocator) -> ScheduleResult<Vec<PlannedSession>> {
    let n = roster.len();
    if n < 2 || !n.is_power_of_two() {
        return Err(ScheduleError::InvalidRosterCardinality {
            format: TournamentFormat::Knockout,
            size: n,
        });
    }

    let total_rounds = n.trailing_zeros();
    let seeds = bracket_seeds(n);
    let mut sessions = Vec::with_capacity(n - 1);

    for round in 1..=total_rounds {
        let matches_in_round = n >> round;
        let label = knockout_round_label(round, total_rounds);
        for slot in 0..matches_in_round {
            let participants = if round == 1 {
                vec![roster[seeds[2 * slot] - 1], roster[seeds[2 * slot + 1] - 1]]
            } else {
                vec![PENDING_SLOT, PENDING_SLOT]
            };
            let assignment = alloc.allocate();
            sessions.push(PlannedSession {
                campus_id: assignment.campus_id,
                field_index: assignment.field_index,
                scheduled_at: assignment.start_time,
                phase: label.clone(),
                round_number: round,
                bracket_slot: Some(slot as u32),
                participants,
            });
        }
        alloc.sync_phase();
    }
    Ok(sessions)
}

/// Serpentine partition of a seeded roster into `n / group_size` groups.
///
/// Seeds snake across groups (A B C, C B A, ...) so group strength stays
/// balanced.
pub fn partition_groups(roster: &[UserId], group_size: usize) -> Vec<Vec<UserId>> {
    let group_count = roster.len() / group_size;
    let mut groups: Vec<Vec<UserId>> = vec![Vec::with_capacity(group_size); group_count];
    for (idx, &user) in roster.iter().enumerate() {
        let pass = idx / group_count;
        let offset = idx % group_count;
        let group = if pass % 2 == 0 {
            offset
        } else {
            group_count - 1 - offset
        };
        groups[group].push(user);
    }
    groups
}

/// Phase label for group `g` (0-based): `group-A`, `group-B`, ...
pub fn group_label(group: usize) -> String {
    format!("group-{}", (b'A' + group as u8) as char)
}

/// GROUP_KNOCKOUT group stage: a round robin inside each group, with all
/// groups' matching rounds interleaved between phase syncs.
///
/// The knockout stage is generated separately once group results exist.
pub fn group_stage(
    roster: &[UserId],
    group_size: usize,
    alloc: &mut CampusAllocator,
) -> ScheduleResult<Vec<PlannedSession>> {
    let n = roster.len();
    if n < group_size * 2 || n % group_size != 0 {
        return Err(ScheduleError::InvalidRosterCardinality {
            format: TournamentFormat::GroupKnockout,
            size: n,
        });
    }

    let groups = partition_groups(roster, group_size);
    let group_rounds: Vec<Vec<Vec<(UserId, UserId)>>> =
        groups.iter().map(|g| round_robin_rounds(g)).collect();
    let rounds_per_group = group_rounds.iter().map(Vec::len).max().unwrap_or(0);

    let mut sessions = Vec::new();
    for round_idx in 0..rounds_per_group {
        let round = round_idx as u32 + 1;
        for (group_idx, rounds) in group_rounds.iter().enumerate() {
            let Some(pairs) = rounds.get(round_idx) else {
                continue;
            };
            for &(home, away) in pairs {
                let slot = alloc.allocate();
                sessions.push(PlannedSession {
                    campus_id: slot.campus_id,
                    field_index: slot.field_index,
                    scheduled_at: slot.start_time,
                    phase: group_label(group_idx),
                    round_number: round,
                    bracket_slot: None,
                    participants: vec![home, away],
                });
            }
        }
        alloc.sync_phase();
    }
    Ok(sessions)
}

/// INDIVIDUAL_RANKING: one session per round, all participants together.
pub fn individual_rounds(
    roster: &[UserId],
    rounds: u32,
    alloc: &mut CampusAllocator,
) -> ScheduleResult<Vec<PlannedSession>> {
    if roster.len() < 2 {
        return Err(ScheduleError::InvalidRosterCardinality {
            format: TournamentFormat::IndividualRanking,
            size: roster.len(),
        });
    }
    if rounds == 0 {
        return Err(ScheduleError::MissingRoundCount);
    }

    let mut sessions = Vec::with_capacity(rounds as usize);
    for round in 1..=rounds {
        let slot = alloc.allocate();
        sessions.push(PlannedSession {
            campus_id: slot.campus_id,
            field_index: slot.field_index,
            scheduled_at: slot.start_time,
            phase: format!("round-{round}"),
            round_number: round,
            bracket_slot: None,
            participants: roster.to_vec(),
        });
        alloc.sync_phase();
    }
    Ok(sessions)
}

/// Swiss round one: top half of the seeding order meets the bottom half.
pub fn swiss_opening_pairs(roster: &[UserId]) -> ScheduleResult<Vec<(UserId, UserId)>> {
    let n = roster.len();
    if n < 2 || n % 2 != 0 {
        return Err(ScheduleError::InvalidRosterCardinality {
            format: TournamentFormat::Swiss,
            size: n,
        });
    }
    Ok((0..n / 2).map(|i| (roster[i], roster[i + n / 2])).collect())
}

/// Pair an even field by running standings, greedily avoiding rematches.
///
/// `order` is the current standings order, best first; `played` holds
/// normalized (low, high) pairs that already met. When every remaining
/// opponent is a rematch the closest-ranked one is taken anyway.
pub fn swiss_pairs(
    order: &[UserId],
    played: &HashSet<(UserId, UserId)>,
) -> Vec<(UserId, UserId)> {
    let normalized = |a: UserId, b: UserId| (a.min(b), a.max(b));
    let mut remaining: Vec<UserId> = order.to_vec();
    let mut pairs = Vec::with_capacity(order.len() / 2);

    while remaining.len() >= 2 {
        let first = remaining.remove(0);
        let opponent_idx = remaining
            .iter()
            .position(|&other| !played.contains(&normalized(first, other)))
            .unwrap_or(0);
        let opponent = remaining.remove(opponent_idx);
        pairs.push((first, opponent));
    }
    pairs
}

/// Materialize one swiss round from its pairs.
pub fn swiss_round(
    pairs: &[(UserId, UserId)],
    round: u32,
    alloc: &mut CampusAllocator,
) -> Vec<PlannedSession> {
    let sessions = pairs
        .iter()
        .map(|&(home, away)| {
            let slot = alloc.allocate();
            PlannedSession {
                campus_id: slot.campus_id,
                field_index: slot.field_index,
                scheduled_at: slot.start_time,
                phase: format!("swiss-round-{round}"),
                round_number: round,
                bracket_slot: None,
                participants: vec![home, away],
            }
        })
        .collect();
    alloc.sync_phase();
    sessions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::campus::CampusScheduleConfig;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn alloc() -> CampusAllocator {
        CampusAllocator::new(
            &[1],
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            CampusScheduleConfig {
                match_minutes: 60,
                break_minutes: 15,
                parallel_fields: 4,
            },
            &HashMap::new(),
        )
    }

    fn roster(n: usize) -> Vec<UserId> {
        (1..=n as UserId).collect()
    }

    #[test]
    fn test_league_pair_count_and_uniqueness() {
        let sessions = league(&roster(8), &mut alloc()).unwrap();
        assert_eq!(sessions.len(), 28); // 8*7/2

        let mut pairs = HashSet::new();
        for s in &sessions {
            let (a, b) = (s.participants[0], s.participants[1]);
            assert!(pairs.insert((a.min(b), a.max(b))), "pair scheduled twice");
        }
        assert_eq!(pairs.len(), 28);
    }

    #[test]
    fn test_league_odd_roster_gets_byes() {
        let sessions = league(&roster(5), &mut alloc()).unwrap();
        assert_eq!(sessions.len(), 10); // 5*4/2
        assert!(sessions.iter().all(|s| !s.participants.contains(&PENDING_SLOT)));
    }

    #[test]
    fn test_league_rejects_single_player() {
        assert!(matches!(
            league(&roster(1), &mut alloc()),
            Err(ScheduleError::InvalidRosterCardinality { size: 1, .. })
        ));
    }

    #[test]
    fn test_bracket_seeds_standard_orders() {
        assert_eq!(bracket_seeds(2), vec![1, 2]);
        assert_eq!(bracket_seeds(4), vec![1, 4, 2, 3]);
        assert_eq!(bracket_seeds(8), vec![1, 8, 4, 5, 2, 7, 3, 6]);
    }

    #[test]
    fn test_knockout_counts_and_labels() {
        let sessions = knockout(&roster(8), &mut alloc()).unwrap();
        assert_eq!(sessions.len(), 7); // 4 + 2 + 1

        let by_round = |r: u32| sessions.iter().filter(|s| s.round_number == r).count();
        assert_eq!(by_round(1), 4);
        assert_eq!(by_round(2), 2);
        assert_eq!(by_round(3), 1);
        assert!(sessions.iter().filter(|s| s.round_number == 1).all(|s| s.phase == "quarterfinal"));
        assert_eq!(sessions.last().unwrap().phase, "final");
    }

    #[test]
    fn test_knockout_round_one_is_seeded() {
        let sessions = knockout(&roster(4), &mut alloc()).unwrap();
        // Seeds [1,4,2,3]: slot 0 is 1v4, slot 1 is 2v3
        assert_eq!(sessions[0].participants, vec![1, 4]);
        assert_eq!(sessions[1].participants, vec![2, 3]);
        // Final awaits winners
        assert_eq!(sessions[2].participants, vec![PENDING_SLOT, PENDING_SLOT]);
    }

    #[test]
    fn test_knockout_rejects_non_power_of_two() {
        for n in [3, 5, 6, 7, 12] {
            assert!(matches!(
                knockout(&roster(n), &mut alloc()),
                Err(ScheduleError::InvalidRosterCardinality { .. })
            ));
        }
    }

    #[test]
    fn test_serpentine_partition_balances_seeds() {
        let groups = partition_groups(&roster(8), 4);
        assert_eq!(groups.len(), 2);
        // Snake: A gets 1, B gets 2, then B gets 3, A gets 4 ...
        assert_eq!(groups[0], vec![1, 4, 5, 8]);
        assert_eq!(groups[1], vec![2, 3, 6, 7]);
    }

    #[test]
    fn test_group_stage_counts() {
        let sessions = group_stage(&roster(8), 4, &mut alloc()).unwrap();
        // Two groups of 4, each a 6-match round robin
        assert_eq!(sessions.len(), 12);
        assert_eq!(sessions.iter().filter(|s| s.phase == "group-A").count(), 6);
        assert_eq!(sessions.iter().filter(|s| s.phase == "group-B").count(), 6);
    }

    #[test]
    fn test_group_stage_rejects_indivisible_roster() {
        assert!(matches!(
            group_stage(&roster(7), 4, &mut alloc()),
            Err(ScheduleError::InvalidRosterCardinality { size: 7, .. })
        ));
        // A single group is not a group stage
        assert!(group_stage(&roster(4), 4, &mut alloc()).is_err());
    }

    #[test]
    fn test_individual_rounds() {
        let sessions = individual_rounds(&roster(6), 3, &mut alloc()).unwrap();
        assert_eq!(sessions.len(), 3);
        assert!(sessions.iter().all(|s| s.participants.len() == 6));
        assert_eq!(sessions[2].phase, "round-3");
        assert!(matches!(
            individual_rounds(&roster(6), 0, &mut alloc()),
            Err(ScheduleError::MissingRoundCount)
        ));
    }

    #[test]
    fn test_swiss_opening_splits_halves() {
        let pairs = swiss_opening_pairs(&roster(6)).unwrap();
        assert_eq!(pairs, vec![(1, 4), (2, 5), (3, 6)]);
        assert!(swiss_opening_pairs(&roster(5)).is_err());
    }

    #[test]
    fn test_swiss_pairs_avoid_rematches() {
        let mut played = HashSet::new();
        played.insert((1, 2));
        let pairs = swiss_pairs(&[1, 2, 3, 4], &played);
        assert_eq!(pairs[0], (1, 3));
        assert_eq!(pairs[1], (2, 4));
    }

    #[test]
    fn test_swiss_pairs_fall_back_on_forced_rematch() {
        let mut played = HashSet::new();
        played.insert((1, 2));
        played.insert((1, 3));
        played.insert((1, 4));
        let pairs = swiss_pairs(&[1, 2, 3, 4], &played);
        // Player 1 has met everyone; closest-ranked opponent is taken anyway
        assert_eq!(pairs[0], (1, 2));
    }
}
