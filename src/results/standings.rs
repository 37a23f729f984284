//! Pure standings aggregation and the tie-break chain.
//!
//! The chain for score-based formats is: points, then goal difference, then
//! head-to-head points between the tied pair, then ascending user id as the
//! final deterministic key. Ties never survive the chain, which makes every
//! ranking byte-stable for identical inputs.

use crate::tournament::models::{PointTable, UserId};
use std::collections::HashMap;

/// One pairwise match outcome
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MatchOutcome {
    pub home: UserId,
    pub away: UserId,
    pub home_goals: i64,
    pub away_goals: i64,
}

/// Aggregated record for one participant in a score-based format
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Standing {
    pub user_id: UserId,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: i64,
    pub goals_against: i64,
    pub points: i64,
}

impl Standing {
    fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            played: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            goals_for: 0,
            goals_against: 0,
            points: 0,
        }
    }

    pub fn goal_difference(&self) -> i64 {
        self.goals_for - self.goals_against
    }
}

/// Aggregate outcomes into a fully ordered table.
///
/// Every roster member appears even with zero matches played.
pub fn standings(
    roster: &[UserId],
    outcomes: &[MatchOutcome],
    table: &PointTable,
) -> Vec<Standing> {
    let mut by_user: HashMap<UserId, Standing> = roster
        .iter()
        .map(|&u| (u, Standing::new(u)))
        .collect();
    // Points each user earned against each specific opponent
    let mut head_to_head: HashMap<(UserId, UserId), i64> = HashMap::new();

    for outcome in outcomes {
        let (home_points, away_points) = match outcome.home_goals.cmp(&outcome.away_goals) {
            std::cmp::Ordering::Greater => (table.win, table.loss),
            std::cmp::Ordering::Less => (table.loss, table.win),
            std::cmp::Ordering::Equal => (table.draw, table.draw),
        };

        for (user, opponent, goals_for, goals_against, points) in [
            (outcome.home, outcome.away, outcome.home_goals, outcome.away_goals, home_points),
            (outcome.away, outcome.home, outcome.away_goals, outcome.home_goals, away_points),
        ] {
            let entry = by_user.entry(user).or_insert_with(|| Standing::new(user));
            entry.played += 1;
            entry.goals_for += goals_for;
            entry.goals_against += goals_against;
            entry.points += points;
            match goals_for.cmp(&goals_against) {
                std::cmp::Ordering::Greater => entry.wins += 1,
                std::cmp::Ordering::Less => entry.losses += 1,
                std::cmp::Ordering::Equal => entry.draws += 1,
            }
            *head_to_head.entry((user, opponent)).or_insert(0) += points;
        }
    }

    let mut list: Vec<Standing> = by_user.into_values().collect();
    list.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.goal_difference().cmp(&a.goal_difference()))
            .then_with(|| {
                let a_vs_b = head_to_head.get(&(a.user_id, b.user_id)).copied().unwrap_or(0);
                let b_vs_a = head_to_head.get(&(b.user_id, a.user_id)).copied().unwrap_or(0);
                b_vs_a.cmp(&a_vs_b)
            })
            .then(a.user_id.cmp(&b.user_id))
    });
    list
}

/// Aggregated record for one participant in a placement-based format
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementStanding {
    pub user_id: UserId,
    pub rounds_played: u32,
    /// Average placement across rounds; lower is better
    pub average_placement: f64,
    pub best_placement: u32,
}

/// Aggregate per-round placement lists (best first) into an ordered table.
///
/// Order: average placement ascending, then best single-round placement,
/// then user id. Roster members absent from every round sort last.
pub fn placement_standings(roster: &[UserId], rounds: &[Vec<UserId>]) -> Vec<PlacementStanding> {
    let mut totals: HashMap<UserId, (u32, u64, u32)> = roster
        .iter()
        .map(|&u| (u, (0u32, 0u64, u32::MAX)))
        .collect();

    for round in rounds {
        for (idx, &user) in round.iter().enumerate() {
            let placement = (idx + 1) as u32;
            let entry = totals.entry(user).or_insert((0, 0, u32::MAX));
            entry.0 += 1;
            entry.1 += placement as u64;
            entry.2 = entry.2.min(placement);
        }
    }

    let mut list: Vec<PlacementStanding> = totals
        .into_iter()
        .map(|(user_id, (rounds_played, sum, best))| PlacementStanding {
            user_id,
            rounds_played,
            average_placement: if rounds_played == 0 {
                f64::INFINITY
            } else {
                sum as f64 / rounds_played as f64
            },
            best_placement: best,
        })
        .collect();

    list.sort_by(|a, b| {
        a.average_placement
            .total_cmp(&b.average_placement)
            .then(a.best_placement.cmp(&b.best_placement))
            .then(a.user_id.cmp(&b.user_id))
    });
    list
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(home: UserId, away: UserId, hg: i64, ag: i64) -> MatchOutcome {
        MatchOutcome { home, away, home_goals: hg, away_goals: ag }
    }

    #[test]
    fn test_points_from_default_table() {
        let table = PointTable::default();
        let list = standings(&[1, 2], &[outcome(1, 2, 2, 0)], &table);
        assert_eq!(list[0].user_id, 1);
        assert_eq!(list[0].points, 3);
        assert_eq!(list[0].wins, 1);
        assert_eq!(list[1].points, 0);
        assert_eq!(list[1].losses, 1);
    }

    #[test]
    fn test_goal_difference_breaks_point_ties() {
        let table = PointTable::default();
        // Both beat 3, but user 2 by a wider margin
        let list = standings(
            &[1, 2, 3],
            &[outcome(1, 3, 1, 0), outcome(2, 3, 4, 0)],
            &table,
        );
        assert_eq!(list[0].user_id, 2);
        assert_eq!(list[1].user_id, 1);
        assert_eq!(list[2].user_id, 3);
    }

    #[test]
    fn test_head_to_head_breaks_equal_records() {
        let table = PointTable::default();
        // 1 and 2 have identical points and goal difference; 2 won the mutual
        // match so it must rank first.
        let list = standings(
            &[1, 2, 3, 4],
            &[
                outcome(2, 1, 1, 0),
                outcome(1, 3, 2, 1),
                outcome(2, 4, 1, 0),
                outcome(1, 4, 1, 0),
                outcome(2, 3, 1, 2),
            ],
            &table,
        );
        let pos = |u: UserId| list.iter().position(|s| s.user_id == u).unwrap();
        assert_eq!(list[pos(1)].points, list[pos(2)].points);
        assert_eq!(
            list[pos(1)].goal_difference(),
            list[pos(2)].goal_difference()
        );
        assert!(pos(2) < pos(1), "head-to-head winner ranks first");
    }

    #[test]
    fn test_user_id_is_last_resort() {
        let table = PointTable::default();
        // No matches: fully tied, so ascending user id decides
        let list = standings(&[30, 10, 20], &[], &table);
        let ids: Vec<UserId> = list.iter().map(|s| s.user_id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn test_standings_deterministic_under_input_order() {
        let table = PointTable::default();
        let mut outcomes = vec![
            outcome(1, 2, 2, 2),
            outcome(3, 1, 0, 0),
            outcome(2, 3, 1, 1),
        ];
        let a = standings(&[1, 2, 3], &outcomes, &table);
        outcomes.reverse();
        let b = standings(&[3, 2, 1], &outcomes, &table);
        assert_eq!(a, b);
    }

    #[test]
    fn test_placement_average_ranks_lower_first() {
        let rounds = vec![vec![1, 2, 3], vec![2, 1, 3], vec![1, 3, 2]];
        let list = placement_standings(&[1, 2, 3], &rounds);
        assert_eq!(list[0].user_id, 1); // avg 4/3
        assert_eq!(list[1].user_id, 2); // avg 2
        assert_eq!(list[2].user_id, 3); // avg 8/3
    }

    #[test]
    fn test_placement_tie_broken_by_best_round() {
        // Both average 1.5; user 2's best is 1st in round 2
        let rounds = vec![vec![1, 2], vec![2, 1]];
        let list = placement_standings(&[1, 2], &rounds);
        // Equal best placements too: falls through to user id
        assert_eq!(list[0].user_id, 1);

        let rounds = vec![vec![5, 6, 7], vec![6, 7, 5], vec![7, 5, 6]];
        let list = placement_standings(&[5, 6, 7], &rounds);
        // All average 2.0 with best 1; user id decides
        let ids: Vec<UserId> = list.iter().map(|s| s.user_id).collect();
        assert_eq!(ids, vec![5, 6, 7]);
    }

    #[test]
    fn test_absent_users_sort_last() {
        let rounds = vec![vec![1, 2]];
        let list = placement_standings(&[1, 2, 9], &rounds);
        assert_eq!(list[2].user_id, 9);
        assert_eq!(list[2].rounds_played, 0);
    }
}
