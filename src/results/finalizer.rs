//! Results finalization.
//!
//! Turns a fully-resolved schedule into the authoritative ranking table and
//! moves the tournament to `Completed` in the same transaction. The ranking
//! is strictly total and deterministic: every tie falls through the full
//! tie-break chain, ending at ascending user id.

use super::errors::{ResultsError, ResultsResult};
use super::models::RankingEntry;
use super::standings::{placement_standings, standings, MatchOutcome, Standing};
use crate::audit;
use crate::enrollment::coordinator::roster_in_tx;
use crate::schedule::generator::sessions_in_tx;
use crate::schedule::models::{Session, SessionResult};
use crate::tournament::lifecycle;
use crate::tournament::models::{
    Actor, PointTable, Tournament, TournamentFormat, TournamentId, TournamentStatus, UserId,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Results finalizer
#[derive(Clone)]
pub struct ResultsFinalizer {
    pool: Arc<PgPool>,
}

impl ResultsFinalizer {
    /// Create a new results finalizer
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Finalize a tournament: compute and persist the ranking, then move
    /// `InProgress -> Completed`.
    ///
    /// # Errors
    ///
    /// * `ResultsError::IncompleteSessions` - Unresolved sessions remain
    /// * `ResultsError::KnockoutStageMissing` - Group stage played but no bracket
    /// * `ResultsError::RoundsRemaining` - Swiss rounds still to be generated
    pub async fn finalize(
        &self,
        tournament_id: TournamentId,
        actor: Actor,
    ) -> ResultsResult<Vec<RankingEntry>> {
        let mut tx = self.pool.begin().await?;
        let tournament = lifecycle::lock_tournament(&mut tx, tournament_id).await?;

        if tournament.status != TournamentStatus::InProgress {
            return Err(ResultsError::NotInProgress(tournament.status));
        }

        let sessions = sessions_in_tx(&mut tx, tournament_id).await?;
        if sessions.is_empty() {
            return Err(ResultsError::NoSessions);
        }
        if tournament.format == TournamentFormat::GroupKnockout
            && !sessions.iter().any(|s| s.bracket_slot.is_some())
        {
            return Err(ResultsError::KnockoutStageMissing);
        }
        if tournament.format == TournamentFormat::Swiss {
            let configured = tournament
                .number_of_rounds
                .ok_or_else(|| ResultsError::Configuration("number_of_rounds unset".to_string()))?;
            let generated = sessions.iter().map(|s| s.round_number).max().unwrap_or(0);
            if generated < configured {
                return Err(ResultsError::RoundsRemaining { generated, configured });
            }
        }
        let unresolved = sessions.iter().filter(|s| !s.is_resolved()).count();
        if unresolved > 0 {
            return Err(ResultsError::IncompleteSessions(unresolved));
        }

        let roster = roster_in_tx(&mut tx, tournament_id).await?;
        let lines = rank_tournament(&tournament, &roster, &sessions)?;
        let entries = persist_ranking(&mut tx, tournament_id, &lines).await?;

        lifecycle::set_status(
            &mut tx,
            tournament_id,
            tournament.status,
            TournamentStatus::Completed,
        )
        .await?;

        audit::record(
            &mut tx,
            Some(actor.user_id),
            "results.finalize",
            Some(tournament_id),
            json!({ "participants": entries.len() }),
        )
        .await;
        tx.commit().await?;

        log::info!(
            "Finalized tournament {tournament_id} with {} ranked participants",
            entries.len()
        );
        Ok(entries)
    }

    /// The persisted ranking of a completed tournament, best first.
    pub async fn rankings(&self, tournament_id: TournamentId) -> ResultsResult<Vec<RankingEntry>> {
        let rows = sqlx::query(
            "SELECT tournament_id, user_id, rank, points, wins, draws, losses,
                    goals_for, goals_against, average_placement, finalized_at
             FROM ranking_entries WHERE tournament_id = $1 ORDER BY rank",
        )
        .bind(tournament_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        if rows.is_empty() {
            return Err(ResultsError::NotFinalized(tournament_id));
        }
        Ok(rows
            .iter()
            .map(|row| RankingEntry {
                tournament_id: row.get("tournament_id"),
                user_id: row.get("user_id"),
                rank: row.get::<i32, _>("rank") as u32,
                points: row.get("points"),
                wins: row.get::<i32, _>("wins") as u32,
                draws: row.get::<i32, _>("draws") as u32,
                losses: row.get::<i32, _>("losses") as u32,
                goals_for: row.get("goals_for"),
                goals_against: row.get("goals_against"),
                average_placement: row.get("average_placement"),
                finalized_at: row
                    .get::<chrono::NaiveDateTime, _>("finalized_at")
                    .and_utc(),
            })
            .collect())
    }
}

/// One computed ranking line before persistence
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RankedLine {
    pub user_id: UserId,
    pub points: i64,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: i64,
    pub goals_against: i64,
    pub average_placement: Option<f64>,
}

impl RankedLine {
    fn from_standing(s: &Standing) -> Self {
        Self {
            user_id: s.user_id,
            points: s.points,
            wins: s.wins,
            draws: s.draws,
            losses: s.losses,
            goals_for: s.goals_for,
            goals_against: s.goals_against,
            average_placement: None,
        }
    }
}

/// Compute the final order for a tournament, best first.
pub(crate) fn rank_tournament(
    tournament: &Tournament,
    roster: &[UserId],
    sessions: &[Session],
) -> ResultsResult<Vec<RankedLine>> {
    let table = &tournament.game_config.point_table;
    match tournament.format {
        TournamentFormat::HeadToHead | TournamentFormat::Swiss => {
            Ok(score_ranking(roster, sessions, table))
        }
        TournamentFormat::Knockout => knockout_ranking(roster, sessions, table),
        TournamentFormat::GroupKnockout => group_knockout_ranking(roster, sessions, table),
        TournamentFormat::IndividualRanking => Ok(placement_ranking(roster, sessions)),
    }
}

fn outcomes_of(sessions: &[Session]) -> Vec<MatchOutcome> {
    sessions.iter().filter_map(Session::outcome).collect()
}

fn score_ranking(roster: &[UserId], sessions: &[Session], table: &PointTable) -> Vec<RankedLine> {
    standings(roster, &outcomes_of(sessions), table)
        .iter()
        .map(RankedLine::from_standing)
        .collect()
}

/// Rank a bracket by elimination depth: the champion first, then the final's
/// loser, then earlier-round losers in cohorts. Within a cohort the overall
/// score tie-break chain orders the lines.
fn knockout_ranking(
    roster: &[UserId],
    sessions: &[Session],
    table: &PointTable,
) -> ResultsResult<Vec<RankedLine>> {
    let bracket: Vec<&Session> = sessions.iter().filter(|s| s.bracket_slot.is_some()).collect();
    let by_position: HashMap<(u32, u32), &Session> = bracket
        .iter()
        .map(|s| ((s.round_number, s.bracket_slot.unwrap_or(0)), *s))
        .collect();
    let final_round = bracket.iter().map(|s| s.round_number).max().unwrap_or(0);

    // Who advanced out of each session. Completed sessions know their winner;
    // forfeited ones are read back from the slot the winner was written into.
    let advancer = |session: &Session| -> ResultsResult<UserId> {
        if let Some(winner) = session.winner() {
            return Ok(winner);
        }
        let slot = session.bracket_slot.unwrap_or(0);
        let next = by_position
            .get(&(session.round_number + 1, slot / 2))
            .ok_or_else(|| {
                ResultsError::Configuration(format!(
                    "session {} resolved without a recorded winner",
                    session.id
                ))
            })?;
        Ok(next.participants[(slot % 2) as usize])
    };

    let mut eliminated_at: HashMap<UserId, u32> = HashMap::new();
    let mut champion = None;
    for &session in &bracket {
        let winner = advancer(session)?;
        for &p in &session.participants {
            if p != winner && p != crate::schedule::PENDING_SLOT {
                eliminated_at.insert(p, session.round_number);
            }
        }
        if session.round_number == final_round {
            champion = Some(winner);
        }
    }
    let champion = champion
        .ok_or_else(|| ResultsError::Configuration("bracket has no final".to_string()))?;

    // Overall standings double as per-user stats and the cohort tie-break
    let full = standings(roster, &outcomes_of(sessions), table);
    let stat_index: HashMap<UserId, usize> = full
        .iter()
        .enumerate()
        .map(|(i, s)| (s.user_id, i))
        .collect();

    let mut order: Vec<UserId> = vec![champion];
    let mut losers: Vec<UserId> = eliminated_at.keys().copied().collect();
    losers.sort_by_key(|u| {
        (
            std::cmp::Reverse(eliminated_at[u]),
            stat_index.get(u).copied().unwrap_or(usize::MAX),
            *u,
        )
    });
    order.extend(losers);

    // Roster members outside the bracket (group-stage eliminees) are ranked
    // by the caller; anyone else left over sorts by the score chain.
    let placed: HashSet<UserId> = order.iter().copied().collect();
    order.extend(
        full.iter()
            .map(|s| s.user_id)
            .filter(|u| !placed.contains(u)),
    );

    Ok(order
        .iter()
        .map(|u| RankedLine::from_standing(&full[stat_index[u]]))
        .collect())
}

/// Bracket participants rank by elimination depth; everyone eliminated in the
/// group stage ranks below them, ordered by group-stage standings.
fn group_knockout_ranking(
    roster: &[UserId],
    sessions: &[Session],
    table: &PointTable,
) -> ResultsResult<Vec<RankedLine>> {
    let advancers: HashSet<UserId> = sessions
        .iter()
        .filter(|s| s.bracket_slot.is_some())
        .flat_map(|s| s.participants.iter().copied())
        .collect();
    let bracket_roster: Vec<UserId> = roster
        .iter()
        .copied()
        .filter(|u| advancers.contains(u))
        .collect();

    let bracket_sessions: Vec<Session> = sessions
        .iter()
        .filter(|s| s.bracket_slot.is_some())
        .cloned()
        .collect();
    let mut lines = knockout_ranking(&bracket_roster, &bracket_sessions, table)?;

    let group_sessions: Vec<Session> = sessions
        .iter()
        .filter(|s| s.bracket_slot.is_none())
        .cloned()
        .collect();
    let group_table = standings(roster, &outcomes_of(&group_sessions), table);
    lines.extend(
        group_table
            .iter()
            .filter(|s| !advancers.contains(&s.user_id))
            .map(RankedLine::from_standing),
    );
    Ok(lines)
}

fn placement_ranking(roster: &[UserId], sessions: &[Session]) -> Vec<RankedLine> {
    let mut ordered: Vec<&Session> = sessions.iter().filter(|s| s.completed).collect();
    ordered.sort_by_key(|s| s.round_number);

    let rounds: Vec<Vec<UserId>> = ordered
        .iter()
        .filter_map(|s| match &s.result {
            Some(SessionResult::Placements { placements }) => Some(placements.clone()),
            _ => None,
        })
        .collect();

    placement_standings(roster, &rounds)
        .iter()
        .map(|p| RankedLine {
            user_id: p.user_id,
            points: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            goals_for: 0,
            goals_against: 0,
            average_placement: p.average_placement.is_finite().then_some(p.average_placement),
        })
        .collect()
}

async fn persist_ranking(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
    lines: &[RankedLine],
) -> ResultsResult<Vec<RankingEntry>> {
    let mut entries = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        let rank = idx as u32 + 1;
        let row = sqlx::query(
            r#"
            INSERT INTO ranking_entries
                (tournament_id, user_id, rank, points, wins, draws, losses,
                 goals_for, goals_against, average_placement)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING finalized_at
            "#,
        )
        .bind(tournament_id)
        .bind(line.user_id)
        .bind(rank as i32)
        .bind(line.points)
        .bind(line.wins as i32)
        .bind(line.draws as i32)
        .bind(line.losses as i32)
        .bind(line.goals_for)
        .bind(line.goals_against)
        .bind(line.average_placement)
        .fetch_one(&mut **tx)
        .await?;

        entries.push(RankingEntry {
            tournament_id,
            user_id: line.user_id,
            rank,
            points: line.points,
            wins: line.wins,
            draws: line.draws,
            losses: line.losses,
            goals_for: line.goals_for,
            goals_against: line.goals_against,
            average_placement: line.average_placement,
            finalized_at: row
                .get::<chrono::NaiveDateTime, _>("finalized_at")
                .and_utc(),
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tournament(format: TournamentFormat, rounds: Option<u32>) -> Tournament {
        Tournament {
            id: 1,
            name: "test".to_string(),
            format,
            status: TournamentStatus::InProgress,
            max_players: 32,
            enrollment_cost: 0,
            campus_ids: vec![1],
            number_of_rounds: rounds,
            game_config: Default::default(),
            reward_config: Default::default(),
            rewards_distributed: false,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: None,
        }
    }

    fn score_session(
        phase: &str,
        round: u32,
        slot: Option<u32>,
        home: UserId,
        away: UserId,
        hg: i64,
        ag: i64,
    ) -> Session {
        Session {
            id: (round * 100 + slot.unwrap_or(0)) as i64 + home,
            tournament_id: 1,
            campus_id: 1,
            field_index: 0,
            scheduled_at: Utc::now(),
            phase: phase.to_string(),
            round_number: round,
            bracket_slot: slot,
            participants: vec![home, away],
            auto_generated: true,
            completed: true,
            forfeited: false,
            result: Some(SessionResult::Score { home_goals: hg, away_goals: ag }),
        }
    }

    #[test]
    fn test_head_to_head_ranking_uses_score_chain() {
        let t = tournament(TournamentFormat::HeadToHead, None);
        let sessions = vec![
            score_session("league-round-1", 1, None, 1, 2, 2, 0),
            score_session("league-round-2", 2, None, 1, 3, 1, 1),
            score_session("league-round-3", 3, None, 2, 3, 0, 3),
        ];
        let lines = rank_tournament(&t, &[1, 2, 3], &sessions).unwrap();
        // 1 has 4 points, 3 has 4 points with better goal difference, 2 has 0
        assert_eq!(lines[0].user_id, 3);
        assert_eq!(lines[1].user_id, 1);
        assert_eq!(lines[2].user_id, 2);
    }

    #[test]
    fn test_knockout_ranking_by_elimination_depth() {
        let t = tournament(TournamentFormat::Knockout, None);
        // Semis: 1 beats 4, 3 beats 2. Final: 3 beats 1.
        let sessions = vec![
            score_session("semifinal", 1, Some(0), 1, 4, 2, 0),
            score_session("semifinal", 1, Some(1), 2, 3, 0, 1),
            score_session("final", 2, Some(0), 1, 3, 0, 2),
        ];
        let lines = rank_tournament(&t, &[1, 2, 3, 4], &sessions).unwrap();
        assert_eq!(lines[0].user_id, 3); // champion
        assert_eq!(lines[1].user_id, 1); // lost the final
        // Semifinal losers: 4 conceded 2, 2 conceded 1; better GD ranks higher
        assert_eq!(lines[2].user_id, 2);
        assert_eq!(lines[3].user_id, 4);
    }

    #[test]
    fn test_knockout_forfeit_reads_winner_from_next_round() {
        let t = tournament(TournamentFormat::Knockout, None);
        let mut walkover = score_session("semifinal", 1, Some(0), 1, 4, 0, 0);
        walkover.completed = false;
        walkover.forfeited = true;
        walkover.result = None;
        // 1 advanced by walkover and is already written into the final
        let sessions = vec![
            walkover,
            score_session("semifinal", 1, Some(1), 2, 3, 0, 1),
            score_session("final", 2, Some(0), 1, 3, 0, 2),
        ];
        let lines = rank_tournament(&t, &[1, 2, 3, 4], &sessions).unwrap();
        assert_eq!(lines[0].user_id, 3);
        assert_eq!(lines[1].user_id, 1);
    }

    #[test]
    fn test_group_knockout_ranks_non_advancers_below_bracket() {
        let t = tournament(TournamentFormat::GroupKnockout, None);
        let sessions = vec![
            // Group A: 1 > 2; Group B: 3 > 4
            score_session("group-A", 1, None, 1, 2, 3, 0),
            score_session("group-B", 1, None, 3, 4, 2, 0),
            // Only winners advanced to a 2-player bracket; 3 takes it
            score_session("final", 1, Some(0), 1, 3, 0, 1),
        ];
        let lines = rank_tournament(&t, &[1, 2, 3, 4], &sessions).unwrap();
        assert_eq!(lines[0].user_id, 3);
        assert_eq!(lines[1].user_id, 1);
        // Group eliminees ordered by group standings: 4 lost by 2, 2 lost by 3
        assert_eq!(lines[2].user_id, 4);
        assert_eq!(lines[3].user_id, 2);
    }

    #[test]
    fn test_placement_ranking_averages_rounds() {
        let t = tournament(TournamentFormat::IndividualRanking, Some(2));
        let round = |r: u32, placements: Vec<UserId>| Session {
            id: r as i64,
            tournament_id: 1,
            campus_id: 1,
            field_index: 0,
            scheduled_at: Utc::now(),
            phase: format!("round-{r}"),
            round_number: r,
            bracket_slot: None,
            participants: vec![1, 2, 3],
            auto_generated: true,
            completed: true,
            forfeited: false,
            result: Some(SessionResult::Placements { placements }),
        };
        let sessions = vec![round(1, vec![2, 1, 3]), round(2, vec![1, 2, 3])];
        let lines = rank_tournament(&t, &[1, 2, 3], &sessions).unwrap();
        // 1 and 2 both average 1.5; both best 1st; user id decides
        assert_eq!(lines[0].user_id, 1);
        assert_eq!(lines[1].user_id, 2);
        assert_eq!(lines[2].user_id, 3);
        assert_eq!(lines[2].average_placement, Some(3.0));
    }

    #[test]
    fn test_ranks_are_strictly_total() {
        let t = tournament(TournamentFormat::HeadToHead, None);
        // No results at all: every tie falls through to user id
        let lines = rank_tournament(&t, &[7, 3, 5], &[]).unwrap();
        let ids: Vec<UserId> = lines.iter().map(|l| l.user_id).collect();
        assert_eq!(ids, vec![3, 5, 7]);
    }
}
