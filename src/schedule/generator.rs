//! Session generation and result submission.
//!
//! Generation is all-or-nothing: the tournament row is locked, the roster is
//! validated against the format, every session row is inserted and the
//! tournament moves to `InProgress` in one transaction. Regeneration goes
//! through the explicit reset path, which refuses to destroy submitted
//! results unless forced.

use super::campus::{CampusAllocator, CampusScheduleConfig};
use super::errors::{ScheduleError, ScheduleResult};
use super::formats;
use super::models::{PlannedSession, Session, SessionId, SessionResult, PENDING_SLOT};
use crate::audit;
use crate::enrollment::coordinator::roster_in_tx;
use crate::results::standings::{standings, MatchOutcome};
use crate::tournament::lifecycle;
use crate::tournament::models::{
    Actor, CampusId, Tournament, TournamentFormat, TournamentId, TournamentStatus, UserId,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Venue and timing parameters for one generation run
#[derive(Clone, Debug)]
pub struct ScheduleRequest {
    pub start_time: DateTime<Utc>,
    pub default_config: CampusScheduleConfig,
    pub campus_overrides: HashMap<CampusId, CampusScheduleConfig>,
}

impl ScheduleRequest {
    pub fn starting_at(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            default_config: CampusScheduleConfig::default(),
            campus_overrides: HashMap::new(),
        }
    }

    fn allocator(&self, campus_ids: &[CampusId]) -> CampusAllocator {
        CampusAllocator::new(
            campus_ids,
            self.start_time,
            self.default_config,
            &self.campus_overrides,
        )
    }
}

/// Session scheduler
#[derive(Clone)]
pub struct SessionScheduler {
    pool: Arc<PgPool>,
}

impl SessionScheduler {
    /// Create a new session scheduler
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Generate the full schedule for a tournament and start it.
    ///
    /// Validates roster cardinality for the format before creating anything;
    /// on success the tournament moves `EnrollmentOpen -> InProgress`.
    ///
    /// # Errors
    ///
    /// * `ScheduleError::InvalidRosterCardinality` - Roster does not fit the format
    /// * `ScheduleError::MissingRoundCount` - Format needs `number_of_rounds`
    /// * `ScheduleError::SessionsAlreadyExist` - Schedule was already generated
    pub async fn generate(
        &self,
        tournament_id: TournamentId,
        request: &ScheduleRequest,
        actor: Actor,
    ) -> ScheduleResult<Vec<Session>> {
        let mut tx = self.pool.begin().await?;
        let tournament = lifecycle::lock_tournament(&mut tx, tournament_id).await?;

        if tournament.status != TournamentStatus::EnrollmentOpen {
            return Err(ScheduleError::Tournament(
                crate::tournament::TournamentError::InvalidTransition {
                    from: tournament.status,
                    to: TournamentStatus::InProgress,
                },
            ));
        }
        if session_count(&mut tx, tournament_id).await? > 0 {
            return Err(ScheduleError::SessionsAlreadyExist);
        }
        tournament
            .game_config
            .validate()
            .map_err(ScheduleError::Configuration)?;

        let roster = roster_in_tx(&mut tx, tournament_id).await?;
        let mut alloc = request.allocator(&tournament.campus_ids);
        let planned = plan_sessions(&tournament, &roster, &mut alloc)?;

        let sessions = insert_sessions(&mut tx, tournament_id, &planned).await?;
        lifecycle::set_status(
            &mut tx,
            tournament_id,
            tournament.status,
            TournamentStatus::InProgress,
        )
        .await?;

        audit::record(
            &mut tx,
            Some(actor.user_id),
            "schedule.generate",
            Some(tournament_id),
            json!({
                "format": tournament.format.as_str(),
                "roster": roster.len(),
                "sessions": sessions.len(),
            }),
        )
        .await;
        tx.commit().await?;

        log::info!(
            "Generated {} sessions for tournament {tournament_id} ({})",
            sessions.len(),
            tournament.format
        );
        Ok(sessions)
    }

    /// Delete the schedule and reopen enrollment: `InProgress -> EnrollmentOpen`.
    ///
    /// Refuses when any session already has a result unless `force` is set.
    ///
    /// # Returns
    ///
    /// * `ScheduleResult<u64>` - Number of deleted sessions
    pub async fn reset(
        &self,
        tournament_id: TournamentId,
        force: bool,
        actor: Actor,
    ) -> ScheduleResult<u64> {
        let mut tx = self.pool.begin().await?;
        let tournament = lifecycle::lock_tournament(&mut tx, tournament_id).await?;

        if !force {
            let resolved = sqlx::query(
                "SELECT COUNT(*) AS n FROM sessions
                 WHERE tournament_id = $1 AND (completed OR forfeited)",
            )
            .bind(tournament_id)
            .fetch_one(&mut *tx)
            .await?;
            if resolved.get::<i64, _>("n") > 0 {
                return Err(ScheduleError::SessionsHaveResults);
            }
        }

        let deleted = sqlx::query("DELETE FROM sessions WHERE tournament_id = $1 AND auto_generated")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        lifecycle::set_status(
            &mut tx,
            tournament_id,
            tournament.status,
            TournamentStatus::EnrollmentOpen,
        )
        .await?;

        audit::record(
            &mut tx,
            Some(actor.user_id),
            "schedule.reset",
            Some(tournament_id),
            json!({ "deleted": deleted, "force": force }),
        )
        .await;
        tx.commit().await?;

        log::info!("Reset tournament {tournament_id}, deleted {deleted} sessions");
        Ok(deleted)
    }

    /// Submit a result for a session.
    ///
    /// A second submission is rejected unless `overwrite` is set. Knockout
    /// sessions require a winner and propagate it into the next round's
    /// bracket slot; an overwrite is refused once the downstream session has
    /// its own result.
    pub async fn submit_result(
        &self,
        session_id: SessionId,
        result: SessionResult,
        overwrite: bool,
        actor: Actor,
    ) -> ScheduleResult<Session> {
        let mut tx = self.pool.begin().await?;

        // Resolve the owning tournament first so every writer takes the
        // tournament lock before any session lock.
        let owner = sqlx::query("SELECT tournament_id FROM sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ScheduleError::SessionNotFound(session_id))?;
        let tournament_id: TournamentId = owner.get("tournament_id");
        let tournament = lifecycle::lock_tournament(&mut tx, tournament_id).await?;

        if tournament.status != TournamentStatus::InProgress {
            return Err(ScheduleError::InvalidResult(format!(
                "tournament is {}, results are only accepted in progress",
                tournament.status
            )));
        }

        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1 FOR UPDATE"
        ))
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ScheduleError::SessionNotFound(session_id))?;
        let mut session = session_from_row(&row)?;

        if session.is_resolved() && !overwrite {
            return Err(ScheduleError::SessionAlreadyCompleted(session_id));
        }
        result
            .validate(&session.participants)
            .map_err(ScheduleError::InvalidResult)?;

        session.result = Some(result.clone());
        session.completed = true;
        session.forfeited = false;

        if session.bracket_slot.is_some() {
            let winner = session
                .winner()
                .ok_or(ScheduleError::WinnerRequired(session_id))?;
            let _ = propagate_winner(&mut tx, &session, winner).await?;
        }

        let payload = serde_json::to_value(&result)
            .map_err(|e| ScheduleError::InvalidResult(e.to_string()))?;
        sqlx::query(
            "UPDATE sessions SET completed = TRUE, forfeited = FALSE, result = $1 WHERE id = $2",
        )
        .bind(payload)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        audit::record(
            &mut tx,
            Some(actor.user_id),
            "schedule.submit_result",
            Some(tournament_id),
            json!({ "session_id": session_id, "overwrite": overwrite }),
        )
        .await;
        tx.commit().await?;

        Ok(session)
    }

    /// Mark a session as forfeited; it counts as resolved but contributes no
    /// outcome to standings.
    ///
    /// Knockout sessions still need someone to advance, so `advancing` is
    /// required there and must be one of the participants.
    pub async fn forfeit(
        &self,
        session_id: SessionId,
        advancing: Option<UserId>,
        actor: Actor,
    ) -> ScheduleResult<Session> {
        let mut tx = self.pool.begin().await?;

        let owner = sqlx::query("SELECT tournament_id FROM sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ScheduleError::SessionNotFound(session_id))?;
        let tournament_id: TournamentId = owner.get("tournament_id");
        let tournament = lifecycle::lock_tournament(&mut tx, tournament_id).await?;

        if tournament.status != TournamentStatus::InProgress {
            return Err(ScheduleError::InvalidResult(format!(
                "tournament is {}, forfeits are only accepted in progress",
                tournament.status
            )));
        }

        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1 FOR UPDATE"
        ))
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ScheduleError::SessionNotFound(session_id))?;
        let mut session = session_from_row(&row)?;

        if session.is_resolved() {
            return Err(ScheduleError::SessionAlreadyCompleted(session_id));
        }

        if session.bracket_slot.is_some() {
            let winner = advancing.ok_or(ScheduleError::WinnerRequired(session_id))?;
            if !session.participants.contains(&winner) || winner == PENDING_SLOT {
                return Err(ScheduleError::InvalidResult(format!(
                    "user {winner} is not a participant of session {session_id}"
                )));
            }
            // A forfeited final would leave no record of the champion
            if !propagate_winner(&mut tx, &session, winner).await? {
                return Err(ScheduleError::InvalidResult(
                    "the final cannot be forfeited, submit a walkover result".to_string(),
                ));
            }
        }

        sqlx::query(
            "UPDATE sessions SET forfeited = TRUE, completed = FALSE, result = NULL WHERE id = $1",
        )
        .bind(session_id)
        .execute(&mut *tx)
        .await?;
        session.forfeited = true;
        session.completed = false;
        session.result = None;

        audit::record(
            &mut tx,
            Some(actor.user_id),
            "schedule.forfeit",
            Some(tournament_id),
            json!({ "session_id": session_id, "advancing": advancing }),
        )
        .await;
        tx.commit().await?;

        Ok(session)
    }

    /// Generate the knockout stage of a GROUP_KNOCKOUT tournament.
    ///
    /// Requires every group session resolved. Advancers are the configured
    /// top finishers of each group's standings, ordered rank-major
    /// (all group winners first) so seeded pairing keeps groupmates apart in
    /// round one.
    pub async fn generate_knockout_stage(
        &self,
        tournament_id: TournamentId,
        request: &ScheduleRequest,
        actor: Actor,
    ) -> ScheduleResult<Vec<Session>> {
        let mut tx = self.pool.begin().await?;
        let tournament = lifecycle::lock_tournament(&mut tx, tournament_id).await?;

        if tournament.format != TournamentFormat::GroupKnockout {
            return Err(ScheduleError::Configuration(format!(
                "knockout stage only applies to group_knockout, not {}",
                tournament.format
            )));
        }
        if tournament.status != TournamentStatus::InProgress {
            return Err(ScheduleError::InvalidResult(format!(
                "tournament is {}, expected in progress",
                tournament.status
            )));
        }

        let sessions = sessions_in_tx(&mut tx, tournament_id).await?;
        if sessions.iter().any(|s| s.bracket_slot.is_some()) {
            return Err(ScheduleError::KnockoutStageExists);
        }
        if sessions.iter().any(|s| !s.is_resolved()) {
            return Err(ScheduleError::GroupStageIncomplete);
        }

        let advancers = group_advancers(&sessions, &tournament);
        let mut alloc = request.allocator(&tournament.campus_ids);
        let planned = formats::knockout(&advancers, &mut alloc)?;
        let created = insert_sessions(&mut tx, tournament_id, &planned).await?;

        audit::record(
            &mut tx,
            Some(actor.user_id),
            "schedule.generate_knockout_stage",
            Some(tournament_id),
            json!({ "advancers": advancers.len(), "sessions": created.len() }),
        )
        .await;
        tx.commit().await?;

        log::info!(
            "Knockout stage for tournament {tournament_id}: {} advancers",
            advancers.len()
        );
        Ok(created)
    }

    /// Pair and schedule the next swiss round from current standings.
    ///
    /// Requires the latest round fully resolved and fewer rounds generated
    /// than configured.
    pub async fn generate_next_swiss_round(
        &self,
        tournament_id: TournamentId,
        request: &ScheduleRequest,
        actor: Actor,
    ) -> ScheduleResult<Vec<Session>> {
        let mut tx = self.pool.begin().await?;
        let tournament = lifecycle::lock_tournament(&mut tx, tournament_id).await?;

        if tournament.format != TournamentFormat::Swiss {
            return Err(ScheduleError::Configuration(format!(
                "swiss pairing only applies to swiss, not {}",
                tournament.format
            )));
        }
        if tournament.status != TournamentStatus::InProgress {
            return Err(ScheduleError::InvalidResult(format!(
                "tournament is {}, expected in progress",
                tournament.status
            )));
        }
        let total_rounds = tournament
            .number_of_rounds
            .ok_or(ScheduleError::MissingRoundCount)?;

        let sessions = sessions_in_tx(&mut tx, tournament_id).await?;
        let current_round = sessions.iter().map(|s| s.round_number).max().unwrap_or(0);
        if current_round >= total_rounds {
            return Err(ScheduleError::AllRoundsGenerated);
        }
        if sessions
            .iter()
            .any(|s| s.round_number == current_round && !s.is_resolved())
        {
            return Err(ScheduleError::RoundIncomplete(current_round));
        }

        let roster = roster_in_tx(&mut tx, tournament_id).await?;
        let outcomes: Vec<MatchOutcome> = sessions.iter().filter_map(Session::outcome).collect();
        let table = standings(&roster, &outcomes, &tournament.game_config.point_table);
        let order: Vec<UserId> = table.iter().map(|s| s.user_id).collect();

        // Forfeited pairs still met, so they count for rematch avoidance
        let played: HashSet<(UserId, UserId)> = sessions
            .iter()
            .filter(|s| s.participants.len() == 2)
            .map(|s| {
                let (a, b) = (s.participants[0], s.participants[1]);
                (a.min(b), a.max(b))
            })
            .collect();

        let pairs = formats::swiss_pairs(&order, &played);
        let mut alloc = request.allocator(&tournament.campus_ids);
        let planned = formats::swiss_round(&pairs, current_round + 1, &mut alloc);
        let created = insert_sessions(&mut tx, tournament_id, &planned).await?;

        audit::record(
            &mut tx,
            Some(actor.user_id),
            "schedule.generate_swiss_round",
            Some(tournament_id),
            json!({ "round": current_round + 1, "sessions": created.len() }),
        )
        .await;
        tx.commit().await?;

        Ok(created)
    }

    /// All sessions of a tournament in scheduling order
    pub async fn sessions(&self, tournament_id: TournamentId) -> ScheduleResult<Vec<Session>> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE tournament_id = $1 ORDER BY id"
        ))
        .bind(tournament_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(session_from_row).collect()
    }

    /// Fetch a single session
    pub async fn session(&self, session_id: SessionId) -> ScheduleResult<Session> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(ScheduleError::SessionNotFound(session_id))?;

        session_from_row(&row)
    }
}

const SESSION_COLUMNS: &str = "id, tournament_id, campus_id, field_index, scheduled_at, phase, \
     round_number, bracket_slot, participants, auto_generated, completed, forfeited, result";

/// Route a roster through the format's generator.
fn plan_sessions(
    tournament: &Tournament,
    roster: &[UserId],
    alloc: &mut CampusAllocator,
) -> ScheduleResult<Vec<PlannedSession>> {
    let cfg = &tournament.game_config;
    match tournament.format {
        TournamentFormat::HeadToHead => formats::league(roster, alloc),
        TournamentFormat::Knockout => formats::knockout(roster, alloc),
        TournamentFormat::GroupKnockout => {
            let planned = formats::group_stage(roster, cfg.group_size, alloc)?;
            // The eventual bracket must also be well-formed, so the advancer
            // count is checked now rather than after the group stage ran.
            let advancers = (roster.len() / cfg.group_size) * cfg.advance_per_group;
            if advancers < 2 || !advancers.is_power_of_two() {
                return Err(ScheduleError::InvalidRosterCardinality {
                    format: TournamentFormat::GroupKnockout,
                    size: roster.len(),
                });
            }
            Ok(planned)
        }
        TournamentFormat::IndividualRanking => {
            let rounds = tournament
                .number_of_rounds
                .ok_or(ScheduleError::MissingRoundCount)?;
            formats::individual_rounds(roster, rounds, alloc)
        }
        TournamentFormat::Swiss => {
            if tournament.number_of_rounds.is_none() {
                return Err(ScheduleError::MissingRoundCount);
            }
            let pairs = formats::swiss_opening_pairs(roster)?;
            Ok(formats::swiss_round(&pairs, 1, alloc))
        }
    }
}

/// Top finishers of each group in rank-major order: all first places, then
/// all second places, and so on.
fn group_advancers(sessions: &[Session], tournament: &Tournament) -> Vec<UserId> {
    let mut by_group: HashMap<&str, Vec<&Session>> = HashMap::new();
    for session in sessions {
        by_group.entry(session.phase.as_str()).or_default().push(session);
    }
    let mut labels: Vec<&str> = by_group.keys().copied().collect();
    labels.sort_unstable();

    let per_group: Vec<Vec<UserId>> = labels
        .iter()
        .map(|label| {
            let group = &by_group[label];
            let roster: Vec<UserId> = {
                let mut seen: Vec<UserId> = group
                    .iter()
                    .flat_map(|s| s.participants.iter().copied())
                    .collect();
                seen.sort_unstable();
                seen.dedup();
                seen
            };
            let outcomes: Vec<MatchOutcome> =
                group.iter().filter_map(|s| s.outcome()).collect();
            standings(&roster, &outcomes, &tournament.game_config.point_table)
                .into_iter()
                .take(tournament.game_config.advance_per_group)
                .map(|s| s.user_id)
                .collect()
        })
        .collect();

    let mut advancers = Vec::new();
    for rank in 0..tournament.game_config.advance_per_group {
        for group in &per_group {
            if let Some(&user) = group.get(rank) {
                advancers.push(user);
            }
        }
    }
    advancers
}

/// Write the winner into its slot of the next round's session.
///
/// Winners of bracket slots `2k` and `2k+1` in round `r` meet in slot `k` of
/// round `r + 1`; an overwrite is refused once that session has a result of
/// its own. Returns whether a downstream session existed (false for the
/// final).
async fn propagate_winner(
    tx: &mut Transaction<'_, Postgres>,
    session: &Session,
    winner: UserId,
) -> ScheduleResult<bool> {
    let Some(slot) = session.bracket_slot else {
        return Ok(false);
    };
    let next_round = session.round_number + 1;
    let next_slot = slot / 2;
    let position = (slot % 2) as usize;

    let row = sqlx::query(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions
         WHERE tournament_id = $1 AND round_number = $2 AND bracket_slot = $3
         FOR UPDATE"
    ))
    .bind(session.tournament_id)
    .bind(next_round as i32)
    .bind(next_slot as i32)
    .fetch_optional(&mut **tx)
    .await?;

    // The final has no downstream session
    let Some(row) = row else {
        return Ok(false);
    };
    let mut next = session_from_row(&row)?;

    if next.is_resolved() {
        return Err(ScheduleError::InvalidResult(format!(
            "session {} ({}) already has a result, cannot re-propagate a winner",
            next.id, next.phase
        )));
    }

    next.participants[position] = winner;
    sqlx::query("UPDATE sessions SET participants = $1 WHERE id = $2")
        .bind(&next.participants)
        .bind(next.id)
        .execute(&mut **tx)
        .await?;
    Ok(true)
}

async fn insert_sessions(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
    planned: &[PlannedSession],
) -> Result<Vec<Session>, sqlx::Error> {
    let mut sessions = Vec::with_capacity(planned.len());
    for p in planned {
        let row = sqlx::query(
            r#"
            INSERT INTO sessions
                (tournament_id, campus_id, field_index, scheduled_at, phase,
                 round_number, bracket_slot, participants)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(tournament_id)
        .bind(p.campus_id)
        .bind(p.field_index as i32)
        .bind(p.scheduled_at.naive_utc())
        .bind(&p.phase)
        .bind(p.round_number as i32)
        .bind(p.bracket_slot.map(|s| s as i32))
        .bind(&p.participants)
        .fetch_one(&mut **tx)
        .await?;

        sessions.push(Session {
            id: row.get("id"),
            tournament_id,
            campus_id: p.campus_id,
            field_index: p.field_index,
            scheduled_at: p.scheduled_at,
            phase: p.phase.clone(),
            round_number: p.round_number,
            bracket_slot: p.bracket_slot,
            participants: p.participants.clone(),
            auto_generated: true,
            completed: false,
            forfeited: false,
            result: None,
        });
    }
    Ok(sessions)
}

async fn session_count(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM sessions WHERE tournament_id = $1")
        .bind(tournament_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(row.get("n"))
}

/// Load all sessions of a tournament inside the caller's transaction.
pub(crate) async fn sessions_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
) -> ScheduleResult<Vec<Session>> {
    let rows = sqlx::query(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE tournament_id = $1 ORDER BY id"
    ))
    .bind(tournament_id)
    .fetch_all(&mut **tx)
    .await?;

    rows.iter().map(session_from_row).collect()
}

pub(crate) fn session_from_row(row: &PgRow) -> ScheduleResult<Session> {
    let result = row
        .get::<Option<serde_json::Value>, _>("result")
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| ScheduleError::InvalidResult(format!("stored result payload: {e}")))?;

    Ok(Session {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        campus_id: row.get("campus_id"),
        field_index: row.get::<i32, _>("field_index") as u32,
        scheduled_at: row.get::<chrono::NaiveDateTime, _>("scheduled_at").and_utc(),
        phase: row.get("phase"),
        round_number: row.get::<i32, _>("round_number") as u32,
        bracket_slot: row.get::<Option<i32>, _>("bracket_slot").map(|s| s as u32),
        participants: row.get("participants"),
        auto_generated: row.get("auto_generated"),
        completed: row.get("completed"),
        forfeited: row.get("forfeited"),
        result,
    })
}
