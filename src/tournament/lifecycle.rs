//! Tournament lifecycle manager.
//!
//! Applies state-machine-validated transitions over a `FOR UPDATE`-locked
//! tournament row, so each transition and the side-state it gates commit in
//! one unit of work.

use super::errors::{TournamentError, TournamentResult};
use super::models::{
    Actor, ActorRole, NewTournament, Tournament, TournamentFormat, TournamentId, TournamentStatus,
};
use crate::audit;
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

const TOURNAMENT_COLUMNS: &str = "id, name, format, status, max_players, enrollment_cost, \
     campus_ids, number_of_rounds, game_config, reward_config, rewards_distributed, \
     created_at, started_at, completed_at";

/// Lifecycle manager
#[derive(Clone)]
pub struct LifecycleManager {
    pool: Arc<PgPool>,
}

impl LifecycleManager {
    /// Create a new lifecycle manager
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create a tournament in `Draft`.
    ///
    /// An `Organizer` may assign exactly one campus; only `Admin` may create
    /// multi-campus tournaments.
    pub async fn create(&self, new: NewTournament, actor: Actor) -> TournamentResult<TournamentId> {
        if actor.role == ActorRole::Organizer && new.campus_ids.len() != 1 {
            return Err(TournamentError::CampusScopeExceeded(new.campus_ids.len()));
        }

        let game_config = serde_json::to_value(&new.game_config)
            .map_err(|e| TournamentError::Configuration(e.to_string()))?;
        let reward_config = serde_json::to_value(&new.reward_config)
            .map_err(|e| TournamentError::Configuration(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO tournaments
                (name, format, status, max_players, enrollment_cost, campus_ids,
                 number_of_rounds, game_config, reward_config)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(&new.name)
        .bind(new.format.as_str())
        .bind(TournamentStatus::Draft.as_str())
        .bind(new.max_players as i32)
        .bind(new.enrollment_cost)
        .bind(&new.campus_ids)
        .bind(new.number_of_rounds.map(|n| n as i32))
        .bind(game_config)
        .bind(reward_config)
        .fetch_one(&mut *tx)
        .await?;

        let id: TournamentId = row.get("id");
        audit::record(
            &mut tx,
            Some(actor.user_id),
            "tournament.create",
            Some(id),
            json!({ "format": new.format.as_str(), "max_players": new.max_players }),
        )
        .await;
        tx.commit().await?;

        log::info!("Created tournament {id} ({})", new.format);
        Ok(id)
    }

    /// Open enrollment: `Draft -> EnrollmentOpen`.
    ///
    /// Requires at least one assigned campus, and both configuration
    /// documents must pass their shape checks before any player can pay in.
    pub async fn open_enrollment(
        &self,
        tournament_id: TournamentId,
        actor: Actor,
    ) -> TournamentResult<Tournament> {
        let mut tx = self.pool.begin().await?;
        let tournament = lock_tournament(&mut tx, tournament_id).await?;

        if tournament.campus_ids.is_empty() {
            return Err(TournamentError::MissingCampus);
        }
        tournament
            .game_config
            .validate()
            .map_err(TournamentError::Configuration)?;
        tournament
            .reward_config
            .validate()
            .map_err(TournamentError::Configuration)?;

        set_status(
            &mut tx,
            tournament_id,
            tournament.status,
            TournamentStatus::EnrollmentOpen,
        )
        .await?;

        audit::record(
            &mut tx,
            Some(actor.user_id),
            "tournament.open_enrollment",
            Some(tournament_id),
            json!({ "campus_ids": tournament.campus_ids }),
        )
        .await;
        tx.commit().await?;

        log::info!("Tournament {tournament_id} open for enrollment");
        self.get(tournament_id).await
    }

    /// Fetch a tournament without locking
    pub async fn get(&self, tournament_id: TournamentId) -> TournamentResult<Tournament> {
        let row = sqlx::query(&format!(
            "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1"
        ))
        .bind(tournament_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(TournamentError::NotFound(tournament_id))?;

        tournament_from_row(&row)
    }
}

/// Lock a tournament row for the duration of the caller's transaction.
///
/// Serializes every mutating operation on one tournament: concurrent
/// enrollment capacity checks, generation, finalization and distribution all
/// queue behind this lock.
pub(crate) async fn lock_tournament(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
) -> TournamentResult<Tournament> {
    let row = sqlx::query(&format!(
        "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1 FOR UPDATE"
    ))
    .bind(tournament_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(TournamentError::NotFound(tournament_id))?;

    tournament_from_row(&row)
}

/// Apply a validated status transition on an already-locked tournament row.
///
/// `started_at`/`completed_at` move with the status they witness; the reset
/// path back to `EnrollmentOpen` clears `started_at`.
pub(crate) async fn set_status(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
    from: TournamentStatus,
    to: TournamentStatus,
) -> TournamentResult<()> {
    if !from.can_transition_to(to) {
        return Err(TournamentError::InvalidTransition { from, to });
    }

    let sql = match to {
        TournamentStatus::InProgress => {
            "UPDATE tournaments SET status = $1, started_at = NOW() WHERE id = $2 AND status = $3"
        }
        TournamentStatus::Completed => {
            "UPDATE tournaments SET status = $1, completed_at = NOW() WHERE id = $2 AND status = $3"
        }
        TournamentStatus::EnrollmentOpen => {
            "UPDATE tournaments SET status = $1, started_at = NULL WHERE id = $2 AND status = $3"
        }
        TournamentStatus::Draft => {
            "UPDATE tournaments SET status = $1 WHERE id = $2 AND status = $3"
        }
    };

    let result = sqlx::query(sql)
        .bind(to.as_str())
        .bind(tournament_id)
        .bind(from.as_str())
        .execute(&mut **tx)
        .await?;

    // The row is locked, so a zero-row update means the in-memory status is
    // stale rather than a concurrent writer.
    if result.rows_affected() == 0 {
        return Err(TournamentError::InvalidTransition { from, to });
    }
    Ok(())
}

pub(crate) fn tournament_from_row(row: &PgRow) -> TournamentResult<Tournament> {
    let format_str: String = row.get("format");
    let format = TournamentFormat::parse(&format_str)
        .ok_or_else(|| TournamentError::Configuration(format!("unknown format '{format_str}'")))?;
    let status_str: String = row.get("status");
    let status = TournamentStatus::parse(&status_str)
        .ok_or_else(|| TournamentError::Configuration(format!("unknown status '{status_str}'")))?;

    let game_config = serde_json::from_value(row.get("game_config"))
        .map_err(|e| TournamentError::Configuration(format!("game_config: {e}")))?;
    let reward_config = serde_json::from_value(row.get("reward_config"))
        .map_err(|e| TournamentError::Configuration(format!("reward_config: {e}")))?;

    Ok(Tournament {
        id: row.get("id"),
        name: row.get("name"),
        format,
        status,
        max_players: row.get::<i32, _>("max_players") as u32,
        enrollment_cost: row.get("enrollment_cost"),
        campus_ids: row.get("campus_ids"),
        number_of_rounds: row.get::<Option<i32>, _>("number_of_rounds").map(|n| n as u32),
        game_config,
        reward_config,
        rewards_distributed: row.get("rewards_distributed"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        started_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("started_at")
            .map(|dt| dt.and_utc()),
        completed_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("completed_at")
            .map(|dt| dt.and_utc()),
    })
}
