//! Enrollment coordinator: serializes concurrent admission requests.
//!
//! Four race windows are closed here:
//! 1. the tournament row is locked `FOR UPDATE` before the capacity count is
//!    re-read, so two requests can never both observe "one seat left";
//! 2. the fee deduction is a single atomic conditional update in the ledger;
//! 3. the partial unique index over active enrollments is the authoritative
//!    duplicate guard, translated into `DuplicateEnrollment` on violation;
//! 4. withdrawal locks the specific enrollment row before refunding, so the
//!    same enrollment can never be refunded twice.
//!
//! Each call is one transaction; any failure rolls back the whole attempt.

use super::{
    errors::{EnrollmentError, EnrollmentResult},
    models::{Enrollment, EnrollmentStatus},
};
use crate::audit;
use crate::ledger::{CreditLedger, EntryRefs, EntryType};
use crate::tournament::lifecycle;
use crate::tournament::models::{TournamentId, TournamentStatus, UserId};
use serde_json::json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

/// Enrollment coordinator
#[derive(Clone)]
pub struct EnrollmentCoordinator {
    pool: Arc<PgPool>,
    ledger: CreditLedger,
}

impl EnrollmentCoordinator {
    /// Create a new enrollment coordinator
    pub fn new(pool: Arc<PgPool>, ledger: CreditLedger) -> Self {
        Self { pool, ledger }
    }

    /// Enroll a user, consuming one seat and the enrollment fee.
    ///
    /// Retried once internally on transient store contention; business-rule
    /// rejections surface immediately.
    ///
    /// # Errors
    ///
    /// * `EnrollmentError::EnrollmentNotOpen` - Tournament not accepting entries
    /// * `EnrollmentError::CapacityExceeded` - No seats left
    /// * `EnrollmentError::DuplicateEnrollment` - Pair already actively enrolled
    /// * `EnrollmentError::InsufficientCredit` - Balance below the fee
    pub async fn enroll(
        &self,
        tournament_id: TournamentId,
        user_id: UserId,
    ) -> EnrollmentResult<Enrollment> {
        match self.try_enroll(tournament_id, user_id).await {
            Err(EnrollmentError::ConcurrentConflict) => {
                log::warn!("enroll(t={tournament_id}, u={user_id}) hit contention, retrying once");
                self.try_enroll(tournament_id, user_id).await
            }
            other => other,
        }
    }

    async fn try_enroll(
        &self,
        tournament_id: TournamentId,
        user_id: UserId,
    ) -> EnrollmentResult<Enrollment> {
        let mut tx = self.pool.begin().await?;

        let tournament = lifecycle::lock_tournament(&mut tx, tournament_id).await?;
        if tournament.status != TournamentStatus::EnrollmentOpen {
            return Err(EnrollmentError::EnrollmentNotOpen {
                status: tournament.status,
            });
        }

        // Re-read the seat count under the tournament lock
        let occupied = active_count(&mut tx, tournament_id).await?;
        if occupied >= tournament.max_players as i64 {
            return Err(EnrollmentError::CapacityExceeded {
                max_players: tournament.max_players,
            });
        }

        // The partial unique index fires here for duplicate pairs; the From
        // impl turns that violation into DuplicateEnrollment.
        let row = sqlx::query(
            r#"
            INSERT INTO enrollments (tournament_id, user_id, status, is_active, approved_at)
            VALUES ($1, $2, $3, TRUE, NOW())
            RETURNING id, created_at, approved_at
            "#,
        )
        .bind(tournament_id)
        .bind(user_id)
        .bind(EnrollmentStatus::Approved.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let enrollment_id: i64 = row.get("id");

        if tournament.enrollment_cost > 0 {
            self.ledger
                .debit(
                    &mut tx,
                    user_id,
                    tournament.enrollment_cost,
                    EntryType::EnrollmentFee,
                    EntryRefs::enrollment(tournament_id, enrollment_id),
                    Some(format!("Enrollment fee for tournament {tournament_id}")),
                )
                .await?;
        }

        audit::record(
            &mut tx,
            Some(user_id),
            "enrollment.enroll",
            Some(tournament_id),
            json!({ "enrollment_id": enrollment_id, "cost": tournament.enrollment_cost }),
        )
        .await;
        tx.commit().await?;

        Ok(Enrollment {
            id: enrollment_id,
            tournament_id,
            user_id,
            status: EnrollmentStatus::Approved,
            is_active: true,
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            approved_at: row
                .get::<Option<chrono::NaiveDateTime>, _>("approved_at")
                .map(|dt| dt.and_utc()),
            withdrawn_at: None,
        })
    }

    /// Withdraw a user, releasing the seat and refunding the fee atomically.
    ///
    /// # Returns
    ///
    /// * `EnrollmentResult<i64>` - The refunded amount
    pub async fn unenroll(
        &self,
        tournament_id: TournamentId,
        user_id: UserId,
    ) -> EnrollmentResult<i64> {
        match self.try_unenroll(tournament_id, user_id).await {
            Err(EnrollmentError::ConcurrentConflict) => {
                log::warn!(
                    "unenroll(t={tournament_id}, u={user_id}) hit contention, retrying once"
                );
                self.try_unenroll(tournament_id, user_id).await
            }
            other => other,
        }
    }

    async fn try_unenroll(
        &self,
        tournament_id: TournamentId,
        user_id: UserId,
    ) -> EnrollmentResult<i64> {
        let mut tx = self.pool.begin().await?;

        // Same lock order as enroll: tournament first, then the enrollment row
        let tournament = lifecycle::lock_tournament(&mut tx, tournament_id).await?;
        if tournament.status != TournamentStatus::EnrollmentOpen {
            return Err(EnrollmentError::EnrollmentNotOpen {
                status: tournament.status,
            });
        }

        let active = sqlx::query(
            "SELECT id FROM enrollments
             WHERE tournament_id = $1 AND user_id = $2 AND is_active
             FOR UPDATE",
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(active) = active else {
            // Distinguish "never enrolled" from "already withdrawn" so a
            // concurrent second unenroll gets a well-defined answer.
            let withdrawn = sqlx::query(
                "SELECT 1 FROM enrollments
                 WHERE tournament_id = $1 AND user_id = $2 AND NOT is_active
                 LIMIT 1",
            )
            .bind(tournament_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

            return Err(if withdrawn.is_some() {
                EnrollmentError::AlreadyWithdrawn
            } else {
                EnrollmentError::NotEnrolled
            });
        };

        let enrollment_id: i64 = active.get("id");
        sqlx::query(
            "UPDATE enrollments
             SET is_active = FALSE, status = $1, withdrawn_at = NOW()
             WHERE id = $2",
        )
        .bind(EnrollmentStatus::Withdrawn.as_str())
        .bind(enrollment_id)
        .execute(&mut *tx)
        .await?;

        if tournament.enrollment_cost > 0 {
            self.ledger
                .credit(
                    &mut tx,
                    user_id,
                    tournament.enrollment_cost,
                    EntryType::EnrollmentRefund,
                    EntryRefs::enrollment(tournament_id, enrollment_id),
                    Some(format!("Withdrawal refund for tournament {tournament_id}")),
                )
                .await?;
        }

        audit::record(
            &mut tx,
            Some(user_id),
            "enrollment.unenroll",
            Some(tournament_id),
            json!({ "enrollment_id": enrollment_id, "refund": tournament.enrollment_cost }),
        )
        .await;
        tx.commit().await?;

        Ok(tournament.enrollment_cost)
    }

    /// Active roster in deterministic seeding order (enrollment time, then id)
    pub async fn roster(&self, tournament_id: TournamentId) -> EnrollmentResult<Vec<UserId>> {
        let rows = sqlx::query(
            "SELECT user_id FROM enrollments
             WHERE tournament_id = $1 AND is_active
             ORDER BY created_at, id",
        )
        .bind(tournament_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(|r| r.get("user_id")).collect())
    }
}

/// Count active enrollments inside the caller's transaction
pub(crate) async fn active_count(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS n FROM enrollments WHERE tournament_id = $1 AND is_active",
    )
    .bind(tournament_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row.get("n"))
}

/// Load the active roster inside the caller's transaction, in seeding order
pub(crate) async fn roster_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
) -> Result<Vec<UserId>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT user_id FROM enrollments
         WHERE tournament_id = $1 AND is_active
         ORDER BY created_at, id",
    )
    .bind(tournament_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows.into_iter().map(|r| r.get("user_id")).collect())
}
