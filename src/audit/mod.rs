//! Best-effort audit sink.
//!
//! Audit rows are written inside a savepoint (a sqlx nested transaction) so a
//! failed audit write never aborts the caller's unit of work. Failures are
//! logged and swallowed; the sink is fire-and-forget by contract.

use crate::tournament::models::{TournamentId, UserId};
use sqlx::{Acquire, Postgres, Transaction};

/// Record an audit event inside the caller's transaction.
///
/// Always returns `Ok`-like control flow to the caller: the write happens in
/// an isolated sub-transaction and any error is demoted to a warning.
pub async fn record(
    tx: &mut Transaction<'_, Postgres>,
    actor_id: Option<UserId>,
    action: &str,
    tournament_id: Option<TournamentId>,
    detail: serde_json::Value,
) {
    let result = async {
        let mut savepoint = tx.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO audit_log (actor_id, action, tournament_id, detail)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(actor_id)
        .bind(action)
        .bind(tournament_id)
        .bind(&detail)
        .execute(&mut *savepoint)
        .await?;
        savepoint.commit().await
    }
    .await;

    if let Err(e) = result {
        log::warn!("audit write for '{action}' failed, continuing: {e}");
    }
}
