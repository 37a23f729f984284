//! Credit ledger implementation with atomic conditional updates.
//!
//! The ledger balance is the single piece of cross-tournament shared mutable
//! state, so every mutation is a single-statement conditional update (never a
//! read-then-write pair) plus an appended entry row. Mutating operations take
//! the caller's transaction so they compose into one unit of work with the
//! enrollment or distribution that caused them.

use super::{
    errors::{LedgerError, LedgerResult},
    models::{CreditAccount, EntryRefs, EntryType, LedgerEntry},
};
use crate::tournament::models::UserId;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use uuid::Uuid;

/// Credit ledger
#[derive(Clone)]
pub struct CreditLedger {
    pool: Arc<PgPool>,
}

impl CreditLedger {
    /// Create a new credit ledger
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Open a credit account with an initial balance
    pub async fn open_account(
        &self,
        user_id: UserId,
        initial_balance: i64,
    ) -> LedgerResult<CreditAccount> {
        if initial_balance < 0 {
            return Err(LedgerError::InvalidAmount(initial_balance));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO credit_accounts (user_id, balance)
            VALUES ($1, $2)
            RETURNING user_id, balance, xp, updated_at
            "#,
        )
        .bind(user_id)
        .bind(initial_balance)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| {
            if crate::db::is_unique_violation(&e) {
                LedgerError::AccountExists(user_id)
            } else {
                LedgerError::Database(e)
            }
        })?;

        Ok(account_from_row(&row))
    }

    /// Get a user's credit account
    pub async fn account(&self, user_id: UserId) -> LedgerResult<CreditAccount> {
        let row = sqlx::query(
            "SELECT user_id, balance, xp, updated_at FROM credit_accounts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(LedgerError::AccountNotFound(user_id))?;

        Ok(account_from_row(&row))
    }

    /// Debit a user's balance inside the caller's transaction.
    ///
    /// The balance check and the deduction happen in one statement
    /// (`balance = balance - $amount` guarded by `balance >= $amount`), which
    /// closes the double-spend race without any lock on the account row.
    ///
    /// # Returns
    ///
    /// * `LedgerResult<i64>` - New balance or error
    pub async fn debit(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        amount: i64,
        entry_type: EntryType,
        refs: EntryRefs,
        description: Option<String>,
    ) -> LedgerResult<i64> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let result = sqlx::query(
            "UPDATE credit_accounts
             SET balance = balance - $1, updated_at = NOW()
             WHERE user_id = $2 AND balance >= $1
             RETURNING balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        let new_balance: i64 = match result {
            Some(row) => row.get("balance"),
            None => {
                // Either the account is missing or the balance is short
                let check = sqlx::query("SELECT balance FROM credit_accounts WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(&mut **tx)
                    .await?;

                return match check {
                    Some(row) => Err(LedgerError::InsufficientCredit {
                        user_id,
                        available: row.get("balance"),
                        required: amount,
                    }),
                    None => Err(LedgerError::AccountNotFound(user_id)),
                };
            }
        };

        append_entry(tx, user_id, -amount, new_balance, entry_type, refs, description).await?;
        Ok(new_balance)
    }

    /// Credit a user's balance inside the caller's transaction.
    pub async fn credit(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        amount: i64,
        entry_type: EntryType,
        refs: EntryRefs,
        description: Option<String>,
    ) -> LedgerResult<i64> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        // Row lock so the overflow check and the write see the same balance
        let current = sqlx::query(
            "SELECT balance FROM credit_accounts WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(LedgerError::AccountNotFound(user_id))?;

        let current_balance: i64 = current.get("balance");
        let new_balance = current_balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;

        sqlx::query(
            "UPDATE credit_accounts SET balance = $1, updated_at = NOW() WHERE user_id = $2",
        )
        .bind(new_balance)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        append_entry(tx, user_id, amount, new_balance, entry_type, refs, description).await?;
        Ok(new_balance)
    }

    /// Unconditionally subtract a previously applied credit amount.
    ///
    /// Used only when a reward distribution is reversed: the stored applied
    /// amount comes back out exactly, so the balance may go negative if the
    /// user already spent the payout. Enrollment debits never take this path.
    pub async fn reverse(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        amount: i64,
        refs: EntryRefs,
        description: Option<String>,
    ) -> LedgerResult<i64> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let row = sqlx::query(
            "UPDATE credit_accounts
             SET balance = balance - $1, updated_at = NOW()
             WHERE user_id = $2
             RETURNING balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(LedgerError::AccountNotFound(user_id))?;

        let new_balance: i64 = row.get("balance");
        append_entry(
            tx,
            user_id,
            -amount,
            new_balance,
            EntryType::RewardReversal,
            refs,
            description,
        )
        .await?;
        Ok(new_balance)
    }

    /// Add (or subtract, for reversals) experience points.
    ///
    /// XP never gates enrollment, so this is a plain additive update floored
    /// at zero with no conditional guard.
    pub async fn add_xp(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        delta: i64,
    ) -> LedgerResult<i64> {
        let row = sqlx::query(
            "UPDATE credit_accounts
             SET xp = GREATEST(xp + $1, 0), updated_at = NOW()
             WHERE user_id = $2
             RETURNING xp",
        )
        .bind(delta)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(LedgerError::AccountNotFound(user_id))?;

        Ok(row.get("xp"))
    }

    /// Get recent ledger entries for a user
    pub async fn entries(&self, user_id: UserId, limit: i64) -> LedgerResult<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, entry_type, amount, balance_after, tournament_id,
                   enrollment_id, distribution_id, idempotency_key, description, created_at
            FROM ledger_entries
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        let entries = rows
            .into_iter()
            .map(|row| LedgerEntry {
                id: row.get("id"),
                user_id: row.get("user_id"),
                entry_type: EntryType::parse(&row.get::<String, _>("entry_type"))
                    .unwrap_or(EntryType::Adjustment),
                amount: row.get("amount"),
                balance_after: row.get("balance_after"),
                tournament_id: row.get("tournament_id"),
                enrollment_id: row.get("enrollment_id"),
                distribution_id: row.get("distribution_id"),
                idempotency_key: row.get("idempotency_key"),
                description: row.get("description"),
                created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            })
            .collect();

        Ok(entries)
    }
}

/// Append one ledger entry row (the append-only transaction record)
async fn append_entry(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    amount: i64,
    balance_after: i64,
    entry_type: EntryType,
    refs: EntryRefs,
    description: Option<String>,
) -> LedgerResult<i64> {
    let idempotency_key = format!("{}_{}_{}", entry_type.as_str(), user_id, Uuid::new_v4());

    let row = sqlx::query(
        r#"
        INSERT INTO ledger_entries
            (user_id, entry_type, amount, balance_after, tournament_id,
             enrollment_id, distribution_id, idempotency_key, description)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(entry_type.as_str())
    .bind(amount)
    .bind(balance_after)
    .bind(refs.tournament_id)
    .bind(refs.enrollment_id)
    .bind(refs.distribution_id)
    .bind(idempotency_key)
    .bind(description)
    .fetch_one(&mut **tx)
    .await?;

    Ok(row.get("id"))
}

fn account_from_row(row: &sqlx::postgres::PgRow) -> CreditAccount {
    CreditAccount {
        user_id: row.get("user_id"),
        balance: row.get("balance"),
        xp: row.get("xp"),
        updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
    }
}
