//! Ledger error types.

use crate::tournament::models::UserId;
use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Insufficient credit for a conditional debit
    #[error("Insufficient credit for user {user_id}: available {available}, required {required}")]
    InsufficientCredit {
        user_id: UserId,
        available: i64,
        required: i64,
    },

    /// Account not found
    #[error("Credit account not found for user {0}")]
    AccountNotFound(UserId),

    /// Account already exists
    #[error("Credit account already exists for user {0}")]
    AccountExists(UserId),

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Balance would overflow
    #[error("Balance overflow")]
    BalanceOverflow,
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
