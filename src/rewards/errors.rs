//! Reward error types.

use crate::db;
use crate::ledger::LedgerError;
use crate::tournament::models::{TournamentId, TournamentStatus};
use crate::tournament::TournamentError;
use thiserror::Error;

/// Reward errors
#[derive(Debug, Error)]
pub enum RewardError {
    /// Rewards only pay out on a completed tournament
    #[error("Tournament is {0}, expected completed")]
    NotCompleted(TournamentStatus),

    /// Distribution reads the persisted ranking, which must exist
    #[error("Tournament {0} has no finalized rankings")]
    NotFinalized(TournamentId),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transient store-level contention; surfaced for caller-level retry
    #[error("Concurrent conflict, retry the request")]
    ConcurrentConflict,

    #[error(transparent)]
    Tournament(TournamentError),

    #[error(transparent)]
    Ledger(LedgerError),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RewardError {
    fn from(e: sqlx::Error) -> Self {
        if db::is_transient_conflict(&e) {
            Self::ConcurrentConflict
        } else {
            Self::Database(e)
        }
    }
}

impl From<TournamentError> for RewardError {
    fn from(e: TournamentError) -> Self {
        match e {
            TournamentError::Database(e) => Self::from(e),
            other => Self::Tournament(other),
        }
    }
}

impl From<LedgerError> for RewardError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Database(e) => Self::from(e),
            other => Self::Ledger(other),
        }
    }
}

/// Result type for reward operations
pub type RewardResult<T> = Result<T, RewardError>;
