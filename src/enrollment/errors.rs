//! Enrollment error types.
//!
//! Storage-level conflicts are classified at conversion time: a unique-index
//! violation on the active-enrollment guard becomes [`EnrollmentError::DuplicateEnrollment`]
//! and transient contention becomes the retryable
//! [`EnrollmentError::ConcurrentConflict`]; everything else surfaces as a
//! database error. Business-rule rejections are never retried.

use crate::db;
use crate::ledger::LedgerError;
use crate::tournament::models::TournamentStatus;
use crate::tournament::TournamentError;
use thiserror::Error;

/// Enrollment errors
#[derive(Debug, Error)]
pub enum EnrollmentError {
    /// Tournament is not accepting enrollments in its current state
    #[error("Enrollment is not open (tournament is {status})")]
    EnrollmentNotOpen { status: TournamentStatus },

    /// Active-enrollment count already at max_players
    #[error("Tournament is full ({max_players} players)")]
    CapacityExceeded { max_players: u32 },

    /// The (user, tournament) pair already has an active enrollment
    #[error("User is already enrolled in this tournament")]
    DuplicateEnrollment,

    /// Ledger balance below the enrollment cost
    #[error("Insufficient credit: available {available}, required {required}")]
    InsufficientCredit { available: i64, required: i64 },

    /// No enrollment exists for the pair
    #[error("User is not enrolled in this tournament")]
    NotEnrolled,

    /// The enrollment was already withdrawn; no second refund is issued
    #[error("Enrollment already withdrawn")]
    AlreadyWithdrawn,

    /// Transient store-level contention; retried once internally, then
    /// surfaced for caller-level retry
    #[error("Concurrent conflict, retry the request")]
    ConcurrentConflict,

    #[error(transparent)]
    Tournament(TournamentError),

    #[error(transparent)]
    Ledger(LedgerError),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for EnrollmentError {
    fn from(e: sqlx::Error) -> Self {
        if db::is_unique_violation(&e) {
            Self::DuplicateEnrollment
        } else if db::is_transient_conflict(&e) {
            Self::ConcurrentConflict
        } else {
            Self::Database(e)
        }
    }
}

impl From<LedgerError> for EnrollmentError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientCredit {
                available, required, ..
            } => Self::InsufficientCredit {
                available,
                required,
            },
            LedgerError::Database(e) => Self::from(e),
            other => Self::Ledger(other),
        }
    }
}

impl From<TournamentError> for EnrollmentError {
    fn from(e: TournamentError) -> Self {
        match e {
            TournamentError::Database(e) => Self::from(e),
            other => Self::Tournament(other),
        }
    }
}

/// Result type for enrollment operations
pub type EnrollmentResult<T> = Result<T, EnrollmentError>;
