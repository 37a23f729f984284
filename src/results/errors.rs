//! Results error types.

use crate::db;
use crate::schedule::ScheduleError;
use crate::tournament::models::TournamentStatus;
use crate::tournament::TournamentError;
use thiserror::Error;

/// Results errors
#[derive(Debug, Error)]
pub enum ResultsError {
    /// Finalization is only meaningful while results are being collected
    #[error("Tournament is {0}, expected in_progress")]
    NotInProgress(TournamentStatus),

    #[error("Tournament has no sessions to finalize")]
    NoSessions,

    /// Every session must be completed or forfeited before finalization
    #[error("{0} sessions are still unresolved")]
    IncompleteSessions(usize),

    /// GROUP_KNOCKOUT cannot finalize on the group stage alone
    #[error("Knockout stage has not been generated")]
    KnockoutStageMissing,

    /// Swiss finalization needs every configured round generated and played
    #[error("Only {generated} of {configured} rounds have been generated")]
    RoundsRemaining { generated: u32, configured: u32 },

    #[error("No rankings recorded for tournament {0}")]
    NotFinalized(i64),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transient store-level contention; surfaced for caller-level retry
    #[error("Concurrent conflict, retry the request")]
    ConcurrentConflict,

    #[error(transparent)]
    Tournament(TournamentError),

    #[error(transparent)]
    Schedule(ScheduleError),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for ResultsError {
    fn from(e: sqlx::Error) -> Self {
        if db::is_transient_conflict(&e) {
            Self::ConcurrentConflict
        } else {
            Self::Database(e)
        }
    }
}

impl From<TournamentError> for ResultsError {
    fn from(e: TournamentError) -> Self {
        match e {
            TournamentError::Database(e) => Self::from(e),
            other => Self::Tournament(other),
        }
    }
}

impl From<ScheduleError> for ResultsError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::Database(e) => Self::from(e),
            ScheduleError::ConcurrentConflict => Self::ConcurrentConflict,
            other => Self::Schedule(other),
        }
    }
}

/// Result type for results operations
pub type ResultsResult<T> = Result<T, ResultsError>;
