//! Schedule error types.

use crate::db;
use crate::tournament::models::TournamentFormat;
use crate::tournament::TournamentError;
use thiserror::Error;

/// Schedule errors
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Roster size invalid for the chosen format; generation fails fast and
    /// creates no sessions
    #[error("Roster of {size} is invalid for {format}")]
    InvalidRosterCardinality {
        format: TournamentFormat,
        size: usize,
    },

    /// IndividualRanking and Swiss need a configured round count
    #[error("Format requires number_of_rounds to be configured")]
    MissingRoundCount,

    /// Regeneration requires an explicit reset first
    #[error("Sessions already exist for this tournament; reset before regenerating")]
    SessionsAlreadyExist,

    /// Reset refused because submitted results would be destroyed
    #[error("Sessions have results; pass force to delete and regenerate")]
    SessionsHaveResults,

    #[error("Session not found: {0}")]
    SessionNotFound(i64),

    /// A second result submission for the same session is rejected unless
    /// the caller marks it as an idempotent overwrite
    #[error("Session {0} already has a result")]
    SessionAlreadyCompleted(i64),

    /// Knockout sessions cannot end in a draw
    #[error("Session {0} requires a winner")]
    WinnerRequired(i64),

    #[error("Invalid result: {0}")]
    InvalidResult(String),

    /// Knockout stage of a GROUP_KNOCKOUT needs every group session resolved
    #[error("Group stage is not complete")]
    GroupStageIncomplete,

    /// The knockout stage was already generated
    #[error("Knockout stage already exists")]
    KnockoutStageExists,

    /// Swiss pairing needs the current round fully resolved
    #[error("Round {0} is not complete")]
    RoundIncomplete(u32),

    /// The configured number of rounds has already been generated
    #[error("All configured rounds have been generated")]
    AllRoundsGenerated,

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transient store-level contention; surfaced for caller-level retry
    #[error("Concurrent conflict, retry the request")]
    ConcurrentConflict,

    #[error(transparent)]
    Tournament(TournamentError),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for ScheduleError {
    fn from(e: sqlx::Error) -> Self {
        if db::is_transient_conflict(&e) {
            Self::ConcurrentConflict
        } else {
            Self::Database(e)
        }
    }
}

impl From<TournamentError> for ScheduleError {
    fn from(e: TournamentError) -> Self {
        match e {
            TournamentError::Database(e) => Self::from(e),
            other => Self::Tournament(other),
        }
    }
}

/// Result type for scheduling operations
pub type ScheduleResult<T> = Result<T, ScheduleError>;
