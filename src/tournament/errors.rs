//! Tournament lifecycle error types.

use super::models::{TournamentId, TournamentStatus};
use thiserror::Error;

/// Tournament errors
#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("Tournament not found: {0}")]
    NotFound(TournamentId),

    /// Lifecycle violated: the requested move is not in the transition table
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: TournamentStatus,
        to: TournamentStatus,
    },

    /// Opening enrollment requires at least one assigned campus
    #[error("Tournament has no campus assigned")]
    MissingCampus,

    /// A non-privileged role may only assign a single campus
    #[error("Role may only assign a single campus, got {0}")]
    CampusScopeExceeded(usize),

    /// Malformed game_config / reward_config; never partially applied
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for tournament operations
pub type TournamentResult<T> = Result<T, TournamentError>;
