//! Ranking data models.

use crate::tournament::models::{TournamentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One participant's final placement in a completed tournament.
///
/// Score-based formats carry the full match record; placement-based formats
/// carry `average_placement` instead.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RankingEntry {
    pub tournament_id: TournamentId,
    pub user_id: UserId,
    /// 1-based final rank; strictly total, no shared ranks
    pub rank: u32,
    pub points: i64,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: i64,
    pub goals_against: i64,
    pub average_placement: Option<f64>,
    pub finalized_at: DateTime<Utc>,
}
