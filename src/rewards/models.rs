//! Reward data models.

use crate::tournament::models::{TournamentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A user's current level in one skill
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SkillRating {
    pub user_id: UserId,
    pub skill: String,
    pub level: f64,
    pub updated_at: DateTime<Utc>,
}

/// Everything one distribution run applied to one participant.
///
/// The stored deltas are the exact amounts that went out, so a forced
/// redistribution can reverse them precisely regardless of what the
/// configuration says today.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DistributionRecord {
    pub distribution_id: Uuid,
    pub tournament_id: TournamentId,
    pub user_id: UserId,
    pub credits: i64,
    pub xp: i64,
    /// Applied (post-clamp) level change per skill
    pub skill_deltas: BTreeMap<String, f64>,
    pub reversed: bool,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one `distribute` call
#[derive(Clone, Debug)]
pub struct DistributionSummary {
    pub tournament_id: TournamentId,
    /// `None` when the call was an idempotent no-op
    pub distribution_id: Option<Uuid>,
    pub applied: bool,
    /// Records of a previous distribution reversed by a forced run
    pub reversed_previous: usize,
    pub participants: usize,
    pub credits_paid: i64,
    pub xp_granted: i64,
}

impl DistributionSummary {
    pub(crate) fn noop(tournament_id: TournamentId) -> Self {
        Self {
            tournament_id,
            distribution_id: None,
            applied: false,
            reversed_previous: 0,
            participants: 0,
            credits_paid: 0,
            xp_granted: 0,
        }
    }
}
