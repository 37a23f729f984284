//! Enrollment data models.

use crate::ledger::models::EnrollmentId;
use crate::tournament::models::{TournamentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Enrollment status
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum EnrollmentStatus {
    /// Created but not yet admitted (approval workflows)
    Pending,
    /// Admitted: holds a roster seat and has paid the fee
    Approved,
    /// Withdrawn: seat released, fee refunded
    Withdrawn,
}

impl EnrollmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "withdrawn" => Some(Self::Withdrawn),
            _ => None,
        }
    }
}

/// The binding of one user to one tournament.
///
/// At most one active enrollment may exist per (user, tournament) pair;
/// the store's partial unique index enforces this, not application reads.
/// Withdrawal soft-deletes (`is_active = false`) so the ledger's causal
/// references stay resolvable.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub tournament_id: TournamentId,
    pub user_id: UserId,
    pub status: EnrollmentStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub withdrawn_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        use EnrollmentStatus::*;
        for s in [Pending, Approved, Withdrawn] {
            assert_eq!(EnrollmentStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(EnrollmentStatus::parse("active"), None);
    }
}
