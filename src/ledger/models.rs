//! Ledger data models.

use crate::tournament::models::{TournamentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Enrollment ID type
pub type EnrollmentId = i64;

/// A user's spendable credit account.
///
/// `balance` is the materialized cache of the entry sum; every mutation to it
/// is an atomic conditional update paired with an appended entry.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CreditAccount {
    pub user_id: UserId,
    pub balance: i64,
    pub xp: i64,
    pub updated_at: DateTime<Utc>,
}

/// Ledger entry type
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum EntryType {
    /// Debit taken when an enrollment is admitted
    EnrollmentFee,
    /// Credit returned on withdrawal
    EnrollmentRefund,
    /// Credit paid by reward distribution
    RewardPayout,
    /// Debit taken when a distribution is reversed
    RewardReversal,
    /// Manual, audited correction
    Adjustment,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnrollmentFee => "enrollment_fee",
            Self::EnrollmentRefund => "enrollment_refund",
            Self::RewardPayout => "reward_payout",
            Self::RewardReversal => "reward_reversal",
            Self::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "enrollment_fee" => Some(Self::EnrollmentFee),
            "enrollment_refund" => Some(Self::EnrollmentRefund),
            "reward_payout" => Some(Self::RewardPayout),
            "reward_reversal" => Some(Self::RewardReversal),
            "adjustment" => Some(Self::Adjustment),
            _ => None,
        }
    }
}

/// Causal references carried by a ledger entry
#[derive(Clone, Copy, Debug, Default)]
pub struct EntryRefs {
    pub tournament_id: Option<TournamentId>,
    pub enrollment_id: Option<EnrollmentId>,
    pub distribution_id: Option<Uuid>,
}

impl EntryRefs {
    pub fn tournament(tournament_id: TournamentId) -> Self {
        Self {
            tournament_id: Some(tournament_id),
            ..Default::default()
        }
    }

    pub fn enrollment(tournament_id: TournamentId, enrollment_id: EnrollmentId) -> Self {
        Self {
            tournament_id: Some(tournament_id),
            enrollment_id: Some(enrollment_id),
            distribution_id: None,
        }
    }

    pub fn distribution(tournament_id: TournamentId, distribution_id: Uuid) -> Self {
        Self {
            tournament_id: Some(tournament_id),
            enrollment_id: None,
            distribution_id: Some(distribution_id),
        }
    }
}

/// Append-only ledger transaction record
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: UserId,
    pub entry_type: EntryType,
    /// Signed amount: negative for debits, positive for credits
    pub amount: i64,
    /// Account balance after this entry applied
    pub balance_after: i64,
    pub tournament_id: Option<TournamentId>,
    pub enrollment_id: Option<EnrollmentId>,
    pub distribution_id: Option<Uuid>,
    pub idempotency_key: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_round_trip() {
        use EntryType::*;
        for t in [
            EnrollmentFee,
            EnrollmentRefund,
            RewardPayout,
            RewardReversal,
            Adjustment,
        ] {
            assert_eq!(EntryType::parse(t.as_str()), Some(t));
        }
        assert_eq!(EntryType::parse("buy_in"), None);
    }

    #[test]
    fn test_entry_refs_constructors() {
        let refs = EntryRefs::enrollment(7, 42);
        assert_eq!(refs.tournament_id, Some(7));
        assert_eq!(refs.enrollment_id, Some(42));
        assert!(refs.distribution_id.is_none());
    }
}
