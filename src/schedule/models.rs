//! Session data models.

use crate::results::standings::MatchOutcome;
use crate::tournament::models::{CampusId, TournamentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session ID type
pub type SessionId = i64;

/// Placeholder participant id for a knockout slot awaiting a winner.
///
/// `0` is never a valid user id anywhere in the engine.
pub const PENDING_SLOT: UserId = 0;

/// Result payload attached to a completed session
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionResult {
    /// Pairwise scoreline; `participants[0]` is home, `participants[1]` away
    Score { home_goals: i64, away_goals: i64 },
    /// Placement-ordered participants for one round, best first
    Placements { placements: Vec<UserId> },
}

impl SessionResult {
    /// Shape-check a result against the session's participant list.
    pub fn validate(&self, participants: &[UserId]) -> Result<(), String> {
        match self {
            Self::Score { home_goals, away_goals } => {
                if participants.len() != 2 {
                    return Err(format!(
                        "score result requires 2 participants, session has {}",
                        participants.len()
                    ));
                }
                if participants.contains(&PENDING_SLOT) {
                    return Err("session still has an undecided slot".to_string());
                }
                if *home_goals < 0 || *away_goals < 0 {
                    return Err("goals must be non-negative".to_string());
                }
                Ok(())
            }
            Self::Placements { placements } => {
                let mut expected: Vec<UserId> = participants.to_vec();
                let mut got: Vec<UserId> = placements.clone();
                expected.sort_unstable();
                got.sort_unstable();
                if expected != got {
                    return Err(
                        "placements must be a permutation of the session participants".to_string(),
                    );
                }
                Ok(())
            }
        }
    }
}

/// One scheduled match or round-group.
///
/// Sessions are created in bulk by generation and never re-generated once any
/// result exists, except through the explicit delete-and-regenerate path.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub tournament_id: TournamentId,
    pub campus_id: CampusId,
    pub field_index: u32,
    pub scheduled_at: DateTime<Utc>,
    /// Human-readable phase label: `league-round-2`, `group-A`,
    /// `quarterfinal`, `round-3`, `swiss-round-1`
    pub phase: String,
    pub round_number: u32,
    /// Bracket position within a knockout round; winners of slots `2k` and
    /// `2k+1` meet in slot `k` of the next round
    pub bracket_slot: Option<u32>,
    pub participants: Vec<UserId>,
    pub auto_generated: bool,
    pub completed: bool,
    pub forfeited: bool,
    pub result: Option<SessionResult>,
}

impl Session {
    /// Whether this session counts as resolved for lifecycle purposes
    pub fn is_resolved(&self) -> bool {
        self.completed || self.forfeited
    }

    /// Pairwise outcome for standings aggregation, if one applies.
    ///
    /// Forfeited sessions and placement payloads yield no outcome.
    pub fn outcome(&self) -> Option<MatchOutcome> {
        if self.forfeited {
            return None;
        }
        match &self.result {
            Some(SessionResult::Score { home_goals, away_goals }) if self.participants.len() == 2 => {
                Some(MatchOutcome {
                    home: self.participants[0],
                    away: self.participants[1],
                    home_goals: *home_goals,
                    away_goals: *away_goals,
                })
            }
            _ => None,
        }
    }

    /// Winner of a pairwise knockout session; `None` on a draw.
    pub fn winner(&self) -> Option<UserId> {
        match &self.result {
            Some(SessionResult::Score { home_goals, away_goals }) => match home_goals.cmp(away_goals)
            {
                std::cmp::Ordering::Greater => Some(self.participants[0]),
                std::cmp::Ordering::Less => Some(self.participants[1]),
                std::cmp::Ordering::Equal => None,
            },
            _ => None,
        }
    }
}

/// A generated session awaiting insertion
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedSession {
    pub campus_id: CampusId,
    pub field_index: u32,
    pub scheduled_at: DateTime<Utc>,
    pub phase: String,
    pub round_number: u32,
    pub bracket_slot: Option<u32>,
    pub participants: Vec<UserId>,
}

/// Label for a knockout round: `final`, `semifinal`, `quarterfinal`, then
/// `round-of-N` going outward.
pub fn knockout_round_label(round: u32, total_rounds: u32) -> String {
    let matches_in_round = 1u32 << (total_rounds - round);
    match matches_in_round {
        1 => "final".to_string(),
        2 => "semifinal".to_string(),
        4 => "quarterfinal".to_string(),
        m => format!("round-of-{}", m * 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(participants: Vec<UserId>, result: Option<SessionResult>) -> Session {
        Session {
            id: 1,
            tournament_id: 1,
            campus_id: 1,
            field_index: 0,
            scheduled_at: Utc::now(),
            phase: "league-round-1".to_string(),
            round_number: 1,
            bracket_slot: None,
            participants,
            auto_generated: true,
            completed: result.is_some(),
            forfeited: false,
            result,
        }
    }

    #[test]
    fn test_score_result_validation() {
        let ok = SessionResult::Score { home_goals: 2, away_goals: 1 };
        assert!(ok.validate(&[10, 20]).is_ok());
        assert!(ok.validate(&[10]).is_err());
        assert!(ok.validate(&[10, PENDING_SLOT]).is_err());

        let negative = SessionResult::Score { home_goals: -1, away_goals: 0 };
        assert!(negative.validate(&[10, 20]).is_err());
    }

    #[test]
    fn test_placements_must_be_permutation() {
        let result = SessionResult::Placements { placements: vec![30, 10, 20] };
        assert!(result.validate(&[10, 20, 30]).is_ok());

        let wrong = SessionResult::Placements { placements: vec![10, 20] };
        assert!(wrong.validate(&[10, 20, 30]).is_err());

        let stranger = SessionResult::Placements { placements: vec![10, 20, 99] };
        assert!(stranger.validate(&[10, 20, 30]).is_err());
    }

    #[test]
    fn test_winner_and_draw() {
        let win = session(vec![10, 20], Some(SessionResult::Score { home_goals: 3, away_goals: 1 }));
        assert_eq!(win.winner(), Some(10));

        let loss = session(vec![10, 20], Some(SessionResult::Score { home_goals: 0, away_goals: 1 }));
        assert_eq!(loss.winner(), Some(20));

        let draw = session(vec![10, 20], Some(SessionResult::Score { home_goals: 1, away_goals: 1 }));
        assert_eq!(draw.winner(), None);
    }

    #[test]
    fn test_forfeited_session_has_no_outcome() {
        let mut s = session(vec![10, 20], Some(SessionResult::Score { home_goals: 1, away_goals: 0 }));
        s.forfeited = true;
        assert!(s.outcome().is_none());
        assert!(s.is_resolved());
    }

    #[test]
    fn test_knockout_round_labels() {
        assert_eq!(knockout_round_label(3, 3), "final");
        assert_eq!(knockout_round_label(2, 3), "semifinal");
        assert_eq!(knockout_round_label(1, 3), "quarterfinal");
        assert_eq!(knockout_round_label(1, 4), "round-of-16");
        assert_eq!(knockout_round_label(1, 1), "final");
    }

    #[test]
    fn test_result_serde_round_trip() {
        let result = SessionResult::Score { home_goals: 2, away_goals: 2 };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["kind"], "score");
        let back: SessionResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }
}
