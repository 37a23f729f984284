//! Tournament data models and typed configuration documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tournament ID type
pub type TournamentId = i64;

/// User ID type (pre-validated by the identity layer)
pub type UserId = i64;

/// Campus (venue) ID type
pub type CampusId = i64;

/// Tournament lifecycle status.
///
/// Transitions are validated against a fixed adjacency table; see
/// [`TournamentStatus::can_transition_to`]. The terminal reward payout is
/// gated separately by the `rewards_distributed` flag on the tournament row.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TournamentStatus {
    /// Being configured, not yet visible for enrollment
    Draft,
    /// Accepting enrollments
    EnrollmentOpen,
    /// Sessions generated, results being collected
    InProgress,
    /// Rankings finalized
    Completed,
}

impl TournamentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::EnrollmentOpen => "enrollment_open",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "enrollment_open" => Some(Self::EnrollmentOpen),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// The fixed transition table. `InProgress -> EnrollmentOpen` is the
    /// explicit delete-and-regenerate path taken by the session scheduler's
    /// reset; every other move is forward-only.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::EnrollmentOpen)
                | (Self::EnrollmentOpen, Self::InProgress)
                | (Self::InProgress, Self::EnrollmentOpen)
                | (Self::InProgress, Self::Completed)
        )
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Competition format
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TournamentFormat {
    /// Round robin league: every pair plays exactly once
    HeadToHead,
    /// Single elimination bracket; roster must be a power of two
    Knockout,
    /// Group stage round robin feeding a knockout bracket
    GroupKnockout,
    /// All participants compete together for a configured number of rounds
    IndividualRanking,
    /// Standings-driven pairing each round
    Swiss,
}

impl TournamentFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HeadToHead => "head_to_head",
            Self::Knockout => "knockout",
            Self::GroupKnockout => "group_knockout",
            Self::IndividualRanking => "individual_ranking",
            Self::Swiss => "swiss",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "head_to_head" => Some(Self::HeadToHead),
            "knockout" => Some(Self::Knockout),
            "group_knockout" => Some(Self::GroupKnockout),
            "individual_ranking" => Some(Self::IndividualRanking),
            "swiss" => Some(Self::Swiss),
            _ => None,
        }
    }

    /// Formats whose schedule length depends on a configured round count.
    pub fn requires_round_count(self) -> bool {
        matches!(self, Self::IndividualRanking | Self::Swiss)
    }
}

impl fmt::Display for TournamentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role supplied by the identity layer alongside the acting user id.
///
/// The engine trusts the pair and performs only domain-level scope checks.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ActorRole {
    Admin,
    Organizer,
}

/// Pre-validated acting identity
#[derive(Clone, Copy, Debug)]
pub struct Actor {
    pub user_id: UserId,
    pub role: ActorRole,
}

/// Points awarded per match outcome in score-based formats
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PointTable {
    pub win: i64,
    pub draw: i64,
    pub loss: i64,
}

impl Default for PointTable {
    fn default() -> Self {
        Self {
            win: 3,
            draw: 1,
            loss: 0,
        }
    }
}

/// How raw round scores map onto placements in INDIVIDUAL_RANKING
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingDirection {
    /// Placement 1 is best (times, stroke counts)
    #[default]
    LowerIsBetter,
    /// Highest raw score takes placement 1
    HigherIsBetter,
}

/// Game configuration document.
///
/// Persisted as an opaque JSONB column and validated on first use;
/// missing fields fall back to the defaults below.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct GameConfig {
    pub point_table: PointTable,
    /// Probability of a drawn match in simulated outcomes, `[0, 1)`
    pub draw_probability: f64,
    /// Flattens (>1) or sharpens (<1) the skill-difference win curve
    pub upset_factor: f64,
    pub ranking_direction: RankingDirection,
    /// Group size for GROUP_KNOCKOUT partitioning
    pub group_size: usize,
    /// Advancers per group into the knockout bracket
    pub advance_per_group: usize,
    /// Per-skill weighting used by the match simulator
    pub skill_weights: BTreeMap<String, f64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            point_table: PointTable::default(),
            draw_probability: 0.2,
            upset_factor: 1.0,
            ranking_direction: RankingDirection::default(),
            group_size: 4,
            advance_per_group: 2,
            skill_weights: BTreeMap::new(),
        }
    }
}

impl GameConfig {
    /// Shape validation, run once when the config is first used.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..1.0).contains(&self.draw_probability) {
            return Err(format!(
                "draw_probability must be in [0, 1), got {}",
                self.draw_probability
            ));
        }
        if !self.upset_factor.is_finite() || self.upset_factor <= 0.0 {
            return Err(format!("upset_factor must be positive, got {}", self.upset_factor));
        }
        if self.group_size < 2 {
            return Err(format!("group_size must be >= 2, got {}", self.group_size));
        }
        if self.advance_per_group == 0 || self.advance_per_group > self.group_size {
            return Err(format!(
                "advance_per_group must be in 1..={}, got {}",
                self.group_size, self.advance_per_group
            ));
        }
        if let Some((skill, w)) = self.skill_weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(format!("skill weight for '{skill}' is not finite: {w}"));
        }
        Ok(())
    }
}

/// One placement tier's payout
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RewardTier {
    pub credits: i64,
    pub xp: i64,
}

/// Placement-tier payouts: podium tiers plus a participation floor
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct RewardTiers {
    pub first: RewardTier,
    pub second: RewardTier,
    pub third: RewardTier,
    pub participation: RewardTier,
}

impl Default for RewardTiers {
    fn default() -> Self {
        Self {
            first: RewardTier { credits: 100, xp: 500 },
            second: RewardTier { credits: 50, xp: 300 },
            third: RewardTier { credits: 25, xp: 200 },
            participation: RewardTier { credits: 0, xp: 50 },
        }
    }
}

/// Placement-factor curve for skill updates.
///
/// Rank 1 maps to `top`, the last rank to `bottom`, linear in between;
/// winners trend positive and bottom performers trend negative.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct PlacementCurve {
    pub top: f64,
    pub bottom: f64,
}

impl Default for PlacementCurve {
    fn default() -> Self {
        Self { top: 1.0, bottom: -1.0 }
    }
}

impl PlacementCurve {
    /// Interpolated factor for `rank` (1-based) in a field of `field` players.
    pub fn factor(&self, rank: usize, field: usize) -> f64 {
        if field <= 1 {
            return self.top;
        }
        let t = (rank - 1) as f64 / (field - 1) as f64;
        self.top + (self.bottom - self.top) * t
    }
}

/// Bounds and default for per-skill rating levels
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct SkillBounds {
    pub min_level: f64,
    pub max_level: f64,
    pub default_level: f64,
}

impl Default for SkillBounds {
    fn default() -> Self {
        Self {
            min_level: 10.0,
            max_level: 100.0,
            default_level: 50.0,
        }
    }
}

impl SkillBounds {
    pub fn clamp(&self, level: f64) -> f64 {
        level.clamp(self.min_level, self.max_level)
    }
}

/// One skill touched by reward distribution, with its update weight
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SkillReward {
    pub skill: String,
    pub weight: f64,
}

/// Reward configuration document, persisted as JSONB like [`GameConfig`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct RewardConfig {
    pub tiers: RewardTiers,
    pub skills: Vec<SkillReward>,
    pub curve: PlacementCurve,
    pub bounds: SkillBounds,
}

impl RewardConfig {
    /// Tier payout for a 1-based final rank.
    pub fn tier_for_rank(&self, rank: u32) -> RewardTier {
        match rank {
            1 => self.tiers.first,
            2 => self.tiers.second,
            3 => self.tiers.third,
            _ => self.tiers.participation,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for tier in [
            self.tiers.first,
            self.tiers.second,
            self.tiers.third,
            self.tiers.participation,
        ] {
            if tier.credits < 0 || tier.xp < 0 {
                return Err("reward tiers must be non-negative".to_string());
            }
        }
        if let Some(s) = self.skills.iter().find(|s| !s.weight.is_finite()) {
            return Err(format!("skill weight for '{}' is not finite", s.skill));
        }
        if self.bounds.min_level >= self.bounds.max_level {
            return Err(format!(
                "skill bounds inverted: min {} >= max {}",
                self.bounds.min_level, self.bounds.max_level
            ));
        }
        if self.bounds.default_level < self.bounds.min_level
            || self.bounds.default_level > self.bounds.max_level
        {
            return Err("default skill level outside bounds".to_string());
        }
        if !self.curve.top.is_finite() || !self.curve.bottom.is_finite() {
            return Err("placement curve must be finite".to_string());
        }
        Ok(())
    }
}

/// A competition instance, owned exclusively by the engine and mutated only
/// through state-machine-validated transitions.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub format: TournamentFormat,
    pub status: TournamentStatus,
    pub max_players: u32,
    pub enrollment_cost: i64,
    pub campus_ids: Vec<CampusId>,
    pub number_of_rounds: Option<u32>,
    pub game_config: GameConfig,
    pub reward_config: RewardConfig,
    pub rewards_distributed: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Parameters for creating a tournament
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewTournament {
    pub name: String,
    pub format: TournamentFormat,
    pub max_players: u32,
    pub enrollment_cost: i64,
    pub campus_ids: Vec<CampusId>,
    pub number_of_rounds: Option<u32>,
    pub game_config: GameConfig,
    pub reward_config: RewardConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table_forward_path() {
        use TournamentStatus::*;
        assert!(Draft.can_transition_to(EnrollmentOpen));
        assert!(EnrollmentOpen.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
    }

    #[test]
    fn test_transition_table_reset_path() {
        use TournamentStatus::*;
        assert!(InProgress.can_transition_to(EnrollmentOpen));
        assert!(!EnrollmentOpen.can_transition_to(Draft));
    }

    #[test]
    fn test_transition_table_rejects_skips_and_self_loops() {
        use TournamentStatus::*;
        let all = [Draft, EnrollmentOpen, InProgress, Completed];
        for s in all {
            assert!(!s.can_transition_to(s), "{s} -> {s} must be rejected");
        }
        assert!(!Draft.can_transition_to(InProgress));
        assert!(!Draft.can_transition_to(Completed));
        assert!(!EnrollmentOpen.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Draft));
        assert!(!Completed.can_transition_to(InProgress));
    }

    #[test]
    fn test_status_string_round_trip() {
        use TournamentStatus::*;
        for s in [Draft, EnrollmentOpen, InProgress, Completed] {
            assert_eq!(TournamentStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(TournamentStatus::parse("finished"), None);
    }

    #[test]
    fn test_format_string_round_trip() {
        use TournamentFormat::*;
        for f in [HeadToHead, Knockout, GroupKnockout, IndividualRanking, Swiss] {
            assert_eq!(TournamentFormat::parse(f.as_str()), Some(f));
        }
        assert!(IndividualRanking.requires_round_count());
        assert!(Swiss.requires_round_count());
        assert!(!Knockout.requires_round_count());
    }

    #[test]
    fn test_game_config_defaults_validate() {
        assert!(GameConfig::default().validate().is_ok());
        assert!(RewardConfig::default().validate().is_ok());
    }

    #[test]
    fn test_game_config_rejects_bad_probability() {
        let cfg = GameConfig {
            draw_probability: 1.5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_game_config_rejects_over_advancement() {
        let cfg = GameConfig {
            group_size: 4,
            advance_per_group: 5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_game_config_missing_fields_fall_back_to_defaults() {
        let cfg: GameConfig = serde_json::from_str(r#"{"draw_probability": 0.0}"#).unwrap();
        assert_eq!(cfg.point_table, PointTable::default());
        assert_eq!(cfg.draw_probability, 0.0);
        assert_eq!(cfg.group_size, 4);
    }

    #[test]
    fn test_tier_for_rank() {
        let cfg = RewardConfig::default();
        assert_eq!(cfg.tier_for_rank(1), cfg.tiers.first);
        assert_eq!(cfg.tier_for_rank(2), cfg.tiers.second);
        assert_eq!(cfg.tier_for_rank(3), cfg.tiers.third);
        assert_eq!(cfg.tier_for_rank(4), cfg.tiers.participation);
        assert_eq!(cfg.tier_for_rank(20), cfg.tiers.participation);
    }

    #[test]
    fn test_placement_curve_endpoints() {
        let curve = PlacementCurve::default();
        assert_eq!(curve.factor(1, 8), 1.0);
        assert_eq!(curve.factor(8, 8), -1.0);
        // Midpoint of a 3-player field is neutral
        assert!(curve.factor(2, 3).abs() < 1e-9);
        // Single-player field takes the top factor
        assert_eq!(curve.factor(1, 1), 1.0);
    }

    #[test]
    fn test_placement_curve_monotonic() {
        let curve = PlacementCurve::default();
        for rank in 1..8 {
            assert!(curve.factor(rank, 8) > curve.factor(rank + 1, 8));
        }
    }

    #[test]
    fn test_skill_bounds_clamp() {
        let bounds = SkillBounds::default();
        assert_eq!(bounds.clamp(5.0), 10.0);
        assert_eq!(bounds.clamp(150.0), 100.0);
        assert_eq!(bounds.clamp(42.0), 42.0);
    }

    #[test]
    fn test_reward_config_rejects_inverted_bounds() {
        let cfg = RewardConfig {
            bounds: SkillBounds {
                min_level: 100.0,
                max_level: 10.0,
                default_level: 50.0,
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
