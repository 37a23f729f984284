//! Reward distribution: placement-tier payouts, XP grants and
//! placement-curve skill updates.

pub mod distributor;
pub mod errors;
pub mod models;

pub use distributor::RewardDistributor;
pub use errors::{RewardError, RewardResult};
pub use models::{DistributionRecord, DistributionSummary, SkillRating};
