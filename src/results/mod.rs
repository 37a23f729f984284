//! Standings aggregation and ranking finalization.

pub mod errors;
pub mod finalizer;
pub mod models;
pub mod standings;

pub use errors::{ResultsError, ResultsResult};
pub use finalizer::ResultsFinalizer;
pub use models::RankingEntry;
pub use standings::{placement_standings, standings, MatchOutcome, PlacementStanding, Standing};
