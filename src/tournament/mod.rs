//! Tournament module: the lifecycle state machine and its data model.
//!
//! A tournament moves `Draft -> EnrollmentOpen -> InProgress -> Completed`
//! against a fixed adjacency table, with reward distribution gated by a
//! one-time flag on the row. Every transition is applied over a locked row so
//! the transition and the side-state it gates commit atomically.
//!
//! ## Example
//!
//! ```no_run
//! use tourney_engine::tournament::{LifecycleManager, NewTournament};
//! use tourney_engine::tournament::models::{Actor, ActorRole, GameConfig, RewardConfig, TournamentFormat};
//! use tourney_engine::db::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let lifecycle = LifecycleManager::new(Arc::new(db.pool().clone()));
//!
//!     let admin = Actor { user_id: 1, role: ActorRole::Admin };
//!     let id = lifecycle
//!         .create(
//!             NewTournament {
//!                 name: "Spring League".to_string(),
//!                 format: TournamentFormat::HeadToHead,
//!                 max_players: 8,
//!                 enrollment_cost: 50,
//!                 campus_ids: vec![1, 2],
//!                 number_of_rounds: None,
//!                 game_config: GameConfig::default(),
//!                 reward_config: RewardConfig::default(),
//!             },
//!             admin,
//!         )
//!         .await?;
//!     lifecycle.open_enrollment(id, admin).await?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod lifecycle;
pub mod models;

pub use errors::{TournamentError, TournamentResult};
pub use lifecycle::LifecycleManager;
pub use models::{
    Actor, ActorRole, CampusId, GameConfig, NewTournament, PointTable, RewardConfig, Tournament,
    TournamentFormat, TournamentId, TournamentStatus, UserId,
};
