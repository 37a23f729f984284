//! Tournament concurrency and scheduling engine.
//!
//! A transactional backend for campus tournaments: lifecycle state machine,
//! credit ledger, concurrency-safe enrollment, format-aware session
//! generation, results finalization and reward distribution. All shared
//! mutable state lives in PostgreSQL; managers are cheap `Arc<PgPool>`
//! handles that serialize conflicting writers through row locks and atomic
//! conditional updates.
//!
//! # Example
//!
//! ```no_run
//! use tourney_engine::db::{Database, DatabaseConfig};
//! use tourney_engine::enrollment::EnrollmentCoordinator;
//! use tourney_engine::ledger::CreditLedger;
//! use tourney_engine::tournament::LifecycleManager;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(&DatabaseConfig::from_env()).await?;
//! tourney_engine::db::ensure_schema(db.pool()).await?;
//!
//! let pool = Arc::new(db.pool().clone());
//! let lifecycle = LifecycleManager::new(pool.clone());
//! let ledger = CreditLedger::new(pool.clone());
//! let enrollment = EnrollmentCoordinator::new(pool, ledger.clone());
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod db;
pub mod enrollment;
pub mod ledger;
pub mod results;
pub mod rewards;
pub mod schedule;
pub mod simulation;
pub mod tournament;
