//! Enrollment module: race-free admission against capacity and the ledger.
//!
//! ## Example
//!
//! ```no_run
//! use tourney_engine::enrollment::EnrollmentCoordinator;
//! use tourney_engine::ledger::CreditLedger;
//! use tourney_engine::db::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let pool = Arc::new(db.pool().clone());
//!     let coordinator = EnrollmentCoordinator::new(pool.clone(), CreditLedger::new(pool));
//!
//!     let enrollment = coordinator.enroll(1, 42).await?;
//!     println!("Enrolled as {}", enrollment.id);
//!     Ok(())
//! }
//! ```

pub mod coordinator;
pub mod errors;
pub mod models;

pub use coordinator::EnrollmentCoordinator;
pub use errors::{EnrollmentError, EnrollmentResult};
pub use models::{Enrollment, EnrollmentStatus};
