//! Credit ledger module.
//!
//! This module implements:
//! - Append-only ledger entries with causal references (enrollment, reward)
//! - Atomic conditional debits (`balance >= cost` checked in the same statement)
//! - Additive credits with overflow protection
//! - Transaction-composable mutations so callers keep one unit of work
//!
//! ## Example
//!
//! ```no_run
//! use tourney_engine::ledger::CreditLedger;
//! use tourney_engine::db::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let ledger = CreditLedger::new(Arc::new(db.pool().clone()));
//!
//!     let account = ledger.open_account(1, 500).await?;
//!     println!("Opened account with balance {}", account.balance);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{LedgerError, LedgerResult};
pub use manager::CreditLedger;
pub use models::{CreditAccount, EnrollmentId, EntryRefs, EntryType, LedgerEntry};
