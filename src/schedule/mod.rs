//! Session scheduling: format generators, campus slot allocation, result
//! submission and knockout bracket progression.

pub mod campus;
pub mod errors;
pub mod formats;
pub mod generator;
pub mod models;

pub use campus::{CampusAllocator, CampusScheduleConfig, SlotAssignment};
pub use errors::{ScheduleError, ScheduleResult};
pub use generator::{ScheduleRequest, SessionScheduler};
pub use models::{PlannedSession, Session, SessionId, SessionResult, PENDING_SLOT};
