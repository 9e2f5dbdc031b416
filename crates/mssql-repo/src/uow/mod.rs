//! The change-tracked unit of work: record states, the tracker state
//! machine, and the transactional commit coordinator.

pub mod state;
pub mod tracker;
pub mod unit_of_work;

pub use state::RecordState;
pub use tracker::{ChangeTracker, PendingChange, TrackerOptions};
pub use unit_of_work::{CommitLock, NoLock, UnitOfWork};
