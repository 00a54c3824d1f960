//! Run orchestration: coordinator, scheduler gate, bookkeeping and
//! cancellation.

mod cancellation;
mod coordinator;
mod scheduler;
mod summary;


pub use cancellation::CancellationToken;
pub use coordinator::{SyncCoordinator, SyncRunError};
pub use scheduler::{SyncScheduler, TriggerOutcome};
pub use summary::{advance_cursor, BuildReport, BuildStats, RunReport, RunSummary};
