//! Getting records from a form or an upload into the store.

pub mod bulk;
pub mod staged;

pub use bulk::{BulkCommitCoordinator, BulkCommitReport};
pub use staged::{PendingSubmission, Validate};
