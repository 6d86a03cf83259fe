//! The migration pipeline
//!
//! [`list_objects`] feeds descriptors lazily into the [`MigrationDriver`],
//! which copies each one through [`copy_one`] until it is copied or its
//! attempt budget is spent, reporting through a [`ProgressReporter`].

pub mod copier;
pub mod driver;
pub mod lister;
pub mod progress;
pub mod retry;
pub mod size;

pub use copier::{copy_one, TransferOutcome, TransferTiming, DESTINATION_ACL};
pub use driver::{MigrationDriver, MigrationSettings, ObjectResult};
pub use lister::{list_objects, survey, ListingSummary};
pub use progress::{ObjectSummary, ProgressReporter, RunSummary, RunTally};
pub use retry::{with_retry, RetryPolicy};
pub use size::format_size;
