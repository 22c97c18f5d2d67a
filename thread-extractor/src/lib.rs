//! Turns discussion threads into ordered canonical records.
//!
//! Pipeline per thread: fetch the post and first comment page, expand every
//! continuation placeholder ([`resolver`]), linearize parents before replies
//! ([`flatten`]), map each node to a [`CanonicalRecord`](harvest_core::CanonicalRecord)
//! ([`normalize`]). [`orchestrator`] runs that over many threads and keeps a
//! [`FailureReport`] of what went wrong where.

pub mod flatten;
pub mod normalize;
pub mod orchestrator;
pub mod report;
pub mod resolver;

pub use flatten::flatten;
pub use normalize::{normalize_comment, normalize_post};
pub use orchestrator::{BatchError, BatchOptions, BatchOrchestrator, ThreadRecords};
pub use report::{BatchOutcome, FailureReport, SkippedRecord, ThreadFailure};
pub use resolver::{MaterializedComment, MaterializedTree, TreeResolver};
