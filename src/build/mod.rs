//! Incremental reference model builds.
//!
//! A build takes a set of changed artifacts, widens it to every artifact whose
//! references depend on them, and rebuilds the reference model for each:
//!
//! ```text
//! schedule(artifacts)
//!   └─▶ affected_artifacts ─▶ BuildTask (Queued)
//!         └─▶ build lock ─▶ process_artifact × N ─▶ ReferenceModel
//!               └─▶ MarkerPublisher (separate thread)
//! ```
//!
//! Only one build runs at a time. A newer build whose scope contains an older
//! pending one cancels it. Cancelled builds publish no markers; references
//! already written for processed artifacts stay in the model.

mod context;
mod process;
mod scheduler;
mod task;

pub use context::{BuildContext, BuildServices};
pub use process::{candidate_beans, process_artifact};
pub use scheduler::{BuildScheduler, BuildSuspension, affected_artifacts};
pub use task::{BuildHandle, BuildOutcome, BuildState};
