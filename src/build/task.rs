//! Build task state machine and the handle returned to callers.
//!
//! ```text
//! Queued ──▶ Running ──▶ Completed
//!    │          │
//!    └──────────┴──▶ Cancelled
//! ```

use indexmap::IndexSet;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::base::ArtifactId;

/// State of a build task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildState {
    Queued,
    Running,
    Cancelled,
    Completed,
}

impl BuildState {
    pub fn is_finished(self) -> bool {
        matches!(self, BuildState::Cancelled | BuildState::Completed)
    }

    fn can_become(self, next: BuildState) -> bool {
        matches!(
            (self, next),
            (BuildState::Queued, BuildState::Running)
                | (BuildState::Queued, BuildState::Cancelled)
                | (BuildState::Running, BuildState::Cancelled)
                | (BuildState::Running, BuildState::Completed)
        )
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildState::Queued => "queued",
            BuildState::Running => "running",
            BuildState::Cancelled => "cancelled",
            BuildState::Completed => "completed",
        })
    }
}

/// What a finished build did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub id: Uuid,
    pub state: BuildState,
    /// Artifacts fully processed before the build ended.
    pub processed: usize,
    /// Classified matching failures.
    pub failures: usize,
    /// Markers written; zero for cancelled builds.
    pub markers: usize,
}

impl BuildOutcome {
    pub(crate) fn cancelled(id: Uuid, processed: usize) -> Self {
        Self {
            id,
            state: BuildState::Cancelled,
            processed,
            failures: 0,
            markers: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == BuildState::Completed
    }
}

struct TaskStatus {
    state: BuildState,
    outcome: Option<BuildOutcome>,
}

/// One submitted build.
pub(crate) struct BuildTask {
    pub(crate) id: Uuid,
    /// Artifacts the caller asked for.
    pub(crate) original: IndexSet<ArtifactId>,
    /// `original` plus the artifacts whose model depends on them.
    pub(crate) scope: IndexSet<ArtifactId>,
    pub(crate) cancel: CancellationToken,
    status: Mutex<TaskStatus>,
    finished: Condvar,
}

impl BuildTask {
    pub(crate) fn new(original: IndexSet<ArtifactId>, scope: IndexSet<ArtifactId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            original,
            scope,
            cancel: CancellationToken::new(),
            status: Mutex::new(TaskStatus {
                state: BuildState::Queued,
                outcome: None,
            }),
            finished: Condvar::new(),
        }
    }

    pub(crate) fn state(&self) -> BuildState {
        self.status.lock().state
    }

    /// Move to `next`; `false` when the transition is not allowed.
    pub(crate) fn transition(&self, next: BuildState) -> bool {
        let mut status = self.status.lock();
        if !status.state.can_become(next) {
            return false;
        }
        status.state = next;
        true
    }

    /// Whether this task's scope lies within `other`'s.
    pub(crate) fn is_subsumed_by(&self, other: &BuildTask) -> bool {
        self.scope.is_subset(&other.scope)
    }

    /// Record the outcome and wake every waiter.
    pub(crate) fn finish(&self, outcome: BuildOutcome) {
        let mut status = self.status.lock();
        if status.state.can_become(outcome.state) {
            status.state = outcome.state;
        }
        status.outcome = Some(outcome);
        self.finished.notify_all();
    }

    pub(crate) fn wait(&self) -> BuildOutcome {
        let mut status = self.status.lock();
        loop {
            if let Some(outcome) = &status.outcome {
                return outcome.clone();
            }
            self.finished.wait(&mut status);
        }
    }
}

impl fmt::Debug for BuildTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildTask")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("scope", &self.scope)
            .finish()
    }
}

/// Caller's view of a scheduled build.
#[derive(Debug, Clone)]
pub struct BuildHandle {
    task: Arc<BuildTask>,
}

impl BuildHandle {
    pub(crate) fn new(task: Arc<BuildTask>) -> Self {
        Self { task }
    }

    pub fn id(&self) -> Uuid {
        self.task.id
    }

    pub fn state(&self) -> BuildState {
        self.task.state()
    }

    /// Artifacts the build covers after scope expansion.
    pub fn scope(&self) -> &IndexSet<ArtifactId> {
        &self.task.scope
    }

    /// Request cancellation. Takes effect before the next artifact.
    pub fn cancel(&self) {
        self.task.cancel.cancel();
    }

    /// Block until the build and its marker publication have finished.
    pub fn wait(&self) -> BuildOutcome {
        self.task.wait()
    }
}
