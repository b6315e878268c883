//! Scheduling of reference model builds.
//!
//! Builds run one at a time under a global build lock. Each submitted build
//! gets its own worker thread that waits for the lock; marker publication of
//! a completed build runs on a second thread so the next build can start.

use indexmap::IndexSet;
use parking_lot::{Mutex, MutexGuard};
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

use super::context::{BuildContext, BuildServices};
use super::process::process_artifact;
use super::task::{BuildHandle, BuildOutcome, BuildState, BuildTask};
use crate::base::ArtifactId;
use crate::beans::{BeansModel, config_set_siblings, importing_configs};
use crate::diagnostics::Failure;
use crate::model::AopReference;

struct Shared {
    services: BuildServices,
    build_lock: Mutex<()>,
    tasks: Mutex<Vec<Arc<BuildTask>>>,
}

/// Entry point for reference model builds.
#[derive(Clone)]
pub struct BuildScheduler {
    shared: Arc<Shared>,
}

/// Holds off every build until dropped.
pub struct BuildSuspension<'a> {
    _guard: MutexGuard<'a, ()>,
}

/// Everything the marker publication of a completed build needs.
struct Publication {
    touched: IndexSet<ArtifactId>,
    failures: Vec<Failure>,
    references: Vec<Arc<AopReference>>,
    processed: usize,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

fn spawn_named(name: String, job: Job) -> io::Result<()> {
    std::thread::Builder::new().name(name).spawn(job).map(drop)
}

impl BuildScheduler {
    pub fn new(services: BuildServices) -> Self {
        Self {
            shared: Arc::new(Shared {
                services,
                build_lock: Mutex::new(()),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn services(&self) -> &BuildServices {
        &self.shared.services
    }

    /// `artifacts` plus every artifact whose references depend on them: the
    /// config set siblings of each artifact and the configs importing it.
    pub fn affected_artifacts<I>(&self, artifacts: I) -> IndexSet<ArtifactId>
    where
        I: IntoIterator<Item = ArtifactId>,
    {
        affected_artifacts(self.shared.services.beans.as_ref(), artifacts)
    }

    /// Queue a build of `artifacts` and return immediately.
    pub fn schedule<I>(&self, artifacts: I) -> BuildHandle
    where
        I: IntoIterator<Item = ArtifactId>,
    {
        let task = self.shared.register(artifacts);
        let worker = self.shared.clone();
        let spawned_task = task.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("aop-build-{}", task.id))
            .spawn(move || worker.run(&spawned_task, true));
        if let Err(err) = spawned {
            warn!("[AOP_MODEL] cannot start build thread, building inline: {err}");
            self.shared.run(&task, false);
        }
        BuildHandle::new(task)
    }

    /// Build `artifacts` on the calling thread, markers included.
    pub fn build_now<I>(&self, artifacts: I) -> BuildOutcome
    where
        I: IntoIterator<Item = ArtifactId>,
    {
        let task = self.shared.register(artifacts);
        self.shared.run(&task, false);
        task.wait()
    }

    /// Keep builds from starting until the returned guard is dropped.
    ///
    /// Submitted builds stay queued meanwhile.
    pub fn suspend(&self) -> BuildSuspension<'_> {
        BuildSuspension {
            _guard: self.shared.build_lock.lock(),
        }
    }

    /// Builds that are queued or running.
    pub fn pending(&self) -> usize {
        self.shared.tasks.lock().len()
    }
}

impl std::fmt::Debug for BuildScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildScheduler")
            .field("services", &self.shared.services)
            .field("pending", &self.pending())
            .finish()
    }
}

impl Shared {
    fn register<I>(&self, artifacts: I) -> Arc<BuildTask>
    where
        I: IntoIterator<Item = ArtifactId>,
    {
        let original: IndexSet<ArtifactId> = artifacts.into_iter().collect();
        let scope = affected_artifacts(self.services.beans.as_ref(), original.iter().cloned());
        let task = Arc::new(BuildTask::new(original, scope));
        debug!(
            "[AOP_MODEL] build {} queued for {} artifacts ({} requested)",
            task.id,
            task.scope.len(),
            task.original.len()
        );
        let mut tasks = self.tasks.lock();
        supersede(&tasks, &task);
        tasks.push(task.clone());
        task
    }

    fn unregister(&self, task: &BuildTask) {
        self.tasks.lock().retain(|t| t.id != task.id);
    }

    fn run(self: &Arc<Self>, task: &Arc<BuildTask>, publish_in_background: bool) {
        let publication = {
            let _guard = self.build_lock.lock();
            if task.cancel.is_cancelled() || !task.transition(BuildState::Running) {
                Err(0)
            } else {
                supersede(&self.tasks.lock(), task);
                self.build(task)
            }
        };

        let publication = match publication {
            Ok(publication) => publication,
            Err(processed) => {
                debug!("[AOP_MODEL] build {} cancelled", task.id);
                task.transition(BuildState::Cancelled);
                self.unregister(task);
                task.finish(BuildOutcome::cancelled(task.id, processed));
                return;
            }
        };

        if publish_in_background {
            self.hand_off(task, publication, spawn_named);
        } else {
            self.publish(task, publication);
        }
    }

    /// Publish on a thread obtained from `spawn`, or inline when no thread
    /// can be started.
    fn hand_off<F>(self: &Arc<Self>, task: &Arc<BuildTask>, publication: Publication, spawn: F)
    where
        F: FnOnce(String, Job) -> io::Result<()>,
    {
        let pending = Arc::new(Mutex::new(Some(publication)));
        let publisher = self.clone();
        let published_task = task.clone();
        let handed_over = pending.clone();
        let job: Job = Box::new(move || {
            let publication = handed_over.lock().take();
            if let Some(publication) = publication {
                publisher.publish(&published_task, publication);
            }
        });
        if let Err(err) = spawn(format!("aop-markers-{}", task.id), job) {
            warn!("[AOP_MODEL] cannot start marker thread for build {}, publishing inline: {err}", task.id);
            let publication = pending.lock().take();
            if let Some(publication) = publication {
                self.publish(task, publication);
            }
        }
    }

    /// Process every artifact of `task`. On cancellation, the number of
    /// artifacts processed before it.
    fn build(&self, task: &BuildTask) -> Result<Publication, usize> {
        let started = Instant::now();
        let mut ctx = BuildContext::new(&self.services, task.cancel.clone());
        let mut cancelled = false;
        for artifact in &task.scope {
            if ctx.is_cancelled() {
                cancelled = true;
                break;
            }
            trace!("[AOP_MODEL] build {} processing {artifact}", task.id);
            if !process_artifact(&mut ctx, artifact) {
                cancelled = true;
                break;
            }
            ctx.processed += 1;
        }
        ctx.close();

        if cancelled {
            debug!(
                "[AOP_MODEL] build {} stopped after {} of {} artifacts",
                task.id,
                ctx.processed,
                task.scope.len()
            );
            return Err(ctx.processed);
        }

        task.transition(BuildState::Completed);
        let mut references: IndexSet<Arc<AopReference>> = IndexSet::new();
        for artifact in &task.scope {
            references.extend(self.services.model.references_for(artifact));
        }
        debug!(
            "[AOP_MODEL] build {} finished {} artifacts in {:?}",
            task.id,
            ctx.processed,
            started.elapsed()
        );
        Ok(Publication {
            touched: task.scope.clone(),
            failures: std::mem::take(&mut ctx.failures),
            references: references.into_iter().collect(),
            processed: ctx.processed,
        })
    }

    fn publish(&self, task: &BuildTask, publication: Publication) {
        let markers = self.services.publisher.publish(
            &publication.touched,
            &publication.failures,
            &publication.references,
            &self.services.settings,
        );
        self.unregister(task);
        task.finish(BuildOutcome {
            id: task.id,
            state: BuildState::Completed,
            processed: publication.processed,
            failures: publication.failures.len(),
            markers,
        });
    }
}

/// Cancel every other queued or running task whose scope lies within `task`'s.
fn supersede(tasks: &[Arc<BuildTask>], task: &BuildTask) {
    for other in tasks {
        if other.id == task.id || other.state().is_finished() {
            continue;
        }
        if other.is_subsumed_by(task) && !other.cancel.is_cancelled() {
            debug!("[AOP_MODEL] build {} superseded by {}", other.id, task.id);
            other.cancel.cancel();
        }
    }
}

/// `artifacts` followed by their config set siblings and every config
/// importing them, directly or transitively.
pub fn affected_artifacts<I>(model: &dyn BeansModel, artifacts: I) -> IndexSet<ArtifactId>
where
    I: IntoIterator<Item = ArtifactId>,
{
    let original: Vec<ArtifactId> = artifacts.into_iter().collect();
    let mut affected: IndexSet<ArtifactId> = original.iter().cloned().collect();
    for artifact in &original {
        let Some(config) = model.config(artifact) else {
            continue;
        };
        affected.extend(config_set_siblings(model, &config));
        affected.extend(
            importing_configs(model, &config)
                .into_iter()
                .map(|importer| importer.artifact.clone()),
        );
    }
    affected
}
