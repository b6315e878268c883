//! Project class loading.
//!
//! Matching needs "real" classes of the target project, which only the host
//! can provide. The host exposes them through [`ProjectClassLoader`];
//! [`ClassLoaderSupport`] wraps one loader for the duration of a build.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::metadata::ClassMetadata;
use super::model::JavaClass;
use crate::base::ProjectId;
use crate::error::MatchError;

/// Identity of a class loader instance.
///
/// Shared caches are keyed partly by loader identity; a project whose class
/// path changed gets a fresh loader and therefore a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoaderId(u64);

static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(1);

impl LoaderId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A class loader scoped to one project's build path.
pub trait ProjectClassLoader: Send + Sync {
    fn id(&self) -> LoaderId;

    /// Resolve a class for matching. Fails with [`MatchError::ClassNotFound`]
    /// when the class, or one of its supertypes, is not on the build path.
    fn load_class(&self, name: &str) -> Result<Arc<JavaClass>, MatchError>;

    /// Read class file information without initializing the class.
    /// `Ok(None)` means no class file exists for `name`.
    fn read_class(&self, name: &str) -> Result<Option<ClassMetadata>, MatchError>;

    /// Called before a callback runs under this loader.
    fn activate(&self) {}

    /// Called after a callback ran under this loader, even when it failed.
    fn deactivate(&self) {}
}

/// Creates class loaders for projects.
pub trait ClassLoaderFactory: Send + Sync {
    /// `None` when the project has no usable build path.
    fn class_loader(&self, project: &ProjectId) -> Option<Arc<dyn ProjectClassLoader>>;
}

struct Activation<'a> {
    loader: &'a dyn ProjectClassLoader,
}

impl<'a> Activation<'a> {
    fn enter(loader: &'a dyn ProjectClassLoader) -> Self {
        loader.activate();
        Self { loader }
    }
}

impl Drop for Activation<'_> {
    fn drop(&mut self) {
        self.loader.deactivate();
    }
}

/// A project loader plus a per-build cache of class file readers.
pub struct ClassLoaderSupport {
    project: ProjectId,
    loader: Arc<dyn ProjectClassLoader>,
    readers: Mutex<FxHashMap<SmolStr, Option<Arc<ClassMetadata>>>>,
}

impl ClassLoaderSupport {
    pub fn new(project: ProjectId, loader: Arc<dyn ProjectClassLoader>) -> Self {
        Self {
            project,
            loader,
            readers: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    pub fn loader(&self) -> &dyn ProjectClassLoader {
        self.loader.as_ref()
    }

    pub fn loader_id(&self) -> LoaderId {
        self.loader.id()
    }

    /// Run `callback` with the project loader activated.
    pub fn execute_callback<R>(&self, callback: impl FnOnce(&dyn ProjectClassLoader) -> R) -> R {
        let _activation = Activation::enter(self.loader.as_ref());
        callback(self.loader.as_ref())
    }

    pub fn load_class(&self, name: &str) -> Result<Arc<JavaClass>, MatchError> {
        self.loader.load_class(name)
    }

    /// Class file information for `name`, read at most once per build.
    pub fn class_metadata(&self, name: &str) -> Result<Option<Arc<ClassMetadata>>, MatchError> {
        if let Some(cached) = self.readers.lock().get(name) {
            return Ok(cached.clone());
        }
        let metadata = self.loader.read_class(name)?.map(Arc::new);
        self.readers
            .lock()
            .insert(SmolStr::new(name), metadata.clone());
        Ok(metadata)
    }

    /// Number of cached class readers.
    pub fn cached_readers(&self) -> usize {
        self.readers.lock().len()
    }
}

impl std::fmt::Debug for ClassLoaderSupport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassLoaderSupport")
            .field("project", &self.project)
            .field("loader", &self.loader.id())
            .finish()
    }
}
