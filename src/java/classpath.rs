//! In-memory class path.
//!
//! Hosts that already hold a structural model of the project's classes can
//! serve them through [`StaticClassPath`]; it is also what the tests use.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::OBJECT;
use super::loader::{ClassLoaderFactory, LoaderId, ProjectClassLoader};
use super::metadata::ClassMetadata;
use super::model::JavaClass;
use crate::base::ProjectId;
use crate::error::MatchError;

/// A class loader over a fixed set of classes.
///
/// `java.lang.Object` is always present.
#[derive(Debug)]
pub struct StaticClassPath {
    id: LoaderId,
    classes: FxHashMap<SmolStr, Arc<JavaClass>>,
    activations: AtomicUsize,
}

impl Default for StaticClassPath {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticClassPath {
    pub fn new() -> Self {
        let mut classes = FxHashMap::default();
        classes.insert(SmolStr::new_static(OBJECT), Arc::new(JavaClass::new(OBJECT)));
        Self {
            id: LoaderId::next(),
            classes,
            activations: AtomicUsize::new(0),
        }
    }

    pub fn with_class(mut self, class: JavaClass) -> Self {
        self.add_class(class);
        self
    }

    pub fn add_class(&mut self, class: JavaClass) {
        self.classes.insert(class.name.clone(), Arc::new(class));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// How many callbacks ran under this loader.
    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::Relaxed)
    }

    fn lookup(&self, name: &str) -> Result<&Arc<JavaClass>, MatchError> {
        self.classes
            .get(name)
            .ok_or_else(|| MatchError::class_not_found(name))
    }
}

impl ProjectClassLoader for StaticClassPath {
    fn id(&self) -> LoaderId {
        self.id
    }

    /// Linking fails when a direct supertype is missing, as it would for a
    /// real class loader.
    fn load_class(&self, name: &str) -> Result<Arc<JavaClass>, MatchError> {
        let class = self.lookup(name)?;
        for supertype in class.superclass.iter().chain(class.interfaces.iter()) {
            self.lookup(supertype)?;
        }
        Ok(class.clone())
    }

    fn read_class(&self, name: &str) -> Result<Option<ClassMetadata>, MatchError> {
        Ok(self.classes.get(name).map(|c| ClassMetadata::from(c.as_ref())))
    }

    fn activate(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }
}

/// Hands out a fixed loader per project.
#[derive(Default)]
pub struct StaticLoaderFactory {
    loaders: FxHashMap<ProjectId, Arc<dyn ProjectClassLoader>>,
}

impl StaticLoaderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(
        mut self,
        project: impl Into<ProjectId>,
        loader: Arc<dyn ProjectClassLoader>,
    ) -> Self {
        self.loaders.insert(project.into(), loader);
        self
    }

    /// Replace the loader of a project, e.g. after its class path changed.
    pub fn set_loader(&mut self, project: impl Into<ProjectId>, loader: Arc<dyn ProjectClassLoader>) {
        self.loaders.insert(project.into(), loader);
    }
}

impl ClassLoaderFactory for StaticLoaderFactory {
    fn class_loader(&self, project: &ProjectId) -> Option<Arc<dyn ProjectClassLoader>> {
        self.loaders.get(project).cloned()
    }
}
