//! Collaborators of the scheduler and the caches of a single build.

use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::base::{ArtifactId, ProjectId};
use crate::beans::{BeansConfig, BeansModel};
use crate::config::BuildConfig;
use crate::diagnostics::{Failure, MarkerPublisher, MarkerSink};
use crate::extract::{ExtractionContext, ExtractorRegistry};
use crate::java::{ClassLoaderFactory, ClassLoaderSupport, ProjectClassLoader};
use crate::matcher::AspectDefinitionMatcher;
use crate::model::{AopReference, AspectDefinition, ReferenceModel};

/// Everything a build reads from or writes to.
pub struct BuildServices {
    pub beans: Arc<dyn BeansModel>,
    pub loaders: Arc<dyn ClassLoaderFactory>,
    pub model: Arc<ReferenceModel>,
    pub extractors: Arc<ExtractorRegistry>,
    pub publisher: Arc<MarkerPublisher>,
    pub settings: BuildConfig,
}

impl BuildServices {
    /// Services with an empty reference model, the default extractors and
    /// default settings.
    pub fn new(
        beans: Arc<dyn BeansModel>,
        loaders: Arc<dyn ClassLoaderFactory>,
        sink: Arc<dyn MarkerSink>,
    ) -> Self {
        Self {
            beans,
            loaders,
            model: Arc::new(ReferenceModel::new()),
            extractors: Arc::new(ExtractorRegistry::with_defaults()),
            publisher: Arc::new(MarkerPublisher::new(sink)),
            settings: BuildConfig::default(),
        }
    }

    pub fn with_model(mut self, model: Arc<ReferenceModel>) -> Self {
        self.model = model;
        self
    }

    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = Arc::new(extractors);
        self
    }

    pub fn with_settings(mut self, settings: BuildConfig) -> Self {
        self.settings = settings;
        self
    }
}

impl std::fmt::Debug for BuildServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildServices")
            .field("extractors", &self.extractors.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// State owned by one build task for its whole lifetime.
///
/// Extraction results and class loaders are never shared between builds.
pub struct BuildContext<'a> {
    pub services: &'a BuildServices,
    pub matcher: AspectDefinitionMatcher,
    pub failures: Vec<Failure>,
    /// References derived so far by this build.
    pub produced: Vec<AopReference>,
    pub processed: usize,
    cancel: CancellationToken,
    definitions: FxHashMap<ArtifactId, Vec<Arc<AspectDefinition>>>,
    class_loaders: FxHashMap<ProjectId, Option<Arc<ClassLoaderSupport>>>,
}

impl<'a> BuildContext<'a> {
    pub fn new(services: &'a BuildServices, cancel: CancellationToken) -> Self {
        Self {
            services,
            matcher: AspectDefinitionMatcher::new(),
            failures: Vec::new(),
            produced: Vec::new(),
            processed: 0,
            cancel,
            definitions: FxHashMap::default(),
            class_loaders: FxHashMap::default(),
        }
    }

    pub fn settings(&self) -> &BuildConfig {
        &self.services.settings
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The project's class loader, created on first use in this build.
    pub fn class_loader(&mut self, project: &ProjectId) -> Option<Arc<ClassLoaderSupport>> {
        let services = self.services;
        let matcher = &self.matcher;
        self.class_loaders
            .entry(project.clone())
            .or_insert_with(|| {
                let Some(loader) = services.loaders.class_loader(project) else {
                    debug!("[AOP_MODEL] no class loader for project {project}");
                    return None;
                };
                matcher.track_loader(loader.id());
                Some(Arc::new(ClassLoaderSupport::new(project.clone(), loader)))
            })
            .clone()
    }

    /// Definitions of `config`, extracted once per build.
    pub fn definitions(
        &mut self,
        config: &Arc<BeansConfig>,
        classes: &ClassLoaderSupport,
    ) -> Vec<Arc<AspectDefinition>> {
        if let Some(cached) = self.definitions.get(&config.artifact) {
            return cached.clone();
        }
        let services = self.services;
        let ctx = ExtractionContext::new(config.clone(), services.beans.as_ref(), classes, &services.settings);
        let definitions = services.extractors.extract_all(&ctx);
        self.definitions
            .insert(config.artifact.clone(), definitions.clone());
        definitions
    }

    /// Number of artifacts whose definitions are cached.
    pub fn cached_definitions(&self) -> usize {
        self.definitions.len()
    }

    /// Release the matcher's caches and the type world of every class loader
    /// this build created.
    pub fn close(&self) {
        self.matcher.close();
    }
}
