//! A bean model, class path, marker sink and scheduler wired together.

use std::sync::Arc;

use weave::beans::StaticBeansModel;
use weave::build::{BuildOutcome, BuildScheduler, BuildServices};
use weave::diagnostics::{InMemoryMarkerSink, Marker};
use weave::extract::ExtractorRegistry;
use weave::java::{StaticClassPath, StaticLoaderFactory};
use weave::model::{AopReference, ReferenceModel};
use weave::{ArtifactId, BuildConfig};

pub const PROJECT: &str = "shop";

pub struct Workspace {
    pub beans: Arc<StaticBeansModel>,
    pub sink: Arc<InMemoryMarkerSink>,
    pub scheduler: BuildScheduler,
}

impl Workspace {
    /// A workspace over XML `configs` (artifact, source) of one project.
    pub fn new<S: AsRef<str>>(configs: &[(&str, S)], classes: StaticClassPath) -> Self {
        Self::with_settings(configs, classes, BuildConfig::default())
    }

    pub fn with_settings<S: AsRef<str>>(
        configs: &[(&str, S)],
        classes: StaticClassPath,
        settings: BuildConfig,
    ) -> Self {
        Self::with_extractors(configs, classes, settings, ExtractorRegistry::with_defaults())
    }

    /// A workspace running `extractors` instead of the default set.
    pub fn with_extractors<S: AsRef<str>>(
        configs: &[(&str, S)],
        classes: StaticClassPath,
        settings: BuildConfig,
        extractors: ExtractorRegistry,
    ) -> Self {
        let mut beans = StaticBeansModel::new();
        for (artifact, source) in configs {
            beans = beans
                .with_xml_config(*artifact, PROJECT, source.as_ref())
                .unwrap_or_else(|err| panic!("cannot read {artifact}: {err}"));
        }
        Self::from_parts(beans, classes, settings, extractors)
    }

    pub fn from_model(beans: StaticBeansModel, classes: StaticClassPath, settings: BuildConfig) -> Self {
        Self::from_parts(beans, classes, settings, ExtractorRegistry::with_defaults())
    }

    fn from_parts(
        beans: StaticBeansModel,
        classes: StaticClassPath,
        settings: BuildConfig,
        extractors: ExtractorRegistry,
    ) -> Self {
        let beans = Arc::new(beans);
        let sink = Arc::new(InMemoryMarkerSink::new());
        let loaders = StaticLoaderFactory::new().with_project(PROJECT, Arc::new(classes));
        let services = BuildServices::new(beans.clone(), Arc::new(loaders), sink.clone())
            .with_settings(settings)
            .with_extractors(extractors);
        Self {
            beans,
            sink,
            scheduler: BuildScheduler::new(services),
        }
    }

    pub fn build(&self, artifacts: &[&str]) -> BuildOutcome {
        self.scheduler
            .build_now(artifacts.iter().map(|a| ArtifactId::from(*a)))
    }

    /// Replace the source of an XML config.
    pub fn edit(&self, artifact: &str, source: &str) {
        let config = weave::beans::read_beans_config(artifact, PROJECT, source)
            .unwrap_or_else(|err| panic!("cannot read {artifact}: {err}"));
        self.beans.set_config(config);
    }

    pub fn model(&self) -> &ReferenceModel {
        &self.scheduler.services().model
    }

    pub fn references(&self) -> Vec<Arc<AopReference>> {
        self.model().all_references()
    }

    /// `"<source> -> <target>"` for every reference, sorted.
    pub fn weavings(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .references()
            .iter()
            .map(|r| format!("{} -> {}", r.source, r.target))
            .collect();
        out.sort();
        out
    }

    pub fn problems(&self) -> Vec<Marker> {
        self.sink.problems()
    }

    pub fn markers_on(&self, artifact: &str) -> Vec<Marker> {
        self.sink.markers_on(&ArtifactId::from(artifact))
    }
}
