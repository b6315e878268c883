//! Aspect definition extraction.
//!
//! Every [`AspectDefinitionExtractor`] turns one configuration artifact into
//! zero or more [`AspectDefinition`]s. The [`ExtractorRegistry`] runs all
//! registered extractors over an artifact and merges their output; a failing
//! extractor is logged and contributes nothing.
//!
//! ```text
//! BeansConfig ─┬─ XmlAspectExtractor         (<aop:config>)
//!              ├─ AnnotationAspectExtractor  (@Aspect beans, autoproxy scope)
//!              └─ TransactionalExtractor     (<tx:annotation-driven/>)
//! ```

mod annotation;
mod autoproxy;
mod transaction;
mod xml;

pub use annotation::{
    ADVICE_ANNOTATIONS, AJC_MAGIC, ASPECT_ANNOTATION, AnnotationAspectExtractor,
    DECLARE_PARENTS_ANNOTATION, validate_aspect,
};
pub use autoproxy::{AutoproxyConfig, autoproxy_config};
pub use transaction::{
    TRANSACTION_INTERCEPTOR, TRANSACTIONAL_ANNOTATION, TRANSACTIONAL_POINTCUT,
    TransactionalExtractor,
};
pub use xml::{ADVISOR_INTERFACES, XmlAspectExtractor};

use indexmap::IndexSet;
use smol_str::SmolStr;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::beans::{BeansConfig, BeansModel, config_set_siblings, importing_configs, with_imports};
use crate::config::BuildConfig;
use crate::error::ExtractError;
use crate::java::ClassLoaderSupport;
use crate::model::AspectDefinition;

/// Everything an extractor may consult for one artifact.
pub struct ExtractionContext<'a> {
    pub config: Arc<BeansConfig>,
    pub beans: &'a dyn BeansModel,
    pub classes: &'a ClassLoaderSupport,
    pub settings: &'a BuildConfig,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(
        config: Arc<BeansConfig>,
        beans: &'a dyn BeansModel,
        classes: &'a ClassLoaderSupport,
        settings: &'a BuildConfig,
    ) -> Self {
        Self {
            config,
            beans,
            classes,
            settings,
        }
    }

    /// Configs in the scope of the artifact: the artifact, every config
    /// importing it, everything those configs import, and its config set
    /// siblings.
    pub fn scope_configs(&self) -> Vec<Arc<BeansConfig>> {
        let mut seen = IndexSet::new();
        let mut out = Vec::new();
        let local = std::iter::once(self.config.clone())
            .chain(importing_configs(self.beans, &self.config))
            .flat_map(|config| with_imports(self.beans, config));
        let siblings = config_set_siblings(self.beans, &self.config)
            .into_iter()
            .filter_map(|artifact| self.beans.config(&artifact));
        for config in local.chain(siblings) {
            if seen.insert(config.artifact.clone()) {
                out.push(config);
            }
        }
        out
    }

    /// Class of the bean named `name`, looked up through the artifact's scope.
    pub fn bean_class(&self, name: &str) -> Option<SmolStr> {
        self.scope_configs().iter().find_map(|config| {
            let bean = config.bean(name)?;
            config.bean_class(bean)
        })
    }
}

/// Extracts aspect definitions from one artifact.
pub trait AspectDefinitionExtractor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this extractor runs under `settings`.
    fn enabled(&self, _settings: &BuildConfig) -> bool {
        true
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Vec<AspectDefinition>, ExtractError>;
}

/// The set of extractors run for every artifact.
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn AspectDefinitionExtractor>>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ExtractorRegistry {
    /// A registry without extractors.
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// XML, annotation and transactional extraction.
    pub fn with_defaults() -> Self {
        Self::empty()
            .with(XmlAspectExtractor)
            .with(AnnotationAspectExtractor)
            .with(TransactionalExtractor)
    }

    pub fn with(mut self, extractor: impl AspectDefinitionExtractor + 'static) -> Self {
        self.register(Arc::new(extractor));
        self
    }

    /// Add an externally contributed extractor.
    pub fn register(&mut self, extractor: Arc<dyn AspectDefinitionExtractor>) {
        self.extractors.push(extractor);
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Run every enabled extractor, deduplicating equal definitions.
    pub fn extract_all(&self, ctx: &ExtractionContext<'_>) -> Vec<Arc<AspectDefinition>> {
        let mut definitions: IndexSet<AspectDefinition> = IndexSet::new();
        for extractor in &self.extractors {
            if !extractor.enabled(ctx.settings) {
                continue;
            }
            match extractor.extract(ctx) {
                Ok(found) => {
                    for definition in found {
                        trace!(
                            extractor = extractor.name(),
                            artifact = %ctx.config.artifact,
                            "extracted {}",
                            definition.describe()
                        );
                        definitions.insert(definition);
                    }
                }
                Err(err) => {
                    warn!(
                        extractor = extractor.name(),
                        artifact = %ctx.config.artifact,
                        "aspect extraction failed: {err}"
                    );
                }
            }
        }
        definitions.into_iter().map(Arc::new).collect()
    }
}
