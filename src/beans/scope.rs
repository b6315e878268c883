//! The bean model collaborator and scope queries over it.

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

use super::model::{Bean, BeansConfig, ConfigSet};
use super::reader::read_beans_config;
use crate::base::{ArtifactId, ProjectId};
use crate::error::ExtractError;

/// Access to beans configurations, supplied by the host.
pub trait BeansModel: Send + Sync {
    fn config(&self, artifact: &ArtifactId) -> Option<Arc<BeansConfig>>;

    /// All configs of a project.
    fn configs(&self, project: &ProjectId) -> Vec<Arc<BeansConfig>>;

    fn config_sets(&self, project: &ProjectId) -> Vec<Arc<ConfigSet>>;

    /// Config sets that contain `artifact`.
    fn config_sets_containing(&self, config: &BeansConfig) -> Vec<Arc<ConfigSet>> {
        self.config_sets(&config.project)
            .into_iter()
            .filter(|set| set.contains(&config.artifact))
            .collect()
    }

    /// Configs importing `config` directly.
    fn importers(&self, config: &BeansConfig) -> Vec<Arc<BeansConfig>> {
        self.configs(&config.project)
            .into_iter()
            .filter(|other| other.imports.contains(&config.artifact))
            .collect()
    }
}

/// Every config importing `config`, directly or through other imports,
/// nearest first. `config` itself is never included.
pub fn importing_configs(model: &dyn BeansModel, config: &Arc<BeansConfig>) -> Vec<Arc<BeansConfig>> {
    let mut seen = IndexSet::new();
    seen.insert(config.artifact.clone());
    let mut out = Vec::new();
    let mut queue = VecDeque::from([config.clone()]);
    while let Some(current) = queue.pop_front() {
        for importer in model.importers(&current) {
            if seen.insert(importer.artifact.clone()) {
                out.push(importer.clone());
                queue.push_back(importer);
            }
        }
    }
    out
}

/// `config` followed by every config it imports, transitively.
pub fn with_imports(model: &dyn BeansModel, config: Arc<BeansConfig>) -> Vec<Arc<BeansConfig>> {
    let mut seen = IndexSet::new();
    let mut out = Vec::new();
    let mut stack = vec![config];
    while let Some(current) = stack.pop() {
        if !seen.insert(current.artifact.clone()) {
            continue;
        }
        for import in current.imports.iter().rev() {
            if let Some(imported) = model.config(import) {
                stack.push(imported);
            }
        }
        out.push(current);
    }
    out
}

/// Candidate beans visible in the scope of `config`: beans of the config and
/// its imports plus non-infrastructure beans registered by components.
/// Inner beans are not flattened here.
pub fn scope_beans(model: &dyn BeansModel, config: Arc<BeansConfig>) -> Vec<Arc<Bean>> {
    let mut beans = Vec::new();
    for config in with_imports(model, config) {
        beans.extend(config.beans.iter().cloned());
        for component in &config.components {
            beans.extend(
                component
                    .beans
                    .iter()
                    .filter(|b| !b.is_infrastructure)
                    .cloned(),
            );
        }
    }
    beans
}

/// Every other config sharing a config set with `config`, in set order.
pub fn config_set_siblings(model: &dyn BeansModel, config: &BeansConfig) -> IndexSet<ArtifactId> {
    model
        .config_sets_containing(config)
        .iter()
        .flat_map(|set| set.configs.iter())
        .filter(|artifact| **artifact != config.artifact)
        .cloned()
        .collect()
}

/// An in-memory [`BeansModel`].
///
/// Configs can be replaced between builds, e.g. after their source changed.
#[derive(Default)]
pub struct StaticBeansModel {
    configs: RwLock<IndexMap<ArtifactId, Arc<BeansConfig>>>,
    config_sets: RwLock<Vec<Arc<ConfigSet>>>,
}

impl StaticBeansModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(self, config: BeansConfig) -> Self {
        self.set_config(config);
        self
    }

    /// Read an XML config and add it.
    pub fn with_xml_config(
        self,
        artifact: impl Into<ArtifactId>,
        project: impl Into<ProjectId>,
        source: &str,
    ) -> Result<Self, ExtractError> {
        let config = read_beans_config(artifact, project, source)?;
        Ok(self.with_config(config))
    }

    pub fn with_config_set(self, set: ConfigSet) -> Self {
        self.config_sets.write().push(Arc::new(set));
        self
    }

    /// Add or replace a config.
    pub fn set_config(&self, config: BeansConfig) {
        self.configs
            .write()
            .insert(config.artifact.clone(), Arc::new(config));
    }

    pub fn remove_config(&self, artifact: &ArtifactId) -> Option<Arc<BeansConfig>> {
        self.configs.write().shift_remove(artifact)
    }
}

impl BeansModel for StaticBeansModel {
    fn config(&self, artifact: &ArtifactId) -> Option<Arc<BeansConfig>> {
        self.configs.read().get(artifact).cloned()
    }

    fn configs(&self, project: &ProjectId) -> Vec<Arc<BeansConfig>> {
        self.configs
            .read()
            .values()
            .filter(|c| c.project == *project)
            .cloned()
            .collect()
    }

    fn config_sets(&self, project: &ProjectId) -> Vec<Arc<ConfigSet>> {
        self.config_sets
            .read()
            .iter()
            .filter(|s| s.project == *project)
            .cloned()
            .collect()
    }
}
