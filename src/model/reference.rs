//! Weaving references and the per-project reference model.
//!
//! A reference is indexed under both the resource declaring its definition and
//! the resource declaring its target bean, so either side can be cleared and
//! rebuilt on its own.

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::trace;

use super::definition::{AdviceKind, AspectDefinition};
use crate::base::{ArtifactId, ProjectId};
use crate::beans::Bean;
use crate::java::{JavaClass, JavaField, JavaMethod, SourceAnchor, simple_name};

/// A class member a reference points from or to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JavaMember {
    Type {
        class: SmolStr,
        anchor: Option<SourceAnchor>,
    },
    Method {
        class: SmolStr,
        name: SmolStr,
        params: Vec<SmolStr>,
        anchor: Option<SourceAnchor>,
    },
    Field {
        class: SmolStr,
        name: SmolStr,
        anchor: Option<SourceAnchor>,
    },
}

impl JavaMember {
    pub fn of_type(class: &JavaClass) -> Self {
        JavaMember::Type {
            class: class.name.clone(),
            anchor: class.anchor.clone(),
        }
    }

    /// A type known only by name.
    pub fn named_type(class: impl Into<SmolStr>) -> Self {
        JavaMember::Type {
            class: class.into(),
            anchor: None,
        }
    }

    pub fn of_method(method: &JavaMethod) -> Self {
        JavaMember::Method {
            class: method.declaring_class.clone(),
            name: method.name.clone(),
            params: method.parameter_types.clone(),
            anchor: method.anchor.clone(),
        }
    }

    pub fn of_field(class: impl Into<SmolStr>, field: &JavaField) -> Self {
        JavaMember::Field {
            class: class.into(),
            name: field.name.clone(),
            anchor: field.anchor.clone(),
        }
    }

    pub fn class_name(&self) -> &str {
        match self {
            JavaMember::Type { class, .. }
            | JavaMember::Method { class, .. }
            | JavaMember::Field { class, .. } => class,
        }
    }

    pub fn anchor(&self) -> Option<&SourceAnchor> {
        match self {
            JavaMember::Type { anchor, .. }
            | JavaMember::Method { anchor, .. }
            | JavaMember::Field { anchor, .. } => anchor.as_ref(),
        }
    }
}

impl fmt::Display for JavaMember {
    /// `Bank`, `Bank.transfer(Account, long)` or `Audit.mixin`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JavaMember::Type { class, .. } => f.write_str(simple_name(class)),
            JavaMember::Method {
                class, name, params, ..
            } => {
                write!(f, "{}.{}(", simple_name(class), name)?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(simple_name(param))?;
                }
                f.write_str(")")
            }
            JavaMember::Field { class, name, .. } => write!(f, "{}.{}", simple_name(class), name),
        }
    }
}

/// One aspect-to-target weaving reference.
#[derive(Debug, Clone)]
pub struct AopReference {
    pub kind: AdviceKind,
    /// Advice method, introduction field or aspect type.
    pub source: JavaMember,
    /// Advised method or introduced-into type.
    pub target: JavaMember,
    pub definition: Arc<AspectDefinition>,
    pub bean: Arc<Bean>,
    /// Resource declaring the target bean.
    pub artifact: ArtifactId,
}

impl AopReference {
    pub fn new(
        definition: Arc<AspectDefinition>,
        source: JavaMember,
        target: JavaMember,
        bean: Arc<Bean>,
    ) -> Self {
        Self {
            kind: definition.kind,
            source,
            target,
            artifact: bean.artifact.clone(),
            definition,
            bean,
        }
    }

    /// Resource declaring the definition.
    pub fn definition_resource(&self) -> &ArtifactId {
        &self.definition.resource
    }

    fn identity(&self) -> (AdviceKind, &JavaMember, &JavaMember, &AspectDefinition, &str, &ArtifactId) {
        (
            self.kind,
            &self.source,
            &self.target,
            &self.definition,
            self.bean.id.as_str(),
            &self.artifact,
        )
    }
}

impl PartialEq for AopReference {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for AopReference {}

impl Hash for AopReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

// ============================================================================
// PROJECT
// ============================================================================

/// References of one project, indexed by resource.
#[derive(Debug, Clone)]
pub struct AopProject {
    project: ProjectId,
    references: IndexMap<ArtifactId, IndexSet<Arc<AopReference>>>,
}

impl AopProject {
    pub fn new(project: ProjectId) -> Self {
        Self {
            project,
            references: IndexMap::new(),
        }
    }

    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    /// Index `reference` under its definition resource and its target resource.
    pub fn add_reference(&mut self, reference: AopReference) {
        let reference = Arc::new(reference);
        trace!(
            "[AOP_MODEL] {} -> {} ({})",
            reference.source, reference.target, reference.kind
        );
        self.references
            .entry(reference.definition_resource().clone())
            .or_default()
            .insert(reference.clone());
        self.references
            .entry(reference.artifact.clone())
            .or_default()
            .insert(reference);
    }

    /// Remove every reference that involves `resource`, on either side.
    pub fn clear_references_for_resource(&mut self, resource: &ArtifactId) {
        let Some(removed) = self.references.shift_remove(resource) else {
            return;
        };
        for entry in self.references.values_mut() {
            entry.retain(|r| !removed.contains(r));
        }
        self.references.retain(|_, entry| !entry.is_empty());
    }

    /// References indexed under `resource`.
    pub fn references_for(&self, resource: &ArtifactId) -> Vec<Arc<AopReference>> {
        self.references
            .get(resource)
            .map(|entry| entry.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every reference once, in insertion order.
    pub fn all_references(&self) -> Vec<Arc<AopReference>> {
        let mut all: IndexSet<Arc<AopReference>> = IndexSet::new();
        for entry in self.references.values() {
            all.extend(entry.iter().cloned());
        }
        all.into_iter().collect()
    }

    /// Resources with at least one reference.
    pub fn resources(&self) -> impl Iterator<Item = &ArtifactId> {
        self.references.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

/// Reference models of all projects.
///
/// Only the build holding the global build lock mutates it; readers may
/// observe the model at any time.
#[derive(Debug, Default)]
pub struct ReferenceModel {
    projects: RwLock<FxHashMap<ProjectId, AopProject>>,
}

impl ReferenceModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one project's references.
    pub fn project(&self, project: &ProjectId) -> Option<AopProject> {
        self.projects.read().get(project).cloned()
    }

    /// References indexed under `resource` in any project.
    pub fn references_for(&self, resource: &ArtifactId) -> Vec<Arc<AopReference>> {
        self.projects
            .read()
            .values()
            .flat_map(|p| p.references_for(resource))
            .collect()
    }

    pub fn all_references(&self) -> Vec<Arc<AopReference>> {
        self.projects
            .read()
            .values()
            .flat_map(|p| p.all_references())
            .collect()
    }

    /// Clear `resource` in every project, e.g. after its config was removed.
    pub fn clear_resource(&self, resource: &ArtifactId) {
        for project in self.projects.write().values_mut() {
            project.clear_references_for_resource(resource);
        }
    }

    /// Run `f` on the project's model, creating it when missing.
    pub fn update<R>(&self, project: &ProjectId, f: impl FnOnce(&mut AopProject) -> R) -> R {
        let mut projects = self.projects.write();
        let entry = projects
            .entry(project.clone())
            .or_insert_with(|| AopProject::new(project.clone()));
        f(entry)
    }
}
