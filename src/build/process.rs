//! Processing of one artifact inside a build.

use indexmap::IndexSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use super::context::BuildContext;
use crate::base::{ArtifactId, ProjectId};
use crate::beans::{Bean, BeansConfig, BeansModel, config_set_siblings, with_imports};
use crate::diagnostics::Failure;
use crate::model::AopReference;

/// Rebuild the references of `artifact`.
///
/// Returns `false` when the build was cancelled part way through the
/// artifact.
pub fn process_artifact(ctx: &mut BuildContext<'_>, artifact: &ArtifactId) -> bool {
    let services = ctx.services;
    let Some(config) = services.beans.config(artifact) else {
        debug!("[AOP_MODEL] {artifact} is no beans config, clearing its references");
        services.model.clear_resource(artifact);
        return true;
    };
    let started = Instant::now();
    reset_artifact(ctx, &config.project, artifact);

    let Some(classes) = ctx.class_loader(&config.project) else {
        return true;
    };
    let definitions = ctx.definitions(&config, &classes);
    let candidates = candidate_beans(services.beans.as_ref(), &config);
    trace!(
        "[AOP_MODEL] {artifact}: {} definitions, {} candidate beans",
        definitions.len(),
        candidates.len()
    );

    let mut references = Vec::new();
    for definition in &definitions {
        if ctx.settings().cancellation_check_per_definition && ctx.is_cancelled() {
            return false;
        }
        for (owner, bean) in &candidates {
            let Some(class_name) = owner.bean_class(bean) else {
                continue;
            };
            match ctx.matcher.matches(&classes, definition, bean, &class_name) {
                Ok(Some(weaving)) => {
                    for target in weaving.targets {
                        references.push(AopReference::new(
                            definition.clone(),
                            weaving.source.clone(),
                            target,
                            bean.clone(),
                        ));
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    trace!(
                        "[AOP_MODEL] {} against bean '{}' failed: {error}",
                        definition.describe(),
                        bean.id
                    );
                    ctx.failures.push(Failure::new(
                        error,
                        definition.clone(),
                        bean.clone(),
                        artifact.clone(),
                    ));
                }
            }
        }
    }

    services.model.update(&config.project, |project| {
        for reference in &references {
            project.add_reference(reference.clone());
        }
    });
    debug!(
        "[AOP_MODEL] {artifact}: {} references in {:?}",
        references.len(),
        started.elapsed()
    );
    ctx.produced.extend(references);
    true
}

/// Clear the model for `artifact`, keeping what this build already derived.
fn reset_artifact(ctx: &BuildContext<'_>, project: &ProjectId, artifact: &ArtifactId) {
    ctx.services.model.update(project, |model| {
        model.clear_references_for_resource(artifact);
        for reference in ctx
            .produced
            .iter()
            .filter(|r| r.definition.resource == *artifact || r.artifact == *artifact)
        {
            model.add_reference(reference.clone());
        }
    });
}

/// Beans a definition of `config` may advise, each with the config declaring
/// it: the config and its imports, then every config set sibling.
pub fn candidate_beans(
    model: &dyn BeansModel,
    config: &Arc<BeansConfig>,
) -> Vec<(Arc<BeansConfig>, Arc<Bean>)> {
    let mut configs: Vec<Arc<BeansConfig>> = Vec::new();
    let mut seen = IndexSet::new();
    let siblings = config_set_siblings(model, config)
        .into_iter()
        .filter_map(|artifact| model.config(&artifact));
    for root in std::iter::once(config.clone()).chain(siblings) {
        for scoped in with_imports(model, root) {
            if seen.insert(scoped.artifact.clone()) {
                configs.push(scoped);
            }
        }
    }

    let mut out = Vec::new();
    for owner in configs {
        for bean in owner.all_beans() {
            if bean.is_infrastructure {
                continue;
            }
            out.push((owner.clone(), bean));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::{Component, ConfigSet, StaticBeansModel};

    #[test]
    fn test_candidates_cover_imports_siblings_and_inner_beans() {
        let model = StaticBeansModel::new()
            .with_config(
                BeansConfig::new("a.xml", "app")
                    .with_bean(Bean::new("outer", "com.acme.Outer").with_inner_bean(Bean::new("inner", "com.acme.Inner")))
                    .with_import("b.xml"),
            )
            .with_config(BeansConfig::new("b.xml", "app").with_bean(Bean::new("imported", "com.acme.Imported")))
            .with_config(
                BeansConfig::new("c.xml", "app")
                    .with_bean(Bean::new("sibling", "com.acme.Sibling"))
                    .with_component(
                        Component::new("annotation-config")
                            .with_bean(Bean::new("processor", "com.acme.Processor").infrastructure()),
                    ),
            )
            .with_config(BeansConfig::new("d.xml", "app").with_bean(Bean::new("stranger", "com.acme.Stranger")))
            .with_config_set(ConfigSet::new("ctx", "app").with_config("a.xml").with_config("c.xml"));

        let config = model.config(&"a.xml".into()).unwrap();
        let ids: Vec<String> = candidate_beans(&model, &config)
            .iter()
            .map(|(owner, bean)| format!("{}:{}", owner.artifact, bean.id))
            .collect();
        assert_eq!(ids, ["a.xml:outer", "a.xml:inner", "b.xml:imported", "c.xml:sibling"]);
    }
}
