//! `@AspectJ` annotation-style aspects.
//!
//! Active only when autoproxying is enabled somewhere in the artifact's
//! scope. Candidate classes are inspected through their class file metadata,
//! never by loading them, so unresolvable dependencies of an aspect do not
//! prevent its advice from being discovered.

use smol_str::SmolStr;
use tracing::{trace, warn};

use super::autoproxy::autoproxy_config;
use super::{AspectDefinitionExtractor, ExtractionContext};
use crate::base::LineRange;
use crate::beans::Bean;
use crate::error::{ExtractError, MatchError};
use crate::java::{Annotation, ClassLoaderSupport, ClassVisitor, MemberMetadata, Modifiers, OBJECT};
use crate::model::{AdviceKind, AspectDefinition, DefinitionStyle};

pub const ASPECT_ANNOTATION: &str = "org.aspectj.lang.annotation.Aspect";
pub const DECLARE_PARENTS_ANNOTATION: &str = "org.aspectj.lang.annotation.DeclareParents";

/// Prefix of methods generated by the AspectJ compiler for code-style aspects.
pub const AJC_MAGIC: &str = "ajc$";

/// Advice annotations and the kind each declares.
pub const ADVICE_ANNOTATIONS: &[(&str, AdviceKind)] = &[
    ("org.aspectj.lang.annotation.Before", AdviceKind::Before),
    ("org.aspectj.lang.annotation.After", AdviceKind::After),
    ("org.aspectj.lang.annotation.AfterReturning", AdviceKind::AfterReturning),
    ("org.aspectj.lang.annotation.AfterThrowing", AdviceKind::AfterThrowing),
    ("org.aspectj.lang.annotation.Around", AdviceKind::Around),
];

/// Per-clause kinds the proxy framework cannot instantiate.
const UNSUPPORTED_PER_CLAUSES: &[&str] = &["PERCFLOW", "PERCFLOWBELOW"];

/// Extracts advice and introductions from `@Aspect` beans.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnnotationAspectExtractor;

impl AspectDefinitionExtractor for AnnotationAspectExtractor {
    fn name(&self) -> &'static str {
        "annotation"
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Vec<AspectDefinition>, ExtractError> {
        let scope = ctx.scope_configs();
        let Some(autoproxy) = autoproxy_config(scope.iter().map(|c| c.as_ref()))? else {
            return Ok(Vec::new());
        };

        let mut definitions = Vec::new();
        for bean in ctx.config.all_beans() {
            let Some(class_name) = ctx.config.bean_class(&bean) else {
                continue;
            };
            if !autoproxy.includes(&bean.id) {
                trace!(bean = %bean.id, "not included by autoproxy patterns");
                continue;
            }
            let found = ctx.classes.execute_callback(|_| {
                if validate_aspect(ctx.classes, &class_name)? {
                    aspect_definitions(ctx.classes, &bean, &class_name)
                } else {
                    Ok(Vec::new())
                }
            });
            match found {
                Ok(found) => definitions.extend(found),
                Err(err) => warn!(bean = %bean.id, class = %class_name, "cannot inspect aspect candidate: {err}"),
            }
        }

        if autoproxy.proxy_target_class {
            for definition in &mut definitions {
                definition.proxy_target_class = true;
            }
        }
        Ok(definitions)
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

#[derive(Default)]
struct AspectInfo {
    access: Modifiers,
    superclass: Option<SmolStr>,
    aspect: Option<Annotation>,
    method_names: Vec<SmolStr>,
}

impl ClassVisitor for AspectInfo {
    fn visit(&mut self, _name: &str, access: Modifiers, superclass: Option<&str>, _interfaces: &[SmolStr]) {
        self.access = access;
        self.superclass = superclass.map(SmolStr::new);
    }

    fn visit_annotation(&mut self, annotation: &Annotation) {
        if annotation.type_name == ASPECT_ANNOTATION {
            self.aspect = Some(annotation.clone());
        }
    }

    fn visit_method(&mut self, method: &MemberMetadata) {
        self.method_names.push(method.name.clone());
    }
}

fn read_info(classes: &ClassLoaderSupport, class_name: &str) -> Result<Option<AspectInfo>, MatchError> {
    let Some(metadata) = classes.class_metadata(class_name)? else {
        return Ok(None);
    };
    let mut info = AspectInfo::default();
    metadata.accept(&mut info);
    Ok(Some(info))
}

/// Whether `class_name` is an `@AspectJ` aspect the proxy framework supports.
///
/// Code-style aspects, per-control-flow aspects and aspects extending a
/// concrete aspect are rejected.
pub fn validate_aspect(classes: &ClassLoaderSupport, class_name: &str) -> Result<bool, MatchError> {
    let Some(info) = read_info(classes, class_name)? else {
        return Ok(false);
    };
    let Some(aspect) = &info.aspect else {
        return Ok(false);
    };
    if info.method_names.iter().any(|m| m.starts_with(AJC_MAGIC)) {
        trace!(class = class_name, "code-style aspect");
        return Ok(false);
    }
    if let Some(per_clause) = aspect.string("value") {
        let keyword = per_clause.split('(').next().unwrap_or_default().trim().to_uppercase();
        if UNSUPPORTED_PER_CLAUSES.contains(&keyword.as_str()) {
            trace!(class = class_name, per_clause, "unsupported instantiation model");
            return Ok(false);
        }
    }
    if let Some(superclass) = info.superclass.as_deref().filter(|s| *s != OBJECT) {
        let Some(parent) = read_info(classes, superclass)? else {
            return Ok(false);
        };
        if parent.aspect.is_some() && !parent.access.is_abstract() {
            trace!(class = class_name, superclass, "extends a concrete aspect");
            return Ok(false);
        }
    }
    Ok(true)
}

// ============================================================================
// ADVICE
// ============================================================================

struct AdviceCollector<'a> {
    aspect_name: &'a SmolStr,
    class_name: &'a SmolStr,
    lines: LineRange,
    definitions: Vec<AspectDefinition>,
}

impl AdviceCollector<'_> {
    fn comma_list(annotation: &Annotation, key: &str) -> Vec<SmolStr> {
        annotation
            .string(key)
            .map(|names| {
                names
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(SmolStr::new)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ClassVisitor for AdviceCollector<'_> {
    fn visit_field(&mut self, field: &MemberMetadata) {
        let Some(annotation) = field.annotation(DECLARE_PARENTS_ANNOTATION) else {
            return;
        };
        let (Some(type_pattern), Some(interface)) = (annotation.string("value"), field.types.first()) else {
            return;
        };
        let definition = AspectDefinition::introduction(
            type_pattern,
            interface.clone(),
            self.aspect_name.clone(),
            self.class_name.clone(),
            "",
        )
        .with_style(DefinitionStyle::Annotation)
        .declared_by_field(field.name.clone())
        .with_lines(self.lines);
        self.definitions.push(definition);
    }

    fn visit_method(&mut self, method: &MemberMetadata) {
        for (annotation_type, kind) in ADVICE_ANNOTATIONS {
            let Some(annotation) = method.annotation(annotation_type) else {
                continue;
            };
            let pointcut = annotation
                .string("pointcut")
                .or_else(|| annotation.string("value"))
                .unwrap_or_default();
            let mut definition = AspectDefinition::advice(
                *kind,
                self.aspect_name.clone(),
                self.class_name.clone(),
                method.name.clone(),
                "",
            )
            .with_style(DefinitionStyle::Annotation)
            .with_pointcut(pointcut)
            .with_params(method.types.iter().cloned())
            .with_arg_names(Self::comma_list(annotation, "argNames"))
            .with_lines(self.lines);
            if let Some(returning) = annotation.string("returning") {
                definition = definition.with_returning(returning);
            }
            if let Some(throwing) = annotation.string("throwing") {
                definition = definition.with_throwing(throwing);
            }
            self.definitions.push(definition);
        }
    }
}

fn aspect_definitions(
    classes: &ClassLoaderSupport,
    bean: &Bean,
    class_name: &SmolStr,
) -> Result<Vec<AspectDefinition>, MatchError> {
    let Some(metadata) = classes.class_metadata(class_name)? else {
        return Ok(Vec::new());
    };
    let mut collector = AdviceCollector {
        aspect_name: &bean.id,
        class_name,
        lines: bean.lines,
        definitions: Vec::new(),
    };
    metadata.accept(&mut collector);
    Ok(collector
        .definitions
        .into_iter()
        .map(|mut definition| {
            definition.resource = bean.artifact.clone();
            definition
        })
        .collect())
}
