//! Proxy eligibility of a bean for one definition.
//!
//! Runs before any pointcut is compiled. A bean failing a filter is simply
//! not advised by the definition; no marker is produced.

use std::fmt;
use std::sync::Arc;

use crate::beans::Bean;
use crate::error::MatchError;
use crate::java::{ProjectClassLoader, ResolvedType, hierarchy};
use crate::model::AspectDefinition;

/// Factory beans expose the object they create, not their class.
pub const FACTORY_BEAN: &str = "org.springframework.beans.factory.FactoryBean";

/// Types of the proxying infrastructure that are never advised themselves.
pub const INFRASTRUCTURE_TYPES: &[&str] = &[
    "org.springframework.aop.Advisor",
    "org.aopalliance.aop.Advice",
    "org.springframework.aop.framework.AopInfrastructureBean",
];

/// Placeholder prefix of configuration-time substitutions.
const PLACEHOLDER_PREFIX: &str = "${";

/// Why a bean was not considered for a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Placeholder,
    AbstractBean,
    AspectBean,
    UnknownClass,
    FactoryBean,
    Infrastructure,
    FinalClass,
    Synthetic,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::Placeholder => "pointcut contains a placeholder",
            SkipReason::AbstractBean => "abstract bean",
            SkipReason::AspectBean => "bean backs the aspect itself",
            SkipReason::UnknownClass => "class not on the build path",
            SkipReason::FactoryBean => "factory bean",
            SkipReason::Infrastructure => "AOP infrastructure class",
            SkipReason::FinalClass => "final class cannot be subclassed",
            SkipReason::Synthetic => "synthetic bean definition",
        })
    }
}

/// Checks that only need the definition and the bean.
pub fn skip_reason(definition: &AspectDefinition, bean: &Bean) -> Option<SkipReason> {
    if definition
        .pointcut_expression
        .as_deref()
        .is_some_and(|e| e.contains(PLACEHOLDER_PREFIX))
    {
        return Some(SkipReason::Placeholder);
    }
    if bean.is_abstract {
        return Some(SkipReason::AbstractBean);
    }
    if definition.aspect_name == bean.id && definition.resource == bean.artifact {
        return Some(SkipReason::AspectBean);
    }
    if bean.is_factory {
        return Some(SkipReason::FactoryBean);
    }
    if bean.is_synthetic {
        return Some(SkipReason::Synthetic);
    }
    None
}

/// Checks on the target class, once it is known to exist.
pub fn class_skip_reason(definition: &AspectDefinition, target: &ResolvedType) -> Option<SkipReason> {
    if target.is_assignable_to(FACTORY_BEAN) {
        return Some(SkipReason::FactoryBean);
    }
    if INFRASTRUCTURE_TYPES.iter().any(|t| target.is_assignable_to(t)) {
        return Some(SkipReason::Infrastructure);
    }
    if target.class.is_final() && definition.proxy_target_class {
        return Some(SkipReason::FinalClass);
    }
    None
}

/// Resolve the target class, or say why the bean is skipped.
///
/// A class without a class file is skipped; a class whose class file exists
/// but whose supertypes are missing is an error.
pub fn resolve_target(
    loader: &dyn ProjectClassLoader,
    definition: &AspectDefinition,
    bean: &Bean,
    class_name: &str,
) -> Result<Result<Arc<ResolvedType>, SkipReason>, MatchError> {
    if let Some(reason) = skip_reason(definition, bean) {
        return Ok(Err(reason));
    }
    if loader.read_class(class_name)?.is_none() {
        return Ok(Err(SkipReason::UnknownClass));
    }
    let target = hierarchy::resolve(loader, class_name)?;
    Ok(match class_skip_reason(definition, &target) {
        Some(reason) => Err(reason),
        None => Ok(target),
    })
}
