//! Classification of matching failures into problem markers.

use std::sync::Arc;
use tracing::{error, warn};

use super::marker::{Marker, Severity, codes};
use crate::base::ArtifactId;
use crate::beans::Bean;
use crate::error::MatchError;
use crate::model::AspectDefinition;

/// A matching failure collected for one (definition, candidate) pair.
#[derive(Debug, Clone)]
pub struct Failure {
    pub error: MatchError,
    pub definition: Arc<AspectDefinition>,
    pub bean: Arc<Bean>,
    /// Artifact whose processing raised the failure.
    pub origin: ArtifactId,
}

impl Failure {
    pub fn new(
        error: MatchError,
        definition: Arc<AspectDefinition>,
        bean: Arc<Bean>,
        origin: ArtifactId,
    ) -> Self {
        Self {
            error,
            definition,
            bean,
            origin,
        }
    }

    /// The problem marker for this failure.
    pub fn to_marker(&self) -> Marker {
        classify(&self.error, &self.definition, &self.bean).with_origin(self.origin.clone())
    }
}

/// Map `error` to a marker, unwrapping invocation failures down to the first
/// classifiable cause.
///
/// Missing classes are reported on the bean's declaration, malformed pointcuts
/// on the definition. Anything unclassifiable becomes a warning on the
/// definition and is logged.
pub fn classify(error: &MatchError, definition: &AspectDefinition, bean: &Bean) -> Marker {
    match error {
        MatchError::ClassNotFound { name } => Marker::problem(
            bean.artifact.clone(),
            bean.start_line(),
            Severity::Error,
            codes::CLASS_NOT_FOUND,
            format!("Build path is incomplete. Cannot find class file for '{name}'"),
        ),
        MatchError::MalformedPointcut { expression, reason } => Marker::problem(
            definition.resource.clone(),
            definition.start_line(),
            Severity::Error,
            codes::MALFORMED_POINTCUT,
            format!("Error in pointcut expression '{expression}': {reason}"),
        ),
        MatchError::Invocation {
            cause: Some(cause), ..
        } => classify(cause, definition, bean),
        MatchError::Invocation {
            message, cause: None, ..
        } => {
            warn!(
                "[AOP_MODEL] reflective failure matching {} against bean '{}': {}",
                definition.describe(),
                bean.id,
                message
            );
            Marker::problem(
                definition.resource.clone(),
                definition.start_line(),
                Severity::Warning,
                codes::REFLECTION_FAILURE,
                message.as_str(),
            )
        }
        MatchError::Unexpected(message) => {
            error!(
                "[AOP_MODEL] unexpected failure matching {} against bean '{}': {}",
                definition.describe(),
                bean.id,
                message
            );
            Marker::problem(
                definition.resource.clone(),
                definition.start_line(),
                Severity::Warning,
                codes::UNEXPECTED,
                format!("Unexpected error while matching aspect: {message}"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::LineRange;
    use crate::model::AdviceKind;
    use rstest::rstest;

    fn definition() -> AspectDefinition {
        AspectDefinition::advice(AdviceKind::Before, "logger", "com.acme.Logger", "log", "aspects.xml")
            .with_pointcut("execution(* *(..))")
            .with_lines(LineRange::new(7, 9))
    }

    fn bean() -> Bean {
        let mut bean = Bean::new("service", "com.acme.Service").at_lines(21, 22);
        bean.artifact = "services.xml".into();
        bean
    }

    #[rstest]
    #[case(MatchError::class_not_found("com.acme.Gone"), "services.xml", 21, Severity::Error, codes::CLASS_NOT_FOUND)]
    #[case(MatchError::malformed("execution(", "expected ')'"), "aspects.xml", 7, Severity::Error, codes::MALFORMED_POINTCUT)]
    #[case(MatchError::Unexpected("boom".into()), "aspects.xml", 7, Severity::Warning, codes::UNEXPECTED)]
    #[case(
        MatchError::Invocation { member: None, message: "failed".into(), cause: None },
        "aspects.xml", 7, Severity::Warning, codes::REFLECTION_FAILURE
    )]
    #[case(
        MatchError::invocation("outer", MatchError::invocation("inner", MatchError::class_not_found("x.Y"))),
        "services.xml", 21, Severity::Error, codes::CLASS_NOT_FOUND
    )]
    fn test_classification_and_anchor(
        #[case] error: MatchError,
        #[case] resource: &str,
        #[case] line: u32,
        #[case] severity: Severity,
        #[case] code: &str,
    ) {
        let marker = classify(&error, &definition(), &bean());
        assert_eq!(marker.resource.as_str(), resource);
        assert_eq!(marker.line, line);
        assert_eq!(marker.severity, severity);
        assert_eq!(marker.code, Some(code));
        assert!(marker.is_problem());
    }

    #[test]
    fn test_class_not_found_message_names_the_class() {
        let marker = classify(&MatchError::class_not_found("com.acme.Gone"), &definition(), &bean());
        assert!(marker.message.contains("com.acme.Gone"));
    }

    #[test]
    fn test_failure_records_origin() {
        let failure = Failure::new(
            MatchError::malformed("x", "y"),
            Arc::new(definition()),
            Arc::new(bean()),
            "services.xml".into(),
        );
        let marker = failure.to_marker();
        assert_eq!(marker.resource.as_str(), "aspects.xml");
        assert_eq!(marker.origin.as_str(), "services.xml");
    }
}
