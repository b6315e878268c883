//! Publication of markers for the resources touched by a build.

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use super::classify::Failure;
use super::marker::{Marker, MarkerKind, MarkerSink};
use crate::base::ArtifactId;
use crate::config::BuildConfig;
use crate::model::AopReference;

/// Writes the marker set of a finished build.
///
/// Publications are serialized; each one first clears every touched resource
/// and then writes the complete new set, so a resource never shows markers of
/// two different builds.
pub struct MarkerPublisher {
    sink: Arc<dyn MarkerSink>,
    write_lock: Mutex<()>,
}

impl MarkerPublisher {
    pub fn new(sink: Arc<dyn MarkerSink>) -> Self {
        Self {
            sink,
            write_lock: Mutex::new(()),
        }
    }

    pub fn sink(&self) -> &Arc<dyn MarkerSink> {
        &self.sink
    }

    /// Replace the markers of `touched` with those derived from `failures`
    /// and `references`. Returns the number of markers created.
    pub fn publish(
        &self,
        touched: &IndexSet<ArtifactId>,
        failures: &[Failure],
        references: &[Arc<AopReference>],
        settings: &BuildConfig,
    ) -> usize {
        let markers = collect_markers(touched, failures, references, settings);

        let _guard = self.write_lock.lock();
        for resource in touched {
            self.sink.delete_markers(resource);
        }
        let count = markers.len();
        for marker in markers.into_values() {
            self.sink.create_marker(marker);
        }
        debug!(
            "[AOP_MODEL] published {} markers on {} resources",
            count,
            touched.len()
        );
        count
    }
}

impl std::fmt::Debug for MarkerPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerPublisher").finish_non_exhaustive()
    }
}

type MarkerKey = (ArtifactId, u32, MarkerKind, Arc<str>);

fn collect_markers(
    touched: &IndexSet<ArtifactId>,
    failures: &[Failure],
    references: &[Arc<AopReference>],
    settings: &BuildConfig,
) -> IndexMap<MarkerKey, Marker> {
    let mut markers = IndexMap::new();
    let mut add = |marker: Marker| {
        let key = (
            marker.resource.clone(),
            marker.line,
            marker.kind,
            marker.message.clone(),
        );
        markers.entry(key).or_insert(marker);
    };

    for failure in failures {
        add(failure.to_marker());
    }

    if settings.reference_markers {
        for reference in references {
            let definition = &reference.definition;
            if !touched.contains(&definition.resource) && !touched.contains(&reference.artifact) {
                continue;
            }
            let introduction = reference.kind.is_introduction();
            let source_message = if introduction {
                format!("declared on {}", reference.target)
            } else {
                format!("advises {}", reference.target)
            };
            add(Marker::reference(
                definition.resource.clone(),
                definition.start_line(),
                MarkerKind::for_reference(reference.kind, true),
                source_message,
            )
            .with_origin(reference.artifact.clone()));

            let target_message = if introduction {
                format!("aspect declarations {}", reference.source)
            } else {
                format!("advised by {}", reference.source)
            };
            add(Marker::reference(
                reference.artifact.clone(),
                reference.bean.start_line(),
                MarkerKind::for_reference(reference.kind, false),
                target_message,
            )
            .with_origin(definition.resource.clone()));
        }
    }

    markers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::LineRange;
    use crate::beans::Bean;
    use crate::diagnostics::{InMemoryMarkerSink, Severity, codes};
    use crate::error::MatchError;
    use crate::model::{AdviceKind, AspectDefinition, JavaMember};

    fn definition() -> Arc<AspectDefinition> {
        Arc::new(
            AspectDefinition::advice(AdviceKind::Before, "logger", "com.acme.Logger", "log", "app.xml")
                .with_pointcut("execution(* com.acme.Service.*(..))")
                .with_lines(LineRange::new(5, 7)),
        )
    }

    fn bean() -> Arc<Bean> {
        let mut bean = Bean::new("service", "com.acme.Service").at_lines(3, 3);
        bean.artifact = "app.xml".into();
        Arc::new(bean)
    }

    fn reference() -> Arc<AopReference> {
        Arc::new(AopReference::new(
            definition(),
            JavaMember::Method {
                class: "com.acme.Logger".into(),
                name: "log".into(),
                params: Vec::new(),
                anchor: None,
            },
            JavaMember::Method {
                class: "com.acme.Service".into(),
                name: "doWork".into(),
                params: Vec::new(),
                anchor: None,
            },
            bean(),
        ))
    }

    fn touched() -> IndexSet<ArtifactId> {
        [ArtifactId::from("app.xml")].into_iter().collect()
    }

    #[test]
    fn test_reference_markers_on_both_sides() {
        let sink = Arc::new(InMemoryMarkerSink::new());
        let publisher = MarkerPublisher::new(sink.clone());
        publisher.publish(&touched(), &[], &[reference()], &BuildConfig::default());

        let markers = sink.markers();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].kind, MarkerKind::SourceBeforeAdvice);
        assert_eq!(markers[0].line, 5);
        assert_eq!(&*markers[0].message, "advises Service.doWork()");
        assert_eq!(markers[1].kind, MarkerKind::BeforeAdvice);
        assert_eq!(markers[1].line, 3);
        assert_eq!(&*markers[1].message, "advised by Logger.log()");
    }

    #[test]
    fn test_reference_markers_can_be_disabled() {
        let sink = Arc::new(InMemoryMarkerSink::new());
        let publisher = MarkerPublisher::new(sink.clone());
        let settings = BuildConfig::default().with_reference_markers(false);
        assert_eq!(publisher.publish(&touched(), &[], &[reference()], &settings), 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_duplicate_problems_created_once() {
        let sink = Arc::new(InMemoryMarkerSink::new());
        let publisher = MarkerPublisher::new(sink.clone());
        let failure = Failure::new(
            MatchError::malformed("execution(", "unbalanced parentheses"),
            definition(),
            bean(),
            "app.xml".into(),
        );
        publisher.publish(&touched(), &[failure.clone(), failure], &[], &BuildConfig::default());

        let problems = sink.problems();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].severity, Severity::Error);
        assert_eq!(problems[0].code, Some(codes::MALFORMED_POINTCUT));
    }

    #[test]
    fn test_republish_clears_stale_markers() {
        let sink = Arc::new(InMemoryMarkerSink::new());
        let publisher = MarkerPublisher::new(sink.clone());
        let failure = Failure::new(MatchError::class_not_found("x.Gone"), definition(), bean(), "app.xml".into());
        publisher.publish(&touched(), &[failure], &[], &BuildConfig::default());
        assert_eq!(sink.len(), 1);

        publisher.publish(&touched(), &[], &[], &BuildConfig::default());
        assert!(sink.is_empty());
    }
}
