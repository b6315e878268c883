//! Marker types and the marker sink.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::base::ArtifactId;
use crate::model::AdviceKind;

// ============================================================================
// MARKER TYPES
// ============================================================================

/// Severity level of a marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Stable tag of a marker, so hosts can style and filter them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MarkerKind {
    Problem,
    BeforeAdvice,
    AfterAdvice,
    AroundAdvice,
    Introduction,
    SourceBeforeAdvice,
    SourceAfterAdvice,
    SourceAroundAdvice,
    SourceIntroduction,
}

impl MarkerKind {
    /// Kind of the marker placed on the advised target (`source == false`) or
    /// on the declaring aspect (`source == true`).
    pub fn for_reference(kind: AdviceKind, source: bool) -> Self {
        match (kind, source) {
            (AdviceKind::Before, false) => MarkerKind::BeforeAdvice,
            (AdviceKind::Before, true) => MarkerKind::SourceBeforeAdvice,
            (AdviceKind::After | AdviceKind::AfterReturning | AdviceKind::AfterThrowing, false) => {
                MarkerKind::AfterAdvice
            }
            (AdviceKind::After | AdviceKind::AfterReturning | AdviceKind::AfterThrowing, true) => {
                MarkerKind::SourceAfterAdvice
            }
            (AdviceKind::Around, false) => MarkerKind::AroundAdvice,
            (AdviceKind::Around, true) => MarkerKind::SourceAroundAdvice,
            (AdviceKind::DeclareParents, false) => MarkerKind::Introduction,
            (AdviceKind::DeclareParents, true) => MarkerKind::SourceIntroduction,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            MarkerKind::Problem => "aop.problem",
            MarkerKind::BeforeAdvice => "aop.before",
            MarkerKind::AfterAdvice => "aop.after",
            MarkerKind::AroundAdvice => "aop.around",
            MarkerKind::Introduction => "aop.introduction",
            MarkerKind::SourceBeforeAdvice => "aop.source.before",
            MarkerKind::SourceAfterAdvice => "aop.source.after",
            MarkerKind::SourceAroundAdvice => "aop.source.around",
            MarkerKind::SourceIntroduction => "aop.source.introduction",
        }
    }
}

/// Marker codes for problem markers.
pub mod codes {
    /// A class or one of its dependencies is missing from the build path.
    pub const CLASS_NOT_FOUND: &str = "A0001";
    /// The pointcut expression does not parse or does not resolve.
    pub const MALFORMED_POINTCUT: &str = "A0002";
    /// Reflective evaluation failed without a more specific cause.
    pub const REFLECTION_FAILURE: &str = "A0003";
    /// Anything else.
    pub const UNEXPECTED: &str = "A0004";
}

/// A marker anchored at one line of one resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Marker {
    /// Resource the marker is shown on.
    pub resource: ArtifactId,
    /// 1-based line; `0` when unknown.
    pub line: u32,
    pub severity: Severity,
    pub kind: MarkerKind,
    pub code: Option<&'static str>,
    pub message: Arc<str>,
    /// Resource whose build produced the marker.
    pub origin: ArtifactId,
}

impl Marker {
    /// Create a problem marker.
    pub fn problem(
        resource: ArtifactId,
        line: u32,
        severity: Severity,
        code: &'static str,
        message: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            origin: resource.clone(),
            resource,
            line,
            severity,
            kind: MarkerKind::Problem,
            code: Some(code),
            message: message.into(),
        }
    }

    /// Create an informational reference marker.
    pub fn reference(resource: ArtifactId, line: u32, kind: MarkerKind, message: impl Into<Arc<str>>) -> Self {
        Self {
            origin: resource.clone(),
            resource,
            line,
            severity: Severity::Info,
            kind,
            code: None,
            message: message.into(),
        }
    }

    /// Record the resource whose build produced this marker.
    pub fn with_origin(mut self, origin: ArtifactId) -> Self {
        self.origin = origin;
        self
    }

    pub fn is_problem(&self) -> bool {
        self.kind == MarkerKind::Problem
    }
}

// ============================================================================
// MARKER SINK
// ============================================================================

/// Where markers end up.
pub trait MarkerSink: Send + Sync {
    /// Delete every marker shown on `resource` or produced by a build of a
    /// resource underneath it.
    fn delete_markers(&self, resource: &ArtifactId);

    fn create_marker(&self, marker: Marker);
}

/// A [`MarkerSink`] keeping markers in memory.
#[derive(Debug, Default)]
pub struct InMemoryMarkerSink {
    markers: RwLock<Vec<Marker>>,
}

impl InMemoryMarkerSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All markers, in creation order.
    pub fn markers(&self) -> Vec<Marker> {
        self.markers.read().clone()
    }

    /// Markers shown on `resource`.
    pub fn markers_on(&self, resource: &ArtifactId) -> Vec<Marker> {
        self.markers
            .read()
            .iter()
            .filter(|m| m.resource == *resource)
            .cloned()
            .collect()
    }

    /// Problem markers only.
    pub fn problems(&self) -> Vec<Marker> {
        self.markers
            .read()
            .iter()
            .filter(|m| m.is_problem())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.markers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.read().is_empty()
    }
}

impl MarkerSink for InMemoryMarkerSink {
    fn delete_markers(&self, resource: &ArtifactId) {
        self.markers
            .write()
            .retain(|m| m.resource != *resource && !m.origin.starts_with(resource));
    }

    fn create_marker(&self, marker: Marker) {
        self.markers.write().push(marker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_after_kinds_share_a_marker_kind() {
        for kind in [AdviceKind::After, AdviceKind::AfterReturning, AdviceKind::AfterThrowing] {
            assert_eq!(MarkerKind::for_reference(kind, false), MarkerKind::AfterAdvice);
            assert_eq!(MarkerKind::for_reference(kind, true), MarkerKind::SourceAfterAdvice);
        }
        assert_eq!(MarkerKind::for_reference(AdviceKind::DeclareParents, true).tag(), "aop.source.introduction");
    }

    #[test]
    fn test_delete_covers_shown_and_produced_markers() {
        let sink = InMemoryMarkerSink::new();
        sink.create_marker(Marker::problem("a.xml".into(), 3, Severity::Error, codes::CLASS_NOT_FOUND, "x"));
        sink.create_marker(
            Marker::reference("b.xml".into(), 1, MarkerKind::BeforeAdvice, "advised by Logger.log()")
                .with_origin("a.xml".into()),
        );
        sink.create_marker(Marker::reference("b.xml".into(), 2, MarkerKind::AroundAdvice, "advised by T.t()"));

        sink.delete_markers(&"a.xml".into());
        let left = sink.markers();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].line, 2);
    }
}
