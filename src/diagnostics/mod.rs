//! Markers and failure classification.
//!
//! Matching failures are collected during a build and turned into markers
//! only once the build has finished:
//!
//! ```text
//! MatchError ──classify──▶ Marker ──MarkerPublisher──▶ MarkerSink
//! AopReference ───────────▶ Marker ─┘
//! ```

mod classify;
mod marker;
mod publisher;

pub use classify::{Failure, classify};
pub use marker::{InMemoryMarkerSink, Marker, MarkerKind, MarkerSink, Severity, codes};
pub use publisher::MarkerPublisher;
