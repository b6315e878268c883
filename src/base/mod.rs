//! Foundation types for the weaving model.
//!
//! This module provides fundamental types used throughout the crate:
//! - [`ArtifactId`] - Identity of a configuration artifact (a beans config file)
//! - [`ProjectId`] - Identity of the project an artifact belongs to
//! - [`LineIndex`] - Byte offset to line conversion for source anchoring
//! - [`LineRange`] - 1-based declaration line range of an element
//!
//! This module has NO dependencies on other weave modules.

mod ids;
mod position;

pub use ids::{ArtifactId, ProjectId};
pub use position::{LineIndex, LineRange};

// Re-export text-size types for convenience
pub use text_size::{TextRange, TextSize};
