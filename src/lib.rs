//! # aop-weave
//!
//! Design-time computation of which bean methods and types are advised by which
//! aspects, without running the application.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! build        → Scheduler, task state machine, per-artifact processing
//!   ↓
//! diagnostics  → Failure classification, markers, marker publication
//!   ↓
//! matcher      → Proxy eligibility pre-filters, advice/introduction matching
//!   ↓
//! extract      → XML, annotation and transactional aspect extraction
//!   ↓
//! model        → AspectDefinition, AopReference, ReferenceModel
//!   ↓
//! pointcut     → Logos lexer, recursive-descent parser, pattern evaluation
//!   ↓
//! beans        → Bean model collaborator (beans, configs, config sets)
//!   ↓
//! java         → Class model, bytecode metadata, project class loading
//!   ↓
//! base         → Primitives (ArtifactId, ProjectId, LineIndex, TextRange)
//! ```

// ============================================================================
// MODULES (dependency order: base → java → beans → pointcut → model → extract
//          → matcher → diagnostics → build)
// ============================================================================

/// Foundation types: artifact and project ids, line tracking
pub mod base;

/// Error taxonomy for extraction and matching
pub mod error;

/// Build configuration
pub mod config;

/// Class model and project class loading
pub mod java;

/// Namespace-aware XML element tree
pub mod xml;

/// Bean model: beans, configs, config sets
pub mod beans;

/// Pointcut language: lexer, parser, compiler
pub mod pointcut;

/// Aspect definitions and the reference model
pub mod model;

/// Aspect definition extraction
pub mod extract;

/// Matching of aspect definitions against beans
pub mod matcher;

/// Markers and failure classification
pub mod diagnostics;

/// Incremental build scheduling
pub mod build;

// Re-export foundation types
pub use base::{ArtifactId, LineIndex, LineRange, ProjectId, TextRange, TextSize};
pub use config::BuildConfig;
pub use error::{ExtractError, MatchError};
