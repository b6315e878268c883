//! Error types for extraction and matching.
//!
//! [`MatchError`] is the failure taxonomy of the matching engine. Failures are
//! collected per (definition, candidate) pair and classified into markers by
//! [`crate::diagnostics`]; they never abort a build.

use thiserror::Error;

/// Errors raised while matching an aspect definition against a candidate bean.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MatchError {
    /// A class (or one of its dependencies) is missing from the project class path.
    #[error("class not found: {name}")]
    ClassNotFound { name: String },

    /// The pointcut expression could not be parsed or compiled.
    #[error("{reason}")]
    MalformedPointcut { expression: String, reason: String },

    /// A reflective operation failed. `member` is set when the failure is
    /// attributable to one single target method.
    #[error("{message}")]
    Invocation {
        member: Option<String>,
        message: String,
        cause: Option<Box<MatchError>>,
    },

    /// Anything else.
    #[error("{0}")]
    Unexpected(String),
}

impl MatchError {
    /// Create a class-not-found error.
    pub fn class_not_found(name: impl Into<String>) -> Self {
        Self::ClassNotFound { name: name.into() }
    }

    /// Create a malformed-pointcut error.
    pub fn malformed(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPointcut {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an error raised while invoking reflective machinery.
    pub fn invocation(message: impl Into<String>, source: MatchError) -> Self {
        Self::Invocation {
            member: None,
            message: message.into(),
            cause: Some(Box::new(source)),
        }
    }

    /// Wrap an error that only affects the evaluation of one target method.
    pub fn in_member(member: impl Into<String>, source: MatchError) -> Self {
        Self::Invocation {
            member: Some(member.into()),
            message: source.to_string(),
            cause: Some(Box::new(source)),
        }
    }

    /// Whether the failure is confined to a single target method.
    pub fn is_member_local(&self) -> bool {
        matches!(self, Self::Invocation { member: Some(_), .. })
    }

    /// The wrapped cause of an invocation failure, if any.
    pub fn cause(&self) -> Option<&MatchError> {
        match self {
            Self::Invocation { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }
}

/// Errors raised while extracting aspect definitions from one artifact.
///
/// These are logged by the extractor registry and never reach the marker sink.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The configuration source is not well-formed XML.
    #[error("XML error at offset {offset}: {message}")]
    Xml { offset: usize, message: String },

    /// Loading a class needed during extraction failed.
    #[error("cannot resolve class {class_name}: {source}")]
    Class {
        class_name: String,
        #[source]
        source: MatchError,
    },

    /// An include pattern of the autoproxy configuration is not a valid regex.
    #[error("invalid include pattern '{pattern}': {source}")]
    IncludePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl ExtractError {
    pub fn xml(offset: usize, message: impl Into<String>) -> Self {
        Self::Xml {
            offset,
            message: message.into(),
        }
    }
}
