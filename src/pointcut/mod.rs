//! The pointcut language.
//!
//! Supports the subset of AspectJ that proxy-based AOP can honour: method
//! `execution`, `within`, `this`, `target`, `args`, the annotation designators,
//! `bean` and named pointcut references, combined with `&&`, `||` and `!`.
//!
//! ```text
//! expression ──lexer──▶ tokens ──parser──▶ Pointcut ──compiler──▶ PointcutMatcher
//! ```

mod ast;
mod compiler;
mod eval;
mod lexer;
mod parser;
mod pattern;

pub use ast::{ArgPattern, MethodPattern, Pointcut, modifier_keyword};
pub use compiler::{
    DeclarationScope, JOIN_POINT_TYPES, NativePointcutCompiler, NativePointcutMatcher,
    POINTCUT_ANNOTATION, PointcutCompiler, PointcutMatcher,
};
pub use eval::{EvaluationContext, FuzzyBool};
pub use lexer::{Lexer, Token, TokenKind, tokenize};
pub use parser::{PointcutParseError, UNSUPPORTED_DESIGNATORS, parse, parse_type_pattern};
pub use pattern::{NamePattern, TypeMatcher, TypePattern, is_platform_type, split_array};
