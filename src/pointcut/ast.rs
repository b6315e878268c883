//! Pointcut syntax tree.

use smol_str::SmolStr;

use super::pattern::{NamePattern, TypePattern};
use crate::java::Modifiers;

/// A pointcut expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pointcut {
    And(Box<Pointcut>, Box<Pointcut>),
    Or(Box<Pointcut>, Box<Pointcut>),
    Not(Box<Pointcut>),
    Execution(Box<MethodPattern>),
    Within(TypePattern),
    This(TypePattern),
    Target(TypePattern),
    Args(Vec<ArgPattern>),
    AtAnnotation(TypePattern),
    AtWithin(TypePattern),
    AtTarget(TypePattern),
    AtArgs(Vec<ArgPattern>),
    /// `bean(name)`; `negated` for the `bean(!name)` form.
    Bean { pattern: NamePattern, negated: bool },
    /// A named pointcut such as `service()` or `com.acme.Pointcuts.service()`.
    Reference {
        declaring_type: Option<SmolStr>,
        name: SmolStr,
        args: Vec<SmolStr>,
    },
}

impl Pointcut {
    pub fn and(a: Pointcut, b: Pointcut) -> Self {
        Pointcut::And(Box::new(a), Box::new(b))
    }

    pub fn or(a: Pointcut, b: Pointcut) -> Self {
        Pointcut::Or(Box::new(a), Box::new(b))
    }

    pub fn not(p: Pointcut) -> Self {
        Pointcut::Not(Box::new(p))
    }

    /// Visit every node, parents before children.
    pub fn walk(&self, f: &mut impl FnMut(&Pointcut)) {
        f(self);
        match self {
            Pointcut::And(a, b) | Pointcut::Or(a, b) => {
                a.walk(f);
                b.walk(f);
            }
            Pointcut::Not(inner) => inner.walk(f),
            _ => {}
        }
    }
}

/// One entry of an `args(..)` or parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgPattern {
    /// `..`: zero or more arguments.
    Ellipsis,
    Type(TypePattern),
}

/// The signature pattern of `execution(..)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodPattern {
    pub annotations: Vec<TypePattern>,
    pub modifiers: Modifiers,
    pub excluded_modifiers: Modifiers,
    pub return_type: TypePattern,
    pub declaring_type: Option<TypePattern>,
    pub name: NamePattern,
    pub params: Vec<ArgPattern>,
    pub throws: Vec<TypePattern>,
}

/// Modifier keywords allowed in method patterns.
pub fn modifier_keyword(word: &str) -> Option<Modifiers> {
    match word {
        "public" => Some(Modifiers::PUBLIC),
        "protected" => Some(Modifiers::PROTECTED),
        "private" => Some(Modifiers::PRIVATE),
        "static" => Some(Modifiers::STATIC),
        "final" => Some(Modifiers::FINAL),
        "synchronized" => Some(Modifiers::SYNCHRONIZED),
        "abstract" => Some(Modifiers::ABSTRACT),
        _ => None,
    }
}
