//! Pointcut evaluation against loaded classes.
//!
//! Class-level evaluation is three-valued: a designator that depends on the
//! method (or on runtime argument values) answers [`FuzzyBool::Maybe`], so a
//! class is only rejected when no method of it can match. Method-level
//! evaluation treats a remaining `Maybe` (runtime checks of `args` and `@args`)
//! as a match.

use crate::error::MatchError;
use crate::java::{JavaClass, JavaMethod, OBJECT, ProjectClassLoader, ResolvedType, is_primitive};

use super::ast::{ArgPattern, MethodPattern, Pointcut};
use super::pattern::{TypeMatcher, TypePattern, split_array};

/// Kleene three-valued logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuzzyBool {
    Yes,
    No,
    Maybe,
}

impl FuzzyBool {
    pub fn and(self, other: FuzzyBool) -> FuzzyBool {
        match (self, other) {
            (FuzzyBool::No, _) | (_, FuzzyBool::No) => FuzzyBool::No,
            (FuzzyBool::Yes, FuzzyBool::Yes) => FuzzyBool::Yes,
            _ => FuzzyBool::Maybe,
        }
    }

    pub fn or(self, other: FuzzyBool) -> FuzzyBool {
        match (self, other) {
            (FuzzyBool::Yes, _) | (_, FuzzyBool::Yes) => FuzzyBool::Yes,
            (FuzzyBool::No, FuzzyBool::No) => FuzzyBool::No,
            _ => FuzzyBool::Maybe,
        }
    }

    pub fn not(self) -> FuzzyBool {
        match self {
            FuzzyBool::Yes => FuzzyBool::No,
            FuzzyBool::No => FuzzyBool::Yes,
            FuzzyBool::Maybe => FuzzyBool::Maybe,
        }
    }

    /// `Yes` or `Maybe`.
    pub fn maybe_true(self) -> bool {
        self != FuzzyBool::No
    }
}

impl From<bool> for FuzzyBool {
    fn from(value: bool) -> Self {
        if value { FuzzyBool::Yes } else { FuzzyBool::No }
    }
}

/// What an evaluation may know about the join point besides the class.
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub loader: &'a dyn ProjectClassLoader,
    /// Name (id or alias) of the bean currently evaluated, for `bean(..)`.
    pub bean_name: Option<&'a str>,
    /// Subclass proxies expose the full class; interface proxies only the
    /// interfaces. This decides what `this(..)` sees.
    pub proxy_target_class: bool,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(loader: &'a dyn ProjectClassLoader) -> Self {
        Self {
            loader,
            bean_name: None,
            proxy_target_class: false,
        }
    }

    pub fn with_bean_name(mut self, bean_name: &'a str) -> Self {
        self.bean_name = Some(bean_name);
        self
    }

    pub fn with_proxy_target_class(mut self, proxy_target_class: bool) -> Self {
        self.proxy_target_class = proxy_target_class;
        self
    }
}

pub(crate) struct Evaluator<'a> {
    types: TypeMatcher<'a>,
    ctx: &'a EvaluationContext<'a>,
    target: &'a ResolvedType,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        types: TypeMatcher<'a>,
        ctx: &'a EvaluationContext<'a>,
        target: &'a ResolvedType,
    ) -> Self {
        Self { types, ctx, target }
    }

    // ========================================================================
    // CLASS LEVEL
    // ========================================================================

    pub(crate) fn class_level(&self, pc: &Pointcut) -> Result<FuzzyBool, MatchError> {
        Ok(match pc {
            Pointcut::And(a, b) => {
                let left = self.class_level(a)?;
                if left == FuzzyBool::No {
                    return Ok(FuzzyBool::No);
                }
                left.and(self.class_level(b)?)
            }
            Pointcut::Or(a, b) => {
                let left = self.class_level(a)?;
                if left == FuzzyBool::Yes {
                    return Ok(FuzzyBool::Yes);
                }
                left.or(self.class_level(b)?)
            }
            Pointcut::Not(inner) => self.class_level(inner)?.not(),
            Pointcut::Execution(pattern) => match &pattern.declaring_type {
                None => FuzzyBool::Maybe,
                Some(declaring) => {
                    let mut any = false;
                    for class in self.target.all_types() {
                        if self.types.matches(declaring, &class.name)? {
                            any = true;
                            break;
                        }
                    }
                    if any { FuzzyBool::Maybe } else { FuzzyBool::No }
                }
            },
            Pointcut::Within(pattern) => {
                if self.types.matches(pattern, &self.target.class.name)? {
                    FuzzyBool::Yes
                } else {
                    let mut any = false;
                    for class in self.target.all_types().skip(1) {
                        if self.types.matches(pattern, &class.name)? {
                            any = true;
                            break;
                        }
                    }
                    if any { FuzzyBool::Maybe } else { FuzzyBool::No }
                }
            }
            Pointcut::This(pattern) => self.this_matches(pattern)?.into(),
            Pointcut::Target(pattern) => self.instance_of(pattern, false)?.into(),
            Pointcut::AtTarget(pattern) => self.annotated(&self.target.class, pattern).into(),
            Pointcut::AtWithin(pattern) => {
                if self.annotated(&self.target.class, pattern) {
                    FuzzyBool::Yes
                } else if self
                    .target
                    .all_types()
                    .skip(1)
                    .any(|class| self.annotated(class, pattern))
                {
                    FuzzyBool::Maybe
                } else {
                    FuzzyBool::No
                }
            }
            Pointcut::Args(_) | Pointcut::AtArgs(_) | Pointcut::AtAnnotation(_) => FuzzyBool::Maybe,
            Pointcut::Bean { pattern, negated } => match self.ctx.bean_name {
                Some(name) => (pattern.matches(name) != *negated).into(),
                None => FuzzyBool::Maybe,
            },
            Pointcut::Reference { name, .. } => {
                return Err(MatchError::Unexpected(format!(
                    "unresolved pointcut reference '{name}'"
                )));
            }
        })
    }

    // ========================================================================
    // METHOD LEVEL
    // ========================================================================

    pub(crate) fn method_level(&self, pc: &Pointcut, method: &JavaMethod) -> Result<FuzzyBool, MatchError> {
        Ok(match pc {
            Pointcut::And(a, b) => {
                let left = self.method_level(a, method)?;
                if left == FuzzyBool::No {
                    return Ok(FuzzyBool::No);
                }
                left.and(self.method_level(b, method)?)
            }
            Pointcut::Or(a, b) => {
                let left = self.method_level(a, method)?;
                if left == FuzzyBool::Yes {
                    return Ok(FuzzyBool::Yes);
                }
                left.or(self.method_level(b, method)?)
            }
            Pointcut::Not(inner) => self.method_level(inner, method)?.not(),
            Pointcut::Execution(pattern) => self.execution_matches(pattern, method)?.into(),
            Pointcut::Within(pattern) => (self.types.matches(pattern, &self.target.class.name)?
                || self.types.matches(pattern, &method.declaring_class)?)
            .into(),
            Pointcut::This(pattern) => self.this_matches(pattern)?.into(),
            Pointcut::Target(pattern) => self.instance_of(pattern, false)?.into(),
            Pointcut::AtTarget(pattern) => self.annotated(&self.target.class, pattern).into(),
            Pointcut::AtWithin(pattern) => {
                let declaring = self
                    .target
                    .all_types()
                    .find(|class| class.name == method.declaring_class);
                (self.annotated(&self.target.class, pattern)
                    || declaring.is_some_and(|class| self.annotated(class, pattern)))
                .into()
            }
            Pointcut::AtAnnotation(pattern) => method
                .annotations
                .iter()
                .any(|a| self.annotation_matches(pattern, &a.type_name))
                .into(),
            Pointcut::Args(patterns) => self.args_match(patterns, &method.parameter_types)?,
            Pointcut::AtArgs(patterns) => {
                if arity_fits(patterns, method.parameter_types.len()) {
                    FuzzyBool::Maybe
                } else {
                    FuzzyBool::No
                }
            }
            Pointcut::Bean { .. } | Pointcut::Reference { .. } => self.class_level(pc)?,
        })
    }

    fn execution_matches(&self, pattern: &MethodPattern, method: &JavaMethod) -> Result<bool, MatchError> {
        if !method.modifiers.contains(pattern.modifiers)
            || method.modifiers.bits() & pattern.excluded_modifiers.bits() != 0
        {
            return Ok(false);
        }
        if !pattern.name.matches(&method.name) {
            return Ok(false);
        }
        for annotation in &pattern.annotations {
            if !method
                .annotations
                .iter()
                .any(|a| self.annotation_matches(annotation, &a.type_name))
            {
                return Ok(false);
            }
        }
        if let Some(declaring) = &pattern.declaring_type {
            if !self.types.matches(declaring, &method.declaring_class)? {
                return Ok(false);
            }
        }
        if !self.types.matches(&pattern.return_type, &method.return_type)? {
            return Ok(false);
        }
        if !self.params_match(&pattern.params, &method.parameter_types)? {
            return Ok(false);
        }
        for throws in &pattern.throws {
            let declared = match throws {
                TypePattern::Not(inner) => {
                    let mut any = false;
                    for exception in &method.exception_types {
                        any |= self.types.matches(inner, exception)?;
                    }
                    !any
                }
                other => {
                    let mut any = false;
                    for exception in &method.exception_types {
                        any |= self.types.matches(other, exception)?;
                    }
                    any
                }
            };
            if !declared {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Static parameter list matching with `..` wildcards.
    fn params_match(&self, patterns: &[ArgPattern], params: &[smol_str::SmolStr]) -> Result<bool, MatchError> {
        match patterns.split_first() {
            None => Ok(params.is_empty()),
            Some((ArgPattern::Ellipsis, rest)) => {
                for skip in 0..=params.len() {
                    if self.params_match(rest, &params[skip..])? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Some((ArgPattern::Type(pattern), rest)) => match params.split_first() {
                None => Ok(false),
                Some((param, remaining)) => {
                    Ok(self.types.matches(pattern, param)? && self.params_match(rest, remaining)?)
                }
            },
        }
    }

    /// Runtime-typed argument matching for `args(..)`.
    fn args_match(&self, patterns: &[ArgPattern], params: &[smol_str::SmolStr]) -> Result<FuzzyBool, MatchError> {
        match patterns.split_first() {
            None => Ok(params.is_empty().into()),
            Some((ArgPattern::Ellipsis, rest)) => {
                let mut result = FuzzyBool::No;
                for skip in 0..=params.len() {
                    result = result.or(self.args_match(rest, &params[skip..])?);
                    if result == FuzzyBool::Yes {
                        break;
                    }
                }
                Ok(result)
            }
            Some((ArgPattern::Type(pattern), rest)) => match params.split_first() {
                None => Ok(FuzzyBool::No),
                Some((param, remaining)) => {
                    let head = self.arg_matches(pattern, param)?;
                    if head == FuzzyBool::No {
                        return Ok(FuzzyBool::No);
                    }
                    Ok(head.and(self.args_match(rest, remaining)?))
                }
            },
        }
    }

    fn arg_matches(&self, pattern: &TypePattern, param: &str) -> Result<FuzzyBool, MatchError> {
        match pattern {
            TypePattern::Any => Ok(FuzzyBool::Yes),
            TypePattern::Not(inner) => Ok(self.arg_matches(inner, param)?.not()),
            TypePattern::And(a, b) => Ok(self.arg_matches(a, param)?.and(self.arg_matches(b, param)?)),
            TypePattern::Or(a, b) => Ok(self.arg_matches(a, param)?.or(self.arg_matches(b, param)?)),
            TypePattern::Named { name, subtypes, dims }
                if name.is_wild() || *subtypes || *dims > 0 || !name.as_str().contains('.') =>
            {
                Ok(self.types.matches(pattern, param)?.into())
            }
            TypePattern::Named { name, .. } => {
                if self.types.matches(pattern, param)? {
                    return Ok(FuzzyBool::Yes);
                }
                let required = name.as_str();
                if self.types.is_assignable(param, required)? {
                    Ok(FuzzyBool::Yes)
                } else if !is_primitive(param) && self.types.is_assignable(required, param)? {
                    // The declared parameter is a supertype; the runtime value may fit.
                    Ok(FuzzyBool::Maybe)
                } else {
                    Ok(FuzzyBool::No)
                }
            }
        }
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    /// `this(..)`: interface proxies are only instances of the interfaces.
    fn this_matches(&self, pattern: &TypePattern) -> Result<bool, MatchError> {
        self.instance_of(pattern, !self.ctx.proxy_target_class)
    }

    /// Whether the target (or, with `interfaces_only`, its proxy) is an
    /// instance of a type matching `pattern`.
    fn instance_of(&self, pattern: &TypePattern, interfaces_only: bool) -> Result<bool, MatchError> {
        match pattern {
            TypePattern::Any => Ok(true),
            TypePattern::Not(inner) => Ok(!self.instance_of(inner, interfaces_only)?),
            TypePattern::And(a, b) => {
                Ok(self.instance_of(a, interfaces_only)? && self.instance_of(b, interfaces_only)?)
            }
            TypePattern::Or(a, b) => {
                Ok(self.instance_of(a, interfaces_only)? || self.instance_of(b, interfaces_only)?)
            }
            TypePattern::Named { .. } => {
                if self.types.matches(pattern, OBJECT)? {
                    return Ok(true);
                }
                let candidates: Vec<&JavaClass> = if interfaces_only {
                    self.target.interfaces.iter().map(|c| c.as_ref()).collect()
                } else {
                    self.target.all_types().map(|c| c.as_ref()).collect()
                };
                for class in candidates {
                    if self.types.matches(pattern, &class.name)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    fn annotated(&self, class: &JavaClass, pattern: &TypePattern) -> bool {
        class
            .annotations
            .iter()
            .any(|a| self.annotation_matches(pattern, &a.type_name))
    }

    fn annotation_matches(&self, pattern: &TypePattern, annotation_type: &str) -> bool {
        match pattern {
            TypePattern::Any => true,
            TypePattern::Named { name, dims: 0, .. } => self.types.matches_name(name, annotation_type),
            TypePattern::Named { .. } => false,
            TypePattern::Not(inner) => !self.annotation_matches(inner, annotation_type),
            TypePattern::And(a, b) => {
                self.annotation_matches(a, annotation_type) && self.annotation_matches(b, annotation_type)
            }
            TypePattern::Or(a, b) => {
                self.annotation_matches(a, annotation_type) || self.annotation_matches(b, annotation_type)
            }
        }
    }
}

/// Whether a pattern list can match `count` arguments.
fn arity_fits(patterns: &[ArgPattern], count: usize) -> bool {
    let fixed = patterns
        .iter()
        .filter(|p| !matches!(p, ArgPattern::Ellipsis))
        .count();
    if patterns.iter().any(|p| matches!(p, ArgPattern::Ellipsis)) {
        fixed <= count
    } else {
        fixed == count
    }
}

/// Element class names a method refers to (parameters, return and exceptions).
pub(crate) fn referenced_types(method: &JavaMethod) -> impl Iterator<Item = &str> {
    method
        .parameter_types
        .iter()
        .chain(std::iter::once(&method.return_type))
        .chain(method.exception_types.iter())
        .map(|t| split_array(t).0)
        .filter(|t| !is_primitive(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FuzzyBool::Yes, FuzzyBool::Maybe, FuzzyBool::Maybe, FuzzyBool::Yes)]
    #[case(FuzzyBool::No, FuzzyBool::Maybe, FuzzyBool::No, FuzzyBool::Maybe)]
    #[case(FuzzyBool::Yes, FuzzyBool::No, FuzzyBool::No, FuzzyBool::Yes)]
    #[case(FuzzyBool::Maybe, FuzzyBool::Maybe, FuzzyBool::Maybe, FuzzyBool::Maybe)]
    fn test_kleene_logic(
        #[case] a: FuzzyBool,
        #[case] b: FuzzyBool,
        #[case] and: FuzzyBool,
        #[case] or: FuzzyBool,
    ) {
        assert_eq!(a.and(b), and);
        assert_eq!(a.or(b), or);
        assert_eq!(a.not().not(), a);
    }

    #[test]
    fn test_arity() {
        assert!(arity_fits(&[ArgPattern::Ellipsis], 0));
        assert!(arity_fits(&[ArgPattern::Type(TypePattern::Any), ArgPattern::Ellipsis], 3));
        assert!(!arity_fits(&[ArgPattern::Type(TypePattern::Any)], 2));
    }
}
