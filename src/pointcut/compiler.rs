//! Pointcut compilation and the matcher capability.
//!
//! [`PointcutCompiler`] turns an expression into a [`PointcutMatcher`] bound
//! to the declaring scope of an advice: named pointcut references are inlined
//! and binding identifiers (`args(account)`, `@annotation(audited)`) are
//! replaced by the types of the advice parameters they bind.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use super::ast::{ArgPattern, Pointcut};
use super::eval::{EvaluationContext, Evaluator, referenced_types};
use super::parser::parse;
use super::pattern::{TypeMatcher, TypePattern};
use crate::error::MatchError;
use crate::java::{
    JavaMethod, LoaderId, OBJECT, ProjectClassLoader, hierarchy, is_primitive, package_of,
};

/// Annotation marking a method as a named pointcut.
pub const POINTCUT_ANNOTATION: &str = "org.aspectj.lang.annotation.Pointcut";

/// Parameter types that carry the join point rather than a bound value.
pub const JOIN_POINT_TYPES: &[&str] = &[
    "org.aspectj.lang.JoinPoint",
    "org.aspectj.lang.ProceedingJoinPoint",
    "org.aspectj.lang.JoinPoint$StaticPart",
];

/// A compiled pointcut.
pub trait PointcutMatcher: Send + Sync + fmt::Debug {
    /// The expression this matcher was compiled from.
    fn expression(&self) -> &str;

    /// Whether any join point of `class` may match. Cheap; evaluated first.
    fn matches_class(&self, class: &str, ctx: &EvaluationContext<'_>) -> Result<bool, MatchError>;

    /// Whether executions of `method` on instances of `target` match.
    ///
    /// `method` is either declared on `target` or on one of its interfaces.
    /// Class resolution failures caused by the method's own signature are
    /// reported wrapped with [`MatchError::in_member`].
    fn matches_method(
        &self,
        target: &str,
        method: &JavaMethod,
        ctx: &EvaluationContext<'_>,
    ) -> Result<bool, MatchError>;

    /// Drop all cached shadow matches.
    fn clear_cache(&self);

    /// Number of cached shadow matches.
    fn cached_shadows(&self) -> usize;
}

/// Compiles pointcut expressions.
pub trait PointcutCompiler: Send + Sync {
    fn compile(
        &self,
        expression: &str,
        scope: &DeclarationScope,
        loader: &dyn ProjectClassLoader,
    ) -> Result<Arc<dyn PointcutMatcher>, MatchError>;
}

// ============================================================================
// DECLARATION SCOPE
// ============================================================================

/// Where a pointcut is declared: the aspect class and the advice parameters
/// its binding identifiers refer to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclarationScope {
    pub declaring_class: Option<SmolStr>,
    /// Binding name to bound type.
    pub bindings: Vec<(SmolStr, SmolStr)>,
    /// Parameter types without a known name, bound in order of appearance.
    pub unbound_types: Vec<SmolStr>,
}

impl DeclarationScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_class(class: impl Into<SmolStr>) -> Self {
        Self {
            declaring_class: Some(class.into()),
            ..Self::default()
        }
    }

    /// Scope of an advice method with the given parameter types.
    ///
    /// A leading join point parameter is skipped when it cannot be one of the
    /// named arguments. A `returning`/`throwing` binding absent from
    /// `arg_names` claims the last unnamed parameter.
    pub fn for_advice(
        class: impl Into<SmolStr>,
        param_types: &[SmolStr],
        arg_names: &[SmolStr],
        returning: Option<&str>,
        throwing: Option<&str>,
    ) -> Self {
        let mut params = param_types;
        if let Some(first) = params.first() {
            if JOIN_POINT_TYPES.contains(&first.as_str())
                && (arg_names.is_empty() || arg_names.len() + 1 == params.len())
            {
                params = &params[1..];
            }
        }

        let bindings: Vec<(SmolStr, SmolStr)> = arg_names
            .iter()
            .cloned()
            .zip(params.iter().cloned())
            .collect();
        let mut unbound_types: Vec<SmolStr> = params.iter().skip(bindings.len()).cloned().collect();
        for name in returning.into_iter().chain(throwing) {
            if !arg_names.iter().any(|n| n == name) {
                unbound_types.pop();
            }
        }

        Self {
            declaring_class: Some(class.into()),
            bindings,
            unbound_types,
        }
    }

    /// Packages whose types may be named by their simple name.
    pub fn imports(&self) -> Vec<SmolStr> {
        let mut imports = vec![SmolStr::new_static("java.lang")];
        if let Some(class) = &self.declaring_class {
            let package = package_of(class);
            if !package.is_empty() && package != "java.lang" {
                imports.push(SmolStr::new(package));
            }
        }
        imports
    }
}

// ============================================================================
// NATIVE COMPILER
// ============================================================================

/// Compiler backed by the crate's own pointcut evaluator.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePointcutCompiler;

impl PointcutCompiler for NativePointcutCompiler {
    fn compile(
        &self,
        expression: &str,
        scope: &DeclarationScope,
        loader: &dyn ProjectClassLoader,
    ) -> Result<Arc<dyn PointcutMatcher>, MatchError> {
        let pointcut = parse(expression).map_err(|e| MatchError::malformed(expression, e.to_string()))?;
        let mut resolver = Resolver {
            loader,
            expression,
            stack: Vec::new(),
        };
        let mut bindings = Bindings::from_scope(scope);
        let pointcut = resolver.resolve(pointcut, &mut bindings)?;
        tracing::trace!(expression, ?pointcut, "compiled pointcut");
        Ok(Arc::new(NativePointcutMatcher::new(expression, pointcut, scope.imports())))
    }
}

struct Bindings {
    declaring_class: Option<SmolStr>,
    named: FxHashMap<SmolStr, SmolStr>,
    unbound: VecDeque<SmolStr>,
}

impl Bindings {
    fn from_scope(scope: &DeclarationScope) -> Self {
        Self {
            declaring_class: scope.declaring_class.clone(),
            named: scope.bindings.iter().cloned().collect(),
            unbound: scope.unbound_types.iter().cloned().collect(),
        }
    }

    /// Type bound to `identifier`, claiming the next unnamed parameter for a
    /// name not seen before.
    fn bind(&mut self, identifier: &str) -> Option<SmolStr> {
        if let Some(bound) = self.named.get(identifier) {
            return Some(bound.clone());
        }
        let bound = self.unbound.pop_front()?;
        self.named.insert(SmolStr::new(identifier), bound.clone());
        Some(bound)
    }
}

/// Whether an identifier names a binding rather than a type.
fn is_binding_name(identifier: &str) -> bool {
    identifier.starts_with(|c: char| c.is_ascii_lowercase()) && !is_primitive(identifier)
}

struct Resolver<'a> {
    loader: &'a dyn ProjectClassLoader,
    expression: &'a str,
    /// Named pointcuts currently being inlined, for cycle detection.
    stack: Vec<String>,
}

impl Resolver<'_> {
    fn malformed(&self, reason: impl Into<String>) -> MatchError {
        MatchError::malformed(self.expression, reason)
    }

    fn resolve(&mut self, pc: Pointcut, bindings: &mut Bindings) -> Result<Pointcut, MatchError> {
        Ok(match pc {
            Pointcut::And(a, b) => Pointcut::and(self.resolve(*a, bindings)?, self.resolve(*b, bindings)?),
            Pointcut::Or(a, b) => Pointcut::or(self.resolve(*a, bindings)?, self.resolve(*b, bindings)?),
            Pointcut::Not(inner) => Pointcut::not(self.resolve(*inner, bindings)?),
            Pointcut::This(tp) => Pointcut::This(self.binding(tp, bindings, false)?),
            Pointcut::Target(tp) => Pointcut::Target(self.binding(tp, bindings, false)?),
            Pointcut::AtAnnotation(tp) => Pointcut::AtAnnotation(self.binding(tp, bindings, true)?),
            Pointcut::AtWithin(tp) => Pointcut::AtWithin(self.binding(tp, bindings, true)?),
            Pointcut::AtTarget(tp) => Pointcut::AtTarget(self.binding(tp, bindings, true)?),
            Pointcut::Args(args) => Pointcut::Args(self.arg_bindings(args, bindings, false)?),
            Pointcut::AtArgs(args) => Pointcut::AtArgs(self.arg_bindings(args, bindings, true)?),
            Pointcut::Reference {
                declaring_type,
                name,
                args,
            } => self.reference(declaring_type, &name, &args, bindings)?,
            other @ (Pointcut::Execution(_) | Pointcut::Within(_) | Pointcut::Bean { .. }) => other,
        })
    }

    fn arg_bindings(
        &mut self,
        args: Vec<ArgPattern>,
        bindings: &mut Bindings,
        annotation: bool,
    ) -> Result<Vec<ArgPattern>, MatchError> {
        args.into_iter()
            .map(|arg| match arg {
                ArgPattern::Type(tp) => Ok(ArgPattern::Type(self.binding(tp, bindings, annotation)?)),
                ArgPattern::Ellipsis => Ok(ArgPattern::Ellipsis),
            })
            .collect()
    }

    /// Replace a binding identifier by the pattern of its bound type.
    fn binding(
        &mut self,
        tp: TypePattern,
        bindings: &mut Bindings,
        annotation: bool,
    ) -> Result<TypePattern, MatchError> {
        let Some(identifier) = tp.simple_identifier() else {
            return Ok(tp);
        };
        if !bindings.named.contains_key(identifier) && !is_binding_name(identifier) {
            return Ok(tp);
        }
        match bindings.bind(identifier) {
            Some(bound) if bound == OBJECT => Ok(TypePattern::Any),
            Some(bound) => TypePattern::exact(&bound.replace('$', ".")).map_err(|e| self.malformed(e)),
            None if annotation => Err(self.malformed(format!("formal '{identifier}' is not bound"))),
            None => Ok(TypePattern::Any),
        }
    }

    fn reference(
        &mut self,
        declaring_type: Option<SmolStr>,
        name: &str,
        args: &[SmolStr],
        bindings: &mut Bindings,
    ) -> Result<Pointcut, MatchError> {
        let resolved = match declaring_type {
            Some(type_name) => self.qualify(&type_name, bindings)?,
            None => {
                let class = bindings
                    .declaring_class
                    .clone()
                    .ok_or_else(|| self.malformed(format!("cannot resolve pointcut reference '{name}()'")))?;
                hierarchy::resolve(self.loader, &class)?
            }
        };

        let found = std::iter::once(&resolved.class)
            .chain(resolved.superclasses.iter())
            .flat_map(|class| class.methods_named(name))
            .find_map(|method| {
                method
                    .annotation(POINTCUT_ANNOTATION)
                    .filter(|_| method.parameter_types.len() == args.len())
                    .map(|annotation| (method, annotation))
            });
        let Some((method, annotation)) = found else {
            return Err(self.malformed(format!(
                "no pointcut '{name}' with {} argument(s) on {}",
                args.len(),
                resolved.class.name
            )));
        };

        let key = format!("{}.{}", method.declaring_class, name);
        if self.stack.contains(&key) {
            return Err(self.malformed(format!("cyclic pointcut reference '{key}'")));
        }
        let Some(body) = annotation.string("value") else {
            return Err(self.malformed(format!("pointcut '{key}' has no expression")));
        };
        let parsed = parse(body).map_err(|e| self.malformed(format!("in pointcut '{key}': {e}")))?;

        let formals: Vec<&str> = annotation
            .string("argNames")
            .map(|names| names.split(',').map(str::trim).filter(|n| !n.is_empty()).collect())
            .unwrap_or_default();
        let mut nested = Bindings {
            declaring_class: Some(method.declaring_class.clone()),
            named: FxHashMap::default(),
            unbound: VecDeque::new(),
        };
        for (index, (actual, declared)) in args.iter().zip(&method.parameter_types).enumerate() {
            let bound = if is_binding_name(actual) {
                bindings.bind(actual).unwrap_or_else(|| declared.clone())
            } else {
                actual.clone()
            };
            match formals.get(index) {
                Some(formal) => {
                    nested.named.insert(SmolStr::new(formal), bound);
                }
                None => nested.unbound.push_back(bound),
            }
        }

        self.stack.push(key);
        let inlined = self.resolve(parsed, &mut nested);
        self.stack.pop();
        inlined
    }

    /// Resolve the class a qualified reference names, trying the aspect's
    /// package for names it may be relative to.
    fn qualify(&self, type_name: &str, bindings: &Bindings) -> Result<Arc<hierarchy::ResolvedType>, MatchError> {
        let package = bindings
            .declaring_class
            .as_deref()
            .map(package_of)
            .filter(|p| !p.is_empty());
        let relative = package.map(|p| format!("{p}.{type_name}"));
        let candidates: Vec<&str> = if type_name.contains('.') {
            std::iter::once(type_name).chain(relative.as_deref()).collect()
        } else {
            relative.as_deref().into_iter().chain(std::iter::once(type_name)).collect()
        };
        for candidate in candidates {
            match hierarchy::resolve(self.loader, candidate) {
                Ok(resolved) => return Ok(resolved),
                Err(MatchError::ClassNotFound { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(self.malformed(format!("cannot resolve type '{type_name}' of pointcut reference")))
    }
}

// ============================================================================
// NATIVE MATCHER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClassKey {
    loader: LoaderId,
    target: SmolStr,
    bean: Option<SmolStr>,
    proxy_target_class: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ShadowKey {
    class: ClassKey,
    method: String,
}

fn method_key(method: &JavaMethod) -> String {
    format!(
        "{}.{}({})",
        method.declaring_class,
        method.name,
        method.parameter_types.join(",")
    )
}

/// A resolved pointcut plus its shadow-match cache.
pub struct NativePointcutMatcher {
    expression: SmolStr,
    pointcut: Pointcut,
    imports: Vec<SmolStr>,
    classes: Mutex<FxHashMap<ClassKey, bool>>,
    shadows: Mutex<FxHashMap<ShadowKey, bool>>,
}

impl NativePointcutMatcher {
    fn new(expression: &str, pointcut: Pointcut, imports: Vec<SmolStr>) -> Self {
        Self {
            expression: SmolStr::new(expression),
            pointcut,
            imports,
            classes: Mutex::new(FxHashMap::default()),
            shadows: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn pointcut(&self) -> &Pointcut {
        &self.pointcut
    }

    fn class_key(target: &str, ctx: &EvaluationContext<'_>) -> ClassKey {
        ClassKey {
            loader: ctx.loader.id(),
            target: SmolStr::new(target),
            bean: ctx.bean_name.map(SmolStr::new),
            proxy_target_class: ctx.proxy_target_class,
        }
    }
}

impl fmt::Debug for NativePointcutMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativePointcutMatcher")
            .field("expression", &self.expression)
            .field("shadows", &self.cached_shadows())
            .finish()
    }
}

impl PointcutMatcher for NativePointcutMatcher {
    fn expression(&self) -> &str {
        &self.expression
    }

    fn matches_class(&self, class: &str, ctx: &EvaluationContext<'_>) -> Result<bool, MatchError> {
        let key = Self::class_key(class, ctx);
        if let Some(&cached) = self.classes.lock().get(&key) {
            return Ok(cached);
        }
        let target = hierarchy::resolve(ctx.loader, class)?;
        let types = TypeMatcher::new(ctx.loader, &self.imports);
        let result = Evaluator::new(types, ctx, &target)
            .class_level(&self.pointcut)?
            .maybe_true();
        self.classes.lock().insert(key, result);
        Ok(result)
    }

    fn matches_method(
        &self,
        target: &str,
        method: &JavaMethod,
        ctx: &EvaluationContext<'_>,
    ) -> Result<bool, MatchError> {
        let key = ShadowKey {
            class: Self::class_key(target, ctx),
            method: method_key(method),
        };
        if let Some(&cached) = self.shadows.lock().get(&key) {
            return Ok(cached);
        }

        let evaluated = hierarchy::resolve(ctx.loader, target).and_then(|resolved| {
            let types = TypeMatcher::new(ctx.loader, &self.imports);
            Evaluator::new(types, ctx, &resolved).method_level(&self.pointcut, method)
        });
        let result = match evaluated {
            Ok(result) => result.maybe_true(),
            Err(MatchError::ClassNotFound { name })
                if referenced_types(method).any(|t| t == name) =>
            {
                return Err(MatchError::in_member(
                    method.display_name(),
                    MatchError::ClassNotFound { name },
                ));
            }
            Err(err) => return Err(err),
        };
        self.shadows.lock().insert(key, result);
        Ok(result)
    }

    fn clear_cache(&self) {
        self.classes.lock().clear();
        self.shadows.lock().clear();
    }

    fn cached_shadows(&self) -> usize {
        self.shadows.lock().len()
    }
}
