//! Matching of aspect definitions against candidate beans.
//!
//! [`AspectDefinitionMatcher`] answers "which members of this bean's class
//! does this definition weave into". It mirrors what the proxy framework
//! would do at runtime:
//!
//! 1. pre-filters ([`filter`]) reject beans that are never proxied,
//! 2. introductions match their type pattern against the class,
//! 3. advice is compiled once per definition, checked at class level, then
//!    evaluated per public method and per bean name (id and aliases).
//!
//! The matcher owns the compiled pointcuts of one build and must be closed
//! when the build ends; dropping it closes it.

pub mod filter;

pub use filter::{FACTORY_BEAN, INFRASTRUCTURE_TYPES, SkipReason, class_skip_reason, skip_reason};

use indexmap::IndexSet;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::beans::Bean;
use crate::error::MatchError;
use crate::java::{
    ClassLoaderSupport, JavaMethod, LoaderId, MemberMetadata, OBJECT, ProjectClassLoader, ResolvedType,
    reset_world,
};
use crate::model::{AspectDefinition, DefinitionStyle, JavaMember};
use crate::pointcut::{
    DeclarationScope, EvaluationContext, NativePointcutCompiler, PointcutCompiler, PointcutMatcher, TypeMatcher,
    parse_type_pattern,
};

/// Members one definition weaves into for one bean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Weaving {
    /// Advice method, introduction field or aspect type.
    pub source: JavaMember,
    /// Advised methods, or the introduced-into type.
    pub targets: IndexSet<JavaMember>,
}

impl Weaving {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

struct Compiled {
    /// Keeps the definition alive so its address stays a unique key.
    _definition: Arc<AspectDefinition>,
    matcher: Arc<dyn PointcutMatcher>,
}

/// Matches definitions against beans for the duration of one build.
pub struct AspectDefinitionMatcher {
    compiler: Arc<dyn PointcutCompiler>,
    compiled: Mutex<FxHashMap<usize, Compiled>>,
    loaders: Mutex<FxHashSet<LoaderId>>,
}

impl Default for AspectDefinitionMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl AspectDefinitionMatcher {
    /// A matcher using the native pointcut compiler.
    pub fn new() -> Self {
        Self::with_compiler(Arc::new(NativePointcutCompiler))
    }

    pub fn with_compiler(compiler: Arc<dyn PointcutCompiler>) -> Self {
        Self {
            compiler,
            compiled: Mutex::new(FxHashMap::default()),
            loaders: Mutex::new(FxHashSet::default()),
        }
    }

    /// Reset the type world of `loader` on [`close`](Self::close), even if no
    /// definition is ever matched through it.
    pub fn track_loader(&self, loader: LoaderId) {
        self.loaders.lock().insert(loader);
    }

    /// Members of `class_name` that `definition` weaves into for `bean`.
    ///
    /// `Ok(None)` means the bean is not eligible or the definition's source
    /// member does not exist; neither produces a marker.
    pub fn matches(
        &self,
        classes: &ClassLoaderSupport,
        definition: &Arc<AspectDefinition>,
        bean: &Bean,
        class_name: &str,
    ) -> Result<Option<Weaving>, MatchError> {
        self.track_loader(classes.loader_id());
        classes.execute_callback(|loader| {
            let target = match filter::resolve_target(loader, definition, bean, class_name)? {
                Ok(target) => target,
                Err(reason) => {
                    trace!(bean = %bean.id, class = class_name, "skipping bean: {reason}");
                    return Ok(None);
                }
            };
            if definition.kind.is_introduction() {
                self.match_introduction(classes, loader, definition, &target)
            } else {
                self.match_advice(classes, loader, definition, bean, &target)
            }
        })
    }

    // ========================================================================
    // INTRODUCTIONS
    // ========================================================================

    fn match_introduction(
        &self,
        classes: &ClassLoaderSupport,
        loader: &dyn ProjectClassLoader,
        definition: &AspectDefinition,
        target: &ResolvedType,
    ) -> Result<Option<Weaving>, MatchError> {
        let Some(type_pattern) = definition.type_pattern.as_deref() else {
            return Ok(None);
        };
        let pattern =
            parse_type_pattern(type_pattern).map_err(|e| MatchError::malformed(type_pattern, e.to_string()))?;
        let imports = DeclarationScope::for_class(definition.aspect_class.clone()).imports();
        let types = TypeMatcher::new(loader, &imports);

        let source = match &definition.defining_field {
            Some(field) => {
                let aspect = classes.load_class(&definition.aspect_class)?;
                match aspect.declared_field(field) {
                    Some(declared) => JavaMember::of_field(aspect.name.clone(), declared),
                    None => return Ok(None),
                }
            }
            None => match classes.load_class(&definition.aspect_class) {
                Ok(aspect) => JavaMember::of_type(&aspect),
                Err(_) => JavaMember::named_type(definition.aspect_class.clone()),
            },
        };

        let mut targets = IndexSet::new();
        if types.matches(&pattern, &target.class.name)? {
            targets.insert(JavaMember::of_type(&target.class));
        }
        Ok(Some(Weaving { source, targets }))
    }

    // ========================================================================
    // ADVICE
    // ========================================================================

    fn match_advice(
        &self,
        classes: &ClassLoaderSupport,
        loader: &dyn ProjectClassLoader,
        definition: &Arc<AspectDefinition>,
        bean: &Bean,
        target: &ResolvedType,
    ) -> Result<Option<Weaving>, MatchError> {
        let Some(expression) = definition.pointcut_expression.as_deref() else {
            trace!(definition = %definition.describe(), "no pointcut, never matches");
            return Ok(None);
        };
        let Some((source, params)) = advice_source(classes, definition)? else {
            trace!(definition = %definition.describe(), "advice method not found");
            return Ok(None);
        };
        let matcher = self.compiled(loader, definition, expression, &params)?;

        let proxy_target_class = definition.proxy_target_class;
        let candidates = public_methods(target, proxy_target_class);
        let mut targets = IndexSet::new();
        for name in bean.names() {
            let ctx = EvaluationContext::new(loader)
                .with_bean_name(name)
                .with_proxy_target_class(proxy_target_class);
            if !matcher.matches_class(&target.class.name, &ctx)? {
                continue;
            }
            for method in &candidates {
                if targets.contains(&JavaMember::of_method(method)) {
                    continue;
                }
                match method_matches(matcher.as_ref(), target, method, &ctx) {
                    Ok(true) => {
                        targets.insert(JavaMember::of_method(method));
                    }
                    Ok(false) => {}
                    Err(err) if err.is_member_local() => {
                        trace!(method = %method.display_name(), "skipping method: {err}");
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(Some(Weaving { source, targets }))
    }

    fn compiled(
        &self,
        loader: &dyn ProjectClassLoader,
        definition: &Arc<AspectDefinition>,
        expression: &str,
        params: &[SmolStr],
    ) -> Result<Arc<dyn PointcutMatcher>, MatchError> {
        let key = Arc::as_ptr(definition) as usize;
        if let Some(compiled) = self.compiled.lock().get(&key) {
            return Ok(compiled.matcher.clone());
        }
        let scope = DeclarationScope::for_advice(
            definition.aspect_class.clone(),
            params,
            &definition.arg_names,
            definition.returning.as_deref(),
            definition.throwing.as_deref(),
        );
        let matcher = self.compiler.compile(expression, &scope, loader)?;
        self.compiled.lock().insert(
            key,
            Compiled {
                _definition: definition.clone(),
                matcher: matcher.clone(),
            },
        );
        Ok(matcher)
    }

    /// Number of compiled pointcuts held.
    pub fn compiled_count(&self) -> usize {
        self.compiled.lock().len()
    }

    /// Number of shadow matches cached across all compiled pointcuts.
    pub fn cached_shadows(&self) -> usize {
        self.compiled
            .lock()
            .values()
            .map(|c| c.matcher.cached_shadows())
            .sum()
    }

    /// Release compiled pointcuts, their shadow caches and the type world
    /// entries of every loader this matcher used.
    pub fn close(&self) {
        let compiled: Vec<Compiled> = self.compiled.lock().drain().map(|(_, c)| c).collect();
        for entry in &compiled {
            entry.matcher.clear_cache();
        }
        let loaders: Vec<LoaderId> = self.loaders.lock().drain().collect();
        for loader in &loaders {
            reset_world(*loader);
        }
        if !compiled.is_empty() || !loaders.is_empty() {
            debug!(pointcuts = compiled.len(), loaders = loaders.len(), "closed definition matcher");
        }
    }
}

impl Drop for AspectDefinitionMatcher {
    fn drop(&mut self) {
        self.close();
    }
}

/// Public instance methods a proxy of `target` can intercept.
///
/// Interface proxies only intercept methods some interface declares. A class
/// without interfaces declaring methods is always proxied by subclassing.
fn public_methods(target: &ResolvedType, proxy_target_class: bool) -> Vec<JavaMethod> {
    let interface_proxy = !proxy_target_class && target.interfaces.iter().any(|i| !i.methods.is_empty());
    let mut seen: FxHashSet<(SmolStr, Vec<SmolStr>)> = FxHashSet::default();
    let mut out = Vec::new();
    for class in std::iter::once(&target.class).chain(target.superclasses.iter()) {
        if class.name == OBJECT {
            continue;
        }
        for method in &class.methods {
            if !method.is_public() || method.modifiers.is_static() {
                continue;
            }
            if !seen.insert((method.name.clone(), method.parameter_types.clone())) {
                continue;
            }
            if interface_proxy && target.interface_declarations(method).next().is_none() {
                continue;
            }
            out.push(method.clone());
        }
    }
    out
}

/// Evaluate the concrete method, then, for interface proxies, the interface
/// declarations it implements.
fn method_matches(
    matcher: &dyn PointcutMatcher,
    target: &ResolvedType,
    method: &JavaMethod,
    ctx: &EvaluationContext<'_>,
) -> Result<bool, MatchError> {
    if matcher.matches_method(&target.class.name, method, ctx)? {
        return Ok(true);
    }
    if ctx.proxy_target_class {
        return Ok(false);
    }
    for declared in target.interface_declarations(method) {
        if matcher.matches_method(&target.class.name, declared, ctx)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// The advice method of `definition` and its parameter types.
fn advice_source(
    classes: &ClassLoaderSupport,
    definition: &AspectDefinition,
) -> Result<Option<(JavaMember, Vec<SmolStr>)>, MatchError> {
    let Some(method_name) = definition.advice_method.as_deref() else {
        return Ok(None);
    };
    if definition.style == DefinitionStyle::Transactional {
        let source = JavaMember::Method {
            class: definition.aspect_class.clone(),
            name: SmolStr::new(method_name),
            params: definition.advice_params.clone(),
            anchor: None,
        };
        return Ok(Some((source, definition.advice_params.clone())));
    }

    let by_name_only = definition.style == DefinitionStyle::Xml && definition.advice_params.is_empty();
    let Some((declaring, method)) = find_method(classes, &definition.aspect_class, |m| {
        m.name == method_name && (by_name_only || m.types == definition.advice_params)
    })?
    else {
        return Ok(None);
    };
    let anchor = classes
        .load_class(&declaring)
        .ok()
        .and_then(|class| class.declared_method(&method.name, &method.types).and_then(|m| m.anchor.clone()));
    let source = JavaMember::Method {
        class: declaring,
        name: method.name.clone(),
        params: method.types.clone(),
        anchor,
    };
    Ok(Some((source, method.types)))
}

/// First method accepted by `accept` on `class_name` or its superclasses,
/// read from class files.
fn find_method(
    classes: &ClassLoaderSupport,
    class_name: &str,
    accept: impl Fn(&MemberMetadata) -> bool,
) -> Result<Option<(SmolStr, MemberMetadata)>, MatchError> {
    let mut next = Some(SmolStr::new(class_name));
    let mut visited = FxHashSet::default();
    while let Some(current) = next.take() {
        if current == OBJECT || !visited.insert(current.clone()) {
            break;
        }
        let Some(metadata) = classes.class_metadata(&current)? else {
            break;
        };
        if let Some(method) = metadata.methods.iter().find(|m| accept(m)) {
            return Ok(Some((current, method.clone())));
        }
        next = metadata.superclass.clone();
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::ProjectId;
    use crate::java::{Annotation, JavaClass, JavaField, StaticClassPath, hierarchy};
    use crate::model::AdviceKind;

    fn support(cp: StaticClassPath) -> ClassLoaderSupport {
        ClassLoaderSupport::new(ProjectId::new("app"), Arc::new(cp))
    }

    fn class_path() -> StaticClassPath {
        StaticClassPath::new()
            .with_class(JavaClass::new("com.acme.Logger").with_method(JavaMethod::new("log")))
            .with_class(JavaClass::interface("com.acme.Api").with_method(JavaMethod::new("call")))
            .with_class(
                JavaClass::new("com.acme.Service")
                    .implementing("com.acme.Api")
                    .with_method(JavaMethod::new("call"))
                    .with_method(JavaMethod::new("internal")),
            )
    }

    fn bean(id: &str, class: &str) -> Bean {
        let mut bean = Bean::new(id, class);
        bean.artifact = "app.xml".into();
        bean
    }

    fn advice(expression: &str) -> Arc<AspectDefinition> {
        Arc::new(
            AspectDefinition::advice(AdviceKind::Before, "logger", "com.acme.Logger", "log", "app.xml")
                .with_pointcut(expression),
        )
    }

    fn targets(weaving: Option<Weaving>) -> Vec<String> {
        weaving
            .map(|w| w.targets.iter().map(|t| t.to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_interface_proxy_only_sees_interface_methods() {
        let classes = support(class_path());
        let matcher = AspectDefinitionMatcher::new();
        let def = advice("execution(* com.acme.Service.*(..))");
        let found = matcher
            .matches(&classes, &def, &bean("service", "com.acme.Service"), "com.acme.Service")
            .unwrap();
        assert_eq!(targets(found), vec!["Service.call()"]);

        let ptc = Arc::new((*def).clone().with_proxy_target_class(true));
        let found = matcher
            .matches(&classes, &ptc, &bean("service", "com.acme.Service"), "com.acme.Service")
            .unwrap();
        assert_eq!(targets(found), vec!["Service.call()", "Service.internal()"]);
    }

    #[test]
    fn test_class_without_interfaces_is_proxied_by_subclassing() {
        let classes = support(class_path());
        let matcher = AspectDefinitionMatcher::new();
        let def = advice("execution(* com.acme.Logger.*(..))");
        let found = matcher
            .matches(&classes, &def, &bean("auditLogger", "com.acme.Logger"), "com.acme.Logger")
            .unwrap();
        assert_eq!(targets(found), vec!["Logger.log()"]);
    }

    #[test]
    fn test_interface_signature_fallback() {
        let classes = support(class_path());
        let matcher = AspectDefinitionMatcher::new();
        let def = advice("execution(* com.acme.Api.call())");
        let weaving = matcher
            .matches(&classes, &def, &bean("service", "com.acme.Service"), "com.acme.Service")
            .unwrap()
            .unwrap();
        assert_eq!(weaving.source.to_string(), "Logger.log()");
        assert_eq!(targets(Some(weaving)), vec!["Service.call()"]);
    }

    #[test]
    fn test_bean_designator_sees_aliases() {
        let classes = support(class_path());
        let matcher = AspectDefinitionMatcher::new();
        let def = advice("bean(api*)");
        let plain = bean("service", "com.acme.Service");
        assert!(targets(matcher.matches(&classes, &def, &plain, "com.acme.Service").unwrap()).is_empty());

        let aliased = plain.with_alias("apiService");
        assert_eq!(
            targets(matcher.matches(&classes, &def, &aliased, "com.acme.Service").unwrap()),
            vec!["Service.call()"]
        );
    }

    #[test]
    fn test_missing_advice_method_never_matches() {
        let classes = support(class_path());
        let matcher = AspectDefinitionMatcher::new();
        let def = Arc::new(
            AspectDefinition::advice(AdviceKind::Before, "logger", "com.acme.Logger", "nope", "app.xml")
                .with_pointcut("execution(* *(..))"),
        );
        let found = matcher
            .matches(&classes, &def, &bean("service", "com.acme.Service"), "com.acme.Service")
            .unwrap();
        assert_eq!(found, None);
        assert_eq!(matcher.compiled_count(), 0);
    }

    #[test]
    fn test_malformed_pointcut_is_reported() {
        let classes = support(class_path());
        let matcher = AspectDefinitionMatcher::new();
        let def = advice("execution(* com.acme.Service.*(..");
        let err = matcher
            .matches(&classes, &def, &bean("service", "com.acme.Service"), "com.acme.Service")
            .unwrap_err();
        assert!(matches!(err, MatchError::MalformedPointcut { .. }));
    }

    #[test]
    fn test_introductions_match_type_pattern() {
        let cp = class_path().with_class(
            JavaClass::new("com.acme.Mixins").with_field(
                JavaField::new("tracked", "com.acme.Tracked")
                    .annotated(Annotation::new("org.aspectj.lang.annotation.DeclareParents")),
            ),
        );
        let classes = support(cp);
        let matcher = AspectDefinitionMatcher::new();
        let def = Arc::new(
            AspectDefinition::introduction("com.acme.Serv*", "com.acme.Tracked", "mixins", "com.acme.Mixins", "app.xml")
                .declared_by_field("tracked"),
        );
        let weaving = matcher
            .matches(&classes, &def, &bean("service", "com.acme.Service"), "com.acme.Service")
            .unwrap()
            .unwrap();
        assert_eq!(weaving.source.to_string(), "Mixins.tracked");
        assert_eq!(targets(Some(weaving)), vec!["Service"]);

        let miss = matcher
            .matches(&classes, &def, &bean("logger2", "com.acme.Logger"), "com.acme.Logger")
            .unwrap()
            .unwrap();
        assert!(miss.is_empty());
    }

    #[test]
    fn test_close_releases_caches() {
        let cp = class_path();
        let loader = cp.id();
        let classes = support(cp);
        let matcher = AspectDefinitionMatcher::new();
        let def = advice("execution(* *(..))");
        matcher
            .matches(&classes, &def, &bean("service", "com.acme.Service"), "com.acme.Service")
            .unwrap();
        assert_eq!(matcher.compiled_count(), 1);
        assert!(matcher.cached_shadows() > 0);
        assert!(hierarchy::world_entries(loader) > 0);

        matcher.close();
        assert_eq!(matcher.compiled_count(), 0);
        assert_eq!(hierarchy::world_entries(loader), 0);
    }
}
