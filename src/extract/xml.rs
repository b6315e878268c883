//! `<aop:config>` aspects and advisors.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::{trace, warn};

use super::{AspectDefinitionExtractor, ExtractionContext};
use crate::error::{ExtractError, MatchError};
use crate::java::hierarchy;
use crate::model::{AdviceKind, AspectDefinition, DefinitionStyle};
use crate::xml::{AOP_NAMESPACE, XmlElement, parse_document};

/// Advice interfaces an advisor bean may implement, with the kind, method and
/// parameter types each contributes.
pub const ADVISOR_INTERFACES: &[(&str, AdviceKind, &str, &[&str])] = &[
    (
        "org.aopalliance.intercept.MethodInterceptor",
        AdviceKind::Around,
        "invoke",
        &["org.aopalliance.intercept.MethodInvocation"],
    ),
    (
        "org.springframework.aop.MethodBeforeAdvice",
        AdviceKind::Before,
        "before",
        &["java.lang.reflect.Method", "java.lang.Object[]", "java.lang.Object"],
    ),
    (
        "org.springframework.aop.ThrowsAdvice",
        AdviceKind::AfterThrowing,
        "afterThrowing",
        &[
            "java.lang.reflect.Method",
            "java.lang.Object[]",
            "java.lang.Object",
            "java.lang.Exception",
        ],
    ),
    (
        "org.springframework.aop.AfterReturningAdvice",
        AdviceKind::AfterReturning,
        "afterReturning",
        &[
            "java.lang.Object",
            "java.lang.reflect.Method",
            "java.lang.Object[]",
            "java.lang.Object",
        ],
    ),
];

/// Extracts definitions declared inside `<aop:config>` blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlAspectExtractor;

impl AspectDefinitionExtractor for XmlAspectExtractor {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Vec<AspectDefinition>, ExtractError> {
        let Some(source) = ctx.config.source.as_deref() else {
            return Ok(Vec::new());
        };
        let root = parse_document(source)?;

        let mut definitions = Vec::new();
        for config in std::iter::once(&root)
            .chain(root.descendants())
            .filter(|e| e.is(AOP_NAMESPACE, "config"))
        {
            definitions.extend(ConfigBlock::new(ctx, config).definitions());
        }
        Ok(definitions)
    }
}

/// Named pointcuts declared directly below `parent`.
fn named_pointcuts(parent: &XmlElement) -> FxHashMap<&str, &str> {
    parent
        .children_named(AOP_NAMESPACE, "pointcut")
        .filter_map(|p| Some((p.attr("id")?, p.attr("expression")?)))
        .collect()
}

/// One `<aop:config>` element.
struct ConfigBlock<'c, 'a> {
    ctx: &'c ExtractionContext<'a>,
    element: &'c XmlElement,
    pointcuts: FxHashMap<&'c str, &'c str>,
}

impl<'c, 'a> ConfigBlock<'c, 'a> {
    fn new(ctx: &'c ExtractionContext<'a>, element: &'c XmlElement) -> Self {
        Self {
            ctx,
            element,
            pointcuts: named_pointcuts(element),
        }
    }

    fn definitions(&self) -> Vec<AspectDefinition> {
        let mut out = Vec::new();
        for child in &self.element.children {
            if child.is(AOP_NAMESPACE, "aspect") {
                out.extend(self.aspect(child));
            } else if child.is(AOP_NAMESPACE, "advisor") {
                match self.advisor(child) {
                    Ok(found) => out.extend(found),
                    Err(err) => warn!(
                        artifact = %self.ctx.config.artifact,
                        line = child.start_line(),
                        "skipping advisor: {err}"
                    ),
                }
            }
        }

        let proxy_target_class = self.element.attr("proxy-target-class") == Some("true");
        for definition in &mut out {
            definition.resource = self.ctx.config.artifact.clone();
            if proxy_target_class {
                definition.proxy_target_class = true;
            }
            trace!("[AOP_MODEL] xml definition {}", definition.describe());
        }
        out
    }

    /// Inline `pointcut`, else `pointcut-ref` looked up in `local` then in the
    /// config block.
    fn pointcut(&self, element: &XmlElement, local: &FxHashMap<&str, &str>) -> Option<String> {
        if let Some(expression) = element.attr("pointcut") {
            return Some(expression.to_string());
        }
        let reference = element.attr("pointcut-ref")?;
        local
            .get(reference)
            .map(|expression| expression.to_string())
            .or_else(|| self.pointcuts.get(reference).map(|expression| expression.to_string()))
    }

    fn aspect(&self, aspect: &XmlElement) -> Vec<AspectDefinition> {
        let Some(bean_ref) = aspect.attr("ref") else {
            return Vec::new();
        };
        let Some(class_name) = self.ctx.bean_class(bean_ref) else {
            trace!(bean = bean_ref, "aspect bean has no class");
            return Vec::new();
        };
        let local = named_pointcuts(aspect);

        let mut out = Vec::new();
        for child in &aspect.children {
            if child.namespace.as_deref() != Some(AOP_NAMESPACE) {
                continue;
            }
            let definition = match AdviceKind::from_keyword(&child.local_name) {
                Some(AdviceKind::DeclareParents) => {
                    let (Some(types), Some(interface), Some(default_impl)) = (
                        child.attr("types-matching"),
                        child.attr("implement-interface"),
                        child.attr("default-impl"),
                    ) else {
                        continue;
                    };
                    AspectDefinition::introduction(
                        types,
                        interface,
                        bean_ref,
                        default_impl,
                        self.ctx.config.artifact.clone(),
                    )
                }
                Some(kind) => {
                    let mut definition = AspectDefinition::advice(
                        kind,
                        bean_ref,
                        class_name.clone(),
                        child.attr("method").unwrap_or_default(),
                        self.ctx.config.artifact.clone(),
                    )
                    .with_arg_names(comma_list(child.attr("arg-names")));
                    if let Some(expression) = self.pointcut(child, &local) {
                        definition = definition.with_pointcut(expression);
                    }
                    match (kind, child.attr("returning"), child.attr("throwing")) {
                        (AdviceKind::AfterReturning, Some(returning), _) => {
                            definition = definition.with_returning(returning);
                        }
                        (AdviceKind::AfterThrowing, _, Some(throwing)) => {
                            definition = definition.with_throwing(throwing);
                        }
                        _ => {}
                    }
                    definition
                }
                None => continue,
            };
            out.push(definition.with_lines(child.lines));
        }
        out
    }

    fn advisor(&self, advisor: &XmlElement) -> Result<Vec<AspectDefinition>, ExtractError> {
        let Some(bean_ref) = advisor.attr("advice-ref") else {
            return Ok(Vec::new());
        };
        let Some(class_name) = self.ctx.bean_class(bean_ref) else {
            return Ok(Vec::new());
        };
        let resolved = self
            .ctx
            .classes
            .execute_callback(|loader| hierarchy::resolve(loader, &class_name))
            .map_err(|source: MatchError| ExtractError::Class {
                class_name: class_name.to_string(),
                source,
            })?;
        let pointcut = self.pointcut(advisor, &FxHashMap::default());

        Ok(ADVISOR_INTERFACES
            .iter()
            .filter(|(interface, ..)| resolved.is_assignable_to(interface))
            .map(|(_, kind, method, params)| {
                let mut definition = AspectDefinition::advice(
                    *kind,
                    bean_ref,
                    class_name.clone(),
                    *method,
                    self.ctx.config.artifact.clone(),
                )
                .with_style(DefinitionStyle::XmlAdvisor)
                .with_params(params.iter().copied())
                .with_lines(advisor.lines);
                if let Some(expression) = &pointcut {
                    definition = definition.with_pointcut(expression.clone());
                }
                definition
            })
            .collect())
    }
}

fn comma_list(value: Option<&str>) -> Vec<SmolStr> {
    value
        .map(|names| {
            names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(SmolStr::new)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{LineRange, ProjectId};
    use crate::beans::{BeansConfig, BeansModel, StaticBeansModel};
    use crate::config::BuildConfig;
    use crate::java::{ClassLoaderSupport, JavaClass, StaticClassPath};
    use std::sync::Arc;

    const AOP_HEADER: &str = r#"<beans xmlns="http://www.springframework.org/schema/beans"
       xmlns:aop="http://www.springframework.org/schema/aop">"#;

    fn extract(body: &str, cp: StaticClassPath) -> Vec<AspectDefinition> {
        let source = format!("{AOP_HEADER}\n{body}\n</beans>");
        let model = StaticBeansModel::new().with_xml_config("app.xml", "app", &source).unwrap();
        let config: Arc<BeansConfig> = model.config(&"app.xml".into()).unwrap();
        let classes = ClassLoaderSupport::new(ProjectId::new("app"), Arc::new(cp));
        let settings = BuildConfig::default();
        let ctx = ExtractionContext::new(config, &model, &classes, &settings);
        XmlAspectExtractor.extract(&ctx).unwrap()
    }

    #[test]
    fn test_before_advice_with_inline_pointcut() {
        let defs = extract(
            r#"<bean id="logger" class="com.acme.Logger"/>
<aop:config>
  <aop:aspect ref="logger">
    <aop:before method="log" pointcut="execution(* com.acme.Service.*(..))"/>
  </aop:aspect>
</aop:config>"#,
            StaticClassPath::new(),
        );
        assert_eq!(defs.len(), 1);
        let def = &defs[0];
        assert_eq!(def.kind, AdviceKind::Before);
        assert_eq!(def.aspect_class, "com.acme.Logger");
        assert_eq!(def.aspect_name, "logger");
        assert_eq!(def.advice_method.as_deref(), Some("log"));
        assert_eq!(def.pointcut_expression.as_deref(), Some("execution(* com.acme.Service.*(..))"));
        assert_eq!(def.resource.as_str(), "app.xml");
        assert_eq!(def.lines, LineRange::line(6));
        assert!(!def.proxy_target_class);
    }

    #[test]
    fn test_pointcut_refs_resolve_locally_then_globally() {
        let defs = extract(
            r#"<bean id="logger" class="com.acme.Logger"/>
<aop:config proxy-target-class="true">
  <aop:pointcut id="shared" expression="execution(* *(..))"/>
  <aop:aspect ref="logger">
    <aop:pointcut id="shared" expression="within(com.acme..*)"/>
    <aop:after-returning method="done" pointcut-ref="shared" returning="result"/>
    <aop:after-throwing method="failed" pointcut-ref="missing" throwing="ex"/>
  </aop:aspect>
  <aop:aspect ref="logger">
    <aop:around method="time" pointcut-ref="shared" arg-names="jp, ctx"/>
  </aop:aspect>
</aop:config>"#,
            StaticClassPath::new(),
        );
        assert_eq!(defs.len(), 3);
        assert_eq!(defs[0].pointcut_expression.as_deref(), Some("within(com.acme..*)"));
        assert_eq!(defs[0].returning.as_deref(), Some("result"));
        assert_eq!(defs[1].pointcut_expression, None);
        assert_eq!(defs[1].throwing.as_deref(), Some("ex"));
        assert_eq!(defs[2].pointcut_expression.as_deref(), Some("execution(* *(..))"));
        assert_eq!(defs[2].arg_names, vec![SmolStr::new("jp"), SmolStr::new("ctx")]);
        assert!(defs.iter().all(|d| d.proxy_target_class));
    }

    #[test]
    fn test_declare_parents_requires_all_attributes() {
        let defs = extract(
            r#"<bean id="mixins" class="com.acme.Mixins"/>
<aop:config>
  <aop:aspect ref="mixins">
    <aop:declare-parents types-matching="com.acme.*+" implement-interface="com.acme.Tracked"
        default-impl="com.acme.TrackedImpl"/>
    <aop:declare-parents types-matching="com.acme.*+" implement-interface="com.acme.Other"/>
  </aop:aspect>
</aop:config>"#,
            StaticClassPath::new(),
        );
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].kind, AdviceKind::DeclareParents);
        assert_eq!(defs[0].aspect_class, "com.acme.TrackedImpl");
        assert_eq!(defs[0].introduced_interface.as_deref(), Some("com.acme.Tracked"));
        assert_eq!(defs[0].type_pattern.as_deref(), Some("com.acme.*+"));
    }

    #[test]
    fn test_aspect_without_bean_class_is_skipped() {
        let defs = extract(
            r#"<aop:config>
  <aop:aspect ref="nowhere">
    <aop:before method="log" pointcut="execution(* *(..))"/>
  </aop:aspect>
</aop:config>"#,
            StaticClassPath::new(),
        );
        assert!(defs.is_empty());
    }

    #[test]
    fn test_advisor_yields_one_definition_per_interface() {
        let cp = StaticClassPath::new()
            .with_class(JavaClass::interface("org.aopalliance.intercept.MethodInterceptor"))
            .with_class(JavaClass::interface("org.springframework.aop.MethodBeforeAdvice"))
            .with_class(
                JavaClass::new("com.acme.TxAdvice")
                    .implementing("org.aopalliance.intercept.MethodInterceptor")
                    .implementing("org.springframework.aop.MethodBeforeAdvice"),
            );
        let defs = extract(
            r#"<bean id="txAdvice" class="com.acme.TxAdvice"/>
<bean id="broken" class="com.acme.Missing"/>
<aop:config>
  <aop:pointcut id="services" expression="execution(* com.acme..*(..))"/>
  <aop:advisor advice-ref="txAdvice" pointcut-ref="services"/>
  <aop:advisor advice-ref="broken" pointcut-ref="services"/>
</aop:config>"#,
            cp,
        );
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].kind, AdviceKind::Around);
        assert_eq!(defs[0].advice_method.as_deref(), Some("invoke"));
        assert_eq!(defs[1].kind, AdviceKind::Before);
        assert_eq!(defs[1].advice_params.len(), 3);
        assert!(defs.iter().all(|d| d.style == DefinitionStyle::XmlAdvisor));
        assert!(defs.iter().all(|d| d.pointcut_expression.as_deref() == Some("execution(* com.acme..*(..))")));
    }
}
