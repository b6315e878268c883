//! Reading bean definitions from XML configuration sources.

use indexmap::IndexMap;
use smol_str::SmolStr;
use std::sync::Arc;
use tracing::trace;

use super::model::{AUTO_PROXY_CREATOR_BEAN_NAME, Bean, BeansConfig, Component, PropertyValue};
use crate::base::{ArtifactId, ProjectId};
use crate::error::ExtractError;
use crate::xml::{AOP_NAMESPACE, BEANS_NAMESPACE, XmlElement, parse_document};

const AUTO_PROXY_CREATOR_CLASS: &str =
    "org.springframework.aop.aspectj.annotation.AnnotationAwareAspectJAutoProxyCreator";

/// Read a `<beans>` document into a [`BeansConfig`] that keeps `source`.
pub fn read_beans_config(
    artifact: impl Into<ArtifactId>,
    project: impl Into<ProjectId>,
    source: &str,
) -> Result<BeansConfig, ExtractError> {
    let root = parse_document(source)?;
    let mut config = BeansConfig::new(artifact, project).with_source(source);
    let mut reader = BeanReader::default();
    let mut aliases: Vec<(SmolStr, SmolStr)> = Vec::new();

    for element in &root.children {
        if element.is(BEANS_NAMESPACE, "bean") {
            let bean = reader.read_bean(element, false);
            config = config.with_bean(bean);
        } else if element.is(BEANS_NAMESPACE, "alias") {
            if let (Some(name), Some(alias)) = (element.attr("name"), element.attr("alias")) {
                aliases.push((SmolStr::new(name), SmolStr::new(alias)));
            }
        } else if element.is(BEANS_NAMESPACE, "import") {
            if let Some(resource) = element.attr("resource") {
                let imported = config.artifact.resolve(resource);
                config = config.with_import(imported);
            }
        } else if element.is(AOP_NAMESPACE, "aspectj-autoproxy") {
            config = config.with_component(autoproxy_component(element));
        }
    }

    for (name, alias) in aliases {
        if let Some(bean) = config.beans.iter_mut().find(|b| b.id == name) {
            Arc::make_mut(bean).aliases.push(alias);
        }
    }

    trace!(
        artifact = %config.artifact,
        beans = config.beans.len(),
        imports = config.imports.len(),
        "read beans config"
    );
    Ok(config)
}

#[derive(Default)]
struct BeanReader {
    anonymous: usize,
}

impl BeanReader {
    fn read_bean(&mut self, element: &XmlElement, inner: bool) -> Bean {
        let class_name = element.attr("class").map(SmolStr::new);
        let mut names: Vec<SmolStr> = element
            .attr("name")
            .map(|names| {
                names
                    .split([',', ';', ' '])
                    .filter(|n| !n.is_empty())
                    .map(SmolStr::new)
                    .collect()
            })
            .unwrap_or_default();

        let id = match element.attr("id") {
            Some(id) => SmolStr::new(id),
            None if !names.is_empty() => names.remove(0),
            None => {
                let prefix = class_name
                    .clone()
                    .or_else(|| element.attr("parent").map(|p| SmolStr::new(format!("{p}$child"))))
                    .unwrap_or_else(|| SmolStr::new_static("(inner bean)"));
                let id = SmolStr::new(format!("{}#{}", prefix, self.anonymous));
                self.anonymous += 1;
                id
            }
        };
        names.retain(|n| *n != id);

        let mut bean = Bean::new(id, "");
        bean.class_name = class_name;
        bean.parent = element.attr("parent").map(SmolStr::new);
        bean.aliases = names;
        bean.is_abstract = element.attr("abstract") == Some("true");
        bean.is_factory = element.has_attr("factory-method") || element.has_attr("factory-bean");
        bean.lines = element.lines;
        bean.properties = read_properties(element);

        for nested in nested_beans(element) {
            let inner_bean = self.read_bean(nested, true);
            bean.inner_beans.push(Arc::new(inner_bean));
        }
        if inner {
            trace!(id = %bean.id, "read inner bean");
        }
        bean
    }
}

/// `<bean>` elements nested below `element`, not crossing another bean.
fn nested_beans(element: &XmlElement) -> Vec<&XmlElement> {
    let mut out = Vec::new();
    let mut stack: Vec<&XmlElement> = element.children.iter().rev().collect();
    while let Some(child) = stack.pop() {
        if child.is(BEANS_NAMESPACE, "bean") {
            out.push(child);
        } else {
            stack.extend(child.children.iter().rev());
        }
    }
    out
}

fn read_properties(element: &XmlElement) -> IndexMap<SmolStr, PropertyValue> {
    let mut properties = IndexMap::new();
    for property in element.children_named(BEANS_NAMESPACE, "property") {
        let Some(name) = property.attr("name") else {
            continue;
        };
        let value = if let Some(value) = property.attributes.get("value") {
            Some(PropertyValue::Value(value.clone()))
        } else if let Some(reference) = property.attr("ref") {
            Some(PropertyValue::Ref(SmolStr::new(reference)))
        } else {
            property_child_value(property)
        };
        if let Some(value) = value {
            properties.insert(SmolStr::new(name), value);
        }
    }
    properties
}

fn property_child_value(property: &XmlElement) -> Option<PropertyValue> {
    let child = property.children.first()?;
    if child.is(BEANS_NAMESPACE, "value") {
        Some(PropertyValue::Value(child.text.clone()))
    } else if child.is(BEANS_NAMESPACE, "list") || child.is(BEANS_NAMESPACE, "set") {
        Some(PropertyValue::List(
            child
                .children_named(BEANS_NAMESPACE, "value")
                .map(|v| v.text.clone())
                .collect(),
        ))
    } else if child.is(BEANS_NAMESPACE, "ref") {
        child.attr("bean").map(|b| PropertyValue::Ref(SmolStr::new(b)))
    } else {
        None
    }
}

/// The infrastructure bean `<aop:aspectj-autoproxy/>` registers.
fn autoproxy_component(element: &XmlElement) -> Component {
    let mut bean = Bean::new(AUTO_PROXY_CREATOR_BEAN_NAME, AUTO_PROXY_CREATOR_CLASS)
        .infrastructure()
        .at_lines(element.lines.start, element.lines.end);

    if element.attr("proxy-target-class") == Some("true") {
        bean = bean.with_property("proxyTargetClass", PropertyValue::Value("true".to_string()));
    }
    let includes: Vec<&XmlElement> = element.children_named(AOP_NAMESPACE, "include").collect();
    if !includes.is_empty() {
        let patterns = includes
            .iter()
            .filter_map(|include| include.attr("name"))
            .map(str::to_string)
            .collect();
        bean = bean.with_property("includePatterns", PropertyValue::List(patterns));
    }

    let mut component = Component::new("aspectj-autoproxy").with_bean(bean);
    component.lines = element.lines;
    component
}
