use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;
use std::sync::Arc;

use crate::base::{ArtifactId, LineRange, ProjectId};

/// Name of the infrastructure bean registered by `<aop:aspectj-autoproxy/>`.
pub const AUTO_PROXY_CREATOR_BEAN_NAME: &str = "org.springframework.aop.config.internalAutoProxyCreator";

/// A property value of a bean definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Value(String),
    List(Vec<String>),
    Ref(SmolStr),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            PropertyValue::List(values) => Some(values),
            _ => None,
        }
    }
}

/// A configured component instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bean {
    pub id: SmolStr,
    pub aliases: Vec<SmolStr>,
    /// Declared class; `None` for child beans inheriting it from `parent`.
    pub class_name: Option<SmolStr>,
    pub parent: Option<SmolStr>,
    pub is_abstract: bool,
    /// Created through a factory method, so the object type is not the class.
    pub is_factory: bool,
    /// Not post-processed by the container (and therefore never proxied).
    pub is_synthetic: bool,
    /// Registered by the container itself rather than by the user.
    pub is_infrastructure: bool,
    pub artifact: ArtifactId,
    pub lines: LineRange,
    pub properties: IndexMap<SmolStr, PropertyValue>,
    pub inner_beans: Vec<Arc<Bean>>,
}

impl Bean {
    pub fn new(id: impl Into<SmolStr>, class_name: impl Into<SmolStr>) -> Self {
        Self {
            id: id.into(),
            aliases: Vec::new(),
            class_name: Some(class_name.into()),
            parent: None,
            is_abstract: false,
            is_factory: false,
            is_synthetic: false,
            is_infrastructure: false,
            artifact: ArtifactId::new(""),
            lines: LineRange::default(),
            properties: IndexMap::new(),
            inner_beans: Vec::new(),
        }
    }

    /// A child bean taking its class from `parent`.
    pub fn child(id: impl Into<SmolStr>, parent: impl Into<SmolStr>) -> Self {
        let mut bean = Self::new(id, "");
        bean.class_name = None;
        bean.parent = Some(parent.into());
        bean
    }

    pub fn with_alias(mut self, alias: impl Into<SmolStr>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn at_lines(mut self, start: u32, end: u32) -> Self {
        self.lines = LineRange::new(start, end);
        self
    }

    pub fn abstract_bean(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn factory(mut self) -> Self {
        self.is_factory = true;
        self
    }

    pub fn synthetic(mut self) -> Self {
        self.is_synthetic = true;
        self
    }

    pub fn infrastructure(mut self) -> Self {
        self.is_infrastructure = true;
        self
    }

    pub fn with_property(mut self, name: impl Into<SmolStr>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn with_inner_bean(mut self, bean: Bean) -> Self {
        self.inner_beans.push(Arc::new(bean));
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// The id followed by all aliases.
    pub fn names(&self) -> impl Iterator<Item = &SmolStr> {
        std::iter::once(&self.id).chain(self.aliases.iter())
    }

    pub fn start_line(&self) -> u32 {
        self.lines.start
    }

    /// Assign `artifact` to this bean and its inner beans.
    pub(crate) fn placed_in(mut self, artifact: &ArtifactId) -> Self {
        self.artifact = artifact.clone();
        self.inner_beans = self
            .inner_beans
            .into_iter()
            .map(|inner| Arc::new(Arc::unwrap_or_clone(inner).placed_in(artifact)))
            .collect();
        self
    }
}

/// Beans registered by one namespace element (e.g. `<aop:aspectj-autoproxy/>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: SmolStr,
    pub lines: LineRange,
    pub beans: Vec<Arc<Bean>>,
}

impl Component {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            lines: LineRange::default(),
            beans: Vec::new(),
        }
    }

    pub fn with_bean(mut self, bean: Bean) -> Self {
        self.beans.push(Arc::new(bean));
        self
    }
}

/// One beans configuration artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeansConfig {
    pub artifact: ArtifactId,
    pub project: ProjectId,
    /// Source text, when the artifact is an XML document.
    pub source: Option<Arc<str>>,
    pub beans: Vec<Arc<Bean>>,
    pub components: Vec<Component>,
    /// Artifacts pulled in with `<import resource=".."/>`.
    pub imports: Vec<ArtifactId>,
}

impl BeansConfig {
    pub fn new(artifact: impl Into<ArtifactId>, project: impl Into<ProjectId>) -> Self {
        Self {
            artifact: artifact.into(),
            project: project.into(),
            source: None,
            beans: Vec::new(),
            components: Vec::new(),
            imports: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_bean(mut self, bean: Bean) -> Self {
        self.beans.push(Arc::new(bean.placed_in(&self.artifact)));
        self
    }

    pub fn with_component(mut self, mut component: Component) -> Self {
        component.beans = component
            .beans
            .into_iter()
            .map(|bean| Arc::new(Arc::unwrap_or_clone(bean).placed_in(&self.artifact)))
            .collect();
        self.components.push(component);
        self
    }

    pub fn with_import(mut self, artifact: impl Into<ArtifactId>) -> Self {
        self.imports.push(artifact.into());
        self
    }

    /// Top-level beans, component beans and inner beans, depth first.
    pub fn all_beans(&self) -> Vec<Arc<Bean>> {
        fn walk(bean: &Arc<Bean>, out: &mut Vec<Arc<Bean>>) {
            out.push(bean.clone());
            for inner in &bean.inner_beans {
                walk(inner, out);
            }
        }
        let mut out = Vec::new();
        for bean in self
            .beans
            .iter()
            .chain(self.components.iter().flat_map(|c| c.beans.iter()))
        {
            walk(bean, &mut out);
        }
        out
    }

    /// A top-level or component bean by id or alias.
    pub fn bean(&self, name: &str) -> Option<&Arc<Bean>> {
        self.beans
            .iter()
            .chain(self.components.iter().flat_map(|c| c.beans.iter()))
            .find(|bean| bean.names().any(|n| n == name))
    }

    /// Effective class of `bean`, following `parent` definitions in this config.
    pub fn bean_class(&self, bean: &Bean) -> Option<SmolStr> {
        let mut current = bean;
        let mut seen = IndexSet::new();
        loop {
            if let Some(class_name) = current.class_name.as_ref().filter(|c| !c.is_empty()) {
                return Some(class_name.clone());
            }
            let parent = current.parent.as_ref()?;
            if !seen.insert(parent.clone()) {
                return None;
            }
            current = self.bean(parent)?;
        }
    }
}

/// A named group of configs forming one application context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSet {
    pub name: SmolStr,
    pub project: ProjectId,
    pub configs: IndexSet<ArtifactId>,
}

impl ConfigSet {
    pub fn new(name: impl Into<SmolStr>, project: impl Into<ProjectId>) -> Self {
        Self {
            name: name.into(),
            project: project.into(),
            configs: IndexSet::new(),
        }
    }

    pub fn with_config(mut self, artifact: impl Into<ArtifactId>) -> Self {
        self.configs.insert(artifact.into());
        self
    }

    pub fn contains(&self, artifact: &ArtifactId) -> bool {
        self.configs.contains(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beans_are_placed_in_config_artifact() {
        let config = BeansConfig::new("/p/app.xml", "p").with_bean(
            Bean::new("outer", "com.acme.Outer").with_inner_bean(Bean::new("inner", "com.acme.Inner")),
        );
        assert_eq!(config.beans[0].artifact.as_str(), "/p/app.xml");
        assert_eq!(config.beans[0].inner_beans[0].artifact.as_str(), "/p/app.xml");
        assert_eq!(config.all_beans().len(), 2);
    }

    #[test]
    fn test_bean_class_follows_parent() {
        let config = BeansConfig::new("/p/app.xml", "p")
            .with_bean(Bean::new("base", "com.acme.Base").abstract_bean())
            .with_bean(Bean::child("child", "base"))
            .with_bean(Bean::child("loop", "loop"));
        let child = config.bean("child").unwrap();
        assert_eq!(config.bean_class(child).as_deref(), Some("com.acme.Base"));
        let looping = config.bean("loop").unwrap();
        assert_eq!(config.bean_class(looping), None);
    }

    #[test]
    fn test_bean_lookup_by_alias() {
        let config = BeansConfig::new("/p/app.xml", "p")
            .with_bean(Bean::new("svc", "com.acme.Service").with_alias("service"));
        assert_eq!(config.bean("service").unwrap().id, "svc");
    }
}
