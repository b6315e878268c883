//! Aspect definitions.

use smol_str::SmolStr;
use std::fmt;

use crate::base::{ArtifactId, LineRange};

/// What a definition contributes at a join point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdviceKind {
    Before,
    After,
    AfterReturning,
    AfterThrowing,
    Around,
    /// An introduction (`declare-parents`).
    DeclareParents,
}

impl AdviceKind {
    pub fn is_introduction(self) -> bool {
        self == AdviceKind::DeclareParents
    }

    /// Keyword used in configuration files.
    pub fn keyword(self) -> &'static str {
        match self {
            AdviceKind::Before => "before",
            AdviceKind::After => "after",
            AdviceKind::AfterReturning => "after-returning",
            AdviceKind::AfterThrowing => "after-throwing",
            AdviceKind::Around => "around",
            AdviceKind::DeclareParents => "declare-parents",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "before" => AdviceKind::Before,
            "after" => AdviceKind::After,
            "after-returning" => AdviceKind::AfterReturning,
            "after-throwing" => AdviceKind::AfterThrowing,
            "around" => AdviceKind::Around,
            "declare-parents" => AdviceKind::DeclareParents,
            _ => return None,
        })
    }
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// How a definition was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionStyle {
    /// `<aop:aspect>` children.
    Xml,
    /// `<aop:advisor>`.
    XmlAdvisor,
    /// `@Aspect` classes.
    Annotation,
    /// Synthesized for `<tx:annotation-driven/>`.
    Transactional,
}

/// One advice or introduction, normalised across declaration styles.
///
/// Definitions are immutable once extracted and shared as `Arc`s; the
/// matcher caches compiled pointcuts per `Arc` instance, so two equal
/// definitions from different builds never share a compiled pointcut.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AspectDefinition {
    pub kind: AdviceKind,
    pub style: DefinitionStyle,
    /// `None` for introductions, and for advice whose `pointcut-ref` did not
    /// resolve; such advice never matches.
    pub pointcut_expression: Option<String>,
    /// Type pattern of an introduction.
    pub type_pattern: Option<String>,
    /// Interface added by an introduction.
    pub introduced_interface: Option<SmolStr>,
    /// Field carrying `@DeclareParents`, for annotation-style introductions.
    pub defining_field: Option<SmolStr>,
    pub aspect_class: SmolStr,
    pub advice_method: Option<SmolStr>,
    pub advice_params: Vec<SmolStr>,
    /// Id of the bean backing the aspect.
    pub aspect_name: SmolStr,
    pub resource: ArtifactId,
    pub lines: LineRange,
    pub proxy_target_class: bool,
    pub arg_names: Vec<SmolStr>,
    pub returning: Option<SmolStr>,
    pub throwing: Option<SmolStr>,
}

impl AspectDefinition {
    /// An advice definition.
    pub fn advice(
        kind: AdviceKind,
        aspect_name: impl Into<SmolStr>,
        aspect_class: impl Into<SmolStr>,
        advice_method: impl Into<SmolStr>,
        resource: impl Into<ArtifactId>,
    ) -> Self {
        Self {
            kind,
            style: DefinitionStyle::Xml,
            pointcut_expression: None,
            type_pattern: None,
            introduced_interface: None,
            defining_field: None,
            aspect_class: aspect_class.into(),
            advice_method: Some(advice_method.into()),
            advice_params: Vec::new(),
            aspect_name: aspect_name.into(),
            resource: resource.into(),
            lines: LineRange::default(),
            proxy_target_class: false,
            arg_names: Vec::new(),
            returning: None,
            throwing: None,
        }
    }

    /// An introduction of `interface` into types matching `type_pattern`.
    pub fn introduction(
        type_pattern: impl Into<String>,
        interface: impl Into<SmolStr>,
        aspect_name: impl Into<SmolStr>,
        aspect_class: impl Into<SmolStr>,
        resource: impl Into<ArtifactId>,
    ) -> Self {
        Self {
            kind: AdviceKind::DeclareParents,
            style: DefinitionStyle::Xml,
            pointcut_expression: None,
            type_pattern: Some(type_pattern.into()),
            introduced_interface: Some(interface.into()),
            defining_field: None,
            aspect_class: aspect_class.into(),
            advice_method: None,
            advice_params: Vec::new(),
            aspect_name: aspect_name.into(),
            resource: resource.into(),
            lines: LineRange::default(),
            proxy_target_class: false,
            arg_names: Vec::new(),
            returning: None,
            throwing: None,
        }
    }

    pub fn with_style(mut self, style: DefinitionStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_pointcut(mut self, expression: impl Into<String>) -> Self {
        self.pointcut_expression = Some(expression.into());
        self
    }

    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.advice_params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_lines(mut self, lines: LineRange) -> Self {
        self.lines = lines;
        self
    }

    pub fn with_proxy_target_class(mut self, proxy_target_class: bool) -> Self {
        self.proxy_target_class = proxy_target_class;
        self
    }

    pub fn with_arg_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.arg_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_returning(mut self, name: impl Into<SmolStr>) -> Self {
        self.returning = Some(name.into());
        self
    }

    pub fn with_throwing(mut self, name: impl Into<SmolStr>) -> Self {
        self.throwing = Some(name.into());
        self
    }

    pub fn declared_by_field(mut self, field: impl Into<SmolStr>) -> Self {
        self.defining_field = Some(field.into());
        self
    }

    pub fn start_line(&self) -> u32 {
        self.lines.start
    }

    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match (&self.advice_method, &self.pointcut_expression, &self.type_pattern) {
            (_, _, Some(pattern)) if self.kind.is_introduction() => format!(
                "{} {} -> {} [{}]",
                self.kind,
                pattern,
                self.introduced_interface.as_deref().unwrap_or("?"),
                self.aspect_name
            ),
            (Some(method), expression, _) => format!(
                "{} {}.{} '{}' [{}]",
                self.kind,
                self.aspect_class,
                method,
                expression.as_deref().unwrap_or(""),
                self.aspect_name
            ),
            _ => format!("{} {} [{}]", self.kind, self.aspect_class, self.aspect_name),
        }
    }
}
