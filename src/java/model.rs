//! Runtime view of loaded classes.
//!
//! These types are what the project class loader hands back when a class is
//! "loaded" for matching. They carry declared members only; inherited members
//! are reached through [`super::hierarchy`].

use indexmap::IndexMap;
use smol_str::SmolStr;
use std::fmt;

use crate::base::ArtifactId;

/// JVM access flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(u16);

impl Modifiers {
    pub const PUBLIC: Modifiers = Modifiers(0x0001);
    pub const PRIVATE: Modifiers = Modifiers(0x0002);
    pub const PROTECTED: Modifiers = Modifiers(0x0004);
    pub const STATIC: Modifiers = Modifiers(0x0008);
    pub const FINAL: Modifiers = Modifiers(0x0010);
    pub const SYNCHRONIZED: Modifiers = Modifiers(0x0020);
    pub const INTERFACE: Modifiers = Modifiers(0x0200);
    pub const ABSTRACT: Modifiers = Modifiers(0x0400);
    pub const SYNTHETIC: Modifiers = Modifiers(0x1000);
    pub const ANNOTATION: Modifiers = Modifiers(0x2000);

    pub const fn empty() -> Self {
        Modifiers(0)
    }

    pub const fn from_bits(bits: u16) -> Self {
        Modifiers(bits)
    }

    pub const fn bits(&self) -> u16 {
        self.0
    }

    pub const fn contains(&self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Modifiers) -> Self {
        Modifiers(self.0 | other.0)
    }

    pub fn is_public(&self) -> bool {
        self.contains(Self::PUBLIC)
    }

    pub fn is_final(&self) -> bool {
        self.contains(Self::FINAL)
    }

    pub fn is_abstract(&self) -> bool {
        self.contains(Self::ABSTRACT)
    }

    pub fn is_static(&self) -> bool {
        self.contains(Self::STATIC)
    }

    pub fn is_interface(&self) -> bool {
        self.contains(Self::INTERFACE)
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        self.union(rhs)
    }
}

/// Value of an annotation attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnnotationValue {
    Str(SmolStr),
    List(Vec<SmolStr>),
}

impl AnnotationValue {
    /// The value as a single string; lists yield their first element.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::Str(value) => Some(value.as_str()),
            AnnotationValue::List(values) => values.first().map(|v| v.as_str()),
        }
    }

    /// The value as a list; single strings yield a one-element list.
    pub fn to_list(&self) -> Vec<SmolStr> {
        match self {
            AnnotationValue::Str(value) => vec![value.clone()],
            AnnotationValue::List(values) => values.clone(),
        }
    }
}

/// A runtime-visible annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Fully qualified annotation type name.
    pub type_name: SmolStr,
    pub values: IndexMap<SmolStr, AnnotationValue>,
}

impl Annotation {
    pub fn new(type_name: impl Into<SmolStr>) -> Self {
        Self {
            type_name: type_name.into(),
            values: IndexMap::new(),
        }
    }

    /// Set a string attribute.
    pub fn with(mut self, key: &str, value: impl Into<SmolStr>) -> Self {
        self.values
            .insert(SmolStr::new(key), AnnotationValue::Str(value.into()));
        self
    }

    /// Set a list attribute.
    pub fn with_list<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.values
            .insert(SmolStr::new(key), AnnotationValue::List(values));
        self
    }

    pub fn get(&self, key: &str) -> Option<&AnnotationValue> {
        self.values.get(key)
    }

    /// String attribute, treating empty strings as absent.
    pub fn string(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(AnnotationValue::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Where a class or member is declared in source, when known.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceAnchor {
    pub resource: ArtifactId,
    pub line: u32,
}

impl SourceAnchor {
    pub fn new(resource: impl Into<ArtifactId>, line: u32) -> Self {
        Self {
            resource: resource.into(),
            line,
        }
    }
}

/// A declared method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaMethod {
    pub name: SmolStr,
    pub declaring_class: SmolStr,
    pub parameter_types: Vec<SmolStr>,
    pub return_type: SmolStr,
    pub exception_types: Vec<SmolStr>,
    pub modifiers: Modifiers,
    pub annotations: Vec<Annotation>,
    pub anchor: Option<SourceAnchor>,
}

impl JavaMethod {
    /// A public `void` method without parameters.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            declaring_class: SmolStr::default(),
            parameter_types: Vec::new(),
            return_type: SmolStr::new_static("void"),
            exception_types: Vec::new(),
            modifiers: Modifiers::PUBLIC,
            annotations: Vec::new(),
            anchor: None,
        }
    }

    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.parameter_types = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn returning(mut self, return_type: impl Into<SmolStr>) -> Self {
        self.return_type = return_type.into();
        self
    }

    pub fn throwing(mut self, exception: impl Into<SmolStr>) -> Self {
        self.exception_types.push(exception.into());
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn at(mut self, anchor: SourceAnchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn is_public(&self) -> bool {
        self.modifiers.is_public()
    }

    pub fn annotation(&self, type_name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.type_name == type_name)
    }

    /// Name and parameter types, ignoring the declaring class.
    pub fn has_signature(&self, name: &str, params: &[SmolStr]) -> bool {
        self.name == name && self.parameter_types == params
    }

    /// `Type.name(params)` form used in logs and marker messages.
    pub fn display_name(&self) -> String {
        format!(
            "{}.{}({})",
            simple_name(&self.declaring_class),
            self.name,
            self.parameter_types
                .iter()
                .map(|p| simple_name(p))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

/// A declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaField {
    pub name: SmolStr,
    pub declaring_class: SmolStr,
    pub field_type: SmolStr,
    pub modifiers: Modifiers,
    pub annotations: Vec<Annotation>,
    pub anchor: Option<SourceAnchor>,
}

impl JavaField {
    pub fn new(name: impl Into<SmolStr>, field_type: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            declaring_class: SmolStr::default(),
            field_type: field_type.into(),
            modifiers: Modifiers::PUBLIC | Modifiers::STATIC,
            annotations: Vec::new(),
            anchor: None,
        }
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn at(mut self, anchor: SourceAnchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn annotation(&self, type_name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.type_name == type_name)
    }
}

/// A loaded class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaClass {
    /// Binary name, e.g. `com.acme.Service` or `com.acme.Outer$Inner`.
    pub name: SmolStr,
    pub modifiers: Modifiers,
    /// `None` for `java.lang.Object` and interfaces.
    pub superclass: Option<SmolStr>,
    pub interfaces: Vec<SmolStr>,
    pub annotations: Vec<Annotation>,
    pub methods: Vec<JavaMethod>,
    pub fields: Vec<JavaField>,
    pub anchor: Option<SourceAnchor>,
}

impl JavaClass {
    /// A public concrete class without supertypes other than `java.lang.Object`.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            modifiers: Modifiers::PUBLIC,
            superclass: None,
            interfaces: Vec::new(),
            annotations: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            anchor: None,
        }
    }

    /// A public interface.
    pub fn interface(name: impl Into<SmolStr>) -> Self {
        let mut class = Self::new(name);
        class.modifiers = Modifiers::PUBLIC | Modifiers::INTERFACE | Modifiers::ABSTRACT;
        class
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn extending(mut self, superclass: impl Into<SmolStr>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn implementing(mut self, interface: impl Into<SmolStr>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Add a declared method; its declaring class is set to this class.
    pub fn with_method(mut self, mut method: JavaMethod) -> Self {
        method.declaring_class = self.name.clone();
        if self.modifiers.is_interface() && !method.modifiers.is_static() {
            method.modifiers = method.modifiers | Modifiers::ABSTRACT;
        }
        self.methods.push(method);
        self
    }

    /// Add a declared field; its declaring class is set to this class.
    pub fn with_field(mut self, mut field: JavaField) -> Self {
        field.declaring_class = self.name.clone();
        self.fields.push(field);
        self
    }

    pub fn at(mut self, anchor: SourceAnchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn is_interface(&self) -> bool {
        self.modifiers.is_interface()
    }

    pub fn is_final(&self) -> bool {
        self.modifiers.is_final()
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract()
    }

    pub fn annotation(&self, type_name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.type_name == type_name)
    }

    pub fn has_annotation(&self, type_name: &str) -> bool {
        self.annotation(type_name).is_some()
    }

    /// Declared methods with the given name.
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a JavaMethod> {
        self.methods.iter().filter(move |m| m.name == name)
    }

    pub fn declared_method(&self, name: &str, params: &[SmolStr]) -> Option<&JavaMethod> {
        self.methods.iter().find(|m| m.has_signature(name, params))
    }

    pub fn declared_field(&self, name: &str) -> Option<&JavaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Package part of the binary name (empty for the default package).
    pub fn package(&self) -> &str {
        package_of(&self.name)
    }
}

impl fmt::Display for JavaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Package part of a binary class name.
pub fn package_of(name: &str) -> &str {
    name.rfind('.').map(|idx| &name[..idx]).unwrap_or("")
}

/// Last segment of a binary class name.
pub fn simple_name(name: &str) -> &str {
    let name = name.rsplit('.').next().unwrap_or(name);
    name.rsplit('$').next().unwrap_or(name)
}

/// Primitive type names, including `void`.
pub const PRIMITIVES: &[&str] = &[
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

pub fn is_primitive(name: &str) -> bool {
    PRIMITIVES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(package_of("com.acme.Service"), "com.acme");
        assert_eq!(package_of("Service"), "");
        assert_eq!(simple_name("com.acme.Outer$Inner"), "Inner");
        assert_eq!(simple_name("int"), "int");
    }

    #[test]
    fn test_interface_methods_are_abstract() {
        let iface = JavaClass::interface("com.acme.Api").with_method(JavaMethod::new("call"));
        assert!(iface.methods[0].modifiers.is_abstract());
        assert_eq!(iface.methods[0].declaring_class, "com.acme.Api");
    }

    #[test]
    fn test_method_display_name() {
        let method = JavaMethod::new("transfer").with_params(["java.lang.String", "long"]);
        let class = JavaClass::new("com.acme.Bank").with_method(method);
        assert_eq!(class.methods[0].display_name(), "Bank.transfer(String, long)");
    }
}
