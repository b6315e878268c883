//! Bytecode-level class information.
//!
//! [`ClassMetadata`] is what a class reader produces without initializing the
//! class: access flags, supertypes and annotations of the class and its declared
//! members. Extraction walks it with a [`ClassVisitor`].

use smol_str::SmolStr;

use super::model::{Annotation, JavaClass, Modifiers};

/// A declared method or field as seen in the class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberMetadata {
    pub name: SmolStr,
    pub access: Modifiers,
    /// Parameter types for methods, the field type for fields.
    pub types: Vec<SmolStr>,
    pub annotations: Vec<Annotation>,
}

impl MemberMetadata {
    pub fn annotation(&self, type_name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.type_name == type_name)
    }
}

/// Structural view of one class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMetadata {
    pub name: SmolStr,
    pub access: Modifiers,
    pub superclass: Option<SmolStr>,
    pub interfaces: Vec<SmolStr>,
    pub annotations: Vec<Annotation>,
    pub methods: Vec<MemberMetadata>,
    pub fields: Vec<MemberMetadata>,
}

impl ClassMetadata {
    /// Walk the class: header, class annotations, fields, methods, end.
    pub fn accept<V: ClassVisitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit(
            &self.name,
            self.access,
            self.superclass.as_deref(),
            &self.interfaces,
        );
        for annotation in &self.annotations {
            visitor.visit_annotation(annotation);
        }
        for field in &self.fields {
            visitor.visit_field(field);
        }
        for method in &self.methods {
            visitor.visit_method(method);
        }
        visitor.visit_end();
    }

    pub fn annotation(&self, type_name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.type_name == type_name)
    }

    pub fn has_annotation(&self, type_name: &str) -> bool {
        self.annotation(type_name).is_some()
    }
}

impl From<&JavaClass> for ClassMetadata {
    fn from(class: &JavaClass) -> Self {
        let superclass = match &class.superclass {
            Some(name) => Some(name.clone()),
            None if class.is_interface() || class.name == super::OBJECT => None,
            None => Some(SmolStr::new_static(super::OBJECT)),
        };
        Self {
            name: class.name.clone(),
            access: class.modifiers,
            superclass,
            interfaces: class.interfaces.clone(),
            annotations: class.annotations.clone(),
            methods: class
                .methods
                .iter()
                .map(|m| MemberMetadata {
                    name: m.name.clone(),
                    access: m.modifiers,
                    types: m.parameter_types.clone(),
                    annotations: m.annotations.clone(),
                })
                .collect(),
            fields: class
                .fields
                .iter()
                .map(|f| MemberMetadata {
                    name: f.name.clone(),
                    access: f.modifiers,
                    types: vec![f.field_type.clone()],
                    annotations: f.annotations.clone(),
                })
                .collect(),
        }
    }
}

/// Visitor over [`ClassMetadata`]. All callbacks default to no-ops.
pub trait ClassVisitor {
    fn visit(
        &mut self,
        _name: &str,
        _access: Modifiers,
        _superclass: Option<&str>,
        _interfaces: &[SmolStr],
    ) {
    }

    fn visit_annotation(&mut self, _annotation: &Annotation) {}

    fn visit_field(&mut self, _field: &MemberMetadata) {}

    fn visit_method(&mut self, _method: &MemberMetadata) {}

    fn visit_end(&mut self) {}
}
