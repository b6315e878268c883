//! Java class model and project class loading.
//!
//! Two views of a class exist:
//! - [`JavaClass`]: the loaded class used for matching (modifiers, supertypes,
//!   declared methods).
//! - [`ClassMetadata`]: the class file as read without initializing the class,
//!   walked with a [`ClassVisitor`] during extraction.
//!
//! Both come from a [`ProjectClassLoader`] supplied by the host.

mod classpath;
pub mod hierarchy;
mod loader;
mod metadata;
mod model;

pub use classpath::{StaticClassPath, StaticLoaderFactory};
pub use hierarchy::{ResolvedType, reset_world};
pub use loader::{ClassLoaderFactory, ClassLoaderSupport, LoaderId, ProjectClassLoader};
pub use metadata::{ClassMetadata, ClassVisitor, MemberMetadata};
pub use model::{
    Annotation, AnnotationValue, JavaClass, JavaField, JavaMethod, Modifiers, PRIMITIVES,
    SourceAnchor, is_primitive, package_of, simple_name,
};

/// The root of every class hierarchy.
pub const OBJECT: &str = "java.lang.Object";
