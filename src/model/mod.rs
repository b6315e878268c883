//! Aspect definitions and the reference model they produce.

mod definition;
mod reference;

pub use definition::{AdviceKind, AspectDefinition, DefinitionStyle};
pub use reference::{AopProject, AopReference, JavaMember, ReferenceModel};
