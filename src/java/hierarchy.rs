//! Type hierarchy queries.
//!
//! Resolved hierarchies are kept in a process-wide type world keyed by
//! (loader, class name). Entries of a loader must be dropped with
//! [`reset_world`] once that loader is no longer used, otherwise they live for
//! the lifetime of the process.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use std::collections::VecDeque;
use std::sync::Arc;

use super::OBJECT;
use super::loader::{LoaderId, ProjectClassLoader};
use super::model::{JavaClass, JavaMethod};
use crate::error::MatchError;

/// A class together with all of its supertypes.
#[derive(Debug)]
pub struct ResolvedType {
    pub class: Arc<JavaClass>,
    /// Superclass chain, nearest first, excluding `java.lang.Object`.
    pub superclasses: Vec<Arc<JavaClass>>,
    /// Every interface implemented directly or indirectly.
    pub interfaces: Vec<Arc<JavaClass>>,
}

impl ResolvedType {
    /// Whether a value of this type can be assigned to `type_name`.
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        type_name == OBJECT
            || self.class.name == type_name
            || self.superclasses.iter().any(|c| c.name == type_name)
            || self.interfaces.iter().any(|c| c.name == type_name)
    }

    /// The class, its superclasses and its interfaces.
    pub fn all_types(&self) -> impl Iterator<Item = &Arc<JavaClass>> {
        std::iter::once(&self.class)
            .chain(self.superclasses.iter())
            .chain(self.interfaces.iter())
    }

    /// Methods declared on any implemented interface.
    pub fn interface_methods(&self) -> impl Iterator<Item = &JavaMethod> {
        self.interfaces.iter().flat_map(|i| i.methods.iter())
    }

    /// The implementation of `method` closest to this class: the first method
    /// with the same name and parameter types on the class or its superclasses.
    pub fn most_specific_method(&self, method: &JavaMethod) -> Option<&JavaMethod> {
        std::iter::once(&self.class)
            .chain(self.superclasses.iter())
            .find_map(|c| c.declared_method(&method.name, &method.parameter_types))
            .filter(|m| !m.modifiers.is_abstract())
    }

    /// Interface methods whose most specific implementation here is `method`.
    pub fn interface_declarations<'a>(
        &'a self,
        method: &'a JavaMethod,
    ) -> impl Iterator<Item = &'a JavaMethod> + 'a {
        self.interface_methods()
            .filter(move |im| self.most_specific_method(im) == Some(method))
    }
}

type WorldKey = (LoaderId, SmolStr);

static WORLD: Lazy<RwLock<FxHashMap<WorldKey, Arc<ResolvedType>>>> =
    Lazy::new(|| RwLock::new(FxHashMap::default()));

/// Resolve `name` and its supertypes through `loader`.
pub fn resolve(loader: &dyn ProjectClassLoader, name: &str) -> Result<Arc<ResolvedType>, MatchError> {
    let key = (loader.id(), SmolStr::new(name));
    if let Some(resolved) = WORLD.read().get(&key) {
        return Ok(resolved.clone());
    }

    let class = loader.load_class(name)?;
    let mut superclasses = Vec::new();
    let mut next = class.superclass.clone();
    while let Some(super_name) = next.take() {
        if super_name == OBJECT {
            break;
        }
        let superclass = loader.load_class(&super_name)?;
        next = superclass.superclass.clone();
        superclasses.push(superclass);
    }

    let mut interfaces = Vec::new();
    let mut seen = FxHashSet::default();
    let mut queue: VecDeque<SmolStr> = std::iter::once(&class)
        .chain(superclasses.iter())
        .flat_map(|c| c.interfaces.iter().cloned())
        .collect();
    while let Some(iface_name) = queue.pop_front() {
        if !seen.insert(iface_name.clone()) {
            continue;
        }
        let iface = loader.load_class(&iface_name)?;
        queue.extend(iface.interfaces.iter().cloned());
        interfaces.push(iface);
    }

    let resolved = Arc::new(ResolvedType {
        class,
        superclasses,
        interfaces,
    });
    WORLD.write().insert(key, resolved.clone());
    Ok(resolved)
}

/// Whether class `name` is assignable to `type_name`.
pub fn is_assignable(
    loader: &dyn ProjectClassLoader,
    name: &str,
    type_name: &str,
) -> Result<bool, MatchError> {
    Ok(resolve(loader, name)?.is_assignable_to(type_name))
}

/// Drop every type world entry resolved through `loader`.
pub fn reset_world(loader: LoaderId) {
    WORLD.write().retain(|(id, _), _| *id != loader);
}

/// Number of type world entries resolved through `loader`.
pub fn world_entries(loader: LoaderId) -> usize {
    WORLD.read().keys().filter(|(id, _)| *id == loader).count()
}
