use std::collections::BTreeMap;

use tracing::debug;

use crate::declared::DeclaredAction;
use crate::descriptor::{ActionDescriptor, PassThroughAction};

/// Resolves action names to descriptors.
pub trait ActionRegistry: Send + Sync {
    /// The descriptor registered under `name`, if any.
    fn resolve(&self, name: &str) -> Option<&dyn ActionDescriptor>;

    /// Like [`resolve`](Self::resolve), falling back to a descriptor that
    /// creates and deletes nothing.
    fn resolve_or_pass_through(&self, name: &str) -> &dyn ActionDescriptor {
        match self.resolve(name) {
            Some(descriptor) => descriptor,
            None => {
                debug!(action = name, "unknown action, treating as pass-through");
                PassThroughAction::shared()
            }
        }
    }
}

/// Registry backed by an in-process map.
#[derive(Default)]
pub struct StaticActionRegistry {
    descriptors: BTreeMap<String, Box<dyn ActionDescriptor>>,
}

impl StaticActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the common column actions.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for name in ["uppercase", "lowercase", "negate", "trim"] {
            registry.register(DeclaredAction::column_op(name));
        }
        registry.register(DeclaredAction::copy());
        registry.register(DeclaredAction::split());
        registry.register(DeclaredAction::extract_url_tokens());
        registry.register(DeclaredAction::delete_column());
        registry.register(DeclaredAction::rename_column());
        registry
    }

    /// Register a descriptor, replacing any previous one with the same name.
    pub fn register(&mut self, descriptor: impl ActionDescriptor + 'static) {
        self.descriptors
            .insert(descriptor.name().to_string(), Box::new(descriptor));
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl ActionRegistry for StaticActionRegistry {
    fn resolve(&self, name: &str) -> Option<&dyn ActionDescriptor> {
        self.descriptors.get(name).map(|d| d.as_ref())
    }
}

impl std::fmt::Debug for StaticActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticActionRegistry")
            .field("actions", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
