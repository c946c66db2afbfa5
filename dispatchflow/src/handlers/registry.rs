//! Handler registry: resolves handler names to descriptors.

use super::HandlerDescriptor;
use crate::errors::RegistryError;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves a handler name to its descriptor.
///
/// Lookups happen on every dispatch and must not block concurrent lookups.
#[cfg_attr(test, mockall::automock)]
pub trait HandlerRegistry: Send + Sync {
    /// Returns the descriptor for `name`, or `None` if nothing matches.
    fn lookup(&self, name: &str) -> Option<Arc<HandlerDescriptor>>;
}

/// In-memory registry with exact names, aliases and regex patterns.
///
/// Resolution order: exact name, then alias, then the first matching pattern
/// in registration order.
#[derive(Default)]
pub struct InMemoryHandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<HandlerDescriptor>>>,
    aliases: RwLock<HashMap<String, String>>,
    patterns: RwLock<Vec<(Regex, String)>>,
}

impl InMemoryHandlerRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its own name, returning any handler it replaced.
    pub fn register(&self, descriptor: HandlerDescriptor) -> Option<Arc<HandlerDescriptor>> {
        let name = descriptor.name().to_string();
        self.handlers.write().insert(name, Arc::new(descriptor))
    }

    /// Registers an alternative name for an already registered handler.
    pub fn register_alias(
        &self,
        alias: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let alias = alias.into();
        let target = target.into();
        if !self.handlers.read().contains_key(&target) {
            return Err(RegistryError::UnknownTarget { alias, target });
        }
        self.aliases.write().insert(alias, target);
        Ok(())
    }

    /// Registers a regex that resolves matching names to `target`.
    ///
    /// The pattern is anchored, so `tool\..*` matches `tool.search` but not `my.tool.search`.
    pub fn register_pattern(
        &self,
        pattern: &str,
        target: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let target = target.into();
        if !self.handlers.read().contains_key(&target) {
            return Err(RegistryError::UnknownTarget {
                alias: pattern.to_string(),
                target,
            });
        }
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            RegistryError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.patterns.write().push((regex, target));
        Ok(())
    }

    /// Removes a handler. Aliases and patterns pointing at it stop resolving.
    pub fn unregister(&self, name: &str) -> Option<Arc<HandlerDescriptor>> {
        self.handlers.write().remove(name)
    }

    /// Returns true if `name` resolves to a handler.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Lists registered handler names, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Returns true if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    fn resolve(&self, name: &str) -> Option<Arc<HandlerDescriptor>> {
        let handlers = self.handlers.read();
        if let Some(descriptor) = handlers.get(name) {
            return Some(Arc::clone(descriptor));
        }

        if let Some(target) = self.aliases.read().get(name) {
            return handlers.get(target).cloned();
        }

        self.patterns
            .read()
            .iter()
            .find(|(regex, _)| regex.is_match(name))
            .and_then(|(_, target)| handlers.get(target).cloned())
    }
}

impl HandlerRegistry for InMemoryHandlerRegistry {
    fn lookup(&self, name: &str) -> Option<Arc<HandlerDescriptor>> {
        self.resolve(name)
    }
}

impl std::fmt::Debug for InMemoryHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryHandlerRegistry")
            .field("handler_count", &self.handlers.read().len())
            .field("alias_count", &self.aliases.read().len())
            .field("pattern_count", &self.patterns.read().len())
            .finish()
    }
}
