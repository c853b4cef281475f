//! # Name → factory table.
//!
//! [`RuntimeRegistry`] stands in for dynamic lookup of a runtime implementation
//! by name. Names are case-sensitive; registering a name twice replaces the
//! previous factory.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::PeaError;

use super::runtime::{RuntimeFactory, RuntimeRef};

/// Registered runtime implementations.
#[derive(Clone, Default)]
pub struct RuntimeRegistry {
    factories: HashMap<String, RuntimeRef>,
}

impl RuntimeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under its own name.
    pub fn register(&mut self, factory: impl RuntimeFactory) -> &mut Self {
        self.register_as(factory.name().to_string(), Arc::new(factory))
    }

    /// Registers `factory` under `name`, which may differ from the factory's own.
    pub fn register_as(&mut self, name: impl Into<String>, factory: RuntimeRef) -> &mut Self {
        let name = name.into();
        if self.factories.insert(name.clone(), factory).is_some() {
            tracing::debug!(runtime = %name, "runtime factory replaced");
        }
        self
    }

    /// Looks up a factory.
    pub fn get(&self, name: &str) -> Result<RuntimeRef, PeaError> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| PeaError::Configuration {
                runtime: name.to_string(),
            })
    }

    /// Returns the sorted list of registered names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for RuntimeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeRegistry")
            .field("names", &self.names())
            .finish()
    }
}
