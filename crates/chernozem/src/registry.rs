//! Named factories.
//!
//! A container cannot persist arbitrary closures. Callables that must
//! survive a [`Snapshot`](crate::Snapshot) are built from a
//! [`FactoryRegistry`] instead: each carries the factory name and the
//! plain-data arguments it was bound with, and restoring looks the name up
//! again.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::callable::{Callable, FactoryRef};
use crate::container::Container;
use crate::error::{ContainerError, ContainerResult};
use crate::value::Value;

/// A registered factory: receives the resolving container and its bound
/// arguments.
pub type FactoryFn = dyn Fn(&Container, &serde_json::Value) -> ContainerResult<Value> + Send + Sync;

#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, Arc<FactoryFn>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a unique name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> ContainerResult<()>
    where
        F: Fn(&Container, &serde_json::Value) -> ContainerResult<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(ContainerError::DuplicateFactory { name });
        }
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Bind a factory to its arguments, producing a serializable callable.
    pub fn callable(&self, name: &str, args: serde_json::Value) -> ContainerResult<Callable> {
        let factory = self
            .factories
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::UnknownFactory {
                name: name.to_string(),
            })?;
        let bound = args.clone();
        Ok(Callable::new(move |container| factory(container, &bound)).with_origin(FactoryRef {
            name: name.to_string(),
            args,
        }))
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("factories", &self.names())
            .finish()
    }
}
