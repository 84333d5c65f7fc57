use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::container::Container;
use crate::error::ContainerResult;
use crate::value::Value;

/// Signature of every callable value: it receives the container it is
/// resolved from, so it can look up sibling values.
pub type CallableFn = dyn Fn(&Container) -> ContainerResult<Value> + Send + Sync;

/// A named reference to a registered factory plus its plain-data arguments.
///
/// This is the serializable form of a callable; see
/// [`FactoryRegistry`](crate::registry::FactoryRegistry).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactoryRef {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// A shared callable value.
#[derive(Clone)]
pub struct Callable {
    func: Arc<CallableFn>,
    origin: Option<Arc<FactoryRef>>,
}

impl Callable {
    /// Wrap a fallible function.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Container) -> ContainerResult<Value> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            origin: None,
        }
    }

    /// Wrap an infallible function.
    pub fn from_fn<F, V>(func: F) -> Self
    where
        F: Fn(&Container) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self::new(move |c| Ok(func(c).into()))
    }

    pub(crate) fn with_origin(mut self, origin: FactoryRef) -> Self {
        self.origin = Some(Arc::new(origin));
        self
    }

    /// The registered factory this callable was built from, if any.
    pub fn origin(&self) -> Option<&FactoryRef> {
        self.origin.as_deref()
    }

    pub fn call(&self, container: &Container) -> ContainerResult<Value> {
        (self.func)(container)
    }

    /// Returns `true` if both handles share the same function.
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "Callable({})", origin.name),
            None => f.write_str("Callable(<closure>)"),
        }
    }
}
