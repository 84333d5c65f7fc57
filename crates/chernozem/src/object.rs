use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Weak};

/// An opaque shared object stored in, or used as a key of, a container.
///
/// Cloning an `Object` clones the reference, not the underlying value: all
/// clones share one identity. Besides its concrete Rust type, an object can
/// declare interface names it satisfies, which type hints test against.
#[derive(Clone)]
pub struct Object {
    inner: Arc<dyn Any + Send + Sync>,
    meta: Arc<ObjectMeta>,
}

#[derive(Clone, Debug)]
struct ObjectMeta {
    type_name: &'static str,
    type_id: TypeId,
    interfaces: Vec<String>,
}

impl Object {
    /// Wrap a value into a new object with a fresh identity.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an existing shared value. The object's identity is the `Arc`'s.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            meta: Arc::new(ObjectMeta {
                type_name: std::any::type_name::<T>(),
                type_id: TypeId::of::<T>(),
                interfaces: Vec::new(),
            }),
        }
    }

    /// Declare an interface name this object satisfies.
    pub fn implementing(mut self, interface: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.meta).interfaces.push(interface.into());
        self
    }

    /// Fully qualified Rust type name of the wrapped value.
    pub fn type_name(&self) -> &'static str {
        self.meta.type_name
    }

    /// Type name without module path or generic arguments.
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.meta.type_name)
    }

    /// Declared interface names.
    pub fn interfaces(&self) -> &[String] {
        &self.meta.interfaces
    }

    /// Returns `true` if the wrapped value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.meta.type_id == TypeId::of::<T>()
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.meta.type_id
    }

    /// Borrow the wrapped value as a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Get a shared handle on the wrapped value as a `T`.
    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    /// Instance-of test by name.
    ///
    /// Matches the full type name, the short type name, or any declared
    /// interface name.
    pub fn is_instance_of(&self, name: &str) -> bool {
        self.meta.type_name == name
            || self.short_name() == name
            || self.meta.interfaces.iter().any(|i| i == name)
    }

    /// Returns `true` if both objects are the same reference.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        self.addr() == other.addr()
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<dyn Any + Send + Sync> {
        Arc::downgrade(&self.inner)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({}@{:#x})", self.short_name(), self.addr())
    }
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
