//! Chernozem: an ordered key → value container for dependency injection.
//!
//! A [`Container`] stores heterogeneous [`Value`]s under integer, string or
//! object keys and keeps them in insertion order. Around that plain mapping
//! it layers per-key behavior:
//!
//! - **Locks** make a key immutable, including its first write.
//! - **Type hints** restrict which kinds of value a key accepts.
//! - **Inflectors** transform values on the way in or out.
//! - **Services** turn a stored [`Callable`] into a lazily evaluated value,
//!   either shared (evaluated once) or a factory (evaluated on every read).
//!
//! # Modules
//!
//! - [`key`] -- [`Key`] normalization and [`KeyInput`] conversions
//! - [`value`] -- the dynamic [`Value`] and its [`OrderedMap`]
//! - [`object`] -- type-erased shared references ([`Object`])
//! - [`callable`] -- [`Callable`] values invoked with the container
//! - [`hint`] -- [`TypeHint`] descriptors and matching
//! - [`inflect`] -- ready-made inflectors
//! - [`container`] -- the [`Container`] itself
//! - [`registry`] -- named factories for callables that must be persisted
//! - [`snapshot`] -- serializable [`Snapshot`]s of a container
//!
//! # Example
//!
//! ```
//! use chernozem::{Callable, Container, Value};
//!
//! let mut c = Container::new();
//! c.set("host", "localhost")?;
//! c.set("url", Callable::new(|c| {
//!     let host = c.get("host")?;
//!     Ok(Value::from(format!("http://{}", host.as_str().unwrap_or_default())))
//! }))?;
//! c.mark_as_service("url")?;
//! c.lock("host")?;
//!
//! assert_eq!(c.get("url")?, Value::from("http://localhost"));
//! assert!(c.set("host", "example.org").is_err());
//! # Ok::<(), chernozem::ContainerError>(())
//! ```

pub mod callable;
pub mod config;
pub mod container;
pub mod error;
pub mod hint;
pub mod identity;
pub mod inflect;
pub mod key;
pub mod object;
pub mod registry;
pub mod snapshot;
pub mod value;

pub use callable::{Callable, CallableFn, FactoryRef};
pub use config::ContainerConfig;
pub use container::{Container, Iter, Lifetime};
pub use error::{ContainerError, ContainerResult};
pub use hint::TypeHint;
pub use identity::IdentityTable;
pub use inflect::Inflector;
pub use key::{Key, KeyInput, ObjectToken};
pub use object::Object;
pub use registry::{FactoryFn, FactoryRegistry};
pub use snapshot::{Snapshot, SnapshotEntry, SnapshotKey, SnapshotValue, SNAPSHOT_VERSION};
pub use value::{OrderedMap, Value, ValueKind};
