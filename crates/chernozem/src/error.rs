use crate::key::Key;
use crate::value::ValueKind;

/// Errors from container operations.
///
/// Every failing operation leaves the container exactly as it was before the
/// call: no partial storage, no partially applied inflectors.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// The key is the empty string or a value that cannot act as a key.
    #[error("invalid key: {reason}")]
    InvalidKey { reason: String },

    /// A write or delete targeted a locked key.
    #[error("'{key}' value is locked")]
    Locked { key: Key },

    /// The value matched none of the type hints registered for the key.
    #[error("'{key}' value doesn't match predefined types (expected {expected}, got {actual})")]
    TypeConstraint {
        key: Key,
        /// Comma-separated descriptor list, as registered.
        expected: String,
        actual: ValueKind,
    },

    /// A type descriptor could not be parsed.
    #[error("invalid type hint: {descriptor:?}")]
    InvalidTypeHint { descriptor: String },

    /// Read of an absent key on a non-nullable container.
    #[error("'{key}' value not found")]
    KeyNotFound { key: String },

    /// Only callables can be promoted to services.
    #[error("'{key}' value must be callable to be set as a service, got {actual}")]
    NotCallable { key: Key, actual: ValueKind },

    /// A service factory asked for its own value while being evaluated.
    #[error("circular service resolution for '{key}'")]
    CircularService { key: Key },

    /// An inflector refused the value.
    #[error("'{key}' value rejected: {reason}")]
    Rejected { key: Key, reason: String },

    /// An inflector was configured with unusable parameters.
    #[error("invalid inflector: {reason}")]
    InvalidInflector { reason: String },

    /// A snapshot references a factory name the registry does not know.
    #[error("unknown factory: {name}")]
    UnknownFactory { name: String },

    /// A factory name was registered twice.
    #[error("factory already registered: {name}")]
    DuplicateFactory { name: String },

    /// The entry cannot be represented in a snapshot.
    #[error("'{key}' cannot be serialized: {reason}")]
    Unserializable { key: String, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ContainerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;
