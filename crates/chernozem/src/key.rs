//! Container keys.
//!
//! Callers address entries with a [`KeyInput`]: an integer, a string, an
//! object reference, or `Null` (append). The container normalizes the input
//! into a [`Key`]; object references become an [`ObjectToken`] issued by the
//! container's identity table, so they can never collide with string or
//! integer keys.

use std::fmt;

use crate::error::{ContainerError, ContainerResult};
use crate::object::Object;
use crate::value::Value;

/// Identity token standing in for an object reference used as a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectToken(u64);

impl ObjectToken {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw token number.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// A normalized key, as stored in the container.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Str(String),
    Object(ObjectToken),
}

impl Key {
    /// The integer value, for integer keys.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The string value, for string keys.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` for keys derived from an object reference.
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => f.write_str(s),
            Self::Object(token) => write!(f, "{token}"),
        }
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// A key as supplied by a caller, before normalization.
#[derive(Clone, Copy, Debug)]
pub enum KeyInput<'a> {
    /// No key: append under the next integer index.
    Null,
    Int(i64),
    Str(&'a str),
    Object(&'a Object),
    /// A token previously issued by the same container.
    Token(ObjectToken),
}

impl<'a> KeyInput<'a> {
    /// Interpret a dynamic value as a key.
    ///
    /// Only `Null`, integers, strings and objects can act as keys.
    pub fn from_value(value: &'a Value) -> ContainerResult<Self> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Int(i) => Ok(Self::Int(*i)),
            Value::String(s) => Ok(Self::Str(s)),
            Value::Object(o) => Ok(Self::Object(o)),
            other => Err(ContainerError::InvalidKey {
                reason: format!("{} values cannot be used as keys", other.kind()),
            }),
        }
    }

    /// Human-readable form for error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Int(i) => i.to_string(),
            Self::Str(s) => (*s).to_string(),
            Self::Object(o) => format!("object {}", o.short_name()),
            Self::Token(token) => token.to_string(),
        }
    }
}

impl From<i64> for KeyInput<'_> {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for KeyInput<'_> {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl<'a> From<&'a str> for KeyInput<'a> {
    fn from(s: &'a str) -> Self {
        Self::Str(s)
    }
}

impl<'a> From<&'a String> for KeyInput<'a> {
    fn from(s: &'a String) -> Self {
        Self::Str(s)
    }
}

impl<'a> From<&'a Object> for KeyInput<'a> {
    fn from(o: &'a Object) -> Self {
        Self::Object(o)
    }
}

impl<'a> From<&'a Key> for KeyInput<'a> {
    fn from(key: &'a Key) -> Self {
        match key {
            Key::Int(i) => Self::Int(*i),
            Key::Str(s) => Self::Str(s),
            Key::Object(token) => Self::Token(*token),
        }
    }
}

impl<'a, T: Into<KeyInput<'a>>> From<Option<T>> for KeyInput<'a> {
    fn from(key: Option<T>) -> Self {
        key.map_or(Self::Null, Into::into)
    }
}
