//! Type hints: per-key constraints on accepted value kinds.
//!
//! A key may carry several hints; a value is accepted if it matches *any*
//! of them. Descriptors parse from the usual lowercase kind names (with
//! aliases); anything else, including capitalized names such as `String`,
//! names an object type, tested by instance-of.

use std::any::TypeId;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ContainerError;
use crate::value::Value;

/// A single accepted-kind descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TypeHint {
    Int,
    Float,
    /// Integer, float, or numeric string.
    Numeric,
    NumericString,
    Bool,
    String,
    /// Bool, integer, float or string.
    Scalar,
    /// Ordered sequence or mapping.
    Array,
    Object,
    Callable,
    Null,
    /// An object of a given type or interface.
    ///
    /// With a `type_id` the test is exact; otherwise the name is compared
    /// against the object's type names and declared interfaces.
    Instance {
        name: String,
        type_id: Option<TypeId>,
    },
}

impl TypeHint {
    /// Hint matching objects whose concrete type is `T`.
    pub fn instance_of<T: 'static>() -> Self {
        Self::Instance {
            name: std::any::type_name::<T>().to_string(),
            type_id: Some(TypeId::of::<T>()),
        }
    }

    /// Hint matching objects by type or interface name.
    pub fn instance(name: impl Into<String>) -> Self {
        Self::Instance {
            name: name.into(),
            type_id: None,
        }
    }

    /// Returns `true` if `value` satisfies this descriptor.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Int => matches!(value, Value::Int(_)),
            Self::Float => matches!(value, Value::Float(_)),
            Self::Numeric => match value {
                Value::Int(_) | Value::Float(_) => true,
                Value::String(s) => is_numeric_str(s),
                _ => false,
            },
            Self::NumericString => value.as_str().is_some_and(is_numeric_str),
            Self::Bool => matches!(value, Value::Bool(_)),
            Self::String => matches!(value, Value::String(_)),
            Self::Scalar => matches!(
                value,
                Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
            ),
            Self::Array => matches!(value, Value::List(_) | Value::Map(_)),
            Self::Object => matches!(value, Value::Object(_)),
            Self::Callable => matches!(value, Value::Callable(_)),
            Self::Null => value.is_null(),
            Self::Instance { name, type_id } => match value {
                Value::Object(o) => match type_id {
                    Some(id) => o.type_id() == *id,
                    None => o.is_instance_of(name),
                },
                _ => false,
            },
        }
    }
}

/// Returns `true` if `value` satisfies at least one hint.
pub fn matches_any(hints: &[TypeHint], value: &Value) -> bool {
    hints.iter().any(|h| h.matches(value))
}

/// Comma-separated descriptor list, for error messages.
pub fn describe(hints: &[TypeHint]) -> String {
    hints
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Decimal or exponent notation with optional sign and surrounding spaces.
fn is_numeric_str(s: &str) -> bool {
    let t = s.trim();
    !t.is_empty()
        && t.bytes().any(|b| b.is_ascii_digit())
        && t.bytes().all(|b| b.is_ascii_digit() || b"+-.eE".contains(&b))
        && t.parse::<f64>().is_ok()
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Numeric => "numeric",
            Self::NumericString => "numeric-string",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Scalar => "scalar",
            Self::Array => "array",
            Self::Object => "object",
            Self::Callable => "callable",
            Self::Null => "null",
            Self::Instance { name, .. } => name,
        };
        f.write_str(name)
    }
}

impl FromStr for TypeHint {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let descriptor = s.trim();
        let hint = match descriptor {
            "" => {
                return Err(ContainerError::InvalidTypeHint {
                    descriptor: s.to_string(),
                })
            }
            "int" | "integer" | "long" => Self::Int,
            "float" | "double" | "real" => Self::Float,
            "numeric" => Self::Numeric,
            "numeric-string" | "numeric_string" => Self::NumericString,
            "bool" | "boolean" => Self::Bool,
            "string" => Self::String,
            "scalar" => Self::Scalar,
            "array" | "list" | "map" => Self::Array,
            "object" => Self::Object,
            "callable" | "closure" => Self::Callable,
            "null" => Self::Null,
            _ => Self::instance(descriptor),
        };
        Ok(hint)
    }
}

impl From<TypeHint> for String {
    fn from(hint: TypeHint) -> Self {
        hint.to_string()
    }
}

impl TryFrom<String> for TypeHint {
    type Error = ContainerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
