//! The dynamic value model held by containers.

use std::fmt;

use crate::callable::Callable;
use crate::container::Container;
use crate::error::{ContainerError, ContainerResult};
use crate::key::Key;
use crate::object::Object;

/// A value stored in a container.
///
/// Nested containers are plain [`Object`]s wrapping a [`Container`].
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(OrderedMap),
    Object(Object),
    Callable(Callable),
}

/// Runtime kind of a [`Value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    String,
    List,
    Map,
    Object,
    Callable,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::List => "list",
            Self::Map => "map",
            Self::Object => "object",
            Self::Callable => "callable",
        };
        f.write_str(name)
    }
}

impl Value {
    /// Wrap any shareable value into an object value.
    pub fn object<T: std::any::Any + Send + Sync>(value: T) -> Self {
        Self::Object(Object::new(value))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::String(_) => ValueKind::String,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
            Self::Object(_) => ValueKind::Object,
            Self::Callable(_) => ValueKind::Callable,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Callable(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view; integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&OrderedMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Self::Callable(c) => Some(c),
            _ => None,
        }
    }

    /// The nested container, if this value is an object wrapping one.
    pub fn as_container(&self) -> Option<&Container> {
        self.as_object().and_then(|o| o.downcast_ref::<Container>())
    }

    /// Convert plain JSON data into a value. JSON objects become maps with
    /// string keys, in document order.
    ///
    /// Integers beyond the `i64` range fail with `Serialization` rather than
    /// degrading to a float.
    pub fn from_json(json: serde_json::Value) -> ContainerResult<Self> {
        Ok(match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Self::Int(i),
                (None, Some(u)) => {
                    return Err(ContainerError::Serialization(format!(
                        "integer {u} is out of range"
                    )))
                }
                (None, None) => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::List(
                items
                    .into_iter()
                    .map(Self::from_json)
                    .collect::<ContainerResult<_>>()?,
            ),
            serde_json::Value::Object(fields) => Self::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| Ok((Key::Str(k), Self::from_json(v)?)))
                    .collect::<ContainerResult<_>>()?,
            ),
        })
    }

    /// Convert into JSON. Map keys are stringified; nested containers are
    /// exported through their raw plain mapping.
    ///
    /// Fails on callables, non-container objects and non-finite floats.
    pub fn to_json(&self) -> ContainerResult<serde_json::Value> {
        Ok(match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| ContainerError::Serialization(format!("non-finite float {f}")))?,
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(Self::to_json)
                    .collect::<ContainerResult<_>>()?,
            ),
            Self::Map(map) => map_to_json(map)?,
            Self::Object(o) => match o.downcast_ref::<Container>() {
                Some(nested) => map_to_json(&nested.to_plain_map())?,
                None => {
                    return Err(ContainerError::Serialization(format!(
                        "object {} has no JSON form",
                        o.short_name()
                    )))
                }
            },
            Self::Callable(c) => {
                return Err(ContainerError::Serialization(format!(
                    "callable {c:?} has no JSON form"
                )))
            }
        })
    }
}

fn map_to_json(map: &OrderedMap) -> ContainerResult<serde_json::Value> {
    let mut fields = serde_json::Map::new();
    for (key, value) in map.iter() {
        let name = key.to_string();
        if fields.contains_key(&name) {
            return Err(ContainerError::Serialization(format!(
                "keys collide as JSON field '{name}'"
            )));
        }
        fields.insert(name, value.to_json()?);
    }
    Ok(serde_json::Value::Object(fields))
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<OrderedMap> for Value {
    fn from(map: OrderedMap) -> Self {
        Self::Map(map)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(o)
    }
}

impl From<Callable> for Value {
    fn from(c: Callable) -> Self {
        Self::Callable(c)
    }
}

// ---------------------------------------------------------------------------
// OrderedMap
// ---------------------------------------------------------------------------

/// An insertion-ordered key → value mapping of plain data.
///
/// Lookups are linear; this is the exchange format for plain mappings, not
/// the container's own index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderedMap {
    entries: Vec<(Key, Value)>,
}

impl OrderedMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace. A replaced entry keeps its position.
    pub fn insert(&mut self, key: Key, value: Value) -> Option<Value> {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Remove an entry, shifting later entries down.
    pub fn remove(&mut self, key: &Key) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|(k, _)| k)
    }
}

impl FromIterator<(Key, Value)> for OrderedMap {
    fn from_iter<I: IntoIterator<Item = (Key, Value)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl IntoIterator for OrderedMap {
    type Item = (Key, Value);
    type IntoIter = std::vec::IntoIter<(Key, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kinds() {
        assert_eq!(Value::Null.kind(), ValueKind::Null);
        assert_eq!(Value::from(3).kind(), ValueKind::Int);
        assert_eq!(Value::from(3.5).kind(), ValueKind::Float);
        assert_eq!(Value::from("x").kind(), ValueKind::String);
        assert_eq!(Value::object(1u8).kind(), ValueKind::Object);
        assert_eq!(ValueKind::Callable.to_string(), "callable");
    }

    #[test]
    fn ordered_map_keeps_insertion_order() {
        let mut map = OrderedMap::new();
        map.insert(Key::from("b"), Value::from(1));
        map.insert(Key::from("a"), Value::from(2));
        map.insert(Key::from("b"), Value::from(3));
        let keys: Vec<String> = map.keys().map(ToString::to_string).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(map.get(&Key::from("b")), Some(&Value::from(3)));

        assert_eq!(map.remove(&Key::from("b")), Some(Value::from(3)));
        map.insert(Key::from("b"), Value::from(4));
        let keys: Vec<String> = map.keys().map(ToString::to_string).collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn json_conversion() {
        let value = Value::from_json(json!({"name": "app", "ports": [80, 443], "ratio": 0.5})).unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(map.get(&Key::from("name")), Some(&Value::from("app")));
        assert_eq!(
            map.get(&Key::from("ports")),
            Some(&Value::List(vec![Value::from(80), Value::from(443)]))
        );
        assert_eq!(
            value.to_json().unwrap(),
            json!({"name": "app", "ports": [80, 443], "ratio": 0.5})
        );
    }

    #[test]
    fn json_keeps_document_and_insertion_order() {
        let value = Value::from_json(serde_json::from_str(r#"{"zeta": 1, "alpha": 2}"#).unwrap()).unwrap();
        let keys: Vec<String> = value.as_map().unwrap().keys().map(ToString::to_string).collect();
        assert_eq!(keys, ["zeta", "alpha"]);

        let map: OrderedMap = vec![
            (Key::from("zeta"), Value::from(1)),
            (Key::from("alpha"), Value::from(2)),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&Value::Map(map).to_json().unwrap()).unwrap();
        assert_eq!(json, r#"{"zeta":1,"alpha":2}"#);
    }

    #[test]
    fn json_refuses_colliding_keys() {
        let map: OrderedMap = vec![
            (Key::Int(0), Value::from("int")),
            (Key::from("0"), Value::from("str")),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            Value::Map(map).to_json(),
            Err(ContainerError::Serialization(_))
        ));
    }

    #[test]
    fn json_refuses_out_of_range_integers() {
        assert!(matches!(
            Value::from_json(json!(u64::MAX)),
            Err(ContainerError::Serialization(_))
        ));
        assert_eq!(Value::from_json(json!(i64::MIN)).unwrap(), Value::from(i64::MIN));
        assert_eq!(Value::from_json(json!(1.5)).unwrap(), Value::from(1.5));
    }

    #[test]
    fn json_rejects_opaque_values() {
        assert!(Value::object(5u32).to_json().is_err());
        assert!(Value::Float(f64::NAN).to_json().is_err());
    }
}
