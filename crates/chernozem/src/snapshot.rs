//! Serializable container snapshots.
//!
//! A [`Snapshot`] records, in insertion order, every stored raw value plus
//! the per-key schema: lock, service lifetime and type hints. Keys that carry
//! only a lock or hints (no value yet) are recorded after the stored ones.
//!
//! Plain data is recorded structurally. Callables are recorded by the
//! [`FactoryRef`] they were built from and rebound through a
//! [`FactoryRegistry`] on restore; nested containers nest snapshots.
//! Inflectors, cached service results, arbitrary objects and object keys are
//! not recorded: the first two are rebuilt by the owner, the last two fail
//! with `Unserializable`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::callable::FactoryRef;
use crate::config::ContainerConfig;
use crate::container::{Container, Lifetime};
use crate::error::{ContainerError, ContainerResult};
use crate::hint::TypeHint;
use crate::key::Key;
use crate::object::Object;
use crate::registry::FactoryRegistry;
use crate::value::{OrderedMap, Value};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

fn current_version() -> u32 {
    SNAPSHOT_VERSION
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub config: ContainerConfig,
    pub entries: Vec<SnapshotEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: SnapshotKey,
    /// `None` for keys that only carry a lock or hints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<SnapshotValue>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<Lifetime>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<TypeHint>,
}

/// A portable key: object tokens have no snapshot form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotKey {
    Int(i64),
    Str(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<SnapshotValue>),
    Map(Vec<(SnapshotKey, SnapshotValue)>),
    Factory(FactoryRef),
    Container(Box<Snapshot>),
}

impl From<SnapshotKey> for Key {
    fn from(key: SnapshotKey) -> Self {
        match key {
            SnapshotKey::Int(i) => Key::Int(i),
            SnapshotKey::Str(s) => Key::Str(s),
        }
    }
}

impl Snapshot {
    pub fn to_json(&self) -> ContainerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ContainerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Container {
    /// Record this container's values and per-key schema.
    pub fn snapshot(&self) -> ContainerResult<Snapshot> {
        let mut entries = Vec::with_capacity(self.count());
        for (key, value) in self.iter() {
            entries.push(self.snapshot_entry(key, Some(value))?);
        }
        for key in self.schema_only_keys() {
            entries.push(self.snapshot_entry(&key, None)?);
        }
        Ok(Snapshot {
            version: SNAPSHOT_VERSION,
            config: self.config().clone(),
            entries,
        })
    }

    fn snapshot_entry(&self, key: &Key, value: Option<&Value>) -> ContainerResult<SnapshotEntry> {
        Ok(SnapshotEntry {
            key: encode_key(key)?,
            value: value.map(|v| encode_value(key, v)).transpose()?,
            locked: self.is_locked(key),
            lifetime: self.service_lifetime(key),
            hints: self
                .type_constraint(key)
                .map(<[TypeHint]>::to_vec)
                .unwrap_or_default(),
        })
    }

    /// Rebuild a container, rebinding callables through `registry`.
    ///
    /// Values are written before their hints and locks are applied, so the
    /// recorded raw values come back unchanged.
    pub fn restore(snapshot: &Snapshot, registry: &FactoryRegistry) -> ContainerResult<Self> {
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(ContainerError::Serialization(format!(
                "unsupported snapshot version {} (max {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        let mut container = Container::with_config(snapshot.config.clone());
        for entry in &snapshot.entries {
            let key = Key::from(entry.key.clone());
            if let Some(value) = &entry.value {
                container.set(&key, decode_value(value, registry)?)?;
            }
            container.set_type_constraint(&key, entry.hints.iter().cloned())?;
            match entry.lifetime {
                Some(Lifetime::Shared) => container.mark_as_service(&key)?,
                Some(Lifetime::Factory) => container.mark_as_factory(&key)?,
                None => {}
            }
            if entry.locked {
                container.lock(&key)?;
            }
        }
        debug!(entries = snapshot.entries.len(), "restored container snapshot");
        Ok(container)
    }
}

fn encode_key(key: &Key) -> ContainerResult<SnapshotKey> {
    match key {
        Key::Int(i) => Ok(SnapshotKey::Int(*i)),
        Key::Str(s) => Ok(SnapshotKey::Str(s.clone())),
        Key::Object(_) => Err(ContainerError::Unserializable {
            key: key.to_string(),
            reason: "object keys are only meaningful to the container that issued them".into(),
        }),
    }
}

fn encode_value(key: &Key, value: &Value) -> ContainerResult<SnapshotValue> {
    let unserializable = |reason: String| ContainerError::Unserializable {
        key: key.to_string(),
        reason,
    };
    Ok(match value {
        Value::Null => SnapshotValue::Null,
        Value::Bool(b) => SnapshotValue::Bool(*b),
        Value::Int(i) => SnapshotValue::Int(*i),
        Value::Float(f) if f.is_finite() => SnapshotValue::Float(*f),
        Value::Float(f) => return Err(unserializable(format!("non-finite float {f}"))),
        Value::String(s) => SnapshotValue::String(s.clone()),
        Value::List(items) => SnapshotValue::List(
            items
                .iter()
                .map(|item| encode_value(key, item))
                .collect::<ContainerResult<_>>()?,
        ),
        Value::Map(map) => SnapshotValue::Map(
            map.iter()
                .map(|(k, v)| Ok((encode_key(k)?, encode_value(key, v)?)))
                .collect::<ContainerResult<_>>()?,
        ),
        Value::Object(o) => match o.downcast_ref::<Container>() {
            Some(nested) => SnapshotValue::Container(Box::new(nested.snapshot()?)),
            None => {
                return Err(unserializable(format!(
                    "object {} has no snapshot form",
                    o.short_name()
                )))
            }
        },
        Value::Callable(c) => match c.origin() {
            Some(origin) => SnapshotValue::Factory(origin.clone()),
            None => {
                return Err(unserializable(
                    "anonymous callable; build it from a FactoryRegistry".into(),
                ))
            }
        },
    })
}

fn decode_value(value: &SnapshotValue, registry: &FactoryRegistry) -> ContainerResult<Value> {
    Ok(match value {
        SnapshotValue::Null => Value::Null,
        SnapshotValue::Bool(b) => Value::Bool(*b),
        SnapshotValue::Int(i) => Value::Int(*i),
        SnapshotValue::Float(f) => Value::Float(*f),
        SnapshotValue::String(s) => Value::String(s.clone()),
        SnapshotValue::List(items) => Value::List(
            items
                .iter()
                .map(|item| decode_value(item, registry))
                .collect::<ContainerResult<_>>()?,
        ),
        SnapshotValue::Map(fields) => Value::Map(
            fields
                .iter()
                .map(|(k, v)| Ok((Key::from(k.clone()), decode_value(v, registry)?)))
                .collect::<ContainerResult<OrderedMap>>()?,
        ),
        SnapshotValue::Factory(origin) => {
            Value::Callable(registry.callable(&origin.name, origin.args.clone())?)
        }
        SnapshotValue::Container(nested) => {
            Value::Object(Object::new(Container::restore(nested, registry)?))
        }
    })
}
