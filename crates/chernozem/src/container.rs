//! The keyed value container.
//!
//! [`Container`] maps normalized keys to values in insertion order. Each key
//! may carry a lock, a set of type hints, input and output inflectors, and a
//! service lifetime. Writes run through a fixed pipeline:
//!
//! 1. normalize the key (`Null` appends under the next integer index)
//! 2. refuse locked keys
//! 3. check type hints (a value must match at least one)
//! 4. apply input inflectors in registration order
//! 5. promote plain maps to nested containers, if configured
//! 6. store, keeping the position of an overwritten key
//! 7. forget any cached service result for the key
//!
//! Reads resolve services first. A shared service runs its callable once,
//! with the container as argument, and caches the result until the key is
//! overwritten or unmarked; a factory service runs on every read. Values
//! that are not resolved through a service go through the output inflectors.
//!
//! Iteration and [`Container::to_plain_map`] expose *raw* stored values:
//! they neither run output inflectors nor evaluate services.

use std::collections::{btree_map, BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::callable::Callable;
use crate::config::ContainerConfig;
use crate::error::{ContainerError, ContainerResult};
use crate::hint::{describe, matches_any, TypeHint};
use crate::identity::IdentityTable;
use crate::inflect::Inflector;
use crate::key::{Key, KeyInput};
use crate::object::Object;
use crate::value::{OrderedMap, Value};

/// How a service key resolves its callable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// Evaluated once, result cached.
    Shared,
    /// Evaluated on every read.
    Factory,
}

#[derive(Debug)]
struct Entry {
    /// Insertion sequence number, the key's position in `order`.
    seq: u64,
    value: Value,
}

/// An ordered, interceptable key → value container.
pub struct Container {
    config: ContainerConfig,
    entries: HashMap<Key, Entry>,
    order: BTreeMap<u64, Key>,
    next_seq: u64,
    hints: HashMap<Key, Vec<TypeHint>>,
    inputs: HashMap<Key, Vec<Inflector>>,
    outputs: HashMap<Key, Vec<Inflector>>,
    locked: HashSet<Key>,
    services: HashMap<Key, Lifetime>,
    resolved: RwLock<HashMap<Key, Value>>,
    resolving: Mutex<HashSet<Key>>,
    identities: IdentityTable,
}

impl Container {
    /// Create an empty container with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            hints: HashMap::new(),
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            locked: HashSet::new(),
            services: HashMap::new(),
            resolved: RwLock::new(HashMap::new()),
            resolving: Mutex::new(HashSet::new()),
            identities: IdentityTable::new(),
        }
    }

    /// Create a container pre-filled from an ordered mapping.
    ///
    /// Values go through the regular write path. Hints and inflectors can
    /// only be registered afterwards, so they never apply to these initial
    /// values.
    pub fn from_map(map: OrderedMap) -> ContainerResult<Self> {
        Self::from_map_with_config(map, ContainerConfig::default())
    }

    pub fn from_map_with_config(map: OrderedMap, config: ContainerConfig) -> ContainerResult<Self> {
        let mut container = Self::with_config(config);
        for (key, value) in map {
            if key.is_object() {
                return Err(ContainerError::InvalidKey {
                    reason: format!("object token {key} is not portable between containers"),
                });
            }
            container.set(&key, value)?;
        }
        Ok(container)
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    // ---------------------------------------------------------------
    // Keys
    // ---------------------------------------------------------------

    /// Normalize a key without issuing identity tokens.
    ///
    /// `Ok(None)` means the key cannot be present: an object this container
    /// has never seen, or a token another container issued.
    fn lookup_key(&self, input: KeyInput<'_>) -> ContainerResult<Option<Key>> {
        match input {
            KeyInput::Null => Err(ContainerError::InvalidKey {
                reason: "a null key can only be used to append".into(),
            }),
            KeyInput::Int(i) => Ok(Some(Key::Int(i))),
            KeyInput::Str("") => Err(ContainerError::InvalidKey {
                reason: "key must not be empty".into(),
            }),
            KeyInput::Str(s) => Ok(Some(Key::Str(s.to_string()))),
            KeyInput::Object(o) => Ok(self.identities.lookup(o).map(Key::Object)),
            KeyInput::Token(token) if self.identities.issued(token) => Ok(Some(Key::Object(token))),
            KeyInput::Token(_) => Ok(None),
        }
    }

    /// Normalize a key, issuing an identity token for unseen objects.
    fn resolve_key(&mut self, input: KeyInput<'_>) -> ContainerResult<Key> {
        match input {
            KeyInput::Object(o) => Ok(Key::Object(self.identities.intern(o))),
            KeyInput::Token(token) if !self.identities.issued(token) => {
                Err(ContainerError::InvalidKey {
                    reason: format!("{token} was not issued by this container"),
                })
            }
            other => self
                .lookup_key(other)?
                .ok_or_else(|| ContainerError::InvalidKey {
                    reason: format!("unresolvable key {}", other.describe()),
                }),
        }
    }

    /// Highest non-negative integer key plus one, or zero.
    fn next_index(&self) -> ContainerResult<Key> {
        let next = match self
            .order
            .values()
            .filter_map(Key::as_int)
            .filter(|i| *i >= 0)
            .max()
        {
            Some(max) => max.checked_add(1).ok_or_else(|| ContainerError::InvalidKey {
                reason: "no integer index left to append to".into(),
            })?,
            None => 0,
        };
        Ok(Key::Int(next))
    }

    fn not_found(&self, input: KeyInput<'_>) -> ContainerResult<Value> {
        if self.config.nullable {
            Ok(Value::Null)
        } else {
            Err(ContainerError::KeyNotFound {
                key: input.describe(),
            })
        }
    }

    // ---------------------------------------------------------------
    // Core operations
    // ---------------------------------------------------------------

    /// Returns `true` if the key holds a value. Never runs inflectors or
    /// services; invalid keys are simply absent.
    pub fn has<'k>(&self, key: impl Into<KeyInput<'k>>) -> bool {
        matches!(self.lookup_key(key.into()), Ok(Some(k)) if self.entries.contains_key(&k))
    }

    /// Store a value. A `Null` key appends (see [`Container::push`]).
    pub fn set<'k>(&mut self, key: impl Into<KeyInput<'k>>, value: impl Into<Value>) -> ContainerResult<()> {
        let key = match key.into() {
            KeyInput::Null => self.next_index()?,
            input => self.resolve_key(input)?,
        };
        self.store(key, value.into())
    }

    /// Append under the next integer index and return that index.
    pub fn push(&mut self, value: impl Into<Value>) -> ContainerResult<Key> {
        let key = self.next_index()?;
        self.store(key.clone(), value.into())?;
        Ok(key)
    }

    fn store(&mut self, key: Key, value: Value) -> ContainerResult<()> {
        if self.locked.contains(&key) {
            return Err(ContainerError::Locked { key });
        }
        if let Some(hints) = self.hints.get(&key) {
            if !matches_any(hints, &value) {
                return Err(ContainerError::TypeConstraint {
                    expected: describe(hints),
                    actual: value.kind(),
                    key,
                });
            }
        }
        let mut value = value;
        if let Some(inflectors) = self.inputs.get(&key) {
            for inflector in inflectors {
                value = inflector(&key, value)?;
            }
        }
        if self.config.promote_nested {
            value = promote(value, &self.config)?;
        }
        self.insert_raw(key, value);
        Ok(())
    }

    fn insert_raw(&mut self, key: Key, value: Value) {
        let kind = value.kind();
        let callable = value.is_callable();
        match self.entries.get_mut(&key) {
            Some(entry) => entry.value = value,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.order.insert(seq, key.clone());
                self.entries.insert(key.clone(), Entry { seq, value });
            }
        }
        self.forget_resolved(&key);
        if !callable && self.services.remove(&key).is_some() {
            warn!(key = %key, %kind, "non-callable overwrite dropped service flag");
        }
        debug!(key = %key, %kind, "stored value");
    }

    /// Read a value, resolving services and applying output inflectors.
    pub fn get<'k>(&self, key: impl Into<KeyInput<'k>>) -> ContainerResult<Value> {
        let input = key.into();
        let found = self
            .lookup_key(input)?
            .and_then(|k| self.entries.get_key_value(&k));
        let Some((key, entry)) = found else {
            return self.not_found(input);
        };

        if let (Some(lifetime), Value::Callable(callable)) = (self.services.get(key), &entry.value) {
            return self.resolve_service(key, callable, *lifetime);
        }

        let mut value = entry.value.clone();
        if let Some(inflectors) = self.outputs.get(key) {
            for inflector in inflectors {
                value = inflector(key, value)?;
            }
        }
        Ok(value)
    }

    /// Read the stored value as is: no services, no output inflectors.
    pub fn raw<'k>(&self, key: impl Into<KeyInput<'k>>) -> ContainerResult<Value> {
        let input = key.into();
        match self
            .lookup_key(input)?
            .and_then(|k| self.entries.get(&k))
        {
            Some(entry) => Ok(entry.value.clone()),
            None => self.not_found(input),
        }
    }

    /// Remove a value. Returns whether the key existed.
    ///
    /// Locked keys cannot be deleted, present or not. Deleting a service
    /// also unmarks it; hints and inflectors stay registered.
    pub fn delete<'k>(&mut self, key: impl Into<KeyInput<'k>>) -> ContainerResult<bool> {
        let Some(key) = self.lookup_key(key.into())? else {
            return Ok(false);
        };
        if self.locked.contains(&key) {
            return Err(ContainerError::Locked { key });
        }
        let Some(entry) = self.entries.remove(&key) else {
            return Ok(false);
        };
        self.order.remove(&entry.seq);
        self.services.remove(&key);
        self.forget_resolved(&key);
        debug!(key = %key, "deleted value");
        Ok(true)
    }

    /// Number of stored entries.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw entries in insertion order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            order: self.order.values(),
            entries: &self.entries,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.order.values()
    }

    /// Export raw values as a plain ordered mapping, unwrapping nested
    /// containers recursively.
    pub fn to_plain_map(&self) -> OrderedMap {
        self.iter()
            .map(|(key, value)| (key.clone(), unwrap_nested(value)))
            .collect()
    }

    // ---------------------------------------------------------------
    // Type hints
    // ---------------------------------------------------------------

    /// Register (or replace) the accepted kinds for a key. The current value
    /// is not re-checked. An empty list removes the constraint.
    pub fn set_type_constraint<'k>(
        &mut self,
        key: impl Into<KeyInput<'k>>,
        hints: impl IntoIterator<Item = TypeHint>,
    ) -> ContainerResult<()> {
        let key = self.resolve_key(key.into())?;
        let hints: Vec<TypeHint> = hints.into_iter().collect();
        if hints.is_empty() {
            self.hints.remove(&key);
        } else {
            debug!(key = %key, hints = %describe(&hints), "registered type constraint");
            self.hints.insert(key, hints);
        }
        Ok(())
    }

    /// [`Container::set_type_constraint`] from descriptor strings.
    pub fn hint<'k>(&mut self, key: impl Into<KeyInput<'k>>, descriptors: &[&str]) -> ContainerResult<()> {
        let hints = descriptors
            .iter()
            .map(|d| d.parse())
            .collect::<ContainerResult<Vec<TypeHint>>>()?;
        self.set_type_constraint(key, hints)
    }

    pub fn clear_type_constraint<'k>(&mut self, key: impl Into<KeyInput<'k>>) -> ContainerResult<()> {
        self.set_type_constraint(key, Vec::new())
    }

    pub fn type_constraint<'k>(&self, key: impl Into<KeyInput<'k>>) -> Option<&[TypeHint]> {
        let key = self.lookup_key(key.into()).ok()??;
        self.hints.get(&key).map(Vec::as_slice)
    }

    // ---------------------------------------------------------------
    // Inflectors
    // ---------------------------------------------------------------

    /// Append a transform applied to values written under `key`.
    pub fn add_input_inflector<'k, F>(&mut self, key: impl Into<KeyInput<'k>>, inflector: F) -> ContainerResult<()>
    where
        F: Fn(&Key, Value) -> ContainerResult<Value> + Send + Sync + 'static,
    {
        let key = self.resolve_key(key.into())?;
        self.inputs.entry(key).or_default().push(Arc::new(inflector));
        Ok(())
    }

    /// Append a transform applied to values read from `key`.
    pub fn add_output_inflector<'k, F>(&mut self, key: impl Into<KeyInput<'k>>, inflector: F) -> ContainerResult<()>
    where
        F: Fn(&Key, Value) -> ContainerResult<Value> + Send + Sync + 'static,
    {
        let key = self.resolve_key(key.into())?;
        self.outputs.entry(key).or_default().push(Arc::new(inflector));
        Ok(())
    }

    // ---------------------------------------------------------------
    // Services
    // ---------------------------------------------------------------

    /// Turn the callable stored under `key` into a shared service.
    pub fn mark_as_service<'k>(&mut self, key: impl Into<KeyInput<'k>>) -> ContainerResult<()> {
        self.mark(key.into(), Lifetime::Shared)
    }

    /// Turn the callable stored under `key` into a factory, evaluated on
    /// every read.
    pub fn mark_as_factory<'k>(&mut self, key: impl Into<KeyInput<'k>>) -> ContainerResult<()> {
        self.mark(key.into(), Lifetime::Factory)
    }

    fn mark(&mut self, input: KeyInput<'_>, lifetime: Lifetime) -> ContainerResult<()> {
        let key = self
            .lookup_key(input)?
            .filter(|k| self.entries.contains_key(k))
            .ok_or_else(|| ContainerError::KeyNotFound {
                key: input.describe(),
            })?;
        let value = &self.entries[&key].value;
        if !value.is_callable() {
            return Err(ContainerError::NotCallable {
                actual: value.kind(),
                key,
            });
        }
        if self.services.insert(key.clone(), lifetime) != Some(lifetime) {
            self.forget_resolved(&key);
        }
        debug!(key = %key, ?lifetime, "marked as service");
        Ok(())
    }

    /// Make a service a plain callable again. Returns whether it was one.
    pub fn unmark_service<'k>(&mut self, key: impl Into<KeyInput<'k>>) -> ContainerResult<bool> {
        let Some(key) = self.lookup_key(key.into())? else {
            return Ok(false);
        };
        self.forget_resolved(&key);
        Ok(self.services.remove(&key).is_some())
    }

    pub fn is_service<'k>(&self, key: impl Into<KeyInput<'k>>) -> bool {
        self.service_lifetime(key).is_some()
    }

    pub fn service_lifetime<'k>(&self, key: impl Into<KeyInput<'k>>) -> Option<Lifetime> {
        let key = self.lookup_key(key.into()).ok()??;
        self.services.get(&key).copied()
    }

    fn resolve_service(&self, key: &Key, callable: &Callable, lifetime: Lifetime) -> ContainerResult<Value> {
        if lifetime == Lifetime::Shared {
            if let Some(value) = read(&self.resolved).get(key) {
                trace!(key = %key, "service cache hit");
                return Ok(value.clone());
            }
        }

        let _guard = ResolutionGuard::enter(&self.resolving, key)?;
        debug!(key = %key, ?lifetime, "evaluating service");
        let value = callable.call(self)?;
        if lifetime == Lifetime::Shared {
            write(&self.resolved).insert(key.clone(), value.clone());
        }
        Ok(value)
    }

    fn forget_resolved(&self, key: &Key) {
        write(&self.resolved).remove(key);
    }

    // ---------------------------------------------------------------
    // Locks
    // ---------------------------------------------------------------

    /// Forbid every future write and delete on `key`, including the first
    /// write if the key is not set yet.
    pub fn lock<'k>(&mut self, key: impl Into<KeyInput<'k>>) -> ContainerResult<()> {
        let key = self.resolve_key(key.into())?;
        debug!(key = %key, "locked");
        self.locked.insert(key);
        Ok(())
    }

    pub fn is_locked<'k>(&self, key: impl Into<KeyInput<'k>>) -> bool {
        matches!(self.lookup_key(key.into()), Ok(Some(k)) if self.locked.contains(&k))
    }

    /// Keys carrying a lock or hints but no value.
    pub(crate) fn schema_only_keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self
            .locked
            .iter()
            .chain(self.hints.keys())
            .filter(|k| !self.entries.contains_key(*k))
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("config", &self.config)
            .field("keys", &self.order.values().collect::<Vec<_>>())
            .field("locked", &self.locked.len())
            .field("services", &self.services.len())
            .finish()
    }
}

impl<'a> IntoIterator for &'a Container {
    type Item = (&'a Key, &'a Value);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over raw entries in insertion order.
pub struct Iter<'a> {
    order: btree_map::Values<'a, u64, Key>,
    entries: &'a HashMap<Key, Entry>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Key, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.order.next()?;
        self.entries.get(key).map(|entry| (key, &entry.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}

/// Marks a key as under evaluation for as long as it lives.
struct ResolutionGuard<'a> {
    resolving: &'a Mutex<HashSet<Key>>,
    key: Key,
}

impl<'a> ResolutionGuard<'a> {
    fn enter(resolving: &'a Mutex<HashSet<Key>>, key: &Key) -> ContainerResult<Self> {
        if !lock(resolving).insert(key.clone()) {
            return Err(ContainerError::CircularService { key: key.clone() });
        }
        Ok(Self {
            resolving,
            key: key.clone(),
        })
    }
}

impl Drop for ResolutionGuard<'_> {
    fn drop(&mut self) {
        lock(self.resolving).remove(&self.key);
    }
}

fn promote(value: Value, config: &ContainerConfig) -> ContainerResult<Value> {
    match value {
        Value::Map(map) => {
            let nested = Container::from_map_with_config(map, config.clone())?;
            Ok(Value::Object(Object::new(nested)))
        }
        other => Ok(other),
    }
}

fn unwrap_nested(value: &Value) -> Value {
    match value {
        Value::Object(o) => match o.downcast_ref::<Container>() {
            Some(nested) => Value::Map(nested.to_plain_map()),
            None => value.clone(),
        },
        Value::List(items) => Value::List(items.iter().map(unwrap_nested).collect()),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), unwrap_nested(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
