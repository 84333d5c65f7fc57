//! Inflectors: per-key value transforms applied on write (input) or read
//! (output).
//!
//! Each factory here returns a plain closure that can be registered with
//! [`Container::add_input_inflector`](crate::Container::add_input_inflector)
//! or [`Container::add_output_inflector`](crate::Container::add_output_inflector).
//! They hold no shared state beyond what they capture.

use std::sync::{Arc, OnceLock};

use crate::callable::Callable;
use crate::error::{ContainerError, ContainerResult};
use crate::hint::{describe, matches_any, TypeHint};
use crate::key::Key;
use crate::value::Value;

/// Stored form of an inflector.
pub type Inflector = Arc<dyn Fn(&Key, Value) -> ContainerResult<Value> + Send + Sync>;

/// Reject values matching none of `hints`.
pub fn expect(
    hints: Vec<TypeHint>,
) -> impl Fn(&Key, Value) -> ContainerResult<Value> + Send + Sync + 'static {
    move |key, value| {
        if matches_any(&hints, &value) {
            Ok(value)
        } else {
            Err(ContainerError::TypeConstraint {
                key: key.clone(),
                expected: describe(&hints),
                actual: value.kind(),
            })
        }
    }
}

/// Refuse every value. As an input inflector this makes a key read-only
/// without registering a lock.
pub fn read_only() -> impl Fn(&Key, Value) -> ContainerResult<Value> + Send + Sync + 'static {
    |key, _| Err(ContainerError::Locked { key: key.clone() })
}

/// Reject values for which `predicate` returns `true`.
pub fn reject_if<P>(
    predicate: P,
    reason: impl Into<String>,
) -> impl Fn(&Key, Value) -> ContainerResult<Value> + Send + Sync + 'static
where
    P: Fn(&Value) -> bool + Send + Sync + 'static,
{
    let reason = reason.into();
    move |key, value| {
        if predicate(&value) {
            Err(ContainerError::Rejected {
                key: key.clone(),
                reason: reason.clone(),
            })
        } else {
            Ok(value)
        }
    }
}

/// Apply `f` to string values; other values pass through.
pub fn map_strings<F>(f: F) -> impl Fn(&Key, Value) -> ContainerResult<Value> + Send + Sync + 'static
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    move |_, value| {
        Ok(match value {
            Value::String(s) => Value::String(f(&s)),
            other => other,
        })
    }
}

pub fn trim() -> impl Fn(&Key, Value) -> ContainerResult<Value> + Send + Sync + 'static {
    map_strings(|s| s.trim().to_string())
}

pub fn lowercase() -> impl Fn(&Key, Value) -> ContainerResult<Value> + Send + Sync + 'static {
    map_strings(str::to_lowercase)
}

pub fn uppercase() -> impl Fn(&Key, Value) -> ContainerResult<Value> + Send + Sync + 'static {
    map_strings(str::to_uppercase)
}

/// Clamp numbers into `[min, max]`. Floats clamp against the same bounds.
///
/// Fails with `InvalidInflector` when `min > max`.
pub fn clamp(
    min: i64,
    max: i64,
) -> ContainerResult<impl Fn(&Key, Value) -> ContainerResult<Value> + Send + Sync + 'static> {
    if min > max {
        return Err(ContainerError::InvalidInflector {
            reason: format!("clamp bounds are inverted ({min} > {max})"),
        });
    }
    Ok(move |_: &Key, value: Value| -> ContainerResult<Value> {
        Ok(match value {
            Value::Int(i) => Value::Int(i.clamp(min, max)),
            Value::Float(f) => Value::Float(f.clamp(min as f64, max as f64)),
            other => other,
        })
    })
}

/// Replace `Null` with `default`.
pub fn default_to(default: Value) -> impl Fn(&Key, Value) -> ContainerResult<Value> + Send + Sync + 'static {
    move |_, value| {
        Ok(match value {
            Value::Null => default.clone(),
            other => other,
        })
    }
}

/// Wrap callables so they memoize their first successful result.
///
/// Unlike a service, the stored value stays a callable: readers get the
/// wrapper back and decide when to invoke it.
pub fn persist() -> impl Fn(&Key, Value) -> ContainerResult<Value> + Send + Sync + 'static {
    |_, value| {
        Ok(match value {
            Value::Callable(inner) => {
                let origin = inner.origin().cloned();
                let memo: Arc<OnceLock<Value>> = Arc::new(OnceLock::new());
                let wrapped = Callable::new(move |container| {
                    if let Some(done) = memo.get() {
                        return Ok(done.clone());
                    }
                    let fresh = inner.call(container)?;
                    Ok(memo.get_or_init(|| fresh).clone())
                });
                Value::Callable(match origin {
                    Some(origin) => wrapped.with_origin(origin),
                    None => wrapped,
                })
            }
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn key() -> Key {
        Key::from("k")
    }

    #[test]
    fn expect_checks_hints() {
        let f = expect(vec![TypeHint::Int, TypeHint::Null]);
        assert_eq!(f(&key(), Value::from(1)).unwrap(), Value::from(1));
        assert!(f(&key(), Value::Null).is_ok());
        let err = f(&key(), Value::from("1")).unwrap_err();
        assert!(matches!(err, ContainerError::TypeConstraint { .. }));
        assert!(err.to_string().contains("int, null"));
    }

    #[test]
    fn read_only_refuses() {
        let f = read_only();
        assert!(matches!(
            f(&key(), Value::from(1)),
            Err(ContainerError::Locked { .. })
        ));
    }

    #[test]
    fn reject_if_reports_reason() {
        let f = reject_if(|v| v.as_str() == Some(""), "must not be blank");
        assert!(f(&key(), Value::from("x")).is_ok());
        let err = f(&key(), Value::from("")).unwrap_err();
        assert_eq!(err.to_string(), "'k' value rejected: must not be blank");
    }

    #[test]
    fn string_transforms() {
        assert_eq!(trim()(&key(), Value::from("  a ")).unwrap(), Value::from("a"));
        assert_eq!(lowercase()(&key(), Value::from("AbC")).unwrap(), Value::from("abc"));
        assert_eq!(uppercase()(&key(), Value::from("AbC")).unwrap(), Value::from("ABC"));
        assert_eq!(trim()(&key(), Value::from(3)).unwrap(), Value::from(3));
    }

    #[test]
    fn clamp_numbers() {
        let f = clamp(0, 10).unwrap();
        assert_eq!(f(&key(), Value::from(42)).unwrap(), Value::from(10));
        assert_eq!(f(&key(), Value::from(-3)).unwrap(), Value::from(0));
        assert_eq!(f(&key(), Value::from(2.5)).unwrap(), Value::from(2.5));
        assert_eq!(f(&key(), Value::from("x")).unwrap(), Value::from("x"));
    }

    #[test]
    fn clamp_rejects_inverted_bounds() {
        assert!(matches!(
            clamp(10, 0),
            Err(ContainerError::InvalidInflector { .. })
        ));
        let f = clamp(3, 3).unwrap();
        assert_eq!(f(&key(), Value::from(5)).unwrap(), Value::from(3));
    }

    #[test]
    fn default_replaces_null() {
        let f = default_to(Value::from("fallback"));
        assert_eq!(f(&key(), Value::Null).unwrap(), Value::from("fallback"));
        assert_eq!(f(&key(), Value::from("set")).unwrap(), Value::from("set"));
    }

    #[test]
    fn persist_memoizes_callable() {
        let counter = Arc::new(AtomicI64::new(0));
        let c = Arc::clone(&counter);
        let callable = Callable::from_fn(move |_| c.fetch_add(1, Ordering::SeqCst));

        let wrapped = persist()(&key(), Value::from(callable)).unwrap();
        let wrapped = wrapped.as_callable().unwrap();
        let container = Container::new();
        assert_eq!(wrapped.call(&container).unwrap(), Value::from(0));
        assert_eq!(wrapped.call(&container).unwrap(), Value::from(0));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn persist_ignores_plain_values() {
        assert_eq!(persist()(&key(), Value::from(5)).unwrap(), Value::from(5));
    }
}
