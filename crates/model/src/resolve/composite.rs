//! Unions, literals, collections and mappings

use indexmap::{IndexMap, IndexSet};

use crate::descriptor::Concrete;
use crate::error::{ErrorCatcher, LocSegment, ValidationError};
use crate::record::Record;
use crate::validator::{Coerce, Invocation, Validator, drive};
use crate::value::Value;

// ============================================================================
// UNION
// ============================================================================

/// Tries each member in order; the first success wins.
///
/// When every member fails the errors are aggregated under the enclosing
/// record's name, one entry per member at `Union[i]`.
struct UnionCoercion {
    members: Vec<Validator>,
}

impl Coerce<Value> for UnionCoercion {
    fn coerce<'a>(&'a self, record: &'a Record, value: Value) -> Invocation<'a, Value> {
        drive("Union", self.is_async(), async move {
            let mut catcher = ErrorCatcher::new(record.model().name());
            for (i, member) in self.members.iter().enumerate() {
                let attempt = member.invoke(record, value.clone()).await;
                if let Some(coerced) = catcher.catch(LocSegment::Member(i), attempt)? {
                    return Ok(coerced);
                }
            }
            Err(catcher.into_error())
        })
    }

    fn is_async(&self) -> bool {
        self.members.iter().any(Validator::is_async)
    }
}

pub(super) fn union(members: Vec<Validator>) -> Validator {
    let name = format!(
        "Union[{}]",
        members
            .iter()
            .map(Validator::name)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Validator::from_parts(UnionCoercion { members }, false, name)
}

// ============================================================================
// LITERAL
// ============================================================================

pub(super) fn literal(values: Vec<Value>) -> Validator {
    let allowed: IndexSet<Value> = values.into_iter().collect();
    let expected = match allowed.first() {
        Some(only) if allowed.len() == 1 => only.repr(),
        _ => format!("one of {}", Value::Set(allowed.clone()).repr()),
    };

    Validator::new(move |value: Value| {
        if allowed.contains(&value) {
            Ok(value)
        } else {
            Err(ValidationError::type_error(format!(
                "Expected {expected}, got {}",
                value.repr()
            )))
        }
    })
    .named("Literal")
}

// ============================================================================
// COLLECTIONS
// ============================================================================

struct CollectionCoercion {
    target: Concrete,
    item: Option<Validator>,
}

impl CollectionCoercion {
    fn items(value: Value) -> Result<Vec<Value>, ValidationError> {
        match value {
            Value::List(items) | Value::Tuple(items) => Ok(items),
            Value::Set(items) => Ok(items.into_iter().collect()),
            Value::Map(map) => Ok(map.into_keys().collect()),
            other => Err(ValidationError::type_error(format!(
                "Expected iterable, got {}",
                other.type_name()
            ))),
        }
    }

    fn build(&self, items: Vec<Value>) -> Value {
        match self.target {
            Concrete::List => Value::List(items),
            Concrete::Tuple => Value::Tuple(items),
            Concrete::Set => Value::Set(items.into_iter().collect()),
        }
    }
}

impl Coerce<Value> for CollectionCoercion {
    fn coerce<'a>(&'a self, record: &'a Record, value: Value) -> Invocation<'a, Value> {
        drive(self.target.name(), self.is_async(), async move {
            let items = Self::items(value)?;
            let Some(item) = &self.item else {
                return Ok(self.build(items));
            };

            let mut catcher = ErrorCatcher::new(record.model().name());
            let mut coerced = Vec::with_capacity(items.len());
            for (i, raw) in items.into_iter().enumerate() {
                let attempt = item.invoke(record, raw).await;
                if let Some(v) = catcher.catch(LocSegment::Index(i), attempt)? {
                    coerced.push(v);
                }
            }
            catcher.raise_errors()?;
            Ok(self.build(coerced))
        })
    }

    fn is_async(&self) -> bool {
        self.item.as_ref().is_some_and(Validator::is_async)
    }
}

pub(super) fn collection(target: Concrete, item: Option<Validator>) -> Validator {
    let name = target.name();
    Validator::from_parts(CollectionCoercion { target, item }, false, name)
}

// ============================================================================
// MAPPINGS
// ============================================================================

struct MappingCoercion {
    key: Option<Validator>,
    value: Option<Validator>,
}

impl Coerce<Value> for MappingCoercion {
    fn coerce<'a>(&'a self, record: &'a Record, value: Value) -> Invocation<'a, Value> {
        drive("dict", self.is_async(), async move {
            let map = match value {
                Value::Map(map) => map,
                other => {
                    return Err(ValidationError::type_error(format!(
                        "Expected mapping, got {}",
                        other.type_name()
                    )));
                }
            };
            if self.key.is_none() && self.value.is_none() {
                return Ok(Value::Map(map));
            }

            let mut catcher = ErrorCatcher::new(record.model().name());
            let mut out = IndexMap::with_capacity(map.len());
            // a pair failing on both sides reports only the value error
            for (raw_key, raw_value) in map {
                let loc = LocSegment::Key(raw_key.key_string());
                let value = match &self.value {
                    Some(validator) => validator.invoke(record, raw_value).await,
                    None => Ok(raw_value),
                };
                let Some(value) = catcher.catch(loc.clone(), value)? else {
                    continue;
                };
                let key = match &self.key {
                    Some(validator) => validator.invoke(record, raw_key).await,
                    None => Ok(raw_key),
                };
                if let Some(key) = catcher.catch(loc, key)? {
                    out.insert(key, value);
                }
            }
            catcher.raise_errors()?;
            Ok(Value::Map(out))
        })
    }

    fn is_async(&self) -> bool {
        self.key.iter().chain(&self.value).any(Validator::is_async)
    }
}

pub(super) fn mapping(key: Option<Validator>, value: Option<Validator>) -> Validator {
    Validator::from_parts(MappingCoercion { key, value }, false, "dict")
}
