//! Enums, records and fixed-shape containers
//!
//! Tuples, named tuples and typed dicts are validated by synthesizing an
//! anonymous record type with one field per position or key and running the
//! full record pipeline over it.

use std::sync::Arc;

use super::{Resolver, scalar};
use crate::descriptor::{EnumType, NamedTupleType, TypeDescriptor, TypedDictType};
use crate::error::{ResolveError, ValidationError};
use crate::field::Field;
use crate::record::{Record, RecordType};
use crate::validator::{Coerce, Invocation, Validator, drive};
use crate::value::{Mapping, Value, into_mapping};

// ============================================================================
// ENUMS
// ============================================================================

struct EnumCoercion {
    enum_type: Arc<EnumType>,
    base: Validator,
}

impl Coerce<Value> for EnumCoercion {
    fn coerce<'a>(&'a self, record: &'a Record, value: Value) -> Invocation<'a, Value> {
        drive(self.enum_type.name(), self.is_async(), async move {
            let raw = match value {
                Value::Enum(member) if member.enum_name() == self.enum_type.name() => {
                    return Ok(Value::Enum(member));
                }
                Value::Enum(member) => member.value().clone(),
                other => other,
            };
            let coerced = self.base.invoke(record, raw).await?;
            self.enum_type.lookup(&coerced).ok_or_else(|| {
                ValidationError::value_error(format!(
                    "{} is not a valid {}",
                    coerced.repr(),
                    self.enum_type.name()
                ))
            })
        })
    }

    fn is_async(&self) -> bool {
        self.base.is_async()
    }
}

/// Coerces to the enum's underlying type, then looks the member up by value.
/// Without a resolvable underlying type the input is looked up as is.
pub(super) fn enumeration(resolver: &Resolver, enum_type: &Arc<EnumType>) -> Validator {
    let base = enum_type
        .base_type()
        .and_then(|tp| resolver.resolve(tp).ok())
        .unwrap_or_else(scalar::any);
    let name = enum_type.name().to_owned();
    Validator::from_parts(
        EnumCoercion {
            enum_type: Arc::clone(enum_type),
            base,
        },
        false,
        name,
    )
}

// ============================================================================
// RECORDS
// ============================================================================

/// Passes instances of the record type through and creates one from
/// anything else, forwarding the enclosing record's extras.
struct RecordCoercion {
    model: Arc<RecordType>,
}

impl Coerce<Value> for RecordCoercion {
    fn coerce<'a>(&'a self, record: &'a Record, value: Value) -> Invocation<'a, Value> {
        drive(self.model.name(), self.is_async(), async move {
            let overlay = record.get_extras(true);
            self.model
                .create_with(value, overlay)
                .await
                .map(Value::Record)
        })
    }

    fn is_async(&self) -> bool {
        self.model.is_async()
    }
}

pub(super) fn record(model: &Arc<RecordType>) -> Validator {
    let name = model.name().to_owned();
    Validator::from_parts(
        RecordCoercion {
            model: Arc::clone(model),
        },
        false,
        name,
    )
}

// ============================================================================
// TUPLES
// ============================================================================

/// Validates positions through a synthesized record and rebuilds a tuple in
/// field order.
struct TupleCoercion {
    model: Arc<RecordType>,
}

impl TupleCoercion {
    fn mapping(&self, value: Value) -> Result<Mapping, ValidationError> {
        let items = match value {
            Value::Map(map) => return Ok(into_mapping(map)),
            Value::List(items) | Value::Tuple(items) => items,
            Value::Set(items) => items.into_iter().collect(),
            other => {
                return Err(ValidationError::type_error(format!(
                    "Expected iterable, got {}",
                    other.type_name()
                )));
            }
        };
        Ok(self.model.fields().keys().cloned().zip(items).collect())
    }
}

impl Coerce<Value> for TupleCoercion {
    fn coerce<'a>(&'a self, _record: &'a Record, value: Value) -> Invocation<'a, Value> {
        drive(self.model.name(), self.is_async(), async move {
            let validated = self.model.validate(self.mapping(value)?).await?;
            Ok(Value::Tuple(
                self.model
                    .fields()
                    .keys()
                    .filter_map(|attr| validated.get(attr).cloned())
                    .collect(),
            ))
        })
    }

    fn is_async(&self) -> bool {
        self.model.is_async()
    }
}

fn tuple_validator(model: Arc<RecordType>) -> Validator {
    let name = model.name().to_owned();
    Validator::from_parts(TupleCoercion { model }, false, name)
}

pub(super) fn tuple(resolver: &Resolver, items: &[TypeDescriptor]) -> Result<Validator, ResolveError> {
    let model = items
        .iter()
        .enumerate()
        .fold(
            RecordType::builder("Tuple").config(resolver.config().clone()),
            |builder, (i, tp)| builder.field(format!("field_{i}"), Field::new(tp.clone())),
        )
        .build()?;
    Ok(tuple_validator(model))
}

pub(super) fn named_tuple(
    resolver: &Resolver,
    named: &Arc<NamedTupleType>,
) -> Result<Validator, ResolveError> {
    let mut builder = RecordType::builder(named.name()).config(resolver.config().clone());
    for position in &named.fields {
        let mut field = Field::new(position.tp.clone().unwrap_or(TypeDescriptor::Any));
        if let Some(default) = &position.default {
            field = field.default(default.clone());
        }
        builder = builder.field(position.name.clone(), field);
    }
    Ok(tuple_validator(builder.build()?))
}

// ============================================================================
// TYPED DICTS
// ============================================================================

struct TypedDictCoercion {
    model: Arc<RecordType>,
}

impl Coerce<Value> for TypedDictCoercion {
    fn coerce<'a>(&'a self, _record: &'a Record, value: Value) -> Invocation<'a, Value> {
        drive(self.model.name(), self.is_async(), async move {
            let map = match value {
                Value::Map(map) => map,
                other => {
                    return Err(ValidationError::type_error(format!(
                        "Expected mapping, got {}",
                        other.type_name()
                    )));
                }
            };
            let validated = self.model.validate(into_mapping(map)).await?;
            Ok(Value::from(validated))
        })
    }

    fn is_async(&self) -> bool {
        self.model.is_async()
    }
}

/// Required keys keep their type; other keys become optional and default
/// to `Null`.
pub(super) fn typed_dict(
    resolver: &Resolver,
    typed: &Arc<TypedDictType>,
) -> Result<Validator, ResolveError> {
    let mut builder = RecordType::builder(typed.name()).config(resolver.config().clone());
    for (key, (tp, required)) in &typed.keys {
        let field = if *required {
            Field::new(tp.clone())
        } else {
            Field::new(TypeDescriptor::optional(tp.clone())).default(Value::Null)
        };
        builder = builder.field(key.clone(), field);
    }
    let model = builder.build()?;
    let name = model.name().to_owned();
    Ok(Validator::from_parts(TypedDictCoercion { model }, false, name))
}
