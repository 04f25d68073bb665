//! Validator resolution
//!
//! Maps a [`TypeDescriptor`] to the [`Validator`] that coerces values of that
//! type. Resolution happens once per field when a record type is built; the
//! resulting validators are reused by every validation of that record type.
//!
//! Descriptors are normalized first:
//!
//! - `Annotated` becomes its effective type;
//! - free type variables become their bound, the union of their
//!   constraints, or `Any`;
//! - `Optional[T]` becomes `Union[None, T]`;
//! - unions are flattened, de-duplicated and `None` is moved first; with
//!   [`ModelConfig::prefer_float_in_unions`] `int` is dropped next to `float`;
//! - single-member unions are unwrapped.
//!
//! Dispatch then goes from most to least specific: unions, scalars, enums,
//! records, fixed tuples, named tuples, typed dicts, mappings, collections,
//! literals, custom hooks and finally plain instance checks.

mod composite;
mod scalar;
mod structured;

use std::collections::HashSet;

use dashmap::DashMap;
use indexmap::IndexMap;
use tracing::trace;

use crate::config::ModelConfig;
use crate::descriptor::TypeDescriptor;
use crate::error::{Error, ResolveError};
use crate::order::Order;
use crate::record::Record;
use crate::validator::Validator;
use crate::value::Value;

// ============================================================================
// RESOLVER
// ============================================================================

/// Resolves type descriptors into validators and memoizes the result.
///
/// # Examples
///
/// ```rust,ignore
/// use nebula_model::prelude::*;
///
/// let resolver = Resolver::default();
/// let ids = resolver.resolve(&TypeDescriptor::list(TypeDescriptor::Int))?;
/// let out = ids.call_sync(&Record::empty(), Value::from(serde_json::json!(["1", 2])))?;
/// ```
#[derive(Debug, Default)]
pub struct Resolver {
    config: ModelConfig,
    bindings: IndexMap<String, TypeDescriptor>,
    cache: DashMap<String, Validator>,
}

impl Resolver {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            bindings: IndexMap::new(),
            cache: DashMap::new(),
        }
    }

    /// Binds a type variable for every descriptor this resolver sees.
    #[must_use = "builder methods must be chained or built"]
    pub fn bind(mut self, name: impl Into<String>, tp: TypeDescriptor) -> Self {
        self.bindings.insert(name.into(), tp);
        self
    }

    pub const fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Number of memoized validators.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Returns the validator for `tp`, ordered in the ANNOTATION band and
    /// tagged with the normalized type.
    pub fn resolve(&self, tp: &TypeDescriptor) -> Result<Validator, ResolveError> {
        let tp = self.normalize(&tp.substitute(&self.bindings));
        let key = tp.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            trace!(tp = %tp, "resolved from cache");
            return Ok(hit.clone());
        }

        let validator = self
            .dispatch(&tp)?
            .with_order(Order::ANNOTATION)
            .with_tp(tp);
        self.cache.insert(key, validator.clone());
        Ok(validator)
    }

    /// Normalizes the top level of a descriptor.
    pub fn normalize(&self, tp: &TypeDescriptor) -> TypeDescriptor {
        match tp {
            TypeDescriptor::Annotated { effective, .. } => self.normalize(effective),
            TypeDescriptor::TypeVar(var) => self.normalize(&var.fallback()),
            TypeDescriptor::Optional(inner) => {
                self.normalize_union([&TypeDescriptor::None, &**inner])
            }
            TypeDescriptor::Union(members) => self.normalize_union(members),
            other => other.clone(),
        }
    }

    fn normalize_union<'t>(
        &self,
        members: impl IntoIterator<Item = &'t TypeDescriptor>,
    ) -> TypeDescriptor {
        let mut seen = HashSet::new();
        let mut flat = Vec::new();
        for member in members {
            let parts = match self.normalize(member) {
                TypeDescriptor::Union(inner) => inner,
                single => vec![single],
            };
            for part in parts {
                if seen.insert(part.cache_key()) {
                    flat.push(part);
                }
            }
        }

        if self.config.prefer_float_in_unions
            && flat.iter().any(|m| matches!(m, TypeDescriptor::Float))
        {
            flat.retain(|m| !matches!(m, TypeDescriptor::Int));
        }
        if let Some(pos) = flat.iter().position(TypeDescriptor::is_none) {
            let none = flat.remove(pos);
            flat.insert(0, none);
        }

        if flat.len() == 1
            && let Some(only) = flat.pop()
        {
            return only;
        }
        TypeDescriptor::Union(flat)
    }

    fn dispatch(&self, tp: &TypeDescriptor) -> Result<Validator, ResolveError> {
        use TypeDescriptor as T;

        Ok(match tp {
            T::Union(members) if members.is_empty() => return Err(ResolveError::EmptyUnion),
            T::Union(members) => composite::union(
                members
                    .iter()
                    .map(|member| self.resolve(member))
                    .collect::<Result<_, _>>()?,
            ),
            T::Optional(_) | T::Annotated { .. } | T::TypeVar(_) => {
                return self.dispatch(&self.normalize(tp));
            }

            T::Any => scalar::any(),
            T::None => composite::literal(vec![Value::Null]).named("None"),
            T::Int => scalar::int(),
            T::Float => scalar::float(),
            T::Str => scalar::str(),
            T::Bytes => scalar::bytes(),
            T::Bool => scalar::bool(),
            T::DateTime => scalar::datetime(),
            T::Duration => scalar::duration(),

            T::Enum(enum_type) => structured::enumeration(self, enum_type),
            T::Record(record) => structured::record(record),
            T::Generic { record, args } => structured::record(&record.specialize(args.clone())?),
            T::Tuple(items) => structured::tuple(self, items)?,
            T::NamedTuple(named) => structured::named_tuple(self, named)?,
            T::TypedDict(typed) => structured::typed_dict(self, typed)?,

            T::Mapping { key, value } => composite::mapping(
                key.as_deref().map(|k| self.resolve(k)).transpose()?,
                value.as_deref().map(|v| self.resolve(v)).transpose()?,
            ),
            T::Collection { kind, item } => composite::collection(
                kind.concrete(),
                item.as_deref().map(|i| self.resolve(i)).transpose()?,
            ),
            T::Literal(values) => composite::literal(values.clone()),

            T::Custom(custom) => custom.validator().clone(),
            T::Instance(kind) => scalar::instance(*kind),
            T::Opaque(name) => scalar::opaque(name.clone()),
            T::Protocol(name) => return Err(ResolveError::UnknownType(name.to_string())),
        })
    }
}

// ============================================================================
// ONE-SHOT HELPERS
// ============================================================================

/// Resolves with default configuration and no bindings.
pub fn resolve(tp: &TypeDescriptor) -> Result<Validator, ResolveError> {
    Resolver::default().resolve(tp)
}

/// Coerces `value` to `tp` outside of any record.
pub async fn cast(tp: &TypeDescriptor, value: impl Into<Value>) -> Result<Value, Error> {
    let validator = resolve(tp)?;
    let record = Record::empty();
    Ok(validator.call(&record, value.into()).await?)
}

/// Synchronous [`cast`].
pub fn cast_sync(tp: &TypeDescriptor, value: impl Into<Value>) -> Result<Value, Error> {
    let validator = resolve(tp)?;
    let record = Record::empty();
    Ok(validator.call_sync(&record, value.into())?)
}
