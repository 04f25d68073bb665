//! Declared type descriptors
//!
//! [`TypeDescriptor`] is the closed set of declarable field types. Each one is
//! turned into a validator once, when a record type is built (see
//! [`resolve`](crate::resolve)). Descriptors are immutable and cheap to clone:
//! heavyweight parts live behind `Arc`.

use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::record::RecordType;
use crate::validator::Validator;
use crate::value::{EnumMember, Value, ValueKind};

// ============================================================================
// COLLECTION KINDS
// ============================================================================

/// Declared collection shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    List,
    /// Variable-length tuple (`tuple[T, ...]`).
    Tuple,
    Set,
    FrozenSet,
    Sequence,
    MutableSequence,
    MutableSet,
    AbstractSet,
    Iterable,
}

/// Concrete representation a collection is rebuilt into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concrete {
    List,
    Tuple,
    Set,
}

impl Concrete {
    pub const fn name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Set => "set",
        }
    }
}

impl CollectionKind {
    /// Abstract kinds map to a concrete container: mutable sequences to lists,
    /// sets to sets, and everything else to tuples.
    pub const fn concrete(self) -> Concrete {
        match self {
            Self::List | Self::MutableSequence => Concrete::List,
            Self::Set | Self::FrozenSet | Self::MutableSet | Self::AbstractSet => Concrete::Set,
            Self::Tuple | Self::Sequence | Self::Iterable => Concrete::Tuple,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Set => "set",
            Self::FrozenSet => "frozenset",
            Self::Sequence => "Sequence",
            Self::MutableSequence => "MutableSequence",
            Self::MutableSet => "MutableSet",
            Self::AbstractSet => "AbstractSet",
            Self::Iterable => "Iterable",
        }
    }
}

// ============================================================================
// TYPE VARIABLES
// ============================================================================

/// A type parameter of a generic record type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeVar {
    name: Cow<'static, str>,
    bound: Option<Box<TypeDescriptor>>,
    constraints: Vec<TypeDescriptor>,
}

impl TypeVar {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            bound: None,
            constraints: Vec::new(),
        }
    }

    /// Unbound occurrences resolve to `bound`.
    #[must_use = "builder methods must be chained or built"]
    pub fn bound(mut self, bound: TypeDescriptor) -> Self {
        self.bound = Some(Box::new(bound));
        self
    }

    /// Unbound occurrences resolve to the union of `constraints`.
    #[must_use = "builder methods must be chained or built"]
    pub fn constraints(mut self, constraints: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        self.constraints = constraints.into_iter().collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// What an occurrence without a binding resolves to.
    pub fn fallback(&self) -> TypeDescriptor {
        if let Some(bound) = &self.bound {
            (**bound).clone()
        } else if !self.constraints.is_empty() {
            TypeDescriptor::Union(self.constraints.clone())
        } else {
            TypeDescriptor::Any
        }
    }
}

// ============================================================================
// STRUCTURED TYPES
// ============================================================================

/// A declared enumeration: named members over an optional underlying type.
#[derive(Debug, Clone)]
pub struct EnumType {
    name: Arc<str>,
    base: Option<TypeDescriptor>,
    members: Vec<(Arc<str>, Value)>,
}

impl EnumType {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            base: None,
            members: Vec::new(),
        }
    }

    /// Input is coerced to `base` before the member lookup.
    #[must_use = "builder methods must be chained or built"]
    pub fn base(mut self, base: TypeDescriptor) -> Self {
        self.base = Some(base);
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn member(mut self, name: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.members.push((name.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn base_type(&self) -> Option<&TypeDescriptor> {
        self.base.as_ref()
    }

    /// Member by name, e.g. `Color::RED`.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.members
            .iter()
            .find(|(member, _)| &**member == name)
            .map(|(member, value)| self.wrap(member, value))
    }

    /// Member whose value equals `value`.
    pub fn lookup(&self, value: &Value) -> Option<Value> {
        self.members
            .iter()
            .find(|(_, candidate)| candidate == value)
            .map(|(member, value)| self.wrap(member, value))
    }

    fn wrap(&self, member: &Arc<str>, value: &Value) -> Value {
        Value::Enum(EnumMember::new(
            Arc::clone(&self.name),
            Arc::clone(member),
            value.clone(),
        ))
    }
}

/// A fixed-arity tuple with named positions.
#[derive(Debug, Clone)]
pub struct NamedTupleType {
    pub(crate) name: String,
    pub(crate) fields: Vec<NamedTupleField>,
}

#[derive(Debug, Clone)]
pub(crate) struct NamedTupleField {
    pub(crate) name: String,
    pub(crate) tp: Option<TypeDescriptor>,
    pub(crate) default: Option<Value>,
}

impl NamedTupleType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn field(mut self, name: impl Into<String>, tp: TypeDescriptor) -> Self {
        self.fields.push(NamedTupleField {
            name: name.into(),
            tp: Some(tp),
            default: None,
        });
        self
    }

    /// Position without a declared type; accepts anything.
    #[must_use = "builder methods must be chained or built"]
    pub fn untyped(mut self, name: impl Into<String>) -> Self {
        self.fields.push(NamedTupleField {
            name: name.into(),
            tp: None,
            default: None,
        });
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        tp: TypeDescriptor,
        default: impl Into<Value>,
    ) -> Self {
        self.fields.push(NamedTupleField {
            name: name.into(),
            tp: Some(tp),
            default: Some(default.into()),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }
}

/// A mapping with a fixed set of typed keys.
#[derive(Debug, Clone)]
pub struct TypedDictType {
    pub(crate) name: String,
    pub(crate) keys: IndexMap<String, (TypeDescriptor, bool)>,
}

impl TypedDictType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: IndexMap::new(),
        }
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn required(mut self, key: impl Into<String>, tp: TypeDescriptor) -> Self {
        self.keys.insert(key.into(), (tp, true));
        self
    }

    /// Key that may be absent; it is filled with `Null`.
    #[must_use = "builder methods must be chained or built"]
    pub fn optional(mut self, key: impl Into<String>, tp: TypeDescriptor) -> Self {
        self.keys.insert(key.into(), (tp, false));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An opaque type that supplies its own validator.
#[derive(Debug, Clone)]
pub struct CustomType {
    name: String,
    validator: Validator,
}

impl CustomType {
    pub fn new(name: impl Into<String>, validator: Validator) -> Self {
        Self {
            name: name.into(),
            validator,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn validator(&self) -> &Validator {
        &self.validator
    }
}

// ============================================================================
// TYPE DESCRIPTOR
// ============================================================================

/// A declared field type.
#[derive(Debug, Clone)]
pub enum TypeDescriptor {
    /// Accepts anything unchanged.
    Any,
    /// Only `Null`.
    None,
    Int,
    Float,
    Str,
    Bytes,
    Bool,
    DateTime,
    Duration,
    Literal(Vec<Value>),
    Enum(Arc<EnumType>),
    Optional(Box<TypeDescriptor>),
    Union(Vec<TypeDescriptor>),
    /// Homogeneous collection; `item: None` leaves items untouched.
    Collection {
        kind: CollectionKind,
        item: Option<Box<TypeDescriptor>>,
    },
    /// Key/value mapping; `None` parts are left untouched.
    Mapping {
        key: Option<Box<TypeDescriptor>>,
        value: Option<Box<TypeDescriptor>>,
    },
    Record(Arc<RecordType>),
    /// A generic record type instantiated with arguments.
    Generic {
        record: Arc<RecordType>,
        args: Vec<TypeDescriptor>,
    },
    /// Fixed-arity tuple.
    Tuple(Vec<TypeDescriptor>),
    NamedTuple(Arc<NamedTupleType>),
    TypedDict(Arc<TypedDictType>),
    TypeVar(TypeVar),
    /// `declared` is kept for introspection, `effective` drives validation.
    Annotated {
        declared: Box<TypeDescriptor>,
        effective: Box<TypeDescriptor>,
    },
    Custom(Arc<CustomType>),
    /// Accepts values of one kind unchanged.
    Instance(ValueKind),
    /// Accepts opaque values with this type name unchanged.
    Opaque(Cow<'static, str>),
    /// A structural type with no runtime check; fails resolution.
    Protocol(Cow<'static, str>),
}

impl TypeDescriptor {
    pub fn optional(inner: Self) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn union(members: impl IntoIterator<Item = Self>) -> Self {
        Self::Union(members.into_iter().collect())
    }

    pub fn literal<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::Literal(values.into_iter().map(Into::into).collect())
    }

    pub fn collection(kind: CollectionKind, item: Self) -> Self {
        Self::Collection {
            kind,
            item: Some(Box::new(item)),
        }
    }

    /// Unparameterized collection.
    pub const fn bare(kind: CollectionKind) -> Self {
        Self::Collection { kind, item: None }
    }

    pub fn list(item: Self) -> Self {
        Self::collection(CollectionKind::List, item)
    }

    pub fn set(item: Self) -> Self {
        Self::collection(CollectionKind::Set, item)
    }

    pub fn sequence(item: Self) -> Self {
        Self::collection(CollectionKind::Sequence, item)
    }

    pub fn mapping(key: Self, value: Self) -> Self {
        Self::Mapping {
            key: Some(Box::new(key)),
            value: Some(Box::new(value)),
        }
    }

    /// Unparameterized mapping.
    pub const fn bare_mapping() -> Self {
        Self::Mapping {
            key: None,
            value: None,
        }
    }

    pub fn record(record: &Arc<RecordType>) -> Self {
        Self::Record(Arc::clone(record))
    }

    pub fn generic(record: &Arc<RecordType>, args: impl IntoIterator<Item = Self>) -> Self {
        Self::Generic {
            record: Arc::clone(record),
            args: args.into_iter().collect(),
        }
    }

    pub fn tuple(items: impl IntoIterator<Item = Self>) -> Self {
        Self::Tuple(items.into_iter().collect())
    }

    pub fn enumeration(enum_type: EnumType) -> Self {
        Self::Enum(Arc::new(enum_type))
    }

    pub fn named_tuple(named_tuple: NamedTupleType) -> Self {
        Self::NamedTuple(Arc::new(named_tuple))
    }

    pub fn typed_dict(typed_dict: TypedDictType) -> Self {
        Self::TypedDict(Arc::new(typed_dict))
    }

    pub fn typevar(name: impl Into<Cow<'static, str>>) -> Self {
        Self::TypeVar(TypeVar::new(name))
    }

    pub fn annotated(declared: Self, effective: Self) -> Self {
        Self::Annotated {
            declared: Box::new(declared),
            effective: Box::new(effective),
        }
    }

    /// Keeps `declared` for introspection but disables its validator.
    pub fn untyped(declared: Self) -> Self {
        Self::annotated(declared, Self::Any)
    }

    pub fn custom(name: impl Into<String>, validator: Validator) -> Self {
        Self::Custom(Arc::new(CustomType::new(name, validator)))
    }

    pub fn opaque(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Opaque(name.into())
    }

    pub fn protocol(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Protocol(name.into())
    }

    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Replaces type variables named in `bindings`, one level deep: bound
    /// types are inserted as-is and not substituted again.
    #[must_use]
    pub fn substitute(&self, bindings: &IndexMap<String, Self>) -> Self {
        if bindings.is_empty() {
            return self.clone();
        }
        let sub = |tp: &Self| tp.substitute(bindings);
        let sub_box = |tp: &Self| Box::new(tp.substitute(bindings));
        match self {
            Self::TypeVar(var) => bindings
                .get(var.name())
                .cloned()
                .unwrap_or_else(|| self.clone()),
            Self::Optional(inner) => Self::Optional(sub_box(inner)),
            Self::Union(members) => Self::Union(members.iter().map(sub).collect()),
            Self::Collection { kind, item } => Self::Collection {
                kind: *kind,
                item: item.as_deref().map(sub_box),
            },
            Self::Mapping { key, value } => Self::Mapping {
                key: key.as_deref().map(sub_box),
                value: value.as_deref().map(sub_box),
            },
            Self::Generic { record, args } => Self::Generic {
                record: Arc::clone(record),
                args: args.iter().map(sub).collect(),
            },
            Self::Tuple(items) => Self::Tuple(items.iter().map(sub).collect()),
            Self::Annotated {
                declared,
                effective,
            } => Self::Annotated {
                declared: sub_box(declared),
                effective: sub_box(effective),
            },
            other => other.clone(),
        }
    }

    /// Identity key for memoizing resolution. Arc-backed types are keyed by
    /// address as well as by name.
    pub fn cache_key(&self) -> String {
        let mut key = String::new();
        // writing to a String cannot fail
        let _ = self.render(&mut key, true);
        key
    }

    fn render(&self, out: &mut String, keyed: bool) -> fmt::Result {
        let list = |out: &mut String, items: &[Self]| -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                item.render(out, keyed)?;
            }
            Ok(())
        };
        let addr = |out: &mut String, ptr: *const ()| -> fmt::Result {
            if keyed {
                write!(out, "@{ptr:p}")?;
            }
            Ok(())
        };
        match self {
            Self::Any => out.write_str("Any"),
            Self::None => out.write_str("None"),
            Self::Int => out.write_str("int"),
            Self::Float => out.write_str("float"),
            Self::Str => out.write_str("str"),
            Self::Bytes => out.write_str("bytes"),
            Self::Bool => out.write_str("bool"),
            Self::DateTime => out.write_str("datetime"),
            Self::Duration => out.write_str("timedelta"),
            Self::Literal(values) => {
                out.write_str("Literal[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    out.write_str(&value.repr())?;
                }
                out.write_str("]")
            }
            Self::Enum(enum_type) => {
                out.write_str(enum_type.name())?;
                addr(out, Arc::as_ptr(enum_type).cast())
            }
            Self::Optional(inner) => {
                out.write_str("Optional[")?;
                inner.render(out, keyed)?;
                out.write_str("]")
            }
            Self::Union(members) => {
                out.write_str("Union[")?;
                list(out, members)?;
                out.write_str("]")
            }
            Self::Collection { kind, item } => {
                out.write_str(kind.name())?;
                if let Some(item) = item {
                    out.write_str("[")?;
                    item.render(out, keyed)?;
                    if *kind == CollectionKind::Tuple {
                        out.write_str(", ...")?;
                    }
                    out.write_str("]")?;
                }
                Ok(())
            }
            Self::Mapping { key, value } => {
                out.write_str("dict")?;
                if key.is_some() || value.is_some() {
                    out.write_str("[")?;
                    key.as_deref().unwrap_or(&Self::Any).render(out, keyed)?;
                    out.write_str(", ")?;
                    value.as_deref().unwrap_or(&Self::Any).render(out, keyed)?;
                    out.write_str("]")?;
                }
                Ok(())
            }
            Self::Record(record) => {
                out.write_str(record.name())?;
                addr(out, Arc::as_ptr(record).cast())
            }
            Self::Generic { record, args } => {
                out.write_str(record.name())?;
                addr(out, Arc::as_ptr(record).cast())?;
                out.write_str("[")?;
                list(out, args)?;
                out.write_str("]")
            }
            Self::Tuple(items) => {
                out.write_str("tuple[")?;
                list(out, items)?;
                out.write_str("]")
            }
            Self::NamedTuple(named) => {
                out.write_str(named.name())?;
                addr(out, Arc::as_ptr(named).cast())
            }
            Self::TypedDict(typed) => {
                out.write_str(typed.name())?;
                addr(out, Arc::as_ptr(typed).cast())
            }
            Self::TypeVar(var) => {
                out.write_str("~")?;
                out.write_str(var.name())
            }
            Self::Annotated {
                declared,
                effective,
            } => {
                out.write_str("Annotated[")?;
                declared.render(out, keyed)?;
                out.write_str(", ")?;
                effective.render(out, keyed)?;
                out.write_str("]")
            }
            Self::Custom(custom) => {
                out.write_str(custom.name())?;
                addr(out, Arc::as_ptr(custom).cast())
            }
            Self::Instance(kind) => out.write_str(kind.name()),
            Self::Opaque(name) | Self::Protocol(name) => out.write_str(name),
        }
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.cache_key() == other.cache_key()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut out, false)?;
        f.write_str(&out)
    }
}

impl From<ValueKind> for TypeDescriptor {
    fn from(kind: ValueKind) -> Self {
        Self::Instance(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_reads_like_annotations() {
        let tp = TypeDescriptor::mapping(
            TypeDescriptor::Str,
            TypeDescriptor::optional(TypeDescriptor::list(TypeDescriptor::Int)),
        );
        assert_eq!(tp.to_string(), "dict[str, Optional[list[int]]]");
        assert_eq!(
            TypeDescriptor::collection(CollectionKind::Tuple, TypeDescriptor::Float).to_string(),
            "tuple[float, ...]"
        );
    }

    #[test]
    fn substitution_is_single_step() {
        let mut bindings = IndexMap::new();
        bindings.insert("T".to_owned(), TypeDescriptor::typevar("U"));
        bindings.insert("U".to_owned(), TypeDescriptor::Int);
        let tp = TypeDescriptor::list(TypeDescriptor::typevar("T"));
        assert_eq!(tp.substitute(&bindings).to_string(), "list[~U]");
    }

    #[test]
    fn typevar_fallbacks() {
        assert_eq!(TypeVar::new("T").fallback(), TypeDescriptor::Any);
        assert_eq!(
            TypeVar::new("T").bound(TypeDescriptor::Int).fallback(),
            TypeDescriptor::Int
        );
        assert_eq!(
            TypeVar::new("T")
                .constraints([TypeDescriptor::Int, TypeDescriptor::Str])
                .fallback()
                .to_string(),
            "Union[int, str]"
        );
    }

    #[test]
    fn enum_lookup_by_value_and_name() {
        let color = EnumType::new("Color").member("RED", 1).member("BLUE", 2);
        let red = color.lookup(&Value::Int(1)).unwrap();
        assert_eq!(red.repr(), "Color.RED");
        assert_eq!(color.get("BLUE").unwrap().as_enum().unwrap().value(), &Value::Int(2));
        assert!(color.lookup(&Value::Int(3)).is_none());
    }
}
