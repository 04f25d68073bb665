//! Dynamic values flowing through validation
//!
//! Raw input and coerced output share one closed [`Value`] type. Input usually
//! arrives as JSON (see the `From<serde_json::Value>` conversion) and leaves
//! through the manual [`Serialize`] implementation.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::config::AsDictOptions;
use crate::record::Record;

/// Field map carried through the record engine, keyed by attribute or wire name.
pub type Mapping = IndexMap<String, Value>;

// ============================================================================
// VALUE KIND
// ============================================================================

/// Discriminant of a [`Value`], used in messages and instance checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    DateTime,
    NaiveDateTime,
    Duration,
    List,
    Tuple,
    Set,
    Map,
    Enum,
    Record,
    Opaque,
}

impl ValueKind {
    /// Short type name as it appears in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "NoneType",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Bytes => "bytes",
            Self::DateTime | Self::NaiveDateTime => "datetime",
            Self::Duration => "timedelta",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Set => "set",
            Self::Map => "dict",
            Self::Enum => "enum",
            Self::Record => "record",
            Self::Opaque => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// ENUM MEMBERS AND OPAQUE VALUES
// ============================================================================

/// A member of a declared enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumMember {
    enum_name: Arc<str>,
    name: Arc<str>,
    value: Box<Value>,
}

impl EnumMember {
    pub(crate) fn new(enum_name: Arc<str>, name: Arc<str>, value: Value) -> Self {
        Self {
            enum_name,
            name,
            value: Box::new(value),
        }
    }

    /// Name of the enumeration this member belongs to.
    pub fn enum_name(&self) -> &str {
        &self.enum_name
    }

    /// Member name, e.g. `RED`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying member value.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// A host value the engine cannot look into.
///
/// Only identity and the declared type name are observable; opaque values
/// are matched by [`TypeDescriptor::Opaque`](crate::descriptor::TypeDescriptor::Opaque).
#[derive(Clone)]
pub struct OpaqueValue {
    type_name: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl OpaqueValue {
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<Arc<str>>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }
}

impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for OpaqueValue {}

impl Hash for OpaqueValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name.hash(state);
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} object>", self.type_name)
    }
}

// ============================================================================
// VALUE
// ============================================================================

/// A dynamically typed value.
///
/// `Value` is `Eq + Hash` so it can be used as a set member or mapping key:
/// floats compare by bit pattern, and maps, sets and records hash by size
/// only so that their order-independent equality stays consistent.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Timezone-aware timestamp.
    DateTime(DateTime<FixedOffset>),
    /// Timestamp without timezone; coerced values are always aware.
    NaiveDateTime(NaiveDateTime),
    Duration(TimeDelta),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(IndexSet<Value>),
    Map(IndexMap<Value, Value>),
    Enum(EnumMember),
    Record(Record),
    Opaque(OpaqueValue),
}

impl Value {
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::DateTime(_) => ValueKind::DateTime,
            Self::NaiveDateTime(_) => ValueKind::NaiveDateTime,
            Self::Duration(_) => ValueKind::Duration,
            Self::List(_) => ValueKind::List,
            Self::Tuple(_) => ValueKind::Tuple,
            Self::Set(_) => ValueKind::Set,
            Self::Map(_) => ValueKind::Map,
            Self::Enum(_) => ValueKind::Enum,
            Self::Record(_) => ValueKind::Record,
            Self::Opaque(_) => ValueKind::Opaque,
        }
    }

    /// Type name used in messages: the record, enum or opaque type name when
    /// there is one, otherwise the kind name.
    pub fn type_name(&self) -> Cow<'_, str> {
        match self {
            Self::Record(record) => Cow::Borrowed(record.model().name()),
            Self::Enum(member) => Cow::Borrowed(member.enum_name()),
            Self::Opaque(opaque) => Cow::Borrowed(opaque.type_name()),
            other => Cow::Borrowed(other.kind().name()),
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Items of a list or tuple.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) | Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub const fn as_map(&self) -> Option<&IndexMap<Value, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub const fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    pub const fn as_enum(&self) -> Option<&EnumMember> {
        match self {
            Self::Enum(member) => Some(member),
            _ => None,
        }
    }

    /// Looks up a string key in a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?.get(&Self::Str(key.to_owned()))
    }

    /// Truthiness: empty and zero values are false, everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Bytes(b) => !b.is_empty(),
            Self::Duration(d) => !d.is_zero(),
            Self::List(items) | Self::Tuple(items) => !items.is_empty(),
            Self::Set(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
            Self::DateTime(_)
            | Self::NaiveDateTime(_)
            | Self::Enum(_)
            | Self::Record(_)
            | Self::Opaque(_) => true,
        }
    }

    /// String form of a mapping key. Strings are used verbatim.
    pub fn key_string(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Quoted, nesting-aware representation, e.g. `'abc'` or `[1, 'a']`.
    pub fn repr(&self) -> String {
        Repr(self).to_string()
    }

    /// Converts into a JSON value.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn write_repr(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write_float(f, *x),
            Self::Str(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Self::Bytes(b) => write!(f, "b'{}'", b.escape_ascii()),
            Self::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
            Self::NaiveDateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            Self::Duration(d) => {
                write_float(f, duration_seconds(*d))?;
                f.write_str("s")
            }
            Self::List(items) => write_seq(f, "[", "]", items),
            Self::Tuple(items) if items.len() == 1 => write!(f, "({},)", Repr(&items[0])),
            Self::Tuple(items) => write_seq(f, "(", ")", items),
            Self::Set(items) if items.is_empty() => f.write_str("set()"),
            Self::Set(items) => write_seq(f, "{", "}", items),
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", Repr(key), Repr(value))?;
                }
                f.write_str("}")
            }
            Self::Enum(member) => write!(f, "{}.{}", member.enum_name(), member.name()),
            Self::Record(record) => write!(f, "{record}"),
            Self::Opaque(opaque) => write!(f, "{opaque:?}"),
        }
    }
}

struct Repr<'a>(&'a Value);

impl fmt::Display for Repr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.write_repr(f)
    }
}

fn write_seq<'a>(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    close: &str,
    items: impl IntoIterator<Item = &'a Value>,
) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item.write_repr(f)?;
    }
    f.write_str(close)
}

fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_nan() {
        f.write_str("nan")
    } else if x.is_infinite() {
        f.write_str(if x > 0.0 { "inf" } else { "-inf" })
    } else if x.fract() == 0.0 && x.abs() < 1e16 {
        write!(f, "{x:.1}")
    } else {
        write!(f, "{x}")
    }
}

pub(crate) fn duration_seconds(d: TimeDelta) -> f64 {
    d.num_seconds() as f64 + f64::from(d.subsec_nanos()) / 1e9
}

/// Converts an arbitrary-key map into a field mapping by stringifying keys.
pub(crate) fn into_mapping(map: IndexMap<Value, Value>) -> Mapping {
    map.into_iter().map(|(k, v)| (k.key_string(), v)).collect()
}

/// Plain display: strings print without quotes, everything else as [`Value::repr`].
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            other => other.write_repr(f),
        }
    }
}

// ============================================================================
// EQUALITY AND HASHING
// ============================================================================

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::NaiveDateTime(a), Self::NaiveDateTime(b)) => a == b,
            (Self::Duration(a), Self::Duration(b)) => a == b,
            (Self::List(a), Self::List(b)) | (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Enum(a), Self::Enum(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(x) => x.to_bits().hash(state),
            Self::Str(s) => s.hash(state),
            Self::Bytes(b) => b.hash(state),
            Self::DateTime(dt) => dt.hash(state),
            Self::NaiveDateTime(dt) => dt.hash(state),
            Self::Duration(d) => d.hash(state),
            Self::List(items) | Self::Tuple(items) => items.hash(state),
            Self::Set(items) => items.len().hash(state),
            Self::Map(map) => map.len().hash(state),
            Self::Enum(member) => member.hash(state),
            Self::Record(record) => {
                record.model().name().hash(state);
                record.values().len().hash(state);
            }
            Self::Opaque(opaque) => opaque.hash(state),
        }
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl From<Mapping> for Value {
    fn from(value: Mapping) -> Self {
        Self::Map(value.into_iter().map(|(k, v)| (Self::Str(k), v)).collect())
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::DateTime(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value.fixed_offset())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::NaiveDateTime(value)
    }
}

impl From<TimeDelta> for Value {
    fn from(value: TimeDelta) -> Self {
        Self::Duration(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Self::Record(value)
    }
}

impl From<OpaqueValue> for Value {
    fn from(value: OpaqueValue) -> Self {
        Self::Opaque(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::Str(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (Self::Str(k), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// SERIALIZATION
// ============================================================================

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Bytes(b) => {
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(b))
            }
            Self::DateTime(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            Self::NaiveDateTime(dt) => {
                serializer.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            Self::Duration(d) => serializer.serialize_f64(duration_seconds(*d)),
            Self::List(items) | Self::Tuple(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Set(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(&key.key_string(), value)?;
                }
                out.end()
            }
            Self::Enum(member) => member.value().serialize(serializer),
            Self::Record(record) => record
                .as_dict(&AsDictOptions::default())
                .serialize(serializer),
            Self::Opaque(opaque) => Err(S::Error::custom(format!(
                "cannot serialize opaque value of type {}",
                opaque.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn json_round_trips_plain_data() {
        let raw = json!({"id": 1, "tags": ["a", "b"], "score": 1.5, "extra": null});
        let value = Value::from(raw.clone());
        assert_eq!(value.to_json().unwrap(), raw);
    }

    #[test]
    fn repr_quotes_strings_and_nests() {
        let value = Value::from(json!(["a", 1, 2.0, null, true]));
        assert_eq!(value.repr(), "['a', 1, 2.0, None, True]");
        assert_eq!(Value::from("plain").to_string(), "plain");
        assert_eq!(Value::Tuple(vec![Value::Int(1)]).repr(), "(1,)");
    }

    #[test]
    fn floats_hash_by_bits() {
        let mut set = IndexSet::new();
        set.insert(Value::Float(1.0));
        set.insert(Value::Float(1.0));
        set.insert(Value::Int(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::from("0").is_truthy());
    }

    #[test]
    fn bytes_serialize_as_base64() {
        let value = Value::Bytes(b"hi".to_vec());
        assert_eq!(value.to_json().unwrap(), json!("aGk="));
    }

    #[test]
    fn opaque_values_do_not_serialize() {
        let value = Value::Opaque(OpaqueValue::new("Socket", 7_u32));
        assert!(value.to_json().is_err());
    }
}
