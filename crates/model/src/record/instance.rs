//! Record instances

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use super::{RecordType, engine};
use crate::config::AsDictOptions;
use crate::error::ValidationError;
use crate::validator::poll_once;
use crate::value::{Mapping, Value};

/// Extra consulted for the locale when [`AsDictOptions::locale`] is unset.
const LOCALE_EXTRA: &str = "locale";

/// A validated instance of a [`RecordType`].
///
/// Values are keyed by attribute name. Bound validators receive the instance
/// while it is being validated, so fields accepted in earlier phases are
/// already readable.
#[derive(Clone)]
pub struct Record {
    model: Arc<RecordType>,
    values: Mapping,
    extras: Mapping,
}

impl Record {
    pub(crate) fn new(model: Arc<RecordType>) -> Self {
        Self {
            model,
            values: Mapping::new(),
            extras: Mapping::new(),
        }
    }

    /// An instance of a field-less record type, for running validators
    /// outside of any record.
    pub fn empty() -> Self {
        Self::new(RecordType::detached())
    }

    pub const fn model(&self) -> &Arc<RecordType> {
        &self.model
    }

    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.values.get(attr)
    }

    pub const fn values(&self) -> &Mapping {
        &self.values
    }

    pub fn extra(&self, attr: &str) -> Option<&Value> {
        self.extras.get(attr)
    }

    pub(crate) fn set(&mut self, attr: &str, value: Value) {
        self.values.insert(attr.to_owned(), value);
    }

    pub(crate) fn set_extra(&mut self, attr: &str, value: Value) {
        self.extras.insert(attr.to_owned(), value);
    }

    /// Extras that have been set, keyed by wire alias or attribute name.
    pub fn get_extras(&self, alias: bool) -> Mapping {
        self.model
            .extras()
            .iter()
            .filter_map(|(attr, extra)| {
                let value = self.extras.get(attr)?;
                let key = if alias { extra.alias() } else { attr.as_str() };
                Some((key.to_owned(), value.clone()))
            })
            .collect()
    }

    /// Locale extra, matched by attribute name or wire alias.
    fn locale_extra(&self) -> Option<&str> {
        self.model
            .extras()
            .iter()
            .find(|(attr, extra)| attr.as_str() == LOCALE_EXTRA || extra.alias() == LOCALE_EXTRA)
            .and_then(|(attr, _)| self.extras.get(attr))
            .and_then(Value::as_str)
    }

    /// Serializes the instance into a mapping.
    ///
    /// Nested records are serialized with the same options; lists, tuples
    /// and sets become lists. A field's transform hook may rename the key and
    /// replace the value.
    pub fn as_dict(&self, options: &AsDictOptions) -> Mapping {
        let locale = options
            .locale
            .as_deref()
            .or_else(|| self.locale_extra());

        let mut out = Mapping::with_capacity(self.values.len());
        for (attr, field) in self.model.fields() {
            if field.is_private() && !options.private {
                continue;
            }
            let Some(value) = self.values.get(attr) else {
                continue;
            };

            let key = if options.alias { field.alias() } else { attr.as_str() };
            let value = serialize_attr(value, options);
            let (key, value) = match field.transform() {
                Some(transform) => (
                    transform.name(field, key, locale),
                    transform.value(field, value, locale),
                ),
                None => (key.to_owned(), value),
            };
            out.insert(key, value);
        }

        if options.properties {
            for property in self.model.properties().values() {
                if !property.is_excluded() {
                    out.insert(property.key().to_owned(), property.get(self));
                }
            }
        }
        out
    }

    /// JSON form of [`as_dict`](Self::as_dict) with default options.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Re-runs every phase of the record type against `obj`, extras included.
    pub async fn update(&mut self, obj: Mapping) -> Result<Mapping, ValidationError> {
        let model = Arc::clone(&self.model);
        engine::run(&model, obj, self, true).await
    }

    /// Synchronous [`update`](Self::update).
    pub fn update_sync(&mut self, obj: Mapping) -> Result<Mapping, ValidationError> {
        let model = Arc::clone(&self.model);
        poll_once(model.name(), engine::run(&model, obj, self, true))
    }
}

fn serialize_attr(value: &Value, options: &AsDictOptions) -> Value {
    match value {
        Value::Record(record) => Value::from(record.as_dict(options)),
        Value::List(items) | Value::Tuple(items) => {
            Value::List(items.iter().map(|item| serialize_attr(item, options)).collect())
        }
        Value::Set(items) => {
            Value::List(items.iter().map(|item| serialize_attr(item, options)).collect())
        }
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), serialize_attr(v, options)))
                .collect(),
        ),
        other => other.clone(),
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.model, &other.model)
            && self.values == other.values
            && self.extras == other.extras
    }
}

impl Eq for Record {}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.model.name())
            .field("values", &self.values)
            .field("extras", &self.extras)
            .finish()
    }
}

/// `User(id=1, name='ann')`
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.model.name())?;
        for (i, (attr, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{attr}={}", value.repr())?;
        }
        f.write_str(")")
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_dict(&AsDictOptions::default()).serialize(serializer)
    }
}
