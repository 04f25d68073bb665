//! Field, extra and property declarations
//!
//! A [`Field`] is what a user declares; a [`FieldDescriptor`] is what a built
//! [`RecordType`](crate::record::RecordType) keeps: the wire alias, default,
//! privacy flag and the sorted validator list with the type-derived
//! validator in the ANNOTATION band.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::descriptor::TypeDescriptor;
use crate::error::ResolveError;
use crate::order::Phase;
use crate::record::Record;
use crate::resolve::Resolver;
use crate::validator::Validator;
use crate::value::Value;

// ============================================================================
// DEFAULTS
// ============================================================================

/// Value used when a field is absent from the input.
#[derive(Clone, Default)]
pub enum FieldDefault {
    /// The field must be present.
    #[default]
    Required,
    Value(Value),
    /// Called once per validation that needs the default.
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl FieldDefault {
    pub const fn is_required(&self) -> bool {
        matches!(self, Self::Required)
    }

    /// Produces the default, if there is one.
    pub fn get(&self) -> Option<Value> {
        match self {
            Self::Required => None,
            Self::Value(value) => Some(value.clone()),
            Self::Factory(factory) => Some(factory()),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("Required"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

// ============================================================================
// TRANSFORM HOOK
// ============================================================================

/// Rewrites a field's key and value during [`Record::as_dict`].
///
/// Both methods default to the identity, so an implementation only
/// overrides what it localizes.
pub trait FieldTransform: Send + Sync {
    fn name(&self, field: &FieldDescriptor, name: &str, locale: Option<&str>) -> String {
        let _ = (field, locale);
        name.to_owned()
    }

    fn value(&self, field: &FieldDescriptor, value: Value, locale: Option<&str>) -> Value {
        let _ = (field, locale);
        value
    }
}

/// Locale → key → localized string.
///
/// Field names are looked up by their serialized key and string values by
/// their content; anything without an entry is left as is.
///
/// # Examples
///
/// ```rust,ignore
/// let i18n = Translations::new()
///     .insert("de", "name", "Name")
///     .insert("de", "red", "rot");
///
/// let field = Field::new(TypeDescriptor::Str).transform(i18n);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Translations {
    table: IndexMap<String, IndexMap<String, String>>,
}

impl Translations {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn insert(
        mut self,
        locale: impl Into<String>,
        key: impl Into<String>,
        localized: impl Into<String>,
    ) -> Self {
        self.table
            .entry(locale.into())
            .or_default()
            .insert(key.into(), localized.into());
        self
    }

    pub fn get(&self, locale: &str, key: &str) -> Option<&str> {
        self.table.get(locale)?.get(key).map(String::as_str)
    }
}

impl FieldTransform for Translations {
    fn name(&self, _field: &FieldDescriptor, name: &str, locale: Option<&str>) -> String {
        locale
            .and_then(|locale| self.get(locale, name))
            .unwrap_or(name)
            .to_owned()
    }

    fn value(&self, _field: &FieldDescriptor, value: Value, locale: Option<&str>) -> Value {
        if let (Value::Str(s), Some(locale)) = (&value, locale)
            && let Some(localized) = self.get(locale, s)
        {
            return Value::from(localized);
        }
        value
    }
}

// ============================================================================
// FIELD
// ============================================================================

/// A field declaration.
///
/// # Examples
///
/// ```rust,ignore
/// let age = Field::aliased("userAge", TypeDescriptor::Int)
///     .default(0)
///     .validator(Validator::new(non_negative).with_order(Order::POST_VALIDATOR));
/// ```
#[derive(Clone)]
pub struct Field {
    tp: TypeDescriptor,
    alias: Option<String>,
    default: FieldDefault,
    private: Option<bool>,
    validators: Vec<Validator>,
    metadata: serde_json::Map<String, serde_json::Value>,
    transform: Option<Arc<dyn FieldTransform>>,
}

impl Field {
    pub fn new(tp: TypeDescriptor) -> Self {
        Self {
            tp,
            alias: None,
            default: FieldDefault::Required,
            private: None,
            validators: Vec::new(),
            metadata: serde_json::Map::new(),
            transform: None,
        }
    }

    /// Field read from `alias` on the wire.
    pub fn aliased(alias: impl Into<String>, tp: TypeDescriptor) -> Self {
        Self::new(tp).alias(alias)
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = FieldDefault::Value(value.into());
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn default_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = FieldDefault::Factory(Arc::new(factory));
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Overrides the private-prefix rule.
    #[must_use = "builder methods must be chained or built"]
    pub fn private(mut self, private: bool) -> Self {
        self.private = Some(private);
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn transform(mut self, transform: impl FieldTransform + 'static) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub const fn tp(&self) -> &TypeDescriptor {
        &self.tp
    }

    /// The same declaration with another declared type.
    pub(crate) fn with_tp(&self, tp: TypeDescriptor) -> Self {
        Self { tp, ..self.clone() }
    }
}

impl From<TypeDescriptor> for Field {
    fn from(tp: TypeDescriptor) -> Self {
        Self::new(tp)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("tp", &self.tp)
            .field("alias", &self.alias)
            .field("default", &self.default)
            .field("validators", &self.validators.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// FIELD DESCRIPTOR
// ============================================================================

/// A resolved field of a built record type.
#[derive(Clone)]
pub struct FieldDescriptor {
    name: String,
    alias: String,
    private: bool,
    declared: Field,
    validators: Vec<Validator>,
}

impl FieldDescriptor {
    /// Resolves `field` and merges its validators with the ones targeted at it
    /// from the record level.
    pub(crate) fn build<'v>(
        name: &str,
        field: Field,
        targeted: impl IntoIterator<Item = &'v Validator>,
        resolver: &Resolver,
    ) -> Result<Self, ResolveError> {
        let config = resolver.config();

        let mut validators: Vec<Validator> = field
            .validators
            .iter()
            .chain(targeted.into_iter().map(|validator| -> &Validator { validator }))
            .map(|validator| check_field_order(validator).map(|()| validator.clone()))
            .collect::<Result<_, _>>()?;

        let implicit = matches!(&field.default, FieldDefault::Value(Value::Null))
            && config.implicit_optional;
        let effective = if implicit {
            TypeDescriptor::optional(field.tp.clone())
        } else {
            field.tp.clone()
        };
        validators.push(resolver.resolve(&effective)?);
        validators.sort_by_key(Validator::order);

        Ok(Self {
            name: name.to_owned(),
            alias: field.alias.clone().unwrap_or_else(|| name.to_owned()),
            private: field.private.unwrap_or_else(|| config.is_private(name)),
            declared: field,
            validators,
        })
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire name.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub const fn default(&self) -> &FieldDefault {
        &self.declared.default
    }

    pub const fn is_required(&self) -> bool {
        self.declared.default.is_required()
    }

    pub const fn is_private(&self) -> bool {
        self.private
    }

    /// The type as declared, before optional widening and normalization.
    pub const fn declared_type(&self) -> &TypeDescriptor {
        &self.declared.tp
    }

    /// The normalized type the annotation validator was resolved from.
    pub fn tp(&self) -> Option<&TypeDescriptor> {
        self.validators.iter().find_map(Validator::tp)
    }

    /// All validators, sorted by order.
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn validators_in(&self, phase: Phase) -> impl Iterator<Item = &Validator> {
        self.validators
            .iter()
            .filter(move |validator| validator.order().phase() == Some(phase))
    }

    pub const fn metadata(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.declared.metadata
    }

    pub fn transform(&self) -> Option<&dyn FieldTransform> {
        self.declared.transform.as_deref()
    }

    pub fn is_async(&self) -> bool {
        self.validators.iter().any(Validator::is_async)
    }

    /// The declaration this descriptor was built from.
    pub(crate) const fn declaration(&self) -> &Field {
        &self.declared
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("private", &self.private)
            .field("tp", &self.declared.tp)
            .field("default", &self.declared.default)
            .field("validators", &self.validators)
            .finish()
    }
}

fn check_field_order(validator: &Validator) -> Result<(), ResolveError> {
    match validator.order().phase() {
        Some(Phase::Validator | Phase::PostValidator) => Ok(()),
        _ => Err(ResolveError::InvalidOrder {
            what: "field validator",
            order: validator.order().value(),
        }),
    }
}

// ============================================================================
// EXTRAS
// ============================================================================

/// Context carried alongside a record's fields but not validated by them.
#[derive(Debug, Clone, Default)]
pub struct Extra {
    default: Option<Value>,
    alias: Option<String>,
}

impl Extra {
    pub fn required() -> Self {
        Self::default()
    }

    pub fn with_default(default: impl Into<Value>) -> Self {
        Self {
            default: Some(default.into()),
            alias: None,
        }
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// A resolved extra. The wire name defaults to the attribute name without
/// leading underscores.
#[derive(Debug, Clone)]
pub struct ExtraDescriptor {
    name: String,
    alias: String,
    default: Option<Value>,
}

impl ExtraDescriptor {
    pub(crate) fn build(name: &str, extra: Extra) -> Self {
        Self {
            name: name.to_owned(),
            alias: extra
                .alias
                .unwrap_or_else(|| name.trim_start_matches('_').to_owned()),
            default: extra.default,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub const fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

// ============================================================================
// PROPERTIES
// ============================================================================

/// A computed, read-only value serialized alongside the fields.
#[derive(Clone)]
pub struct NamedProperty {
    name: String,
    alias: Option<String>,
    exclude: Option<bool>,
    getter: Arc<dyn Fn(&Record) -> Value + Send + Sync>,
}

impl NamedProperty {
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        Self {
            name: String::new(),
            alias: None,
            exclude: None,
            getter: Arc::new(getter),
        }
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Overrides the leading-underscore rule.
    #[must_use = "builder methods must be chained or built"]
    pub fn exclude(mut self, exclude: bool) -> Self {
        self.exclude = Some(exclude);
        self
    }

    #[must_use]
    pub(crate) fn named(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key used in [`Record::as_dict`].
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_excluded(&self) -> bool {
        self.exclude.unwrap_or_else(|| self.name.starts_with('_'))
    }

    pub fn get(&self, record: &Record) -> Value {
        (self.getter)(record)
    }
}

impl fmt::Debug for NamedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedProperty")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("exclude", &self.is_excluded())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Order;
    use pretty_assertions::assert_eq;

    fn build(name: &str, field: Field) -> Result<FieldDescriptor, ResolveError> {
        FieldDescriptor::build(name, field, [], &Resolver::default())
    }

    #[test]
    fn alias_and_privacy_defaults() {
        let descriptor = build("_token", Field::new(TypeDescriptor::Str)).unwrap();
        assert_eq!(descriptor.alias(), "_token");
        assert!(descriptor.is_private());

        let public = build("_token", Field::aliased("token", TypeDescriptor::Str).private(false))
            .unwrap();
        assert_eq!(public.alias(), "token");
        assert!(!public.is_private());
    }

    #[test]
    fn annotation_validator_is_sorted_between_user_validators() {
        let post = Validator::new(Ok).named("post").with_order(Order::POST_VALIDATOR);
        let pre = Validator::new(Ok).named("pre");
        let descriptor = build(
            "n",
            Field::new(TypeDescriptor::Int).validator(post).validator(pre),
        )
        .unwrap();

        let names: Vec<&str> = descriptor.validators().iter().map(Validator::name).collect();
        assert_eq!(names, ["pre", "int", "post"]);
        assert_eq!(descriptor.validators_in(Phase::Annotation).count(), 1);
    }

    #[test]
    fn null_default_widens_to_optional() {
        let descriptor = build("n", Field::new(TypeDescriptor::Int).default(Value::Null)).unwrap();
        assert_eq!(descriptor.tp().unwrap().to_string(), "Union[None, int]");
        assert_eq!(descriptor.declared_type().to_string(), "int");
    }

    #[test]
    fn root_band_orders_are_rejected_for_fields() {
        let misplaced = Validator::new(Ok).with_order(Order::ROOT);
        let error = build("n", Field::new(TypeDescriptor::Int).validator(misplaced)).unwrap_err();
        assert!(matches!(error, ResolveError::InvalidOrder { order: 10, .. }));
    }

    #[test]
    fn factories_run_per_call() {
        let counter = Arc::new(std::sync::atomic::AtomicI64::new(0));
        let seen = Arc::clone(&counter);
        let default = FieldDefault::Factory(Arc::new(move || {
            Value::Int(seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst))
        }));
        assert_eq!(default.get(), Some(Value::Int(0)));
        assert_eq!(default.get(), Some(Value::Int(1)));
    }

    #[test]
    fn extras_strip_leading_underscores() {
        let extra = ExtraDescriptor::build("__lang", Extra::with_default("en"));
        assert_eq!(extra.alias(), "lang");
        assert_eq!(extra.default(), Some(&Value::from("en")));
    }

    #[test]
    fn translations_rename_and_translate() {
        let i18n = Translations::new().insert("de", "color", "Farbe").insert("de", "red", "rot");
        let descriptor = build("color", Field::new(TypeDescriptor::Str)).unwrap();

        assert_eq!(i18n.name(&descriptor, "color", Some("de")), "Farbe");
        assert_eq!(i18n.name(&descriptor, "color", None), "color");
        assert_eq!(
            i18n.value(&descriptor, Value::from("red"), Some("de")),
            Value::from("rot")
        );
        assert_eq!(
            i18n.value(&descriptor, Value::from("blue"), Some("de")),
            Value::from("blue")
        );
    }

    #[test]
    fn property_exclusion_follows_name() {
        let hidden = NamedProperty::new(|_| Value::Null).named("_secret");
        let shown = NamedProperty::new(|_| Value::Null).named("total").alias("sum");
        assert!(hidden.is_excluded());
        assert!(!shown.is_excluded());
        assert_eq!(shown.key(), "sum");
    }
}
