//! Record types
//!
//! A [`RecordType`] is a named schema: fields with their resolved validators,
//! extras, root hooks and computed properties. It is built once through
//! [`RecordType::builder`] and shared behind an `Arc`; every validation run
//! produces a [`Record`] instance of it.
//!
//! # Examples
//!
//! ```rust,ignore
//! use nebula_model::prelude::*;
//!
//! let user = RecordType::builder("User")
//!     .field("id", Field::new(TypeDescriptor::Int))
//!     .field("name", Field::aliased("userName", TypeDescriptor::Str))
//!     .field("tags", Field::new(TypeDescriptor::list(TypeDescriptor::Str)).default_factory(|| Value::List(vec![])))
//!     .build()?;
//!
//! let record = user.create_sync(serde_json::json!({"id": "7", "userName": "ann"}))?;
//! assert_eq!(record.get("id"), Some(&Value::Int(7)));
//! ```

mod engine;
mod instance;

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;

pub use instance::Record;

use crate::config::{AsDictOptions, ModelConfig};
use crate::descriptor::{TypeDescriptor, TypeVar};
use crate::error::{ResolveError, ValidationError};
use crate::field::{Extra, ExtraDescriptor, Field, FieldDescriptor, NamedProperty};
use crate::order::Phase;
use crate::resolve::Resolver;
use crate::validator::{RootValidator, Validator, poll_once};
use crate::value::{Mapping, Value, into_mapping};

static DETACHED: LazyLock<Arc<RecordType>> =
    LazyLock::new(|| Arc::new(RecordType::empty("Record")));

// ============================================================================
// RECORD TYPE
// ============================================================================

/// A built record schema.
pub struct RecordType {
    name: String,
    fields: IndexMap<String, FieldDescriptor>,
    extras: IndexMap<String, ExtraDescriptor>,
    roots: Vec<RootValidator>,
    targeted: Vec<(Vec<String>, Validator)>,
    properties: IndexMap<String, NamedProperty>,
    type_params: Vec<TypeVar>,
    type_vars: IndexMap<String, TypeDescriptor>,
    bases: Vec<Arc<RecordType>>,
    config: ModelConfig,
    is_async: bool,
}

impl RecordType {
    pub fn builder(name: impl Into<String>) -> RecordTypeBuilder {
        RecordTypeBuilder::new(name)
    }

    fn empty(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            fields: IndexMap::new(),
            extras: IndexMap::new(),
            roots: Vec::new(),
            targeted: Vec::new(),
            properties: IndexMap::new(),
            type_params: Vec::new(),
            type_vars: IndexMap::new(),
            bases: Vec::new(),
            config: ModelConfig::default(),
            is_async: false,
        }
    }

    /// Field-less record type backing detached instances.
    pub(crate) fn detached() -> Arc<Self> {
        Arc::clone(&DETACHED)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields by attribute name, in declaration order with inherited fields first.
    pub const fn fields(&self) -> &IndexMap<String, FieldDescriptor> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub const fn extras(&self) -> &IndexMap<String, ExtraDescriptor> {
        &self.extras
    }

    /// Root hooks, sorted by order.
    pub fn root_validators(&self) -> &[RootValidator] {
        &self.roots
    }

    pub const fn properties(&self) -> &IndexMap<String, NamedProperty> {
        &self.properties
    }

    /// Declared type parameters of a generic record type.
    pub fn type_params(&self) -> &[TypeVar] {
        &self.type_params
    }

    /// Type variables bound along the base chain.
    pub const fn type_vars(&self) -> &IndexMap<String, TypeDescriptor> {
        &self.type_vars
    }

    pub const fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn bases(&self) -> &[Arc<RecordType>] {
        &self.bases
    }

    /// Whether any field validator or root hook may suspend.
    pub const fn is_async(&self) -> bool {
        self.is_async
    }

    /// `true` for the type itself and everything that extends it.
    pub fn is_subtype_of(&self, other: &RecordType) -> bool {
        std::ptr::eq(self, other) || self.bases.iter().any(|base| base.is_subtype_of(other))
    }

    /// Binds every type parameter, producing e.g. `Page[int]`.
    pub fn specialize(
        self: &Arc<Self>,
        args: impl IntoIterator<Item = TypeDescriptor>,
    ) -> Result<Arc<Self>, ResolveError> {
        let args: Vec<TypeDescriptor> = args.into_iter().collect();
        if args.len() != self.type_params.len() {
            return Err(ResolveError::TypeVarArity {
                base: self.name.clone(),
                expected: self.type_params.len(),
                got: args.len(),
            });
        }
        let name = format!(
            "{}[{}]",
            self.name,
            args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        );
        Self::builder(name)
            .config(self.config.clone())
            .extends(self, args)
            .build()
    }

    // ========================================================================
    // VALIDATION
    // ========================================================================

    /// Validates a mapping against a fresh instance and returns the
    /// validated mapping keyed by attribute name. Extras are not read.
    pub async fn validate(self: &Arc<Self>, obj: Mapping) -> Result<Mapping, ValidationError> {
        let mut record = Record::new(Arc::clone(self));
        engine::run(self, obj, &mut record, false).await
    }

    /// Synchronous [`validate`](Self::validate).
    pub fn validate_sync(self: &Arc<Self>, obj: Mapping) -> Result<Mapping, ValidationError> {
        poll_once(&self.name, self.validate(obj))
    }

    pub async fn create(self: &Arc<Self>, obj: impl Into<Value>) -> Result<Record, ValidationError> {
        self.create_with(obj, Mapping::new()).await
    }

    /// Creates an instance from `obj` with `overlay` merged on top.
    ///
    /// Instances of this type (or a subtype) are returned unchanged. Other
    /// records are converted through [`Record::as_dict`], `Null` is an empty
    /// mapping, and anything else that is not a mapping is a type error.
    pub async fn create_with(
        self: &Arc<Self>,
        obj: impl Into<Value>,
        overlay: Mapping,
    ) -> Result<Record, ValidationError> {
        let obj = obj.into();
        if let Value::Record(existing) = &obj
            && existing.model().is_subtype_of(self)
        {
            return Ok(existing.clone());
        }

        let mapping = to_mapping(obj, overlay)?;
        let mut record = Record::new(Arc::clone(self));
        engine::run(self, mapping, &mut record, true).await?;
        Ok(record)
    }

    /// Synchronous [`create`](Self::create). Fails with
    /// [`ValidationError::AsyncRecord`] when the type has async validators.
    pub fn create_sync(self: &Arc<Self>, obj: impl Into<Value>) -> Result<Record, ValidationError> {
        self.create_sync_with(obj, Mapping::new())
    }

    pub fn create_sync_with(
        self: &Arc<Self>,
        obj: impl Into<Value>,
        overlay: Mapping,
    ) -> Result<Record, ValidationError> {
        if self.is_async {
            return Err(ValidationError::AsyncRecord(self.name.clone()));
        }
        poll_once(&self.name, self.create_with(obj.into(), overlay))
    }
}

fn to_mapping(obj: Value, overlay: Mapping) -> Result<Mapping, ValidationError> {
    let mut mapping = match obj {
        Value::Null => Mapping::new(),
        Value::Map(map) => into_mapping(map),
        Value::Record(record) => record.as_dict(&AsDictOptions::default().alias(true).private(true)),
        other => {
            return Err(ValidationError::type_error(format!(
                "Unparsable object: {other}"
            )));
        }
    };
    mapping.extend(overlay);
    Ok(mapping)
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("extras", &self.extras.keys().collect::<Vec<_>>())
            .field("roots", &self.roots.len())
            .field("is_async", &self.is_async)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Builder for [`RecordType`].
#[derive(Debug)]
pub struct RecordTypeBuilder {
    name: String,
    fields: IndexMap<String, Field>,
    extras: IndexMap<String, Extra>,
    targeted: Vec<(Vec<String>, Validator)>,
    roots: Vec<RootValidator>,
    properties: IndexMap<String, NamedProperty>,
    type_params: Vec<TypeVar>,
    base: Option<(Arc<RecordType>, Vec<TypeDescriptor>)>,
    config: Option<ModelConfig>,
}

impl RecordTypeBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            extras: IndexMap::new(),
            targeted: Vec::new(),
            roots: Vec::new(),
            properties: IndexMap::new(),
            type_params: Vec::new(),
            base: None,
            config: None,
        }
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn field(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        self.fields.insert(name.into(), field.into());
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn extra(mut self, name: impl Into<String>, extra: Extra) -> Self {
        self.extras.insert(name.into(), extra);
        self
    }

    /// Attaches a validator to each named field, including inherited ones.
    #[must_use = "builder methods must be chained or built"]
    pub fn validator<S: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = S>,
        validator: Validator,
    ) -> Self {
        self.targeted
            .push((fields.into_iter().map(Into::into).collect(), validator));
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn root_validator(mut self, validator: RootValidator) -> Self {
        self.roots.push(validator);
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn property(mut self, name: impl Into<String>, property: NamedProperty) -> Self {
        let name = name.into();
        let property = property.named(&name);
        self.properties.insert(name, property);
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn type_params(mut self, params: impl IntoIterator<Item = TypeVar>) -> Self {
        self.type_params.extend(params);
        self
    }

    /// Inherits from `base`, binding its type parameters to `args` in order.
    /// With no arguments the parameters stay unbound.
    #[must_use = "builder methods must be chained or built"]
    pub fn extends(
        mut self,
        base: &Arc<RecordType>,
        args: impl IntoIterator<Item = TypeDescriptor>,
    ) -> Self {
        self.base = Some((Arc::clone(base), args.into_iter().collect()));
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn config(mut self, config: ModelConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Arc<RecordType>, ResolveError> {
        let Self {
            name,
            fields: own_fields,
            extras: own_extras,
            targeted: own_targeted,
            roots: own_roots,
            properties: own_properties,
            type_params,
            base,
            config,
        } = self;

        let mut seen = HashSet::new();
        for param in &type_params {
            if !seen.insert(param.name()) {
                return Err(ResolveError::DuplicateTypeVar {
                    base: name,
                    name: param.name().to_owned(),
                });
            }
        }

        let config = config
            .or_else(|| base.as_ref().map(|(base, _)| base.config.clone()))
            .unwrap_or_default();
        let resolver = Resolver::new(config.clone());

        let mut declarations: IndexMap<String, Field> = IndexMap::new();
        let mut extras = IndexMap::new();
        let mut targeted = Vec::new();
        let mut roots = Vec::new();
        let mut properties = IndexMap::new();
        let mut type_vars = IndexMap::new();
        let mut bases = Vec::new();

        if let Some((base, args)) = base {
            let step = bind_params(&base, &args)?;
            for (var, tp) in &base.type_vars {
                type_vars.insert(var.clone(), tp.substitute(&step));
            }
            type_vars.extend(step.iter().map(|(k, v)| (k.clone(), v.clone())));

            for (attr, field) in &base.fields {
                let declared = field.declared_type().substitute(&step);
                declarations.insert(attr.clone(), field.declaration().with_tp(declared));
            }
            extras.extend(base.extras.iter().map(|(k, v)| (k.clone(), v.clone())));
            targeted.extend(base.targeted.iter().cloned());
            roots.extend(base.roots.iter().cloned());
            properties.extend(base.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
            bases.push(base);
        }

        declarations.extend(own_fields);
        extras.extend(
            own_extras
                .into_iter()
                .map(|(attr, extra)| {
                    let descriptor = ExtraDescriptor::build(&attr, extra);
                    (attr, descriptor)
                }),
        );
        targeted.extend(own_targeted);
        roots.extend(own_roots);
        properties.extend(own_properties);

        for (names, _) in &targeted {
            if let Some(unknown) = names.iter().find(|n| !declarations.contains_key(*n)) {
                return Err(ResolveError::UnknownField {
                    model: name,
                    field: unknown.clone(),
                });
            }
        }

        let fields = declarations
            .into_iter()
            .map(|(attr, field)| {
                let aimed = targeted
                    .iter()
                    .filter(|(names, _)| names.iter().any(|n| *n == attr))
                    .map(|(_, validator)| validator);
                let descriptor = FieldDescriptor::build(&attr, field, aimed, &resolver)?;
                Ok((attr, descriptor))
            })
            .collect::<Result<IndexMap<_, _>, ResolveError>>()?;

        if let Some(misplaced) = roots
            .iter()
            .find(|hook| !hook.order().phase().is_some_and(Phase::is_root))
        {
            return Err(ResolveError::InvalidOrder {
                what: "root validator",
                order: misplaced.order().value(),
            });
        }
        roots.sort_by_key(RootValidator::order);

        let is_async = fields.values().any(FieldDescriptor::is_async)
            || roots.iter().any(RootValidator::is_async);

        tracing::debug!(
            record = %name,
            fields = fields.len(),
            roots = roots.len(),
            is_async,
            "record type built"
        );

        Ok(Arc::new(RecordType {
            name,
            fields,
            extras,
            roots,
            targeted,
            properties,
            type_params,
            type_vars,
            bases,
            config,
            is_async,
        }))
    }
}

/// Maps the base's parameters to `args`. Empty `args` leaves them unbound.
fn bind_params(
    base: &RecordType,
    args: &[TypeDescriptor],
) -> Result<IndexMap<String, TypeDescriptor>, ResolveError> {
    if args.is_empty() {
        return Ok(IndexMap::new());
    }
    if args.len() != base.type_params.len() {
        return Err(ResolveError::TypeVarArity {
            base: base.name.clone(),
            expected: base.type_params.len(),
            got: args.len(),
        });
    }
    Ok(base
        .type_params
        .iter()
        .map(|param| param.name().to_owned())
        .zip(args.iter().cloned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Order;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn point() -> Arc<RecordType> {
        RecordType::builder("Point")
            .field("x", Field::new(TypeDescriptor::Int))
            .field("y", Field::new(TypeDescriptor::Int).default(0))
            .build()
            .unwrap()
    }

    #[test]
    fn inherited_fields_come_first_and_can_be_overridden() {
        let base = point();
        let child = RecordType::builder("Point3")
            .extends(&base, [])
            .field("z", Field::new(TypeDescriptor::Int))
            .field("x", Field::new(TypeDescriptor::Float))
            .build()
            .unwrap();

        let names: Vec<&str> = child.fields().keys().map(String::as_str).collect();
        assert_eq!(names, ["x", "y", "z"]);
        assert_eq!(child.field("x").unwrap().declared_type().to_string(), "float");
        assert!(child.is_subtype_of(&base));
        assert!(!base.is_subtype_of(&child));
    }

    #[test]
    fn targeted_validators_must_name_existing_fields() {
        let error = RecordType::builder("Point")
            .field("x", Field::new(TypeDescriptor::Int))
            .validator(["w"], Validator::new(Ok))
            .build()
            .unwrap_err();
        assert_eq!(
            error,
            ResolveError::UnknownField {
                model: "Point".into(),
                field: "w".into()
            }
        );
    }

    #[test]
    fn root_hooks_must_sit_in_root_bands() {
        let error = RecordType::builder("Point")
            .root_validator(RootValidator::new(Ok).with_order(Order::VALIDATOR))
            .build()
            .unwrap_err();
        assert!(matches!(error, ResolveError::InvalidOrder { order: 20, .. }));
    }

    #[test]
    fn root_hooks_are_sorted_stably() {
        let record = RecordType::builder("Hooks")
            .root_validator(RootValidator::new(Ok).named("final").with_order(Order::FINAL_ROOT))
            .root_validator(RootValidator::new(Ok).named("a"))
            .root_validator(RootValidator::new(Ok).named("initial").with_order(Order::INITIAL_ROOT))
            .root_validator(RootValidator::new(Ok).named("b"))
            .build()
            .unwrap();
        let names: Vec<&str> = record.root_validators().iter().map(RootValidator::name).collect();
        assert_eq!(names, ["initial", "a", "b", "final"]);
    }

    #[test]
    fn duplicate_type_params_are_rejected() {
        let error = RecordType::builder("Pair")
            .type_params([TypeVar::new("T"), TypeVar::new("T")])
            .build()
            .unwrap_err();
        assert!(matches!(error, ResolveError::DuplicateTypeVar { .. }));
    }

    #[test]
    fn non_mappings_are_unparsable() {
        let error = point().create_sync(Value::Int(3)).unwrap_err();
        assert_eq!(error.to_string(), "Unparsable object: 3");
    }

    #[test]
    fn overlay_wins_over_input() {
        let mut overlay = Mapping::new();
        overlay.insert("x".into(), Value::Int(9));
        let record = point()
            .create_sync_with(json!({"x": 1}), overlay)
            .unwrap();
        assert_eq!(record.get("x"), Some(&Value::Int(9)));
    }

    #[test]
    fn instances_pass_through_create() {
        let model = point();
        let record = model.create_sync(json!({"x": 1})).unwrap();
        let again = model.create_sync(Value::Record(record.clone())).unwrap();
        assert_eq!(again, record);
    }
}
