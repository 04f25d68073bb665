//! Validators and their execution contract
//!
//! A [`Validator`] is an immutable, cheaply clonable callable with an
//! [`Order`], a bound flag and an async flag. Field validators operate on a
//! single [`Value`]; root validators ([`RootValidator`]) operate on the whole
//! [`Mapping`] of a record.
//!
//! User checks come in three shapes:
//!
//! - plain closures, synchronous or returning a future
//!   ([`Validator::new`], [`Validator::bound`], [`Validator::new_async`],
//!   [`Validator::bound_async`]);
//! - implementations of the [`Check`] trait, which may borrow the record
//!   across an await.
//!
//! # Examples
//!
//! ```rust,ignore
//! use nebula_model::prelude::*;
//!
//! let positive = Validator::new(|value: Value| match value.as_int() {
//!     Some(n) if n > 0 => Ok(value),
//!     _ => Err(ValidationError::value_error("must be positive")),
//! })
//! .with_order(Order::POST_VALIDATOR);
//! ```

mod invocation;

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

pub use invocation::Invocation;
pub(crate) use invocation::{drive, poll_once};

use crate::descriptor::TypeDescriptor;
use crate::error::ValidationError;
use crate::order::Order;
use crate::record::Record;
use crate::value::{Mapping, Value};

// ============================================================================
// OPERANDS
// ============================================================================

/// What a validator operates on.
pub trait Operand: Clone + Send + Sync + Unpin + 'static {
    /// Order given to validators that do not set one.
    const DEFAULT_ORDER: Order;
}

impl Operand for Value {
    const DEFAULT_ORDER: Order = Order::VALIDATOR;
}

impl Operand for Mapping {
    const DEFAULT_ORDER: Order = Order::ROOT;
}

// ============================================================================
// CHECK TRAIT
// ============================================================================

/// A user check that may suspend while borrowing the record.
///
/// # Examples
///
/// ```rust,ignore
/// struct UniqueName(Arc<Registry>);
///
/// #[async_trait]
/// impl Check<Value> for UniqueName {
///     async fn check(&self, record: &Record, value: Value) -> Result<Value, ValidationError> {
///         if self.0.exists(value.as_str().unwrap_or_default()).await {
///             return Err(ValidationError::value_error("name is taken"));
///         }
///         Ok(value)
///     }
/// }
/// ```
#[async_trait]
pub trait Check<T: Operand>: Send + Sync {
    async fn check(&self, record: &Record, value: T) -> Result<T, ValidationError>;

    /// Checks that never suspend may return `false` to run on the sync path.
    fn is_async(&self) -> bool {
        true
    }
}

// ============================================================================
// CALLABLE BODIES
// ============================================================================

/// Uniform calling convention behind every validator.
pub(crate) trait Coerce<T>: Send + Sync {
    fn coerce<'a>(&'a self, record: &'a Record, value: T) -> Invocation<'a, T>;

    fn is_async(&self) -> bool;
}

struct Plain<F>(F);

impl<T, F> Coerce<T> for Plain<F>
where
    T: Operand,
    F: Fn(T) -> Result<T, ValidationError> + Send + Sync,
{
    fn coerce<'a>(&'a self, _record: &'a Record, value: T) -> Invocation<'a, T> {
        Invocation::ready((self.0)(value))
    }

    fn is_async(&self) -> bool {
        false
    }
}

struct Bound<F>(F);

impl<T, F> Coerce<T> for Bound<F>
where
    T: Operand,
    F: Fn(&Record, T) -> Result<T, ValidationError> + Send + Sync,
{
    fn coerce<'a>(&'a self, record: &'a Record, value: T) -> Invocation<'a, T> {
        Invocation::ready((self.0)(record, value))
    }

    fn is_async(&self) -> bool {
        false
    }
}

struct Deferred<F>(F);

impl<T, F, Fut> Coerce<T> for Deferred<F>
where
    T: Operand,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, ValidationError>> + Send + 'static,
{
    fn coerce<'a>(&'a self, _record: &'a Record, value: T) -> Invocation<'a, T> {
        Invocation::pending((self.0)(value))
    }

    fn is_async(&self) -> bool {
        true
    }
}

/// Async closure that receives a snapshot of the record.
struct BoundDeferred<F>(F);

impl<T, F, Fut> Coerce<T> for BoundDeferred<F>
where
    T: Operand,
    F: Fn(Record, T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, ValidationError>> + Send + 'static,
{
    fn coerce<'a>(&'a self, record: &'a Record, value: T) -> Invocation<'a, T> {
        Invocation::pending((self.0)(record.clone(), value))
    }

    fn is_async(&self) -> bool {
        true
    }
}

struct Checked<C>(C);

impl<T, C> Coerce<T> for Checked<C>
where
    T: Operand,
    C: Check<T>,
{
    fn coerce<'a>(&'a self, record: &'a Record, value: T) -> Invocation<'a, T> {
        drive("check", self.0.is_async(), self.0.check(record, value))
    }

    fn is_async(&self) -> bool {
        self.0.is_async()
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

/// A validator for a field value (`T = Value`) or a whole record (`T = Mapping`).
pub struct Validator<T = Value> {
    body: Arc<dyn Coerce<T>>,
    order: Order,
    bound: bool,
    name: Cow<'static, str>,
    tp: Option<TypeDescriptor>,
}

/// Validator operating on a record's whole mapping.
pub type RootValidator = Validator<Mapping>;

impl<T: Operand> Validator<T> {
    /// Unbound synchronous validator.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(T) -> Result<T, ValidationError> + Send + Sync + 'static,
    {
        Self::from_parts(Plain(callback), false, std::any::type_name::<F>())
    }

    /// Synchronous validator that also receives the record being validated.
    pub fn bound<F>(callback: F) -> Self
    where
        F: Fn(&Record, T) -> Result<T, ValidationError> + Send + Sync + 'static,
    {
        Self::from_parts(Bound(callback), true, std::any::type_name::<F>())
    }

    /// Unbound validator returning a future.
    pub fn new_async<F, Fut>(callback: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ValidationError>> + Send + 'static,
    {
        Self::from_parts(Deferred(callback), false, std::any::type_name::<F>())
    }

    /// Async validator that receives an owned snapshot of the record.
    pub fn bound_async<F, Fut>(callback: F) -> Self
    where
        F: Fn(Record, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ValidationError>> + Send + 'static,
    {
        Self::from_parts(BoundDeferred(callback), true, std::any::type_name::<F>())
    }

    /// Validator backed by a [`Check`] implementation.
    pub fn from_check<C>(check: C) -> Self
    where
        C: Check<T> + 'static,
    {
        Self::from_parts(Checked(check), true, std::any::type_name::<C>())
    }

    pub(crate) fn from_parts(
        body: impl Coerce<T> + 'static,
        bound: bool,
        name: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            body: Arc::new(body),
            order: T::DEFAULT_ORDER,
            bound,
            name: name.into(),
            tp: None,
        }
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub(crate) fn with_tp(mut self, tp: TypeDescriptor) -> Self {
        self.tp = Some(tp);
        self
    }

    pub const fn order(&self) -> Order {
        self.order
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the callable receives the record.
    pub const fn is_bound(&self) -> bool {
        self.bound
    }

    /// Whether calling may suspend. Transitive for composite validators.
    pub fn is_async(&self) -> bool {
        self.body.is_async()
    }

    /// The type a type-derived validator was resolved from.
    pub const fn tp(&self) -> Option<&TypeDescriptor> {
        self.tp.as_ref()
    }

    /// Generic call. Await the result or resolve it with [`Invocation::now`].
    pub fn invoke<'a>(&'a self, record: &'a Record, value: T) -> Invocation<'a, T> {
        self.body.coerce(record, value)
    }

    /// Asynchronous call.
    pub async fn call(&self, record: &Record, value: T) -> Result<T, ValidationError> {
        self.invoke(record, value).await
    }

    /// Synchronous call. Fails with [`ValidationError::Suspended`] if the
    /// callable does not complete without suspending.
    pub fn call_sync(&self, record: &Record, value: T) -> Result<T, ValidationError> {
        self.invoke(record, value).now(&self.name)
    }
}

impl<T> Clone for Validator<T> {
    fn clone(&self) -> Self {
        Self {
            body: Arc::clone(&self.body),
            order: self.order,
            bound: self.bound,
            name: self.name.clone(),
            tp: self.tp.clone(),
        }
    }
}

impl<T> fmt::Debug for Validator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("bound", &self.bound)
            .field("async", &self.body.is_async())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn double(value: Value) -> Result<Value, ValidationError> {
        match value {
            Value::Int(n) => Ok(Value::Int(n * 2)),
            other => Err(ValidationError::type_error(format!(
                "Expected int, got {}",
                other.kind()
            ))),
        }
    }

    #[test]
    fn defaults_depend_on_operand() {
        let field = Validator::new(double);
        let root = RootValidator::new(Ok);
        assert_eq!(field.order(), Order::VALIDATOR);
        assert_eq!(root.order(), Order::ROOT);
        assert!(!field.is_bound());
        assert!(!field.is_async());
    }

    #[test]
    fn sync_call_runs_inline() {
        let validator = Validator::new(double);
        let record = Record::empty();
        assert_eq!(
            validator.call_sync(&record, Value::Int(4)).unwrap(),
            Value::Int(8)
        );
    }

    #[test]
    fn sync_call_rejects_suspending_validators() {
        let validator = Validator::new_async(|value: Value| async move {
            futures::future::pending::<()>().await;
            Ok(value)
        })
        .named("slow");
        let record = Record::empty();
        let error = validator.call_sync(&record, Value::Null).unwrap_err();
        assert_eq!(error, ValidationError::Suspended("slow".into()));
    }

    #[test]
    fn async_validators_that_complete_immediately_still_work_inline() {
        let validator = Validator::new_async(|value: Value| async move { Ok(value) });
        let record = Record::empty();
        assert!(validator.is_async());
        assert_eq!(validator.call_sync(&record, Value::Int(1)).unwrap(), Value::Int(1));
    }
}
