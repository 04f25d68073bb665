//! Error types for validation failures
//!
//! Failures are collected best-effort: every validator runs inside its own
//! catch scope, errors are tagged with the [`Location`] where they occurred,
//! and each phase raises a single [`AggregateError`] at its boundary. Nested
//! aggregates keep their structure and are spliced together lazily by
//! [`AggregateError::flatten`].
//!
//! Messages use `Cow<'static, str>` so static messages never allocate.

use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;

use smallvec::SmallVec;
use thiserror::Error;

// ============================================================================
// LOCATIONS
// ============================================================================

/// One step of an error path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocSegment {
    /// Whole-record scope, rendered as `__root__`.
    Root,
    /// Field name or stringified mapping key.
    Key(String),
    /// Position inside a collection.
    Index(usize),
    /// Union member that was attempted, rendered as `Union[i]`.
    Member(usize),
}

impl fmt::Display for LocSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("__root__"),
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
            Self::Member(index) => write!(f, "Union[{index}]"),
        }
    }
}

impl From<&str> for LocSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<String> for LocSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for LocSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Path from the outermost record to the failing value.
///
/// Displayed with segments joined by `" -> "`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Location(SmallVec<[LocSegment; 4]>);

impl Location {
    pub fn root() -> Self {
        Self::from(LocSegment::Root)
    }

    pub fn segments(&self) -> &[LocSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, segment: impl Into<LocSegment>) {
        self.0.push(segment.into());
    }

    /// Concatenates `self` and `suffix`.
    #[must_use]
    pub fn join(&self, suffix: &Self) -> Self {
        self.0.iter().chain(suffix.0.iter()).cloned().collect()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromIterator<LocSegment> for Location {
    fn from_iter<I: IntoIterator<Item = LocSegment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<LocSegment> for Location {
    fn from(segment: LocSegment) -> Self {
        let mut segments = SmallVec::new();
        segments.push(segment);
        Self(segments)
    }
}

impl From<&str> for Location {
    fn from(key: &str) -> Self {
        Self::from(LocSegment::from(key))
    }
}

impl From<String> for Location {
    fn from(key: String) -> Self {
        Self::from(LocSegment::from(key))
    }
}

impl From<usize> for Location {
    fn from(index: usize) -> Self {
        Self::from(LocSegment::Index(index))
    }
}

// ============================================================================
// VALIDATION ERROR
// ============================================================================

/// Category of a [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Type,
    Value,
    Missing,
    Aggregate,
    Misuse,
}

impl ErrorKind {
    /// Machine-readable code, used when rendering aggregates.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Type => "type_error",
            Self::Value => "value_error",
            Self::Missing => "missing",
            Self::Aggregate => "validation_error",
            Self::Misuse => "misuse",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single validation failure.
///
/// Data errors (`Type`, `Value`, `Missing*`, `Aggregate`) are caught and
/// aggregated by the engine. The two misuse variants are programming errors:
/// they bypass every catch scope and reach the caller unchanged.
///
/// # Examples
///
/// ```rust,ignore
/// use nebula_model::error::ValidationError;
///
/// let error = ValidationError::type_error("Expected iterable, got int");
/// assert!(!error.is_programming_error());
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The value has the wrong shape or cannot be converted.
    #[error("{0}")]
    Type(Cow<'static, str>),

    /// The value has the right shape but is not acceptable.
    #[error("{0}")]
    Value(Cow<'static, str>),

    /// A required field is absent from the input; holds the wire alias.
    #[error("Missing required field: '{0}'")]
    MissingField(String),

    /// A required extra is absent from the input; holds the wire alias.
    #[error("Missing required extra field: '{0}'")]
    MissingExtra(String),

    /// Errors collected in a nested scope.
    #[error("{0}")]
    Aggregate(Box<AggregateError>),

    /// A validator suspended while being driven synchronously.
    #[error("validator '{0}' suspended during a synchronous call; use the async entry point")]
    Suspended(Cow<'static, str>),

    /// A synchronous factory was used with a record type that has async validators.
    #[error("Must use the create method with an async record type: '{0}'")]
    AsyncRecord(String),
}

impl ValidationError {
    pub fn type_error(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Type(message.into())
    }

    pub fn value_error(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Value(message.into())
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Type(_) => ErrorKind::Type,
            Self::Value(_) => ErrorKind::Value,
            Self::MissingField(_) | Self::MissingExtra(_) => ErrorKind::Missing,
            Self::Aggregate(_) => ErrorKind::Aggregate,
            Self::Suspended(_) | Self::AsyncRecord(_) => ErrorKind::Misuse,
        }
    }

    /// Misuse errors are never aggregated.
    pub const fn is_programming_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Misuse)
    }

    pub fn as_aggregate(&self) -> Option<&AggregateError> {
        match self {
            Self::Aggregate(aggregate) => Some(aggregate),
            _ => None,
        }
    }
}

impl From<AggregateError> for ValidationError {
    fn from(error: AggregateError) -> Self {
        Self::Aggregate(Box::new(error))
    }
}

// ============================================================================
// LOCATED ERROR
// ============================================================================

/// A [`ValidationError`] tagged with where it happened.
///
/// Dereferences to the underlying error, so kind checks work on either.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct LocatedError {
    pub error: ValidationError,
    pub loc: Location,
}

impl LocatedError {
    pub fn new(error: ValidationError, loc: impl Into<Location>) -> Self {
        Self {
            error,
            loc: loc.into(),
        }
    }

    pub fn into_inner(self) -> ValidationError {
        self.error
    }
}

impl Deref for LocatedError {
    type Target = ValidationError;

    fn deref(&self) -> &Self::Target {
        &self.error
    }
}

// ============================================================================
// AGGREGATE ERROR
// ============================================================================

/// All errors raised by one phase of one record type.
///
/// Renders like:
///
/// ```text
/// 2 validation errors for User
/// id
///   value_error: invalid literal for int() with base 10: 'x'
/// tags -> 1
///   type_error: Expected iterable, got int
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateError {
    errors: Vec<LocatedError>,
    model: String,
}

impl AggregateError {
    pub fn new(model: impl Into<String>, errors: Vec<LocatedError>) -> Self {
        Self {
            errors,
            model: model.into(),
        }
    }

    /// Name of the record type the errors were raised for.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Direct children, nested aggregates unexpanded.
    pub fn errors(&self) -> &[LocatedError] {
        &self.errors
    }

    /// Leaf errors with their full paths, depth-first in collection order.
    pub fn flatten(&self) -> Flatten<'_> {
        Flatten {
            stack: vec![(Location::default(), self.errors.iter())],
        }
    }

    /// Collected [`flatten`](Self::flatten) output.
    pub fn locations(&self) -> Vec<(Location, &ValidationError)> {
        self.flatten().collect()
    }

    /// Number of leaf errors.
    pub fn len(&self) -> usize {
        self.flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.locations();
        let plural = if entries.len() == 1 { "" } else { "s" };
        write!(
            f,
            "{} validation error{plural} for {}",
            entries.len(),
            self.model
        )?;
        for (loc, error) in entries {
            write!(f, "\n{loc}\n  {}: {error}", error.kind())?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Iterator returned by [`AggregateError::flatten`].
pub struct Flatten<'a> {
    stack: Vec<(Location, std::slice::Iter<'a, LocatedError>)>,
}

impl<'a> Iterator for Flatten<'a> {
    type Item = (Location, &'a ValidationError);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (prefix, iter) = self.stack.last_mut()?;
            let Some(entry) = iter.next() else {
                self.stack.pop();
                continue;
            };
            let loc = prefix.join(&entry.loc);
            match &entry.error {
                ValidationError::Aggregate(nested) => {
                    self.stack.push((loc, nested.errors.iter()));
                }
                error => return Some((loc, error)),
            }
        }
    }
}

// ============================================================================
// ERROR CATCHER
// ============================================================================

/// Collects errors from independent scopes and raises them together.
///
/// # Examples
///
/// ```rust,ignore
/// let mut catcher = ErrorCatcher::new("User");
/// for (name, value) in fields {
///     if let Some(v) = catcher.catch(name.as_str(), coerce(value))? {
///         out.insert(name, v);
///     }
/// }
/// catcher.raise_errors()?;
/// ```
#[derive(Debug)]
pub struct ErrorCatcher {
    model: String,
    errors: Vec<LocatedError>,
}

impl ErrorCatcher {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            errors: Vec::new(),
        }
    }

    /// Records a data error at `loc` and returns `Ok(None)`.
    ///
    /// Successes pass through as `Ok(Some(_))`; programming errors are
    /// returned as `Err` so the caller propagates them with `?`.
    pub fn catch<T>(
        &mut self,
        loc: impl Into<Location>,
        result: Result<T, ValidationError>,
    ) -> Result<Option<T>, ValidationError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.is_programming_error() => Err(error),
            Err(error) => {
                self.errors.push(LocatedError::new(error, loc));
                Ok(None)
            }
        }
    }

    pub fn add_error(&mut self, error: ValidationError, loc: impl Into<Location>) {
        self.errors.push(LocatedError::new(error, loc));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fails with an aggregate if anything was caught.
    pub fn raise_errors(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.into_error())
        }
    }

    /// Wraps whatever was caught into an aggregate, even if empty.
    pub fn into_error(self) -> ValidationError {
        AggregateError::new(self.model, self.errors).into()
    }
}

// ============================================================================
// RESOLVE ERROR
// ============================================================================

/// Schema construction failures. Raised eagerly, never aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error(
        "Unknown annotation: {0}. Use TypeDescriptor::untyped to disable the default validator."
    )]
    UnknownType(String),

    #[error("{base} expects {expected} type argument(s), got {got}")]
    TypeVarArity {
        base: String,
        expected: usize,
        got: usize,
    },

    #[error("Union[] has no members and can never match")]
    EmptyUnion,

    #[error("type variable '{name}' is declared twice in {base}")]
    DuplicateTypeVar { base: String, name: String },

    #[error("validator targets unknown field '{field}' on {model}")]
    UnknownField { model: String, field: String },

    #[error("{what} order {order} is outside the phases it may run in")]
    InvalidOrder { what: &'static str, order: i32 },
}

/// Either side of a one-shot [`cast`](crate::resolve::cast).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn nested() -> ValidationError {
        let mut inner = ErrorCatcher::new("Address");
        inner.add_error(ValidationError::type_error("bad zip"), "zip");
        inner.add_error(ValidationError::MissingField("city".into()), "city");
        inner.into_error()
    }

    #[test]
    fn catcher_passes_successes_through() {
        let mut catcher = ErrorCatcher::new("User");
        let value = catcher.catch("id", Ok::<_, ValidationError>(7)).unwrap();
        assert_eq!(value, Some(7));
        assert!(catcher.raise_errors().is_ok());
    }

    #[test]
    fn catcher_propagates_misuse() {
        let mut catcher = ErrorCatcher::new("User");
        let result = catcher.catch::<()>("id", Err(ValidationError::AsyncRecord("User".into())));
        assert!(matches!(result, Err(ValidationError::AsyncRecord(_))));
        assert!(catcher.is_empty());
    }

    #[test]
    fn flatten_splices_nested_paths() {
        let mut outer = ErrorCatcher::new("User");
        outer.add_error(nested(), "address");
        outer.add_error(ValidationError::value_error("too old"), "age");
        let ValidationError::Aggregate(aggregate) = outer.into_error() else {
            unreachable!()
        };

        let paths: Vec<String> = aggregate
            .flatten()
            .map(|(loc, _)| loc.to_string())
            .collect();
        assert_eq!(paths, ["address -> zip", "address -> city", "age"]);
        assert_eq!(aggregate.len(), 3);
    }

    #[test]
    fn located_error_derefs_to_inner() {
        let located = LocatedError::new(ValidationError::type_error("x"), 3);
        assert_eq!(located.kind(), ErrorKind::Type);
        assert_eq!(located.loc.to_string(), "3");
    }

    #[test]
    fn member_segments_render_as_union() {
        let loc: Location = [LocSegment::from("value"), LocSegment::Member(1)]
            .into_iter()
            .collect();
        assert_eq!(loc.to_string(), "value -> Union[1]");
    }
}
