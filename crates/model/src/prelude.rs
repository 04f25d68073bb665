//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use nebula_model::prelude::*;
//! ```

// ============================================================================
// SCHEMA
// ============================================================================

pub use crate::config::{AsDictOptions, ModelConfig};
pub use crate::descriptor::{
    CollectionKind, CustomType, EnumType, NamedTupleType, TypeDescriptor, TypeVar, TypedDictType,
};
pub use crate::field::{Extra, Field, FieldDefault, FieldTransform, NamedProperty, Translations};
pub use crate::record::{Record, RecordType, RecordTypeBuilder};

// ============================================================================
// VALIDATION
// ============================================================================

pub use crate::order::{Order, Phase};
pub use crate::resolve::{Resolver, cast, cast_sync, resolve};
pub use crate::validator::{Check, RootValidator, Validator};

// ============================================================================
// VALUES AND ERRORS
// ============================================================================

pub use crate::error::{
    AggregateError, Error, ErrorCatcher, ErrorKind, LocSegment, LocatedError, Location,
    ResolveError, ValidationError,
};
pub use crate::value::{Mapping, Value, ValueKind};
