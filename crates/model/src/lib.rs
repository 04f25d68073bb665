//! # nebula-model
//!
//! Schema-driven validation and coercion of loosely-typed records.
//!
//! A [`RecordType`](record::RecordType) declares fields with a type
//! descriptor, an optional wire alias and default, and any number of
//! validators. Validating a mapping against it coerces every field to its
//! declared type, runs user validators and root hooks in phase order, and
//! either produces a [`Record`](record::Record) or one aggregated error that
//! lists every failure with its location.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nebula_model::prelude::*;
//! use serde_json::json;
//!
//! let user = RecordType::builder("User")
//!     .field("id", Field::new(TypeDescriptor::Int))
//!     .field("email", Field::aliased("emailAddress", TypeDescriptor::Str))
//!     .field("nickname", Field::new(TypeDescriptor::Str).default(Value::Null))
//!     .build()?;
//!
//! let record = user.create_sync(json!({"id": "42", "emailAddress": "a@b.c"}))?;
//! assert_eq!(record.get("id"), Some(&Value::Int(42)));
//! ```
//!
//! ## Phases
//!
//! Validators run in bands ordered by [`Order`](order::Order): initial root
//! hooks on the raw input, alias and default handling, root hooks on the
//! attribute-keyed mapping, the required-field check, field validators
//! before coercion, the type-derived validator, field validators after
//! coercion, and final root hooks. Errors are collected per band and raised
//! at the band's end.
//!
//! ## Sync and async
//!
//! Every entry point has an async form and a `_sync` form. Validation logic is
//! written once; the sync form drives it without an executor and fails with
//! [`ValidationError::Suspended`](error::ValidationError::Suspended) if a
//! validator actually suspends.

// ValidationError is returned from every validator call on the hot path;
// boxing it would add an allocation per call.
#![allow(clippy::result_large_err)]

pub mod config;
pub mod descriptor;
pub mod error;
pub mod field;
pub mod order;
pub mod prelude;
pub mod record;
pub mod resolve;
pub mod validator;
pub mod value;

pub use resolve::{cast, cast_sync, resolve};
