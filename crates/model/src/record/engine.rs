//! Validation pipeline for one record type.
//!
//! The phase sequence is a single `async` body. The asynchronous entry
//! points await it; the synchronous ones poll it once and report
//! [`ValidationError::Suspended`] if anything inside actually suspends.
//!
//! Each phase is its own error scope: errors are collected per hook or per
//! field validator and raised together when the phase ends, so later phases
//! never run on a mapping that failed an earlier one.

use std::fmt;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{Instrument, debug, debug_span, trace};

use super::{Record, RecordType};
use crate::error::{ErrorCatcher, LocSegment, ValidationError};
use crate::order::Phase;
use crate::value::Mapping;

/// Runs every phase of `model` over `obj`, writing accepted values onto
/// `record` as they are produced. Extras are read only when `extras` is set.
///
/// Returns the validated mapping keyed by attribute name.
pub(super) fn run<'a>(
    model: &'a RecordType,
    obj: Mapping,
    record: &'a mut Record,
    extras: bool,
) -> BoxFuture<'a, Result<Mapping, ValidationError>> {
    let span = debug_span!("validate", record = %model.name(), extras);
    phases(model, obj, record, extras).instrument(span).boxed()
}

async fn phases(
    model: &RecordType,
    obj: Mapping,
    record: &mut Record,
    extras: bool,
) -> Result<Mapping, ValidationError> {
    // INITIAL ROOT
    let mut obj = root_phase(model, Phase::InitialRoot, record, obj).await?;

    // ALIAS / DEFAULTS
    let mut carrier = Mapping::with_capacity(model.fields().len());
    for (attr, field) in model.fields() {
        if !obj.contains_key(field.alias())
            && let Some(default) = field.default().get()
        {
            obj.insert(field.alias().to_owned(), default);
        }
        if let Some(value) = obj.get(field.alias()) {
            record.set(attr, value.clone());
            carrier.insert(attr.clone(), value.clone());
        }
    }

    // EXTRAS
    if extras {
        let mut catcher = ErrorCatcher::new(model.name());
        for (attr, extra) in model.extras() {
            if let Some(value) = obj.get(extra.alias()) {
                record.set_extra(attr, value.clone());
            } else if let Some(default) = extra.default() {
                record.set_extra(attr, default.clone());
            } else {
                catcher.add_error(
                    ValidationError::MissingExtra(extra.alias().to_owned()),
                    attr.as_str(),
                );
            }
        }
        checkpoint("extras", catcher)?;
    }

    // ROOT
    let mut carrier = root_phase(model, Phase::Root, record, carrier).await?;

    // FIELD CHECK
    let mut catcher = ErrorCatcher::new(model.name());
    for (attr, field) in model.fields() {
        if !carrier.contains_key(attr) {
            catcher.add_error(
                ValidationError::MissingField(field.alias().to_owned()),
                attr.as_str(),
            );
        }
    }
    checkpoint("field_check", catcher)?;

    // VALIDATOR / ANNOTATION / POST VALIDATOR
    for phase in Phase::FIELD {
        trace!(%phase, "entering phase");
        let mut catcher = ErrorCatcher::new(model.name());
        for (attr, field) in model.fields() {
            for validator in field.validators_in(phase) {
                let Some(current) = carrier.get(attr).cloned() else {
                    continue;
                };
                trace!(field = %attr, validator = validator.name(), "running field validator");
                let result = validator.invoke(record, current).await;
                if let Some(value) = catcher.catch(attr.as_str(), result)? {
                    record.set(attr, value.clone());
                    carrier.insert(attr.clone(), value);
                }
            }
        }
        checkpoint(phase, catcher)?;
    }

    // FINAL ROOT
    let carrier = root_phase(model, Phase::FinalRoot, record, carrier).await?;
    for attr in model.fields().keys() {
        if let Some(value) = carrier.get(attr) {
            record.set(attr, value.clone());
        }
    }

    Ok(carrier)
}

/// Runs the root hooks of one phase. A failing hook leaves the mapping as
/// it was before that hook.
async fn root_phase(
    model: &RecordType,
    phase: Phase,
    record: &Record,
    mut obj: Mapping,
) -> Result<Mapping, ValidationError> {
    trace!(%phase, "entering phase");
    let mut catcher = ErrorCatcher::new(model.name());
    for hook in model
        .root_validators()
        .iter()
        .filter(|hook| hook.order().phase() == Some(phase))
    {
        trace!(validator = hook.name(), "running root hook");
        let result = hook.invoke(record, obj.clone()).await;
        if let Some(next) = catcher.catch(LocSegment::Root, result)? {
            obj = next;
        }
    }
    checkpoint(phase, catcher)?;
    Ok(obj)
}

fn checkpoint(phase: impl fmt::Display, catcher: ErrorCatcher) -> Result<(), ValidationError> {
    if catcher.has_errors() {
        debug!(%phase, errors = catcher.len(), "phase failed");
    }
    catcher.raise_errors()
}
