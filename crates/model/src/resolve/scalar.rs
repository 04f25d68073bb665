//! Scalar coercions

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

use crate::error::ValidationError;
use crate::validator::Validator;
use crate::value::{Value, ValueKind};

type Coerced = Result<Value, ValidationError>;

pub(super) fn any() -> Validator {
    Validator::new(Ok).named("any")
}

pub(super) fn int() -> Validator {
    Validator::new(to_int).named("int")
}

pub(super) fn float() -> Validator {
    Validator::new(to_float).named("float")
}

pub(super) fn str() -> Validator {
    Validator::new(to_str).named("str")
}

pub(super) fn bytes() -> Validator {
    Validator::new(to_bytes).named("bytes")
}

pub(super) fn bool() -> Validator {
    Validator::new(to_bool).named("bool")
}

pub(super) fn datetime() -> Validator {
    Validator::new(to_datetime).named("datetime")
}

pub(super) fn duration() -> Validator {
    Validator::new(to_duration).named("timedelta")
}

/// Accepts values of `kind` unchanged.
pub(super) fn instance(kind: ValueKind) -> Validator {
    Validator::new(move |value: Value| {
        let actual = value.kind();
        if actual == kind || (kind == ValueKind::DateTime && actual == ValueKind::NaiveDateTime) {
            Ok(value)
        } else {
            Err(ValidationError::type_error(format!(
                "Expected {kind}, got {}",
                value.repr()
            )))
        }
    })
    .named(kind.name())
}

/// Accepts opaque values declared with `name` unchanged.
pub(super) fn opaque(name: Cow<'static, str>) -> Validator {
    let label = name.clone();
    Validator::new(move |value: Value| match &value {
        Value::Opaque(opaque) if opaque.type_name() == name => Ok(value),
        other => Err(ValidationError::type_error(format!(
            "Expected {name}, got {}",
            other.repr()
        ))),
    })
    .named(label)
}

// ============================================================================
// NUMBERS
// ============================================================================

pub(crate) fn to_int(value: Value) -> Coerced {
    match value {
        Value::Int(_) => Ok(value),
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Float(f) => float_to_int(f).map(Value::Int),
        Value::Str(s) => parse_int(&s).map(Value::Int),
        Value::Bytes(b) => parse_int(&utf8(b)?).map(Value::Int),
        Value::Enum(member) => to_int(member.value().clone()),
        other => Err(ValidationError::type_error(format!(
            "int() argument must be a string, a bytes-like object or a real number, not '{}'",
            other.type_name()
        ))),
    }
}

pub(crate) fn to_float(value: Value) -> Coerced {
    match value {
        Value::Float(_) => Ok(value),
        other => float_value(other).map(Value::Float),
    }
}

fn float_value(value: Value) -> Result<f64, ValidationError> {
    match value {
        Value::Float(f) => Ok(f),
        Value::Int(i) => Ok(i as f64),
        Value::Bool(b) => Ok(if b { 1.0 } else { 0.0 }),
        Value::Str(s) => parse_float(&s),
        Value::Bytes(b) => parse_float(&utf8(b)?),
        Value::Enum(member) => float_value(member.value().clone()),
        other => Err(ValidationError::type_error(format!(
            "float() argument must be a string or a real number, not '{}'",
            other.type_name()
        ))),
    }
}

fn float_to_int(f: f64) -> Result<i64, ValidationError> {
    if f.is_nan() {
        return Err(ValidationError::value_error(
            "cannot convert float NaN to integer",
        ));
    }
    if f.is_infinite() {
        return Err(ValidationError::value_error(
            "cannot convert float infinity to integer",
        ));
    }
    let truncated = f.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(ValidationError::value_error(format!(
            "integer {truncated} does not fit in 64 bits"
        )));
    }
    Ok(truncated as i64)
}

fn parse_int(raw: &str) -> Result<i64, ValidationError> {
    strip_underscores(raw.trim())
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| {
            ValidationError::value_error(format!(
                "invalid literal for int() with base 10: {}",
                Value::from(raw).repr()
            ))
        })
}

fn parse_float(raw: &str) -> Result<f64, ValidationError> {
    strip_underscores(raw.trim())
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| {
            ValidationError::value_error(format!(
                "could not convert string to float: {}",
                Value::from(raw).repr()
            ))
        })
}

/// Removes digit-group underscores; an underscore must sit between two digits.
fn strip_underscores(s: &str) -> Option<Cow<'_, str>> {
    if !s.contains('_') {
        return Some(Cow::Borrowed(s));
    }
    let bytes = s.as_bytes();
    for (i, byte) in bytes.iter().enumerate() {
        if *byte != b'_' {
            continue;
        }
        let before = i.checked_sub(1).map(|p| bytes[p]);
        let after = bytes.get(i + 1).copied();
        if !before.is_some_and(|b| b.is_ascii_digit()) || !after.is_some_and(|b| b.is_ascii_digit())
        {
            return None;
        }
    }
    Some(Cow::Owned(s.replace('_', "")))
}

fn utf8(bytes: Vec<u8>) -> Result<String, ValidationError> {
    String::from_utf8(bytes).map_err(|e| {
        ValidationError::value_error(format!("bytes are not valid UTF-8: {e}"))
    })
}

// ============================================================================
// TEXT, BYTES, BOOL
// ============================================================================

pub(crate) fn to_str(value: Value) -> Coerced {
    match value {
        Value::Str(_) => Ok(value),
        Value::Bytes(b) => utf8(b).map(Value::Str),
        other => Ok(Value::Str(other.to_string())),
    }
}

pub(crate) fn to_bytes(value: Value) -> Coerced {
    match value {
        Value::Bytes(_) => Ok(value),
        Value::Str(s) => Ok(Value::Bytes(s.into_bytes())),
        Value::List(items) | Value::Tuple(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Int(n) => u8::try_from(n).map_err(|_| {
                    ValidationError::value_error("bytes must be in range(0, 256)")
                }),
                other => Err(ValidationError::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    other.type_name()
                ))),
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(Value::Bytes),
        other => Err(ValidationError::type_error(format!(
            "cannot convert '{}' object to bytes",
            other.type_name()
        ))),
    }
}

pub(crate) fn to_bool(value: Value) -> Coerced {
    Ok(Value::Bool(value.is_truthy()))
}

// ============================================================================
// TIME
// ============================================================================

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const AWARE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

/// Datetimes are normalized to UTC; naive input is taken to be UTC already.
/// Numbers and numeric strings are unix timestamps in seconds.
pub(crate) fn to_datetime(value: Value) -> Coerced {
    match value {
        Value::DateTime(dt) => Ok(Value::from(dt.with_timezone(&Utc))),
        Value::NaiveDateTime(dt) => Ok(Value::from(dt.and_utc())),
        Value::Int(secs) => from_timestamp(secs as f64),
        Value::Float(secs) => from_timestamp(secs),
        Value::Str(s) => match s.trim().parse::<f64>() {
            Ok(secs) => from_timestamp(secs),
            Err(_) => parse_iso(&s).map(Value::from),
        },
        other => Err(ValidationError::type_error(format!(
            "Expected datetime, got {}",
            other.type_name()
        ))),
    }
}

fn from_timestamp(secs: f64) -> Coerced {
    let out_of_range = || ValidationError::value_error(format!("timestamp {secs} is out of range"));
    if !secs.is_finite() || secs.abs() > (i64::MAX / 1_000_000) as f64 {
        return Err(out_of_range());
    }
    DateTime::from_timestamp_micros((secs * 1e6).round() as i64)
        .map(Value::from)
        .ok_or_else(out_of_range)
}

fn parse_iso(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let s = raw.trim().trim_end_matches('Z');

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in AWARE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(midnight.and_utc());
    }

    Err(ValidationError::value_error(format!(
        "Invalid isoformat string: {}",
        Value::from(raw).repr()
    )))
}

/// Durations pass through; numbers are seconds with microsecond precision.
pub(crate) fn to_duration(value: Value) -> Coerced {
    let secs = match value {
        Value::Duration(_) => return Ok(value),
        other => float_value(other)?,
    };
    if !secs.is_finite() || secs.abs() > (i64::MAX / 1_000_000) as f64 {
        return Err(ValidationError::value_error(format!(
            "duration of {secs} seconds is out of range"
        )));
    }
    Ok(Value::Duration(TimeDelta::microseconds(
        (secs * 1e6).round() as i64
    )))
}
