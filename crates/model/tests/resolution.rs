//! Type resolution and one-shot casts.

use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexSet;
use nebula_model::prelude::*;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

fn cast_ok(tp: &TypeDescriptor, value: impl Into<Value>) -> Value {
    cast_sync(tp, value).expect("cast should succeed")
}

fn validation_error(tp: &TypeDescriptor, value: impl Into<Value>) -> ValidationError {
    match cast_sync(tp, value) {
        Err(Error::Validation(error)) => error,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

// ============================================================================
// OPTIONAL AND UNIONS
// ============================================================================

#[rstest]
#[case(Value::Null, Value::Null)]
#[case(Value::from("42"), Value::Int(42))]
#[case(Value::Int(7), Value::Int(7))]
fn optional_int(#[case] input: Value, #[case] expected: Value) {
    let tp = TypeDescriptor::optional(TypeDescriptor::Int);
    assert_eq!(cast_ok(&tp, input), expected);
}

#[test]
fn int_float_union_keeps_fractions() {
    let tp = TypeDescriptor::union([TypeDescriptor::Int, TypeDescriptor::Float]);
    assert_eq!(cast_ok(&tp, 4.2), Value::Float(4.2));
}

#[test]
fn first_matching_member_wins() {
    let tp = TypeDescriptor::union([TypeDescriptor::Int, TypeDescriptor::Str]);
    assert_eq!(cast_ok(&tp, "12"), Value::Int(12));
    assert_eq!(cast_ok(&tp, "twelve"), Value::from("twelve"));
}

#[test]
fn failing_unions_report_every_member() {
    let tp = TypeDescriptor::union([TypeDescriptor::Int, TypeDescriptor::DateTime]);
    let error = validation_error(&tp, "soon");
    let locs: Vec<String> = error
        .as_aggregate()
        .unwrap()
        .flatten()
        .map(|(loc, _)| loc.to_string())
        .collect();
    assert_eq!(locs, ["Union[0]", "Union[1]"]);
}

// ============================================================================
// SCALARS
// ============================================================================

#[test]
fn iso_and_timestamp_datetimes_agree() {
    let from_iso = cast_ok(&TypeDescriptor::DateTime, "2012-01-01T00:00:00Z");
    let from_timestamp = cast_ok(&TypeDescriptor::DateTime, 1_325_376_000);
    let expected: DateTime<Utc> = Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap();

    assert_eq!(from_iso, from_timestamp);
    assert_eq!(from_iso, Value::from(expected));
}

#[test]
fn unparsable_datetimes_are_value_errors() {
    let error = validation_error(&TypeDescriptor::DateTime, "yesterday");
    assert_eq!(error.kind(), ErrorKind::Value);
}

#[rstest]
#[case(Value::from("yes"), true)]
#[case(Value::from(""), false)]
#[case(Value::Int(0), false)]
#[case(Value::List(vec![Value::Null]), true)]
fn bools_follow_truthiness(#[case] input: Value, #[case] expected: bool) {
    assert_eq!(cast_ok(&TypeDescriptor::Bool, input), Value::Bool(expected));
}

#[test]
fn non_numeric_int_input_is_a_type_error() {
    let error = validation_error(&TypeDescriptor::Int, Value::Null);
    assert_eq!(error.kind(), ErrorKind::Type);
    assert_eq!(
        error.to_string(),
        "int() argument must be a string, a bytes-like object or a real number, not 'NoneType'"
    );
}

// ============================================================================
// COLLECTIONS AND MAPPINGS
// ============================================================================

#[test]
fn bool_sets_deduplicate() {
    let tp = TypeDescriptor::set(TypeDescriptor::Bool);
    let expected: IndexSet<Value> = [Value::Bool(false), Value::Bool(true)].into_iter().collect();
    assert_eq!(cast_ok(&tp, json!([0, 1, 1])), Value::Set(expected));
}

#[test]
fn sequences_coerce_items_into_tuples() {
    let tp = TypeDescriptor::sequence(TypeDescriptor::Float);
    assert_eq!(
        cast_ok(&tp, Value::List(vec![Value::Int(1), Value::from("2.5")])),
        Value::Tuple(vec![Value::Float(1.0), Value::Float(2.5)])
    );
}

#[test]
fn item_errors_are_indexed() {
    let tp = TypeDescriptor::list(TypeDescriptor::Int);
    let error = validation_error(&tp, json!(["1", "x", 3]));
    let locs: Vec<String> = error
        .as_aggregate()
        .unwrap()
        .flatten()
        .map(|(loc, _)| loc.to_string())
        .collect();
    assert_eq!(locs, ["1"]);
}

#[test]
fn strings_are_not_collections() {
    let error = validation_error(&TypeDescriptor::list(TypeDescriptor::Str), "abc");
    assert_eq!(error.to_string(), "Expected iterable, got str");
}

#[test]
fn mappings_coerce_keys_and_values() {
    let tp = TypeDescriptor::mapping(TypeDescriptor::Str, TypeDescriptor::Int);
    assert_eq!(
        cast_ok(&tp, json!({"a": "1", "b": 2})),
        Value::from(json!({"a": 1, "b": 2}))
    );
}

// ============================================================================
// LITERALS, CUSTOM HOOKS AND ESCAPE HATCHES
// ============================================================================

#[test]
fn literals_accept_only_listed_values() {
    let tp = TypeDescriptor::literal(["asc", "desc"]);
    assert_eq!(cast_ok(&tp, "asc"), Value::from("asc"));

    let error = validation_error(&tp, "up");
    assert_eq!(error.kind(), ErrorKind::Type);
    assert_eq!(error.to_string(), "Expected one of {'asc', 'desc'}, got 'up'");
}

#[test]
fn custom_types_use_their_validator() {
    let upper = TypeDescriptor::custom(
        "Upper",
        Validator::new(|value: Value| match value {
            Value::Str(s) => Ok(Value::Str(s.to_uppercase())),
            other => Err(ValidationError::type_error(format!(
                "Expected str, got {}",
                other.type_name()
            ))),
        }),
    );
    assert_eq!(cast_ok(&upper, "abc"), Value::from("ABC"));
    assert_eq!(validation_error(&upper, 1).kind(), ErrorKind::Type);
}

#[test]
fn protocols_cannot_be_resolved() {
    let tp = TypeDescriptor::protocol("SupportsRead");
    assert_eq!(
        cast_sync(&tp, 1),
        Err(Error::Resolve(ResolveError::UnknownType("SupportsRead".into())))
    );
}

#[test]
fn untyped_fields_accept_anything() {
    let tp = TypeDescriptor::untyped(TypeDescriptor::protocol("SupportsRead"));
    assert_eq!(cast_ok(&tp, json!({"k": [1]})), Value::from(json!({"k": [1]})));
}

#[test]
fn record_fields_with_protocol_types_fail_at_build() {
    let error = RecordType::builder("Stream")
        .field("source", Field::new(TypeDescriptor::protocol("SupportsRead")))
        .build()
        .unwrap_err();
    assert_eq!(error, ResolveError::UnknownType("SupportsRead".into()));
}

#[test]
fn enums_look_members_up_by_value() {
    let level = TypeDescriptor::enumeration(
        EnumType::new("Level")
            .base(TypeDescriptor::Int)
            .member("LOW", 1)
            .member("HIGH", 2),
    );
    let Value::Enum(member) = cast_ok(&level, "2") else {
        panic!("expected an enum member");
    };
    assert_eq!(member.name(), "HIGH");
    assert_eq!(
        validation_error(&level, 5).to_string(),
        "5 is not a valid Level"
    );
}

// ============================================================================
// ASYNC CAST
// ============================================================================

#[tokio::test]
async fn async_cast_matches_sync_cast() {
    let tp = TypeDescriptor::list(TypeDescriptor::Int);
    let value = cast(&tp, json!(["1", 2])).await.unwrap();
    assert_eq!(value, cast_ok(&tp, json!(["1", 2])));
}
