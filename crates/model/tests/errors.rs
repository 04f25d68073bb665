//! Rendering and structure of aggregated validation errors.

use std::sync::Arc;

use nebula_model::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn person() -> Arc<RecordType> {
    let address = RecordType::builder("Address")
        .field("zip", Field::new(TypeDescriptor::Int))
        .field("city", Field::new(TypeDescriptor::Str))
        .build()
        .unwrap();

    RecordType::builder("Person")
        .field("name", Field::new(TypeDescriptor::Str))
        .field("home", Field::new(TypeDescriptor::record(&address)))
        .field(
            "tags",
            Field::new(TypeDescriptor::list(TypeDescriptor::Int))
                .default_factory(|| Value::List(Vec::new())),
        )
        .build()
        .unwrap()
}

// ============================================================================
// RENDERING
// ============================================================================

#[test]
fn missing_fields_render_one_entry_each() {
    let error = person().create_sync(json!({"tags": []})).unwrap_err();
    insta::assert_snapshot!(error.to_string(), @r"
    2 validation errors for Person
    name
      missing: Missing required field: 'name'
    home
      missing: Missing required field: 'home'
    ");
}

#[test]
fn nested_errors_render_full_paths() {
    let error = person()
        .create_sync(json!({
            "name": "ann",
            "home": {"zip": "abc", "city": "Oslo"},
            "tags": [1, "x"]
        }))
        .unwrap_err();
    insta::assert_snapshot!(error.to_string(), @r"
    2 validation errors for Person
    home -> zip
      value_error: invalid literal for int() with base 10: 'abc'
    tags -> 1
      value_error: invalid literal for int() with base 10: 'x'
    ");
}

#[test]
fn single_errors_are_not_pluralized() {
    let model = RecordType::builder("Flag")
        .field("on", Field::new(TypeDescriptor::Int))
        .build()
        .unwrap();
    let error = model.create_sync(json!({"on": null})).unwrap_err();
    insta::assert_snapshot!(error.to_string(), @r"
    1 validation error for Flag
    on
      type_error: int() argument must be a string, a bytes-like object or a real number, not 'NoneType'
    ");
}

#[test]
fn root_errors_render_at_root() {
    let model = RecordType::builder("Window")
        .field("start", Field::new(TypeDescriptor::Int))
        .field("end", Field::new(TypeDescriptor::Int))
        .root_validator(
            RootValidator::new(|obj: Mapping| {
                let start = obj.get("start").and_then(Value::as_int);
                let end = obj.get("end").and_then(Value::as_int);
                if start > end {
                    return Err(ValidationError::value_error("start must not be after end"));
                }
                Ok(obj)
            })
            .with_order(Order::FINAL_ROOT),
        )
        .build()
        .unwrap();

    let error = model.create_sync(json!({"start": 5, "end": 1})).unwrap_err();
    insta::assert_snapshot!(error.to_string(), @r"
    1 validation error for Window
    __root__
      value_error: start must not be after end
    ");
}

// ============================================================================
// STRUCTURE
// ============================================================================

#[test]
fn nested_aggregates_keep_their_own_model() {
    let error = person()
        .create_sync(json!({"name": "ann", "home": {"zip": 1}}))
        .unwrap_err();
    let outer = error.as_aggregate().unwrap();
    assert_eq!(outer.model(), "Person");
    assert_eq!(outer.errors().len(), 1);

    let entry = &outer.errors()[0];
    assert_eq!(entry.loc.to_string(), "home");
    assert_eq!(entry.kind(), ErrorKind::Aggregate);
    let inner = entry.as_aggregate().unwrap();
    assert_eq!(inner.model(), "Address");
    assert_eq!(inner.errors()[0].error, ValidationError::MissingField("city".into()));
}

#[test]
fn locations_are_structured_segments() {
    let error = person()
        .create_sync(json!({"name": "ann", "home": {"zip": 1, "city": "x"}, "tags": ["a"]}))
        .unwrap_err();
    let locations = error.as_aggregate().unwrap().locations();
    assert_eq!(locations.len(), 1);
    let (loc, leaf) = &locations[0];
    assert_eq!(
        loc.segments(),
        [LocSegment::Key("tags".into()), LocSegment::Index(0)]
    );
    assert_eq!(leaf.kind(), ErrorKind::Value);
}

#[test]
fn catchers_aggregate_data_errors_and_pass_misuse_through() {
    let mut catcher = ErrorCatcher::new("Manual");
    let kept = catcher
        .catch("a", Ok::<_, ValidationError>(Value::Int(1)))
        .unwrap();
    assert_eq!(kept, Some(Value::Int(1)));

    let dropped = catcher
        .catch::<Value>("b", Err(ValidationError::type_error("bad")))
        .unwrap();
    assert_eq!(dropped, None);

    let misuse = catcher.catch::<Value>("c", Err(ValidationError::Suspended("slow".into())));
    assert!(matches!(misuse, Err(ValidationError::Suspended(_))));

    let error = catcher.raise_errors().unwrap_err();
    insta::assert_snapshot!(error.to_string(), @r"
    1 validation error for Manual
    b
      type_error: bad
    ");
}
