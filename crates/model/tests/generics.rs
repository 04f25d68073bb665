//! Generic record types and type-variable binding.

use std::sync::Arc;

use nebula_model::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn page() -> Arc<RecordType> {
    RecordType::builder("Page")
        .type_params([TypeVar::new("T")])
        .field("items", Field::new(TypeDescriptor::list(TypeDescriptor::typevar("T"))))
        .field("total", Field::new(TypeDescriptor::Int))
        .build()
        .unwrap()
}

fn bound(model: &RecordType, var: &str) -> Option<String> {
    model.type_vars().get(var).map(ToString::to_string)
}

#[test]
fn unbound_parameters_accept_anything() {
    let record = page()
        .create_sync(json!({"items": ["a", 1], "total": "2"}))
        .unwrap();
    assert_eq!(
        record.get("items"),
        Some(&Value::List(vec![Value::from("a"), Value::Int(1)]))
    );
}

#[test]
fn specializing_binds_parameters() {
    let page = page();
    let ints = page.specialize([TypeDescriptor::Int]).unwrap();
    assert_eq!(ints.name(), "Page[int]");
    assert_eq!(bound(&ints, "T"), Some("int".to_owned()));

    let record = ints
        .create_sync(json!({"items": ["1", 2], "total": 2}))
        .unwrap();
    assert_eq!(
        record.get("items"),
        Some(&Value::List(vec![Value::Int(1), Value::Int(2)]))
    );

    let error = ints
        .create_sync(json!({"items": ["x"], "total": 1}))
        .unwrap_err();
    let locs: Vec<String> = error
        .as_aggregate()
        .unwrap()
        .flatten()
        .map(|(loc, _)| loc.to_string())
        .collect();
    assert_eq!(locs, ["items -> 0"]);
}

#[test]
fn specialized_instances_are_instances_of_the_base() {
    let page = page();
    let ints = page.specialize([TypeDescriptor::Int]).unwrap();
    assert!(ints.is_subtype_of(&page));

    let record = ints.create_sync(json!({"items": [], "total": 0})).unwrap();
    let passed = page.create_sync(record.clone()).unwrap();
    assert_eq!(passed, record);
}

#[test]
fn generic_field_types_specialize_on_resolution() {
    let feed = RecordType::builder("Feed")
        .field(
            "latest",
            Field::new(TypeDescriptor::generic(&page(), [TypeDescriptor::Float])),
        )
        .build()
        .unwrap();

    let record = feed
        .create_sync(json!({"latest": {"items": [1, "2.5"], "total": 2}}))
        .unwrap();
    let latest = record.get("latest").and_then(Value::as_record).unwrap();
    assert_eq!(latest.model().name(), "Page[float]");
    assert_eq!(
        latest.get("items"),
        Some(&Value::List(vec![Value::Float(1.0), Value::Float(2.5)]))
    );
}

#[test]
fn bounded_parameters_fall_back_to_their_bound() {
    let measured = RecordType::builder("Measured")
        .type_params([TypeVar::new("N").bound(TypeDescriptor::Float)])
        .field("value", Field::new(TypeDescriptor::typevar("N")))
        .build()
        .unwrap();
    let record = measured.create_sync(json!({"value": "1.5"})).unwrap();
    assert_eq!(record.get("value"), Some(&Value::Float(1.5)));
}

#[test]
fn partially_bound_bases_are_completed_by_subclasses() {
    let pair = RecordType::builder("Pair")
        .type_params([TypeVar::new("K"), TypeVar::new("V")])
        .field("key", Field::new(TypeDescriptor::typevar("K")))
        .field("value", Field::new(TypeDescriptor::typevar("V")))
        .build()
        .unwrap();
    let labeled = RecordType::builder("Labeled")
        .type_params([TypeVar::new("V")])
        .extends(&pair, [TypeDescriptor::Str, TypeDescriptor::typevar("V")])
        .build()
        .unwrap();
    let counted = labeled.specialize([TypeDescriptor::Int]).unwrap();

    assert_eq!(counted.name(), "Labeled[int]");
    assert_eq!(bound(&counted, "K"), Some("str".to_owned()));
    assert_eq!(bound(&counted, "V"), Some("int".to_owned()));
    assert_eq!(counted.field("value").unwrap().declared_type().to_string(), "int");

    let record = counted
        .create_sync(json!({"key": 7, "value": "8"}))
        .unwrap();
    assert_eq!(record.get("key"), Some(&Value::from("7")));
    assert_eq!(record.get("value"), Some(&Value::Int(8)));
}

#[test]
fn wrong_arity_is_rejected() {
    let error = page()
        .specialize([TypeDescriptor::Int, TypeDescriptor::Str])
        .unwrap_err();
    assert_eq!(
        error,
        ResolveError::TypeVarArity {
            base: "Page".into(),
            expected: 1,
            got: 2,
        }
    );
    assert_eq!(error.to_string(), "Page expects 1 type argument(s), got 2");
}

#[test]
fn duplicate_parameters_are_rejected() {
    let error = RecordType::builder("Twice")
        .type_params([TypeVar::new("T"), TypeVar::new("T")])
        .build()
        .unwrap_err();
    assert_eq!(
        error,
        ResolveError::DuplicateTypeVar {
            base: "Twice".into(),
            name: "T".into(),
        }
    );
}
