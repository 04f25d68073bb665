//! Property-based tests for nebula-model.

use std::sync::Arc;

use nebula_model::prelude::*;
use proptest::prelude::*;

fn profile() -> Arc<RecordType> {
    RecordType::builder("Profile")
        .field("id", Field::new(TypeDescriptor::Int))
        .field(
            "nick",
            Field::new(TypeDescriptor::optional(TypeDescriptor::Str)).default(Value::Null),
        )
        .field(
            "scores",
            Field::new(TypeDescriptor::list(TypeDescriptor::Float))
                .default_factory(|| Value::List(Vec::new())),
        )
        .build()
        .unwrap()
}

fn input(id: i64, nick: Option<String>, scores: Vec<i32>) -> Mapping {
    let mut obj = Mapping::new();
    obj.insert("id".into(), Value::from(id.to_string()));
    if let Some(nick) = nick {
        obj.insert("nick".into(), Value::from(nick));
    }
    obj.insert(
        "scores".into(),
        Value::List(scores.into_iter().map(Value::from).collect()),
    );
    obj
}

// ============================================================================
// IDEMPOTENCY: validate(validate(x)) == validate(x)
// ============================================================================

proptest! {
    #[test]
    fn validation_is_idempotent(
        id in any::<i64>(),
        nick in proptest::option::of("[a-z]{0,8}"),
        scores in proptest::collection::vec(any::<i32>(), 0..5),
    ) {
        let model = profile();
        let once = model.validate_sync(input(id, nick, scores)).unwrap();
        let twice = model.validate_sync(once.clone()).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn created_records_pass_through(id in any::<i64>()) {
        let model = profile();
        let record = model.create_sync(input(id, None, vec![])).unwrap();
        let again = model.create_sync(record.clone()).unwrap();
        prop_assert_eq!(again, record);
    }
}

// ============================================================================
// COERCION: numbers survive their string form
// ============================================================================

proptest! {
    #[test]
    fn int_strings_round_trip(n in any::<i64>()) {
        prop_assert_eq!(cast_sync(&TypeDescriptor::Int, n.to_string()), Ok(Value::Int(n)));
    }

    #[test]
    fn finite_floats_round_trip(x in proptest::num::f64::NORMAL) {
        prop_assert_eq!(cast_sync(&TypeDescriptor::Float, x.to_string()), Ok(Value::Float(x)));
    }

    #[test]
    fn every_failed_item_is_reported(items in proptest::collection::vec(any::<bool>(), 0..8)) {
        // true marks a bad item
        let raw: Vec<Value> = items
            .iter()
            .map(|bad| if *bad { Value::from("x") } else { Value::Int(1) })
            .collect();
        let expected: Vec<String> = items
            .iter()
            .enumerate()
            .filter(|(_, bad)| **bad)
            .map(|(i, _)| i.to_string())
            .collect();

        match cast_sync(&TypeDescriptor::list(TypeDescriptor::Int), Value::List(raw)) {
            Ok(_) => prop_assert!(expected.is_empty()),
            Err(Error::Validation(error)) => {
                let locs: Vec<String> = error
                    .as_aggregate()
                    .unwrap()
                    .flatten()
                    .map(|(loc, _)| loc.to_string())
                    .collect();
                prop_assert_eq!(locs, expected);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}
