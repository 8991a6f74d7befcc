//! Property tests for literal typing: range ceilings, quoting, and the
//! eq/ne partition of an entity set.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use cellstore_core::edm::range::{
    DATETIME_MAX_MILLIS, DATETIME_MIN_MILLIS, INT32_MAX, INT32_MIN, SINGLE_MAX_FRACTION_DIGITS,
    SINGLE_MAX_INTEGER_DIGITS,
};
use cellstore_core::filter::{ComparisonOp, Literal};
use cellstore_core::{
    parse, validate, CoreConfig, CoreEngine, CoreError, DocumentKey, DocumentStore, EdmType,
    EntityTypeSchema, FilterNode, InMemoryDocumentStore, InMemorySchema, QueryRequest,
    TypedFilterNode,
};
use proptest::prelude::*;
use serde_json::{json, Value};

fn schema() -> InMemorySchema {
    let schema = InMemorySchema::new();
    schema.register(
        EntityTypeSchema::new("Typed")
            .declare("name", EdmType::String)
            .declare("number", EdmType::Int32)
            .declare("ratio", EdmType::Single)
            .declare("amount", EdmType::Double)
            .declare("flag", EdmType::Boolean)
            .declare("stamp", EdmType::DateTime),
    );
    schema
}

/// Parse and validate, reporting failures by error code.
fn check(filter: &str) -> Result<TypedFilterNode, &'static str> {
    let node = parse(filter).map_err(|e| CoreError::from(e).code())?;
    validate(&node, "Typed", &schema()).map_err(|e| CoreError::from(e).code())
}

/// Integers clustered around `low` and `high`, plus a wide spread.
fn around(low: i64, high: i64) -> impl Strategy<Value = i64> {
    prop_oneof![
        (low - 1_000)..(low + 1_000),
        (high - 1_000)..(high + 1_000),
        (low - (1 << 20))..(high + (1 << 20)),
    ]
}

fn digits(count: usize) -> String {
    "1".repeat(count)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn int32_literals_respect_the_range(value in around(INT32_MIN, INT32_MAX)) {
        let result = check(&format!("number eq {}", value));
        if (INT32_MIN..=INT32_MAX).contains(&value) {
            prop_assert!(result.is_ok(), "{} rejected: {:?}", value, result);
        } else {
            prop_assert_eq!(result.unwrap_err(), "UNSUPPORTED_OPERAND_FORMAT");
        }
    }

    #[test]
    fn long_suffix_follows_the_same_range(value in around(INT32_MIN, INT32_MAX)) {
        let plain = check(&format!("number eq {}", value)).is_ok();
        let long = check(&format!("number eq {}L", value)).is_ok();
        prop_assert_eq!(plain, long);
    }

    #[test]
    fn datetime_millis_respect_the_range(
        value in around(DATETIME_MIN_MILLIS, DATETIME_MAX_MILLIS)
    ) {
        let result = check(&format!("stamp ge {}", value));
        if (DATETIME_MIN_MILLIS..=DATETIME_MAX_MILLIS).contains(&value) {
            prop_assert!(result.is_ok());
        } else {
            prop_assert_eq!(result.unwrap_err(), "UNSUPPORTED_OPERAND_FORMAT");
        }
    }

    #[test]
    fn integers_wider_than_i64_stay_typed(
        sign in prop_oneof![Just(""), Just("-")],
        digits in "[1-9][0-9]{19,30}",
    ) {
        let wide = format!("{}{}", sign, digits);
        prop_assert_eq!(
            check(&format!("number eq {}", wide)).unwrap_err(),
            "UNSUPPORTED_OPERAND_FORMAT"
        );
        prop_assert_eq!(
            check(&format!("stamp lt {}", wide)).unwrap_err(),
            "UNSUPPORTED_OPERAND_FORMAT"
        );
        let amount_query = format!("amount gt {}", wide);
        prop_assert!(check(&amount_query).is_ok());
    }

    #[test]
    fn single_digit_budget(
        integer in 1usize..=SINGLE_MAX_INTEGER_DIGITS + 2,
        fraction in 1usize..=SINGLE_MAX_FRACTION_DIGITS + 2,
    ) {
        let result = check(&format!("ratio eq {}.{}", digits(integer), digits(fraction)));
        let fits = integer <= SINGLE_MAX_INTEGER_DIGITS && fraction <= SINGLE_MAX_FRACTION_DIGITS;
        prop_assert_eq!(result.is_ok(), fits);
    }

    #[test]
    fn quoted_text_never_coerces(text in "[ -~]{0,16}") {
        let literal = Literal::String(text).to_string();
        for property in ["number", "ratio", "amount", "flag", "stamp"] {
            let result = check(&format!("{} eq {}", property, literal));
            prop_assert_eq!(result.unwrap_err(), "OPERATOR_AND_OPERAND_TYPE_MISMATCHED");
        }
    }

    #[test]
    fn string_literals_round_trip_through_the_parser(text in "[ -~\t\n\r]{0,24}") {
        let filter = format!("name eq {}", Literal::String(text.clone()));
        let node = parse(&filter).unwrap();
        prop_assert_eq!(
            node,
            FilterNode::Comparison {
                property: "name".into(),
                op: ComparisonOp::Eq,
                literal: Literal::String(text),
            }
        );
    }
}

// ============================================================================
// eq / ne partition
// ============================================================================

fn partition_fixture() -> (CoreEngine<InMemorySchema>, InMemoryDocumentStore) {
    let store = InMemoryDocumentStore::new();
    for i in 0..12i64 {
        let body = match i % 4 {
            0 => json!({ "name": format!("n{}", i) }),
            1 => json!({ "number": null }),
            _ => json!({ "number": i % 5 }),
        };
        let Value::Object(body) = body else {
            unreachable!()
        };
        store
            .write(&DocumentKey::new("Typed", format!("t{}", i)), body, Some(0))
            .unwrap();
    }
    (CoreEngine::new(Arc::new(schema()), CoreConfig::default()), store)
}

fn matching(
    engine: &CoreEngine<InMemorySchema>,
    store: &InMemoryDocumentStore,
    filter: &str,
) -> Vec<String> {
    let query = engine
        .parse_query("Typed", &QueryRequest::new().filter(filter).top(100))
        .unwrap();
    store
        .execute(&query)
        .unwrap()
        .ids()
        .into_iter()
        .map(str::to_string)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn eq_and_ne_partition_the_set(value in -2i64..7) {
        let (engine, store) = partition_fixture();
        let eq = matching(&engine, &store, &format!("number eq {}", value));
        let ne = matching(&engine, &store, &format!("number ne {}", value));
        prop_assert_eq!(eq.len() + ne.len(), store.len());
        prop_assert!(eq.iter().all(|id| !ne.contains(id)));
    }
}

#[test]
fn null_and_not_null_partition_the_set() {
    let (engine, store) = partition_fixture();
    let missing = matching(&engine, &store, "number eq null");
    let present = matching(&engine, &store, "number ne null");
    // absent on 0, 4, 8 and explicit null on 1, 5, 9
    assert_eq!(missing.len(), 6);
    assert_eq!(present.len(), 6);
    assert!(missing.iter().all(|id| !present.contains(id)));
}

