//! End-to-end `$filter` and query option behaviour: raw text in, matched
//! document ids out.

mod fixtures;

use cellstore_core::filter::{Literal, MAX_LOGICAL_OPERATORS};
use cellstore_core::{DocumentKey, DocumentStore, QueryRequest};
use fixtures::{ids, object, Fixture, DAY_MS, JAN_1_2020};
use serde_json::json;

// ============================================================================
// Comparisons and logic
// ============================================================================

#[test]
fn range_conjunction_selects_one_row() {
    let f = Fixture::sales();
    assert_eq!(f.filter("number ge 5 and number lt 6").unwrap(), ids(&["s5"]));
}

#[test]
fn disjunction_over_doubles() {
    let f = Fixture::sales();
    assert_eq!(
        f.filter("decimal gt 8.1 or decimal le 0.1").unwrap(),
        ids(&["s0", "s9"])
    );
}

#[test]
fn and_binds_tighter_than_or() {
    let f = Fixture::sales();
    assert_eq!(
        f.filter("number eq 1 or number eq 2 and flag eq false").unwrap(),
        ids(&["s1"])
    );
    assert_eq!(
        f.filter("(number eq 1 or number eq 2) and flag eq true").unwrap(),
        ids(&["s2"])
    );
}

#[test]
fn integer_literal_compares_with_double_field() {
    let f = Fixture::sales();
    assert_eq!(f.filter("decimal eq 3.1").unwrap(), ids(&["s3"]));
    assert_eq!(f.filter("decimal lt 2").unwrap(), ids(&["s0", "s1"]));
    assert!(f.filter("decimal eq 3").unwrap().is_empty());
}

#[test]
fn unclosed_group_is_tolerated() {
    let f = Fixture::sales();
    assert_eq!(f.filter("(number eq 1").unwrap(), ids(&["s1"]));
    assert_eq!(f.code("number eq 1)"), "FILTER_PARSE_ERROR");
}

#[test]
fn datetime_ranges_compare_as_millis() {
    let f = Fixture::sales();
    assert_eq!(
        f.filter("sold ge datetime'2020-01-08T00:00'").unwrap(),
        ids(&["s7", "s8", "s9"])
    );
    let millis = JAN_1_2020 + 2 * DAY_MS;
    assert_eq!(f.filter(&format!("sold eq {}", millis)).unwrap(), ids(&["s2"]));
    assert_eq!(
        f.filter("sold lt datetimeoffset'2020-01-02T00:00:00.000+01:00'").unwrap(),
        ids(&["s0"])
    );
}

// ============================================================================
// Lists, dynamic properties, null
// ============================================================================

#[test]
fn list_field_matches_any_element() {
    let f = Fixture::sales();
    // tags are [i, i + 3]
    assert_eq!(f.filter("tags eq 4").unwrap(), ids(&["s1", "s4"]));
    assert_eq!(f.filter("tags gt 11").unwrap(), ids(&["s9"]));
}

#[test]
fn dynamic_property_keeps_its_first_written_type() {
    let f = Fixture::sales();
    assert_eq!(
        f.filter("color eq 'red'").unwrap(),
        ids(&["s0", "s2", "s4", "s6", "s8"])
    );
    assert_eq!(
        f.filter("color eq null").unwrap(),
        ids(&["s1", "s3", "s5", "s7", "s9"])
    );
    assert_eq!(f.code("color eq 1.5f"), "OPERATOR_AND_OPERAND_TYPE_MISMATCHED");
    assert_eq!(f.code("color eq 1111"), "OPERATOR_AND_OPERAND_TYPE_MISMATCHED");
    assert_eq!(f.code("color eq true"), "OPERATOR_AND_OPERAND_TYPE_MISMATCHED");
    assert_eq!(f.code("startswith(color,'r')"), "OK");
}

#[test]
fn declared_defaults_are_written_for_absent_values() {
    let f = Fixture::sales();
    assert_eq!(f.ids("Product", "$filter=stock+eq+0").unwrap(), ids(&["p1"]));
    assert_eq!(f.ids("Product", "$filter=stock+gt+0").unwrap(), ids(&["p2"]));
}

#[test]
fn null_and_not_null_partition_the_set() {
    let f = Fixture::sales();
    let missing = f.filter("color eq null").unwrap();
    let present = f.filter("color ne null").unwrap();
    assert_eq!(missing.len() + present.len(), 10);
    assert!(missing.iter().all(|id| !present.contains(id)));
}

#[test]
fn ne_includes_rows_without_the_field() {
    let f = Fixture::sales();
    f.store
        .write(
            &DocumentKey::new("SalesDetail", "bare"),
            object(json!({ "name": "bare" })),
            Some(0),
        )
        .unwrap();
    let hits = f.filter("number ne 0").unwrap();
    assert_eq!(hits.len(), 10);
    assert!(hits.contains(&"bare".to_string()));
}

// ============================================================================
// String functions and escaping
// ============================================================================

#[test]
fn startswith_and_substringof() {
    let f = Fixture::sales();
    assert_eq!(f.filter("startswith(name,'item1')").unwrap(), ids(&["s1"]));
    assert_eq!(f.filter("startswith(name,'')").unwrap().len(), 10);
    assert_eq!(f.filter("substringof('em7',name)").unwrap(), ids(&["s7"]));
    assert!(f.filter("substringof('',name)").unwrap().is_empty());
    assert!(f.filter("name eq ''").unwrap().is_empty());
}

#[test]
fn malformed_function_calls() {
    let f = Fixture::sales();
    for filter in [
        "startswith(test)",
        "startswith(name)",
        "startswith('item'),'item'",
        "startswith(null,null)",
        "startswith()",
    ] {
        assert_eq!(f.code(filter), "FILTER_PARSE_ERROR", "{}", filter);
    }
    assert_eq!(f.code("endswith(name,'1')"), "UNSUPPORTED_QUERY_FUNCTION");
    assert_eq!(f.code("startswith(number,'1')"), "OPERATOR_AND_OPERAND_TYPE_MISMATCHED");
}

#[test]
fn quoted_strings_survive_a_round_trip() {
    let f = Fixture::sales();
    let samples = [
        "it's",
        "say \"hi\"",
        "back\\slash",
        "tab\there",
        "line\nbreak",
        "slash/ok",
    ];
    for (i, text) in samples.iter().enumerate() {
        f.store
            .write(
                &DocumentKey::new("SalesDetail", format!("esc{}", i)),
                object(json!({ "name": text })),
                Some(0),
            )
            .unwrap();
    }
    for (i, text) in samples.iter().enumerate() {
        let literal = Literal::String(text.to_string()).to_string();
        assert_eq!(
            f.filter(&format!("name eq {}", literal)).unwrap(),
            ids(&[&format!("esc{}", i)]),
            "{}",
            literal
        );
    }
}

#[test]
fn backslash_quote_escape_matches() {
    let f = Fixture::sales();
    f.store
        .write(
            &DocumentKey::new("SalesDetail", "apostrophe"),
            object(json!({ "name": "it's" })),
            Some(0),
        )
        .unwrap();
    assert_eq!(f.filter(r"name eq 'it\'s'").unwrap(), ids(&["apostrophe"]));
    assert_eq!(f.filter("name eq 'it''s'").unwrap(), ids(&["apostrophe"]));
}

#[test]
fn bad_escapes_are_rejected() {
    let f = Fixture::sales();
    assert_eq!(f.code(r"name eq 'a\qb'"), "OPERATOR_AND_OPERAND_UNABLE_TO_UNESCAPE");
    assert_eq!(f.code(r"name eq '\u0041'"), "OPERATOR_AND_OPERAND_UNABLE_TO_UNESCAPE");
    assert_eq!(f.filter(r"name eq 'item\u0000'").unwrap(), Vec::<String>::new());
}

// ============================================================================
// Key and type errors
// ============================================================================

#[test]
fn reserved_and_unknown_keys() {
    let f = Fixture::sales();
    assert_eq!(f.code("__metadata eq 'x'"), "UNKNOWN_QUERY_KEY");
    assert_eq!(f.code("nope eq 1"), "UNKNOWN_QUERY_KEY");
    assert_eq!(f.code("_Product eq 'x'"), "UNKNOWN_QUERY_KEY");
    assert_eq!(f.code("__id eq 's3'"), "OK");
}

#[test]
fn system_properties_are_filterable() {
    let f = Fixture::sales();
    assert_eq!(f.filter("__id eq 's3'").unwrap(), ids(&["s3"]));
    assert_eq!(f.filter("__published gt 0").unwrap().len(), 10);
}

#[test]
fn ordering_on_boolean_is_rejected() {
    let f = Fixture::sales();
    assert_eq!(f.code("flag gt true"), "FILTER_PARSE_ERROR");
    assert_eq!(f.code("flag eq true"), "OK");
}

#[test]
fn logical_chains_are_capped_before_they_grow_deep() {
    let f = Fixture::sales();
    let chain = |n: usize| vec!["number lt 3"; n].join(" and ");
    assert_eq!(
        f.filter(&chain(MAX_LOGICAL_OPERATORS + 1)).unwrap(),
        ids(&["s0", "s1", "s2"])
    );
    assert_eq!(f.code(&chain(MAX_LOGICAL_OPERATORS + 2)), "FILTER_PARSE_ERROR");
    assert_eq!(f.code(&vec!["flag eq true"; 5_000].join(" or ")), "FILTER_PARSE_ERROR");
}

#[test]
fn integers_wider_than_long_are_out_of_range() {
    let f = Fixture::sales();
    assert_eq!(f.code("number eq 9223372036854775808"), "UNSUPPORTED_OPERAND_FORMAT");
    assert_eq!(f.code("sold ge 9223372036854775808"), "UNSUPPORTED_OPERAND_FORMAT");
    assert_eq!(f.filter("decimal lt 99999999999999999999").unwrap().len(), 10);
}

#[test]
fn unsupported_operators() {
    let f = Fixture::sales();
    assert_eq!(f.code("number add 1"), "UNSUPPORTED_QUERY_OPERATOR");
    assert_eq!(f.code("not flag eq true"), "UNSUPPORTED_QUERY_OPERATOR");
}

// ============================================================================
// Paging, ordering, projection
// ============================================================================

#[test]
fn top_zero_still_counts() {
    let f = Fixture::sales();
    let query = f
        .engine
        .parse_query_string("SalesDetail", "$top=0&$inlinecount=allpages&$filter=flag+eq+true")
        .unwrap();
    let page = f.store.execute(&query).unwrap();
    assert!(page.results.is_empty());
    assert_eq!(page.count, Some(5));
}

#[test]
fn paging_limits() {
    let f = Fixture::sales();
    assert_eq!(f.ids("SalesDetail", "$top=10000").unwrap().len(), 10);
    let err = f.ids("SalesDetail", "$top=10001").unwrap_err();
    assert_eq!(err.code(), "QUERY_INVALID_ERROR");
    assert_eq!(err.http_status(), 400);
    assert!(f.ids("SalesDetail", "$skip=100000").unwrap().is_empty());
    assert_eq!(f.ids("SalesDetail", "$skip=100001").unwrap_err().code(), "QUERY_INVALID_ERROR");
    assert_eq!(
        f.ids("SalesDetail", "$top=abc").unwrap_err().code(),
        "QUERY_PARSE_ERROR_WITH_PARAM"
    );
}

#[test]
fn skip_then_top() {
    let f = Fixture::sales();
    assert_eq!(
        f.ids("SalesDetail", "$skip=3&$top=2").unwrap(),
        ids(&["s3", "s4"])
    );
}

#[test]
fn orderby_descending_with_missing_last() {
    let f = Fixture::sales();
    f.store
        .write(
            &DocumentKey::new("SalesDetail", "bare"),
            object(json!({ "name": "bare" })),
            Some(0),
        )
        .unwrap();
    let hits = f.ids("SalesDetail", "$orderby=number%20desc&$top=11").unwrap();
    assert_eq!(hits.first().map(String::as_str), Some("s9"));
    assert_eq!(hits.last().map(String::as_str), Some("bare"));
}

#[test]
fn first_parameter_occurrence_wins() {
    let f = Fixture::sales();
    assert_eq!(
        f.ids("SalesDetail", "$filter=number+eq+1&$filter=number+eq+2").unwrap(),
        ids(&["s1"])
    );
}

#[test]
fn select_keeps_system_fields() {
    let f = Fixture::sales();
    let query = f
        .engine
        .parse_query("SalesDetail", &QueryRequest::new().filter("number eq 4").select("name"))
        .unwrap();
    let page = f.store.execute(&query).unwrap();
    let body = &page.results[0].body;
    assert_eq!(body["name"], json!("item4"));
    assert!(body.contains_key("__id"));
    assert!(body.contains_key("__published"));
    assert!(body.contains_key("__updated"));
    assert!(!body.contains_key("number"));
}

#[test]
fn keyword_search_combines_with_the_filter() {
    let f = Fixture::sales();
    assert_eq!(
        f.ids("SalesDetail", "q=RED&$filter=number+lt+3").unwrap(),
        ids(&["s0", "s2"])
    );
}

#[test]
fn navigation_query_and_expand() {
    let f = Fixture::sales();
    let product = DocumentKey::new("Product", "p1");
    for id in ["s1", "s2"] {
        f.store
            .link(&DocumentKey::new("SalesDetail", id), &product)
            .unwrap();
    }
    let request = QueryRequest::new().filter("flag eq true");
    let query = f
        .engine
        .parse_navigation_query(&product, "_SalesDetail", &request)
        .unwrap();
    assert_eq!(f.store.execute(&query).unwrap().ids(), vec!["s2"]);

    let query = f
        .engine
        .parse_query_string("SalesDetail", "$filter=number+eq+1&$expand=_Product")
        .unwrap();
    let page = f.store.execute(&query).unwrap();
    let related = &page.results[0].expanded["_Product"];
    assert_eq!(related.len(), 1);
    assert_eq!(related[0]["label"], json!("widget"));

    assert_eq!(
        f.ids("SalesDetail", "$expand=_Product&$top=101").unwrap_err().code(),
        "QUERY_INVALID_ERROR"
    );
}
