#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use searchplan_core::memory::raw::{parse_column_list, parse_order_list, RawPredicate};
use serde_json::{json, Value};

// Structured input: a raw SQL fragment and its bindings
#[derive(Debug, Arbitrary)]
struct RawInput {
    sql: String,
    ints: Vec<i64>,
    strings: Vec<String>,
}

// Fuzz target: raw where/having/order/group fragments
// Goal: find panics in the tokenizer, parser and evaluator

fuzz_target!(|input: RawInput| {
    if input.sql.len() > 512 || input.ints.len() + input.strings.len() > 32 {
        return;
    }

    let bindings: Vec<Value> = input
        .ints
        .iter()
        .map(|n| json!(n))
        .chain(input.strings.iter().map(|s| json!(s)))
        .collect();

    let row = json!({"id": 3, "name": "item_3", "score": 1.5, "tags": ["a"], "owner": {"name": "ann"}});

    if let Ok(predicate) = RawPredicate::parse(&input.sql, &bindings) {
        let _ = predicate.eval(&row);
        let _ = predicate.eval(&Value::Null);
    }
    let _ = parse_order_list(&input.sql);
    let _ = parse_column_list(&input.sql);
});
