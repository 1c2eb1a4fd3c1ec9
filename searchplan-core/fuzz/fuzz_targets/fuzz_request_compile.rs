#![no_main]

use libfuzzer_sys::fuzz_target;
use searchplan_core::{
    ConditionSet, MemoryTable, ModelRegistry, QueryPlan, RecordingCursor, SearchConfig, SearchOptions,
    SearchRequest, Searcher,
};
use serde_json::json;

// Fuzz target: request parsing, normalization and planning with arbitrary JSON
// Goal: every malformed request is an Err, never a panic

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let Ok(request) = SearchRequest::from_json(&value) else {
        return;
    };

    let rows = (0..5)
        .map(|i| json!({"id": i, "name": format!("item_{}", i), "owner": {"name": "ann"}}))
        .collect();
    let table = MemoryTable::from_rows("Item", rows);
    let registry = ModelRegistry::new();

    if let Ok(set) = ConditionSet::compile(&request) {
        if let Ok(plan) = QueryPlan::build(&set, table.schema(), &registry) {
            let mut cursor = RecordingCursor::new();
            let _ = plan.apply(&mut cursor);
        }
    }

    // Same request executed end to end - should NEVER panic
    let config = SearchConfig::default();
    let searcher = Searcher::new(&config, &registry);
    let _ = searcher.search(&table, &request, &SearchOptions::new());
    let _ = searcher.count(&table, &request);
});
