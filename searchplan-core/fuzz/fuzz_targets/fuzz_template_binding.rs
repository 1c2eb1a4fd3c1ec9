#![no_main]

use libfuzzer_sys::fuzz_target;
use searchplan_core::{ListDirective, SearchConfig};
use serde_json::json;

// Fuzz target: binding arbitrary request input to a list directive
// Goal: paging, sort and more-lifting never panic on odd input shapes

fuzz_target!(|data: &[u8]| {
    let Ok(input) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    let directive = ListDirective::new("items", "ItemPaginator")
        .with_args(json!({"status": "open"}).as_object().cloned().unwrap_or_default());
    let default_config = SearchConfig::default();
    let paging_config = SearchConfig::default().with_paginate_by_default(true);

    let _ = directive.bind(&default_config, &input);
    let _ = directive.bind(&paging_config, &input);
});
