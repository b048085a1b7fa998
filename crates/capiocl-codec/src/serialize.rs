// SPDX-License-Identifier: Apache-2.0
//! Turns a populated [`Engine`] back into a JSON workflow configuration.

use std::collections::{BTreeMap, BTreeSet};

use capiocl_engine::Engine;
use capiocl_store::CommitRule;
use serde_json::{json, Value};

use crate::version::CodecVersion;
use crate::wire::{commit_rule_to_json, fire_rule_to_json};
use crate::SerializeError;

/// Serializes `engine` to a JSON document at the given `version` (currently
/// only `"1.0"` is accepted).
///
/// # Errors
///
/// Returns [`SerializeError::UnsupportedVersion`] for any other version
/// string.
pub fn serialize(engine: &Engine, version: &str) -> Result<Value, SerializeError> {
    let codec_version = CodecVersion::for_serialize(version)?;
    debug_assert_eq!(codec_version, CodecVersion::V1);

    let store = engine.store();
    let paths = store.paths();

    let mut producer_index: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut consumer_index: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for path in &paths {
        for app in store.producers(path) {
            producer_index.entry(app).or_default().push(path.clone());
        }
        for app in store.consumers(path) {
            consumer_index.entry(app).or_default().push(path.clone());
        }
    }

    let mut apps_seen: BTreeSet<String> = BTreeSet::new();
    let mut io_graph = Vec::new();

    for (app_name, outputs) in &producer_index {
        apps_seen.insert(app_name.clone());
        let inputs = consumer_index.get(app_name).cloned().unwrap_or_default();
        io_graph.push(app_entry(app_name, &inputs, outputs, store));
    }

    for (app_name, inputs) in &consumer_index {
        if apps_seen.contains(app_name) {
            continue;
        }
        io_graph.push(app_entry(app_name, inputs, &[], store));
    }

    let mut permanent = Vec::new();
    let mut exclude = Vec::new();
    let mut memory = Vec::new();
    let mut fs = Vec::new();
    for path in &paths {
        if store.is_permanent_snapshot(path) {
            permanent.push(path.clone());
        }
        if store.is_excluded(path) {
            exclude.push(path.clone());
        }
        if store.is_stored_in_memory(path) {
            memory.push(path.clone());
        } else {
            fs.push(path.clone());
        }
    }

    Ok(json!({
        "name": engine.workflow_name(),
        "version": codec_version.to_string(),
        "IO_Graph": io_graph,
        "permanent": permanent,
        "exclude": exclude,
        "storage": {
            "memory": memory,
            "fs": fs,
        },
    }))
}

fn app_entry(
    app_name: &str,
    inputs: &[String],
    outputs: &[String],
    store: &capiocl_store::EntryStore,
) -> Value {
    let streaming: Vec<Value> = outputs
        .iter()
        .map(|path| streaming_record(path, store))
        .collect();

    json!({
        "name": app_name,
        "input_stream": inputs,
        "output_stream": outputs,
        "streaming": streaming,
    })
}

fn streaming_record(path: &str, store: &capiocl_store::EntryStore) -> Value {
    let is_file = store.is_file_snapshot(path);
    let commit_rule = store.get_commit_rule_snapshot(path);
    let fire_rule = store.get_fire_rule_snapshot(path);
    let close_count = store.get_commit_on_close_count_snapshot(path);
    let directory_count = store.get_directory_file_count_snapshot(path);
    let directory_count_is_auto = store.is_directory_auto_update_snapshot(path);
    let file_deps = store.get_file_dependencies_snapshot(path);

    let committed = if commit_rule == CommitRule::OnClose && close_count > 0 {
        format!("{}:{close_count}", commit_rule_to_json(commit_rule))
    } else {
        commit_rule_to_json(commit_rule).to_string()
    };

    let mut obj = serde_json::Map::new();
    if is_file {
        obj.insert("name".to_string(), json!([path]));
    } else {
        obj.insert("dirname".to_string(), json!([path]));
        // An explicit `set_directory_file_count` call froze auto-update: the
        // count is user intent and round-trips via `n_files`, which also
        // re-freezes it on parse. A count the store accumulated on its own
        // (`auto_update_dir_count` still true) round-trips via `n_files_auto`
        // instead, which restores the count without freezing it — freezing
        // it would make `parse(serialize(E)) != E` for any directory built
        // purely through materialization (§8).
        if directory_count_is_auto {
            if directory_count != 0 {
                obj.insert("n_files_auto".to_string(), json!(directory_count));
            }
        } else {
            obj.insert("n_files".to_string(), json!(directory_count));
        }
    }
    obj.insert("committed".to_string(), json!(committed));
    obj.insert("mode".to_string(), json!(fire_rule_to_json(fire_rule)));
    if !file_deps.is_empty() {
        obj.insert("file_deps".to_string(), json!(file_deps));
    }

    Value::Object(obj)
}
