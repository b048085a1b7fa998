// SPDX-License-Identifier: Apache-2.0
//! Turns a JSON workflow configuration into a populated [`Engine`].

use std::path::Path;
use std::sync::OnceLock;

use capiocl_engine::Engine;
use capiocl_monitor::MonitorAggregator;
use serde_json::Value;

use crate::version::CodecVersion;
use crate::wire::{commit_rule_from_json, fire_rule_from_json};
use crate::ParseError;

const SCHEMA_V1: &str = include_str!("../schema/v1.schema.json");

#[allow(clippy::expect_used)] // the bundled schema is a compile-time asset, not user input
fn schema_validator() -> &'static jsonschema::JSONSchema {
    static VALIDATOR: OnceLock<jsonschema::JSONSchema> = OnceLock::new();
    VALIDATOR.get_or_init(|| {
        let schema: Value =
            serde_json::from_str(SCHEMA_V1).expect("bundled schema is valid JSON");
        jsonschema::JSONSchema::compile(&schema).expect("bundled schema compiles")
    })
}

/// Parses `document` into a freshly constructed engine, using `monitor` as
/// its commit backend and resolving relative paths against `resolve_prefix`
/// when one is given.
///
/// When `store_all_in_memory` is set, every path ends up with
/// `store_in_memory = true`, matching the `-store-all-in-memory` engine-wide
/// override.
///
/// # Errors
///
/// Returns [`ParseError`] on invalid JSON, a schema violation, an
/// unsupported `version`, or a malformed streaming record.
pub fn parse(
    document: &str,
    monitor: MonitorAggregator,
    resolve_prefix: Option<&Path>,
    store_all_in_memory: bool,
) -> Result<Engine, ParseError> {
    let doc: Value = serde_json::from_str(document)?;

    let version_field = doc.get("version").and_then(Value::as_str);
    CodecVersion::parse_version_field(version_field)?;

    if let Err(mut errors) = schema_validator().validate(&doc) {
        let message = errors
            .next()
            .map_or_else(|| "schema validation failed".to_string(), |e| e.to_string());
        return Err(ParseError::SchemaViolation(message));
    }

    let workflow_name = doc
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ParseError::Malformed("missing workflow name".to_string()))?;

    let mut engine = Engine::with_workflow_name(monitor, workflow_name)?;

    let graph = doc
        .get("IO_Graph")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::Malformed("missing IO_Graph section".to_string()))?;

    for app in graph {
        parse_app(app, resolve_prefix, &mut engine)?;
    }

    for path in string_array(&doc, "permanent") {
        let resolved = resolve(&path, resolve_prefix);
        engine.store_mut().get_or_create(&resolved);
        engine.store_mut().set_permanent(&resolved, true);
    }

    for path in string_array(&doc, "exclude") {
        let resolved = resolve(&path, resolve_prefix);
        engine.store_mut().get_or_create(&resolved);
        engine.store_mut().set_excluded(&resolved, true);
    }

    if let Some(storage) = doc.get("storage") {
        for path in string_array(storage, "memory") {
            engine.store_mut().set_store_in_memory(&path);
        }
        for path in string_array(storage, "fs") {
            engine.store_mut().set_store_on_fs(&path);
        }
    }

    if store_all_in_memory {
        tracing::info!("storing all files in memory");
        engine.set_all_store_in_memory();
    }

    Ok(engine)
}

fn parse_app(app: &Value, resolve_prefix: Option<&Path>, engine: &mut Engine) -> Result<(), ParseError> {
    let app_name = app
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ParseError::Malformed("missing name for streaming item".to_string()))?;

    for path in string_array(app, "input_stream") {
        let resolved = resolve(&path, resolve_prefix);
        engine.store_mut().get_or_create(&resolved);
        engine.store_mut().add_consumer(&resolved, app_name);
    }

    for path in string_array(app, "output_stream") {
        let resolved = resolve(&path, resolve_prefix);
        engine.store_mut().get_or_create(&resolved);
        engine.store_mut().add_producer(&resolved, app_name);
    }

    if let Some(streaming) = app.get("streaming").and_then(Value::as_array) {
        for record in streaming {
            parse_streaming_record(record, resolve_prefix, engine, app_name)?;
        }
    }

    Ok(())
}

fn parse_streaming_record(
    record: &Value,
    resolve_prefix: Option<&Path>,
    engine: &mut Engine,
    app_name: &str,
) -> Result<(), ParseError> {
    let (is_file, names) = if let Some(names) = record.get("name").and_then(Value::as_array) {
        (true, names)
    } else if let Some(names) = record.get("dirname").and_then(Value::as_array) {
        (false, names)
    } else {
        return Err(ParseError::Malformed(format!(
            "streaming item for app {app_name} has neither name nor dirname"
        )));
    };

    let mut commit_rule = capiocl_store::CommitRule::default();
    let mut fire_rule = capiocl_store::FireRule::default();
    let mut close_count: u64 = 0;
    let mut n_files: u64 = 0;

    if let Some(committed) = record.get("committed").and_then(Value::as_str) {
        if let Some((rule_str, count_str)) = committed.split_once(':') {
            let count: u64 = count_str
                .parse()
                .map_err(|_| ParseError::Malformed("commit rule argument is not an integer".to_string()))?;
            commit_rule = commit_rule_from_json(rule_str)?;
            match commit_rule {
                capiocl_store::CommitRule::OnClose => close_count = count,
                capiocl_store::CommitRule::OnNFiles => n_files = count,
                _ => {
                    return Err(ParseError::Malformed(
                        "commit rule argument is only valid for on_close or on_n_files"
                            .to_string(),
                    ))
                }
            }
        } else {
            commit_rule = commit_rule_from_json(committed)?;
        }
    }

    let mut file_deps = Vec::new();
    if commit_rule == capiocl_store::CommitRule::OnFile {
        let deps = record
            .get("file_deps")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ParseError::Malformed(
                    "commit rule is on_file but no file_deps section found".to_string(),
                )
            })?;
        for dep in deps {
            let dep_str = dep.as_str().ok_or_else(|| {
                ParseError::Malformed("file_deps entry is not a string".to_string())
            })?;
            file_deps.push(resolve(dep_str, resolve_prefix));
        }
    }

    if let Some(mode) = record.get("mode").and_then(Value::as_str) {
        fire_rule = fire_rule_from_json(mode)?;
    }

    if let Some(explicit_n_files) = record.get("n_files").and_then(Value::as_i64) {
        n_files = explicit_n_files.max(0).unsigned_abs();
    }
    let n_files_auto = record
        .get("n_files_auto")
        .and_then(Value::as_i64)
        .map(|v| v.max(0).unsigned_abs());

    for name in names {
        let path_str = name
            .as_str()
            .ok_or_else(|| ParseError::Malformed("streaming path is not a string".to_string()))?;
        let path = resolve(path_str, resolve_prefix);

        // `n_files_auto` restores a materialization-derived count without
        // freezing auto-update; an explicit `n_files`/`committed:N` always
        // wins and freezes it, matching `EntryStore::set_directory_file_count`.
        if let Some(observed) = n_files_auto {
            engine.store_mut().set_directory_file_count_observed(&path, observed);
        }
        if n_files != 0 {
            engine.store_mut().set_directory_file_count(&path, n_files);
        }
        if is_file {
            engine.store_mut().set_file(&path);
        } else {
            engine.store_mut().set_directory(&path);
        }

        tracing::debug!(
            app = app_name,
            path,
            commit_rule = %commit_rule,
            mode = %fire_rule,
            n_files,
            close_count,
            "applying streaming record"
        );

        engine.store_mut().set_commit_rule(&path, commit_rule);
        engine.store_mut().set_fire_rule(&path, fire_rule);
        engine.store_mut().set_commit_on_close_count(&path, close_count);
        engine.store_mut().set_file_dependencies(&path, file_deps.clone());
        for dep in &file_deps {
            engine.store_mut().get_or_create(dep);
        }
    }

    Ok(())
}

fn string_array(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Resolves a possibly-relative path against `resolve_prefix`, warning and
/// keeping the path as-is when no prefix is available.
fn resolve(path: &str, resolve_prefix: Option<&Path>) -> String {
    if Path::new(path).is_absolute() {
        return path.to_string();
    }
    match resolve_prefix {
        Some(prefix) => prefix.join(path).to_string_lossy().into_owned(),
        None => {
            tracing::warn!(path, "relative path with no resolve prefix, keeping as-is");
            path.to_string()
        }
    }
}
