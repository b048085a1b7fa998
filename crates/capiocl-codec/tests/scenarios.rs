// SPDX-License-Identifier: Apache-2.0
#![allow(clippy::unwrap_used)]

use capiocl_codec::{parse, serialize, ParseError};
use capiocl_engine::Engine;
use capiocl_monitor::MonitorAggregator;
use capiocl_store::{CommitRule, FireRule};

fn sample_document() -> &'static str {
    r#"{
        "name": "demo-workflow",
        "version": "1.0",
        "IO_Graph": [
            {
                "name": "producer-app",
                "input_stream": [],
                "output_stream": ["/data/out.bin"],
                "streaming": [
                    { "name": ["/data/out.bin"], "committed": "on_close:3", "mode": "update" }
                ]
            },
            {
                "name": "consumer-app",
                "input_stream": ["/data/out.bin"],
                "output_stream": []
            }
        ],
        "permanent": ["/data/out.bin"],
        "exclude": [],
        "storage": { "memory": [], "fs": ["/data/out.bin"] }
    }"#
}

#[test]
fn parse_populates_producers_and_consumers() {
    let mut engine = parse(sample_document(), MonitorAggregator::new(), None, false).unwrap();
    assert!(engine.store_mut().is_producer("/data/out.bin", "producer-app"));
    assert!(engine.store_mut().is_consumer("/data/out.bin", "consumer-app"));
    assert_eq!(
        engine.store_mut().get_commit_rule("/data/out.bin"),
        CommitRule::OnClose
    );
    assert_eq!(engine.store_mut().get_commit_on_close_count("/data/out.bin"), 3);
    assert!(engine.store_mut().is_permanent("/data/out.bin"));
}

#[test]
fn unknown_version_is_rejected() {
    let doc = r#"{"name": "x", "version": "9.9", "IO_Graph": []}"#;
    let err = parse(doc, MonitorAggregator::new(), None, false).unwrap_err();
    assert!(matches!(err, ParseError::UnsupportedVersion(_)));
}

#[test]
fn schema_violation_is_reported() {
    let doc = r#"{"version": "1.0", "IO_Graph": []}"#;
    let err = parse(doc, MonitorAggregator::new(), None, false).unwrap_err();
    assert!(matches!(err, ParseError::SchemaViolation(_)));
}

#[test]
fn round_trip_preserves_engine_equality() {
    let mut built = Engine::with_workflow_name(MonitorAggregator::new(), "round-trip").unwrap();
    built.add(
        "/a/out.txt",
        vec!["producer".to_string()],
        vec!["consumer".to_string()],
        CommitRule::OnClose,
        FireRule::Update,
        false,
        false,
        Vec::new(),
    );
    built.add(
        "/a/dir",
        vec!["producer".to_string()],
        Vec::new(),
        CommitRule::OnNFiles,
        FireRule::NoUpdate,
        false,
        false,
        Vec::new(),
    );
    built.store_mut().set_directory_file_count("/a/dir", 10);
    built.store_mut().set_directory("/a/dir");
    built.add(
        "/a/excluded.txt",
        vec!["producer".to_string(), "other".to_string(), "third".to_string()],
        Vec::new(),
        CommitRule::OnTermination,
        FireRule::Update,
        false,
        true,
        Vec::new(),
    );

    let serialized = serialize(&built, "1.0").unwrap();
    let text = serde_json::to_string(&serialized).unwrap();
    let parsed = parse(&text, MonitorAggregator::new(), None, false).unwrap();

    assert_eq!(built, parsed);
}

/// §8's scenario-6 directory: built entirely through public setters
/// (`add` + `set_directory` + materializing children), never through
/// `set_directory_file_count`. `directory_children_count` here comes from
/// `EntryStore::bump_parent_directory_count`, not an explicit call, so it
/// must round-trip without freezing `auto_update_dir_count`.
#[test]
fn round_trip_preserves_auto_accumulated_directory_count() {
    let mut built = Engine::with_workflow_name(MonitorAggregator::new(), "auto-count").unwrap();
    built.add(
        "/d",
        vec!["producer".to_string()],
        Vec::new(),
        CommitRule::OnTermination,
        FireRule::Update,
        false,
        false,
        Vec::new(),
    );
    built.store_mut().set_directory("/d");
    built.store_mut().add_producer("/d/a", "producer");
    built.store_mut().add_producer("/d/b", "producer");
    assert_eq!(built.store_mut().get_directory_file_count("/d"), 2);

    let serialized = serialize(&built, "1.0").unwrap();
    let text = serde_json::to_string(&serialized).unwrap();
    let parsed = parse(&text, MonitorAggregator::new(), None, false).unwrap();

    assert_eq!(built, parsed);
    let mut parsed = parsed;
    assert_eq!(parsed.store_mut().get_directory_file_count("/d"), 2);
}
