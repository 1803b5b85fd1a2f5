//! Checkpoints written by one engine come back field for field.

use std::fs::File;
use std::io::{BufReader, BufWriter};

use script_state_codec::{
    EngineKind, ErrorCategory, PermsGrant, Quaternion, ScriptState, TypedValue, Vector3,
};

mod common;
use common::{codec, touch_checkpoint, SensorMemo, ASSET, ITEM};

fn busy_checkpoint() -> ScriptState {
    let mut state = touch_checkpoint();
    state.current_state = "patrolling".to_string();
    state.is_running = false;
    state.set_variable("heading", Quaternion::new(0.0, 0.0, 0.707107, 0.707107));
    state.set_variable("home", Vector3::new(128.0, 64.5, 22.25));
    state.set_variable("visits", 1i64 << 33);
    state.set_variable(
        "memo",
        TypedValue::opaque(&SensorMemo {
            range: 20.0,
            tags: vec!["door".to_string()],
        })
        .expect("opaque memo"),
    );
    state.perms_granter = Some(PermsGrant {
        granter: common::TOUCHER,
        mask: 0x10,
    });
    state.plugin_data = vec![
        TypedValue::Integer32(4),
        TypedValue::List(vec![TypedValue::Text("timer".into()), TypedValue::Real64(0.5)]),
    ];
    state
}

#[test]
fn touch_checkpoint_round_trips_through_both_engines() {
    let codec = codec();
    for engine in [EngineKind::Xml, EngineKind::Tlv] {
        let mut buf = Vec::new();
        codec
            .serialize(&mut buf, &touch_checkpoint(), engine)
            .expect("serialize");
        let back = codec.deserialize(buf.as_slice()).expect("deserialize");
        assert_eq!(back, touch_checkpoint(), "{engine}");
        assert_eq!(back.item_id, ITEM);
        assert_eq!(back.asset_id, ASSET);
    }
}

#[test]
fn busy_checkpoint_round_trips_through_both_engines() {
    let codec = codec();
    let state = busy_checkpoint();
    for engine in [EngineKind::Xml, EngineKind::Tlv] {
        let document = codec.to_document(&state, engine).expect("encode");
        let back = codec.from_document(&document).expect("decode");
        assert_eq!(back, state, "{engine}");
    }
    let memo: SensorMemo = state.variables["memo"].decode_opaque().expect("memo");
    assert_eq!(memo.tags, vec!["door".to_string()]);
}

#[test]
fn converting_between_engines_preserves_state() {
    let codec = codec();
    let state = busy_checkpoint();
    let xml = codec.to_document(&state, EngineKind::Xml).expect("xml");
    let (engine, loaded) = codec.decode_tagged(&xml).expect("decode xml");
    let tlv = codec
        .to_document(&loaded, engine.other())
        .expect("re-encode as tlv");
    let (engine, converted) = codec.decode_tagged(&tlv).expect("decode tlv");
    assert_eq!(engine, EngineKind::Tlv);
    assert_eq!(converted, state);
}

#[test]
fn file_streams_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let codec = codec();
    for engine in [EngineKind::Xml, EngineKind::Tlv] {
        let path = dir.path().join(format!("{engine}.state"));
        {
            let file = File::create(&path).expect("create");
            codec
                .serialize(BufWriter::new(file), &busy_checkpoint(), engine)
                .expect("serialize to file");
        }
        let file = File::open(&path).expect("open");
        let back = codec
            .deserialize(BufReader::new(file))
            .expect("deserialize from file");
        assert_eq!(back, busy_checkpoint());
    }
}

#[test]
fn truncated_snapshot_documents_fail_structurally() {
    let codec = codec();
    let document = codec
        .to_document(&touch_checkpoint(), EngineKind::Tlv)
        .expect("encode");
    let start = document.find("<Snapshot>").expect("snapshot start") + "<Snapshot>".len();
    let end = document.find("</Snapshot>").expect("snapshot end");
    // cut on whole bytes of the hex payload
    for cut in (start..end).step_by(2) {
        let damaged = format!("{}{}", &document[..cut], &document[end..]);
        let err = codec
            .from_document(&damaged)
            .expect_err("truncated snapshot must fail");
        assert_eq!(err.category(), ErrorCategory::Structural);
    }
}

#[test]
fn json_dump_names_every_field() {
    let dump = touch_checkpoint().to_json_pretty().expect("json");
    let value: serde_json::Value = serde_json::from_str(&dump).expect("parse dump");
    assert_eq!(value["current_state"], "default");
    assert_eq!(value["start_parameter"], 7);
    assert_eq!(value["variables"]["count"]["value"], 3);
    assert_eq!(value["event_queue"][0]["name"], "touch_start");
    assert!(value["perms_granter"].is_null());
}
