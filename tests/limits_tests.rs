use std::sync::Arc;

use script_state_codec::{
    DecodeLimits, EngineKind, ErrorCategory, EventRecord, ScriptState, StateCodec, TypeRegistry,
    TypedValue,
};

mod common;
use common::{ASSET, ITEM};

fn codec_with(limits: DecodeLimits) -> StateCodec {
    StateCodec::new(Arc::new(TypeRegistry::empty())).with_limits(limits)
}

#[test]
fn limits_load_from_toml_with_defaults() {
    let limits = DecodeLimits::from_toml_str(
        r#"
        max_queue_len = 4
        reject_unknown_tags = true
        "#,
    )
    .expect("limits parse");
    assert_eq!(limits.max_queue_len, 4);
    assert!(limits.reject_unknown_tags);
    assert_eq!(limits.max_list_depth, DecodeLimits::default().max_list_depth);
}

#[test]
fn malformed_limits_file_is_rejected() {
    let err = DecodeLimits::from_toml_str("max_queue_len = \"many\"").expect_err("bad type");
    assert_eq!(err.category(), ErrorCategory::Structural);
}

#[test]
fn queue_and_variable_limits_apply_to_both_engines() {
    let mut state = ScriptState::new(ITEM, ASSET);
    for i in 0..5 {
        state.set_variable(format!("v{i}"), i);
        state.event_queue.push(EventRecord::new("timer", vec![]));
    }
    let writer = codec_with(DecodeLimits::default());

    let tight_queue = codec_with(DecodeLimits {
        max_queue_len: 4,
        ..DecodeLimits::default()
    });
    let tight_vars = codec_with(DecodeLimits {
        max_variables: 4,
        ..DecodeLimits::default()
    });
    for engine in [EngineKind::Xml, EngineKind::Tlv] {
        let document = writer.to_document(&state, engine).expect("encode");
        for reader in [&tight_queue, &tight_vars] {
            let err = reader.from_document(&document).expect_err("over limit");
            assert_eq!(err.category(), ErrorCategory::ResourceLimit, "{engine}");
        }
        writer.from_document(&document).expect("defaults accept it");
    }
}

#[test]
fn oversized_text_is_rejected() {
    let mut state = ScriptState::new(ITEM, ASSET);
    state.set_variable("blob", "x".repeat(64));
    let document = codec_with(DecodeLimits::default())
        .to_document(&state, EngineKind::Xml)
        .expect("encode");
    let err = codec_with(DecodeLimits {
        max_text_bytes: 16,
        ..DecodeLimits::default()
    })
    .from_document(&document)
    .expect_err("text too long");
    assert_eq!(err.category(), ErrorCategory::ResourceLimit);
}

#[test]
fn deep_lists_are_rejected() {
    let mut value = TypedValue::Integer32(1);
    for _ in 0..8 {
        value = TypedValue::List(vec![value]);
    }
    let mut state = ScriptState::new(ITEM, ASSET);
    state.set_variable("deep", value);
    let strict = codec_with(DecodeLimits {
        max_list_depth: 4,
        ..DecodeLimits::default()
    });
    for engine in [EngineKind::Xml, EngineKind::Tlv] {
        let document = strict.to_document(&state, engine).expect("encode");
        let err = strict.from_document(&document).expect_err("too deep");
        assert_eq!(err.category(), ErrorCategory::ResourceLimit, "{engine}");
    }
}
