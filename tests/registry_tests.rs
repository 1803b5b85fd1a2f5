//! Opaque blobs are only accepted for registered type names.

use std::sync::Arc;

use script_state_codec::{
    EngineKind, ErrorCategory, ScriptState, StateCodec, TypeRegistry, TypedValue,
};

mod common;
use common::{codec, SensorMemo, ASSET, ITEM};

fn state_with_memo() -> ScriptState {
    let mut state = ScriptState::new(ITEM, ASSET);
    state.plugin_data.push(
        TypedValue::opaque(&SensorMemo {
            range: 5.0,
            tags: Vec::new(),
        })
        .expect("opaque"),
    );
    state
}

#[test]
fn unregistered_type_is_rejected_by_both_engines() {
    let writer = codec();
    let reader = StateCodec::new(Arc::new(TypeRegistry::empty()));
    for engine in [EngineKind::Xml, EngineKind::Tlv] {
        let document = writer.to_document(&state_with_memo(), engine).expect("encode");
        let err = reader
            .from_document(&document)
            .expect_err("unregistered type must fail");
        assert_eq!(err.category(), ErrorCategory::UnknownType, "{engine}");
        assert!(err.to_string().contains("Plugins.SensorMemo"));
    }
}

#[test]
fn registered_type_with_corrupt_payload_is_type_mismatch() {
    let mut state = ScriptState::new(ITEM, ASSET);
    state.plugin_data.push(TypedValue::OpaqueBlob {
        type_name: "Plugins.SensorMemo".to_string(),
        bytes: vec![0xff],
    });
    let codec = codec();
    for engine in [EngineKind::Xml, EngineKind::Tlv] {
        let document = codec.to_document(&state, engine).expect("encode");
        let err = codec
            .from_document(&document)
            .expect_err("payload does not decode");
        assert_eq!(err.category(), ErrorCategory::TypeMismatch, "{engine}");
    }
}

#[test]
fn registry_reports_its_contents() {
    let registry = TypeRegistry::builder()
        .register::<SensorMemo>()
        .register_raw("Plugins.Raw", |_| Ok(()))
        .build();
    assert_eq!(registry.len(), 2);
    assert!(registry.contains("Plugins.Raw"));
    assert!(!registry.contains("Plugins.Other"));
    assert!(TypeRegistry::empty().is_empty());
    assert_eq!(
        format!("{registry:?}"),
        r#"TypeRegistry { types: ["Plugins.Raw", "Plugins.SensorMemo"] }"#
    );
}
