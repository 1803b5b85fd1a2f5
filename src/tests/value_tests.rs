use super::*;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCategory;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Waypoint {
    label: String,
    hops: u16,
}

impl OpaqueType for Waypoint {
    const TYPE_NAME: &'static str = "Test.Waypoint";
}

#[test]
fn vector_legacy_text_uses_six_decimals() {
    let vector = Vector3::new(1.0, -2.5, 0.125);
    assert_eq!(vector.to_legacy_string(), "<1.000000, -2.500000, 0.125000>");
    assert_eq!(
        Quaternion::IDENTITY.to_legacy_string(),
        "<0.000000, 0.000000, 0.000000, 1.000000>"
    );
}

#[test]
fn legacy_vector_parse_accepts_loose_spacing() {
    let parsed = Vector3::parse_legacy(" <1,2.5 ,  -3> ").expect("vector should parse");
    assert_eq!(parsed, Vector3::new(1.0, 2.5, -3.0));

    let rotation = Quaternion::parse_legacy("<0, 0, 0.5, 0.5>").expect("rotation should parse");
    assert_eq!(rotation, Quaternion::new(0.0, 0.0, 0.5, 0.5));
}

#[test]
fn legacy_vector_parse_rejects_wrong_arity_and_garbage() {
    assert_eq!(Vector3::parse_legacy("<1, 2>"), None);
    assert_eq!(Vector3::parse_legacy("<1, 2, 3, 4>"), None);
    assert_eq!(Vector3::parse_legacy("1, 2, 3"), None);
    assert_eq!(Vector3::parse_legacy("<1, x, 3>"), None);
    assert_eq!(Quaternion::parse_legacy("<1, 2, 3>"), None);
}

#[test]
fn kind_codes_are_unique_and_reversible() {
    let mut seen = std::collections::HashSet::new();
    for kind in ValueKind::ALL {
        assert!(seen.insert(kind.code()), "duplicate code for {kind}");
        assert_eq!(ValueKind::from_code(kind.code()), Some(kind));
    }
    assert_eq!(ValueKind::from_code(0), None);
    assert_eq!(ValueKind::from_code(10), None);
}

#[test]
fn legacy_type_names_resolve_both_ways() {
    for kind in ValueKind::ALL {
        match kind.legacy_name() {
            Some(name) => assert_eq!(ValueKind::from_legacy_name(name), Some(kind)),
            None => assert_eq!(kind, ValueKind::OpaqueBlob),
        }
    }
    assert_eq!(
        ValueKind::from_legacy_name("System.Int32"),
        Some(ValueKind::Integer32)
    );
    assert_eq!(
        ValueKind::from_legacy_name("System.Double"),
        Some(ValueKind::Real64)
    );
    assert_eq!(
        ValueKind::from_legacy_name("System.String"),
        Some(ValueKind::Text)
    );
    assert_eq!(ValueKind::from_legacy_name("Test.Waypoint"), None);
    assert_eq!(
        ValueKind::from_legacy_name("OpenSim.Region.ScriptEngine.Shared.LSL_Types+Nope"),
        None
    );
}

#[test]
fn opaque_values_round_trip_through_postcard() {
    let waypoint = Waypoint {
        label: "gate".to_string(),
        hops: 3,
    };
    let value = TypedValue::opaque(&waypoint).expect("opaque encode");
    assert_eq!(value.kind(), ValueKind::OpaqueBlob);
    match &value {
        TypedValue::OpaqueBlob { type_name, .. } => assert_eq!(type_name, "Test.Waypoint"),
        other => panic!("unexpected value {other:?}"),
    }
    let back: Waypoint = value.decode_opaque().expect("opaque decode");
    assert_eq!(back, waypoint);
}

#[test]
fn decode_opaque_rejects_other_values() {
    let err = TypedValue::Integer32(4)
        .decode_opaque::<Waypoint>()
        .expect_err("integer is not a waypoint");
    assert_eq!(err.category(), ErrorCategory::TypeMismatch);

    let foreign = TypedValue::OpaqueBlob {
        type_name: "Other.Type".to_string(),
        bytes: vec![1, 2, 3],
    };
    let err = foreign
        .decode_opaque::<Waypoint>()
        .expect_err("type name differs");
    assert_eq!(err.category(), ErrorCategory::TypeMismatch);
}

#[test]
fn accessors_only_match_their_kind() {
    let key = Uuid::from_u128(0x42);
    assert_eq!(TypedValue::from(7).as_i32(), Some(7));
    assert_eq!(TypedValue::from("hi").as_text(), Some("hi"));
    assert_eq!(TypedValue::from(key).as_key(), Some(key));
    assert_eq!(TypedValue::from(7i64).as_i32(), None);
    assert_eq!(TypedValue::from(1.5).as_text(), None);
}

#[test]
fn json_form_is_tagged_by_kind() {
    let value = TypedValue::List(vec![TypedValue::Integer32(1), TypedValue::Text("a".into())]);
    let json = serde_json::to_value(&value).expect("json");
    assert_eq!(json["kind"], "list");
    assert_eq!(json["value"][0]["kind"], "integer32");
    assert_eq!(json["value"][1]["value"], "a");

    let back: TypedValue = serde_json::from_value(json).expect("json back");
    assert_eq!(back, value);
}
