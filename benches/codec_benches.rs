use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use script_state_codec::{
    DetectedInfo, EngineKind, EventRecord, ScriptState, StateCodec, TypeRegistry, TypedValue,
    Vector3,
};
use uuid::Uuid;

fn busy_state(variables: usize, events: usize) -> ScriptState {
    let mut state = ScriptState::new(Uuid::from_u128(1), Uuid::from_u128(2));
    for idx in 0..variables {
        let value = match idx % 4 {
            0 => TypedValue::Integer32(idx as i32),
            1 => TypedValue::Text(format!("value {idx}")),
            2 => TypedValue::Vector3(Vector3::new(idx as f64, 1.5, -2.0)),
            _ => TypedValue::List(vec![TypedValue::Real64(0.25), TypedValue::Integer32(7)]),
        };
        state.set_variable(format!("var_{idx}"), value);
    }
    for idx in 0..events {
        let mut detected = DetectedInfo::new(Uuid::from_u128(idx as u128 + 100));
        detected.name = format!("Visitor {idx}");
        detected.position = Vector3::new(1.0, 2.0, 3.0);
        state.event_queue.push(
            EventRecord::new("touch_start", vec![TypedValue::Integer32(1)])
                .with_detected(vec![detected]),
        );
    }
    state.min_event_delay = 0.1;
    state
}

fn bench_encode(c: &mut Criterion) {
    let codec = StateCodec::new(Arc::new(TypeRegistry::empty()));
    let state = busy_state(200, 32);
    c.bench_function("encode_xml", |b| {
        b.iter(|| codec.to_document(&state, EngineKind::Xml).expect("encode"))
    });
    c.bench_function("encode_tlv", |b| {
        b.iter(|| codec.to_document(&state, EngineKind::Tlv).expect("encode"))
    });
}

fn bench_decode(c: &mut Criterion) {
    let codec = StateCodec::new(Arc::new(TypeRegistry::empty()));
    let state = busy_state(200, 32);
    let xml = codec.to_document(&state, EngineKind::Xml).expect("xml");
    let tlv = codec.to_document(&state, EngineKind::Tlv).expect("tlv");
    c.bench_function("decode_xml", |b| {
        b.iter(|| codec.from_document(&xml).expect("decode"))
    });
    c.bench_function("decode_tlv", |b| {
        b.iter(|| codec.from_document(&tlv).expect("decode"))
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
