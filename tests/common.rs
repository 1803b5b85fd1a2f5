#![allow(dead_code)]

use std::sync::Arc;

use script_state_codec::{
    DetectedInfo, EventRecord, OpaqueType, ScriptState, StateCodec, TypeRegistry, TypedValue,
    Vector3,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ITEM: Uuid = Uuid::from_u128(0x5eed_0001);
pub const ASSET: Uuid = Uuid::from_u128(0x5eed_0002);
pub const TOUCHER: Uuid = Uuid::from_u128(0x5eed_0003);

/// Caller-defined plugin payload used by the opaque blob tests.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorMemo {
    pub range: f32,
    pub tags: Vec<String>,
}

impl OpaqueType for SensorMemo {
    const TYPE_NAME: &'static str = "Plugins.SensorMemo";
}

pub fn codec() -> StateCodec {
    let registry = TypeRegistry::builder().register::<SensorMemo>().build();
    StateCodec::new(Arc::new(registry))
}

/// The touch checkpoint: `default`, running, start 7, `count = 3`, one
/// `touch_start` with a single detected toucher, no grant, delay 0.1.
pub fn touch_checkpoint() -> ScriptState {
    let mut state = ScriptState::new(ITEM, ASSET);
    state.start_parameter = 7;
    state.set_variable("count", 3);

    let mut toucher = DetectedInfo::new(TOUCHER);
    toucher.link_number = 1;
    toucher.position = Vector3::new(1.0, 2.0, 3.0);
    state.event_queue.push(
        EventRecord::new("touch_start", vec![TypedValue::Integer32(1)])
            .with_detected(vec![toucher]),
    );
    state.min_event_delay = 0.1;
    state
}
