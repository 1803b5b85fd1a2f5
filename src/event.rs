//! Generic queued-event records and the detected-entity snapshots they carry.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::value::{EntityKey, Quaternion, TypedValue, Vector3};

bitflags! {
    /// Kind of entity reported in a detected record.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ObjectType: i32 {
        const AGENT = 0x1;
        const ACTIVE = 0x2;
        const PASSIVE = 0x4;
        const SCRIPTED = 0x8;
    }
}

/// Event waiting in a script's queue, in wire-neutral form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub name: String,
    pub params: Vec<TypedValue>,
    pub detected: Vec<DetectedInfo>,
}

impl EventRecord {
    pub fn new(name: impl Into<String>, params: Vec<TypedValue>) -> Self {
        Self {
            name: name.into(),
            params,
            detected: Vec::new(),
        }
    }

    pub fn with_detected(mut self, detected: Vec<DetectedInfo>) -> Self {
        self.detected = detected;
        self
    }
}

/// Entity involved in a touch, collision or sensor event, captured at event time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectedInfo {
    pub key: EntityKey,
    pub owner: EntityKey,
    pub group: EntityKey,
    pub name: String,
    pub obj_type: ObjectType,
    pub position: Vector3,
    pub velocity: Vector3,
    pub rotation: Quaternion,
    pub grab_offset: Vector3,
    pub link_number: i32,
    pub touch_face: i32,
    pub touch_st: Vector3,
    pub touch_uv: Vector3,
    pub touch_binormal: Vector3,
    pub touch_position: Vector3,
}

impl DetectedInfo {
    pub fn new(key: EntityKey) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }
}
