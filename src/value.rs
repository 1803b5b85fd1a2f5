//! Closed value model shared by variables, event parameters and plugin slots.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{encode_error, type_mismatch, CodecResult};
use crate::registry::OpaqueType;

/// Identity of an avatar, object or asset.
pub type EntityKey = Uuid;

const LEGACY_PREFIX: &str = "OpenSim.Region.ScriptEngine.Shared.LSL_Types+";

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub s: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Fixed six-decimal form used by the legacy document, e.g. `<1.000000, 2.000000, 3.000000>`.
    pub fn to_legacy_string(&self) -> String {
        format!("<{:.6}, {:.6}, {:.6}>", self.x, self.y, self.z)
    }

    pub fn parse_legacy(text: &str) -> Option<Self> {
        match parse_components::<3>(text)? {
            [x, y, z] => Some(Self { x, y, z }),
        }
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        s: 1.0,
    };

    pub const fn new(x: f64, y: f64, z: f64, s: f64) -> Self {
        Self { x, y, z, s }
    }

    pub fn to_legacy_string(&self) -> String {
        format!(
            "<{:.6}, {:.6}, {:.6}, {:.6}>",
            self.x, self.y, self.z, self.s
        )
    }

    pub fn parse_legacy(text: &str) -> Option<Self> {
        match parse_components::<4>(text)? {
            [x, y, z, s] => Some(Self { x, y, z, s }),
        }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

fn parse_components<const N: usize>(text: &str) -> Option<[f64; N]> {
    let inner = text.trim().strip_prefix('<')?.strip_suffix('>')?;
    let mut out = [0.0; N];
    let mut parts = inner.split(',');
    for slot in out.iter_mut() {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

/// Discriminant of a [`TypedValue`], with its stable binary code and legacy name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Integer32,
    Integer64,
    Real64,
    Text,
    EntityKey,
    Vector3,
    Quaternion,
    List,
    OpaqueBlob,
}

impl ValueKind {
    pub const ALL: [ValueKind; 9] = [
        ValueKind::Integer32,
        ValueKind::Integer64,
        ValueKind::Real64,
        ValueKind::Text,
        ValueKind::EntityKey,
        ValueKind::Vector3,
        ValueKind::Quaternion,
        ValueKind::List,
        ValueKind::OpaqueBlob,
    ];

    pub fn code(self) -> u8 {
        match self {
            ValueKind::Integer32 => 1,
            ValueKind::Integer64 => 2,
            ValueKind::Real64 => 3,
            ValueKind::Text => 4,
            ValueKind::EntityKey => 5,
            ValueKind::Vector3 => 6,
            ValueKind::Quaternion => 7,
            ValueKind::List => 8,
            ValueKind::OpaqueBlob => 9,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Type name written into the legacy document's `type` attribute.
    ///
    /// Opaque blobs carry their own registered name instead.
    pub fn legacy_name(self) -> Option<&'static str> {
        let name = match self {
            ValueKind::Integer32 => "OpenSim.Region.ScriptEngine.Shared.LSL_Types+LSLInteger",
            ValueKind::Integer64 => "System.Int64",
            ValueKind::Real64 => "OpenSim.Region.ScriptEngine.Shared.LSL_Types+LSLFloat",
            ValueKind::Text => "OpenSim.Region.ScriptEngine.Shared.LSL_Types+LSLString",
            ValueKind::EntityKey => "OpenSim.Region.ScriptEngine.Shared.LSL_Types+key",
            ValueKind::Vector3 => "OpenSim.Region.ScriptEngine.Shared.LSL_Types+Vector3",
            ValueKind::Quaternion => "OpenSim.Region.ScriptEngine.Shared.LSL_Types+Quaternion",
            ValueKind::List => "OpenSim.Region.ScriptEngine.Shared.LSL_Types+list",
            ValueKind::OpaqueBlob => return None,
        };
        Some(name)
    }

    /// Resolves a legacy `type` attribute. Unknown names are opaque blob names.
    pub fn from_legacy_name(name: &str) -> Option<Self> {
        match name {
            "System.Int32" => return Some(ValueKind::Integer32),
            "System.Double" => return Some(ValueKind::Real64),
            "System.String" => return Some(ValueKind::Text),
            _ => {}
        }
        if !name.starts_with(LEGACY_PREFIX) && name != "System.Int64" {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|kind| kind.legacy_name() == Some(name))
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ValueKind::Integer32 => "integer32",
            ValueKind::Integer64 => "integer64",
            ValueKind::Real64 => "real64",
            ValueKind::Text => "text",
            ValueKind::EntityKey => "entity_key",
            ValueKind::Vector3 => "vector3",
            ValueKind::Quaternion => "quaternion",
            ValueKind::List => "list",
            ValueKind::OpaqueBlob => "opaque_blob",
        };
        f.write_str(label)
    }
}

/// Every value a script variable, event parameter or plugin slot can hold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TypedValue {
    Integer32(i32),
    Integer64(i64),
    Real64(f64),
    Text(String),
    EntityKey(EntityKey),
    Vector3(Vector3),
    Quaternion(Quaternion),
    List(Vec<TypedValue>),
    OpaqueBlob { type_name: String, bytes: Vec<u8> },
}

impl TypedValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::Integer32(_) => ValueKind::Integer32,
            TypedValue::Integer64(_) => ValueKind::Integer64,
            TypedValue::Real64(_) => ValueKind::Real64,
            TypedValue::Text(_) => ValueKind::Text,
            TypedValue::EntityKey(_) => ValueKind::EntityKey,
            TypedValue::Vector3(_) => ValueKind::Vector3,
            TypedValue::Quaternion(_) => ValueKind::Quaternion,
            TypedValue::List(_) => ValueKind::List,
            TypedValue::OpaqueBlob { .. } => ValueKind::OpaqueBlob,
        }
    }

    /// Wraps a caller-defined serializable value as an opaque blob.
    pub fn opaque<T: OpaqueType>(value: &T) -> CodecResult<Self> {
        let bytes = postcard::to_allocvec(value)
            .map_err(|err| encode_error(format!("opaque {}: {err}", T::TYPE_NAME)))?;
        Ok(TypedValue::OpaqueBlob {
            type_name: T::TYPE_NAME.to_string(),
            bytes,
        })
    }

    /// Decodes an opaque blob back into the caller-defined type it was built from.
    pub fn decode_opaque<T: OpaqueType>(&self) -> CodecResult<T> {
        match self {
            TypedValue::OpaqueBlob { type_name, bytes } if type_name == T::TYPE_NAME => {
                postcard::from_bytes(bytes)
                    .map_err(|err| type_mismatch(type_name.as_str(), T::TYPE_NAME, err))
            }
            TypedValue::OpaqueBlob { type_name, .. } => {
                Err(type_mismatch("opaque blob", T::TYPE_NAME, type_name))
            }
            other => Err(type_mismatch("opaque blob", T::TYPE_NAME, other.kind())),
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            TypedValue::Integer32(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TypedValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<EntityKey> {
        match self {
            TypedValue::EntityKey(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<i32> for TypedValue {
    fn from(value: i32) -> Self {
        TypedValue::Integer32(value)
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        TypedValue::Integer64(value)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        TypedValue::Real64(value)
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        TypedValue::Text(value)
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        TypedValue::Text(value.to_string())
    }
}

impl From<Uuid> for TypedValue {
    fn from(value: Uuid) -> Self {
        TypedValue::EntityKey(value)
    }
}

impl From<Vector3> for TypedValue {
    fn from(value: Vector3) -> Self {
        TypedValue::Vector3(value)
    }
}

impl From<Quaternion> for TypedValue {
    fn from(value: Quaternion) -> Self {
        TypedValue::Quaternion(value)
    }
}

impl From<Vec<TypedValue>> for TypedValue {
    fn from(value: Vec<TypedValue>) -> Self {
        TypedValue::List(value)
    }
}

#[cfg(test)]
#[path = "tests/value_tests.rs"]
mod tests;
