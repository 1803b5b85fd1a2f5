//! Compact binary tag-length-value format.
//!
//! This format is strict: any structural damage, kind mismatch or
//! unregistered opaque type fails the whole load and no partially populated
//! state is ever returned. Unknown tags are skipped through their length
//! prefix unless [`DecodeLimits::reject_unknown_tags`] is set.
//!
//! [`DecodeLimits::reject_unknown_tags`]: crate::DecodeLimits::reject_unknown_tags

mod reader;
mod state;
mod writer;

pub use reader::{Header, TlvReader};
pub use state::{decode_body, encode_body};
pub use writer::{NestedWriter, TlvWriter};

use uuid::Uuid;

use crate::codec::DecodeContext;
use crate::error::{structural, CodecResult};
use crate::state::ScriptState;
use crate::version::{TLV_FORMAT_VERSION, TLV_SNAPSHOT_MAGIC};

const SNAPSHOT_HEADER_LEN: usize = 4 + 2 + 4 + 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RecordKind {
    End,
    Scalar,
    Nested,
}

impl RecordKind {
    pub(crate) fn code(self) -> u8 {
        match self {
            RecordKind::End => 0,
            RecordKind::Scalar => 1,
            RecordKind::Nested => 2,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(RecordKind::End),
            1 => Some(RecordKind::Scalar),
            2 => Some(RecordKind::Nested),
            _ => None,
        }
    }
}

/// Fixed tag table.
pub mod tags {
    pub const CURRENT_STATE: u16 = 1;
    pub const IS_RUNNING: u16 = 2;
    pub const START_PARAMETER: u16 = 3;
    pub const QUEUE: u16 = 4;
    pub const PERMS_GRANTER_MASK: u16 = 5;
    pub const PERMS_GRANTER_ID: u16 = 6;
    pub const PLUGIN_DATA: u16 = 7;
    pub const MIN_EVENT_DELAY: u16 = 8;
    pub const VARIABLES: u16 = 9;

    pub const EVENT_NAME: u16 = 20;
    pub const PARAMS: u16 = 21;
    pub const PARAM_VALUE: u16 = 22;
    pub const DETECTED: u16 = 23;
    pub const PLUGIN_VALUE: u16 = 24;
    pub const VARIABLE: u16 = 25;
    pub const VAR_NAME: u16 = 26;
    pub const VAR_VALUE: u16 = 27;

    pub const DETECTED_KEY: u16 = 40;
    pub const DETECTED_OWNER: u16 = 41;
    pub const DETECTED_GROUP: u16 = 42;
    pub const DETECTED_NAME: u16 = 43;
    pub const DETECTED_OBJ_TYPE: u16 = 44;
    pub const DETECTED_POSITION: u16 = 45;
    pub const DETECTED_VELOCITY: u16 = 46;
    pub const DETECTED_ROTATION: u16 = 47;
    pub const DETECTED_GRAB_OFFSET: u16 = 48;
    pub const DETECTED_LINK_NUMBER: u16 = 49;
    pub const DETECTED_TOUCH_FACE: u16 = 50;
    pub const DETECTED_TOUCH_ST: u16 = 51;
    pub const DETECTED_TOUCH_UV: u16 = 52;
    pub const DETECTED_TOUCH_BINORMAL: u16 = 53;
    pub const DETECTED_TOUCH_POSITION: u16 = 54;
}

/// Wraps the encoded records with magic bytes, version and checksum.
pub fn encode_snapshot(state: &ScriptState) -> CodecResult<Vec<u8>> {
    let payload = encode_body(state)?;
    let checksum = crc32fast::hash(&payload);
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| crate::error::encode_error("snapshot too large"))?;

    let mut output = Vec::with_capacity(SNAPSHOT_HEADER_LEN + payload.len());
    output.extend_from_slice(&TLV_SNAPSHOT_MAGIC);
    output.extend_from_slice(&TLV_FORMAT_VERSION.to_le_bytes());
    output.extend_from_slice(&checksum.to_le_bytes());
    output.extend_from_slice(&payload_len.to_le_bytes());
    output.extend_from_slice(&payload);
    Ok(output)
}

/// Validates magic, version, length and checksum before decoding the records.
pub fn decode_snapshot(
    input: &[u8],
    item_id: Uuid,
    asset_id: Uuid,
    ctx: &DecodeContext<'_>,
) -> CodecResult<ScriptState> {
    if input.len() < SNAPSHOT_HEADER_LEN {
        return Err(structural("snapshot too small"));
    }
    if input[0..4] != TLV_SNAPSHOT_MAGIC {
        return Err(structural("missing snapshot magic bytes"));
    }
    let version = u16::from_le_bytes([input[4], input[5]]);
    if version != TLV_FORMAT_VERSION {
        return Err(structural(format!(
            "unsupported snapshot version {version}, expected {TLV_FORMAT_VERSION}"
        )));
    }
    let checksum = u32::from_le_bytes([input[6], input[7], input[8], input[9]]);
    let payload_len = u32::from_le_bytes([input[10], input[11], input[12], input[13]]) as usize;
    let payload = &input[SNAPSHOT_HEADER_LEN..];
    if payload.len() != payload_len {
        return Err(structural("snapshot length mismatch"));
    }
    if crc32fast::hash(payload) != checksum {
        return Err(structural("snapshot checksum mismatch"));
    }
    decode_body(payload, item_id, asset_id, ctx)
}

#[cfg(test)]
#[path = "../tests/tlv_tests.rs"]
mod tests;
