//! TLV record writer.
//!
//! Nested blocks are opened with [`TlvWriter::begin_nested`], which hands out
//! a guard borrowing the writer. The guard writes the block's End marker and
//! back-patches its length when dropped, so a block is closed on every exit
//! path and no sibling record can be written while it is open.

use std::ops::{Deref, DerefMut};

use crate::error::{encode_error, CodecResult};
use crate::value::{TypedValue, ValueKind};

use super::RecordKind;

#[derive(Debug, Default)]
pub struct TlvWriter {
    buf: Vec<u8>,
    overflowed: bool,
}

impl TlvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_value(&mut self, tag: u16, value: &TypedValue) -> CodecResult<()> {
        let mut payload = Vec::new();
        encode_payload(value, &mut payload)?;
        self.write_scalar(tag, value.kind(), &payload)
    }

    pub fn write_i32(&mut self, tag: u16, value: i32) -> CodecResult<()> {
        self.write_scalar(tag, ValueKind::Integer32, &value.to_le_bytes())
    }

    pub fn write_f64(&mut self, tag: u16, value: f64) -> CodecResult<()> {
        self.write_scalar(tag, ValueKind::Real64, &value.to_le_bytes())
    }

    pub fn write_text(&mut self, tag: u16, value: &str) -> CodecResult<()> {
        self.write_scalar(tag, ValueKind::Text, value.as_bytes())
    }

    pub fn write_key(&mut self, tag: u16, value: &uuid::Uuid) -> CodecResult<()> {
        self.write_scalar(tag, ValueKind::EntityKey, value.as_bytes())
    }

    /// Opens a nested block; it is closed when the returned guard goes away.
    pub fn begin_nested(&mut self, tag: u16) -> NestedWriter<'_> {
        self.write_header(tag, RecordKind::Nested);
        let len_at = self.buf.len();
        self.buf.extend_from_slice(&0u32.to_le_bytes());
        NestedWriter {
            writer: self,
            len_at,
        }
    }

    /// Terminates the top-level block and returns the encoded records.
    pub fn finish(mut self) -> CodecResult<Vec<u8>> {
        self.write_end();
        if self.overflowed {
            return Err(encode_error("nested block larger than 4 GiB"));
        }
        Ok(self.buf)
    }

    fn write_scalar(&mut self, tag: u16, kind: ValueKind, payload: &[u8]) -> CodecResult<()> {
        let len = u32::try_from(payload.len())
            .map_err(|_| encode_error(format!("{kind} payload too large for tag {tag}")))?;
        self.write_header(tag, RecordKind::Scalar);
        self.buf.push(kind.code());
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(payload);
        Ok(())
    }

    fn write_header(&mut self, tag: u16, kind: RecordKind) {
        self.buf.extend_from_slice(&tag.to_le_bytes());
        self.buf.push(kind.code());
    }

    fn write_end(&mut self) {
        self.write_header(0, RecordKind::End);
    }

    fn close_nested(&mut self, len_at: usize) {
        self.write_end();
        let body_len = self.buf.len() - (len_at + 4);
        match u32::try_from(body_len) {
            Ok(len) => self.buf[len_at..len_at + 4].copy_from_slice(&len.to_le_bytes()),
            Err(_) => self.overflowed = true,
        }
    }
}

/// Open nested block. Derefs to the writer for writing the block's records.
pub struct NestedWriter<'a> {
    writer: &'a mut TlvWriter,
    len_at: usize,
}

impl NestedWriter<'_> {
    /// Closes the block explicitly; dropping the guard does the same.
    pub fn finish(self) {}
}

impl Deref for NestedWriter<'_> {
    type Target = TlvWriter;

    fn deref(&self) -> &TlvWriter {
        self.writer
    }
}

impl DerefMut for NestedWriter<'_> {
    fn deref_mut(&mut self) -> &mut TlvWriter {
        self.writer
    }
}

impl Drop for NestedWriter<'_> {
    fn drop(&mut self) {
        self.writer.close_nested(self.len_at);
    }
}

fn encode_payload(value: &TypedValue, out: &mut Vec<u8>) -> CodecResult<()> {
    match value {
        TypedValue::Integer32(v) => out.extend_from_slice(&v.to_le_bytes()),
        TypedValue::Integer64(v) => out.extend_from_slice(&v.to_le_bytes()),
        TypedValue::Real64(v) => out.extend_from_slice(&v.to_le_bytes()),
        TypedValue::Text(v) => out.extend_from_slice(v.as_bytes()),
        TypedValue::EntityKey(v) => out.extend_from_slice(v.as_bytes()),
        TypedValue::Vector3(v) => {
            for component in [v.x, v.y, v.z] {
                out.extend_from_slice(&component.to_le_bytes());
            }
        }
        TypedValue::Quaternion(v) => {
            for component in [v.x, v.y, v.z, v.s] {
                out.extend_from_slice(&component.to_le_bytes());
            }
        }
        TypedValue::List(items) => {
            let count = u32::try_from(items.len())
                .map_err(|_| encode_error("list has too many elements"))?;
            out.extend_from_slice(&count.to_le_bytes());
            for item in items {
                let mut element = Vec::new();
                encode_payload(item, &mut element)?;
                let len = u32::try_from(element.len())
                    .map_err(|_| encode_error("list element too large"))?;
                out.push(item.kind().code());
                out.extend_from_slice(&len.to_le_bytes());
                out.extend_from_slice(&element);
            }
        }
        TypedValue::OpaqueBlob { type_name, bytes } => {
            let name_len = u16::try_from(type_name.len())
                .map_err(|_| encode_error(format!("opaque type name '{type_name}' too long")))?;
            out.extend_from_slice(&name_len.to_le_bytes());
            out.extend_from_slice(type_name.as_bytes());
            out.extend_from_slice(bytes);
        }
    }
    Ok(())
}
