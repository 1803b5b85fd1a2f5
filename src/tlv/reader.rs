//! TLV record reader.
//!
//! Every read is bounds-checked against the enclosing block; running out of
//! bytes anywhere is a structural failure, never a short read.

use uuid::Uuid;

use crate::codec::DecodeContext;
use crate::error::{structural, type_mismatch, CodecResult};
use crate::value::{Quaternion, TypedValue, ValueKind, Vector3};

use super::RecordKind;

/// Decoded record header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Header {
    /// Closes the enclosing block.
    End,
    Scalar { tag: u16, kind: ValueKind, len: u32 },
    Nested { tag: u16, len: u32 },
}

impl Header {
    pub fn tag(&self) -> Option<u16> {
        match self {
            Header::End => None,
            Header::Scalar { tag, .. } | Header::Nested { tag, .. } => Some(*tag),
        }
    }

    fn stored(&self) -> String {
        match self {
            Header::End => "end marker".to_string(),
            Header::Scalar { kind, .. } => kind.to_string(),
            Header::Nested { .. } => "nested block".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(structural(format!(
                "truncated stream: wanted {len} bytes at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u8(&mut self) -> CodecResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> CodecResult<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> CodecResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> CodecResult<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }
}

/// Forward-only reader over one block of records.
#[derive(Clone, Debug)]
pub struct TlvReader<'a> {
    cursor: ByteCursor<'a>,
}

impl<'a> TlvReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            cursor: ByteCursor::new(buf),
        }
    }

    /// Reads the next header; `Header::End` marks the end of the current block.
    pub fn try_read_header(&mut self) -> CodecResult<Header> {
        if self.cursor.remaining() == 0 {
            return Err(structural("unexpected end of stream before end marker"));
        }
        let tag = self.cursor.u16()?;
        let raw_kind = self.cursor.u8()?;
        let kind = RecordKind::from_code(raw_kind)
            .ok_or_else(|| structural(format!("unknown record kind {raw_kind} for tag {tag}")))?;
        let header = match kind {
            RecordKind::End => {
                if tag != 0 {
                    return Err(structural(format!("end marker carries tag {tag}")));
                }
                if self.cursor.remaining() != 0 {
                    return Err(structural(format!(
                        "{} bytes after end marker",
                        self.cursor.remaining()
                    )));
                }
                return Ok(Header::End);
            }
            RecordKind::Scalar => {
                let code = self.cursor.u8()?;
                let kind = ValueKind::from_code(code)
                    .ok_or_else(|| structural(format!("unknown value kind {code} for tag {tag}")))?;
                let len = self.cursor.u32()?;
                Header::Scalar { tag, kind, len }
            }
            RecordKind::Nested => {
                let len = self.cursor.u32()?;
                Header::Nested { tag, len }
            }
        };
        let declared = match header {
            Header::Scalar { len, .. } | Header::Nested { len, .. } => len as usize,
            Header::End => 0,
        };
        if declared > self.cursor.remaining() {
            return Err(structural(format!(
                "record {tag} declares {declared} bytes, {} left",
                self.cursor.remaining()
            )));
        }
        Ok(header)
    }

    /// Reads a scalar that must be stored with the `wanted` kind.
    pub fn read_value(
        &mut self,
        header: &Header,
        wanted: ValueKind,
        ctx: &DecodeContext<'_>,
    ) -> CodecResult<TypedValue> {
        match header {
            Header::Scalar { tag, kind, .. } if *kind != wanted => {
                Err(type_mismatch(format!("tag {tag}"), wanted, kind))
            }
            _ => self.read_any(header, ctx),
        }
    }

    /// Reads a scalar of whatever kind it was stored with.
    pub fn read_any(
        &mut self,
        header: &Header,
        ctx: &DecodeContext<'_>,
    ) -> CodecResult<TypedValue> {
        match header {
            Header::Scalar { kind, len, .. } => {
                let payload = self.cursor.take(*len as usize)?;
                decode_payload(*kind, payload, 0, ctx)
            }
            other => Err(type_mismatch(
                format!("tag {}", other.tag().unwrap_or(0)),
                "scalar",
                other.stored(),
            )),
        }
    }

    /// Returns a reader over a nested block's body.
    pub fn nested(&mut self, header: &Header) -> CodecResult<TlvReader<'a>> {
        match header {
            Header::Nested { len, .. } => Ok(TlvReader::new(self.cursor.take(*len as usize)?)),
            other => Err(type_mismatch(
                format!("tag {}", other.tag().unwrap_or(0)),
                "nested block",
                other.stored(),
            )),
        }
    }

    /// Skips the record's payload using its length prefix.
    pub fn skip(&mut self, header: &Header) -> CodecResult<()> {
        match header {
            Header::Scalar { len, .. } | Header::Nested { len, .. } => {
                self.cursor.take(*len as usize).map(|_| ())
            }
            Header::End => Ok(()),
        }
    }
}

fn decode_payload(
    kind: ValueKind,
    payload: &[u8],
    depth: usize,
    ctx: &DecodeContext<'_>,
) -> CodecResult<TypedValue> {
    let mut cursor = ByteCursor::new(payload);
    let value = match kind {
        ValueKind::Integer32 => TypedValue::Integer32(i32::from_le_bytes(cursor.array()?)),
        ValueKind::Integer64 => TypedValue::Integer64(i64::from_le_bytes(cursor.array()?)),
        ValueKind::Real64 => TypedValue::Real64(cursor.f64()?),
        ValueKind::Text => {
            ctx.limits.check_text(payload.len())?;
            let text = std::str::from_utf8(cursor.take(payload.len())?)
                .map_err(|err| structural(format!("text is not utf-8: {err}")))?;
            TypedValue::Text(text.to_string())
        }
        ValueKind::EntityKey => TypedValue::EntityKey(Uuid::from_bytes(cursor.array()?)),
        ValueKind::Vector3 => TypedValue::Vector3(Vector3::new(
            cursor.f64()?,
            cursor.f64()?,
            cursor.f64()?,
        )),
        ValueKind::Quaternion => TypedValue::Quaternion(Quaternion::new(
            cursor.f64()?,
            cursor.f64()?,
            cursor.f64()?,
            cursor.f64()?,
        )),
        ValueKind::List => {
            ctx.limits.check_depth(depth + 1)?;
            let count = cursor.u32()?;
            let mut items = Vec::new();
            for _ in 0..count {
                let code = cursor.u8()?;
                let item_kind = ValueKind::from_code(code)
                    .ok_or_else(|| structural(format!("unknown list element kind {code}")))?;
                let len = cursor.u32()? as usize;
                let element = cursor.take(len)?;
                items.push(decode_payload(item_kind, element, depth + 1, ctx)?);
            }
            TypedValue::List(items)
        }
        ValueKind::OpaqueBlob => {
            let name_len = cursor.u16()? as usize;
            let type_name = std::str::from_utf8(cursor.take(name_len)?)
                .map_err(|err| structural(format!("opaque type name is not utf-8: {err}")))?
                .to_string();
            let bytes = cursor.take(cursor.remaining())?.to_vec();
            ctx.limits.check_blob(bytes.len())?;
            ctx.registry.verify(&type_name, &bytes)?;
            TypedValue::OpaqueBlob { type_name, bytes }
        }
    };
    if cursor.remaining() != 0 {
        return Err(structural(format!(
            "{kind} payload has {} unexpected trailing bytes",
            cursor.remaining()
        )));
    }
    Ok(value)
}
