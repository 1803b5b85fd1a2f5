//! Format dispatcher: the wrapper document and the engine it names.
//!
//! Every persisted state is a `<State UUID=".." Asset=".." Engine="..">`
//! element. `XEngine` documents carry a `<ScriptState>` body in the legacy
//! XML format; `YEngine` documents carry a `<Snapshot>` holding the hex of a
//! TLV snapshot envelope. The caller always picks the engine to write.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;
use std::sync::Arc;

use quick_xml::events::BytesStart;
use uuid::Uuid;

use crate::error::{structural, CodecError, CodecResult};
use crate::registry::TypeRegistry;
use crate::resource::DecodeLimits;
use crate::state::ScriptState;
use crate::tlv;
use crate::translate::EventTranslator;
use crate::version::{TLV_ENGINE_ID, XML_ENGINE_ID};
use crate::xml::{self, XmlCursor, XmlWriter};

const WRAPPER: &str = "State";
const SNAPSHOT: &str = "Snapshot";

/// Collaborators shared by both decoders for the duration of one load.
#[derive(Clone, Copy, Debug)]
pub struct DecodeContext<'a> {
    pub registry: &'a TypeRegistry,
    pub events: &'a EventTranslator,
    pub limits: &'a DecodeLimits,
}

/// Persistence engine a document was written by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Legacy XML body.
    Xml,
    /// Binary TLV snapshot.
    Tlv,
}

impl EngineKind {
    pub fn id(self) -> &'static str {
        match self {
            EngineKind::Xml => XML_ENGINE_ID,
            EngineKind::Tlv => TLV_ENGINE_ID,
        }
    }

    /// The other engine, used when converting between formats.
    pub fn other(self) -> Self {
        match self {
            EngineKind::Xml => EngineKind::Tlv,
            EngineKind::Tlv => EngineKind::Xml,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for EngineKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            XML_ENGINE_ID => Ok(EngineKind::Xml),
            TLV_ENGINE_ID => Ok(EngineKind::Tlv),
            other => Err(CodecError::UnknownFormat(other.to_string())),
        }
    }
}

/// Entry point for saving and loading script state.
///
/// Immutable after construction and safe to share between threads.
#[derive(Clone, Debug)]
pub struct StateCodec {
    registry: Arc<TypeRegistry>,
    events: Arc<EventTranslator>,
    limits: DecodeLimits,
}

impl StateCodec {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            events: Arc::new(EventTranslator::default()),
            limits: DecodeLimits::default(),
        }
    }

    pub fn with_translator(mut self, events: Arc<EventTranslator>) -> Self {
        self.events = events;
        self
    }

    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn translator(&self) -> &EventTranslator {
        &self.events
    }

    pub fn limits(&self) -> &DecodeLimits {
        &self.limits
    }

    pub fn context(&self) -> DecodeContext<'_> {
        DecodeContext {
            registry: &self.registry,
            events: &self.events,
            limits: &self.limits,
        }
    }

    /// Writes `state` as a wrapper document for `engine`.
    ///
    /// The document is built in memory first, so a failed encode writes nothing.
    pub fn serialize<W: Write>(
        &self,
        mut writer: W,
        state: &ScriptState,
        engine: EngineKind,
    ) -> CodecResult<()> {
        let document = self.to_document(state, engine)?;
        writer.write_all(document.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Reads a whole wrapper document and decodes it with the engine it names.
    pub fn deserialize<R: Read>(&self, reader: R) -> CodecResult<ScriptState> {
        let max = self.limits.max_document_bytes;
        let mut buf = Vec::new();
        reader
            .take(max.saturating_add(1) as u64)
            .read_to_end(&mut buf)?;
        self.limits.check_document(buf.len())?;
        let text = String::from_utf8(buf)
            .map_err(|err| structural(format!("document is not utf-8: {err}")))?;
        self.from_document(&text)
    }

    pub fn to_document(&self, state: &ScriptState, engine: EngineKind) -> CodecResult<String> {
        let item_id = state.item_id.to_string();
        let asset_id = state.asset_id.to_string();
        let attrs = [
            ("UUID", item_id.as_str()),
            ("Asset", asset_id.as_str()),
            ("Engine", engine.id()),
        ];
        let mut out = XmlWriter::new();
        out.element(WRAPPER, &attrs, |out| match engine {
            EngineKind::Xml => xml::write_body(out, state),
            EngineKind::Tlv => {
                let snapshot = tlv::encode_snapshot(state)?;
                out.leaf(SNAPSHOT, &[], &hex::encode(snapshot))
            }
        })?;
        out.into_string()
    }

    pub fn from_document(&self, text: &str) -> CodecResult<ScriptState> {
        self.decode_tagged(text).map(|(_, state)| state)
    }

    /// Decodes a document and reports which engine wrote it.
    pub fn decode_tagged(&self, text: &str) -> CodecResult<(EngineKind, ScriptState)> {
        self.limits.check_document(text.len())?;
        let ctx = self.context();
        let mut cursor = XmlCursor::new(text);

        let root = cursor.root()?;
        if root.name().as_ref() != WRAPPER.as_bytes() {
            return Err(structural(format!(
                "document root is <{}>, expected <{WRAPPER}>",
                xml::element_name(&root)
            )));
        }
        let engine: EngineKind = wrapper_attribute(&root, "Engine")?.parse()?;
        let item_id = wrapper_key(&root, "UUID")?;
        let asset_id = wrapper_key(&root, "Asset")?;

        let mut state = None;
        while let Some(child) = cursor.next_child()? {
            let name = xml::element_name(&child);
            match (engine, name.as_str()) {
                (EngineKind::Xml, xml::SCRIPT_STATE) if state.is_none() => {
                    state = Some(xml::read_body(&mut cursor, item_id, asset_id, &ctx)?);
                }
                (EngineKind::Tlv, SNAPSHOT) if state.is_none() => {
                    let encoded = cursor.read_text()?;
                    let snapshot = hex::decode(encoded.trim())
                        .map_err(|err| structural(format!("snapshot is not hex: {err}")))?;
                    state = Some(tlv::decode_snapshot(&snapshot, item_id, asset_id, &ctx)?);
                }
                _ => {
                    tracing::debug!(element = %name, %engine, "skipping wrapper child");
                    cursor.skip(&child)?;
                }
            }
        }
        cursor.finish()?;

        let state =
            state.ok_or_else(|| structural(format!("{engine} document has no state body")))?;
        tracing::trace!(%engine, item = %item_id, "decoded script state");
        Ok((engine, state))
    }
}

fn wrapper_attribute(root: &BytesStart<'_>, key: &str) -> CodecResult<String> {
    xml::attribute(root, key)?
        .ok_or_else(|| structural(format!("<{WRAPPER}> without {key} attribute")))
}

fn wrapper_key(root: &BytesStart<'_>, key: &str) -> CodecResult<Uuid> {
    let text = wrapper_attribute(root, key)?;
    Uuid::parse_str(text.trim())
        .map_err(|err| structural(format!("<{WRAPPER}> {key} is not a uuid: {err}")))
}

#[cfg(test)]
#[path = "tests/codec_tests.rs"]
mod tests;
