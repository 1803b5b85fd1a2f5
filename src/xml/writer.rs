use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{encode_error, CodecResult};

use super::write_error;

/// Compact element writer over an in-memory buffer.
pub struct XmlWriter {
    inner: Writer<Vec<u8>>,
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            inner: Writer::new(Vec::new()),
        }
    }

    pub fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> CodecResult<()> {
        let mut element = BytesStart::new(name);
        for attr in attrs {
            element.push_attribute(*attr);
        }
        self.inner
            .write_event(Event::Start(element))
            .map_err(write_error)
    }

    pub fn end(&mut self, name: &str) -> CodecResult<()> {
        self.inner
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(write_error)
    }

    pub fn text(&mut self, text: &str) -> CodecResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.inner
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_error)
    }

    /// Element with text content only.
    pub fn leaf(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> CodecResult<()> {
        self.start(name, attrs)?;
        self.text(text)?;
        self.end(name)
    }

    pub fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> CodecResult<()> {
        let mut element = BytesStart::new(name);
        for attr in attrs {
            element.push_attribute(*attr);
        }
        self.inner
            .write_event(Event::Empty(element))
            .map_err(write_error)
    }

    /// Writes `name`'s start tag, the body, then the matching end tag.
    pub fn element(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        body: impl FnOnce(&mut Self) -> CodecResult<()>,
    ) -> CodecResult<()> {
        self.start(name, attrs)?;
        body(self)?;
        self.end(name)
    }

    pub fn into_string(self) -> CodecResult<String> {
        String::from_utf8(self.inner.into_inner())
            .map_err(|err| encode_error(format!("document is not utf-8: {err}")))
    }
}
