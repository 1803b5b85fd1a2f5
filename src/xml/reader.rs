use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{structural, CodecResult};

use super::{element_name, xml_error};

/// Forward-only cursor over a document.
pub struct XmlCursor<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> XmlCursor<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut reader = Reader::from_str(text);
        reader.expand_empty_elements(true);
        Self { reader }
    }

    /// Opens the document's root element.
    pub fn root(&mut self) -> CodecResult<BytesStart<'a>> {
        loop {
            match self.reader.read_event().map_err(xml_error)? {
                Event::Start(start) => return Ok(start),
                Event::End(_) => return Err(structural("end tag before root element")),
                Event::Eof => return Err(structural("document has no root element")),
                _ => continue,
            }
        }
    }

    /// Next child of the element currently open, or `None` once it closes.
    ///
    /// Stray text between children is ignored.
    pub fn next_child(&mut self) -> CodecResult<Option<BytesStart<'a>>> {
        loop {
            match self.reader.read_event().map_err(xml_error)? {
                Event::Start(start) => return Ok(Some(start)),
                Event::End(_) => return Ok(None),
                Event::Eof => return Err(structural("unexpected end of document")),
                _ => continue,
            }
        }
    }

    /// Text content of the element currently open; consumes its end tag.
    pub fn read_text(&mut self) -> CodecResult<String> {
        let mut text = String::new();
        loop {
            match self.reader.read_event().map_err(xml_error)? {
                Event::Text(chunk) => text.push_str(&chunk.unescape().map_err(xml_error)?),
                Event::CData(chunk) => text.push_str(
                    std::str::from_utf8(&chunk)
                        .map_err(|err| structural(format!("cdata is not utf-8: {err}")))?,
                ),
                Event::End(_) => return Ok(text),
                Event::Start(start) => {
                    return Err(structural(format!(
                        "unexpected <{}> inside a value",
                        element_name(&start)
                    )))
                }
                Event::Eof => return Err(structural("unexpected end of document")),
                _ => continue,
            }
        }
    }

    /// Skips an element that was just opened, including everything inside it.
    pub fn skip(&mut self, start: &BytesStart<'_>) -> CodecResult<()> {
        self.reader
            .read_to_end(start.name())
            .map(|_| ())
            .map_err(xml_error)
    }

    /// Checks that nothing but trailing whitespace follows the root element.
    pub fn finish(&mut self) -> CodecResult<()> {
        loop {
            match self.reader.read_event().map_err(xml_error)? {
                Event::Eof => return Ok(()),
                Event::Start(start) => {
                    return Err(structural(format!(
                        "second root element <{}>",
                        element_name(&start)
                    )))
                }
                Event::End(_) => return Err(structural("unbalanced end tag after root")),
                _ => continue,
            }
        }
    }
}
