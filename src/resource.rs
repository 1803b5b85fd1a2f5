use serde::{Deserialize, Serialize};

use crate::error::{resource_limit, structural, CodecResult};

/// Bounds applied while decoding untrusted state blobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeLimits {
    pub max_document_bytes: usize,
    pub max_list_depth: usize,
    pub max_queue_len: usize,
    pub max_variables: usize,
    pub max_text_bytes: usize,
    pub max_blob_bytes: usize,
    /// Treat unknown TLV tags as malformed instead of skipping them.
    pub reject_unknown_tags: bool,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_document_bytes: 16 * 1024 * 1024,
            max_list_depth: 16,
            max_queue_len: 1_024,
            max_variables: 8_192,
            max_text_bytes: 1024 * 1024,
            max_blob_bytes: 4 * 1024 * 1024,
            reject_unknown_tags: false,
        }
    }
}

impl DecodeLimits {
    /// Loads limits from TOML; missing keys keep their defaults.
    pub fn from_toml_str(input: &str) -> CodecResult<Self> {
        toml::from_str(input).map_err(|err| structural(format!("invalid limits file: {err}")))
    }

    pub(crate) fn check_document(&self, len: usize) -> CodecResult<()> {
        if len > self.max_document_bytes {
            return Err(resource_limit(format!("document of {len} bytes")));
        }
        Ok(())
    }

    pub(crate) fn check_depth(&self, depth: usize) -> CodecResult<()> {
        if depth > self.max_list_depth {
            return Err(resource_limit(format!("list nesting depth {depth}")));
        }
        Ok(())
    }

    pub(crate) fn check_queue(&self, len: usize) -> CodecResult<()> {
        if len > self.max_queue_len {
            return Err(resource_limit("event queue length".to_string()));
        }
        Ok(())
    }

    pub(crate) fn check_variables(&self, len: usize) -> CodecResult<()> {
        if len > self.max_variables {
            return Err(resource_limit("variable count".to_string()));
        }
        Ok(())
    }

    pub(crate) fn check_text(&self, len: usize) -> CodecResult<()> {
        if len > self.max_text_bytes {
            return Err(resource_limit(format!("text value of {len} bytes")));
        }
        Ok(())
    }

    pub(crate) fn check_blob(&self, len: usize) -> CodecResult<()> {
        if len > self.max_blob_bytes {
            return Err(resource_limit(format!("opaque blob of {len} bytes")));
        }
        Ok(())
    }
}
