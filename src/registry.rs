//! Immutable registry of caller-defined opaque value types.
//!
//! Decoders only accept opaque blobs whose type name was registered here
//! before decoding started, so foreign data can never name arbitrary types.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{type_mismatch, CodecError, CodecResult};

/// A caller-defined value that may be stored in an opaque blob.
pub trait OpaqueType: Serialize + DeserializeOwned {
    /// Name written to the wire next to the payload.
    const TYPE_NAME: &'static str;
}

/// Checks that a payload decodes as the registered type.
pub type PayloadCheck = fn(&[u8]) -> Result<(), String>;

#[derive(Clone, Default)]
pub struct TypeRegistry {
    entries: HashMap<String, PayloadCheck>,
}

#[derive(Default)]
pub struct TypeRegistryBuilder {
    entries: HashMap<String, PayloadCheck>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// Registry that rejects every opaque blob.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validates a decoded blob against the registry.
    pub fn verify(&self, type_name: &str, bytes: &[u8]) -> CodecResult<()> {
        let check = self
            .entries
            .get(type_name)
            .ok_or_else(|| CodecError::UnknownType(type_name.to_string()))?;
        check(bytes).map_err(|err| type_mismatch(type_name, type_name, err))
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}

impl TypeRegistryBuilder {
    pub fn register<T: OpaqueType>(mut self) -> Self {
        self.entries
            .insert(T::TYPE_NAME.to_string(), check_payload::<T>);
        self
    }

    /// Registers a name with a hand-written payload check.
    pub fn register_raw(mut self, type_name: impl Into<String>, check: PayloadCheck) -> Self {
        self.entries.insert(type_name.into(), check);
        self
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            entries: self.entries,
        }
    }
}

fn check_payload<T: OpaqueType>(bytes: &[u8]) -> Result<(), String> {
    postcard::from_bytes::<T>(bytes)
        .map(|_| ())
        .map_err(|err| err.to_string())
}
