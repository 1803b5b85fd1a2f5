//! Format versioning constants for persisted script state.
//!
//! Both wire formats carry identifiers that older hosts already depend on,
//! so everything here is part of the wire contract.

/// Current layout version of the TLV snapshot envelope.
/// Increment when the record layout or tag table changes incompatibly.
pub const TLV_FORMAT_VERSION: u16 = 1;

/// Magic bytes opening a TLV snapshot envelope.
pub const TLV_SNAPSHOT_MAGIC: [u8; 4] = *b"SSTV";

/// Engine identifier written for the legacy XML body.
pub const XML_ENGINE_ID: &str = "XEngine";

/// Engine identifier written for the TLV snapshot body.
pub const TLV_ENGINE_ID: &str = "YEngine";
