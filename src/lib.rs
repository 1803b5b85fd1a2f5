mod codec;
mod error;
mod event;
mod registry;
mod resource;
mod state;
pub mod tlv;
mod translate;
mod value;
mod version;
pub mod xml;

pub use codec::{DecodeContext, EngineKind, StateCodec};
pub use error::{CodecError, CodecResult, ErrorCategory};
pub use event::{DetectedInfo, EventRecord, ObjectType};
pub use registry::{OpaqueType, PayloadCheck, TypeRegistry, TypeRegistryBuilder};
pub use resource::DecodeLimits;
pub use state::{PermsGrant, ScriptState};
pub use translate::{
    DetectionKind, EventTranslator, EventTranslatorBuilder, LandCollisionKind, LinkIdShape,
    ScriptEvent,
};
pub use value::{EntityKey, Quaternion, TypedValue, ValueKind, Vector3};
pub use version::{TLV_ENGINE_ID, TLV_FORMAT_VERSION, TLV_SNAPSHOT_MAGIC, XML_ENGINE_ID};
