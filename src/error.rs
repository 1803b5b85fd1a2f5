use miette::Diagnostic;
use thiserror::Error;

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug, Error, Diagnostic)]
pub enum CodecError {
    #[error("malformed state stream: {0}")]
    #[diagnostic(code("sscodec.structural"))]
    Structural(String),
    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    #[diagnostic(code("sscodec.type_mismatch"))]
    TypeMismatch {
        context: String,
        expected: String,
        found: String,
    },
    #[error("opaque type '{0}' is not registered")]
    #[diagnostic(
        code("sscodec.unknown_type"),
        help("register the type with TypeRegistry::builder() before decoding")
    )]
    UnknownType(String),
    #[error("unknown engine identifier '{0}'")]
    #[diagnostic(code("sscodec.unknown_format"), help("expected XEngine or YEngine"))]
    UnknownFormat(String),
    #[error("resource limit exceeded: {0}")]
    #[diagnostic(code("sscodec.resource_limit"))]
    ResourceLimit(String),
    #[error("cannot encode state: {0}")]
    #[diagnostic(code("sscodec.encode"))]
    Encode(String),
    #[error("stream error: {0}")]
    #[diagnostic(code("sscodec.io"))]
    Io(#[from] std::io::Error),
}

/// Coarse failure class reported to callers deciding resume policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Structural,
    TypeMismatch,
    UnknownType,
    UnknownFormat,
    ResourceLimit,
    Encode,
    Io,
}

impl CodecError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CodecError::Structural(_) => ErrorCategory::Structural,
            CodecError::TypeMismatch { .. } => ErrorCategory::TypeMismatch,
            CodecError::UnknownType(_) => ErrorCategory::UnknownType,
            CodecError::UnknownFormat(_) => ErrorCategory::UnknownFormat,
            CodecError::ResourceLimit(_) => ErrorCategory::ResourceLimit,
            CodecError::Encode(_) => ErrorCategory::Encode,
            CodecError::Io(_) => ErrorCategory::Io,
        }
    }
}

#[cold]
#[inline(never)]
pub(crate) fn structural(message: impl Into<String>) -> CodecError {
    CodecError::Structural(message.into())
}

#[cold]
#[inline(never)]
pub(crate) fn type_mismatch(
    context: impl Into<String>,
    expected: impl std::fmt::Display,
    found: impl std::fmt::Display,
) -> CodecError {
    CodecError::TypeMismatch {
        context: context.into(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

#[cold]
#[inline(never)]
pub(crate) fn resource_limit(message: impl Into<String>) -> CodecError {
    CodecError::ResourceLimit(message.into())
}

#[cold]
#[inline(never)]
pub(crate) fn encode_error(message: impl Into<String>) -> CodecError {
    CodecError::Encode(message.into())
}
