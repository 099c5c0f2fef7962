//! Error types for database decoding.

use thiserror::Error;

use crate::signature::Signature;

/// Errors that can occur when decoding client database files.
#[derive(Debug, Error)]
pub enum Error {
    /// The byte source failed.
    #[error("source error: {0}")]
    Source(#[from] veles_common::Error),

    /// The file magic is not one this decoder understands.
    #[error("unsupported file signature {actual} (expected {expected})")]
    SignatureMismatch {
        expected: &'static str,
        actual: Signature,
    },

    /// The supplied schema is inconsistent with the file structure.
    #[error("schema does not match file: {0}")]
    SchemaMismatch(&'static str),

    /// A sidecar table points at something that does not exist.
    #[error("corrupt index: {0}")]
    CorruptIndex(&'static str),

    /// The file uses a compression form this decoder does not handle.
    #[error("unsupported compression: {0}")]
    UnsupportedCompression(&'static str),

    /// No field with the requested name exists in the schema.
    #[error("unknown field name: {0}")]
    UnknownField(String),

    /// The stored value does not hold the requested type.
    #[error("field {0} does not hold the requested type")]
    FieldTypeMismatch(String),

    /// The stored value exceeds the bounds of the requested type.
    #[error("value of field {0} exceeds the bounds of the requested type")]
    NumericOverflow(String),
}

/// Result type for database decoding.
pub type Result<T> = std::result::Result<T, Error>;
