//! Error types for datum conversions.

use thiserror::Error;

/// Error type for conversions between datums and dynamic values.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Type metadata could not be resolved (unknown OID, array without an
    /// element type, unknown domain).
    #[error("type resolution failed: {0}")]
    TypeResolution(String),

    /// The dynamic value's shape is incompatible with the target SQL type's
    /// array or buffer constraints.
    #[error("{0}")]
    ValueShape(String),

    /// A textual input/output conversion function rejected the value. The
    /// original message is preserved.
    #[error("datum conversion failed: {0}")]
    DatumConversion(String),

    /// Text transcoding between the server encoding and UTF-8 failed.
    #[error("encoding conversion failed: {0}")]
    Encoding(String),
}

/// Result type for conversion operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
