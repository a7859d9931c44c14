use thiserror::Error;

/// Unified error type for the override store.
///
/// Most of the public surface recovers locally and reports failure as a
/// boolean or `Option` (an override that cannot be built is simply left
/// invalid); `OverrideError` carries the diagnosable cases for the APIs
/// that do propagate, serialization above all.
#[derive(Debug, Error)]
pub enum OverrideError {
    /// A path string could not be parsed or resolved against a schema.
    #[error("path error: {0}")]
    Path(String),

    /// A textual value could not be imported into the leaf type.
    #[error("import error: {0}")]
    Import(String),

    /// A sequence index beyond the current length was requested without
    /// permission to grow.
    #[error("index {index} out of bounds (len {len})")]
    OutOfBounds { index: usize, len: usize },

    /// An override was applied against a schema that does not own its
    /// root field.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The binary stream is malformed or a value blob cannot be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An underlying stream operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type OverrideResult<T> = Result<T, OverrideError>;
