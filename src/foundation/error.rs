/// Convenience result type used across the mosaic engine.
pub type MosaicResult<T> = Result<T, MosaicError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum MosaicError {
    /// Invalid user-provided geometry, options, or call ordering.
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation the composite deliberately does not support (e.g. single-pixel access).
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A cache generator failed to produce its value (e.g. unreadable source).
    #[error("generation error: {0}")]
    Generation(String),

    /// Misuse of the generation cache (e.g. re-entrant access from a generator).
    #[error("cache error: {0}")]
    Cache(String),

    /// Tiled rendering was aborted through a [`crate::CancelToken`].
    #[error("render cancelled")]
    Cancelled,

    /// Errors when serializing or deserializing layout documents.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MosaicError {
    /// Build a [`MosaicError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MosaicError::Unsupported`] value.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Build a [`MosaicError::Generation`] value.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Build a [`MosaicError::Cache`] value.
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Build a [`MosaicError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
