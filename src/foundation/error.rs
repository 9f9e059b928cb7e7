/// Convenience alias used across the compositor.
pub type CompositorResult<T> = Result<T, CompositorError>;

/// Errors surfaced by the compositor runtime.
#[derive(thiserror::Error, Debug)]
pub enum CompositorError {
    /// Malformed node tree, parameters or links.
    #[error("validation error: {0}")]
    Validation(String),

    /// Failure while executing a compiled operation sequence.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// The GPU device rejected a request.
    #[error("gpu error: {0}")]
    Gpu(String),

    /// A shader requested by name is not known to the device.
    #[error("missing shader: {0}")]
    MissingShader(String),

    /// Node tree (de)serialization failed.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Any other error, typically from a host integration.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CompositorError {
    /// Build a [`CompositorError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CompositorError::Evaluation`].
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// Build a [`CompositorError::Gpu`].
    pub fn gpu(msg: impl Into<String>) -> Self {
        Self::Gpu(msg.into())
    }

    /// Build a [`CompositorError::MissingShader`].
    pub fn missing_shader(name: impl Into<String>) -> Self {
        Self::MissingShader(name.into())
    }

    /// Build a [`CompositorError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
