//! Graphics error types.

use tessera_core::mesh::LayoutError;

use crate::types::{ShaderStage, UniformType};

/// Errors that can occur in the graphics system.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphicsError {
    /// An operation was invoked out of order (before alloc, after free, or
    /// mutating state fixed at allocation).
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A device or pool limit was exceeded.
    #[error("capacity exceeded: {0}")]
    Capacity(String),
    /// A value of the wrong shader type was assigned to a uniform.
    #[error("type mismatch for uniform `{uniform}`: expected {expected}, got {actual}")]
    TypeMismatch {
        uniform: String,
        expected: UniformType,
        actual: UniformType,
    },
    /// A shader stage failed to compile.
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    /// A program failed to link.
    #[error("program failed to link:\n{log}")]
    Link { log: String },
    /// The driver could not create a native object.
    #[error("driver error: {0}")]
    Driver(String),
}

impl GraphicsError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a capacity error.
    pub fn capacity(message: impl Into<String>) -> Self {
        Self::Capacity(message.into())
    }

    /// Check if this error signals a bug at the call site rather than a
    /// shader or driver failure.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Capacity(_) | Self::TypeMismatch { .. }
        )
    }
}

impl From<LayoutError> for GraphicsError {
    fn from(err: LayoutError) -> Self {
        if err.is_capacity() {
            Self::Capacity(err.to_string())
        } else {
            Self::Configuration(err.to_string())
        }
    }
}
