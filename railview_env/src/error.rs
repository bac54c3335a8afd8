//! Error types for the RailView environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnvError {
    /// The surface cannot take writes right now (not loaded, torn down, ...)
    #[error("Surface unavailable: {0}")]
    SurfaceUnavailable(String),

    /// A style property was addressed to a layer the surface does not know
    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    /// Feature or style serialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Context operation failed
    #[error("Context error: {0}")]
    ContextError(String),
}

impl EnvError {
    /// Creates a surface-unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::SurfaceUnavailable(msg.into())
    }

    /// Creates an unknown-layer error.
    pub fn unknown_layer(layer: impl std::fmt::Display) -> Self {
        Self::UnknownLayer(layer.to_string())
    }
}
