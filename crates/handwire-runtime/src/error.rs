//! Runtime error types.

use thiserror::Error;
use tracing_subscriber::util::TryInitError;

use crate::config::ConfigError;

/// Errors that can occur while bootstrapping an application.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A global tracing subscriber is already installed.
    #[error("Failed to initialize logging: {0}")]
    Logging(#[from] TryInitError),

    /// A handler was rejected while assembling a chain.
    #[error("Invalid handler: {0}")]
    Setup(#[from] handwire_core::SetupError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
