//! handwire runtime - configuration and logging for handwire applications.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `HandwireConfig`)
//! - Logging configuration (`LoggingBuilder`, `init_from_config`)
//! - [`bootstrap`], which does both in one call
//!
//! ```ignore
//! use handwire_core::Chain;
//! use handwire_runtime::{ConfigLoader, bootstrap};
//!
//! fn main() -> Result<(), handwire_runtime::RuntimeError> {
//!     let config = bootstrap(ConfigLoader::new())?;
//!     let chain = Chain::new(show_user)?.config(config.chain);
//!     // hand `chain` to the server
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, HandwireConfig, LogFormat, LogLevel, LogOutput,
    LogRotation, LoggingConfig, Profile,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents, init_from_config};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Loads the configuration and installs the global tracing subscriber.
///
/// Fails if the configuration is invalid or a subscriber is already
/// installed.
pub fn bootstrap(loader: ConfigLoader) -> RuntimeResult<HandwireConfig> {
    let config = loader.load()?;
    LoggingBuilder::from_config(&config.logging).try_init()?;
    tracing::debug!(
        level = %config.logging.level,
        format = ?config.logging.format,
        "Logging initialized"
    );
    Ok(config)
}

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
