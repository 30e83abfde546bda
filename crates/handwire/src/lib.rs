//! # handwire
//!
//! Request handlers written as plain async functions whose parameters
//! declare what they need.
//!
//! ## Overview
//!
//! Each request runs through a chain of handlers:
//!
//! ```text
//! ┌──────────┐     ┌──────────┐     ┌──────────┐     ┌──────────┐
//! │ Registry │────▶│  Before  │────▶│   Main   │────▶│  After   │
//! │ req, rw  │     │ handlers │     │ handler  │     │ handlers │
//! └──────────┘     └──────────┘     └──────────┘     └──────────┘
//!                    │ error: skip Main ─────────────────▲
//! ```
//!
//! - **Registry**: the values available to handlers for one request
//! - **Before**: pre-processing; a returned error skips the main handler
//! - **Main**: produces the response
//! - **After**: finalizers that see the response and any error
//!
//! Parameters are resolved by type. Values published by earlier handlers
//! are reused; missing domain objects are built by a [`Constructor`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use handwire::prelude::*;
//!
//! async fn show(user: User) -> Result<String, Failure> {
//!     Ok(format!("hello {}", user.name))
//! }
//!
//! async fn render(response: Response, err: Option<Failure>, rw: Recorder) {
//!     match err {
//!         Some(err) => rw.status(500, err.to_string()),
//!         None => rw.body(response.get::<String>().unwrap_or_default()),
//!     }
//! }
//!
//! let config = bootstrap(ConfigLoader::new())?;
//! let chain = Chain::new(show)?
//!     .after(render)?
//!     .constructor(ConstructorMap::new().with(User::from_exchange))
//!     .config(config.chain);
//!
//! let registry = chain.run(request, recorder).await;
//! ```
//!
//! ## Features
//!
//! - `toml-config`: load `handwire.toml` files (default)
//! - `json-log`: JSON log output
//!
//! [`Constructor`]: handwire_core::Constructor

pub use handwire_core as core;
pub use handwire_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use handwire::prelude::*;
/// ```
pub mod prelude {
    // Chain assembly
    pub use handwire_core::{After, Before, Chain, ChainConfig, ChainService, Main};

    // Handler parameters and results
    pub use handwire_core::{Capability, Failure, FromRegistry, Injectable, Response};

    // Construction
    pub use handwire_core::{
        CapabilityTable, Constructor, ConstructorMap, Exchange, NoConstructor, Target,
        constructor_fn,
    };

    // Resolution
    pub use handwire_core::{Registry, ResolveError, SetupError};

    // Runtime
    pub use handwire_runtime::{
        ConfigLoader, HandwireConfig, LoggingBuilder, RuntimeError, bootstrap, init_from_config,
    };

    // Logging macros
    pub use handwire_runtime::prelude::*;
}
