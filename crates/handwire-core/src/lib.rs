//! # handwire-core
//!
//! Type-driven dependency resolution for request handlers.
//!
//! A handler is a plain async function whose parameter list declares the
//! values it needs. For every request a [`Registry`] collects the values
//! available so far, resolves each parameter by type (building missing
//! domain objects through a [`Constructor`]), calls the handler and
//! publishes what it returns for later handlers.
//!
//! This crate provides:
//! - [`Registry`] – per-request values, the response slot and resolution
//! - [`Handler`] – Axum-style blanket impls for async functions
//! - [`Before`], [`Main`], [`After`] – the three handler roles
//! - [`Chain`] – before, main and after handlers run per request
//! - [`ChainService`] – a chain as a `tower::Service`

pub mod capability;
pub mod chain;
pub mod config;
pub mod construct;
pub mod error;
pub mod extract;
pub mod handler;
pub mod output;
pub mod registry;
pub mod service;
pub mod value;

pub use capability::{Capability, CapabilityTable};
pub use chain::Chain;
pub use config::ChainConfig;
pub use construct::{
    Constructor, ConstructorFn, ConstructorMap, Exchange, NoConstructor, Target, constructor_fn,
};
pub use error::{Failure, ResolveError, ResolveResult, SetupError, SetupResult};
pub use extract::{FromRegistry, Response};
pub use handler::{Adapter, After, Before, Handler, Invocation, Main, Signature};
pub use output::{IntoOutput, IntoOutputs};
pub use registry::Registry;
pub use service::ChainService;
pub use value::{AnyValue, Injectable, TypeDescriptor, TypeKind, TypedValue};
