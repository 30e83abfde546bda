//! Handler system for handwire.
//!
//! This module contains the function adapter and the three handler roles
//! built on top of it:
//!
//! - **Handler** – the [`Handler`] trait, implemented for async functions
//!   with 0-16 parameters that implement [`FromRegistry`], similar to Axum's
//!   handler system.
//! - **Adapter** ([`adapter`]) – wraps a handler once at setup time and
//!   later resolves its inputs from a [`Registry`](crate::Registry) and
//!   publishes its outputs back.
//! - **Roles** ([`before`], [`main`], [`after`]) – the invocation and error
//!   policy of each position in a chain.
//!
//! # Example
//!
//! ```rust,ignore
//! use handwire_core::{Failure, Response};
//!
//! // Before: may abort the chain by returning an error
//! async fn authorize(req: Request) -> Result<(), Failure> {
//!     req.header("authorization").map(|_| ()).ok_or_else(|| Failure::msg("unauthorized"))
//! }
//!
//! // Main: its first output becomes the response
//! async fn show(user: User) -> Result<String, Failure> {
//!     Ok(format!("hello {}", user.name))
//! }
//!
//! // After: observes the response and any error
//! async fn render(response: Response, err: Option<Failure>, rw: Recorder) {
//!     // ...
//! }
//! ```

pub mod adapter;
pub mod after;
pub mod before;
pub mod main;

use std::future::Future;

pub use adapter::{Adapter, Invocation, Signature};
pub use after::After;
pub use before::Before;
pub use main::Main;

use crate::error::ResolveResult;
use crate::extract::FromRegistry;
use crate::output::IntoOutputs;
use crate::value::{AnyValue, TypeDescriptor};

// ============================================================================
// Handler Trait
// ============================================================================

/// A function whose parameters are resolved from a registry.
///
/// # Blanket Implementation
///
/// This trait is automatically implemented for async functions that:
/// - Take 0-16 parameters that implement [`FromRegistry`]
/// - Return a type that implements [`IntoOutputs`]
pub trait Handler<T>: Clone + Send + Sync + 'static {
    /// What the handler returns once awaited.
    type Output: IntoOutputs;

    /// The future calling this handler returns.
    type Future: Future<Output = Self::Output> + Send + 'static;

    /// The parameter descriptors, in declaration order.
    fn input_descriptors() -> Vec<TypeDescriptor>;

    /// Converts the resolved inputs into parameters and calls the handler.
    ///
    /// `inputs` holds one slot per descriptor returned by
    /// [`input_descriptors`](Self::input_descriptors).
    fn call(self, inputs: Vec<Option<AnyValue>>) -> ResolveResult<Self::Future>;
}

// ============================================================================
// Handler implementations for functions (Axum-style)
// ============================================================================

/// Macro to generate Handler implementations for functions with different arities.
macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, Fut, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future + Send + 'static,
            Fut::Output: IntoOutputs,
            $( $ty: FromRegistry, )*
        {
            type Output = Fut::Output;
            type Future = Fut;

            fn input_descriptors() -> Vec<TypeDescriptor> {
                vec![$( $ty::input_descriptor(), )*]
            }

            fn call(self, inputs: Vec<Option<AnyValue>>) -> ResolveResult<Self::Future> {
                let mut inputs = inputs.into_iter();
                $(
                    let $ty = $ty::from_resolved(inputs.next().flatten())?;
                )*

                Ok((self)($($ty,)*))
            }
        }
    };
}

// Generate implementations for 0-16 parameters
impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15
);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15, T16
);
