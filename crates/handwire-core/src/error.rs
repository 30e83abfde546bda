//! Error types for handwire.
//!
//! Two families live here:
//!
//! - [`SetupError`] is raised once, when a handler is wrapped, and is fatal
//!   to registration.
//! - [`Failure`] is the error *value* that travels through the registry like
//!   any other published value. Handler-returned errors, construction errors
//!   and resolution errors all end up as a `Failure`.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::value::{Injectable, TypeDescriptor, TypeKind};

/// A handler signature violates an arity or placement rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    /// More than one parameter asks for the response slot.
    #[error("handler `{handler}` declares {count} response parameters, at most one is allowed")]
    MultipleAny { handler: &'static str, count: usize },

    /// More than one parameter asks for the error value.
    #[error("handler `{handler}` declares {count} error parameters, at most one is allowed")]
    MultipleError { handler: &'static str, count: usize },

    /// The error output of a main handler must come last.
    #[error("main handler `{handler}` returns the error type first; the error must be the last output")]
    MisplacedError { handler: &'static str },
}

/// Result type for handler registration.
pub type SetupResult<T> = Result<T, SetupError>;

/// Resolving a handler input failed.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Nothing satisfies the type and it cannot be constructed.
    #[error("no value available for `{0}`")]
    Missing(TypeDescriptor),

    /// The constructor refused to build the value.
    #[error("failed to construct `{descriptor}`: {cause}")]
    Construction {
        descriptor: TypeDescriptor,
        cause: Failure,
    },

    /// The constructor returned success but never filled its target.
    #[error("constructor returned without filling `{0}`")]
    Unfilled(TypeDescriptor),

    /// A resolved value does not have the declared type.
    #[error("resolved value for `{0}` has a different type")]
    Mismatch(TypeDescriptor),
}

impl ResolveError {
    pub fn descriptor(&self) -> &TypeDescriptor {
        match self {
            Self::Missing(d) | Self::Unfilled(d) | Self::Mismatch(d) => d,
            Self::Construction { descriptor, .. } => descriptor,
        }
    }
}

/// Result type for input resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// A cheap-to-clone, type-erased error value.
///
/// Any `std::error::Error + Send + Sync + 'static` converts into a
/// `Failure` via `?`, so handlers can return their own error enums:
///
/// ```rust,ignore
/// async fn load(id: UserId) -> Result<User, Failure> {
///     let user = db::find(id).await?;
///     Ok(user)
/// }
/// ```
#[derive(Clone)]
pub struct Failure {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

impl Failure {
    /// Wraps an error value.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Creates a failure from a plain message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::new(Message(message.to_string()))
    }

    /// Returns the wrapped error if it is of type `E`.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Returns `true` if the wrapped error is of type `E`.
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.inner.is::<E>()
    }

    /// Borrows the wrapped error as a trait object.
    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.inner
    }
}

impl<E> From<E> for Failure
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl AsRef<dyn StdError + Send + Sync> for Failure {
    fn as_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.as_error()
    }
}

impl Injectable for Failure {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::with_kind::<Self>(TypeKind::Error)
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("not found")]
    struct NotFound;

    #[test]
    fn failure_keeps_the_wrapped_error() {
        let failure: Failure = NotFound.into();
        assert!(failure.is::<NotFound>());
        assert_eq!(failure.to_string(), "not found");
        assert!(failure.clone().downcast_ref::<NotFound>().is_some());
    }

    #[test]
    fn message_failures_display_their_text() {
        let failure = Failure::msg("boom");
        assert_eq!(failure.to_string(), "boom");
        assert!(!failure.is::<NotFound>());
    }

    #[test]
    fn failure_is_registered_as_the_error_kind() {
        assert_eq!(Failure::descriptor().kind(), TypeKind::Error);
    }

    #[test]
    fn resolve_errors_convert_into_failures() {
        let err = ResolveError::Missing(TypeDescriptor::concrete::<String>());
        let failure = Failure::from(err);
        assert!(failure.is::<ResolveError>());
        assert!(failure.to_string().contains("String"));
    }
}
