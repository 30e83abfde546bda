//! Handler parameters.
//!
//! Any type implementing [`FromRegistry`] can appear in a handler's
//! parameter list. The registry resolves the parameter's descriptor and the
//! trait turns the resolved, type-erased value back into the parameter type.
//!
//! Built-in parameter types:
//!
//! - every [`Injectable`] type, resolved by exact type and constructed on a
//!   miss;
//! - [`Option<T>`], which looks `T` up but never constructs it;
//! - [`Response`], the "any" slot holding the current response;
//! - [`Capability<C>`], the newest value granted capability `C`;
//! - [`Failure`](crate::Failure), the most recently published error.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::capability::Capability;
use crate::error::{ResolveError, ResolveResult};
use crate::value::{AnyValue, Injectable, TypeDescriptor, TypeKind};

/// A type that can be resolved from a [`Registry`](crate::Registry).
pub trait FromRegistry: Sized + Send + 'static {
    /// The descriptor the registry resolves for this parameter.
    fn input_descriptor() -> TypeDescriptor;

    /// Converts the resolved slot into the parameter value.
    ///
    /// `value` is `None` when the registry had nothing and did not
    /// construct anything.
    fn from_resolved(value: Option<AnyValue>) -> ResolveResult<Self>;
}

impl<T: Injectable> FromRegistry for T {
    fn input_descriptor() -> TypeDescriptor {
        T::descriptor()
    }

    fn from_resolved(value: Option<AnyValue>) -> ResolveResult<Self> {
        let value = value.ok_or_else(|| ResolveError::Missing(T::descriptor()))?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| ResolveError::Mismatch(T::descriptor()))
    }
}

impl<T: FromRegistry> FromRegistry for Option<T> {
    fn input_descriptor() -> TypeDescriptor {
        T::input_descriptor().into_optional()
    }

    fn from_resolved(value: Option<AnyValue>) -> ResolveResult<Self> {
        match value {
            Some(value) => T::from_resolved(Some(value)).map(Some),
            None => Ok(None),
        }
    }
}

impl<C: ?Sized + Send + Sync + 'static> FromRegistry for Capability<C> {
    fn input_descriptor() -> TypeDescriptor {
        TypeDescriptor::capability::<C>()
    }

    fn from_resolved(value: Option<AnyValue>) -> ResolveResult<Self> {
        let descriptor = TypeDescriptor::capability::<C>();
        let value = value.ok_or(ResolveError::Missing(descriptor))?;
        value
            .downcast_ref::<Arc<C>>()
            .cloned()
            .map(Capability)
            .ok_or(ResolveError::Mismatch(descriptor))
    }
}

/// The response slot: whatever the main handler last produced, or whatever
/// was last published as a [`Response`].
///
/// As a parameter it never fails; it is simply absent before anything has
/// produced a response. As a return value it replaces the slot, which lets
/// after handlers reshape the response.
#[derive(Clone, Default)]
pub struct Response(Option<AnyValue>);

impl Response {
    /// The "any" sentinel descriptor.
    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::with_kind::<Self>(TypeKind::Any)
    }

    /// Wraps `value`; nil and empty values give an absent response.
    pub fn new<T: Injectable>(value: T) -> Self {
        if value.is_nil() {
            return Self::absent();
        }
        Self(Some(Arc::new(value)))
    }

    pub fn absent() -> Self {
        Self(None)
    }

    pub(crate) fn from_value(value: Option<AnyValue>) -> Self {
        Self(value)
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    /// Returns `true` if the response holds a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_ref()?.downcast_ref::<T>()
    }

    /// Clones the response out as a `T`.
    pub fn get<T: Any + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }

    pub fn value(&self) -> Option<&AnyValue> {
        self.0.as_ref()
    }

    pub fn into_value(self) -> Option<AnyValue> {
        self.0
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("present", &self.is_present())
            .finish()
    }
}

impl FromRegistry for Response {
    fn input_descriptor() -> TypeDescriptor {
        Self::descriptor()
    }

    fn from_resolved(value: Option<AnyValue>) -> ResolveResult<Self> {
        Ok(Self::from_value(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Failure;

    #[derive(Clone, Debug, PartialEq)]
    struct Token(&'static str);
    impl Injectable for Token {}

    #[test]
    fn injectable_parameters_downcast() {
        let value: AnyValue = Arc::new(Token("abc"));
        assert_eq!(Token::from_resolved(Some(value)).unwrap(), Token("abc"));
        assert!(matches!(
            Token::from_resolved(None),
            Err(ResolveError::Missing(_))
        ));
        assert!(matches!(
            Token::from_resolved(Some(Arc::new(1u8))),
            Err(ResolveError::Mismatch(_))
        ));
    }

    #[test]
    fn optional_parameters_tolerate_absence() {
        assert_eq!(Option::<Token>::from_resolved(None).unwrap(), None);
        assert!(Option::<Token>::input_descriptor().is_optional());
        assert!(Option::<Failure>::input_descriptor().is_error());
    }

    #[test]
    fn response_parameters_never_fail() {
        let absent = Response::from_resolved(None).unwrap();
        assert!(absent.is_absent());

        let present = Response::from_resolved(Some(Arc::new("ok".to_string()))).unwrap();
        assert!(present.is::<String>());
        assert_eq!(present.get::<String>().as_deref(), Some("ok"));
        assert!(Response::input_descriptor().is_any());
    }

    #[test]
    fn empty_responses_are_absent() {
        assert!(Response::new(Vec::<u8>::new()).is_absent());
        assert!(Response::new(vec![1u8]).is_present());
    }
}
