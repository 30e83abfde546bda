//! Handler return values.
//!
//! A handler's return type is split into an ordered list of outputs, each
//! published into the registry under its declared descriptor:
//!
//! | Return type            | Outputs                         |
//! |------------------------|---------------------------------|
//! | `()`                   | none                            |
//! | `T: Injectable`        | `T`                             |
//! | `Option<T>`            | `T`, dropped when `None`        |
//! | [`Response`]           | the "any" slot                  |
//! | `(A, B)`, `(A, B, C)`… | each element in order           |
//! | `Result<T, E>`         | the outputs of `T`, then error  |
//!
//! `Result<(), E>` therefore declares exactly one output, the error.

use std::sync::Arc;

use crate::error::Failure;
use crate::extract::Response;
use crate::value::{AnyValue, Injectable, TypeDescriptor};

/// A single returned value.
pub trait IntoOutput: Send + 'static {
    fn output_descriptor() -> TypeDescriptor;

    /// Erases the value. `None` means nothing is published.
    fn into_value(self) -> Option<AnyValue>;
}

impl<T: Injectable> IntoOutput for T {
    fn output_descriptor() -> TypeDescriptor {
        T::descriptor()
    }

    fn into_value(self) -> Option<AnyValue> {
        if self.is_nil() {
            return None;
        }
        Some(Arc::new(self))
    }
}

impl<T: Injectable> IntoOutput for Option<T> {
    fn output_descriptor() -> TypeDescriptor {
        T::descriptor()
    }

    fn into_value(self) -> Option<AnyValue> {
        self.and_then(IntoOutput::into_value)
    }
}

impl IntoOutput for Response {
    fn output_descriptor() -> TypeDescriptor {
        Response::descriptor()
    }

    fn into_value(self) -> Option<AnyValue> {
        Response::into_value(self)
    }
}

/// The full return value of a handler, as an ordered list of outputs.
pub trait IntoOutputs: Send + 'static {
    fn output_descriptors() -> Vec<TypeDescriptor>;

    /// One entry per descriptor, `None` for nil or missing outputs.
    fn into_values(self) -> Vec<Option<AnyValue>>;
}

impl IntoOutputs for () {
    fn output_descriptors() -> Vec<TypeDescriptor> {
        Vec::new()
    }

    fn into_values(self) -> Vec<Option<AnyValue>> {
        Vec::new()
    }
}

impl<T: IntoOutput> IntoOutputs for T {
    fn output_descriptors() -> Vec<TypeDescriptor> {
        vec![T::output_descriptor()]
    }

    fn into_values(self) -> Vec<Option<AnyValue>> {
        vec![IntoOutput::into_value(self)]
    }
}

impl<T, E> IntoOutputs for Result<T, E>
where
    T: IntoOutputs,
    E: Into<Failure> + Send + 'static,
{
    fn output_descriptors() -> Vec<TypeDescriptor> {
        let mut descriptors = T::output_descriptors();
        descriptors.push(Failure::descriptor());
        descriptors
    }

    fn into_values(self) -> Vec<Option<AnyValue>> {
        match self {
            Ok(value) => {
                let mut values = value.into_values();
                values.push(None);
                values
            }
            Err(err) => {
                let mut values = vec![None; T::output_descriptors().len()];
                let failure: Failure = err.into();
                let failure: AnyValue = Arc::new(failure);
                values.push(Some(failure));
                values
            }
        }
    }
}

macro_rules! impl_into_outputs {
    ($($ty:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($ty,)+> IntoOutputs for ($($ty,)+)
        where
            $( $ty: IntoOutput, )+
        {
            fn output_descriptors() -> Vec<TypeDescriptor> {
                vec![$( $ty::output_descriptor(), )+]
            }

            fn into_values(self) -> Vec<Option<AnyValue>> {
                let ($($ty,)+) = self;
                vec![$( IntoOutput::into_value($ty), )+]
            }
        }
    };
}

impl_into_outputs!(T1, T2);
impl_into_outputs!(T1, T2, T3);
impl_into_outputs!(T1, T2, T3, T4);
