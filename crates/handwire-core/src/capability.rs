//! Capability sets: trait-object lookups over published values.
//!
//! A handler that only cares about a behavior declares a [`Capability`]
//! parameter instead of a concrete type:
//!
//! ```rust,ignore
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! async fn hello(greeter: Capability<dyn Greeter>) -> String {
//!     greeter.greet()
//! }
//! ```
//!
//! Which concrete types satisfy which capability is an explicit table
//! rather than a structural check. Grants are registered once, when the
//! chain is built:
//!
//! ```rust,ignore
//! let table = CapabilityTable::new()
//!     .grant::<English, dyn Greeter>(|v| v)
//!     .grant::<French, dyn Greeter>(|v| v);
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::value::{AnyValue, Injectable, TypeDescriptor, TypedValue};

type Cast = Arc<dyn Fn(AnyValue) -> Option<AnyValue> + Send + Sync>;

/// Explicit `(concrete type, capability)` grants.
#[derive(Clone, Default)]
pub struct CapabilityTable {
    grants: HashMap<(TypeId, TypeId), Cast>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares that values of type `T` satisfy capability `C`.
    ///
    /// `cast` is usually the identity closure `|v| v`, relying on the
    /// unsizing coercion from `Arc<T>` to `Arc<C>`.
    pub fn grant<T, C>(mut self, cast: fn(Arc<T>) -> Arc<C>) -> Self
    where
        T: Injectable,
        C: ?Sized + Send + Sync + 'static,
    {
        let erased: Cast = Arc::new(move |value: AnyValue| {
            let concrete = value.downcast::<T>().ok()?;
            let capability: AnyValue = Arc::new(cast(concrete));
            Some(capability)
        });
        self.grants
            .insert((TypeId::of::<T>(), TypeId::of::<C>()), erased);
        self
    }

    /// Returns `true` if values of `concrete` satisfy `capability`.
    pub fn satisfies(&self, concrete: TypeId, capability: TypeId) -> bool {
        self.grants.contains_key(&(concrete, capability))
    }

    /// Views `value` as `capability`, if a grant exists for its runtime type.
    pub fn cast(&self, value: &TypedValue, capability: &TypeDescriptor) -> Option<AnyValue> {
        let cast = self
            .grants
            .get(&(value.value_type_id(), capability.id()))?;
        cast(value.value().clone())
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityTable")
            .field("grants", &self.grants.len())
            .finish()
    }
}

/// A handler parameter satisfied by the most recently published value that
/// has a grant for capability `C`.
pub struct Capability<C: ?Sized>(pub Arc<C>);

impl<C: ?Sized> Capability<C> {
    pub fn into_inner(self) -> Arc<C> {
        self.0
    }
}

impl<C: ?Sized> Clone for Capability<C> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<C: ?Sized> Deref for Capability<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.0
    }
}

impl<C: ?Sized> fmt::Debug for Capability<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Capability")
            .field(&std::any::type_name::<C>())
            .finish()
    }
}
