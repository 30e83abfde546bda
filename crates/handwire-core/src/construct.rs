//! The constructor collaborator.
//!
//! When a handler needs a concrete value that nothing has published yet, the
//! registry asks its [`Constructor`] to build one. The constructor sees the
//! request and response writer through an [`Exchange`] and fills a
//! [`Target`] for the requested type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Failure;
use crate::value::{AnyValue, Injectable, TypeDescriptor};

/// The transport objects a request was seeded with.
#[derive(Clone)]
pub struct Exchange {
    request: AnyValue,
    writer: AnyValue,
}

impl Exchange {
    pub(crate) fn new(request: AnyValue, writer: AnyValue) -> Self {
        Self { request, writer }
    }

    /// Borrows the request as `R`, if that is its type.
    pub fn request<R: Any>(&self) -> Option<&R> {
        self.request.downcast_ref::<R>()
    }

    /// Borrows the response writer as `W`, if that is its type.
    pub fn writer<W: Any>(&self) -> Option<&W> {
        self.writer.downcast_ref::<W>()
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange").finish_non_exhaustive()
    }
}

/// The slot a constructor must fill.
pub struct Target {
    descriptor: TypeDescriptor,
    value: Option<AnyValue>,
}

impl Target {
    pub(crate) fn new(descriptor: TypeDescriptor) -> Self {
        Self {
            descriptor,
            value: None,
        }
    }

    /// The type being requested.
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Returns `true` if the requested type is `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.descriptor.id() == TypeId::of::<T>()
    }

    /// Fills the target. Fails if `T` is not the requested type.
    pub fn fill<T: Injectable>(&mut self, value: T) -> Result<(), Failure> {
        if !self.is::<T>() {
            return Err(Failure::msg(format!(
                "constructor filled `{}` with a `{}`",
                self.descriptor,
                std::any::type_name::<T>()
            )));
        }
        self.value = Some(Arc::new(value));
        Ok(())
    }

    pub fn is_filled(&self) -> bool {
        self.value.is_some()
    }

    pub(crate) fn take(self) -> Option<AnyValue> {
        self.value
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("descriptor", &self.descriptor)
            .field("filled", &self.is_filled())
            .finish()
    }
}

/// Builds concrete values on demand when resolution misses.
///
/// Implementations may perform I/O; the chain awaits them on the request's
/// task.
#[async_trait]
pub trait Constructor: Send + Sync + 'static {
    /// Fill `target` with a fresh value of the requested type, or fail.
    async fn construct(&self, exchange: &Exchange, target: &mut Target) -> Result<(), Failure>;
}

#[async_trait]
impl<C: Constructor + ?Sized> Constructor for Arc<C> {
    async fn construct(&self, exchange: &Exchange, target: &mut Target) -> Result<(), Failure> {
        (**self).construct(exchange, target).await
    }
}

/// A constructor that cannot build anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConstructor;

#[async_trait]
impl Constructor for NoConstructor {
    async fn construct(&self, _exchange: &Exchange, target: &mut Target) -> Result<(), Failure> {
        Err(Failure::msg(format!(
            "no constructor available for `{}`",
            target.descriptor()
        )))
    }
}

/// Adapts a synchronous closure into a [`Constructor`].
#[derive(Clone)]
pub struct ConstructorFn<F> {
    f: F,
}

impl<F> ConstructorFn<F>
where
    F: Fn(&Exchange, &mut Target) -> Result<(), Failure> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Constructor for ConstructorFn<F>
where
    F: Fn(&Exchange, &mut Target) -> Result<(), Failure> + Send + Sync + 'static,
{
    async fn construct(&self, exchange: &Exchange, target: &mut Target) -> Result<(), Failure> {
        (self.f)(exchange, target)
    }
}

/// Wraps `f` as a constructor.
pub fn constructor_fn<F>(f: F) -> ConstructorFn<F>
where
    F: Fn(&Exchange, &mut Target) -> Result<(), Failure> + Send + Sync + 'static,
{
    ConstructorFn::new(f)
}

type Factory = Arc<dyn Fn(&Exchange) -> Result<AnyValue, Failure> + Send + Sync>;

/// Per-type factories, keyed by the type they build.
///
/// ```rust,ignore
/// let constructors = ConstructorMap::new()
///     .with(|exchange| {
///         let req = exchange.request::<Request>().ok_or_else(|| Failure::msg("no request"))?;
///         Ok(Query::parse(&req.uri))
///     });
/// ```
#[derive(Clone, Default)]
pub struct ConstructorMap {
    factories: HashMap<TypeId, Factory>,
}

impl ConstructorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the factory for `T`, replacing any previous one.
    pub fn with<T, F>(mut self, factory: F) -> Self
    where
        T: Injectable,
        F: Fn(&Exchange) -> Result<T, Failure> + Send + Sync + 'static,
    {
        let erased: Factory = Arc::new(move |exchange: &Exchange| {
            let value: AnyValue = Arc::new(factory(exchange)?);
            Ok(value)
        });
        self.factories.insert(TypeId::of::<T>(), erased);
        self
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.factories.contains_key(&id)
    }
}

impl fmt::Debug for ConstructorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorMap")
            .field("factories", &self.factories.len())
            .finish()
    }
}

#[async_trait]
impl Constructor for ConstructorMap {
    async fn construct(&self, exchange: &Exchange, target: &mut Target) -> Result<(), Failure> {
        let Some(factory) = self.factories.get(&target.descriptor().id()) else {
            return Err(Failure::msg(format!(
                "no factory registered for `{}`",
                target.descriptor()
            )));
        };
        target.value = Some(factory(exchange)?);
        Ok(())
    }
}
