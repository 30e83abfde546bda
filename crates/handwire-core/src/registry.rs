//! The per-request resolution registry.
//!
//! A [`Registry`] holds every value that is available to handlers while one
//! request moves through its chain:
//!
//! - `by_type` keeps the most recent value of each concrete type (last write
//!   wins).
//! - `history` keeps every publish in order, so capability lookups can
//!   prefer the newest compatible value.
//! - `response` is the single "any" slot holding the current response.
//!
//! A registry is created per request, is never shared between requests and
//! needs no synchronization.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::capability::CapabilityTable;
use crate::config::ChainConfig;
use crate::construct::{Constructor, Exchange, Target};
use crate::error::{Failure, ResolveError, ResolveResult};
use crate::extract::FromRegistry;
use crate::value::{AnyValue, Injectable, TypeDescriptor, TypeKind, TypedValue};

/// Values available to handlers for one in-flight request.
pub struct Registry {
    by_type: HashMap<TypeId, TypedValue>,
    history: Vec<TypedValue>,
    response: Option<AnyValue>,
    exchange: Exchange,
    constructor: Arc<dyn Constructor>,
    capabilities: Arc<CapabilityTable>,
    trace_publishes: bool,
}

impl Registry {
    /// Creates a registry seeded with the request and response writer.
    pub fn new<R, W>(
        request: R,
        writer: W,
        constructor: Arc<dyn Constructor>,
        capabilities: Arc<CapabilityTable>,
    ) -> Self
    where
        R: Injectable,
        W: Injectable,
    {
        Self::with_config(
            request,
            writer,
            constructor,
            capabilities,
            &ChainConfig::default(),
        )
    }

    /// Like [`new`](Self::new), tuned by `config`.
    pub fn with_config<R, W>(
        request: R,
        writer: W,
        constructor: Arc<dyn Constructor>,
        capabilities: Arc<CapabilityTable>,
        config: &ChainConfig,
    ) -> Self
    where
        R: Injectable,
        W: Injectable,
    {
        let seed_request = !request.is_nil();
        let seed_writer = !writer.is_nil();
        let request: AnyValue = Arc::new(request);
        let writer: AnyValue = Arc::new(writer);
        let mut registry = Self {
            by_type: HashMap::new(),
            history: Vec::with_capacity(config.history_capacity),
            response: None,
            exchange: Exchange::new(request.clone(), writer.clone()),
            constructor,
            capabilities,
            trace_publishes: config.trace_publishes,
        };
        if seed_request {
            registry.seed(TypedValue::new(R::descriptor(), request));
        }
        if seed_writer {
            registry.seed(TypedValue::new(W::descriptor(), writer));
        }
        registry
    }

    /// Publishes a transport-level object. Same rules as [`publish`](Self::publish).
    pub fn seed(&mut self, value: TypedValue) {
        self.publish(value);
    }

    /// Stores `value` under its descriptor and appends it to the history.
    ///
    /// A value published under the "any" descriptor also becomes the
    /// response.
    pub fn publish(&mut self, value: TypedValue) {
        if self.trace_publishes {
            trace!(descriptor = ?value.descriptor(), "publish");
        }
        if value.descriptor().is_any() {
            self.response = Some(value.value().clone());
        }
        self.by_type.insert(value.descriptor().id(), value.clone());
        self.history.push(value);
    }

    /// Publishes a typed value. Nil and empty values are dropped.
    pub fn provide<T: Injectable>(&mut self, value: T) {
        if let Some(value) = TypedValue::of(value) {
            self.publish(value);
        }
    }

    /// Finds a value assignable to `descriptor` without constructing anything.
    pub fn lookup(&self, descriptor: &TypeDescriptor) -> Option<AnyValue> {
        match descriptor.kind() {
            TypeKind::Any => self.response.clone(),
            TypeKind::Concrete | TypeKind::Error => self
                .by_type
                .get(&descriptor.id())
                .map(|v| v.value().clone()),
            TypeKind::Capability => self
                .history
                .iter()
                .rev()
                .find_map(|v| self.capabilities.cast(v, descriptor)),
        }
    }

    /// Looks `descriptor` up and falls back to the constructor on a miss.
    ///
    /// Only concrete, non-optional types are constructed. Everything else
    /// (optional types, the response slot, capabilities and the error type)
    /// resolves to `None` when absent and publishes nothing. A construction
    /// failure is published as a [`Failure`] before it is returned.
    pub async fn resolve_or_construct(
        &mut self,
        descriptor: &TypeDescriptor,
    ) -> ResolveResult<Option<AnyValue>> {
        if let Some(value) = self.lookup(descriptor) {
            return Ok(Some(value));
        }
        if descriptor.is_optional() || descriptor.kind() != TypeKind::Concrete {
            return Ok(None);
        }

        let result = self.construct(descriptor).await;
        if let Err(err) = &result {
            self.provide(Failure::from(err.clone()));
        }
        result.map(Some)
    }

    /// Resolves `descriptors` in order, stopping at the first failure.
    pub async fn resolve_many(
        &mut self,
        descriptors: &[TypeDescriptor],
    ) -> ResolveResult<Vec<Option<AnyValue>>> {
        let mut values = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            values.push(self.resolve_or_construct(descriptor).await?);
        }
        Ok(values)
    }

    async fn construct(&self, descriptor: &TypeDescriptor) -> ResolveResult<AnyValue> {
        debug!(descriptor = %descriptor, "constructing");
        let mut target = Target::new(*descriptor);
        if let Err(cause) = self
            .constructor
            .construct(&self.exchange, &mut target)
            .await
        {
            return Err(ResolveError::Construction {
                descriptor: *descriptor,
                cause,
            });
        }
        target.take().ok_or(ResolveError::Unfilled(*descriptor))
    }

    /// Typed lookup, mostly useful once the chain has finished.
    pub fn get<T: FromRegistry>(&self) -> Option<T> {
        let descriptor = T::input_descriptor();
        T::from_resolved(self.lookup(&descriptor)).ok()
    }

    /// The most recently published error, if any.
    pub fn error(&self) -> Option<Failure> {
        self.get::<Failure>()
    }

    /// The current response slot.
    pub fn response(&self) -> Option<&AnyValue> {
        self.response.as_ref()
    }

    /// Replaces the response slot without touching the rest of the registry.
    pub(crate) fn set_response(&mut self, response: Option<AnyValue>) {
        self.response = response;
    }

    /// The request and response writer this registry was seeded with.
    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    /// Every publish so far, oldest first.
    pub fn history(&self) -> &[TypedValue] {
        &self.history
    }

    /// Returns `true` if a value of exactly `descriptor`'s type is present.
    pub fn contains(&self, descriptor: &TypeDescriptor) -> bool {
        self.by_type.contains_key(&descriptor.id())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.by_type.len())
            .field("history", &self.history.len())
            .field("has_response", &self.response.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::capability::Capability;
    use crate::construct::{NoConstructor, constructor_fn};
    use crate::extract::Response;

    #[derive(Clone, Debug, PartialEq)]
    struct Request(&'static str);
    impl Injectable for Request {}

    #[derive(Clone, Debug, PartialEq)]
    struct Writer;
    impl Injectable for Writer {}

    #[derive(Clone, Debug, PartialEq)]
    struct Session(u32);
    impl Injectable for Session {}

    trait Shape: Send + Sync {
        fn sides(&self) -> u32;
    }

    #[derive(Clone)]
    struct Triangle;
    impl Injectable for Triangle {}
    impl Shape for Triangle {
        fn sides(&self) -> u32 {
            3
        }
    }

    #[derive(Clone)]
    struct Square;
    impl Injectable for Square {}
    impl Shape for Square {
        fn sides(&self) -> u32 {
            4
        }
    }

    fn registry_with(constructor: Arc<dyn Constructor>) -> Registry {
        let capabilities = CapabilityTable::new()
            .grant::<Triangle, dyn Shape>(|v| v)
            .grant::<Square, dyn Shape>(|v| v);
        Registry::new(
            Request("/"),
            Writer,
            constructor,
            Arc::new(capabilities),
        )
    }

    fn registry() -> Registry {
        registry_with(Arc::new(NoConstructor))
    }

    #[test]
    fn seeds_request_and_writer() {
        let registry = registry();
        assert!(registry.contains(&Request::descriptor()));
        assert!(registry.contains(&Writer::descriptor()));
        assert_eq!(registry.get::<Request>(), Some(Request("/")));
        assert_eq!(registry.exchange().request::<Request>(), Some(&Request("/")));
        assert_eq!(registry.history().len(), 2);
    }

    #[test]
    fn last_write_wins() {
        let mut registry = registry();
        registry.provide(Session(1));
        registry.provide(Session(2));
        assert_eq!(registry.get::<Session>(), Some(Session(2)));
    }

    #[test]
    fn capability_lookup_prefers_the_newest_value() {
        let mut registry = registry();
        registry.provide(Triangle);
        registry.provide(Square);

        let shape = registry.get::<Capability<dyn Shape>>().unwrap();
        assert_eq!(shape.sides(), 4);

        registry.provide(Triangle);
        let shape = registry.get::<Capability<dyn Shape>>().unwrap();
        assert_eq!(shape.sides(), 3);
    }

    #[test]
    fn capability_lookup_misses_without_grants() {
        let registry = registry();
        assert!(registry.get::<Capability<dyn Shape>>().is_none());
    }

    #[test]
    fn nil_and_empty_values_are_suppressed() {
        let mut registry = registry();
        registry.provide(vec![Session(1)]);
        registry.provide(Vec::<Session>::new());
        registry.provide(HashMap::<String, u32>::new());
        assert_eq!(registry.get::<Vec<Session>>(), Some(vec![Session(1)]));
        assert!(registry.get::<HashMap<String, u32>>().is_none());
        assert_eq!(registry.history().len(), 3);
    }

    #[test]
    fn response_slot_tracks_any_publishes() {
        let mut registry = registry();
        assert!(registry.get::<Response>().unwrap().is_absent());

        registry.publish(TypedValue::new(Response::descriptor(), Arc::new(7u32)));
        registry.publish(TypedValue::new(
            Response::descriptor(),
            Arc::new("done".to_string()),
        ));
        let response = registry.get::<Response>().unwrap();
        assert_eq!(response.get::<String>(), Some("done".to_string()));
        assert!(response.get::<u32>().is_none());
    }

    #[tokio::test]
    async fn construction_runs_once_per_miss() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = registry_with(Arc::new(constructor_fn(move |_, target| {
            counter.fetch_add(1, Ordering::SeqCst);
            target.fill(Session(9))
        })));

        let value = registry
            .resolve_or_construct(&Session::descriptor())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value.downcast_ref::<Session>(), Some(&Session(9)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Seeded values never reach the constructor.
        registry
            .resolve_or_construct(&Request::descriptor())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn construction_failures_are_published() {
        let mut registry = registry();
        let err = registry
            .resolve_or_construct(&Session::descriptor())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Construction { .. }));

        let published = registry.error().expect("failure published");
        assert!(published.is::<ResolveError>());
    }

    #[tokio::test]
    async fn unfilled_targets_fail() {
        let mut registry = registry_with(Arc::new(constructor_fn(|_, _| Ok(()))));
        let err = registry
            .resolve_or_construct(&Session::descriptor())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Unfilled(_)));
    }

    #[tokio::test]
    async fn optional_and_capability_types_are_never_constructed() {
        let mut registry = registry_with(Arc::new(constructor_fn(|_, _| {
            panic!("constructor must not run")
        })));

        let optional = Session::descriptor().into_optional();
        assert!(registry.resolve_or_construct(&optional).await.unwrap().is_none());

        let capability = TypeDescriptor::capability::<dyn Shape>();
        assert!(registry.resolve_or_construct(&capability).await.unwrap().is_none());

        let error = Failure::descriptor();
        assert!(registry.resolve_or_construct(&error).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unmet_capability_and_error_types_publish_nothing() {
        let mut registry = registry();
        let before = registry.history().len();

        registry
            .resolve_many(&[
                TypeDescriptor::capability::<dyn Shape>(),
                Failure::descriptor(),
            ])
            .await
            .unwrap();

        assert!(registry.error().is_none());
        assert_eq!(registry.history().len(), before);
    }

    #[test]
    fn capability_lookup_skips_newer_ungranted_values() {
        let mut registry = registry();
        registry.provide(Triangle);
        registry.provide(Session(1));
        registry.provide("newest".to_string());

        let shape = registry.get::<Capability<dyn Shape>>().unwrap();
        assert_eq!(shape.sides(), 3);
    }

    #[tokio::test]
    async fn resolve_many_stops_at_the_first_failure() {
        let mut registry = registry();
        registry.provide(Session(3));
        let err = registry
            .resolve_many(&[
                Session::descriptor(),
                Triangle::descriptor(),
                Square::descriptor(),
            ])
            .await
            .unwrap_err();
        assert_eq!(err.descriptor(), &Triangle::descriptor());

        let values = registry
            .resolve_many(&[Session::descriptor(), Request::descriptor()])
            .await
            .unwrap();
        assert_eq!(values.len(), 2);
    }
}
