//! The chain orchestrator.
//!
//! A [`Chain`] is assembled once and then run once per request. Each run
//! creates a fresh [`Registry`], seeds it with the request and response
//! writer and walks the handlers:
//!
//! 1. Before handlers in registration order, stopping at the first error
//! 2. The main handler, unless a before handler stopped the chain
//! 3. Every after handler in registration order, unconditionally
//!
//! ```rust,ignore
//! use handwire_core::{Chain, ConstructorMap, Failure, Response};
//!
//! let chain = Chain::new(|user: User| async move { Ok::<_, Failure>(user.name) })?
//!     .before(|req: Request| async move { authorize(&req) })?
//!     .after(|response: Response, rw: Recorder| async move { rw.write(response) })?
//!     .constructor(ConstructorMap::new().with(User::from_exchange));
//!
//! let registry = chain.run(request, recorder).await;
//! ```

use std::sync::Arc;

use tracing::{Instrument, Level, debug, span};

use crate::capability::CapabilityTable;
use crate::config::ChainConfig;
use crate::construct::{Constructor, NoConstructor};
use crate::error::SetupResult;
use crate::handler::{After, Before, Handler, Main};
use crate::registry::Registry;
use crate::value::Injectable;

/// An ordered before, main and after handler sequence.
///
/// Cloning a chain is cheap; clones share the constructor and the
/// capability table.
#[derive(Clone)]
pub struct Chain {
    before: Vec<Before>,
    main: Main,
    after: Vec<After>,
    constructor: Arc<dyn Constructor>,
    capabilities: Arc<CapabilityTable>,
    config: ChainConfig,
}

impl Chain {
    /// Creates a chain around its main handler.
    ///
    /// Fails if the handler's signature is invalid.
    pub fn new<H, T>(main: H) -> SetupResult<Self>
    where
        H: Handler<T>,
        T: 'static,
    {
        Ok(Self {
            before: Vec::new(),
            main: Main::new(main)?,
            after: Vec::new(),
            constructor: Arc::new(NoConstructor),
            capabilities: Arc::new(CapabilityTable::new()),
            config: ChainConfig::default(),
        })
    }

    /// Appends a before handler.
    pub fn before<H, T>(mut self, handler: H) -> SetupResult<Self>
    where
        H: Handler<T>,
        T: 'static,
    {
        self.before.push(Before::new(handler)?);
        Ok(self)
    }

    /// Appends an after handler.
    pub fn after<H, T>(mut self, handler: H) -> SetupResult<Self>
    where
        H: Handler<T>,
        T: 'static,
    {
        self.after.push(After::new(handler)?);
        Ok(self)
    }

    /// Sets the constructor consulted for missing concrete values.
    pub fn constructor<C: Constructor>(mut self, constructor: C) -> Self {
        self.constructor = Arc::new(constructor);
        self
    }

    /// Sets the capability grants used by capability parameters.
    pub fn capabilities(mut self, capabilities: CapabilityTable) -> Self {
        self.capabilities = Arc::new(capabilities);
        self
    }

    pub fn config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    pub fn before_count(&self) -> usize {
        self.before.len()
    }

    pub fn after_count(&self) -> usize {
        self.after.len()
    }

    /// Creates the registry a run of this chain starts from.
    pub fn registry<R, W>(&self, request: R, writer: W) -> Registry
    where
        R: Injectable,
        W: Injectable,
    {
        Registry::with_config(
            request,
            writer,
            self.constructor.clone(),
            self.capabilities.clone(),
            &self.config,
        )
    }

    /// Runs the chain for one request and returns the final registry.
    pub async fn run<R, W>(&self, request: R, writer: W) -> Registry
    where
        R: Injectable,
        W: Injectable,
    {
        let mut registry = self.registry(request, writer);
        self.run_with(&mut registry).await;
        registry
    }

    /// Runs the chain against an already seeded registry.
    pub async fn run_with(&self, registry: &mut Registry) {
        let span = span!(
            Level::DEBUG,
            "chain",
            main = self.main.adapter().name(),
            before = self.before.len(),
            after = self.after.len(),
        );
        self.walk(registry).instrument(span).await
    }

    async fn walk(&self, registry: &mut Registry) {
        let mut aborted = false;
        for (index, before) in self.before.iter().enumerate() {
            if before.run(registry).await.is_err() {
                debug!(index, "before handler stopped the chain");
                aborted = true;
                break;
            }
        }

        if !aborted {
            if let Err(err) = self.main.run(registry).await {
                debug!(error = %err, "main handler produced no response");
            }
        }

        for after in &self.after {
            after.run(registry).await;
        }
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("before", &self.before.len())
            .field("main", &self.main.adapter().name())
            .field("after", &self.after.len())
            .field("capabilities", &self.capabilities.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::capability::Capability;
    use crate::construct::{ConstructorMap, constructor_fn};
    use crate::error::{Failure, ResolveError, SetupError};
    use crate::extract::Response;

    #[derive(Clone, Debug, PartialEq)]
    struct Request(&'static str);
    impl Injectable for Request {}

    #[derive(Clone, Debug, Default)]
    struct Writer {
        body: Arc<Mutex<Vec<String>>>,
    }
    impl Injectable for Writer {}

    #[derive(Clone, Debug, PartialEq)]
    struct Custom;
    impl Injectable for Custom {}

    #[derive(Clone, Debug, PartialEq)]
    struct Session(u32);
    impl Injectable for Session {}

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn mark(log: &Log, entry: &'static str) {
        log.lock().push(entry);
    }

    #[tokio::test]
    async fn end_to_end() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();

        let chain = Chain::new(|| async { Ok::<_, Failure>("ok".to_string()) })
            .unwrap()
            .before(|req: Request, _rw: Writer, _custom: Custom| async move {
                assert_eq!(req, Request("/"));
                Ok::<_, Failure>(())
            })
            .unwrap()
            .after(move |response: Response| {
                let sink = sink.clone();
                async move {
                    *sink.lock() = response.get::<String>();
                    Ok::<_, Failure>(())
                }
            })
            .unwrap()
            .constructor(ConstructorMap::new().with(|_| Ok(Custom)));

        let registry = chain.run(Request("/"), Writer::default()).await;
        assert_eq!(seen.lock().as_deref(), Some("ok"));
        assert!(registry.error().is_none());
    }

    #[tokio::test]
    async fn before_errors_short_circuit() {
        let log: Log = Arc::default();
        let (b1, b2, main, after) = (log.clone(), log.clone(), log.clone(), log.clone());

        let chain = Chain::new(move || {
            let log = main.clone();
            async move { mark(&log, "main") }
        })
        .unwrap()
        .before(move || {
            let log = b1.clone();
            async move {
                mark(&log, "b1");
                Err::<(), _>(Failure::msg("denied"))
            }
        })
        .unwrap()
        .before(move || {
            let log = b2.clone();
            async move { mark(&log, "b2") }
        })
        .unwrap()
        .after(move |err: Failure| {
            let log = after.clone();
            async move {
                assert_eq!(err.to_string(), "denied");
                mark(&log, "after");
            }
        })
        .unwrap();

        chain.run(Request("/"), Writer::default()).await;
        assert_eq!(*log.lock(), vec!["b1", "after"]);
    }

    #[tokio::test]
    async fn error_only_main_leaves_the_response_absent() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();

        let chain = Chain::new(|| async { Err::<(), _>(Failure::msg("boom")) })
            .unwrap()
            .after(move |response: Response, err: Option<Failure>| {
                let sink = sink.clone();
                async move {
                    *sink.lock() = Some((response.is_absent(), err.map(|e| e.to_string())));
                }
            })
            .unwrap();

        let registry = chain.run(Request("/"), Writer::default()).await;
        assert_eq!(*seen.lock(), Some((true, Some("boom".to_string()))));
        assert!(registry.response().is_none());
    }

    #[tokio::test]
    async fn construction_fallback_runs_once_and_failures_are_kept() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let constructor = constructor_fn(move |_, target| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Failure::msg(format!("cannot build {}", target.descriptor())))
        });

        let chain = Chain::new(|session: Session| async move { session.0 })
            .unwrap()
            .constructor(constructor);

        let registry = chain.run(Request("/"), Writer::default()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.response().is_none());

        let err = registry.error().unwrap();
        let cause = err.downcast_ref::<ResolveError>().unwrap();
        assert_eq!(cause.descriptor(), &Session::descriptor());
    }

    #[tokio::test]
    async fn constructed_values_are_built_per_parameter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let chain = Chain::new(|a: Session, b: Session| async move { a.0 + b.0 })
            .unwrap()
            .constructor(ConstructorMap::new().with(move |_| {
                Ok(Session(counter.fetch_add(1, Ordering::SeqCst) as u32 + 1))
            }));

        let registry = chain.run(Request("/"), Writer::default()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.get::<u32>(), Some(3));
    }

    #[tokio::test]
    async fn before_outputs_feed_main() {
        let chain = Chain::new(|session: Session| async move { format!("session {}", session.0) })
            .unwrap()
            .before(|| async { Session(42) })
            .unwrap();

        let registry = chain.run(Request("/"), Writer::default()).await;
        assert_eq!(
            registry.response().and_then(|v| v.downcast_ref::<String>()).map(String::as_str),
            Some("session 42")
        );
    }

    #[tokio::test]
    async fn after_handlers_write_through_the_writer() {
        let chain = Chain::new(|req: Request| async move { req.0.to_uppercase() })
            .unwrap()
            .after(|response: Response, rw: Writer| async move {
                if let Some(body) = response.get::<String>() {
                    rw.body.lock().push(body);
                }
            })
            .unwrap()
            .after(|rw: Writer| async move { rw.body.lock().push("done".to_string()) })
            .unwrap();

        let writer = Writer::default();
        chain.run(Request("/echo"), writer.clone()).await;
        assert_eq!(*writer.body.lock(), vec!["/ECHO".to_string(), "done".to_string()]);
    }

    #[tokio::test]
    async fn capability_parameters_use_the_newest_grant() {
        trait Greeter: Send + Sync {
            fn greet(&self) -> String;
        }

        #[derive(Clone)]
        struct English;
        impl Injectable for English {}
        impl Greeter for English {
            fn greet(&self) -> String {
                "hello".into()
            }
        }

        #[derive(Clone)]
        struct French;
        impl Injectable for French {}
        impl Greeter for French {
            fn greet(&self) -> String {
                "bonjour".into()
            }
        }

        let table = CapabilityTable::new()
            .grant::<English, dyn Greeter>(|v| v)
            .grant::<French, dyn Greeter>(|v| v);

        let chain = Chain::new(|greeter: Capability<dyn Greeter>| async move { greeter.greet() })
            .unwrap()
            .before(|| async { English })
            .unwrap()
            .before(|| async { French })
            .unwrap()
            .capabilities(table);

        let registry = chain.run(Request("/"), Writer::default()).await;
        assert_eq!(registry.get::<String>().as_deref(), Some("bonjour"));
    }

    #[tokio::test]
    async fn error_finalizers_stay_quiet_on_success() {
        let log: Log = Arc::default();
        let (on_error, observer) = (log.clone(), log.clone());

        let chain = Chain::new(|| async { Ok::<_, Failure>("ok".to_string()) })
            .unwrap()
            .after(move |_err: Failure| {
                let log = on_error.clone();
                async move { mark(&log, "on_error") }
            })
            .unwrap()
            .after(move |err: Option<Failure>| {
                let log = observer.clone();
                async move { mark(&log, if err.is_none() { "no_error" } else { "error" }) }
            })
            .unwrap();

        let registry = chain.run(Request("/"), Writer::default()).await;
        assert_eq!(*log.lock(), vec!["no_error"]);
        assert!(registry.error().is_none());
        assert_eq!(registry.get::<String>().as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn ungranted_before_capabilities_do_not_stop_main() {
        trait Auth: Send + Sync {}

        let chain = Chain::new(|| async { "ran".to_string() })
            .unwrap()
            .before(|_auth: Capability<dyn Auth>| async {
                Err::<(), _>(Failure::msg("must not run"))
            })
            .unwrap();

        let registry = chain.run(Request("/"), Writer::default()).await;
        assert_eq!(registry.get::<String>().as_deref(), Some("ran"));
        assert!(registry.error().is_none());
    }

    #[test]
    fn invalid_handlers_are_rejected_at_setup() {
        let err = Chain::new(|| async {})
            .unwrap()
            .after(|_a: Response, _b: Response| async {})
            .unwrap_err();
        assert!(matches!(err, SetupError::MultipleAny { .. }));
    }
}
