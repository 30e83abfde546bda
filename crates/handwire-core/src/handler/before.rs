//! Before handlers: pre-processing that may short-circuit the chain.

use tracing::debug;

use super::{Adapter, Handler};
use crate::error::{Failure, ResolveError, SetupResult};
use crate::registry::Registry;

/// A pre-processing handler.
///
/// Its inputs are looked up first and constructed on a miss; a
/// [`Response`](crate::Response) parameter receives the current response
/// slot. A returned error, or a failure to construct an input, aborts the
/// remaining before handlers and skips the main handler. After handlers
/// still run and can resolve the error. A handler whose capability or error
/// parameter has nothing to bind to is skipped and the chain goes on.
#[derive(Debug, Clone)]
pub struct Before {
    adapter: Adapter,
}

impl Before {
    pub fn new<H, T>(handler: H) -> SetupResult<Self>
    where
        H: Handler<T>,
        T: 'static,
    {
        Ok(Self {
            adapter: Adapter::new(handler)?,
        })
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Runs the handler. `Err` means the chain must stop.
    ///
    /// The error has already been published into `registry` when this
    /// returns.
    pub async fn run(&self, registry: &mut Registry) -> Result<(), Failure> {
        let invocation = match self.adapter.invoke(registry).await {
            Ok(invocation) => invocation,
            Err(ResolveError::Missing(descriptor)) => {
                debug!(handler = self.adapter.name(), missing = %descriptor, "before handler skipped");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        match invocation.error() {
            Some(err) => {
                debug!(handler = self.adapter.name(), error = %err, "before handler aborted the chain");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::capability::{Capability, CapabilityTable};
    use crate::construct::{ConstructorMap, NoConstructor};
    use crate::extract::Response;
    use crate::value::Injectable;

    #[derive(Clone, Debug, PartialEq)]
    struct Request(&'static str);
    impl Injectable for Request {}

    #[derive(Clone, Debug, PartialEq)]
    struct Writer;
    impl Injectable for Writer {}

    #[derive(Clone, Debug, PartialEq)]
    struct Empty;
    impl Injectable for Empty {}

    fn registry() -> Registry {
        let constructors = ConstructorMap::new().with(|_| Ok(Empty));
        Registry::new(
            Request("/test"),
            Writer,
            Arc::new(constructors),
            Arc::new(CapabilityTable::new()),
        )
    }

    #[tokio::test]
    async fn simple() {
        let mut registry = registry();
        let before = Before::new(|req: Request, _rw: Writer, _in: Empty| async move {
            assert_eq!(req, Request("/test"));
            Ok::<_, Failure>(())
        })
        .unwrap();

        before.run(&mut registry).await.unwrap();
    }

    #[tokio::test]
    async fn returned_errors_are_visible_to_later_handlers() {
        let mut registry = registry();

        let failing = Before::new(|response: Response| async move {
            assert!(response.is_absent());
            Err::<(), _>(Failure::msg("error"))
        })
        .unwrap();
        assert!(failing.run(&mut registry).await.is_err());

        let observing = Before::new(|err: Failure| async move {
            assert_eq!(err.to_string(), "error");
            Ok::<_, Failure>(())
        })
        .unwrap();
        observing.run(&mut registry).await.unwrap();
    }

    #[tokio::test]
    async fn unresolvable_inputs_abort() {
        let mut registry = Registry::new(
            Request("/"),
            Writer,
            Arc::new(NoConstructor),
            Arc::new(CapabilityTable::new()),
        );
        let before = Before::new(|_in: Empty| async {}).unwrap();
        assert!(before.run(&mut registry).await.is_err());
        assert!(registry.error().is_some());
    }

    #[tokio::test]
    async fn handlers_without_outputs_pass() {
        let mut registry = registry();
        let before = Before::new(|| async {}).unwrap();
        assert!(before.run(&mut registry).await.is_ok());
    }

    #[tokio::test]
    async fn unmet_capabilities_skip_without_aborting() {
        trait Auth: Send + Sync {}

        let mut registry = registry();
        let before = Before::new(|_auth: Capability<dyn Auth>| async {
            Err::<(), _>(Failure::msg("must not run"))
        })
        .unwrap();

        assert!(before.run(&mut registry).await.is_ok());
        assert!(registry.error().is_none());
    }

    #[tokio::test]
    async fn error_parameters_without_an_error_are_skipped() {
        let mut registry = registry();
        let before = Before::new(|_err: Failure| async {
            Err::<(), _>(Failure::msg("must not run"))
        })
        .unwrap();

        assert!(before.run(&mut registry).await.is_ok());
        assert!(registry.error().is_none());
    }
}
