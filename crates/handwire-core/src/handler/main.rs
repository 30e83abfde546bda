//! The main handler: produces the response.

use tracing::debug;

use super::{Adapter, Handler};
use crate::error::{Failure, ResolveError, SetupResult};
use crate::extract::Response;
use crate::registry::Registry;

/// The single handler that produces a chain's response.
///
/// Every input is resolved, constructing concrete types that nothing has
/// published yet. When that fails the handler is skipped and the failure is
/// left in the registry for after handlers. A handler whose capability or
/// error parameter has nothing to bind to is skipped without an error and
/// the response stays absent.
///
/// The first output becomes the response, unless the handler returns
/// nothing at all or nothing but an error, in which case the response is
/// absent.
#[derive(Debug, Clone)]
pub struct Main {
    adapter: Adapter,
}

impl Main {
    /// Wraps `handler`. On top of the input checks every role performs, an
    /// error output must come last.
    pub fn new<H, T>(handler: H) -> SetupResult<Self>
    where
        H: Handler<T>,
        T: 'static,
    {
        let adapter = Adapter::new(handler)?;
        adapter.signature().validate_outputs(adapter.name())?;
        Ok(Self { adapter })
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Runs the handler and assigns the response slot from its outcome.
    ///
    /// Returns the response the handler produced, or the error that
    /// prevented one. Either way the outcome has already been published and
    /// the slot is absent unless a response was produced.
    pub async fn run(&self, registry: &mut Registry) -> Result<Response, Failure> {
        let invocation = match self.adapter.invoke(registry).await {
            Ok(invocation) => invocation,
            Err(ResolveError::Missing(descriptor)) => {
                debug!(handler = self.adapter.name(), missing = %descriptor, "main handler skipped");
                registry.set_response(None);
                return Ok(Response::absent());
            }
            Err(err) => {
                registry.set_response(None);
                return Err(err.into());
            }
        };

        let response = invocation.response();
        registry.set_response(response.clone());

        match invocation.error() {
            Some(err) => {
                debug!(handler = self.adapter.name(), error = %err, "main handler failed");
                Err(err)
            }
            None => Ok(Response::from_value(response)),
        }
    }
}
