//! After handlers: best-effort finalizers.

use tracing::{debug, warn};

use super::{Adapter, Handler};
use crate::error::{ResolveError, SetupResult};
use crate::registry::Registry;

/// A post-processing handler.
///
/// After handlers always run, in registration order, whether the main
/// handler succeeded, failed or was skipped. A [`Response`](crate::Response)
/// parameter sees the current response slot and a
/// [`Failure`](crate::Failure) parameter sees the latest error. Errors they
/// return or cause are published and logged but never stop the next after
/// handler. A handler whose capability or error parameter has nothing to
/// bind to is skipped quietly, so an error-only finalizer does not run on
/// success.
#[derive(Debug, Clone)]
pub struct After {
    adapter: Adapter,
}

impl After {
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

    pub async fn run(&self, registry: &mut Registry) {
        match self.adapter.invoke(registry).await {
            Ok(invocation) => {
                if let Some(err) = invocation.error() {
                    warn!(handler = self.adapter.name(), error = %err, "after handler returned an error");
                }
            }
            Err(ResolveError::Missing(descriptor)) => {
                debug!(handler = self.adapter.name(), missing = %descriptor, "after handler skipped");
            }
            Err(err) => {
                warn!(handler = self.adapter.name(), error = %err, "after handler skipped");
            }
        }
    }
}
