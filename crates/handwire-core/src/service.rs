//! Tower integration.
//!
//! [`ChainService`] exposes a [`Chain`] as a `tower::Service` taking the
//! request and response writer, so a server can drive it like any other
//! service and stack layers on top.

use std::convert::Infallible;
use std::marker::PhantomData;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::Service;

use crate::chain::Chain;
use crate::registry::Registry;
use crate::value::Injectable;

/// A tower [`Service`] that runs a chain for each `(request, writer)` pair.
///
/// The service is always ready and never fails; failures are values inside
/// the returned [`Registry`].
pub struct ChainService<R, W> {
    chain: Chain,
    _marker: PhantomData<fn(R, W)>,
}

impl<R, W> ChainService<R, W> {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain,
            _marker: PhantomData,
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }
}

impl<R, W> Clone for ChainService<R, W> {
    fn clone(&self) -> Self {
        Self::new(self.chain.clone())
    }
}

impl<R, W> From<Chain> for ChainService<R, W> {
    fn from(chain: Chain) -> Self {
        Self::new(chain)
    }
}

impl<R, W> std::fmt::Debug for ChainService<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainService")
            .field("chain", &self.chain)
            .finish()
    }
}

impl<R, W> Service<(R, W)> for ChainService<R, W>
where
    R: Injectable,
    W: Injectable,
{
    type Response = Registry;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Registry, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, (request, writer): (R, W)) -> Self::Future {
        let chain = self.chain.clone();
        async move { Ok(chain.run(request, writer).await) }.boxed()
    }
}
