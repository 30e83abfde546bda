//! The function adapter shared by every handler role.
//!
//! An [`Adapter`] is built once, when a handler is registered. It records
//! the handler's [`Signature`], validates it, and erases the handler's type
//! so that handlers of any shape can be stored side by side. Per request,
//! [`Adapter::invoke`] resolves the inputs from a registry, calls the
//! handler and publishes every output.

use std::marker::PhantomData;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use super::Handler;
use crate::error::{Failure, ResolveError, ResolveResult, SetupError, SetupResult};
use crate::output::IntoOutputs;
use crate::registry::Registry;
use crate::value::{AnyValue, TypeDescriptor, TypedValue};

/// The ordered input and output descriptors of a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    inputs: Vec<TypeDescriptor>,
    outputs: Vec<TypeDescriptor>,
}

impl Signature {
    /// Computes the signature of `H`.
    pub fn of<H, T>() -> Self
    where
        H: Handler<T>,
    {
        Self {
            inputs: H::input_descriptors(),
            outputs: <H::Output as IntoOutputs>::output_descriptors(),
        }
    }

    pub fn inputs(&self) -> &[TypeDescriptor] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TypeDescriptor] {
        &self.outputs
    }

    /// At most one response parameter and at most one error parameter.
    pub fn validate_inputs(&self, handler: &'static str) -> SetupResult<()> {
        let any = self.inputs.iter().filter(|d| d.is_any()).count();
        if any > 1 {
            return Err(SetupError::MultipleAny {
                handler,
                count: any,
            });
        }

        let errors = self.inputs.iter().filter(|d| d.is_error()).count();
        if errors > 1 {
            return Err(SetupError::MultipleError {
                handler,
                count: errors,
            });
        }

        Ok(())
    }

    /// With two or more outputs, the error must not come first.
    pub fn validate_outputs(&self, handler: &'static str) -> SetupResult<()> {
        if self.outputs.len() >= 2 && self.outputs[0].is_error() {
            return Err(SetupError::MisplacedError { handler });
        }
        Ok(())
    }

    /// Returns `true` if the handler returns nothing but an error.
    pub fn returns_only_error(&self) -> bool {
        self.outputs.len() == 1 && self.outputs[0].is_error()
    }
}

// ============================================================================
// Type erasure
// ============================================================================

type OutputFuture = BoxFuture<'static, Vec<Option<AnyValue>>>;

trait ErasedHandler: Send + Sync {
    fn call(&self, inputs: Vec<Option<AnyValue>>) -> ResolveResult<OutputFuture>;
}

struct HandlerFn<H, T> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<H, T> ErasedHandler for HandlerFn<H, T>
where
    H: Handler<T>,
    T: 'static,
{
    fn call(&self, inputs: Vec<Option<AnyValue>>) -> ResolveResult<OutputFuture> {
        let future = self.handler.clone().call(inputs)?;
        Ok(future.map(IntoOutputs::into_values).boxed())
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// A type-erased handler together with its signature.
#[derive(Clone)]
pub struct Adapter {
    name: &'static str,
    signature: Signature,
    handler: Arc<dyn ErasedHandler>,
}

impl Adapter {
    /// Wraps `handler`, rejecting signatures with more than one response
    /// or error parameter.
    pub fn new<H, T>(handler: H) -> SetupResult<Self>
    where
        H: Handler<T>,
        T: 'static,
    {
        let name = std::any::type_name::<H>();
        let signature = Signature::of::<H, T>();
        signature.validate_inputs(name)?;

        Ok(Self {
            name,
            signature,
            handler: Arc::new(HandlerFn {
                handler,
                _marker: PhantomData,
            }),
        })
    }

    /// The handler's type name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Resolves the inputs, calls the handler and publishes its outputs.
    ///
    /// The handler is not called when an input cannot be resolved.
    /// Construction and conversion failures are published into the registry
    /// before they are returned. An unmet capability or error parameter
    /// returns [`ResolveError::Missing`] and publishes nothing.
    pub async fn invoke(&self, registry: &mut Registry) -> ResolveResult<Invocation> {
        let inputs = registry.resolve_many(self.signature.inputs()).await?;
        let future = match self.handler.call(inputs) {
            Ok(future) => future,
            Err(err) => {
                if !matches!(err, ResolveError::Missing(_)) {
                    registry.provide(Failure::from(err.clone()));
                }
                return Err(err);
            }
        };

        debug!(handler = self.name, "invoking handler");
        let values = future.await;

        for (descriptor, value) in self.signature.outputs().iter().zip(&values) {
            if let Some(value) = value {
                registry.publish(TypedValue::new(*descriptor, value.clone()));
            }
        }

        Ok(Invocation {
            outputs: self.signature.outputs().to_vec(),
            values,
        })
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// What a single handler call produced.
#[derive(Clone)]
pub struct Invocation {
    outputs: Vec<TypeDescriptor>,
    values: Vec<Option<AnyValue>>,
}

impl Invocation {
    /// The error the handler returned, if any.
    pub fn error(&self) -> Option<Failure> {
        self.outputs
            .iter()
            .zip(&self.values)
            .filter(|(descriptor, _)| descriptor.is_error())
            .find_map(|(_, value)| value.as_ref()?.downcast_ref::<Failure>().cloned())
    }

    /// The canonical response: the first output, unless the handler returns
    /// nothing or nothing but an error.
    pub fn response(&self) -> Option<AnyValue> {
        if self.outputs.is_empty() || (self.outputs.len() == 1 && self.outputs[0].is_error()) {
            return None;
        }
        self.values.first().cloned().flatten()
    }

    /// Returned values in declaration order, `None` where nothing was produced.
    pub fn values(&self) -> &[Option<AnyValue>] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::capability::{Capability, CapabilityTable};
    use crate::construct::NoConstructor;
    use crate::extract::Response;
    use crate::value::Injectable;

    #[derive(Clone, Debug, PartialEq)]
    struct Request;
    impl Injectable for Request {}

    #[derive(Clone, Debug, PartialEq)]
    struct Writer;
    impl Injectable for Writer {}

    fn registry() -> Registry {
        Registry::new(
            Request,
            Writer,
            Arc::new(NoConstructor),
            Arc::new(CapabilityTable::new()),
        )
    }

    #[test]
    fn signature_lists_inputs_and_outputs_in_order() {
        let adapter = Adapter::new(|_req: Request, _n: Option<u32>| async {
            Ok::<_, Failure>("ok".to_string())
        })
        .unwrap();
        let signature = adapter.signature();
        assert_eq!(
            signature.inputs(),
            &[Request::descriptor(), u32::descriptor().into_optional()]
        );
        assert_eq!(
            signature.outputs(),
            &[String::descriptor(), Failure::descriptor()]
        );
        assert!(!signature.returns_only_error());
    }

    #[test]
    fn rejects_two_response_parameters() {
        let err = Adapter::new(|_a: Response, _b: Response| async {}).unwrap_err();
        assert!(matches!(err, SetupError::MultipleAny { count: 2, .. }));
    }

    #[test]
    fn rejects_two_error_parameters() {
        let err = Adapter::new(|_a: Failure, _b: Option<Failure>| async {}).unwrap_err();
        assert!(matches!(err, SetupError::MultipleError { count: 2, .. }));
    }

    fn signature_of<H: Handler<T>, T>(_handler: &H) -> Signature {
        Signature::of::<H, T>()
    }

    #[test]
    fn misplaced_error_outputs_are_detected() {
        let signature = signature_of(&|| async { (Failure::msg("x"), 1u32) });
        assert!(signature.validate_outputs("h").is_err());

        let signature = signature_of(&|| async { Ok::<_, Failure>(1u32) });
        assert!(signature.validate_outputs("h").is_ok());
    }

    #[tokio::test]
    async fn invoke_publishes_every_output() {
        let mut registry = registry();
        let adapter = Adapter::new(|_req: Request| async { (7u32, "seven".to_string()) }).unwrap();

        let invocation = adapter.invoke(&mut registry).await.unwrap();
        assert_eq!(registry.get::<u32>(), Some(7));
        assert_eq!(registry.get::<String>().as_deref(), Some("seven"));
        assert!(invocation.error().is_none());
        assert!(invocation.response().is_some());
    }

    #[tokio::test]
    async fn invoke_reports_returned_errors() {
        let mut registry = registry();
        let adapter = Adapter::new(|| async { Err::<(), _>(Failure::msg("denied")) }).unwrap();

        let invocation = adapter.invoke(&mut registry).await.unwrap();
        assert_eq!(invocation.error().unwrap().to_string(), "denied");
        assert!(invocation.response().is_none());
        assert_eq!(registry.error().unwrap().to_string(), "denied");
    }

    #[tokio::test]
    async fn unresolvable_inputs_skip_the_handler() {
        #[derive(Clone)]
        struct Missing;
        impl Injectable for Missing {}

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let mut registry = registry();
        let adapter = Adapter::new(move |_m: Missing| {
            let flag = flag.clone();
            async move { flag.store(true, Ordering::SeqCst) }
        })
        .unwrap();

        assert!(adapter.invoke(&mut registry).await.is_err());
        assert!(!ran.load(Ordering::SeqCst));
        assert!(registry.error().is_some());
    }

    #[tokio::test]
    async fn unmet_capability_parameters_publish_nothing() {
        trait Auth: Send + Sync {}

        let mut registry = registry();
        let adapter = Adapter::new(|_auth: Capability<dyn Auth>| async {}).unwrap();

        let result = adapter.invoke(&mut registry).await;
        assert!(matches!(result, Err(ResolveError::Missing(_))));
        assert!(registry.error().is_none());
    }

    #[tokio::test]
    async fn absent_outputs_keep_earlier_values() {
        let mut registry = registry();
        registry.provide(7u32);
        registry.provide(vec!["kept".to_string()]);

        let adapter =
            Adapter::new(|| async { (Option::<u32>::None, Vec::<String>::new()) }).unwrap();
        adapter.invoke(&mut registry).await.unwrap();

        assert_eq!(registry.get::<u32>(), Some(7));
        assert_eq!(registry.get::<Vec<String>>(), Some(vec!["kept".to_string()]));
    }
}
