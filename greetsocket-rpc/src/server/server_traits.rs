use std::future::Future;

use greetsocket_wire::Status;

use crate::{server::ServerCall, MethodDescriptor};

/// A Service answers the calls addressed to its methods.
///
/// One instance is shared by every connection and every call, so it receives `&self`.
/// If you need mutable state, you will need an appropriate state sharing mechanism.
///
/// Calls for methods that are not listed in `METHODS` never reach `call`; the caller gets
/// an `Unimplemented` status instead.
pub trait Service: Send + Sync + 'static {
    /// Fully qualified service name, like `greeting.GreetingService`.
    const NAME: &'static str;

    /// Every method this service answers.
    const METHODS: &'static [MethodDescriptor];

    /// Serve one call. Route on `call.method()` and consume the call with the adapter for
    /// that method's shape, like `ServerCall::unary`.
    ///
    /// The returned status is delivered to the caller along with the trailer.
    fn call(&self, call: ServerCall) -> impl Future<Output = Result<(), Status>> + Send;
}
