use std::future::Future;

use greetsocket_rpc::{
    server::{Request, ResponseSender, ServerCall, Service, Streaming},
    CallShape, MethodDescriptor,
};
use greetsocket_wire::Status;

use crate::messages::{HelloRequest, HelloResponse};

pub const SERVICE_NAME: &str = "greeting.GreetingService";
pub const HELLO: &str = "/greeting.GreetingService/Hello";
pub const HELLO_SERVER_STREAM: &str = "/greeting.GreetingService/HelloServerStream";
pub const HELLO_CLIENT_STREAM: &str = "/greeting.GreetingService/HelloClientStream";
pub const HELLO_BI_STREAMS: &str = "/greeting.GreetingService/HelloBiStreams";

/// The greeting service, one method per call shape.
///
/// Host an implementation by wrapping it in a [`GreetingServiceServer`].
pub trait GreetingService: Send + Sync + 'static {
    /// One name in, one greeting out.
    fn hello(
        &self,
        request: Request<HelloRequest>,
    ) -> impl Future<Output = Result<HelloResponse, Status>> + Send;

    /// One name in, a timed sequence of greetings out.
    fn hello_server_stream(
        &self,
        request: Request<HelloRequest>,
        responses: ResponseSender<HelloResponse>,
    ) -> impl Future<Output = Result<(), Status>> + Send;

    /// Many names in, one greeting for all of them out.
    fn hello_client_stream(
        &self,
        requests: Request<Streaming<HelloRequest>>,
    ) -> impl Future<Output = Result<HelloResponse, Status>> + Send;

    /// A greeting out for each name in.
    fn hello_bi_streams(
        &self,
        requests: Request<Streaming<HelloRequest>>,
        responses: ResponseSender<HelloResponse>,
    ) -> impl Future<Output = Result<(), Status>> + Send;
}

/// Routes calls for `greeting.GreetingService` to a [`GreetingService`].
#[derive(Debug)]
pub struct GreetingServiceServer<S> {
    inner: S,
}

impl<S> GreetingServiceServer<S>
where
    S: GreetingService,
{
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S> Service for GreetingServiceServer<S>
where
    S: GreetingService,
{
    const NAME: &'static str = SERVICE_NAME;
    const METHODS: &'static [MethodDescriptor] = &[
        MethodDescriptor::new(HELLO, CallShape::Unary),
        MethodDescriptor::new(HELLO_SERVER_STREAM, CallShape::ServerStreaming),
        MethodDescriptor::new(HELLO_CLIENT_STREAM, CallShape::ClientStreaming),
        MethodDescriptor::new(HELLO_BI_STREAMS, CallShape::Bidirectional),
    ];

    async fn call(&self, call: ServerCall) -> Result<(), Status> {
        let method = call.method().to_string();
        match method.as_str() {
            HELLO => call.unary(|request| self.inner.hello(request)).await,
            HELLO_SERVER_STREAM => {
                call.server_streaming(|request, responses| {
                    self.inner.hello_server_stream(request, responses)
                })
                .await
            }
            HELLO_CLIENT_STREAM => {
                call.client_streaming(|requests| self.inner.hello_client_stream(requests))
                    .await
            }
            HELLO_BI_STREAMS => {
                call.bidirectional(|requests, responses| {
                    self.inner.hello_bi_streams(requests, responses)
                })
                .await
            }
            _ => Err(Status::unimplemented(format!("unknown method {method}"))),
        }
    }
}
