use std::future::Future;

use bytes::Bytes;
use greetsocket_wire::Status;
use tokio::sync::mpsc;

use super::{CallContext, Request, ResponseSender, Streaming};

/// A newly opened call, before its messages are typed.
///
/// A [`Service`](super::Service) consumes it with the adapter for the method's call shape.
/// Each adapter decodes requests, runs your handler and encodes what it produces. The
/// status your handler returns is delivered to the caller with the trailer.
#[derive(Debug)]
pub struct ServerCall {
    context: CallContext,
    inbound: mpsc::Receiver<Bytes>,
}

impl ServerCall {
    pub(crate) fn new(context: CallContext, inbound: mpsc::Receiver<Bytes>) -> Self {
        Self { context, inbound }
    }

    pub fn method(&self) -> &str {
        self.context.method()
    }

    pub fn context(&self) -> &CallContext {
        &self.context
    }

    /// One request in, one response out.
    pub async fn unary<Req, Resp, F, Fut>(self, handler: F) -> Result<(), Status>
    where
        Req: prost::Message + Default,
        Resp: prost::Message,
        F: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Result<Resp, Status>>,
    {
        let Self { context, inbound } = self;
        let request = Streaming::<Req>::new(context.clone(), inbound)
            .single()
            .await?;
        let response = handler(Request::new(context.clone(), request)).await?;
        ResponseSender::new(context).send(response).await
    }

    /// One request in, any number of responses out through the `ResponseSender`.
    pub async fn server_streaming<Req, Resp, F, Fut>(self, handler: F) -> Result<(), Status>
    where
        Req: prost::Message + Default,
        Resp: prost::Message,
        F: FnOnce(Request<Req>, ResponseSender<Resp>) -> Fut,
        Fut: Future<Output = Result<(), Status>>,
    {
        let Self { context, inbound } = self;
        let request = Streaming::<Req>::new(context.clone(), inbound)
            .single()
            .await?;
        handler(
            Request::new(context.clone(), request),
            ResponseSender::new(context),
        )
        .await
    }

    /// A stream of requests in, one response out.
    pub async fn client_streaming<Req, Resp, F, Fut>(self, handler: F) -> Result<(), Status>
    where
        Req: prost::Message + Default,
        Resp: prost::Message,
        F: FnOnce(Request<Streaming<Req>>) -> Fut,
        Fut: Future<Output = Result<Resp, Status>>,
    {
        let Self { context, inbound } = self;
        let requests = Streaming::new(context.clone(), inbound);
        let response = handler(Request::new(context.clone(), requests)).await?;
        ResponseSender::new(context).send(response).await
    }

    /// Independent streams of requests in and responses out.
    pub async fn bidirectional<Req, Resp, F, Fut>(self, handler: F) -> Result<(), Status>
    where
        Req: prost::Message + Default,
        Resp: prost::Message,
        F: FnOnce(Request<Streaming<Req>>, ResponseSender<Resp>) -> Fut,
        Fut: Future<Output = Result<(), Status>>,
    {
        let Self { context, inbound } = self;
        let requests = Streaming::new(context.clone(), inbound);
        handler(
            Request::new(context.clone(), requests),
            ResponseSender::new(context),
        )
        .await
    }
}
