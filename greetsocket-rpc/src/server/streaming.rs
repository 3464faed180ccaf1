use std::marker::PhantomData;

use bytes::Bytes;
use greetsocket_wire::{decode_payload, encode_payload, Frame, Metadata, Status};
use tokio::sync::mpsc;

use super::CallContext;

/// What a handler is called with: the call's context and its request message (or stream).
#[derive(Debug)]
pub struct Request<T> {
    context: CallContext,
    message: T,
}

impl<T> Request<T> {
    pub(crate) fn new(context: CallContext, message: T) -> Self {
        Self { context, message }
    }

    /// Incoming metadata from the caller.
    pub fn metadata(&self) -> &Metadata {
        self.context.metadata()
    }

    pub fn context(&self) -> &CallContext {
        &self.context
    }

    pub fn get_ref(&self) -> &T {
        &self.message
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.message
    }

    pub fn into_inner(self) -> T {
        self.message
    }

    pub fn into_parts(self) -> (CallContext, T) {
        (self.context, self.message)
    }
}

/// The inbound side of a client-streaming or bidirectional call.
#[derive(Debug)]
pub struct Streaming<T> {
    context: CallContext,
    inbound: mpsc::Receiver<Bytes>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Streaming<T>
where
    T: prost::Message + Default,
{
    pub(crate) fn new(context: CallContext, inbound: mpsc::Receiver<Bytes>) -> Self {
        Self {
            context,
            inbound,
            _phantom: PhantomData,
        }
    }

    /// The next request.
    ///
    /// `Ok(None)` means the caller finished sending; it is the normal end of the stream.
    /// A cancelled call or an undecodable message is an `Err`.
    pub async fn message(&mut self) -> Result<Option<T>, Status> {
        tokio::select! {
            biased;
            _ = self.context.cancelled() => Err(Status::cancelled("call was cancelled")),
            next = self.inbound.recv() => match next {
                Some(payload) => decode_payload(payload).map(Some),
                None => Ok(None),
            },
        }
    }

    /// Exactly one request followed by the end of the stream.
    pub(crate) async fn single(&mut self) -> Result<T, Status> {
        let request = self
            .message()
            .await?
            .ok_or_else(|| Status::internal("missing request message"))?;
        match self.message().await? {
            None => Ok(request),
            Some(_) => Err(Status::internal("unexpected additional request message")),
        }
    }
}

/// The outbound side of a server-streaming or bidirectional call.
#[derive(Debug)]
pub struct ResponseSender<T> {
    context: CallContext,
    _phantom: PhantomData<fn(T)>,
}

impl<T> ResponseSender<T>
where
    T: prost::Message,
{
    pub(crate) fn new(context: CallContext) -> Self {
        Self {
            context,
            _phantom: PhantomData,
        }
    }

    /// Send one response. The header goes out first if it has not yet.
    ///
    /// Waits while the connection's outbound queue is full. Fails with `Cancelled` once the
    /// caller cancelled the call or the connection is gone.
    pub async fn send(&mut self, message: T) -> Result<(), Status> {
        self.context.flush_header().await?;
        self.context
            .send_frame(Frame::message(
                self.context.call_id(),
                encode_payload(&message),
            ))
            .await
    }

    pub fn context(&self) -> &CallContext {
        &self.context
    }
}
