use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use greetsocket_wire::{ensure_frame_fits, Frame, Metadata, Status};
use tokio::sync::mpsc;

use super::{
    call::Call,
    driver::Submission,
    Response,
};

/// A client for making calls to a greetsocket rpc server.
///
/// Calls are multiplexed over one connection and may run concurrently. Clones share
/// the connection. To cancel a call, drop its [`Call`] before it completes.
#[derive(Debug, Clone)]
pub struct RpcClient {
    submissions: mpsc::Sender<Submission>,
    next_call_id: Arc<AtomicU64>,
    is_alive: Arc<AtomicBool>,
    max_frame_length: usize,
}

impl RpcClient {
    pub(crate) fn new(
        submissions: mpsc::Sender<Submission>,
        is_alive: Arc<AtomicBool>,
        max_frame_length: usize,
    ) -> Self {
        Self {
            submissions,
            next_call_id: Arc::new(AtomicU64::new(1)),
            is_alive,
            max_frame_length,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive.load(Ordering::Relaxed)
    }

    /// Start a call of any shape. Nothing but the open frame is sent.
    pub async fn open<Req, Resp>(
        &self,
        method: &str,
        metadata: Metadata,
    ) -> Result<Call<Req, Resp>, Status>
    where
        Req: prost::Message,
        Resp: prost::Message + Default,
    {
        if !self.is_alive() {
            // early-out if the connection is closed
            return Err(connection_closed());
        }
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let frame = Frame::open(call_id, method, metadata);
        ensure_frame_fits(&frame, self.max_frame_length)?;
        let (events_sender, events) = mpsc::unbounded_channel();
        self.submissions
            .send(Submission::Open {
                call_id,
                events: events_sender,
                frame,
            })
            .await
            .map_err(|_e| connection_closed())?;
        Ok(Call::new(
            call_id,
            self.submissions.clone(),
            events,
            self.max_frame_length,
        ))
    }

    /// Send one request and wait for the one response.
    pub async fn unary<Req, Resp>(
        &self,
        method: &str,
        metadata: Metadata,
        request: Req,
    ) -> Result<Response<Resp>, Status>
    where
        Req: prost::Message,
        Resp: prost::Message + Default,
    {
        let mut call = self.open(method, metadata).await?;
        call.send(request).await?;
        call.finish().await
    }

    /// Send one request. Read the responses from the returned call.
    pub async fn server_streaming<Req, Resp>(
        &self,
        method: &str,
        metadata: Metadata,
        request: Req,
    ) -> Result<Call<Req, Resp>, Status>
    where
        Req: prost::Message,
        Resp: prost::Message + Default,
    {
        let mut call = self.open(method, metadata).await?;
        call.send(request).await?;
        call.close_send().await?;
        Ok(call)
    }

    /// Start a client-streaming call. Send requests on it, then `finish()` for the response.
    pub async fn client_streaming<Req, Resp>(
        &self,
        method: &str,
        metadata: Metadata,
    ) -> Result<Call<Req, Resp>, Status>
    where
        Req: prost::Message,
        Resp: prost::Message + Default,
    {
        self.open(method, metadata).await
    }

    /// Start a bidirectional call. Send and receive on it independently.
    pub async fn bidirectional<Req, Resp>(
        &self,
        method: &str,
        metadata: Metadata,
    ) -> Result<Call<Req, Resp>, Status>
    where
        Req: prost::Message,
        Resp: prost::Message + Default,
    {
        self.open(method, metadata).await
    }
}

pub(crate) fn connection_closed() -> Status {
    Status::unavailable("connection is closed")
}
