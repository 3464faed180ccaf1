use std::marker::PhantomData;

use greetsocket_wire::{
    decode_payload, encode_payload, ensure_frame_fits, Frame, Metadata, Status,
};
use tokio::sync::mpsc;

use super::{
    driver::{CallEvent, Submission},
    rpc_client::connection_closed,
    Response,
};

/// The client side of one call.
///
/// Send requests with `send` and end them with `close_send`. Read responses with `message`.
/// The server's header is available through `header` and its trailer through `trailer` once
/// the call has completed.
///
/// Dropping an unfinished call cancels it on the server.
#[derive(Debug)]
pub struct Call<Req, Resp>
where
    Req: prost::Message,
    Resp: prost::Message + Default,
{
    call_id: u64,
    submissions: mpsc::Sender<Submission>,
    events: mpsc::UnboundedReceiver<CallEvent>,
    header: Option<Metadata>,
    trailer: Option<Metadata>,
    terminal: Option<Status>,
    send_closed: bool,
    max_frame_length: usize,
    _phantom: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> Call<Req, Resp>
where
    Req: prost::Message,
    Resp: prost::Message + Default,
{
    pub(crate) fn new(
        call_id: u64,
        submissions: mpsc::Sender<Submission>,
        events: mpsc::UnboundedReceiver<CallEvent>,
        max_frame_length: usize,
    ) -> Self {
        Self {
            call_id,
            submissions,
            events,
            header: None,
            trailer: None,
            terminal: None,
            send_closed: false,
            max_frame_length,
            _phantom: PhantomData,
        }
    }

    pub fn call_id(&self) -> u64 {
        self.call_id
    }

    /// Send one request. A request over the frame limit fails with `ResourceExhausted`
    /// and is not sent; the call stays usable.
    pub async fn send(&mut self, request: Req) -> Result<(), Status> {
        if self.send_closed {
            return Err(Status::failed_precondition(
                "the request stream is already closed",
            ));
        }
        if self.terminal.is_some() {
            return Err(Status::failed_precondition("the call has already completed"));
        }
        let frame = Frame::message(self.call_id, encode_payload(&request));
        ensure_frame_fits(&frame, self.max_frame_length)?;
        self.submit(frame).await
    }

    /// Tell the server that no more requests will be sent. Calling it again does nothing.
    pub async fn close_send(&mut self) -> Result<(), Status> {
        if self.send_closed || self.terminal.is_some() {
            return Ok(());
        }
        self.send_closed = true;
        self.submit(Frame::half_close(self.call_id)).await
    }

    /// Wait for the server's header.
    pub async fn header(&mut self) -> Result<&Metadata, Status> {
        while self.header.is_none() {
            if let Some(status) = &self.terminal {
                if !status.is_ok() {
                    return Err(status.clone());
                }
                self.header = Some(Metadata::new());
                break;
            }
            match self.events.recv().await {
                Some(CallEvent::Header(header)) => self.header = Some(header),
                Some(CallEvent::Message(_)) => {
                    return Err(Status::internal("a response arrived before the header"));
                }
                Some(CallEvent::Trailer(status)) => self.complete(status),
                None => self.complete(connection_closed()),
            }
        }
        Ok(self.header.get_or_insert_with(Metadata::new))
    }

    /// The next response.
    ///
    /// `Ok(None)` means the call completed successfully and there are no more responses.
    /// A failed call returns its status, including the trailer metadata.
    pub async fn message(&mut self) -> Result<Option<Resp>, Status> {
        loop {
            if let Some(status) = &self.terminal {
                return if status.is_ok() {
                    Ok(None)
                } else {
                    Err(status.clone())
                };
            }
            match self.events.recv().await {
                Some(CallEvent::Header(header)) => {
                    if self.header.replace(header).is_some() {
                        log::warn!("{} server sent a second header", self.call_id);
                    }
                }
                Some(CallEvent::Message(payload)) => return decode_payload(payload).map(Some),
                Some(CallEvent::Trailer(status)) => self.complete(status),
                None => self.complete(connection_closed()),
            }
        }
    }

    /// Trailer metadata, once the call has completed.
    pub fn trailer(&self) -> Option<&Metadata> {
        self.trailer.as_ref()
    }

    /// The final status, once the call has completed.
    pub fn status(&self) -> Option<&Status> {
        self.terminal.as_ref()
    }

    /// Close the request stream and wait for the single response of a unary or
    /// client-streaming call.
    pub async fn finish(mut self) -> Result<Response<Resp>, Status> {
        self.close_send().await?;
        let response = self
            .message()
            .await?
            .ok_or_else(|| Status::internal("call completed without a response"))?;
        if self.message().await?.is_some() {
            return Err(Status::internal("unexpected additional response"));
        }
        Ok(Response::new(
            self.header.take().unwrap_or_default(),
            response,
            self.trailer.take().unwrap_or_default(),
        ))
    }

    /// Stop the call. The server is told to stop working on it.
    pub fn cancel(self) {
        // the drop guard does the work
    }

    fn complete(&mut self, status: Status) {
        self.trailer = Some(status.metadata().clone());
        self.terminal = Some(status);
    }

    async fn submit(&mut self, frame: Frame) -> Result<(), Status> {
        self.submissions
            .send(Submission::Frame(frame))
            .await
            .map_err(|_e| connection_closed())
    }
}

impl<Req, Resp> Drop for Call<Req, Resp>
where
    Req: prost::Message,
    Resp: prost::Message + Default,
{
    fn drop(&mut self) {
        if self.terminal.is_none() {
            match self.submissions.try_send(Submission::Cancel(self.call_id)) {
                Ok(()) => (),
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!("{} connection closed before cancellation", self.call_id);
                }
                Err(e) => {
                    log::warn!(
                        "{} failed to send cancellation - this will abandon the server call: {e:?}",
                        self.call_id
                    );
                }
            }
        }
    }
}
