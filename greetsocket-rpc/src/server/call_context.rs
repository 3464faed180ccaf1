use std::sync::Arc;

use greetsocket_wire::{ensure_frame_fits, Code, Frame, Metadata, Status};
use k_lock::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Per-call state shared by the handler and the connection.
///
/// Gives a handler the incoming metadata and lets it shape the outgoing header and
/// trailer. It is cheap to clone; all clones refer to the same call.
#[derive(Clone, Debug)]
pub struct CallContext {
    inner: Arc<CallState>,
}

#[derive(Debug)]
struct CallState {
    call_id: u64,
    method: String,
    metadata: Metadata,
    header: Mutex<HeaderState>,
    trailer: Mutex<Metadata>,
    /// Set when the server ends the call itself; delivered in place of the handler's status.
    aborted: Mutex<Option<Status>>,
    outbound: mpsc::Sender<Frame>,
    max_frame_length: usize,
    cancellation: CancellationToken,
    connection: CancellationToken,
}

#[derive(Debug)]
enum HeaderState {
    Pending(Metadata),
    Sent,
}

impl CallContext {
    pub(crate) fn new(
        call_id: u64,
        method: String,
        metadata: Metadata,
        outbound: mpsc::Sender<Frame>,
        max_frame_length: usize,
        connection: &CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(CallState {
                call_id,
                method,
                metadata,
                header: Mutex::new(HeaderState::Pending(Metadata::new())),
                trailer: Mutex::new(Metadata::new()),
                aborted: Mutex::new(None),
                outbound,
                max_frame_length,
                cancellation: connection.child_token(),
                connection: connection.clone(),
            }),
        }
    }

    pub fn call_id(&self) -> u64 {
        self.inner.call_id
    }

    /// Full path of the called method.
    pub fn method(&self) -> &str {
        &self.inner.method
    }

    /// Metadata the caller sent with the call.
    pub fn metadata(&self) -> &Metadata {
        &self.inner.metadata
    }

    /// Merge into the outgoing header. The header goes out with the first response,
    /// or at the end of the call if there is no response.
    ///
    /// Fails once the header has been sent.
    pub fn set_header(&self, metadata: Metadata) -> Result<(), Status> {
        match &mut *self.inner.header.lock().expect("must not be poisoned") {
            HeaderState::Pending(pending) => {
                pending.extend(metadata);
                Ok(())
            }
            HeaderState::Sent => Err(header_already_sent()),
        }
    }

    /// Merge into the outgoing header and send it right away. Works once per call.
    pub async fn send_header(&self, metadata: Metadata) -> Result<(), Status> {
        let header = {
            let mut state = self.inner.header.lock().expect("must not be poisoned");
            match std::mem::replace(&mut *state, HeaderState::Sent) {
                HeaderState::Pending(mut pending) => {
                    pending.extend(metadata);
                    pending
                }
                HeaderState::Sent => return Err(header_already_sent()),
            }
        };
        self.send_header_frame(header, &self.inner.cancellation)
            .await
    }

    /// Append to the outgoing trailer. The trailer is sent when the call ends,
    /// whether it succeeds or fails.
    pub fn set_trailer(&self, metadata: Metadata) {
        self.inner
            .trailer
            .lock()
            .expect("must not be poisoned")
            .extend(metadata);
    }

    /// True once the caller cancelled the call or the connection went away.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }

    /// Completes when the caller cancels the call or the connection goes away.
    pub async fn cancelled(&self) {
        self.inner.cancellation.cancelled().await
    }

    /// The caller gave up on the call. Nothing more is sent for it.
    pub(crate) fn cancel(&self) {
        self.inner.cancellation.cancel();
    }

    /// Stop the handler and end the call with `status` instead of the handler's outcome.
    pub(crate) fn abort(&self, status: Status) {
        self.inner
            .aborted
            .lock()
            .expect("must not be poisoned")
            .get_or_insert(status);
        self.inner.cancellation.cancel();
    }

    /// Send the header if it has not gone out yet.
    pub(crate) async fn flush_header(&self) -> Result<(), Status> {
        match self.take_pending_header() {
            Some(header) => {
                self.send_header_frame(header, &self.inner.cancellation)
                    .await
            }
            None => Ok(()),
        }
    }

    /// Queue a frame for the caller. Fails with `ResourceExhausted` if the frame is over the
    /// connection's frame limit, and with `Cancelled` once the call is cancelled.
    pub(crate) async fn send_frame(&self, frame: Frame) -> Result<(), Status> {
        ensure_frame_fits(&frame, self.inner.max_frame_length)?;
        self.deliver(frame, &self.inner.cancellation).await
    }

    /// Deliver the terminal status and the trailer. Nothing is sent for a cancelled call,
    /// unless the server aborted it.
    pub(crate) async fn finish(&self, result: Result<(), Status>) {
        let call_id = self.call_id();
        let mut status = match result {
            Ok(()) => Status::ok(),
            Err(status) => status,
        };
        let mut until = &self.inner.cancellation;
        if self.is_cancelled() {
            let aborted = self
                .inner
                .aborted
                .lock()
                .expect("must not be poisoned")
                .take();
            match aborted {
                Some(aborted) => {
                    log::debug!("{call_id} call aborted by the server: {aborted}");
                    status = aborted;
                    until = &self.inner.connection;
                }
                None => {
                    log::debug!("{call_id} call ended after cancellation: {status}");
                    return;
                }
            }
        }
        if !status.is_ok() {
            log::debug!("{call_id} {} failed: {status}", self.method());
        }
        if let Some(header) = self.take_pending_header() {
            match self.send_header_frame(header, until).await {
                Ok(()) => (),
                Err(oversized) if oversized.code() == Code::ResourceExhausted => status = oversized,
                Err(e) => {
                    log::debug!("{call_id} could not send header: {e}");
                    return;
                }
            }
        }
        let mut trailer =
            std::mem::take(&mut *self.inner.trailer.lock().expect("must not be poisoned"));
        trailer.extend(std::mem::take(status.metadata_mut()));
        let mut frame = Frame::trailer(call_id, &status, trailer);
        if let Err(oversized) = ensure_frame_fits(&frame, self.inner.max_frame_length) {
            log::warn!("{call_id} trailer replaced: {oversized}");
            frame = Frame::trailer(call_id, &oversized, Metadata::new());
        }
        if let Err(e) = self.deliver(frame, until).await {
            log::debug!("{call_id} could not send trailer: {e}");
        }
    }

    fn take_pending_header(&self) -> Option<Metadata> {
        let mut state = self.inner.header.lock().expect("must not be poisoned");
        match std::mem::replace(&mut *state, HeaderState::Sent) {
            HeaderState::Pending(pending) => Some(pending),
            HeaderState::Sent => None,
        }
    }

    /// An oversized header goes out empty, and the call fails with `ResourceExhausted`.
    async fn send_header_frame(
        &self,
        header: Metadata,
        until: &CancellationToken,
    ) -> Result<(), Status> {
        let frame = Frame::header(self.call_id(), header);
        match ensure_frame_fits(&frame, self.inner.max_frame_length) {
            Ok(()) => self.deliver(frame, until).await,
            Err(oversized) => {
                self.deliver(Frame::header(self.call_id(), Metadata::new()), until)
                    .await?;
                Err(oversized)
            }
        }
    }

    async fn deliver(&self, frame: Frame, until: &CancellationToken) -> Result<(), Status> {
        tokio::select! {
            biased;
            _ = until.cancelled() => Err(Status::cancelled("call was cancelled")),
            sent = self.inner.outbound.send(frame) => {
                sent.map_err(|_e| Status::cancelled("connection is closed"))
            }
        }
    }
}

fn header_already_sent() -> Status {
    Status::failed_precondition("header was already sent")
}
