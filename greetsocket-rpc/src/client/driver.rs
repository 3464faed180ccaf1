use std::{
    collections::HashMap,
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::{future::BoxFuture, FutureExt, SinkExt, StreamExt};
use greetsocket_wire::{Frame, FrameCodec, FrameKind, Metadata, Status};
use tokio::{
    net::tcp::{OwnedReadHalf, OwnedWriteHalf},
    sync::mpsc,
};
use tokio_util::codec::{FramedRead, FramedWrite};

/// What the client side of a call hears from the server.
#[derive(Debug)]
pub(crate) enum CallEvent {
    Header(Metadata),
    Message(Bytes),
    /// The last event of a call. The status carries the trailer metadata.
    Trailer(Status),
}

/// Work handed from `RpcClient`s and `Call`s to the driver.
#[derive(Debug)]
pub(crate) enum Submission {
    /// Registers the call before its open frame is written, so no response can be missed.
    Open {
        call_id: u64,
        events: mpsc::UnboundedSender<CallEvent>,
        frame: Frame,
    },
    Frame(Frame),
    Cancel(u64),
}

/// Drives a client connection: writes submitted frames and routes inbound frames to calls.
///
/// It completes when the server closes the connection, when the connection fails, or when
/// every `RpcClient` and `Call` for it has been dropped.
#[must_use = "the client does nothing unless the driver is spawned"]
pub struct ClientDriver {
    driver: BoxFuture<'static, crate::Result<()>>,
}

impl std::fmt::Debug for ClientDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientDriver").finish_non_exhaustive()
    }
}

impl ClientDriver {
    pub(crate) fn new(
        frames: FramedRead<OwnedReadHalf, FrameCodec>,
        sink: FramedWrite<OwnedWriteHalf, FrameCodec>,
        submissions: mpsc::Receiver<Submission>,
        is_alive: Arc<AtomicBool>,
        address: SocketAddr,
    ) -> Self {
        Self {
            driver: drive(frames, sink, submissions, is_alive, address).boxed(),
        }
    }
}

impl Future for ClientDriver {
    type Output = crate::Result<()>;

    fn poll(mut self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        self.driver.as_mut().poll(context)
    }
}

async fn drive(
    mut frames: FramedRead<OwnedReadHalf, FrameCodec>,
    mut sink: FramedWrite<OwnedWriteHalf, FrameCodec>,
    mut submissions: mpsc::Receiver<Submission>,
    is_alive: Arc<AtomicBool>,
    address: SocketAddr,
) -> crate::Result<()> {
    let mut in_flight: HashMap<u64, mpsc::UnboundedSender<CallEvent>> = HashMap::new();
    let result = loop {
        tokio::select! {
            submission = submissions.recv() => {
                let frame = match submission {
                    Some(Submission::Open { call_id, events, frame }) => {
                        log::trace!("{call_id} registering new call");
                        in_flight.insert(call_id, events);
                        frame
                    }
                    Some(Submission::Frame(frame)) => frame,
                    Some(Submission::Cancel(call_id)) => {
                        if in_flight.remove(&call_id).is_none() {
                            // it already finished
                            continue;
                        }
                        log::debug!("{call_id} cancelling call");
                        Frame::cancel(call_id)
                    }
                    None => {
                        log::debug!("{address} every client handle was dropped");
                        break Ok(());
                    }
                };
                if let Err(e) = sink.send(frame).await {
                    break Err(e.into());
                }
            }
            next = frames.next() => match next {
                Some(Ok(frame)) => route(&mut in_flight, frame),
                Some(Err(e)) => {
                    log::warn!("{address} connection failed: {e:?}");
                    break Err(e.into());
                }
                None => {
                    log::debug!("{address} server closed the connection");
                    break Ok(());
                }
            }
        }
    };
    is_alive.store(false, Ordering::Release);
    // dropping the in-flight event senders tells every open call that the connection is gone
    drop(in_flight);
    if let Err(e) = sink.close().await {
        log::debug!("{address} could not close the connection cleanly: {e:?}");
    }
    result
}

fn route(in_flight: &mut HashMap<u64, mpsc::UnboundedSender<CallEvent>>, mut frame: Frame) {
    let call_id = frame.call_id;
    let event = match FrameKind::try_from(frame.kind) {
        Ok(FrameKind::Header) => CallEvent::Header(frame.take_metadata()),
        Ok(FrameKind::Message) => CallEvent::Message(std::mem::take(&mut frame.payload)),
        Ok(FrameKind::Trailer) => {
            let trailer = frame.take_metadata();
            let status = frame.take_status().with_metadata(trailer);
            match in_flight.remove(&call_id) {
                Some(events) => {
                    if events.send(CallEvent::Trailer(status)).is_err() {
                        log::debug!("{call_id} call was dropped before its trailer arrived");
                    }
                }
                None => log::debug!("{call_id} trailer for a call that is not in flight"),
            }
            return;
        }
        Ok(kind) => {
            log::warn!("{call_id} server sent a client-only frame: {kind:?}");
            return;
        }
        Err(e) => {
            log::warn!("{call_id} unknown frame kind: {e:?}");
            return;
        }
    };
    match in_flight.get(&call_id) {
        Some(events) => {
            if events.send(event).is_err() {
                log::debug!("{call_id} completion channel closed - did the client lose interest in this call?");
            }
        }
        None => log::debug!("{call_id} frame for a call that is not in flight"),
    }
}
