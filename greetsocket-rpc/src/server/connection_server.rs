use std::{
    collections::HashMap, net::SocketAddr, panic::AssertUnwindSafe, sync::Arc,
};

use bytes::Bytes;
use futures::{FutureExt, SinkExt, StreamExt};
use greetsocket_wire::{Frame, FrameCodec, FrameKind, Status};
use tokio::{
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::mpsc,
    task::JoinSet,
};
use tokio_util::{
    codec::{FramedRead, FramedWrite},
    sync::CancellationToken,
};

use crate::{
    reflection::{self, ListMethodsRequest},
    server::{CallContext, Configuration, Request, ServerCall, Service},
};

/// Serve one connection until the peer goes away, or until shutdown has been requested
/// and every call on the connection has finished.
pub(crate) async fn serve_connection<S>(
    service: Arc<S>,
    stream: TcpStream,
    address: SocketAddr,
    configuration: Configuration,
    shutdown: CancellationToken,
) -> crate::Result<()>
where
    S: Service,
{
    let (read_half, write_half) = stream.into_split();
    let codec = FrameCodec::new(configuration.get_max_frame_length());
    let mut frames = FramedRead::new(read_half, codec.clone());
    let (outbound, outbound_frames) =
        mpsc::channel(configuration.get_max_queued_outbound_messages());
    let writer = tokio::spawn(write_frames(
        FramedWrite::new(write_half, codec),
        outbound_frames,
        address,
    ));

    let mut connection = RpcConnectionServer {
        service,
        address,
        enable_reflection: configuration.get_enable_reflection(),
        max_frame_length: configuration.get_max_frame_length(),
        max_queued_inbound_messages: configuration.get_max_queued_inbound_messages(),
        calls: Default::default(),
        tasks: JoinSet::new(),
        outbound,
        cancellation: CancellationToken::new(),
        shutdown,
    };
    let result = connection.run(&mut frames).await;
    // the writer finishes once every call has released its handle to the outbound queue
    drop(connection);
    match writer.await {
        Ok(Ok(())) => (),
        Ok(Err(e)) => log::debug!("{address} writer failed: {e:?}"),
        Err(e) => log::warn!("{address} writer task failed: {e:?}"),
    }
    result
}

async fn write_frames(
    mut sink: FramedWrite<OwnedWriteHalf, FrameCodec>,
    mut outbound: mpsc::Receiver<Frame>,
    address: SocketAddr,
) -> crate::Result<()> {
    while let Some(frame) = outbound.recv().await {
        sink.feed(frame).await?;
        while let Ok(frame) = outbound.try_recv() {
            sink.feed(frame).await?;
        }
        sink.flush().await?;
    }
    log::debug!("{address} outbound queue closed");
    sink.close().await?;
    Ok(())
}

/// Stays registered until the call's task is joined, so its id cannot be reused early.
#[derive(Debug)]
struct LiveCall {
    /// Dropped on half-close, which ends the call's inbound stream.
    inbound: Option<mpsc::Sender<Bytes>>,
    context: CallContext,
}

impl LiveCall {
    fn receive(&mut self, payload: Bytes) {
        let call_id = self.context.call_id();
        let Some(inbound) = &self.inbound else {
            log::debug!("{call_id} message for a call that is not receiving");
            return;
        };
        match inbound.try_send(payload) {
            Ok(()) => (),
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("{call_id} handler fell behind on requests, aborting the call");
                self.inbound = None;
                self.context.abort(Status::resource_exhausted(
                    "too many requests are waiting for the handler",
                ));
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("{call_id} call is no longer reading requests");
                self.inbound = None;
            }
        }
    }
}

struct RpcConnectionServer<S>
where
    S: Service,
{
    service: Arc<S>,
    address: SocketAddr,
    enable_reflection: bool,
    max_frame_length: usize,
    max_queued_inbound_messages: usize,
    calls: HashMap<u64, LiveCall>,
    tasks: JoinSet<u64>,
    outbound: mpsc::Sender<Frame>,
    /// Parent of every call's token: cancelled when the connection is lost.
    cancellation: CancellationToken,
    shutdown: CancellationToken,
}

impl<S> RpcConnectionServer<S>
where
    S: Service,
{
    async fn run(
        &mut self,
        frames: &mut FramedRead<OwnedReadHalf, FrameCodec>,
    ) -> crate::Result<()> {
        let mut result = Ok(());
        let mut reading = true;
        let mut draining = false;
        loop {
            if (draining || !reading) && self.tasks.is_empty() {
                break;
            }
            tokio::select! {
                next = frames.next(), if reading => match next {
                    Some(Ok(frame)) => self.on_frame(frame),
                    Some(Err(e)) => {
                        log::warn!("{} closing connection after protocol failure: {e:?}", self.address);
                        self.cancellation.cancel();
                        reading = false;
                        result = Err(e.into());
                    }
                    None => {
                        log::debug!("{} connection closed by peer", self.address);
                        self.cancellation.cancel();
                        reading = false;
                    }
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => match joined {
                    Ok(call_id) => {
                        log::trace!("{call_id} call retired");
                        self.calls.remove(&call_id);
                    }
                    Err(e) => log::error!("{} call task failed: {e:?}", self.address),
                },
                _ = self.shutdown.cancelled(), if !draining => {
                    log::debug!("{} draining {} calls", self.address, self.tasks.len());
                    draining = true;
                }
            }
        }
        result
    }

    fn on_frame(&mut self, mut frame: Frame) {
        let call_id = frame.call_id;
        match FrameKind::try_from(frame.kind) {
            Ok(FrameKind::Open) => self.open_call(frame),
            Ok(FrameKind::Message) => match self.calls.get_mut(&call_id) {
                Some(call) => call.receive(std::mem::take(&mut frame.payload)),
                None => log::debug!("{call_id} message for a call that is not in flight"),
            },
            Ok(FrameKind::HalfClose) => match self.calls.get_mut(&call_id) {
                Some(call) => {
                    log::trace!("{call_id} caller finished sending");
                    call.inbound = None;
                }
                None => log::debug!("{call_id} half-close for a call that is not in flight"),
            },
            Ok(FrameKind::Cancel) => match self.calls.get_mut(&call_id) {
                Some(call) => {
                    log::debug!("{call_id} call cancelled by caller");
                    call.inbound = None;
                    call.context.cancel();
                }
                None => log::debug!("{call_id} cancel for a call that is not in flight"),
            },
            Ok(kind @ (FrameKind::Header | FrameKind::Trailer)) => {
                log::warn!("{call_id} caller sent a server-only frame: {kind:?}");
            }
            Err(e) => log::warn!("{call_id} unknown frame kind: {e:?}"),
        }
    }

    fn open_call(&mut self, mut frame: Frame) {
        let call_id = frame.call_id;
        let draining = self.shutdown.is_cancelled();
        if self.calls.contains_key(&call_id) {
            log::warn!("{call_id} call id is already in flight, ignoring open");
            return;
        }
        let method = std::mem::take(&mut frame.method);
        log::debug!("{call_id} new call {method}");

        let (inbound_sender, inbound) = mpsc::channel(self.max_queued_inbound_messages);
        let context = CallContext::new(
            call_id,
            method,
            frame.take_metadata(),
            self.outbound.clone(),
            self.max_frame_length,
            &self.cancellation,
        );
        self.calls.insert(
            call_id,
            LiveCall {
                inbound: Some(inbound_sender),
                context: context.clone(),
            },
        );

        let call = ServerCall::new(context.clone(), inbound);
        let service = self.service.clone();
        let enable_reflection = self.enable_reflection;
        self.tasks.spawn(async move {
            let result = if draining {
                Err(Status::unavailable("server is shutting down"))
            } else {
                dispatch(&*service, call, enable_reflection).await
            };
            context.finish(result).await;
            call_id
        });
    }
}

async fn dispatch<S>(service: &S, call: ServerCall, enable_reflection: bool) -> Result<(), Status>
where
    S: Service,
{
    if enable_reflection && call.method() == reflection::LIST_METHODS {
        return call
            .unary(|_request: Request<ListMethodsRequest>| async {
                Ok(reflection::list_methods(S::NAME, S::METHODS))
            })
            .await;
    }
    if !S::METHODS.iter().any(|method| method.path == call.method()) {
        return Err(Status::unimplemented(format!(
            "unknown method {}",
            call.method()
        )));
    }
    let call_id = call.context().call_id();
    match AssertUnwindSafe(service.call(call)).catch_unwind().await {
        Ok(result) => result,
        Err(_panic) => {
            log::error!("{call_id} call handler panicked");
            Err(Status::internal("call handler panicked"))
        }
    }
}
