use std::{
    net::SocketAddr,
    sync::{atomic::AtomicBool, Arc},
};

use greetsocket_wire::{FrameCodec, DEFAULT_MAX_FRAME_LENGTH};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};

use super::{driver::ClientDriver, RpcClient};

/// Configuration for a greetsocket rpc client.
#[derive(Debug, Clone)]
pub struct Configuration {
    max_frame_length: usize,
    max_queued_outbound_messages: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            max_queued_outbound_messages: 256,
        }
    }
}

impl Configuration {
    /// Largest frame the client reads or writes.
    ///
    /// Default: 4MiB
    pub fn max_frame_length(&mut self, max_frame_length: usize) {
        self.max_frame_length = max_frame_length;
    }

    /// Max messages that will be queued up waiting for send on the client channel.
    ///
    /// Default: 256
    pub fn max_queued_outbound_messages(&mut self, max_queued_outbound_messages: usize) {
        self.max_queued_outbound_messages = max_queued_outbound_messages;
    }
}

/// Connect a new greetsocket rpc client to a server.
///
/// You must spawn the returned `ClientDriver`; it does the network work for every call made
/// through the `RpcClient`.
pub async fn connect(
    address: SocketAddr,
    configuration: &Configuration,
) -> crate::Result<(RpcClient, ClientDriver)> {
    log::trace!("new client {address}, {configuration:?}");

    let stream = tokio::net::TcpStream::connect(address).await?;
    stream.set_nodelay(true)?;
    let (read_half, write_half) = stream.into_split();
    let codec = FrameCodec::new(configuration.max_frame_length);

    let (submissions, submission_queue) =
        mpsc::channel(configuration.max_queued_outbound_messages);
    let is_alive = Arc::new(AtomicBool::new(true));
    let rpc_client = RpcClient::new(
        submissions,
        is_alive.clone(),
        configuration.max_frame_length,
    );
    let driver = ClientDriver::new(
        FramedRead::new(read_half, codec.clone()),
        FramedWrite::new(write_half, codec),
        submission_queue,
        is_alive,
        address,
    );

    Ok((rpc_client, driver))
}
