use std::time::Duration;

use greetsocket_wire::DEFAULT_MAX_FRAME_LENGTH;

/// Configuration for a greetsocket rpc server.
#[derive(Debug, Clone)]
pub struct Configuration {
    max_frame_length: usize,
    max_queued_outbound_messages: usize,
    max_queued_inbound_messages: usize,
    drain_timeout: Duration,
    enable_reflection: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            max_queued_outbound_messages: 256,
            max_queued_inbound_messages: 256,
            drain_timeout: Duration::from_secs(30),
            enable_reflection: false,
        }
    }
}

impl Configuration {
    /// Largest frame the server reads or writes. Larger inbound frames close the connection.
    ///
    /// Default: 4MiB
    pub fn max_frame_length(&mut self, max_frame_length: usize) {
        self.max_frame_length = max_frame_length;
    }

    /// Frames that may wait for the network per connection before senders are made to wait.
    ///
    /// Default: 256
    pub fn max_queued_outbound_messages(&mut self, max_queued_outbound_messages: usize) {
        self.max_queued_outbound_messages = max_queued_outbound_messages;
    }

    /// Requests that may wait for one call's handler to read them. A call whose handler falls
    /// further behind is cancelled and fails with `ResourceExhausted`.
    ///
    /// Default: 256
    pub fn max_queued_inbound_messages(&mut self, max_queued_inbound_messages: usize) {
        self.max_queued_inbound_messages = max_queued_inbound_messages;
    }

    /// How long shutdown waits for in-flight calls before closing their connections.
    ///
    /// Default: 30 seconds
    pub fn drain_timeout(&mut self, drain_timeout: Duration) {
        self.drain_timeout = drain_timeout;
    }

    /// Answer `ListMethods` reflection calls.
    ///
    /// Default: false
    pub fn enable_reflection(&mut self, enable_reflection: bool) {
        self.enable_reflection = enable_reflection;
    }

    pub(crate) fn get_max_frame_length(&self) -> usize {
        self.max_frame_length
    }

    pub(crate) fn get_max_queued_outbound_messages(&self) -> usize {
        self.max_queued_outbound_messages.max(1)
    }

    pub(crate) fn get_max_queued_inbound_messages(&self) -> usize {
        self.max_queued_inbound_messages.max(1)
    }

    pub(crate) fn get_drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    pub(crate) fn get_enable_reflection(&self) -> bool {
        self.enable_reflection
    }
}
