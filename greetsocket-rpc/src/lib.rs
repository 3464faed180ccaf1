//! Greetsocket RPC
//!
//! This crate provides an rpc client and server with four call shapes: unary,
//! server-streaming, client-streaming and bidirectional-streaming. Every call can carry
//! metadata in three phases: incoming metadata from the caller, a header sent by the
//! server before its first response, and a trailer sent with the final status.
//! Failures are reported as a [`Status`](greetsocket_wire::Status) with a code, a
//! message and typed detail records.
//!
//! Messages are protocol buffers encoded with `prost`. Calls are multiplexed over one
//! tcp connection using the frames from `greetsocket-wire`.
//!
//! * On the server, implement [`server::Service`] and host it with [`server::RpcServer`].
//! * On the client, [`client::connect`] gives you an [`client::RpcClient`] and a driver
//!   future to spawn.
//!
//! Cancellation is supported in both directions. Dropping an unfinished client
//! [`client::Call`] cancels it on the server. A server call is also cancelled when its
//! connection goes away.
//!
//! See example-greeter for a complete service.

mod error;
mod method;

pub mod client;
pub mod reflection;
pub mod server;

pub use error::{Error, Result};
pub use method::{CallShape, MethodDescriptor};
