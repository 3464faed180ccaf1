mod call_context;
mod configuration;
mod connection_server;
mod server_call;
mod server_traits;
mod socket_server;
mod streaming;

pub use call_context::CallContext;
pub use configuration::Configuration;
pub use server_call::ServerCall;
pub use server_traits::Service;
pub use socket_server::RpcServer;
pub use streaming::{Request, ResponseSender, Streaming};
