//! A greeting service with one method per call shape, hosted on greetsocket-rpc.
//!
//! Run `greeter-server`, then try `greeter-client hello World` or
//! `greeter-client bidi A B C`.

mod client;
mod greeter;
mod messages;
mod service;

pub use client::GreetingServiceClient;
pub use greeter::{Greeter, GreeterConfiguration};
pub use messages::{HelloRequest, HelloResponse};
pub use service::{
    GreetingService, GreetingServiceServer, HELLO, HELLO_BI_STREAMS, HELLO_CLIENT_STREAM,
    HELLO_SERVER_STREAM, SERVICE_NAME,
};
