use std::net::SocketAddr;

use greetsocket_rpc::{
    client::{self, Call, ClientDriver, Response, RpcClient},
    reflection::{ListMethodsRequest, ListMethodsResponse, LIST_METHODS},
};
use greetsocket_wire::{Metadata, Status};

use crate::{
    messages::{HelloRequest, HelloResponse},
    service::{HELLO, HELLO_BI_STREAMS, HELLO_CLIENT_STREAM, HELLO_SERVER_STREAM},
};

/// A typed client for `greeting.GreetingService`.
#[derive(Debug, Clone)]
pub struct GreetingServiceClient {
    client: RpcClient,
}

impl GreetingServiceClient {
    pub fn new(client: RpcClient) -> Self {
        Self { client }
    }

    /// Connect with the default configuration. Spawn the returned driver.
    pub async fn connect(
        address: SocketAddr,
    ) -> greetsocket_rpc::Result<(Self, ClientDriver)> {
        let (client, driver) = client::connect(address, &client::Configuration::default()).await?;
        Ok((Self::new(client), driver))
    }

    pub async fn hello(
        &self,
        metadata: Metadata,
        request: HelloRequest,
    ) -> Result<Response<HelloResponse>, Status> {
        self.client.unary(HELLO, metadata, request).await
    }

    pub async fn hello_server_stream(
        &self,
        metadata: Metadata,
        request: HelloRequest,
    ) -> Result<Call<HelloRequest, HelloResponse>, Status> {
        self.client
            .server_streaming(HELLO_SERVER_STREAM, metadata, request)
            .await
    }

    /// Send names on the returned call, then `finish()` it for the greeting.
    pub async fn hello_client_stream(
        &self,
        metadata: Metadata,
    ) -> Result<Call<HelloRequest, HelloResponse>, Status> {
        self.client
            .client_streaming(HELLO_CLIENT_STREAM, metadata)
            .await
    }

    pub async fn hello_bi_streams(
        &self,
        metadata: Metadata,
    ) -> Result<Call<HelloRequest, HelloResponse>, Status> {
        self.client.bidirectional(HELLO_BI_STREAMS, metadata).await
    }

    /// Ask the server what it hosts. Only answered when the server enables reflection.
    pub async fn list_methods(&self) -> Result<ListMethodsResponse, Status> {
        self.client
            .unary(LIST_METHODS, Metadata::new(), ListMethodsRequest {})
            .await
            .map(Response::into_inner)
    }
}
