use std::time::Duration;

use greetsocket_rpc::server::{Request, ResponseSender, Streaming};
use greetsocket_wire::{Code, DebugInfo, ErrorDetail, Metadata, Status};

use crate::{
    messages::{HelloRequest, HelloResponse},
    service::GreetingService,
};

#[derive(Clone, Debug)]
pub struct GreeterConfiguration {
    stream_count: usize,
    stream_interval: Duration,
    fail_hello: bool,
}

impl Default for GreeterConfiguration {
    fn default() -> Self {
        Self {
            stream_count: 5,
            stream_interval: Duration::from_secs(1),
            fail_hello: false,
        }
    }
}

impl GreeterConfiguration {
    /// How many greetings `HelloServerStream` sends.
    ///
    /// Default: 5
    pub fn stream_count(&mut self, stream_count: usize) {
        self.stream_count = stream_count;
    }

    /// The pause between `HelloServerStream` greetings.
    ///
    /// Default: 1s
    pub fn stream_interval(&mut self, stream_interval: Duration) {
        self.stream_interval = stream_interval;
    }

    /// Make every `Hello` call fail with a `DebugInfo` detail.
    ///
    /// Default: false
    pub fn fail_hello(&mut self, fail_hello: bool) {
        self.fail_hello = fail_hello;
    }
}

/// The greeting service: greets every name it is sent.
#[derive(Debug, Default)]
pub struct Greeter {
    configuration: GreeterConfiguration,
}

impl Greeter {
    pub fn new(configuration: GreeterConfiguration) -> Self {
        Self { configuration }
    }
}

impl GreetingService for Greeter {
    async fn hello(&self, request: Request<HelloRequest>) -> Result<HelloResponse, Status> {
        log_incoming_metadata(request.context().method(), request.metadata());
        let context = request.context();
        context.set_header(phase_metadata("unary", "header"))?;
        context.set_trailer(phase_metadata("unary", "trailer"));

        if self.configuration.fail_hello {
            return Err(Status::with_details(
                Code::Unknown,
                "unknown error occurred",
                [ErrorDetail::from(DebugInfo::new(
                    "error occurred in Hello method",
                ))],
            ));
        }
        Ok(HelloResponse {
            message: greeting(&request.get_ref().name),
        })
    }

    async fn hello_server_stream(
        &self,
        request: Request<HelloRequest>,
        mut responses: ResponseSender<HelloResponse>,
    ) -> Result<(), Status> {
        let context = request.context();
        let name = &request.get_ref().name;
        for index in 0..self.configuration.stream_count {
            if 0 < index {
                tokio::select! {
                    _ = context.cancelled() => {
                        log::debug!("{} caller cancelled before greeting {index}", context.call_id());
                        return Ok(());
                    }
                    _ = tokio::time::sleep(self.configuration.stream_interval) => (),
                }
            }
            let response = HelloResponse {
                message: format!("[{index}] {}", greeting(name)),
            };
            if let Err(status) = responses.send(response).await {
                if context.is_cancelled() {
                    log::debug!("{} caller cancelled at greeting {index}", context.call_id());
                    return Ok(());
                }
                return Err(status);
            }
        }
        Ok(())
    }

    async fn hello_client_stream(
        &self,
        requests: Request<Streaming<HelloRequest>>,
    ) -> Result<HelloResponse, Status> {
        let (_context, mut requests) = requests.into_parts();
        let mut names = Vec::new();
        while let Some(request) = requests.message().await? {
            names.push(request.name);
        }
        Ok(HelloResponse {
            message: roll_call(&names),
        })
    }

    async fn hello_bi_streams(
        &self,
        requests: Request<Streaming<HelloRequest>>,
        mut responses: ResponseSender<HelloResponse>,
    ) -> Result<(), Status> {
        let (context, mut requests) = requests.into_parts();
        log_incoming_metadata(context.method(), context.metadata());
        context
            .send_header(phase_metadata("stream", "header"))
            .await?;
        context.set_trailer(phase_metadata("stream", "trailer"));

        while let Some(request) = requests.message().await? {
            responses
                .send(HelloResponse {
                    message: greeting(&request.name),
                })
                .await?;
        }
        Ok(())
    }
}

fn greeting(name: &str) -> String {
    format!("Hello, {name}!")
}

fn roll_call(names: &[String]) -> String {
    format!("Hello, [{}]!", names.join(" "))
}

fn phase_metadata(call_type: &str, phase: &str) -> Metadata {
    Metadata::from_pairs([("type", call_type), ("from", "server"), ("in", phase)])
}

fn log_incoming_metadata(method: &str, metadata: &Metadata) {
    for (key, value) in metadata.iter() {
        log::info!("{method} incoming metadata {key}: {value}");
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{greeting, phase_metadata, roll_call, GreeterConfiguration};

    #[test]
    fn defaults_are_five_greetings_a_second_apart() {
        let configuration = GreeterConfiguration::default();
        assert_eq!(5, configuration.stream_count);
        assert_eq!(Duration::from_secs(1), configuration.stream_interval);
        assert!(!configuration.fail_hello);
    }

    #[test]
    fn greetings() {
        assert_eq!("Hello, World!", greeting("World"));
        assert_eq!("Hello, !", greeting(""));
    }

    #[test]
    fn roll_call_keeps_order_and_duplicates() {
        let names = ["B", "A", "B"].map(String::from);
        assert_eq!("Hello, [B A B]!", roll_call(&names));
        assert_eq!("Hello, []!", roll_call(&[]));
    }

    #[test]
    fn phases() {
        let header = phase_metadata("unary", "header");
        assert_eq!(
            vec![("type", "unary"), ("from", "server"), ("in", "header")],
            header.iter().collect::<Vec<_>>()
        );
    }
}
