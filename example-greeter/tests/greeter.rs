use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};

use example_greeter::{
    Greeter, GreeterConfiguration, GreetingService, GreetingServiceClient, GreetingServiceServer,
    HelloRequest, HelloResponse, HELLO, HELLO_BI_STREAMS, HELLO_CLIENT_STREAM,
    HELLO_SERVER_STREAM,
};
use greetsocket_rpc::{
    server::{self, Request, ResponseSender, RpcServer, Streaming},
    CallShape,
};
use greetsocket_wire::{Code, Metadata, Status};
use tokio::{net::TcpListener, sync::mpsc};

const INTERVAL: Duration = Duration::from_millis(50);

fn request(name: &str) -> HelloRequest {
    HelloRequest {
        name: name.to_string(),
    }
}

fn quick_greeter() -> GreeterConfiguration {
    let mut configuration = GreeterConfiguration::default();
    configuration.stream_interval(INTERVAL);
    configuration
}

async fn serve<S>(service: S) -> SocketAddr
where
    S: GreetingService,
{
    let _ = env_logger::builder().is_test(true).try_init();
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("can bind a local port");
    let mut configuration = server::Configuration::default();
    configuration.enable_reflection(true);
    let server = RpcServer::new(listener, GreetingServiceServer::new(service), configuration);
    let address = server.local_addr().expect("listener has an address");
    tokio::spawn(server.serve());
    address
}

async fn connect(address: SocketAddr) -> GreetingServiceClient {
    let (client, driver) = GreetingServiceClient::connect(address)
        .await
        .expect("can connect");
    tokio::spawn(driver);
    client
}

async fn greeter_client(configuration: GreeterConfiguration) -> GreetingServiceClient {
    connect(serve(Greeter::new(configuration)).await).await
}

fn phase(call_type: &str, phase: &str) -> Metadata {
    Metadata::from_pairs([("type", call_type), ("from", "server"), ("in", phase)])
}

#[tokio::test]
async fn hello_greets_any_name() {
    let client = greeter_client(quick_greeter()).await;

    for name in ["World", "", "Ünïcødé 世界", "a name with spaces"] {
        let response = client
            .hello(Metadata::new(), request(name))
            .await
            .expect("hello succeeds");
        assert_eq!(format!("Hello, {name}!"), response.get_ref().message);
    }
}

#[tokio::test]
async fn hello_sends_header_and_trailer() {
    let client = greeter_client(quick_greeter()).await;

    let response = client
        .hello(
            Metadata::from_pairs([("Type", "unary"), ("from", "client")]),
            request("World"),
        )
        .await
        .expect("hello succeeds");

    assert_eq!(&phase("unary", "header"), response.header());
    assert_eq!(&phase("unary", "trailer"), response.trailer());
}

#[tokio::test]
async fn hello_failure_has_debug_info_and_trailer() {
    let mut configuration = quick_greeter();
    configuration.fail_hello(true);
    let client = greeter_client(configuration).await;

    let status = client
        .hello(Metadata::new(), request("World"))
        .await
        .expect_err("hello is configured to fail");

    assert_eq!(Code::Unknown, status.code());
    assert_eq!("unknown error occurred", status.message());
    assert_eq!(1, status.details().len());
    assert_eq!(
        Some("error occurred in Hello method"),
        status.debug_info().map(|debug_info| debug_info.detail.as_str())
    );
    assert_eq!(&phase("unary", "trailer"), status.metadata());
}

#[tokio::test]
async fn server_stream_sends_five_spaced_greetings() {
    let client = greeter_client(quick_greeter()).await;

    let started = Instant::now();
    let mut call = client
        .hello_server_stream(Metadata::new(), request("X"))
        .await
        .expect("call starts");
    let mut received = Vec::new();
    let mut arrivals = Vec::new();
    while let Some(response) = call.message().await.expect("stream succeeds") {
        arrivals.push(started.elapsed());
        received.push(response.message);
    }

    assert_eq!(
        vec![
            "[0] Hello, X!",
            "[1] Hello, X!",
            "[2] Hello, X!",
            "[3] Hello, X!",
            "[4] Hello, X!",
        ],
        received
    );
    for (index, arrival) in arrivals.iter().enumerate() {
        assert!(
            INTERVAL * index as u32 <= *arrival,
            "greeting {index} arrived after {arrival:?}"
        );
    }
    assert_eq!(Some(Code::Ok), call.status().map(Status::code));
    assert_eq!(Ok(None), call.message().await, "nothing after the last greeting");
}

#[tokio::test]
async fn server_stream_count_is_configurable() {
    let mut configuration = quick_greeter();
    configuration.stream_count(2);
    configuration.stream_interval(Duration::ZERO);
    let client = greeter_client(configuration).await;

    let mut call = client
        .hello_server_stream(Metadata::new(), request("Y"))
        .await
        .expect("call starts");
    let mut received = Vec::new();
    while let Some(response) = call.message().await.expect("stream succeeds") {
        received.push(response.message);
    }
    assert_eq!(vec!["[0] Hello, Y!", "[1] Hello, Y!"], received);
}

#[tokio::test]
async fn client_stream_collects_names_in_order() {
    let client = greeter_client(quick_greeter()).await;

    let mut call = client
        .hello_client_stream(Metadata::new())
        .await
        .expect("call starts");
    for name in ["A", "B", "A"] {
        call.send(request(name)).await.expect("send works");
    }
    let response = call.finish().await.expect("greeting for everyone");
    assert_eq!("Hello, [A B A]!", response.get_ref().message);

    let call = client
        .hello_client_stream(Metadata::new())
        .await
        .expect("call starts");
    let response = call.finish().await.expect("greeting for no one");
    assert_eq!("Hello, []!", response.get_ref().message);
}

#[tokio::test]
async fn bidi_echoes_one_for_one() {
    let client = greeter_client(quick_greeter()).await;

    let mut call = client
        .hello_bi_streams(Metadata::from_pairs([("from", "client")]))
        .await
        .expect("call starts");

    assert_eq!(
        &phase("stream", "header"),
        call.header().await.expect("header is sent before any greeting")
    );
    assert_eq!(None, call.trailer(), "no trailer while the call is open");

    for name in ["A", "B", "C"] {
        call.send(request(name)).await.expect("send works");
        assert_eq!(
            Some(HelloResponse {
                message: format!("Hello, {name}!"),
            }),
            call.message().await.expect("one greeting per name")
        );
    }
    call.close_send().await.expect("close works");

    assert_eq!(Ok(None), call.message().await, "call ends cleanly");
    assert_eq!(Some(&phase("stream", "trailer")), call.trailer());
}

/// Reports how each server-streaming handler ended.
struct RecordingGreeter {
    greeter: Greeter,
    outcomes: mpsc::UnboundedSender<Result<(), Status>>,
}

impl GreetingService for RecordingGreeter {
    async fn hello(&self, request: Request<HelloRequest>) -> Result<HelloResponse, Status> {
        self.greeter.hello(request).await
    }

    async fn hello_server_stream(
        &self,
        request: Request<HelloRequest>,
        responses: ResponseSender<HelloResponse>,
    ) -> Result<(), Status> {
        let outcome = self.greeter.hello_server_stream(request, responses).await;
        let _ = self.outcomes.send(outcome.clone());
        outcome
    }

    async fn hello_client_stream(
        &self,
        requests: Request<Streaming<HelloRequest>>,
    ) -> Result<HelloResponse, Status> {
        self.greeter.hello_client_stream(requests).await
    }

    async fn hello_bi_streams(
        &self,
        requests: Request<Streaming<HelloRequest>>,
        responses: ResponseSender<HelloResponse>,
    ) -> Result<(), Status> {
        self.greeter.hello_bi_streams(requests, responses).await
    }
}

#[tokio::test]
async fn cancelled_server_stream_stops_without_error() {
    let mut configuration = GreeterConfiguration::default();
    configuration.stream_interval(Duration::from_millis(300));
    let (outcomes, mut recorded) = mpsc::unbounded_channel();
    let address = serve(RecordingGreeter {
        greeter: Greeter::new(configuration),
        outcomes,
    })
    .await;
    let client = connect(address).await;

    let mut call = client
        .hello_server_stream(Metadata::new(), request("X"))
        .await
        .expect("call starts");
    for index in 0..3 {
        let response = call
            .message()
            .await
            .expect("stream is healthy")
            .expect("more greetings are coming");
        assert_eq!(format!("[{index}] Hello, X!"), response.message);
    }
    call.cancel();

    let outcome = tokio::time::timeout(Duration::from_millis(250), recorded.recv())
        .await
        .expect("handler stops before its next greeting")
        .expect("handler reports its outcome");
    assert_eq!(Ok(()), outcome);
}

#[tokio::test]
async fn reflection_lists_the_greeting_methods() {
    let client = greeter_client(quick_greeter()).await;

    let listing = client.list_methods().await.expect("reflection is on");

    assert_eq!("greeting.GreetingService", listing.service);
    let methods: Vec<(&str, CallShape)> = listing
        .methods
        .iter()
        .map(|method| (method.path.as_str(), method.shape()))
        .collect();
    assert_eq!(
        vec![
            (HELLO, CallShape::Unary),
            (HELLO_SERVER_STREAM, CallShape::ServerStreaming),
            (HELLO_CLIENT_STREAM, CallShape::ClientStreaming),
            (HELLO_BI_STREAMS, CallShape::Bidirectional),
        ],
        methods
    );
}
