use std::{net::SocketAddr, time::Duration};

use futures::{SinkExt, StreamExt};
use greetsocket_rpc::{
    client::{self, RpcClient},
    reflection::{ListMethodsRequest, ListMethodsResponse, LIST_METHODS},
    server::{self, Request, ResponseSender, RpcServer, ServerCall, Service, Streaming},
    CallShape, MethodDescriptor,
};
use greetsocket_wire::{
    decode_payload, encode_payload, Code, Frame, FrameCodec, FrameKind, Metadata, Status,
};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tokio_util::{codec::Framed, sync::CancellationToken};

#[derive(Clone, PartialEq, Eq, prost::Message)]
struct Word {
    #[prost(string, tag = "1")]
    text: String,
}

fn word(text: &str) -> Word {
    Word {
        text: text.to_string(),
    }
}

const ECHO: &str = "/test.Echo/Echo";
const SLOW: &str = "/test.Echo/Slow";
const IGNORE: &str = "/test.Echo/Ignore";

/// Bigger than the default frame limit.
const OVERSIZED: usize = 5 << 20;

struct EchoService;

impl Service for EchoService {
    const NAME: &'static str = "test.Echo";
    const METHODS: &'static [MethodDescriptor] = &[
        MethodDescriptor::new(ECHO, CallShape::Unary),
        MethodDescriptor::new(SLOW, CallShape::ServerStreaming),
        MethodDescriptor::new(IGNORE, CallShape::Bidirectional),
    ];

    async fn call(&self, call: ServerCall) -> Result<(), Status> {
        let method = call.method().to_string();
        match method.as_str() {
            ECHO => {
                call.unary(|request: Request<Word>| async move {
                    match request.get_ref().text.as_str() {
                        "panic" => panic!("the handler has a bug"),
                        "big" => Ok(word(&"x".repeat(OVERSIZED))),
                        _ => Ok(request.into_inner()),
                    }
                })
                .await
            }
            SLOW => {
                call.server_streaming(
                    |request: Request<Word>, mut responses: ResponseSender<Word>| async move {
                        for _ in 0..3 {
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            responses.send(request.get_ref().clone()).await?;
                        }
                        Ok(())
                    },
                )
                .await
            }
            IGNORE => {
                call.bidirectional(
                    |requests: Request<Streaming<Word>>, _responses: ResponseSender<Word>| async move {
                        // never reads a request
                        requests.context().cancelled().await;
                        Ok(())
                    },
                )
                .await
            }
            _ => Err(Status::unimplemented(method)),
        }
    }
}

struct TestServer {
    address: SocketAddr,
    shutdown: CancellationToken,
    serving: JoinHandle<greetsocket_rpc::Result<()>>,
}

async fn start_server(configuration: server::Configuration) -> TestServer {
    let _ = env_logger::builder().is_test(true).try_init();
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("can bind a local port");
    let server = RpcServer::new(listener, EchoService, configuration);
    let address = server.local_addr().expect("listener has an address");
    let shutdown = server.shutdown_token();
    let serving = tokio::spawn(server.serve());
    TestServer {
        address,
        shutdown,
        serving,
    }
}

async fn connect(address: SocketAddr) -> RpcClient {
    let (client, driver) = client::connect(address, &client::Configuration::default())
        .await
        .expect("can connect");
    tokio::spawn(driver);
    client
}

#[tokio::test]
async fn unary_echo_round_trip() {
    let server = start_server(Default::default()).await;
    let client = connect(server.address).await;

    let response = client
        .unary::<Word, Word>(ECHO, Metadata::new(), word("hi"))
        .await
        .expect("echo works");

    assert_eq!("hi", response.get_ref().text);
    assert!(response.header().is_empty());
    assert!(response.trailer().is_empty());
}

#[tokio::test]
async fn unknown_methods_are_unimplemented() {
    let server = start_server(Default::default()).await;
    let client = connect(server.address).await;

    let status = client
        .unary::<Word, Word>("/test.Echo/Missing", Metadata::new(), word("hi"))
        .await
        .expect_err("no such method");
    assert_eq!(Code::Unimplemented, status.code());

    let status = client
        .unary::<ListMethodsRequest, ListMethodsResponse>(
            LIST_METHODS,
            Metadata::new(),
            ListMethodsRequest {},
        )
        .await
        .expect_err("reflection is off by default");
    assert_eq!(Code::Unimplemented, status.code());
}

#[tokio::test]
async fn reflection_lists_methods() {
    let mut configuration = server::Configuration::default();
    configuration.enable_reflection(true);
    let server = start_server(configuration).await;
    let client = connect(server.address).await;

    let listing = client
        .unary::<ListMethodsRequest, ListMethodsResponse>(
            LIST_METHODS,
            Metadata::new(),
            ListMethodsRequest {},
        )
        .await
        .expect("reflection is on")
        .into_inner();

    assert_eq!("test.Echo", listing.service);
    let methods: Vec<(String, CallShape)> = listing
        .methods
        .iter()
        .map(|method| (method.path.clone(), method.shape()))
        .collect();
    assert_eq!(
        vec![
            (ECHO.to_string(), CallShape::Unary),
            (SLOW.to_string(), CallShape::ServerStreaming),
            (IGNORE.to_string(), CallShape::Bidirectional),
        ],
        methods
    );
}

#[tokio::test]
async fn panicking_handler_is_internal_and_connection_survives() {
    let server = start_server(Default::default()).await;
    let client = connect(server.address).await;

    let status = client
        .unary::<Word, Word>(ECHO, Metadata::new(), word("panic"))
        .await
        .expect_err("handler panics");
    assert_eq!(Code::Internal, status.code());

    let response = client
        .unary::<Word, Word>(ECHO, Metadata::new(), word("still here"))
        .await
        .expect("connection is still usable");
    assert_eq!("still here", response.into_inner().text);
}

#[tokio::test]
async fn shutdown_drains_in_flight_calls() {
    let server = start_server(Default::default()).await;
    let client = connect(server.address).await;

    let mut slow = client
        .server_streaming::<Word, Word>(SLOW, Metadata::new(), word("tick"))
        .await
        .expect("call starts");
    assert_eq!(
        Some(word("tick")),
        slow.message().await.expect("first response")
    );

    server.shutdown.cancel();

    let refused = client
        .unary::<Word, Word>(ECHO, Metadata::new(), word("late"))
        .await
        .expect_err("no new calls while draining");
    assert_eq!(Code::Unavailable, refused.code());

    let mut remaining = 0;
    while let Some(response) = slow.message().await.expect("in-flight call finishes") {
        assert_eq!("tick", response.text);
        remaining += 1;
    }
    assert_eq!(2, remaining);
    assert_eq!(Some(Code::Ok), slow.status().map(Status::code));

    server
        .serving
        .await
        .expect("server task completes")
        .expect("server stops cleanly");
    assert!(
        client::connect(server.address, &client::Configuration::default())
            .await
            .is_err(),
        "listener is closed"
    );
}

#[tokio::test]
async fn drain_timeout_aborts_stragglers() {
    let mut configuration = server::Configuration::default();
    configuration.drain_timeout(Duration::from_millis(20));
    let server = start_server(configuration).await;
    let client = connect(server.address).await;

    let mut slow = client
        .server_streaming::<Word, Word>(SLOW, Metadata::new(), word("tick"))
        .await
        .expect("call starts");
    // make sure the call is in flight on the server before shutting down
    slow.header().await.expect("header arrives with the first response");

    server.shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server.serving)
        .await
        .expect("server stops after the drain timeout")
        .expect("server task completes")
        .expect("server stops cleanly");

    let mut outcome = slow.message().await;
    while let Ok(Some(_)) = outcome {
        outcome = slow.message().await;
    }
    assert_eq!(
        Some(Code::Unavailable),
        outcome.err().map(|status| status.code())
    );
}

#[tokio::test]
async fn handler_that_falls_behind_on_requests_is_aborted() {
    let mut configuration = server::Configuration::default();
    configuration.max_queued_inbound_messages(4);
    let server = start_server(configuration).await;
    let client = connect(server.address).await;

    let mut ignored = client
        .bidirectional::<Word, Word>(IGNORE, Metadata::new())
        .await
        .expect("call starts");
    for _ in 0..16 {
        ignored.send(word("unread")).await.expect("send is queued");
    }

    let status = tokio::time::timeout(Duration::from_secs(5), ignored.message())
        .await
        .expect("server ends the call")
        .expect_err("call is aborted");
    assert_eq!(Code::ResourceExhausted, status.code());

    let response = client
        .unary::<Word, Word>(ECHO, Metadata::new(), word("still here"))
        .await
        .expect("connection is still usable");
    assert_eq!("still here", response.into_inner().text);
}

#[tokio::test]
async fn oversized_response_fails_only_its_call() {
    let server = start_server(Default::default()).await;
    let client = connect(server.address).await;

    let mut slow = client
        .server_streaming::<Word, Word>(SLOW, Metadata::new(), word("tick"))
        .await
        .expect("call starts");

    let status = client
        .unary::<Word, Word>(ECHO, Metadata::new(), word("big"))
        .await
        .expect_err("response is over the frame limit");
    assert_eq!(Code::ResourceExhausted, status.code());

    let mut ticks = 0;
    while let Some(response) = slow.message().await.expect("sibling call is unaffected") {
        assert_eq!("tick", response.text);
        ticks += 1;
    }
    assert_eq!(3, ticks);
    assert!(client.is_alive());
}

#[tokio::test]
async fn oversized_request_fails_only_its_call() {
    let server = start_server(Default::default()).await;
    let client = connect(server.address).await;

    let status = client
        .unary::<Word, Word>(ECHO, Metadata::new(), word(&"x".repeat(OVERSIZED)))
        .await
        .expect_err("request is over the frame limit");
    assert_eq!(Code::ResourceExhausted, status.code());

    let response = client
        .unary::<Word, Word>(ECHO, Metadata::new(), word("small"))
        .await
        .expect("connection is still usable");
    assert_eq!("small", response.into_inner().text);
    assert!(client.is_alive());
}

async fn next_frame(frames: &mut Framed<TcpStream, FrameCodec>) -> Frame {
    tokio::time::timeout(Duration::from_secs(5), frames.next())
        .await
        .expect("a frame arrives")
        .expect("connection is open")
        .expect("frame decodes")
}

async fn send_unary(frames: &mut Framed<TcpStream, FrameCodec>, call_id: u64, text: &str) {
    frames
        .send(Frame::open(call_id, ECHO, Metadata::new()))
        .await
        .expect("open");
    frames
        .send(Frame::message(call_id, encode_payload(&word(text))))
        .await
        .expect("message");
    frames
        .send(Frame::half_close(call_id))
        .await
        .expect("half-close");
}

/// The echoed text of `call_id`, checking that no frame for another call arrives first.
async fn echoed(frames: &mut Framed<TcpStream, FrameCodec>, call_id: u64) -> String {
    let mut echoed = None;
    loop {
        let mut frame = next_frame(frames).await;
        assert_eq!(call_id, frame.call_id, "unexpected frame {frame:?}");
        match frame.kind() {
            FrameKind::Header => (),
            FrameKind::Message => {
                let word: Word = decode_payload(frame.payload).expect("word decodes");
                echoed = Some(word.text);
            }
            FrameKind::Trailer => {
                assert_eq!(Code::Ok, frame.take_status().code());
                return echoed.expect("echo before the trailer");
            }
            kind => panic!("unexpected frame kind {kind:?}"),
        }
    }
}

#[tokio::test]
async fn cancelled_call_id_is_reserved_until_its_handler_ends() {
    let server = start_server(Default::default()).await;
    let stream = TcpStream::connect(server.address)
        .await
        .expect("can connect");
    let mut frames = Framed::new(stream, FrameCodec::default());

    frames
        .send(Frame::open(1, SLOW, Metadata::new()))
        .await
        .expect("open");
    frames
        .send(Frame::message(1, encode_payload(&word("tick"))))
        .await
        .expect("message");
    frames.send(Frame::half_close(1)).await.expect("half-close");
    frames.send(Frame::cancel(1)).await.expect("cancel");

    // the slow handler is still sleeping, so this open is ignored
    send_unary(&mut frames, 1, "too early").await;
    send_unary(&mut frames, 2, "fresh").await;
    assert_eq!("fresh", echoed(&mut frames, 2).await);

    // the slow handler has noticed its cancellation by now
    tokio::time::sleep(Duration::from_millis(300)).await;
    send_unary(&mut frames, 1, "reused").await;
    assert_eq!("reused", echoed(&mut frames, 1).await);
}
