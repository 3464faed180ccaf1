use std::{error::Error, net::SocketAddr};

use example_greeter::{GreetingServiceClient, HelloRequest};
use greetsocket_wire::{Metadata, Status};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let endpoint: SocketAddr = std::env::var("ENDPOINT")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;
    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "hello".to_string());
    let names: Vec<String> = args.collect();

    let (client, driver) = GreetingServiceClient::connect(endpoint).await?;
    let driver = tokio::spawn(driver);

    let outcome = match command.as_str() {
        "hello" => hello(&client, names).await,
        "server-stream" => server_stream(&client, names).await,
        "client-stream" => client_stream(&client, names).await,
        "bidi" => bidi(&client, names).await,
        "reflect" => reflect(&client).await,
        other => {
            return Err(format!(
                "unknown command {other}, expected hello, server-stream, client-stream, bidi or reflect"
            )
            .into())
        }
    };
    if let Err(status) = &outcome {
        print_status(status);
    }

    // the driver finishes once every client handle is gone
    drop(client);
    driver.await??;
    outcome.map_err(Into::into)
}

fn request(name: String) -> HelloRequest {
    HelloRequest { name }
}

fn client_metadata(call_type: &str) -> Metadata {
    Metadata::from_pairs([("type", call_type), ("from", "client")])
}

fn or_world(names: Vec<String>) -> Vec<String> {
    if names.is_empty() {
        vec!["World".to_string()]
    } else {
        names
    }
}

async fn hello(client: &GreetingServiceClient, names: Vec<String>) -> Result<(), Status> {
    for name in or_world(names) {
        let response = client.hello(client_metadata("unary"), request(name)).await?;
        print_metadata("header", response.header());
        println!("{}", response.get_ref().message);
        print_metadata("trailer", response.trailer());
    }
    Ok(())
}

async fn server_stream(client: &GreetingServiceClient, names: Vec<String>) -> Result<(), Status> {
    for name in or_world(names) {
        let mut call = client
            .hello_server_stream(client_metadata("stream"), request(name))
            .await?;
        print_metadata("header", call.header().await?);
        while let Some(response) = call.message().await? {
            println!("{}", response.message);
        }
    }
    Ok(())
}

async fn client_stream(client: &GreetingServiceClient, names: Vec<String>) -> Result<(), Status> {
    let mut call = client.hello_client_stream(client_metadata("stream")).await?;
    for name in names {
        call.send(request(name)).await?;
    }
    let response = call.finish().await?;
    println!("{}", response.get_ref().message);
    Ok(())
}

async fn bidi(client: &GreetingServiceClient, names: Vec<String>) -> Result<(), Status> {
    let mut call = client.hello_bi_streams(client_metadata("stream")).await?;
    print_metadata("header", call.header().await?);
    for name in names {
        call.send(request(name)).await?;
        match call.message().await? {
            Some(response) => println!("{}", response.message),
            None => return Err(Status::internal("server ended the call early")),
        }
    }
    call.close_send().await?;
    while let Some(response) = call.message().await? {
        println!("unexpected extra response: {}", response.message);
    }
    if let Some(trailer) = call.trailer() {
        print_metadata("trailer", trailer);
    }
    Ok(())
}

async fn reflect(client: &GreetingServiceClient) -> Result<(), Status> {
    let listing = client.list_methods().await?;
    println!("{}", listing.service);
    for method in listing.methods {
        println!("  {} ({:?})", method.path, method.shape());
    }
    Ok(())
}

fn print_metadata(phase: &str, metadata: &Metadata) {
    for (key, value) in metadata.iter() {
        println!("{phase} {key}: {value}");
    }
}

fn print_status(status: &Status) {
    println!("error {}: {}", status.code(), status.message());
    if let Some(debug_info) = status.debug_info() {
        println!("debug info: {}", debug_info.detail);
        for entry in &debug_info.stack_entries {
            println!("  {entry}");
        }
    }
    print_metadata("trailer", status.metadata());
}
