use std::{error::Error, net::SocketAddr, str::FromStr, time::Duration};

use example_greeter::{Greeter, GreeterConfiguration, GreetingServiceServer};
use greetsocket_rpc::server::{Configuration, RpcServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let address: SocketAddr = std::env::var("HOST")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;

    let mut greeter_configuration = GreeterConfiguration::default();
    if let Some(stream_count) = env_var("STREAM_COUNT")? {
        greeter_configuration.stream_count(stream_count);
    }
    if let Some(interval_millis) = env_var("STREAM_INTERVAL_MS")? {
        greeter_configuration.stream_interval(Duration::from_millis(interval_millis));
    }
    if let Some(fail_hello) = env_var("FAIL_HELLO")? {
        greeter_configuration.fail_hello(fail_hello);
    }

    let mut configuration = Configuration::default();
    configuration.enable_reflection(true);
    if let Some(drain_secs) = env_var("DRAIN_TIMEOUT_SECS")? {
        configuration.drain_timeout(Duration::from_secs(drain_secs));
    }

    let server = RpcServer::bind(
        address,
        GreetingServiceServer::new(Greeter::new(greeter_configuration)),
        configuration,
    )
    .await?;
    server.serve_with_shutdown(ctrl_c()).await?;
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("cannot listen for ctrl-c, serving until killed: {e:?}");
        std::future::pending::<()>().await;
    }
}

fn env_var<T>(key: &str) -> Result<Option<T>, Box<dyn Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|e| format!("invalid {key} {value:?}: {e}").into()),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(format!("invalid {key}: {e}").into()),
    }
}
