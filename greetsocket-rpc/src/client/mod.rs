mod call;
mod configuration;
mod driver;
mod response;
mod rpc_client;

pub use call::Call;
pub use configuration::{connect, Configuration};
pub use driver::ClientDriver;
pub use response::Response;
pub use rpc_client::RpcClient;
