#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct HelloRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct HelloResponse {
    #[prost(string, tag = "1")]
    pub message: String,
}
