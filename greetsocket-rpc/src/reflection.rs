//! Lets a caller discover what a server hosts.
//!
//! When enabled on the server, `/greetsocket.reflection.ServerReflection/ListMethods` is a
//! unary call that answers with the hosted service name and each of its methods.

use crate::{CallShape, MethodDescriptor};

/// Path of the reflection call.
pub const LIST_METHODS: &str = "/greetsocket.reflection.ServerReflection/ListMethods";

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct ListMethodsRequest {}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct ListMethodsResponse {
    #[prost(string, tag = "1")]
    pub service: String,
    #[prost(message, repeated, tag = "2")]
    pub methods: Vec<MethodInfo>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct MethodInfo {
    #[prost(string, tag = "1")]
    pub path: String,
    #[prost(enumeration = "CallShape", tag = "2")]
    pub shape: i32,
}

pub(crate) fn list_methods(service: &str, methods: &[MethodDescriptor]) -> ListMethodsResponse {
    ListMethodsResponse {
        service: service.to_string(),
        methods: methods
            .iter()
            .map(|method| MethodInfo {
                path: method.path.to_string(),
                shape: method.shape as i32,
            })
            .collect(),
    }
}
