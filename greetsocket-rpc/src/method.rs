/// The four ways a call can exchange messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum CallShape {
    /// One request, one response.
    Unary = 0,
    /// One request, many responses.
    ServerStreaming = 1,
    /// Many requests, one response.
    ClientStreaming = 2,
    /// Independent streams of requests and responses.
    Bidirectional = 3,
}

/// A method a service answers, addressed by its full path like `/greeting.GreetingService/Hello`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub path: &'static str,
    pub shape: CallShape,
}

impl MethodDescriptor {
    pub const fn new(path: &'static str, shape: CallShape) -> Self {
        Self { path, shape }
    }
}
