use greetsocket_wire::Metadata;

/// The result of a call that completes with a single response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    header: Metadata,
    message: T,
    trailer: Metadata,
}

impl<T> Response<T> {
    pub(crate) fn new(header: Metadata, message: T, trailer: Metadata) -> Self {
        Self {
            header,
            message,
            trailer,
        }
    }

    /// Header metadata the server sent before the response.
    pub fn header(&self) -> &Metadata {
        &self.header
    }

    /// Trailer metadata the server sent when the call completed.
    pub fn trailer(&self) -> &Metadata {
        &self.trailer
    }

    pub fn get_ref(&self) -> &T {
        &self.message
    }

    pub fn into_inner(self) -> T {
        self.message
    }

    pub fn into_parts(self) -> (Metadata, T, Metadata) {
        (self.header, self.message, self.trailer)
    }
}
