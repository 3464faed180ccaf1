use std::fmt;

use crate::Metadata;

/// Type url of the [`DebugInfo`] detail record.
pub const DEBUG_INFO_TYPE_URL: &str = "type.googleapis.com/google.rpc.DebugInfo";

/// The categorical outcome of a call.
///
/// The numbering matches the usual rpc status codes so that the values are meaningful
/// to people who already know them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Code {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    /// Codes outside of the known range are read as `Unknown`.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::Ok,
            1 => Self::Cancelled,
            2 => Self::Unknown,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition,
            10 => Self::Aborted,
            11 => Self::OutOfRange,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            _ => Self::Unknown,
        }
    }

    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid argument",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::PermissionDenied => "permission denied",
            Self::ResourceExhausted => "resource exhausted",
            Self::FailedPrecondition => "failed precondition",
            Self::Aborted => "aborted",
            Self::OutOfRange => "out of range",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
            Self::DataLoss => "data loss",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Wire form of a [`Status`].
#[derive(Clone, PartialEq, prost::Message)]
pub struct StatusProto {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, repeated, tag = "3")]
    pub details: Vec<Any>,
}

/// A typed, encoded detail record.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

/// Diagnostic information for the developer on the calling side.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct DebugInfo {
    #[prost(string, repeated, tag = "1")]
    pub stack_entries: Vec<String>,
    #[prost(string, tag = "2")]
    pub detail: String,
}

impl DebugInfo {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            stack_entries: Vec::new(),
            detail: detail.into(),
        }
    }
}

/// A detail record attached to a [`Status`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorDetail {
    DebugInfo(DebugInfo),
    /// A record of a type this crate does not know. It is carried through untouched.
    Other(Any),
}

impl ErrorDetail {
    pub fn to_any(&self) -> Any {
        match self {
            Self::DebugInfo(debug_info) => Any {
                type_url: DEBUG_INFO_TYPE_URL.to_string(),
                value: prost::Message::encode_to_vec(debug_info),
            },
            Self::Other(any) => any.clone(),
        }
    }

    pub fn from_any(any: Any) -> Self {
        if any.type_url == DEBUG_INFO_TYPE_URL {
            match <DebugInfo as prost::Message>::decode(any.value.as_slice()) {
                Ok(debug_info) => return Self::DebugInfo(debug_info),
                Err(e) => {
                    log::debug!("could not decode debug info detail, keeping it opaque: {e:?}");
                }
            }
        }
        Self::Other(any)
    }
}

impl From<DebugInfo> for ErrorDetail {
    fn from(debug_info: DebugInfo) -> Self {
        Self::DebugInfo(debug_info)
    }
}

/// The outcome of a call: a code, a message for humans, and typed detail records.
///
/// On the calling side a `Status` also carries the trailer metadata that arrived with it.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("status {code}: {message}")]
pub struct Status {
    code: Code,
    message: String,
    details: Vec<ErrorDetail>,
    metadata: Metadata,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_details(
        code: Code,
        message: impl Into<String>,
        details: impl IntoIterator<Item = ErrorDetail>,
    ) -> Self {
        Self {
            details: details.into_iter().collect(),
            ..Self::new(code, message)
        }
    }

    pub fn ok() -> Self {
        Self::new(Code::Ok, "")
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(Code::Cancelled, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(Code::Unknown, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(Code::FailedPrecondition, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(Code::ResourceExhausted, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &[ErrorDetail] {
        &self.details
    }

    /// The first debug info record, if there is one.
    pub fn debug_info(&self) -> Option<&DebugInfo> {
        self.details.iter().find_map(|detail| match detail {
            ErrorDetail::DebugInfo(debug_info) => Some(debug_info),
            ErrorDetail::Other(_) => None,
        })
    }

    /// Trailer metadata delivered with this status.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Metadata is not part of the encoded status; it travels beside it in the trailer.
    pub fn to_proto(&self) -> StatusProto {
        StatusProto {
            code: self.code.as_i32(),
            message: self.message.clone(),
            details: self.details.iter().map(ErrorDetail::to_any).collect(),
        }
    }

    pub fn from_proto(proto: StatusProto) -> Self {
        Self::with_details(
            Code::from_i32(proto.code),
            proto.message,
            proto.details.into_iter().map(ErrorDetail::from_any),
        )
    }
}

impl From<prost::DecodeError> for Status {
    fn from(e: prost::DecodeError) -> Self {
        Self::internal(format!("failed to decode message: {e}"))
    }
}
