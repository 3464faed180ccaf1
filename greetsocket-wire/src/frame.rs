use bytes::Bytes;

use crate::{status::StatusProto, Metadata, Status};

/// The unit of transfer on a greetsocket connection.
///
/// Each frame belongs to exactly one call, identified by `call_id`. Which fields are
/// meaningful depends on `kind`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Frame {
    #[prost(uint64, tag = "1")]
    pub call_id: u64,
    #[prost(enumeration = "FrameKind", tag = "2")]
    pub kind: i32,
    /// Only set on `Open`.
    #[prost(string, tag = "3")]
    pub method: String,
    /// Incoming metadata on `Open`, header metadata on `Header`, trailer metadata on `Trailer`.
    #[prost(message, repeated, tag = "4")]
    pub metadata: Vec<MetadataEntry>,
    /// An encoded request or response on `Message`.
    #[prost(bytes = "bytes", tag = "5")]
    pub payload: Bytes,
    /// The terminal status on `Trailer`.
    #[prost(message, optional, tag = "6")]
    pub status: Option<StatusProto>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum FrameKind {
    /// client -> server: start a call
    Open = 0,
    /// either direction: one request or response
    Message = 1,
    /// client -> server: no more requests will be sent
    HalfClose = 2,
    /// client -> server: the caller lost interest in the call
    Cancel = 3,
    /// server -> client: header metadata, sent once before any response
    Header = 4,
    /// server -> client: status and trailer metadata, always the last frame of a call
    Trailer = 5,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct MetadataEntry {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(string, repeated, tag = "2")]
    pub values: Vec<String>,
}

impl Frame {
    pub fn open(call_id: u64, method: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            call_id,
            kind: FrameKind::Open as i32,
            method: method.into(),
            metadata: metadata.into_entries(),
            ..Default::default()
        }
    }

    pub fn message(call_id: u64, payload: Bytes) -> Self {
        Self {
            call_id,
            kind: FrameKind::Message as i32,
            payload,
            ..Default::default()
        }
    }

    pub fn half_close(call_id: u64) -> Self {
        Self::control(call_id, FrameKind::HalfClose)
    }

    pub fn cancel(call_id: u64) -> Self {
        Self::control(call_id, FrameKind::Cancel)
    }

    pub fn header(call_id: u64, metadata: Metadata) -> Self {
        Self {
            call_id,
            kind: FrameKind::Header as i32,
            metadata: metadata.into_entries(),
            ..Default::default()
        }
    }

    pub fn trailer(call_id: u64, status: &Status, metadata: Metadata) -> Self {
        Self {
            call_id,
            kind: FrameKind::Trailer as i32,
            metadata: metadata.into_entries(),
            status: Some(status.to_proto()),
            ..Default::default()
        }
    }

    fn control(call_id: u64, kind: FrameKind) -> Self {
        Self {
            call_id,
            kind: kind as i32,
            ..Default::default()
        }
    }

    /// Take the metadata out of this frame.
    pub fn take_metadata(&mut self) -> Metadata {
        Metadata::from_entries(std::mem::take(&mut self.metadata))
    }

    /// The status carried by a `Trailer`. A trailer without a status is treated as a protocol violation.
    pub fn take_status(&mut self) -> Status {
        match self.status.take() {
            Some(status) => Status::from_proto(status),
            None => Status::internal("trailer frame did not carry a status"),
        }
    }
}
