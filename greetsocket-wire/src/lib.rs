//! Greetsocket wire format
//!
//! Everything that crosses the network for a greetsocket rpc lives here:
//! * [`Frame`]s, length-delimited protocol buffers read and written by [`FrameCodec`],
//! * [`Metadata`], the header/trailer key-value carrier,
//! * [`Status`], the terminal outcome of a call, with typed [`ErrorDetail`] records.
//!
//! Request and response payloads are opaque bytes at this level. Use
//! [`encode_payload`] and [`decode_payload`] with your own `prost` messages.

mod codec;
mod error;
mod frame;
mod metadata;
mod status;

pub use codec::{
    decode_payload, encode_payload, ensure_frame_fits, FrameCodec, DEFAULT_MAX_FRAME_LENGTH,
};
pub use error::{Error, Result};
pub use frame::{Frame, FrameKind, MetadataEntry};
pub use metadata::Metadata;
pub use status::{
    Any, Code, DebugInfo, ErrorDetail, Status, StatusProto, DEBUG_INFO_TYPE_URL,
};
