use bytes::{Bytes, BytesMut};
use prost::Message;
use tokio_util::codec::{Decoder, Encoder};

use crate::{Error, Frame, Status};

/// Default limit for a single frame: 4MiB.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 4 << 20;

/// A varint length delimiter never takes more than this many bytes.
const MAX_DELIMITER_LENGTH: usize = 10;

/// Reads and writes length-delimited [`Frame`]s.
///
/// Use it with `tokio_util::codec::FramedRead` and `FramedWrite` over a socket.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_length: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LENGTH)
    }
}

impl FrameCodec {
    pub fn new(max_frame_length: usize) -> Self {
        Self { max_frame_length }
    }

    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, buffer: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let message_length = match prost::decode_length_delimiter(buffer.as_ref()) {
            Ok(message_length) => message_length,
            Err(e) => {
                if buffer.len() < MAX_DELIMITER_LENGTH {
                    log::trace!("can't read a length delimiter yet {e:?}");
                    return Ok(None);
                }
                return Err(Error::InvalidFrame(e));
            }
        };
        if self.max_frame_length < message_length {
            return Err(Error::FrameTooLarge {
                length: message_length,
                max: self.max_frame_length,
            });
        }

        let frame_length = prost::length_delimiter_len(message_length) + message_length;
        if buffer.len() < frame_length {
            buffer.reserve(frame_length - buffer.len());
            return Ok(None);
        }

        let frame_bytes = buffer.split_to(frame_length).freeze();
        match Frame::decode_length_delimited(frame_bytes) {
            Ok(frame) => {
                log::trace!("decoded frame {frame_length}: {frame:?}");
                Ok(Some(frame))
            }
            Err(e) => {
                log::warn!("could not decode frame: {e:?}");
                Err(Error::InvalidFrame(e))
            }
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, frame: Frame, buffer: &mut BytesMut) -> Result<(), Self::Error> {
        let message_length = frame.encoded_len();
        if self.max_frame_length < message_length {
            return Err(Error::FrameTooLarge {
                length: message_length,
                max: self.max_frame_length,
            });
        }
        buffer.reserve(prost::length_delimiter_len(message_length) + message_length);
        frame.encode_length_delimited(buffer)?;
        log::trace!("encoded frame {message_length}: {frame:?}");
        Ok(())
    }
}

/// Encode a request or response message for a `Message` frame.
pub fn encode_payload(message: &impl Message) -> Bytes {
    message.encode_to_vec().into()
}

/// Refuse a frame that a codec limited to `max_frame_length` would reject.
///
/// The encoder's refusal fails the whole connection. This one fails only the call.
pub fn ensure_frame_fits(frame: &Frame, max_frame_length: usize) -> Result<(), Status> {
    let length = frame.encoded_len();
    if max_frame_length < length {
        return Err(Status::resource_exhausted(format!(
            "frame of {length} bytes is larger than the limit of {max_frame_length}"
        )));
    }
    Ok(())
}

/// Decode a request or response message from a `Message` frame.
pub fn decode_payload<T>(payload: Bytes) -> Result<T, Status>
where
    T: Message + Default,
{
    T::decode(payload).map_err(Status::from)
}
