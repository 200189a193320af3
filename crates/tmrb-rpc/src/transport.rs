//! Wire codec for the Remote Build control channel.
//!
//! The channel is asymmetric. Responses from the host are framed with a
//! 4-byte length in host-native byte order:
//! ```text
//! +-----------------+------------------+
//! |  4 bytes        |  N bytes         |
//! |  (length, NE)   |  (UTF-8 JSON)    |
//! +-----------------+------------------+
//! ```
//! Requests to the host are raw JSON with no prefix at all.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::Request;

/// Maximum accepted response body (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Length prefix size in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Codec for the Remote Build wire format.
///
/// Decodes length-prefixed response bodies into strings and encodes requests
/// as unframed JSON.
#[derive(Debug, Default)]
pub struct RemoteBuildCodec {
    current_length: Option<usize>,
}

impl RemoteBuildCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the length header has been consumed for the pending frame.
    #[must_use]
    pub fn has_header(&self) -> bool {
        self.current_length.is_some()
    }
}

impl Decoder for RemoteBuildCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.current_length.is_none() {
            if src.len() < LENGTH_PREFIX_SIZE {
                return Ok(None);
            }

            let len = src.get_u32_ne() as usize;
            tracing::debug!("Header indicates {len} bytes of data");

            if len > MAX_FRAME_SIZE {
                return Err(CodecError::FrameTooLarge(len));
            }

            self.current_length = Some(len);
        }

        let Some(length) = self.current_length else {
            return Ok(None);
        };

        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        if src.len() > length {
            tracing::debug!("Trimming {} bytes past frame end", src.len() - length);
        }

        let payload = src.split_to(length);
        self.current_length = None;

        let text = std::str::from_utf8(&payload)?;
        Ok(Some(text.to_string()))
    }
}

impl Encoder<Request> for RemoteBuildCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item)?;
        dst.reserve(json.len());
        dst.put_slice(&json);
        Ok(())
    }
}

/// Build a response frame the way the host does. Used by mock hosts.
///
/// # Errors
///
/// Returns `CodecError::FrameTooLarge` if the body exceeds [`MAX_FRAME_SIZE`].
// Body size is checked against MAX_FRAME_SIZE (fits in u32)
#[allow(clippy::cast_possible_truncation)]
pub fn encode_frame(body: &[u8], dst: &mut BytesMut) -> Result<(), CodecError> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(body.len()));
    }
    dst.reserve(LENGTH_PREFIX_SIZE + body.len());
    dst.put_u32_ne(body.len() as u32);
    dst.put_slice(body);
    Ok(())
}

/// Errors that can occur during codec operations
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Frame too large: {0} bytes (max: {MAX_FRAME_SIZE})")]
    FrameTooLarge(usize),
}
