//! Framing of sync messages over characteristic writes.
//!
//! A message is JSON with a 4-byte big-endian length prefix, split into
//! chunks no larger than the link's write limit. The receiver feeds chunks
//! into a [`FrameAssembler`] until a whole frame is available.

use crate::error::{SyncError, SyncResult};
use crate::protocol::SyncMessage;

/// Maximum encoded message size (1 MB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

const PREFIX_LEN: usize = 4;

/// Encodes `message` into chunks of at most `max_write_len` bytes.
pub fn encode_frames(message: &SyncMessage, max_write_len: usize) -> SyncResult<Vec<Vec<u8>>> {
    if max_write_len == 0 {
        return Err(SyncError::Transmission("link write limit is zero".into()));
    }

    let data = serde_json::to_vec(message)?;
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(SyncError::Protocol(format!(
            "message too large: {} bytes",
            data.len()
        )));
    }

    let mut frame = Vec::with_capacity(PREFIX_LEN + data.len());
    frame.extend_from_slice(&(data.len() as u32).to_be_bytes());
    frame.extend_from_slice(&data);

    Ok(frame.chunks(max_write_len).map(<[u8]>::to_vec).collect())
}

/// Reassembles chunks into whole messages.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: Vec<u8>,
}

impl FrameAssembler {
    /// Creates an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes buffered but not yet decoded.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Appends a chunk. Returns the message once its frame is complete.
    ///
    /// A chunk that carries bytes past the end of the frame is rejected: a
    /// peer only sends the next message after the previous one was read.
    pub fn push(&mut self, chunk: &[u8]) -> SyncResult<Option<SyncMessage>> {
        self.buf.extend_from_slice(chunk);
        if self.buf.len() < PREFIX_LEN {
            return Ok(None);
        }

        let mut len_bytes = [0u8; PREFIX_LEN];
        len_bytes.copy_from_slice(&self.buf[..PREFIX_LEN]);
        let len = u32::from_be_bytes(len_bytes) as usize;
        if len > MAX_MESSAGE_SIZE {
            self.buf.clear();
            return Err(SyncError::Protocol(format!("message too large: {len} bytes")));
        }

        let total = PREFIX_LEN + len;
        if self.buf.len() < total {
            return Ok(None);
        }
        if self.buf.len() > total {
            let extra = self.buf.len() - total;
            self.buf.clear();
            return Err(SyncError::Protocol(format!(
                "{extra} unexpected bytes after frame"
            )));
        }

        let message = serde_json::from_slice(&self.buf[PREFIX_LEN..]);
        self.buf.clear();
        Ok(Some(message?))
    }
}
