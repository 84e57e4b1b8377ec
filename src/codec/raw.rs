use bytes::{Bytes, BytesMut};

use super::CodecError;

/// Fixed 8-byte magic prefix every message envelope starts with. Its absence
/// means the stream desynchronized and the connection must be closed
/// (spec §4.1).
pub const MAGIC: [u8; 8] = [0xBB; 8];
pub const MAGIC_LEN: usize = MAGIC.len();
const TYPE_SYMBOL_LEN: usize = 8;
const BODY_LENGTH_LEN: usize = 8;
pub(super) const ENVELOPE_LEN: usize = MAGIC_LEN + TYPE_SYMBOL_LEN + BODY_LENGTH_LEN;

/// Recommended cap on a single message body (spec §4.1: "1 MiB" recommended).
pub const MAX_MESSAGE_SIZE_DEFAULT: u64 = 1024 * 1024;

/// A decoded message: the envelope's type symbol plus the raw body bytes.
/// Service layers turn this into a typed client/server message; an unknown
/// `type_symbol` is not fatal (spec §4.1) — the service logs and ignores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub type_symbol: i64,
    pub body: Bytes,
}

/// Incremental decoder over a byte stream that may deliver message frames
/// split across arbitrarily many transport reads.
pub struct MessageDecoder {
    buf: BytesMut,
    max_message_size: u64,
}

impl MessageDecoder {
    pub fn new(max_message_size: u64) -> Self {
        Self {
            buf: BytesMut::new(),
            max_message_size,
        }
    }

    /// Append newly-received transport bytes to the internal buffer.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes buffered but not yet forming a complete message.
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }

    /// Decode every complete message currently buffered, in arrival order.
    /// Leaves a trailing partial message (if any) in the buffer for the next
    /// call. Returns an error (and should terminate the connection per spec
    /// §4.1) on magic mismatch or an oversized `body_length`.
    pub fn decode_available(&mut self) -> Result<Vec<RawMessage>, CodecError> {
        let mut out = Vec::new();
        let mut offset = 0usize;

        loop {
            let remaining = self.buf.len() - offset;
            if remaining < ENVELOPE_LEN {
                break;
            }

            let envelope = &self.buf[offset..offset + ENVELOPE_LEN];
            if envelope[..MAGIC_LEN] != MAGIC {
                return Err(CodecError::BadMagic { offset });
            }

            let type_symbol = i64::from_le_bytes(
                envelope[MAGIC_LEN..MAGIC_LEN + TYPE_SYMBOL_LEN]
                    .try_into()
                    .expect("slice length fixed to 8 above"),
            );
            let body_length = u64::from_le_bytes(
                envelope[MAGIC_LEN + TYPE_SYMBOL_LEN..ENVELOPE_LEN]
                    .try_into()
                    .expect("slice length fixed to 8 above"),
            );

            if body_length > self.max_message_size {
                return Err(CodecError::MessageTooLarge {
                    len: body_length,
                    max: self.max_message_size,
                });
            }

            let body_start = offset + ENVELOPE_LEN;
            let body_end = body_start + body_length as usize;
            if self.buf.len() < body_end {
                // Full body hasn't arrived yet.
                break;
            }

            let body = Bytes::copy_from_slice(&self.buf[body_start..body_end]);
            out.push(RawMessage { type_symbol, body });
            offset = body_end;
        }

        if offset > 0 {
            let _ = self.buf.split_to(offset);
        }

        Ok(out)
    }
}
