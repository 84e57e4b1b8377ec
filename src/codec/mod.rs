//! Wire framing shared by every service (spec §4.1).
//!
//! A *packet* is one or more *messages* concatenated back to back. Each
//! message is a fixed 24-byte envelope (8-byte magic, 8-byte little-endian
//! signed type symbol, 8-byte little-endian unsigned body length) followed
//! by the body. The envelope is the same for all five services; only the
//! set of valid `type_symbol` values and the shape of the body differ, and
//! that part is owned by [`crate::service`] implementations, not this
//! module.
//!
//! The batching-buffer and typed-envelope shapes follow the same pattern as
//! other framing-adjacent buffering in this codebase, generalized to
//! length-prefixed binary framing instead of tagged JSON text frames.

mod raw;

pub use raw::{MessageDecoder, RawMessage, MAGIC, MAGIC_LEN, MAX_MESSAGE_SIZE_DEFAULT};

use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// An ordered sequence of one or more decoded messages delivered together
/// (spec §4.1: "a packet is a concatenation of one or more messages").
pub type Packet = Vec<RawMessage>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("magic mismatch at offset {offset}: connection desynchronized")]
    BadMagic { offset: usize },
    #[error("body length {len} exceeds maximum message size {max}")]
    MessageTooLarge { len: u64, max: u64 },
}

/// Encode a single message envelope. `body` is the already-serialized
/// message-specific payload (the service layer decides how to serialize it).
pub fn encode_message(type_symbol: i64, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(raw::ENVELOPE_LEN + body.len());
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&type_symbol.to_le_bytes());
    buf.extend_from_slice(&(body.len() as u64).to_le_bytes());
    buf.extend_from_slice(body);
    buf.freeze()
}

/// Encode a packet (one or more messages) into a single contiguous buffer,
/// suitable for one transport write.
pub fn encode_packet(messages: &[(i64, Bytes)]) -> Bytes {
    let total: usize = messages
        .iter()
        .map(|(_, body)| raw::ENVELOPE_LEN + body.len())
        .sum();
    let mut buf = BytesMut::with_capacity(total);
    for (type_symbol, body) in messages {
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&type_symbol.to_le_bytes());
        buf.extend_from_slice(&(body.len() as u64).to_le_bytes());
        buf.extend_from_slice(body);
    }
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_single_message() {
        let body = b"\"hello\"".to_vec();
        let frame = encode_message(42, &body);

        let mut decoder = MessageDecoder::new(MAX_MESSAGE_SIZE_DEFAULT);
        decoder.feed(&frame);
        let messages = decoder.decode_available().unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].type_symbol, 42);
        assert_eq!(messages[0].body.as_ref(), body.as_slice());
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn decoder_reads_exact_byte_count_per_message() {
        let body = vec![7u8; 200];
        let frame = encode_message(1, &body);
        assert_eq!(frame.len(), raw::ENVELOPE_LEN + 200);

        let mut decoder = MessageDecoder::new(MAX_MESSAGE_SIZE_DEFAULT);
        // Feed the frame plus one extra trailing byte that belongs to the
        // next, not-yet-arrived message.
        decoder.feed(&frame);
        decoder.feed(&[0xAA]);
        let messages = decoder.decode_available().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(decoder.pending_bytes(), 1);
    }

    #[test]
    fn packet_with_multiple_messages_decodes_in_order() {
        let batch = encode_packet(&[
            (1, Bytes::from_static(b"a")),
            (2, Bytes::from_static(b"bb")),
            (3, Bytes::from_static(b"ccc")),
        ]);

        let mut decoder = MessageDecoder::new(MAX_MESSAGE_SIZE_DEFAULT);
        decoder.feed(&batch);
        let messages = decoder.decode_available().unwrap();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].type_symbol, 1);
        assert_eq!(messages[1].type_symbol, 2);
        assert_eq!(messages[2].type_symbol, 3);
        assert_eq!(messages[2].body.as_ref(), b"ccc");
    }

    #[test]
    fn split_delivery_across_multiple_feeds_still_decodes() {
        let frame = encode_message(99, b"payload");
        let mut decoder = MessageDecoder::new(MAX_MESSAGE_SIZE_DEFAULT);

        // Feed byte by byte to simulate a transport delivering partial frames.
        for byte in frame.iter() {
            decoder.feed(&[*byte]);
            let messages = decoder.decode_available().unwrap();
            assert!(messages.is_empty() || messages.len() == 1);
        }
        let messages = decoder.decode_available().unwrap();
        assert!(messages.is_empty());
        // Final byte already produced the message in the loop above; feed
        // again confirms nothing duplicated.
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn bad_magic_is_reported_and_connection_should_close() {
        let mut garbage = vec![0u8; raw::ENVELOPE_LEN];
        garbage[0] = 0x00; // not the magic byte
        let mut decoder = MessageDecoder::new(MAX_MESSAGE_SIZE_DEFAULT);
        decoder.feed(&garbage);
        let err = decoder.decode_available().unwrap_err();
        assert_eq!(err, CodecError::BadMagic { offset: 0 });
    }

    #[test]
    fn oversized_body_length_is_rejected() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&MAGIC);
        frame.extend_from_slice(&7i64.to_le_bytes());
        frame.extend_from_slice(&(MAX_MESSAGE_SIZE_DEFAULT + 1).to_le_bytes());

        let mut decoder = MessageDecoder::new(MAX_MESSAGE_SIZE_DEFAULT);
        decoder.feed(&frame);
        let err = decoder.decode_available().unwrap_err();
        assert_eq!(
            err,
            CodecError::MessageTooLarge {
                len: MAX_MESSAGE_SIZE_DEFAULT + 1,
                max: MAX_MESSAGE_SIZE_DEFAULT,
            }
        );
    }
}
