//! Property test for the framing codec (spec §8 property 1: "whatever bytes
//! a packet is split into on the wire, feeding them back through in order
//! reproduces the original messages").

use arena_relay_server::codec::{encode_packet, MessageDecoder, MAX_MESSAGE_SIZE_DEFAULT};
use bytes::Bytes;
use proptest::collection::vec as pvec;
use proptest::prelude::*;

fn arb_message() -> impl Strategy<Value = (i64, Vec<u8>)> {
    (any::<i64>(), pvec(any::<u8>(), 0..256))
}

proptest! {
    /// Split an encoded packet at an arbitrary byte boundary and feed the two
    /// halves separately; the decoder must still recover every message, in
    /// order, with bodies intact.
    #[test]
    fn split_feed_recovers_every_message(
        messages in pvec(arb_message(), 1..8),
        split_at in 0usize..4096,
    ) {
        let encoded: Vec<(i64, Bytes)> = messages
            .iter()
            .map(|(t, b)| (*t, Bytes::from(b.clone())))
            .collect();
        let frame = encode_packet(&encoded);
        let split = split_at.min(frame.len());

        let mut decoder = MessageDecoder::new(MAX_MESSAGE_SIZE_DEFAULT);
        decoder.feed(&frame[..split]);
        let mut decoded = decoder.decode_available().unwrap();
        decoder.feed(&frame[split..]);
        decoded.extend(decoder.decode_available().unwrap());

        prop_assert_eq!(decoded.len(), messages.len());
        for (got, (want_type, want_body)) in decoded.iter().zip(messages.iter()) {
            prop_assert_eq!(got.type_symbol, *want_type);
            prop_assert_eq!(got.body.as_ref(), want_body.as_slice());
        }
        prop_assert_eq!(decoder.pending_bytes(), 0);
    }

    /// Feeding one byte at a time never yields more messages than were fed,
    /// and the final state always matches feeding the whole frame at once.
    #[test]
    fn byte_by_byte_feed_matches_bulk_feed(
        messages in pvec(arb_message(), 1..4),
    ) {
        let encoded: Vec<(i64, Bytes)> = messages
            .iter()
            .map(|(t, b)| (*t, Bytes::from(b.clone())))
            .collect();
        let frame = encode_packet(&encoded);

        let mut bulk = MessageDecoder::new(MAX_MESSAGE_SIZE_DEFAULT);
        bulk.feed(&frame);
        let bulk_decoded = bulk.decode_available().unwrap();

        let mut trickle = MessageDecoder::new(MAX_MESSAGE_SIZE_DEFAULT);
        let mut trickle_decoded = Vec::new();
        for byte in frame.iter() {
            trickle.feed(&[*byte]);
            trickle_decoded.extend(trickle.decode_available().unwrap());
        }

        prop_assert_eq!(bulk_decoded.len(), trickle_decoded.len());
        for (a, b) in bulk_decoded.iter().zip(trickle_decoded.iter()) {
            prop_assert_eq!(a.type_symbol, b.type_symbol);
            prop_assert_eq!(a.body.as_ref(), b.body.as_ref());
        }
    }
}
