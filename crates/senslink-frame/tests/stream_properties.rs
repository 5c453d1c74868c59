use bytes::BytesMut;
use proptest::prelude::*;
use senslink_frame::{
    decode_frame, encode_frame, ChecksumPolicy, Decoded, Frame, FrameType, Reassembler,
};

fn frame_type() -> impl Strategy<Value = FrameType> {
    prop_oneof![
        Just(FrameType::Status),
        Just(FrameType::Data),
        Just(FrameType::Command),
        Just(FrameType::Ack),
    ]
}

fn wire(frame_type: FrameType, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(frame_type, payload, &mut buf).unwrap();
    buf.to_vec()
}

/// Split `bytes` at the given (unsorted, possibly repeated) cut points.
fn chunks(bytes: &[u8], mut cuts: Vec<usize>) -> Vec<&[u8]> {
    cuts.iter_mut().for_each(|cut| *cut %= bytes.len() + 1);
    cuts.sort_unstable();
    cuts.dedup();

    let mut out = Vec::new();
    let mut start = 0;
    for cut in cuts {
        out.push(&bytes[start..cut]);
        start = cut;
    }
    out.push(&bytes[start..]);
    out
}

proptest! {
    #[test]
    fn decode_inverts_encode(
        frame_type in frame_type(),
        payload in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let bytes = wire(frame_type, &payload);
        match decode_frame(&bytes, ChecksumPolicy::Strict) {
            Decoded::Frame { frame, consumed } => {
                prop_assert_eq!(consumed, bytes.len());
                prop_assert_eq!(frame.frame_type(), frame_type);
                prop_assert_eq!(frame.payload().as_ref(), payload.as_slice());
                prop_assert!(frame.checksum_valid());
            }
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    #[test]
    fn chunked_feed_matches_single_feed(
        frame_type in frame_type(),
        payload in proptest::collection::vec(any::<u8>(), 0..256),
        cuts in proptest::collection::vec(any::<usize>(), 0..12),
    ) {
        let bytes = wire(frame_type, &payload);

        let mut whole = Reassembler::new();
        whole.feed(&bytes);
        let expected: Vec<Frame> = whole.drain().collect();
        prop_assert_eq!(expected.len(), 1);

        let mut chunked = Reassembler::new();
        let mut got = Vec::new();
        for chunk in chunks(&bytes, cuts) {
            chunked.feed(chunk);
            got.extend(chunked.drain());
        }
        prop_assert_eq!(got, expected);
        prop_assert_eq!(chunked.buffered(), 0);
    }

    #[test]
    fn resynchronizes_after_noise(
        noise in proptest::collection::vec(
            any::<u8>().prop_filter("no marker byte", |b| *b != 0xA5),
            0..300,
        ),
        frame_type in frame_type(),
        payload in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut bytes = noise.clone();
        bytes.extend(wire(frame_type, &payload));

        let mut reassembler = Reassembler::new();
        reassembler.feed(&bytes);
        let frames: Vec<Frame> = reassembler.drain().collect();

        prop_assert_eq!(frames.len(), 1);
        prop_assert_eq!(frames[0].frame_type(), frame_type);
        prop_assert_eq!(frames[0].payload().as_ref(), payload.as_slice());
        prop_assert_eq!(reassembler.stats().discarded_bytes, noise.len() as u64);
    }
}

#[test]
fn maximum_payload_across_many_reads() {
    let payload: Vec<u8> = (0..u16::MAX as usize).map(|i| (i * 7) as u8).collect();
    let bytes = wire(FrameType::Data, &payload);

    let mut reassembler = Reassembler::new();
    let mut frames = Vec::new();
    for chunk in bytes.chunks(1000) {
        reassembler.feed(chunk);
        frames.extend(reassembler.drain());
    }
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].payload().len(), payload.len());
}
