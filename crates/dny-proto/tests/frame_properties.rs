//! Property-based tests for the DNY codec and framer.
//!
//! These verify the wire layer for ALL inputs, not just fixtures: frame
//! round-trips, re-encoding of accepted byte strings, and the framer's
//! chunking-independence and no-hang guarantees.

use bytes::Bytes;
use dny_proto::{DnyFrame, Framer, FrameHeader, Iccid, PhysicalId, Unit, checksum};
use proptest::prelude::*;

fn arbitrary_frame() -> impl Strategy<Value = DnyFrame> {
    (
        any::<u32>(),
        any::<u16>(),
        any::<u8>(),
        prop::collection::vec(any::<u8>(), 0..256),
    )
        .prop_map(|(physical_id, message_id, command, payload)| {
            DnyFrame::new(PhysicalId::new(physical_id), message_id, command, Bytes::from(payload))
        })
}

/// A stream fragment a device might emit between or around frames.
#[derive(Debug, Clone)]
enum Fragment {
    Frame(DnyFrame),
    Link,
    Garbage(Vec<u8>),
}

fn arbitrary_fragment() -> impl Strategy<Value = Fragment> {
    prop_oneof![
        arbitrary_frame().prop_map(Fragment::Frame),
        Just(Fragment::Link),
        // Avoid bytes that could open a real unit so fragments stay garbage.
        prop::collection::vec(
            any::<u8>().prop_filter("unit openers excluded", |b| ![b'D', b'l', b'8'].contains(b)),
            1..8
        )
        .prop_map(Fragment::Garbage),
    ]
}

fn fragments_to_bytes(fragments: &[Fragment]) -> Vec<u8> {
    let mut stream = Vec::new();
    for fragment in fragments {
        match fragment {
            Fragment::Frame(frame) => {
                stream.extend_from_slice(&frame.to_bytes().expect("encodable frame"));
            },
            Fragment::Link => stream.extend_from_slice(b"link"),
            Fragment::Garbage(bytes) => stream.extend_from_slice(bytes),
        }
    }
    stream
}

fn drain(framer: &mut Framer) -> Vec<Unit> {
    let mut units = Vec::new();
    while let Some(unit) = framer.next_unit() {
        units.push(unit);
    }
    units
}

fn consumed_bytes(units: &[Unit]) -> usize {
    units
        .iter()
        .map(|unit| match unit {
            Unit::IccidPrelude(_) => Iccid::LEN,
            Unit::LinkToken => 4,
            Unit::Frame(raw) => raw.len(),
            Unit::Garbage(_) => 1,
        })
        .sum()
}

#[test]
fn registration_fixture_from_the_field() {
    // Captured registration: device 04A26CF3, message id 1, opcode 0x20,
    // 6-byte payload, correct trailing checksum.
    let wire = hex::decode("444e590f00f36ca2040100200200020104003e02").unwrap();

    let frame = DnyFrame::decode(&wire).unwrap();
    assert_eq!(frame.physical_id, PhysicalId::new(0x04A2_6CF3));
    assert_eq!(frame.physical_id.to_canonical(), "04A26CF3");
    assert_eq!(frame.message_id, 1);
    assert_eq!(frame.command, 0x20);
    assert_eq!(&frame.payload[..], &[0x02, 0x00, 0x02, 0x01, 0x04, 0x00]);
    assert!(frame.checksum_ok);

    assert_eq!(frame.to_bytes().unwrap(), wire);
}

#[test]
fn prop_frame_encode_decode_roundtrip() {
    proptest!(|(frame in arbitrary_frame())| {
        let wire = frame.to_bytes().expect("encode should succeed");
        let decoded = DnyFrame::decode(&wire).expect("decode should succeed");

        // PROPERTY: round-trip is identity, checksum verifies.
        prop_assert_eq!(&decoded, &frame);
        prop_assert!(decoded.checksum_ok);
        prop_assert_eq!(wire.len(), frame.encoded_len());
    });
}

#[test]
fn prop_accepted_bytes_reencode_identically() {
    proptest!(|(frame in arbitrary_frame(), corrupt in any::<bool>())| {
        let mut wire = frame.to_bytes().expect("encode should succeed").to_vec();
        if corrupt {
            let last = wire.len() - 1;
            wire[last] = wire[last].wrapping_add(1);
        }

        let decoded = DnyFrame::decode(&wire).expect("decode should succeed");
        let reencoded = decoded.to_bytes().expect("reencode should succeed");

        if corrupt {
            // PROPERTY: only the checksum trailer may differ after reencode.
            prop_assert!(!decoded.checksum_ok);
            prop_assert_eq!(&reencoded[..wire.len() - 2], &wire[..wire.len() - 2]);
            prop_assert_ne!(&reencoded[wire.len() - 2..], &wire[wire.len() - 2..]);
        } else {
            prop_assert_eq!(&reencoded[..], &wire[..]);
        }
    });
}

#[test]
fn prop_checksum_is_additive_mod_u16() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..512))| {
        let expected = bytes.iter().map(|&b| u32::from(b)).sum::<u32>() % 65_536;
        prop_assert_eq!(u32::from(checksum(&bytes)), expected);
    });
}

#[test]
fn prop_framer_chunking_is_irrelevant() {
    proptest!(|(
        fragments in prop::collection::vec(arbitrary_fragment(), 0..6),
        chunk_size in 1usize..32,
    )| {
        let stream = fragments_to_bytes(&fragments);

        let mut whole = Framer::new(FrameHeader::DEFAULT_MAX_PAYLOAD);
        whole.push(&stream);
        let expected = drain(&mut whole);

        let mut chunked = Framer::new(FrameHeader::DEFAULT_MAX_PAYLOAD);
        let mut actual = Vec::new();
        for chunk in stream.chunks(chunk_size) {
            chunked.push(chunk);
            actual.extend(drain(&mut chunked));
        }

        // PROPERTY: the unit sequence is independent of feed chunking.
        prop_assert_eq!(actual, expected);
    });
}

#[test]
fn prop_framer_conserves_bytes_and_never_hangs() {
    proptest!(|(stream in prop::collection::vec(any::<u8>(), 0..512))| {
        let mut framer = Framer::new(FrameHeader::DEFAULT_MAX_PAYLOAD);
        framer.push(&stream);
        let units = drain(&mut framer);

        // PROPERTY: every pushed byte is either consumed by a unit or still
        // buffered as a viable prefix; nothing is lost or duplicated.
        prop_assert_eq!(consumed_bytes(&units) + framer.buffered(), stream.len());

        // PROPERTY: whatever remains buffered is smaller than the largest
        // unit the framer could still be waiting for.
        prop_assert!(framer.buffered() <= FrameHeader::DEFAULT_MAX_PAYLOAD + 14);
    });
}

#[test]
fn prop_decoded_frames_match_their_fragments() {
    proptest!(|(fragments in prop::collection::vec(arbitrary_fragment(), 0..6))| {
        let stream = fragments_to_bytes(&fragments);

        let mut framer = Framer::new(FrameHeader::DEFAULT_MAX_PAYLOAD);
        framer.push(&stream);

        let decoded: Vec<DnyFrame> = drain(&mut framer)
            .into_iter()
            .filter_map(|unit| match unit {
                Unit::Frame(raw) => Some(DnyFrame::decode(&raw).expect("framer yields full frames")),
                _ => None,
            })
            .collect();

        let sent: Vec<&DnyFrame> = fragments
            .iter()
            .filter_map(|f| match f {
                Fragment::Frame(frame) => Some(frame),
                _ => None,
            })
            .collect();

        // PROPERTY: every framed unit decodes back to the frame that was sent,
        // in order, regardless of surrounding garbage and link tokens.
        prop_assert_eq!(decoded.len(), sent.len());
        for (got, want) in decoded.iter().zip(sent) {
            prop_assert_eq!(got, want);
        }
    });
}
