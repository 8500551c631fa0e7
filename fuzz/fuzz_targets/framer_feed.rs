//! Fuzz target for the incremental framer.
//!
//! Feeds the same arbitrary stream whole and in arbitrary chunkings:
//! the framer must never panic, never lose or duplicate bytes, and must
//! emit the identical unit sequence regardless of chunking.

#![no_main]

use arbitrary::Arbitrary;
use dny_proto::{Framer, FrameHeader, Iccid, Unit};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FeedPlan {
    stream: Vec<u8>,
    chunk_sizes: Vec<u8>,
}

fn drain(framer: &mut Framer) -> Vec<Unit> {
    let mut units = Vec::new();
    while let Some(unit) = framer.next_unit() {
        units.push(unit);
    }
    units
}

fn consumed(units: &[Unit]) -> usize {
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

fuzz_target!(|plan: FeedPlan| {
    let mut whole = Framer::new(FrameHeader::DEFAULT_MAX_PAYLOAD);
    whole.push(&plan.stream);
    let expected = drain(&mut whole);

    assert_eq!(consumed(&expected) + whole.buffered(), plan.stream.len());

    let mut chunked = Framer::new(FrameHeader::DEFAULT_MAX_PAYLOAD);
    let mut actual = Vec::new();
    let mut cursor = 0usize;
    for &size in &plan.chunk_sizes {
        if cursor >= plan.stream.len() {
            break;
        }
        let end = (cursor + usize::from(size).max(1)).min(plan.stream.len());
        chunked.push(&plan.stream[cursor..end]);
        actual.extend(drain(&mut chunked));
        cursor = end;
    }
    chunked.push(&plan.stream[cursor..]);
    actual.extend(drain(&mut chunked));

    assert_eq!(actual, expected);
});
