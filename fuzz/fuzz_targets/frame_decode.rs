//! Fuzz target for DnyFrame::decode and payload record decoders.
//!
//! Arbitrary bytes must never panic the decoder: every malformed input
//! returns a structured error, and every decoded frame's payload must
//! decode totally (Undecoded/Extended at worst) under any opcode.

#![no_main]

use bytes::Bytes;
use dny_proto::{DnyFrame, Payload};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = DnyFrame::decode(data) {
        // Payload decoding is total for any opcode/bytes pair.
        let _ = Payload::decode(frame.command, &frame.payload);

        // Accepted frames re-encode without error.
        let reencoded = frame.to_bytes().expect("decoded frame must re-encode");
        assert_eq!(reencoded.len(), frame.encoded_len());
    }

    // Opcode confusion: the same bytes under every interesting opcode.
    let bytes = Bytes::copy_from_slice(data);
    for opcode in [0x01, 0x02, 0x03, 0x06, 0x11, 0x12, 0x20, 0x21, 0x22, 0x82, 0x9B] {
        let _ = Payload::decode(opcode, &bytes);
    }
});
