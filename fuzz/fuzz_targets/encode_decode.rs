#![no_main]

use heatshrink::decoder::Decoder;
use heatshrink::encoder::Encoder;
use heatshrink::{FinishResult, PollResult};
use libfuzzer_sys::fuzz_target;

const WINDOW_BITS: u8 = 8;
const LOOKAHEAD_BITS: u8 = 4;

fn encode_all(enc: &mut Encoder, src: &[u8]) -> Vec<u8> {
    let mut out = vec![];
    let mut scratch = [0u8; 256];
    let mut sunk = 0;
    while sunk < src.len() {
        let (n, _) = enc.sink(&src[sunk..]);
        sunk += n;
        loop {
            let (written, res) = enc.poll(&mut scratch);
            out.extend_from_slice(&scratch[..written]);
            if res != PollResult::More {
                break;
            }
        }
    }
    while enc.finish() != FinishResult::Done {
        let (written, _) = enc.poll(&mut scratch);
        out.extend_from_slice(&scratch[..written]);
    }
    out
}

fn decode_all(dec: &mut Decoder, src: &[u8]) -> Vec<u8> {
    let mut out = vec![];
    let mut scratch = [0u8; 256];
    let mut sunk = 0;
    while sunk < src.len() {
        let (n, _) = dec.sink(&src[sunk..]);
        sunk += n;
        loop {
            let (written, res) = dec.poll(&mut scratch);
            out.extend_from_slice(&scratch[..written]);
            if res != PollResult::More {
                break;
            }
        }
    }
    dec.finish();
    out
}

// Drives the whole round trip one byte at a time, so the fuzzer also
// exercises every possible sink/poll chunking, not just whole-buffer calls.
fuzz_target!(|data: &[u8]| {
    let mut enc = Encoder::new(WINDOW_BITS, LOOKAHEAD_BITS).unwrap();
    let mut dec = Decoder::new(37, WINDOW_BITS, LOOKAHEAD_BITS).unwrap();

    let compressed = encode_all(&mut enc, data);
    let decompressed = decode_all(&mut dec, &compressed);

    assert_eq!(data, decompressed.as_slice());
});
