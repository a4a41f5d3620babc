#![crate_type = "rlib"]
#![no_std]
#![deny(warnings)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Streaming, bounded-memory LZSS-style compression & decompression.
//!
//! Implements the Heatshrink compression algorithm
//! described here <https://github.com/atomicobject/heatshrink>
//! and here <https://spin.atomicobject.com/2013/03/14/heatshrink-embedded-data-compression/>,
//! generalized so the window and lookahead sizes are chosen at construction
//! time (within `[4, 15]` and `[3, W]` respectively) instead of being fixed
//! at compile time.
//!
//! The encoder and decoder are incremental state machines: push bytes in
//! with `sink`, pull bytes out with `poll`, and call `finish` once all input
//! has been sunk. Both sides must be constructed with the same window and
//! lookahead bits to interoperate; nothing in the wire format is
//! self-describing.

extern crate alloc;

/// module to uncompress some compressed data
pub mod decoder;
/// module to compress data
pub mod encoder;

mod common;
mod error;

pub use common::{FinishResult, PollResult, SinkResult};
pub use error::ConfigError;

/// Smallest legal window size, in bits (`2^4 = 16` bytes).
pub const MIN_WINDOW_BITS: u8 = 4;
/// Largest legal window size, in bits (`2^15 = 32768` bytes).
pub const MAX_WINDOW_BITS: u8 = 15;
/// Smallest legal lookahead size, in bits (`2^3 = 8` bytes).
pub const MIN_LOOKAHEAD_BITS: u8 = 3;

/// Default window size, in bits, used by the CLI and the one-shot helpers.
pub const DEFAULT_WINDOW_BITS: u8 = 8;
/// Default lookahead size, in bits, used by the CLI and the one-shot helpers.
pub const DEFAULT_LOOKAHEAD_BITS: u8 = 4;

/// Validate a `(window_bits, lookahead_bits)` pair against
/// [`MIN_WINDOW_BITS`]/[`MAX_WINDOW_BITS`]/[`MIN_LOOKAHEAD_BITS`].
pub(crate) fn check_window_lookahead(
    window_bits: u8,
    lookahead_bits: u8,
) -> Result<(), ConfigError> {
    if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&window_bits) {
        return Err(ConfigError::WindowBits(window_bits));
    }
    if lookahead_bits < MIN_LOOKAHEAD_BITS || lookahead_bits > window_bits {
        return Err(ConfigError::LookaheadBits {
            lookahead_bits,
            window_bits,
        });
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::decoder::Decoder;
    use super::encoder::Encoder;
    use super::common::PollResult;
    use alloc::vec;
    use alloc::vec::Vec;

    fn encode_all(enc: &mut Encoder, src: &[u8]) -> Vec<u8> {
        let mut out = vec![];
        let mut scratch = [0u8; 512];
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
        enc.finish();
        loop {
            let (written, res) = enc.poll(&mut scratch);
            out.extend_from_slice(&scratch[..written]);
            if res != PollResult::More {
                break;
            }
        }
        out
    }

    fn decode_all(dec: &mut Decoder, src: &[u8]) -> Vec<u8> {
        let mut out = vec![];
        let mut scratch = [0u8; 512];
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
        loop {
            let (written, res) = dec.poll(&mut scratch);
            out.extend_from_slice(&scratch[..written]);
            if res != PollResult::More {
                break;
            }
        }
        out
    }

    /// Like [`decode_all`], but sinks `src` in fixed-size chunks (with a
    /// small `IBS`, so a chunk may take several `sink` calls to drain)
    /// instead of handing the decoder the whole compressed buffer at once.
    fn decode_all_chunked(dec: &mut Decoder, src: &[u8], chunk_size: usize) -> Vec<u8> {
        let mut out = vec![];
        let mut scratch = [0u8; 512];
        let mut drain = |dec: &mut Decoder, out: &mut Vec<u8>| loop {
            let (written, res) = dec.poll(&mut scratch);
            out.extend_from_slice(&scratch[..written]);
            if res != PollResult::More {
                break;
            }
        };

        let mut pos = 0;
        while pos < src.len() {
            let end = (pos + chunk_size).min(src.len());
            let mut offset = pos;
            while offset < end {
                let (n, _) = dec.sink(&src[offset..end]);
                offset += n;
                if n == 0 {
                    drain(dec, &mut out);
                }
            }
            pos = end;
            drain(dec, &mut out);
        }
        dec.finish();
        drain(dec, &mut out);
        out
    }

    fn compare(src: &[u8]) {
        let mut enc = Encoder::new(8, 4).unwrap();
        let mut dec = Decoder::new(512, 8, 4).unwrap();

        let compressed = encode_all(&mut enc, src);
        let decompressed = decode_all(&mut dec, &compressed);

        assert_eq!(src, decompressed.as_slice());
    }

    #[test]
    fn alpha() {
        let src = [
            33, 82, 149, 84, 52, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 147, 2, 0, 0, 0, 0, 0, 0, 242, 2, 241, 2, 240,
            2, 0, 0, 0, 0, 0, 0, 47, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0,
        ];
        compare(&src);
    }

    #[test]
    fn alpha2() {
        let src = [
            33, 82, 149, 84, 52, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 147, 2, 0, 0, 0, 0, 0, 0, 242, 2, 241, 2, 240,
            2, 0, 0, 0, 0, 0, 0, 47, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            12, 17,
        ];
        compare(&src);
    }

    #[test]
    fn beta() {
        let src = [
            189, 160, 51, 163, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 199, 0, 0, 0, 0, 0, 0, 0, 166, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 154, 0,
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            0,
        ];
        compare(&src);
    }

    #[test]
    fn beta2_all_byte_values_twice() {
        let mut src: Vec<u8> = (0..=255u8).collect();
        src.extend(0..=255u8);
        compare(&src);
    }

    #[test]
    fn clib_compatibility() {
        let src = hex_literal::hex!("90D4B2B549A4082BE00F000E4C46DF2817C605F005B4BE0825F00280");
        let expected = hex_literal::hex!("21529554340200000000000000000000000000000000000000000000000000000000000000000009302000000000000F202F102F0020000000000002F0400000000000000000000000000000000000000000000");

        let mut dec = Decoder::new(100, 8, 4).unwrap();
        let decompressed = decode_all(&mut dec, &src);

        assert_eq!(expected.as_slice(), decompressed.as_slice());
    }

    #[test]
    fn empty_input_round_trips() {
        compare(&[]);
    }

    #[test]
    fn wire_format_all_literals() {
        let mut enc = Encoder::new(8, 7).unwrap();
        let out = encode_all(&mut enc, &[0x00, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(out.as_slice(), hex_literal::hex!("80 40 60 50 38 20").as_slice());
    }

    #[test]
    fn wire_format_self_overlapping_backref() {
        let mut enc = Encoder::new(8, 7).unwrap();
        let out = encode_all(&mut enc, b"aaaaa");
        assert_eq!(out.as_slice(), hex_literal::hex!("B0 80 01 80").as_slice());
    }

    #[test]
    fn wire_format_repeated_word_narrow_lookahead() {
        let mut enc = Encoder::new(8, 3).unwrap();
        let out = encode_all(&mut enc, b"abcdabcd");
        assert_eq!(out.as_slice(), hex_literal::hex!("B0 D8 AC 76 40 1B").as_slice());
    }

    #[test]
    fn wire_format_repeated_word_plus_tail_literal() {
        let mut enc = Encoder::new(8, 3).unwrap();
        let out = encode_all(&mut enc, b"abcdabcde");
        assert_eq!(
            out.as_slice(),
            hex_literal::hex!("B0 D8 AC 76 40 1B B2 80").as_slice()
        );
    }

    #[test]
    fn decode_clib_vector_foo() {
        let mut dec = Decoder::new(16, 7, 3).unwrap();
        let out = decode_all(&mut dec, &hex_literal::hex!("B3 5B ED E0"));
        assert_eq!(out.as_slice(), b"foo");
    }

    #[test]
    fn decode_clib_vector_foofoo() {
        let mut dec = Decoder::new(16, 7, 7).unwrap();
        let out = decode_all(&mut dec, &hex_literal::hex!("B3 5B ED E0 40 80"));
        assert_eq!(out.as_slice(), b"foofoo");
    }

    #[test]
    fn self_overlapping_run() {
        let src = [b'a'; 64];
        compare(&src);
    }

    #[test]
    fn construction_rejects_out_of_bounds_parameters() {
        assert!(Encoder::new(3, 3).is_err());
        assert!(Encoder::new(16, 4).is_err());
        assert!(Encoder::new(8, 2).is_err());
        assert!(Encoder::new(8, 9).is_err());
        assert!(Decoder::new(0, 8, 4).is_err());
        assert!(Decoder::new(32, 3, 3).is_err());
    }

    #[test]
    fn decoder_sink_chunking_round_trips() {
        let src = b"the quick brown fox jumps over the lazy dog, repeatedly, the quick brown fox";
        for window_bits in super::MIN_WINDOW_BITS..=12 {
            let lookahead_bits = window_bits.min(7);
            let mut enc = Encoder::new(window_bits, lookahead_bits).unwrap();
            let compressed = encode_all(&mut enc, src);

            for chunk_size in [1usize, 2, 3] {
                // A tiny IBS forces input_index to sit strictly between 0
                // and input_size across most get_bits calls, exercising the
                // "already-consumed staged bytes" accounting in bits_available.
                let mut dec = Decoder::new(4, window_bits, lookahead_bits).unwrap();
                let decompressed = decode_all_chunked(&mut dec, &compressed, chunk_size);
                assert_eq!(
                    src.as_slice(),
                    decompressed.as_slice(),
                    "window_bits={window_bits} lookahead_bits={lookahead_bits} chunk_size={chunk_size}"
                );
            }
        }
    }

    #[test]
    fn every_window_and_lookahead_combination_round_trips() {
        let src = b"the quick brown fox jumps over the lazy dog, repeatedly, the quick brown fox";
        for window_bits in super::MIN_WINDOW_BITS..=12 {
            for lookahead_bits in super::MIN_LOOKAHEAD_BITS..=window_bits {
                let mut enc = Encoder::new(window_bits, lookahead_bits).unwrap();
                let mut dec = Decoder::new(64, window_bits, lookahead_bits).unwrap();
                let compressed = encode_all(&mut enc, src);
                let decompressed = decode_all(&mut dec, &compressed);
                assert_eq!(
                    src.as_slice(),
                    decompressed.as_slice(),
                    "window_bits={window_bits} lookahead_bits={lookahead_bits}"
                );
            }
        }
    }
}
