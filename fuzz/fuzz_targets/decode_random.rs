#![no_main]

use heatshrink::decoder::Decoder;
use heatshrink::PollResult;
use libfuzzer_sys::fuzz_target;

// Arbitrary bytes are almost never a valid Heatshrink stream; the only
// contract worth fuzzing here is that the decoder never panics or
// overruns its output buffer, no matter what garbage it's fed or how the
// window/lookahead parameters are chosen.
fuzz_target!(|input: (u8, u8, Vec<u8>)| {
    let (window_raw, lookahead_raw, data) = input;

    let window_bits = 4 + (window_raw % 12); // [4, 15]
    let lookahead_bits = 3 + (lookahead_raw % (window_bits - 3)); // [3, window_bits]

    let Ok(mut dec) = Decoder::new(64, window_bits, lookahead_bits) else {
        return;
    };

    let mut scratch = [0u8; 256];
    let mut sunk = 0;
    while sunk < data.len() {
        let (n, _) = dec.sink(&data[sunk..]);
        if n == 0 {
            break;
        }
        sunk += n;
        loop {
            let (written, res) = dec.poll(&mut scratch);
            assert!(written <= scratch.len());
            if res != PollResult::More {
                break;
            }
        }
    }
    dec.finish();
});
