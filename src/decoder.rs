use crate::check_window_lookahead;
use crate::common::{OutputInfo, MARK_LIT};
use crate::error::ConfigError;
use crate::{FinishResult, PollResult, SinkResult};
use alloc::vec;
use alloc::vec::Vec;

#[derive(Debug, Copy, Clone, PartialEq)]
enum State {
    TagBit,       // tag bit
    YieldLiteral, // ready to yield literal byte
    BackrefIndex, // reading the W-bit back-reference index
    BackrefCount, // reading the L-bit back-reference length
    YieldBackref, // ready to yield back-reference
}

/// Decompresses a Heatshrink bitstream back into the original bytes,
/// incrementally.
///
/// Must be constructed with the same `window_bits`/`lookahead_bits` the
/// producing [`crate::encoder::Encoder`] used; `input_buffer_size` is purely
/// a local throughput/latency knob and has no bearing on the wire format.
#[derive(Debug)]
pub struct Decoder {
    input_size: usize,
    input_index: usize,
    output_count: u16,
    output_index: u16,
    head_index: u16,
    current_byte: u8,
    bit_index: u8,
    state: State,

    window_bits: u8,
    lookahead_bits: u8,
    input_buffer_size: usize,
    window_mask: u16,

    /// `input_buffer_size` bytes of sink-side staging followed by
    /// `2^window_bits` bytes of decoded-history window.
    buffers: Vec<u8>,
}

impl Decoder {
    /// Construct a decoder with an `input_buffer_size`-byte staging buffer
    /// and a `2^window_bits`-byte history window.
    ///
    /// Fails if `window_bits`/`lookahead_bits` are out of range (see
    /// [`crate::encoder::Encoder::new`]) or if `input_buffer_size` is zero.
    pub fn new(
        input_buffer_size: usize,
        window_bits: u8,
        lookahead_bits: u8,
    ) -> Result<Self, ConfigError> {
        check_window_lookahead(window_bits, lookahead_bits)?;
        if input_buffer_size == 0 {
            return Err(ConfigError::InputBufferSize);
        }

        let window_size = 1usize << window_bits;

        Ok(Decoder {
            input_size: 0,
            input_index: 0,
            output_count: 0,
            output_index: 0,
            head_index: 0,
            current_byte: 0,
            bit_index: 0,
            state: State::TagBit,
            window_bits,
            lookahead_bits,
            input_buffer_size,
            window_mask: (window_size - 1) as u16,
            buffers: vec![0; input_buffer_size + window_size],
        })
    }

    /// Reset to the freshly-constructed state. Allocated buffers are reused
    /// in place rather than reallocated.
    pub fn reset(&mut self) {
        self.input_size = 0;
        self.input_index = 0;
        self.output_count = 0;
        self.output_index = 0;
        self.head_index = 0;
        self.current_byte = 0;
        self.bit_index = 0;
        self.state = State::TagBit;
        self.buffers.iter_mut().for_each(|b| *b = 0);
    }

    /// Copy as many bytes of `input` as fit into the staging buffer,
    /// returning how many were accepted.
    ///
    /// Returns [`SinkResult::Full`] (accepting nothing) if the staging
    /// buffer is already full; call `poll` to drain it first.
    pub fn sink(&mut self, input: &[u8]) -> (usize, SinkResult) {
        let remaining = self.input_buffer_size - self.input_size;
        if remaining == 0 {
            return (0, SinkResult::Full);
        }

        let copy_size = remaining.min(input.len());
        self.buffers[self.input_size..self.input_size + copy_size]
            .copy_from_slice(&input[..copy_size]);
        self.input_size += copy_size;

        (copy_size, SinkResult::Ok)
    }

    /// Drive the state machine, writing decompressed bytes into `out`.
    ///
    /// Returns [`PollResult::More`] once `out` is full and more output
    /// remains, [`PollResult::Empty`] once the staged input is fully
    /// consumed, and [`PollResult::Misuse`] if `out` is empty.
    pub fn poll(&mut self, out: &mut [u8]) -> (usize, PollResult) {
        if out.is_empty() {
            return (0, PollResult::Misuse);
        }

        let mut oi = OutputInfo::new(out);

        loop {
            let in_state = self.state;

            self.state = match in_state {
                State::TagBit => self.st_tag_bit(),
                State::YieldLiteral => self.st_yield_literal(&mut oi),
                State::BackrefIndex => self.st_backref_index(),
                State::BackrefCount => self.st_backref_count(),
                State::YieldBackref => self.st_yield_backref(&mut oi),
            };

            #[cfg(feature = "log")]
            if self.state != in_state {
                log::trace!("decoder: {:?} -> {:?}", in_state, self.state);
            }

            if self.state == in_state {
                return if oi.can_take_byte() {
                    (oi.written(), PollResult::Empty)
                } else {
                    (oi.written(), PollResult::More)
                };
            }
        }
    }

    /// Signal that no more input is coming.
    ///
    /// Returns [`FinishResult::Done`] once the staging buffer is fully
    /// consumed, [`FinishResult::More`] if `poll` still has bytes to yield.
    pub fn finish(&self) -> FinishResult {
        if self.input_size == 0 {
            FinishResult::Done
        } else {
            FinishResult::More
        }
    }

    fn st_tag_bit(&mut self) -> State {
        match self.get_bits(1) {
            None => State::TagBit,
            Some(tag) if tag == MARK_LIT as u16 => State::YieldLiteral,
            Some(_) => State::BackrefIndex,
        }
    }

    fn st_yield_literal(&mut self, oi: &mut OutputInfo) -> State {
        if !oi.can_take_byte() {
            return State::YieldLiteral;
        }
        match self.get_bits(8) {
            None => State::YieldLiteral,
            Some(x) => {
                let c = x as u8;
                self.window_push(c);
                oi.push_byte(c);
                State::TagBit
            }
        }
    }

    fn st_backref_index(&mut self) -> State {
        match self.get_bits(self.window_bits) {
            None => State::BackrefIndex,
            Some(bits) => {
                self.output_index = bits + 1;
                State::BackrefCount
            }
        }
    }

    fn st_backref_count(&mut self) -> State {
        match self.get_bits(self.lookahead_bits) {
            None => State::BackrefCount,
            Some(bits) => {
                self.output_count = bits + 1;
                State::YieldBackref
            }
        }
    }

    fn st_yield_backref(&mut self, oi: &mut OutputInfo) -> State {
        let mut count = oi.remaining_free_size();
        if count == 0 {
            return State::YieldBackref;
        }
        count = count.min(self.output_count as usize);

        for _ in 0..count {
            let src = self.head_index.wrapping_sub(self.output_index) & self.window_mask;
            let c = self.window_byte(src);
            self.window_push(c);
            oi.push_byte(c);
        }

        self.output_count -= count as u16;
        if self.output_count == 0 {
            State::TagBit
        } else {
            State::YieldBackref
        }
    }

    fn window_byte(&self, masked_index: u16) -> u8 {
        self.buffers[self.input_buffer_size + masked_index as usize]
    }

    fn window_push(&mut self, byte: u8) {
        let offset = self.input_buffer_size + (self.head_index & self.window_mask) as usize;
        self.buffers[offset] = byte;
        self.head_index = self.head_index.wrapping_add(1);
    }

    /// Bits immediately available without consuming any input: the unread
    /// tail of `current_byte` plus a full byte for every byte still staged
    /// but not yet loaded into `current_byte`.
    fn bits_available(&self) -> u32 {
        let partial = if self.bit_index == 0 {
            0
        } else {
            self.bit_index.trailing_zeros() + 1
        };
        partial + (self.input_size - self.input_index) as u32 * 8
    }

    /// Get the next `count` bits from the input, MSB-first, saving
    /// incremental progress across calls. `count` must be in `1..=15`.
    ///
    /// Unlike the historical C implementation (and its direct ports), this
    /// checks the exact number of bits on hand before consuming any of them,
    /// rather than a `bit_index < (1 << (count - 1))` heuristic that only
    /// applies once the staging buffer is empty and underflows outright for
    /// `count == 0`. That means a `sink` of single bytes at a time never
    /// loses partially-consumed bits to a call that turns out to be
    /// underfed.
    fn get_bits(&mut self, count: u8) -> Option<u16> {
        if count == 0 || count > 15 || (self.bits_available() as u8) < count {
            return None;
        }

        let mut accumulator: u16 = 0;
        for _ in 0..count {
            if self.bit_index == 0 {
                self.current_byte = self.buffers[self.input_index];
                self.input_index += 1;
                if self.input_index == self.input_size {
                    self.input_index = 0;
                    self.input_size = 0;
                }
                self.bit_index = 0x80;
            }
            accumulator <<= 1;
            if self.current_byte & self.bit_index != 0 {
                accumulator |= 1;
            }
            self.bit_index >>= 1;
        }

        Some(accumulator)
    }
}
