use crate::check_window_lookahead;
use crate::common::{OutputInfo, MARK_LIT, MARK_REF};
use crate::error::ConfigError;
use crate::{FinishResult, PollResult, SinkResult};
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::min;

#[derive(Debug, Copy, Clone, PartialEq)]
enum State {
    NotFull,      // input buffer not full enough
    Filled,       // buffer is full
    Search,       // searching for patterns
    YieldTagBit,  // yield tag bit
    YieldLiteral, // emit literal byte
    YieldBrIndex, // yielding backref index
    YieldBrLen,   // yielding backref length
    SaveBacklog,  // copying buffer to backlog
    FlushBits,    // flush bit buffer
    Done,         // done
}

const FLAG_IS_FINISHING: u8 = 1;

/// Flattened linked-list sentinel meaning "no earlier occurrence".
///
/// The upstream qsib-cbie-embedded-heatshrink port stores this index as
/// `i16`, which overflows into negative offsets (and panics on out-of-range
/// slicing) once a window grows past `2^15` bytes, since `i16` tops out at
/// `32767`. A `window_bits` of 15 is explicitly in-range here, so the index
/// is widened to `i32`.
const NONE: i32 = -1;

/// Compresses a byte stream into the Heatshrink bitstream, incrementally.
///
/// Construct with the same `window_bits`/`lookahead_bits` the matching
/// [`crate::decoder::Decoder`] uses, `sink` input bytes, `poll` compressed
/// bytes out, and call `finish` once all input has been sunk so the encoder
/// can flush its last partial symbol.
#[derive(Debug)]
pub struct Encoder {
    input_size: usize,
    match_scan_index: usize,
    match_length: usize,
    match_pos: u16,
    outgoing_bits: u16,
    outgoing_bits_count: u8,
    flags: u8,
    current_byte: u8,
    bit_index: u8,
    state: State,

    window_bits: u8,
    lookahead_bits: u8,
    /// Size of one half (backlog or active) of `buffer`: `2^window_bits`.
    input_buffer_size: usize,
    lookahead_size: usize,

    /// `2 * input_buffer_size` bytes: backlog half followed by active half.
    buffer: Vec<u8>,
    /// Byte-chain search index: `search_index[i]` is the most recent offset
    /// `< i` sharing `buffer[i]`'s value, or [`NONE`]. Only populated under
    /// the `heatshrink-use-index` feature; empty otherwise.
    #[cfg(feature = "heatshrink-use-index")]
    search_index: Vec<i32>,
}

impl Encoder {
    /// Construct an encoder with a `2^window_bits`-byte sliding window and a
    /// `2^lookahead_bits`-byte maximum match length.
    ///
    /// Fails if `window_bits` is outside `[MIN_WINDOW_BITS, MAX_WINDOW_BITS]`
    /// or `lookahead_bits` is outside `[MIN_LOOKAHEAD_BITS, window_bits]`.
    pub fn new(window_bits: u8, lookahead_bits: u8) -> Result<Self, ConfigError> {
        check_window_lookahead(window_bits, lookahead_bits)?;

        let input_buffer_size = 1usize << window_bits;
        let buf_sz = input_buffer_size * 2;

        Ok(Encoder {
            input_size: 0,
            match_scan_index: 0,
            match_length: 0,
            match_pos: 0,
            outgoing_bits: 0,
            outgoing_bits_count: 0,
            flags: 0,
            current_byte: 0,
            bit_index: 0x80,
            state: State::NotFull,
            window_bits,
            lookahead_bits,
            input_buffer_size,
            lookahead_size: 1usize << lookahead_bits,
            buffer: vec![0; buf_sz],
            #[cfg(feature = "heatshrink-use-index")]
            search_index: vec![0; buf_sz],
        })
    }

    /// Reset to the freshly-constructed state. Allocated buffers are reused
    /// in place rather than reallocated.
    pub fn reset(&mut self) {
        self.input_size = 0;
        self.match_scan_index = 0;
        self.match_length = 0;
        self.match_pos = 0;
        self.outgoing_bits = 0;
        self.outgoing_bits_count = 0;
        self.flags = 0;
        self.current_byte = 0;
        self.bit_index = 0x80;
        self.state = State::NotFull;
        self.buffer.iter_mut().for_each(|b| *b = 0);
        #[cfg(feature = "heatshrink-use-index")]
        self.search_index.iter_mut().for_each(|i| *i = 0);
    }

    /// Copy as many bytes of `input` as fit into the free space of the
    /// active half of the window, returning how many were accepted.
    ///
    /// Returns [`SinkResult::Misuse`] (accepting nothing) if called after
    /// [`Encoder::finish`] or while the active half is already full and
    /// waiting to be drained by `poll`.
    pub fn sink(&mut self, input: &[u8]) -> (usize, SinkResult) {
        if self.is_finishing() || self.state != State::NotFull {
            return (0, SinkResult::Misuse);
        }

        let write_offset = self.input_buffer_size + self.input_size;
        let remaining = self.input_buffer_size - self.input_size;

        if remaining == 0 {
            return (0, SinkResult::Full);
        }

        let copy_size = min(remaining, input.len());
        self.buffer[write_offset..write_offset + copy_size].copy_from_slice(&input[..copy_size]);
        self.input_size += copy_size;

        if self.input_size == self.input_buffer_size {
            self.state = State::Filled;
        }

        (copy_size, SinkResult::Ok)
    }

    /// Drive the state machine, writing compressed bytes into `out`.
    ///
    /// Returns [`PollResult::More`] once `out` is full and more output
    /// remains, [`PollResult::Empty`] once the encoder needs more input (or,
    /// after [`Encoder::finish`], once the stream is fully flushed), and
    /// [`PollResult::Misuse`] if `out` is empty.
    pub fn poll(&mut self, out: &mut [u8]) -> (usize, PollResult) {
        if out.is_empty() {
            return (0, PollResult::Misuse);
        }

        let mut oi = OutputInfo::new(out);

        loop {
            let in_state = self.state;

            self.state = match in_state {
                State::NotFull => return (oi.written(), PollResult::Empty),
                State::Filled => {
                    self.do_indexing();
                    State::Search
                }
                State::Search => self.st_step_search(),
                State::YieldTagBit => self.st_yield_tag_bit(&mut oi),
                State::YieldLiteral => self.st_yield_literal(&mut oi),
                State::YieldBrIndex => self.st_yield_br_index(&mut oi),
                State::YieldBrLen => self.st_yield_br_length(&mut oi),
                State::SaveBacklog => self.st_save_backlog(),
                State::FlushBits => self.st_flush_bit_buffer(&mut oi),
                State::Done => return (oi.written(), PollResult::Empty),
            };

            #[cfg(feature = "log")]
            if self.state != in_state {
                log::trace!("encoder: {:?} -> {:?}", in_state, self.state);
            }

            if self.state == in_state && !oi.can_take_byte() {
                return (oi.written(), PollResult::More);
            }
        }
    }

    /// Signal that no more input is coming. Idempotent; returns
    /// [`FinishResult::Done`] once the encoder has nothing left to `poll`.
    pub fn finish(&mut self) -> FinishResult {
        self.flags |= FLAG_IS_FINISHING;

        if self.state == State::NotFull {
            self.state = State::Filled;
        }

        if self.state == State::Done {
            FinishResult::Done
        } else {
            FinishResult::More
        }
    }

    fn st_step_search(&mut self) -> State {
        let lookahead_needed = if self.is_finishing() {
            1
        } else {
            self.lookahead_size
        };

        if self.match_scan_index + lookahead_needed > self.input_size {
            return if self.is_finishing() {
                State::FlushBits
            } else {
                State::SaveBacklog
            };
        }

        let end = self.input_buffer_size + self.match_scan_index;
        let start = end - self.input_buffer_size;
        let max_possible = min(self.lookahead_size, self.input_size - self.match_scan_index);

        match self.find_longest_match(start, end, max_possible) {
            None => {
                self.match_scan_index += 1;
                self.match_length = 0;
            }
            Some((pos, len)) => {
                self.match_pos = pos;
                self.match_length = len;
            }
        }
        State::YieldTagBit
    }

    fn st_yield_tag_bit(&mut self, oi: &mut OutputInfo) -> State {
        if !oi.can_take_byte() {
            return State::YieldTagBit;
        }
        if self.match_length == 0 {
            self.add_tag_bit(oi, MARK_LIT);
            State::YieldLiteral
        } else {
            self.add_tag_bit(oi, MARK_REF);
            self.outgoing_bits = self.match_pos - 1;
            self.outgoing_bits_count = self.window_bits;
            State::YieldBrIndex
        }
    }

    fn st_yield_literal(&mut self, oi: &mut OutputInfo) -> State {
        if !oi.can_take_byte() {
            return State::YieldLiteral;
        }
        self.push_literal_byte(oi);
        State::Search
    }

    fn st_yield_br_index(&mut self, oi: &mut OutputInfo) -> State {
        if !oi.can_take_byte() {
            return State::YieldBrIndex;
        }
        if self.push_outgoing_bits(oi) > 0 {
            State::YieldBrIndex
        } else {
            self.outgoing_bits = (self.match_length - 1) as u16;
            self.outgoing_bits_count = self.lookahead_bits;
            State::YieldBrLen
        }
    }

    fn st_yield_br_length(&mut self, oi: &mut OutputInfo) -> State {
        if !oi.can_take_byte() {
            return State::YieldBrLen;
        }
        if self.push_outgoing_bits(oi) > 0 {
            State::YieldBrLen
        } else {
            self.match_scan_index += self.match_length;
            self.match_length = 0;
            State::Search
        }
    }

    fn st_save_backlog(&mut self) -> State {
        self.save_backlog();
        State::NotFull
    }

    fn st_flush_bit_buffer(&mut self, oi: &mut OutputInfo) -> State {
        if self.bit_index == 0x80 {
            State::Done
        } else if oi.can_take_byte() {
            oi.push_byte(self.current_byte);
            State::Done
        } else {
            State::FlushBits
        }
    }

    fn add_tag_bit(&mut self, oi: &mut OutputInfo, tag: u8) {
        self.push_bits(1, tag, oi);
    }

    fn is_finishing(&self) -> bool {
        self.flags & FLAG_IS_FINISHING != 0
    }

    #[cfg(feature = "heatshrink-use-index")]
    fn do_indexing(&mut self) {
        let mut last = [NONE; 256];
        let end = self.input_buffer_size + self.input_size - 1;

        for i in 0..end {
            let v = self.buffer[i] as usize;
            self.search_index[i] = last[v];
            last[v] = i as i32;
        }
    }

    #[cfg(not(feature = "heatshrink-use-index"))]
    fn do_indexing(&mut self) {}

    #[cfg(feature = "heatshrink-use-index")]
    fn find_longest_match(&self, start: usize, end: usize, maxlen: usize) -> Option<(u16, usize)> {
        let mut match_maxlen = 0usize;
        let mut match_index = None;

        let mut pos = self.search_index[end];
        while pos >= start as i32 {
            let p = pos as usize;

            if self.buffer[p + match_maxlen] != self.buffer[end + match_maxlen] {
                pos = self.search_index[p];
                continue;
            }

            let mut len = 1;
            while len < maxlen && self.buffer[p + len] == self.buffer[end + len] {
                len += 1;
            }
            if len > match_maxlen {
                match_maxlen = len;
                match_index = Some(p);
                if len == maxlen {
                    break;
                }
            }

            pos = self.search_index[p];
        }

        self.match_if_worthwhile(end, match_index, match_maxlen)
    }

    #[cfg(not(feature = "heatshrink-use-index"))]
    fn find_longest_match(&self, start: usize, end: usize, maxlen: usize) -> Option<(u16, usize)> {
        let mut match_maxlen = 0usize;
        let mut match_index = None;

        let mut pos = end - 1;
        loop {
            if self.buffer[pos + match_maxlen] == self.buffer[end + match_maxlen]
                && self.buffer[pos] == self.buffer[end]
            {
                let mut len = 1;
                while len < maxlen && self.buffer[pos + len] == self.buffer[end + len] {
                    len += 1;
                }
                if len > match_maxlen {
                    match_maxlen = len;
                    match_index = Some(pos);
                    if len == maxlen {
                        break;
                    }
                }
            }

            if pos == start {
                break;
            }
            pos -= 1;
        }

        self.match_if_worthwhile(end, match_index, match_maxlen)
    }

    /// A match only pays for itself once it's longer than the bits it costs
    /// to encode as a back-reference (1 tag bit + `window_bits` index bits +
    /// `lookahead_bits` length bits), rounded down to whole bytes.
    fn match_if_worthwhile(
        &self,
        end: usize,
        match_index: Option<usize>,
        match_maxlen: usize,
    ) -> Option<(u16, usize)> {
        let break_even = (1 + self.window_bits as usize + self.lookahead_bits as usize) / 8;
        if match_maxlen > break_even {
            match_index.map(|idx| ((end - idx) as u16, match_maxlen))
        } else {
            None
        }
    }

    fn push_outgoing_bits(&mut self, oi: &mut OutputInfo) -> u8 {
        let (count, bits) = if self.outgoing_bits_count > 8 {
            (8, (self.outgoing_bits >> (self.outgoing_bits_count - 8)) as u8)
        } else {
            (self.outgoing_bits_count, self.outgoing_bits as u8)
        };

        if count > 0 {
            self.push_bits(count, bits, oi);
            self.outgoing_bits_count -= count;
        }

        count
    }

    fn push_bits(&mut self, count: u8, bits: u8, oi: &mut OutputInfo) {
        if count == 8 && self.bit_index == 0x80 {
            oi.push_byte(bits);
            return;
        }

        for i in (0..count).rev() {
            if bits & (1 << i) != 0 {
                self.current_byte |= self.bit_index;
            }
            self.bit_index >>= 1;
            if self.bit_index == 0 {
                self.bit_index = 0x80;
                oi.push_byte(self.current_byte);
                self.current_byte = 0;
            }
        }
    }

    fn push_literal_byte(&mut self, oi: &mut OutputInfo) {
        let offset = self.input_buffer_size + self.match_scan_index - 1;
        let c = self.buffer[offset];
        self.push_bits(8, c, oi);
    }

    fn save_backlog(&mut self) {
        let remaining = self.input_buffer_size - self.match_scan_index;
        let shift_size = self.input_buffer_size + remaining;
        self.buffer
            .copy_within(self.match_scan_index..self.match_scan_index + shift_size, 0);
        self.match_scan_index = 0;
        self.input_size -= self.input_buffer_size - remaining;
    }
}
