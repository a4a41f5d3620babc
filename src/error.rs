use core::fmt;

/// Why [`crate::encoder::Encoder::new`] or [`crate::decoder::Decoder::new`]
/// refused to construct a codec instance.
///
/// Construction validates its parameters up front rather than clamping them,
/// so a caller that mismatches `window_bits`/`lookahead_bits` between an
/// encoder and its decoder finds out immediately instead of producing a
/// stream the other side can't parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `window_bits` fell outside `[MIN_WINDOW_BITS, MAX_WINDOW_BITS]`.
    WindowBits(u8),
    /// `lookahead_bits` fell outside `[MIN_LOOKAHEAD_BITS, window_bits]`.
    LookaheadBits {
        /// The rejected lookahead size, in bits.
        lookahead_bits: u8,
        /// The window size, in bits, it was checked against.
        window_bits: u8,
    },
    /// The decoder's input buffer size was zero.
    InputBufferSize,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::WindowBits(w) => write!(
                f,
                "window_bits={w} is out of range [{}, {}]",
                crate::MIN_WINDOW_BITS,
                crate::MAX_WINDOW_BITS
            ),
            ConfigError::LookaheadBits {
                lookahead_bits,
                window_bits,
            } => write!(
                f,
                "lookahead_bits={lookahead_bits} is out of range [{}, window_bits={window_bits}]",
                crate::MIN_LOOKAHEAD_BITS
            ),
            ConfigError::InputBufferSize => write!(f, "input_buffer_size must be at least 1"),
        }
    }
}

impl core::error::Error for ConfigError {}
