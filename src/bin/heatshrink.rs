use clap::{ArgGroup, Parser};
use heatshrink::decoder::Decoder;
use heatshrink::encoder::Encoder;
use heatshrink::{FinishResult, PollResult, SinkResult};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

const APP_BUFFER_SIZE: usize = 64 * 1024;
/// Local throughput knob for the decoder's staging buffer; has no effect on
/// the wire format (unlike `-w`/`-l`, which both sides must agree on).
const DEFAULT_DECODER_INPUT_BUFFER_SIZE: usize = 512;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Config(#[from] heatshrink::ConfigError),
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encoder reported a misuse error (this is a bug)")]
    EncoderMisuse,
    #[error("decoder reported a misuse error (this is a bug)")]
    DecoderMisuse,
}

#[derive(Parser)]
#[clap(author, version, about = "Stream data through the Heatshrink compressor.", long_about = None)]
#[clap(group(ArgGroup::new("command").required(true).args(&["encode", "decode"])))]
struct Cli {
    #[clap(short = 'e', long = "encode", help = "Compress data")]
    encode: bool,

    #[clap(short = 'd', long = "decode", help = "Decompress data")]
    decode: bool,

    #[clap(
        short = 'w',
        long = "window",
        default_value_t = heatshrink::DEFAULT_WINDOW_BITS,
        help = "Window size, in bits (log2 of the sliding window in bytes)"
    )]
    window_bits: u8,

    #[clap(
        short = 'l',
        long = "lookahead",
        default_value_t = heatshrink::DEFAULT_LOOKAHEAD_BITS,
        help = "Lookahead size, in bits (log2 of the longest match)"
    )]
    lookahead_bits: u8,

    #[clap(
        short = 'v',
        long = "verbose",
        help = "Print input & output sizes, compression ratio, etc."
    )]
    verbose: bool,

    /// Input file; reads standard input if omitted.
    input_file: Option<PathBuf>,

    /// Output file; writes standard output if omitted.
    output_file: Option<PathBuf>,
}

fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn Read>, CliError> {
    match path {
        Some(path) => File::open(path)
            .map(|f| Box::new(f) as Box<dyn Read>)
            .map_err(|source| CliError::Read {
                path: path.clone(),
                source,
            }),
        None => Ok(Box::new(io::stdin())),
    }
}

fn open_output(path: Option<&PathBuf>) -> Result<Box<dyn Write>, CliError> {
    match path {
        Some(path) => File::create(path)
            .map(|f| Box::new(f) as Box<dyn Write>)
            .map_err(|source| CliError::Write {
                path: path.clone(),
                source,
            }),
        None => Ok(Box::new(io::stdout())),
    }
}

fn encode(
    mut input: impl Read,
    mut output: impl Write,
    window_bits: u8,
    lookahead_bits: u8,
) -> Result<(u64, u64), CliError> {
    let mut enc = Encoder::new(window_bits, lookahead_bits)?;
    let mut in_buf = [0u8; APP_BUFFER_SIZE];
    let mut out_buf = [0u8; APP_BUFFER_SIZE];
    let (mut total_in, mut total_out) = (0u64, 0u64);

    loop {
        let read = input.read(&mut in_buf).map_err(|source| CliError::Read {
            path: PathBuf::from("<input>"),
            source,
        })?;
        total_in += read as u64;

        let mut sunk = 0;
        while sunk < read {
            let (n, res) = enc.sink(&in_buf[sunk..read]);
            if res == SinkResult::Misuse {
                return Err(CliError::EncoderMisuse);
            }
            sunk += n;
            total_out += drain_poll(&mut |buf| enc.poll(buf), &mut out_buf, &mut output)?;
        }

        if read == 0 {
            loop {
                total_out += drain_poll(&mut |buf| enc.poll(buf), &mut out_buf, &mut output)?;
                if enc.finish() == FinishResult::Done {
                    total_out += drain_poll(&mut |buf| enc.poll(buf), &mut out_buf, &mut output)?;
                    break;
                }
            }
            break;
        }
    }

    Ok((total_in, total_out))
}

fn decode(
    mut input: impl Read,
    mut output: impl Write,
    window_bits: u8,
    lookahead_bits: u8,
) -> Result<(u64, u64), CliError> {
    let mut dec = Decoder::new(DEFAULT_DECODER_INPUT_BUFFER_SIZE, window_bits, lookahead_bits)?;
    let mut in_buf = [0u8; APP_BUFFER_SIZE];
    let mut out_buf = [0u8; APP_BUFFER_SIZE];
    let (mut total_in, mut total_out) = (0u64, 0u64);

    loop {
        let read = input.read(&mut in_buf).map_err(|source| CliError::Read {
            path: PathBuf::from("<input>"),
            source,
        })?;
        total_in += read as u64;

        let mut sunk = 0;
        while sunk < read {
            let (n, res) = dec.sink(&in_buf[sunk..read]);
            if res == SinkResult::Misuse {
                return Err(CliError::DecoderMisuse);
            }
            sunk += n;
            total_out += drain_poll(&mut |buf| dec.poll(buf), &mut out_buf, &mut output)?;
        }

        if read == 0 {
            break;
        }
    }

    if dec.finish() == FinishResult::More {
        log::warn!("input ended with an incomplete symbol; trailing bits were discarded");
    }

    Ok((total_in, total_out))
}

fn drain_poll(
    poll: &mut dyn FnMut(&mut [u8]) -> (usize, PollResult),
    buf: &mut [u8],
    output: &mut impl Write,
) -> Result<u64, CliError> {
    let mut written = 0u64;
    loop {
        let (n, res) = poll(buf);
        if n > 0 {
            output
                .write_all(&buf[..n])
                .map_err(|source| CliError::Write {
                    path: PathBuf::from("<output>"),
                    source,
                })?;
            written += n as u64;
        }
        if res != PollResult::More {
            return Ok(written);
        }
    }
}

fn report(
    input_file: &Option<PathBuf>,
    window_bits: u8,
    lookahead_bits: u8,
    total_in: u64,
    total_out: u64,
) {
    let name = input_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<stdin>".to_string());
    let ratio = if total_in == 0 {
        0.0
    } else {
        100.0 - (100.0 * total_out as f64) / total_in as f64
    };
    eprintln!(
        "{name} {ratio:.2}% \t{total_in} -> {total_out} (-w {window_bits} -l {lookahead_bits})"
    );
}

fn run() -> Result<(), CliError> {
    let args = Cli::parse();

    let input = open_input(args.input_file.as_ref())?;
    let output = open_output(args.output_file.as_ref())?;

    log::debug!(
        "window_bits={} lookahead_bits={} encode={}",
        args.window_bits,
        args.lookahead_bits,
        args.encode
    );

    let (total_in, total_out) = if args.encode {
        encode(input, output, args.window_bits, args.lookahead_bits)?
    } else {
        decode(input, output, args.window_bits, args.lookahead_bits)?
    };

    if args.verbose {
        report(
            &args.input_file,
            args.window_bits,
            args.lookahead_bits,
            total_in,
            total_out,
        );
    }

    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        eprintln!("heatshrink: {err}");
        std::process::exit(1);
    }
}
