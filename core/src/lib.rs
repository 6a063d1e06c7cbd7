//! Decoder for Roland MC-202 MicroComposer cassette data dumps
//!
//! The MC-202 saves a pattern to tape as an FSK tone: a "1" bit is four
//! cycles of ~2371 Hz, a "0" bit two cycles at half that frequency. This
//! crate recovers the saved byte payload from a PCM recording of such a
//! dump and parses it into a structured sequence.
//!
//! The pipeline runs in four stages: sign-change extraction over the raw
//! samples ([`sign_change_bits`]), byte reassembly from the transition
//! bitstream ([`reassemble_bytes`], wrapped with a retry by
//! [`decode_audio`]), payload validation ([`validate_payload`]), and
//! parsing into note lines ([`parse_payload`]).

pub mod decoder;
pub mod error;
pub mod framer;
pub mod parse;
pub mod pcm;
pub mod validate;

pub use decoder::decode_audio;
pub use error::{Result, TapeError};
pub use framer::reassemble_bytes;
pub use parse::{
    note_name, note_octave, parse_payload, parse_payload_with_limit, NoteLine, Sequence,
};
pub use pcm::{sign_change_bits, BufferSource, PcmSource};
pub use validate::{validate_payload, validate_payload_with_limit};

// Tape format constants

/// Frequency of the "1" tone in Hz. A "0" is carried at half this frequency.
pub const BASE_FREQ: f64 = 2371.0;

/// Synchronization marker ending the leader tone and beginning the payload.
pub const MAGIC_BYTE: u8 = 0xE0;

/// Body byte representing a musical bar line.
pub const BAR_BYTE: u8 = 0xFF;

/// Length of the run of "1" bits separating the program number from the
/// length-prefixed body.
pub const GUARD_TONE_BITS: usize = 122;

/// Samples pulled from the PCM source per buffer fill.
pub const FRAMES_PER_READ: usize = 8192;

/// A window of transition bits holding at least this many is a "1" bit.
pub const DENSE_THRESHOLD: usize = 7;

/// The sliding window count falling to this signals a start bit.
pub const START_BIT_THRESHOLD: usize = 4;

/// Payload bytes before the body: magic, three program digits, two length
/// bytes.
pub const HEADER_BYTES: usize = 6;

/// Payload bytes after the body: first parity byte, two length-echo bytes,
/// second parity byte.
pub const TRAILER_BYTES: usize = 4;

/// Canonical upper bound on the line count of a single-channel dump.
pub const MAX_TOTAL_LINES: u16 = 999;

/// Absolute bound a caller-supplied line-count limit is clamped to. The
/// hardware stores roughly 2600 steps of three lines each.
pub const HARD_MAX_TOTAL_LINES: u16 = 10_000;

/// Number of audio frames spanning one encoded bit.
pub fn frames_per_bit(sample_rate: u32) -> usize {
    (sample_rate as f64 * 4.0 / BASE_FREQ + 0.5) as usize
}
