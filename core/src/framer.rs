//! FSK byte reassembly from a transition bitstream.
//!
//! Tape bytes are framed as one start bit ("0"), eight data bits LSB first,
//! and two stop bits ("1"). Over one bit time a "1" tone produces roughly
//! eight sign changes and a "0" tone four, so a window of `frames_per_bit`
//! transition bits classifies the encoded bit by its ones-count alone.
//!
//! The framer slides such a window over the bitstream one transition at a
//! time. A drop in the running count marks a start bit; eight windows are
//! then read as data and two more checked as stop bits. Nothing before the
//! magic byte is trusted, a fixed guard tone is walked after the program
//! number, and the stream ends once the count promised by the embedded
//! length field has been collected. Framing failures rewind the cursor and
//! resume the scan, dropping the magic-byte hypothesis if one was active.

use tracing::debug;

use crate::error::{Result, TapeError};
use crate::{
    frames_per_bit, DENSE_THRESHOLD, GUARD_TONE_BITS, HEADER_BYTES, MAGIC_BYTE, MAX_TOTAL_LINES,
    START_BIT_THRESHOLD, TRAILER_BYTES,
};

/// Data bits arrive least significant first.
const BIT_MASKS: [u8; 8] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80];

/// Largest payload a single-channel dump can occupy.
const MAX_PAYLOAD_BYTES: usize = HEADER_BYTES + MAX_TOTAL_LINES as usize + TRAILER_BYTES;

/// Ring of the last `frames_per_bit` transition bits with a running count
/// of how many are set.
struct SampleWindow {
    slots: Vec<bool>,
    pos: usize,
    ones: usize,
}

impl SampleWindow {
    fn new(len: usize) -> Self {
        Self {
            slots: vec![false; len],
            pos: 0,
            ones: 0,
        }
    }

    /// Seed the window with the bits leading up to the first cursor
    /// position. One slot is left empty for the first push.
    fn prefill(&mut self, bits: &[bool]) {
        let n = (self.slots.len() - 1).min(bits.len());
        self.slots[..n].copy_from_slice(&bits[..n]);
        self.ones = self.slots.iter().filter(|&&b| b).count();
    }

    /// Push one bit, evicting the bit from a full window ago.
    fn push(&mut self, bit: bool) {
        if self.slots[self.pos] {
            self.ones -= 1;
        }
        if bit {
            self.ones += 1;
        }
        self.slots[self.pos] = bit;
        self.pos = (self.pos + 1) % self.slots.len();
    }

    /// Overwrite the window with the bits at `start`, clamped to the end of
    /// the stream.
    fn refill(&mut self, bits: &[bool], start: usize) {
        for i in 0..self.slots.len() {
            if start + i >= bits.len() {
                break;
            }
            self.slots[self.pos] = bits[start + i];
            self.pos = (self.pos + 1) % self.slots.len();
        }
        self.ones = self.slots.iter().filter(|&&b| b).count();
    }
}

/// Stateful reassembler over a fully materialized transition bitstream.
///
/// Created fresh per decode attempt; consumed by [`ByteFramer::run`].
struct ByteFramer<'a> {
    bits: &'a [bool],
    frames_per_bit: usize,
    window: SampleWindow,
    cursor: usize,
    result: Vec<u8>,
    found_magic: bool,
    magic_index: usize,
    valid_byte_index: i32,
    /// Ordinal of the final payload byte; 0 until the length field is read.
    last_byte_index: usize,
    previous_byte: u8,
    inside_buffer: bool,
}

impl<'a> ByteFramer<'a> {
    fn new(bits: &'a [bool], sample_rate: u32) -> Self {
        let fpb = frames_per_bit(sample_rate);
        let mut window = SampleWindow::new(fpb);
        window.prefill(bits);
        Self {
            bits,
            frames_per_bit: fpb,
            window,
            cursor: fpb - 1,
            result: Vec::with_capacity(MAX_PAYLOAD_BYTES),
            found_magic: false,
            magic_index: 0,
            valid_byte_index: -1,
            last_byte_index: 0,
            previous_byte: 0,
            inside_buffer: false,
        }
    }

    /// Ones-count of one bit time starting at `at`, clamped to the end of
    /// the stream.
    fn density(&self, at: usize) -> usize {
        let end = (at + self.frames_per_bit).min(self.bits.len());
        if at >= end {
            return 0;
        }
        self.bits[at..end].iter().filter(|&&b| b).count()
    }

    /// Rebuild the window from the cursor and move past it.
    fn refill_window(&mut self) {
        self.window.refill(self.bits, self.cursor);
        self.cursor += self.frames_per_bit;
    }

    /// Drop the current magic-byte hypothesis and rescan from just past the
    /// bit where it was found.
    fn abort_magic_hypothesis(&mut self) {
        debug!(magic_index = self.magic_index, "false magic byte, rescanning");
        self.found_magic = false;
        self.cursor = self.magic_index + self.frames_per_bit;
        self.valid_byte_index = -1;
        self.magic_index = 0;
        self.result.clear();
    }

    /// Walk the fixed run of "1" bits separating the program number from
    /// the body.
    fn traverse_guard(&mut self) -> Result<()> {
        for _ in 0..GUARD_TONE_BITS {
            if self.density(self.cursor) < DENSE_THRESHOLD {
                return Err(TapeError::InvalidDataBuffer);
            }
            self.cursor += self.frames_per_bit;
        }
        self.inside_buffer = false;
        self.refill_window();
        Ok(())
    }

    fn accept(&mut self, byte_val: u8) {
        self.valid_byte_index += 1;

        if byte_val == MAGIC_BYTE {
            self.found_magic = true;
            // Anchor 11 bit times back: one start, eight data, two stop.
            self.magic_index = self.cursor.saturating_sub(self.frames_per_bit * 11);
        }

        // The second length byte fixes where the stream ends: five header
        // ordinals already emitted, the body, and the four trailer bytes.
        if self.valid_byte_index == 5 {
            let total_lines = u16::from_be_bytes([self.previous_byte, byte_val]) as usize;
            self.last_byte_index = 5 + total_lines + TRAILER_BYTES;
        }

        self.result.push(byte_val);
        self.previous_byte = byte_val;
    }

    fn run(mut self) -> Result<Vec<u8>> {
        'scan: while self.cursor < self.bits.len() {
            if self.inside_buffer {
                self.traverse_guard()?;
                continue;
            }

            self.window.push(self.bits[self.cursor]);

            if self.window.ones > START_BIT_THRESHOLD {
                self.cursor += 1;
                continue;
            }

            // Start bit: assemble eight data bits.
            let mut byte_val = 0u8;
            for mask in BIT_MASKS {
                if self.density(self.cursor) >= DENSE_THRESHOLD {
                    byte_val |= mask;
                }
                self.cursor += self.frames_per_bit;
            }

            // Anything before the magic byte is leader noise.
            if !self.found_magic && byte_val != MAGIC_BYTE {
                continue;
            }

            // The three bytes after the magic byte are the program number
            // digits. A non-digit means the magic byte was found in error.
            let ordinal = self.valid_byte_index + 1;
            if self.found_magic && (1..=3).contains(&ordinal) && byte_val > 9 {
                self.abort_magic_hypothesis();
                self.refill_window();
                continue;
            }

            // Both stop bits must be "1"s. The final byte is exempt: it
            // ends in a half-length pulse instead.
            if self.last_byte_index == 0 || ordinal as usize != self.last_byte_index {
                for i in 0..2 {
                    if self.density(self.cursor) < DENSE_THRESHOLD {
                        self.cursor -= self.frames_per_bit * (8 + i);
                        if self.found_magic {
                            self.abort_magic_hypothesis();
                        }
                        self.refill_window();
                        continue 'scan;
                    }
                    self.cursor += self.frames_per_bit;
                }
            }

            self.accept(byte_val);

            if self.last_byte_index != 0 && self.valid_byte_index as usize == self.last_byte_index {
                break;
            }

            if self.valid_byte_index == 3 {
                // The guard tone follows the program number; hold off the
                // window refill until it has been walked.
                self.inside_buffer = true;
                continue;
            }

            self.refill_window();
        }

        let expected = self.last_byte_index + 1;
        if self.result.len() != expected {
            return Err(TapeError::TruncatedPayload {
                actual: self.result.len(),
                expected,
            });
        }

        Ok(self.result)
    }
}

/// Recover the length-prefixed byte payload from a transition bitstream.
pub fn reassemble_bytes(bits: &[bool], sample_rate: u32) -> Result<Vec<u8>> {
    ByteFramer::new(bits, sample_rate).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44_100;

    fn fpb() -> usize {
        frames_per_bit(SAMPLE_RATE)
    }

    // Transition-bit renderings of one encoded bit. Ones are spread the
    // way the tones cross zero: eight per "1" bit, four per "0" bit. The
    // "1" pattern is back-loaded so a sliding window never goes sparse
    // inside a run of "1"s.
    fn push_tone_bit(bits: &mut Vec<bool>, one: bool) {
        let n = fpb();
        let mut frame = vec![false; n];
        if one {
            let step = n / 8;
            for k in 0..8 {
                frame[n - 1 - k * step] = true;
            }
        } else {
            let step = n / 4;
            for k in 0..4 {
                frame[step / 2 + k * step] = true;
            }
        }
        bits.extend(frame);
    }

    fn push_leader(bits: &mut Vec<bool>, count: usize) {
        for _ in 0..count {
            push_tone_bit(bits, true);
        }
    }

    fn push_byte(bits: &mut Vec<bool>, b: u8) {
        push_tone_bit(bits, false);
        for mask in BIT_MASKS {
            push_tone_bit(bits, b & mask != 0);
        }
        push_tone_bit(bits, true);
        push_tone_bit(bits, true);
    }

    /// The final byte carries no stop bits.
    fn push_last_byte(bits: &mut Vec<bool>, b: u8) {
        push_tone_bit(bits, false);
        for mask in BIT_MASKS {
            push_tone_bit(bits, b & mask != 0);
        }
    }

    fn push_guard(bits: &mut Vec<bool>) {
        for _ in 0..GUARD_TONE_BITS {
            push_tone_bit(bits, true);
        }
    }

    /// Render a complete dump: leader, framed payload bytes with the guard
    /// tone after the program number, and a short tail.
    fn payload_bits(payload: &[u8]) -> Vec<bool> {
        let mut bits = Vec::new();
        push_leader(&mut bits, 40);
        for (idx, &b) in payload.iter().enumerate() {
            if idx + 1 == payload.len() {
                push_last_byte(&mut bits, b);
            } else {
                push_byte(&mut bits, b);
            }
            if idx == 3 {
                push_guard(&mut bits);
            }
        }
        push_leader(&mut bits, 4);
        bits
    }

    /// Program 123, three lines, one note, both parity bytes balanced.
    const MINIMAL: [u8; 13] = [
        0xE0, 0x01, 0x02, 0x03, 0x00, 0x03, 0x18, 0x0C, 0x1A, 0xBF, 0x00, 0x03, 0xFD,
    ];

    #[test]
    fn test_minimal_payload() {
        let bits = payload_bits(&MINIMAL);
        let bytes = reassemble_bytes(&bits, SAMPLE_RATE).unwrap();
        assert_eq!(bytes, MINIMAL);
    }

    #[test]
    fn test_empty_body_payload() {
        // Zero lines: parity bytes over nothing are zero.
        let payload = [0xE0, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let bits = payload_bits(&payload);
        let bytes = reassemble_bytes(&bits, SAMPLE_RATE).unwrap();
        assert_eq!(bytes, payload);
    }

    #[test]
    fn test_false_magic_digit_resync() {
        // A spurious magic byte followed by a non-digit must be dropped,
        // and the real dump found later in the stream.
        let mut bits = Vec::new();
        push_leader(&mut bits, 30);
        push_byte(&mut bits, 0xE0);
        push_byte(&mut bits, 0x55);
        push_leader(&mut bits, 200);
        bits.extend(payload_bits(&MINIMAL));

        let bytes = reassemble_bytes(&bits, SAMPLE_RATE).unwrap();
        assert_eq!(bytes, MINIMAL);
    }

    #[test]
    fn test_bad_stop_bit_before_magic_rescans() {
        // A magic byte whose first stop bit is a "0" is rejected by the
        // framing check before it is ever accepted.
        let mut bits = Vec::new();
        push_leader(&mut bits, 30);
        push_tone_bit(&mut bits, false);
        for mask in BIT_MASKS {
            push_tone_bit(&mut bits, 0xE0 & mask != 0);
        }
        push_tone_bit(&mut bits, false); // corrupt stop 1
        push_tone_bit(&mut bits, true);
        push_leader(&mut bits, 200);
        bits.extend(payload_bits(&MINIMAL));

        let bytes = reassemble_bytes(&bits, SAMPLE_RATE).unwrap();
        assert_eq!(bytes, MINIMAL);
    }

    #[test]
    fn test_corrupt_guard_tone() {
        let mut bits = Vec::new();
        push_leader(&mut bits, 40);
        for &b in &MINIMAL[..4] {
            push_byte(&mut bits, b);
        }
        // Guard tone with a "0" in the middle.
        for i in 0..GUARD_TONE_BITS {
            push_tone_bit(&mut bits, i != 60);
        }
        for &b in &MINIMAL[4..] {
            push_byte(&mut bits, b);
        }

        match reassemble_bytes(&bits, SAMPLE_RATE) {
            Err(TapeError::InvalidDataBuffer) => {}
            other => panic!("expected InvalidDataBuffer, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_stream() {
        let full = payload_bits(&MINIMAL);
        // Cut off mid-body, well after the guard tone.
        let cut = full.len() - 6 * 11 * fpb();
        match reassemble_bytes(&full[..cut], SAMPLE_RATE) {
            Err(TapeError::TruncatedPayload { expected: 13, .. }) => {}
            other => panic!("expected TruncatedPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_leader_only_stream() {
        let mut bits = Vec::new();
        push_leader(&mut bits, 100);
        match reassemble_bytes(&bits, SAMPLE_RATE) {
            Err(TapeError::TruncatedPayload {
                actual: 0,
                expected: 1,
            }) => {}
            other => panic!("expected empty TruncatedPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_window_push_and_refill() {
        let mut window = SampleWindow::new(4);
        window.prefill(&[true, true, false, true]);
        assert_eq!(window.ones, 2);

        window.push(true);
        assert_eq!(window.ones, 2); // evicts the leading true
        window.push(true);
        assert_eq!(window.ones, 2);

        window.refill(&[false, false, false, false], 0);
        assert_eq!(window.ones, 0);
    }
}
