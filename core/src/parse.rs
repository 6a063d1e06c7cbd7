//! Parsed sequence model and the payload walker.

use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::validate::validate_payload_with_limit;
use crate::{BAR_BYTE, HEADER_BYTES, MAX_TOTAL_LINES};

/// Chromatic note names, C-rooted. Octaves count from 1.
const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Name of a note number within its octave.
pub fn note_name(note_num: u8) -> &'static str {
    NOTE_NAMES[note_num as usize % 12]
}

/// Octave of a note number, counting from 1.
pub fn note_octave(note_num: u8) -> u8 {
    note_num / 12 + 1
}

/// One line of a pattern. A note occupies three payload bytes, a bar
/// marker one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NoteLine {
    Bar,
    Note {
        note_num: u8,
        note_name: &'static str,
        octave: u8,
        step_length: u8,
        gate_length: u8,
        portamento: bool,
        accent: bool,
    },
}

/// A parsed tape dump: one program's pattern plus its integrity trailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sequence {
    pub magic_byte: u8,
    pub program_number: u16,
    pub total_lines: u16,
    pub notes: Vec<NoteLine>,
    pub parity_byte_1: u8,
    pub total_lines_2: u16,
    pub parity_byte_2: u8,
}

/// Parse a payload into a sequence, canonical line-count bound.
pub fn parse_payload(data: &[u8]) -> Result<Sequence> {
    parse_payload_with_limit(data, MAX_TOTAL_LINES)
}

/// Parse with a caller-chosen upper bound on the line count.
///
/// Validation runs first, so any payload this accepts has both parity
/// bytes and the length echo intact.
pub fn parse_payload_with_limit(data: &[u8], max_lines: u16) -> Result<Sequence> {
    validate_payload_with_limit(data, max_lines)?;

    let total_lines = u16::from_be_bytes([data[4], data[5]]);
    let body_end = HEADER_BYTES + total_lines as usize;

    let mut notes = Vec::new();
    let mut i = HEADER_BYTES;
    while i < body_end {
        if data[i] == BAR_BYTE {
            notes.push(NoteLine::Bar);
            i += 1;
            continue;
        }

        let flags = data[i + 2];
        let note_num = flags & 0x3F;
        notes.push(NoteLine::Note {
            note_num,
            note_name: note_name(note_num),
            octave: note_octave(note_num),
            step_length: data[i],
            gate_length: data[i + 1],
            portamento: flags & 0x80 != 0,
            accent: flags & 0x40 != 0,
        });
        i += 3;
    }

    Ok(Sequence {
        magic_byte: data[0],
        program_number: data[1] as u16 * 100 + data[2] as u16 * 10 + data[3] as u16,
        total_lines,
        notes,
        parity_byte_1: data[body_end],
        total_lines_2: u16::from_be_bytes([data[body_end + 1], data[body_end + 2]]),
        parity_byte_2: data[body_end + 3],
    })
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Program Number: {}", self.program_number)?;
        writeln!(f, "Total Lines: {}", self.total_lines)?;
        writeln!(f, "Notes:")?;
        if self.notes.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for line in &self.notes {
            match line {
                NoteLine::Bar => writeln!(f, "  Bar")?,
                NoteLine::Note {
                    note_num,
                    note_name,
                    octave,
                    step_length,
                    gate_length,
                    portamento,
                    accent,
                } => writeln!(
                    f,
                    "  {}{} (#{}) step={} gate={} portamento={} accent={}",
                    note_name, octave, note_num, step_length, gate_length, portamento, accent
                )?,
            }
        }
        writeln!(f, "Parity Byte 1: {:02X}", self.parity_byte_1)?;
        writeln!(f, "Line Count Echo: {}", self.total_lines_2)?;
        write!(f, "Parity Byte 2: {:02X}", self.parity_byte_2)
    }
}
