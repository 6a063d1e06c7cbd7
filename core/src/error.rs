use thiserror::Error;

#[derive(Debug, Error)]
pub enum TapeError {
    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    #[error("PCM read failed: {0}")]
    PcmReadFailed(String),

    #[error("invalid data buffer: guard tone interrupted")]
    InvalidDataBuffer,

    #[error("truncated payload: got {actual} bytes, expected {expected}")]
    TruncatedPayload { actual: usize, expected: usize },

    #[error("invalid magic byte: {0:02X}")]
    InvalidMagicByte(u8),

    #[error("invalid program number digit {pos}: {value}")]
    InvalidProgramDigit { pos: usize, value: u8 },

    #[error("invalid total line count: {0}")]
    InvalidTotalLines(u16),

    #[error("truncated input: {0} bytes")]
    TruncatedInput(usize),

    #[error("body checksum mismatch: computed {computed:02X}, parity byte {expected:02X}")]
    BadChecksum1 { computed: u8, expected: u8 },

    #[error("length echo checksum mismatch: computed {computed:02X}, parity byte {expected:02X}")]
    BadChecksum2 { computed: u8, expected: u8 },

    #[error("line count mismatch: header says {primary}, trailer echo says {echo}")]
    LengthMismatch { primary: u16, echo: u16 },

    #[error("note lines not grouped in threes: {0}")]
    NonTripleNoteLines(usize),
}

pub type Result<T> = std::result::Result<T, TapeError>;
