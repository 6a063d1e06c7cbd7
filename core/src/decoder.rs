//! Top-level decode driver.

use tracing::warn;

use crate::error::Result;
use crate::framer::reassemble_bytes;
use crate::pcm::{sign_change_bits, PcmSource};

/// Decode a tape dump recording into its raw byte payload.
///
/// Runs the sign-change extractor and the byte reassembler once; on any
/// failure the pair is retried after absorbing one buffer fill from the
/// rewound source. Some WAV sources garble their first read, and absorbing
/// it is the only recovery this decoder attempts. A second failure is
/// final.
pub fn decode_audio(source: &mut dyn PcmSource) -> Result<Vec<u8>> {
    let sample_rate = source.sample_rate();

    let first_attempt =
        sign_change_bits(source, false).and_then(|bits| reassemble_bytes(&bits, sample_rate));

    match first_attempt {
        Ok(payload) => Ok(payload),
        Err(err) => {
            warn!(%err, "decode failed, retrying with one buffer absorbed");
            let bits = sign_change_bits(source, true)?;
            reassemble_bytes(&bits, sample_rate)
        }
    }
}
