//! Adapter from a hound WAV reader to the core's PCM source contract.

use std::io::{Read, Seek};

use mc202tape_core::{PcmSource, Result, TapeError};

pub struct WavSource<R: Read + Seek> {
    reader: hound::WavReader<R>,
    spec: hound::WavSpec,
}

impl<R: Read + Seek> WavSource<R> {
    pub fn new(reader: hound::WavReader<R>) -> Self {
        let spec = reader.spec();
        Self { reader, spec }
    }
}

impl<R: Read + Seek> PcmSource for WavSource<R> {
    fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn num_channels(&self) -> u16 {
        self.spec.channels
    }

    fn bit_depth(&self) -> u16 {
        self.spec.bits_per_sample
    }

    fn rewind(&mut self) -> Result<()> {
        self.reader
            .seek(0)
            .map_err(|e| TapeError::PcmReadFailed(e.to_string()))
    }

    fn read_samples(&mut self, buf: &mut [i32]) -> Result<usize> {
        let mut n = 0;
        let mut samples = self.reader.samples::<i32>();
        while n < buf.len() {
            match samples.next() {
                Some(Ok(s)) => {
                    buf[n] = s;
                    n += 1;
                }
                Some(Err(e)) => return Err(TapeError::PcmReadFailed(e.to_string())),
                None => break,
            }
        }
        Ok(n)
    }
}
