//! Bounded-memory payload transfer.
//!
//! [`ZeroFill`] produces silence and [`SampleCopier`] pulls sample blocks
//! out of an [`AudioSource`]. Both work through a single fixed buffer, so
//! memory use does not depend on the payload size.

use std::io::Write;

use tracing::warn;

use crate::error::{Error, Result};
use crate::source::AudioSource;

/// Zero buffer used for silence, 1 MiB.
pub const SILENCE_BUFFER_SIZE: usize = 0x10_0000;
/// Sample buffer used for extraction, 128 KiB.
pub const EXTRACT_BUFFER_SIZE: usize = 0x2_0000;

#[derive(Debug, Clone)]
pub struct ZeroFill {
    buffer: Vec<u8>,
}

impl Default for ZeroFill {
    fn default() -> Self {
        Self::with_capacity(SILENCE_BUFFER_SIZE)
    }
}

impl ZeroFill {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity.max(1)],
        }
    }

    /// Writes exactly `payload` zero bytes and returns the count written.
    ///
    /// The partial block goes first so that every following write is a
    /// whole buffer and the running total lands on `payload` exactly.
    pub fn write<W: Write + ?Sized>(&self, out: &mut W, payload: u64) -> Result<u64> {
        let capacity = self.buffer.len() as u64;
        let mut written = payload % capacity;
        out.write_all(&self.buffer[..written as usize])?;
        while written < payload {
            out.write_all(&self.buffer)?;
            written += capacity;
        }
        Ok(written)
    }
}

/// Copy progress, reported whenever the whole percentage changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub percent: u32,
    pub done: u64,
    pub total: u64,
}

impl Progress {
    fn new(done: u64, total: u64) -> Self {
        let percent = if total == 0 {
            100
        } else {
            (u128::from(done) * 100 / u128::from(total)) as u32
        };
        Self {
            percent,
            done,
            total,
        }
    }
}

#[derive(Debug)]
pub struct SampleCopier {
    buffer: Vec<u8>,
    block_align: usize,
}

impl SampleCopier {
    /// A copier whose buffer holds `capacity` bytes. The buffer has to fit
    /// at least one sample frame.
    pub fn new(capacity: usize, block_align: u32) -> Result<Self> {
        let block_align = block_align as usize;
        if block_align == 0 {
            return Err(Error::invalid_format("block align", "must not be zero"));
        }
        if block_align > capacity {
            return Err(Error::invalid_format(
                "block align",
                format!("{block_align} byte samples do not fit the {capacity} byte transfer buffer"),
            ));
        }
        Ok(Self {
            buffer: vec![0; capacity],
            block_align,
        })
    }

    pub fn samples_per_buffer(&self) -> u64 {
        (self.buffer.len() / self.block_align) as u64
    }

    /// Copies samples `0..total` of `stream` to `out` and returns how many
    /// reached the sink.
    ///
    /// The first request covers `total % samples_per_buffer` samples, the
    /// rest are whole buffers. Short reads are fine; a read that fails or
    /// yields nothing ends the copy early and the shortfall is left to the
    /// caller to report.
    pub fn copy<S, W, F>(
        &mut self,
        source: &mut S,
        stream: usize,
        total: u64,
        out: &mut W,
        mut on_progress: F,
    ) -> Result<u64>
    where
        S: AudioSource + ?Sized,
        W: Write + ?Sized,
        F: FnMut(Progress),
    {
        let per_buffer = self.samples_per_buffer();
        let mut request = match total % per_buffer {
            0 => per_buffer,
            remainder => remainder,
        };
        let mut cursor = 0;
        let mut last_percent = None;

        while cursor < total {
            let read = match source.read_samples(stream, cursor, request, &mut self.buffer) {
                Ok(read) => read.min(request),
                Err(err) => {
                    warn!("reading {request} samples at {cursor} failed: {err}");
                    0
                }
            };
            if read == 0 {
                warn!("source ended at sample {cursor} of {total}");
                break;
            }

            out.write_all(&self.buffer[..read as usize * self.block_align])?;
            cursor += read;

            let progress = Progress::new(cursor, total);
            if last_percent != Some(progress.percent) {
                last_percent = Some(progress.percent);
                on_progress(progress);
            }

            request = per_buffer;
        }

        Ok(cursor)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::source::memory::{pcm, MemorySource, Payload};
    use crate::WAVE_FORMAT_PCM;

    /// Counts bytes and the size of each write, dropping the data.
    #[derive(Default)]
    struct CountingSink {
        bytes: u64,
        writes: Vec<usize>,
    }

    impl Write for CountingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.bytes += buf.len() as u64;
            self.writes.push(buf.len());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn zero_fill_writes_remainder_first() {
        let fill = ZeroFill::with_capacity(16);
        let mut sink = CountingSink::default();
        assert_eq!(fill.write(&mut sink, 40).unwrap(), 40);
        assert_eq!(sink.bytes, 40);
        assert_eq!(sink.writes, vec![8, 16, 16]);
    }

    #[test]
    fn zero_fill_exact_multiples_and_empty() {
        let fill = ZeroFill::with_capacity(16);
        let mut sink = CountingSink::default();
        assert_eq!(fill.write(&mut sink, 32).unwrap(), 32);
        assert_eq!(sink.bytes, 32);

        let mut out = Vec::new();
        assert_eq!(fill.write(&mut out, 0).unwrap(), 0);
        assert!(out.is_empty());

        assert_eq!(fill.write(&mut out, 5).unwrap(), 5);
        assert_eq!(out, vec![0; 5]);
    }

    #[test]
    fn copier_rejects_oversized_frames() {
        assert!(SampleCopier::new(16, 32).is_err());
        assert!(SampleCopier::new(16, 0).is_err());
        let copier = SampleCopier::new(16, 6).unwrap();
        assert_eq!(copier.samples_per_buffer(), 2);
    }

    fn stereo_source(samples: u64) -> MemorySource {
        let data = (0..samples * 4).map(|b| b as u8).collect::<Vec<_>>();
        let mut source = MemorySource::default();
        source.push_audio(pcm(2, 8_000, 16, WAVE_FORMAT_PCM), Payload::Bytes(data));
        source
    }

    #[test]
    fn copies_remainder_block_first() {
        let mut source = stereo_source(10);
        let mut copier = SampleCopier::new(16, 4).unwrap();
        let mut out = Vec::new();
        let copied = copier.copy(&mut source, 0, 10, &mut out, |_| {}).unwrap();
        assert_eq!(copied, 10);
        assert_eq!(out, (0..40).map(|b| b as u8).collect::<Vec<_>>());
        assert_eq!(source.requests, vec![(0, 2), (2, 4), (6, 4)]);
    }

    #[test]
    fn whole_buffers_only() {
        let mut source = stereo_source(8);
        let mut copier = SampleCopier::new(16, 4).unwrap();
        let mut out = Vec::new();
        assert_eq!(copier.copy(&mut source, 0, 8, &mut out, |_| {}).unwrap(), 8);
        assert_eq!(source.requests, vec![(0, 4), (4, 4)]);
    }

    #[test]
    fn short_reads_advance_the_cursor() {
        let mut source = stereo_source(10);
        source.max_per_read = Some(3);
        let mut copier = SampleCopier::new(16, 4).unwrap();
        let mut out = Vec::new();
        assert_eq!(copier.copy(&mut source, 0, 10, &mut out, |_| {}).unwrap(), 10);
        assert_eq!(out.len(), 40);
        assert_eq!(out[39], 39);
    }

    #[test]
    fn failed_read_stops_the_copy() {
        let mut source = stereo_source(10);
        source.fail_from = Some(6);
        let mut copier = SampleCopier::new(16, 4).unwrap();
        let mut out = Vec::new();
        assert_eq!(copier.copy(&mut source, 0, 10, &mut out, |_| {}).unwrap(), 6);
        assert_eq!(out.len(), 24);
    }

    #[test]
    fn declared_length_beyond_data() {
        let mut source = stereo_source(10);
        let mut copier = SampleCopier::new(16, 4).unwrap();
        let mut out = Vec::new();
        assert_eq!(copier.copy(&mut source, 0, 12, &mut out, |_| {}).unwrap(), 10);
    }

    #[test]
    fn progress_only_on_change() {
        let mut source = MemorySource::default();
        source.push_audio(pcm(1, 8_000, 8, WAVE_FORMAT_PCM), Payload::Virtual(1_000));
        let mut copier = SampleCopier::new(4, 1).unwrap();
        let mut reports = Vec::new();
        copier
            .copy(&mut source, 0, 1_000, &mut io::sink(), |p| reports.push(p))
            .unwrap();

        // 4 samples per request: 4, 8, ... 1000 covers every percentage once.
        let percents = reports.iter().map(|p| p.percent).collect::<Vec<_>>();
        assert_eq!(percents, (0..=100).collect::<Vec<_>>());
        assert_eq!(
            reports.last(),
            Some(&Progress {
                percent: 100,
                done: 1_000,
                total: 1_000
            })
        );
    }
}
