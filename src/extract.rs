//! PCM track extraction.
//!
//! [`Extraction::prepare`] picks the first PCM or float audio track of a
//! source and validates everything before a single byte is written;
//! [`Extraction::run`] then streams it to a sink as WAV or raw samples.

use std::io::Write;

use tracing::info;

use crate::error::{Error, Result};
use crate::format::FormatDescriptor;
use crate::muxer::WavMuxer;
use crate::plan::{HeaderLayout, OversizePolicy, TransferPlan};
use crate::source::{duration_secs, find_pcm_track, AudioSource};
use crate::transfer::{Progress, SampleCopier, EXTRACT_BUFFER_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Canonical WAV header.
    Wav,
    /// `WAVEFORMATEXTENSIBLE` header with an explicit or default channel
    /// mask.
    Extensible(Option<u32>),
    /// Samples only.
    Raw,
}

#[derive(Debug)]
pub struct Extraction {
    stream: usize,
    format: FormatDescriptor,
    layout: HeaderLayout,
    sample_count: u64,
    duration: f64,
    plan: TransferPlan,
    copier: SampleCopier,
}

impl Extraction {
    pub fn prepare<S: AudioSource + ?Sized>(source: &S, output: OutputFormat) -> Result<Self> {
        let stream = find_pcm_track(source).ok_or(Error::NoCompatibleAudioTrack)?;
        let (info, source_format) = source
            .stream_info(stream)
            .zip(source.read_format(stream))
            .ok_or(Error::NoCompatibleAudioTrack)?;
        info!("Found an audio track (ID {stream})");

        let mut format = FormatDescriptor::from_source(source_format)?;
        let sample_count = info.duration.unwrap_or(0);
        let duration = duration_secs(info);

        info!(
            "streamID {stream}: {} channels, {} Hz, {} bits, {duration:.3} seconds",
            format.channel_count(),
            format.sample_rate(),
            format.bits_per_sample(),
        );
        if format.is_float() {
            info!("Audio track contains floating-point samples.");
        }

        let copier = SampleCopier::new(EXTRACT_BUFFER_SIZE, format.block_align())?;

        let layout = match output {
            OutputFormat::Wav => HeaderLayout::Canonical,
            OutputFormat::Extensible(mask) => {
                format = format.with_channel_mask(mask)?;
                HeaderLayout::Extensible
            }
            OutputFormat::Raw => HeaderLayout::Raw,
        };

        let payload = sample_count.saturating_mul(u64::from(format.block_align()));
        let plan = TransferPlan::new(
            payload,
            format.block_align(),
            layout,
            OversizePolicy::ClampHeaderOnly,
        );

        Ok(Self {
            stream,
            format,
            layout,
            sample_count,
            duration,
            plan,
            copier,
        })
    }

    pub fn stream_index(&self) -> usize {
        self.stream
    }

    pub fn format(&self) -> &FormatDescriptor {
        &self.format
    }

    pub fn layout(&self) -> HeaderLayout {
        self.layout
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Track length in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn plan(&self) -> &TransferPlan {
        &self.plan
    }

    /// Writes the header, unless raw, and every sample of the track.
    /// Returns the number of sample bytes written.
    pub fn run<S, W, F>(&mut self, source: &mut S, out: &mut W, on_progress: F) -> Result<u64>
    where
        S: AudioSource + ?Sized,
        W: Write + ?Sized,
        F: FnMut(Progress),
    {
        if self.layout != HeaderLayout::Raw {
            WavMuxer::new(self.format, self.plan).write_header(out)?;
        }

        let copied = self
            .copier
            .copy(source, self.stream, self.sample_count, out, on_progress)?;
        out.flush()?;

        if copied != self.sample_count {
            return Err(Error::WriteIncomplete {
                expected: self.sample_count,
                written: copied,
                unit: "samples",
            });
        }
        Ok(copied * u64::from(self.format.block_align()))
    }
}
