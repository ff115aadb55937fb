//! Silent WAV synthesis.

use std::io::Write;

use tracing::info;

use crate::error::{Error, Result};
use crate::format::{FormatDescriptor, FormatRequest, RateLimit};
use crate::muxer::WavMuxer;
use crate::plan::{HeaderLayout, OversizePolicy, TransferPlan};
use crate::transfer::ZeroFill;

pub const DEFAULT_LENGTH: f64 = 1.0;
pub const DEFAULT_CHANNELS: u32 = 2;
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceConfig {
    /// Seconds of silence.
    pub length: f64,
    pub channels: u32,
    pub sample_rate: u32,
    /// `None` means 16 bits, or 32 for float samples.
    pub bits_per_sample: Option<u32>,
    pub float: bool,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
            channels: DEFAULT_CHANNELS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            bits_per_sample: None,
            float: false,
        }
    }
}

impl SilenceConfig {
    /// Validates the configuration and sizes the output.
    pub fn plan(&self) -> Result<Silence> {
        if !(self.length.is_finite() && self.length > 0.0) {
            return Err(Error::invalid_format(
                "length",
                format!("{} seconds is not a positive duration", self.length),
            ));
        }

        let format = FormatDescriptor::new(
            FormatRequest {
                channels: self.channels,
                sample_rate: self.sample_rate,
                bits_per_sample: self.bits_per_sample,
                float: self.float,
            },
            RateLimit::Synthesized,
        )?;

        let frames = (f64::from(format.sample_rate()) * self.length) as u64;
        let payload = frames.saturating_mul(u64::from(format.block_align()));
        let plan = TransferPlan::new(
            payload,
            format.block_align(),
            HeaderLayout::Canonical,
            OversizePolicy::ClampPayload,
        );

        Ok(Silence { format, plan })
    }
}

/// A validated silence job.
#[derive(Debug, Clone, PartialEq)]
pub struct Silence {
    format: FormatDescriptor,
    plan: TransferPlan,
}

impl Silence {
    pub fn format(&self) -> &FormatDescriptor {
        &self.format
    }

    pub fn plan(&self) -> &TransferPlan {
        &self.plan
    }

    /// Writes the header and the zero samples, returning the payload size.
    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> Result<u64> {
        info!(
            "{} channels, {} Hz, {} bits{}, {} bytes of silence",
            self.format.channel_count(),
            self.format.sample_rate(),
            self.format.bits_per_sample(),
            if self.format.is_float() { " float" } else { "" },
            self.plan.total_payload_bytes
        );

        WavMuxer::new(self.format, self.plan).write_header(out)?;
        let written = ZeroFill::default().write(out, self.plan.total_payload_bytes)?;
        out.flush()?;

        if written != self.plan.total_payload_bytes {
            return Err(Error::WriteIncomplete {
                expected: self.plan.total_payload_bytes,
                written,
                unit: "bytes",
            });
        }
        Ok(written)
    }
}
