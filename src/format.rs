//! PCM format description and validation.
//!
//! A [`FormatDescriptor`] is the single in-memory description of a PCM
//! stream. Both pipelines build one, either from user-requested values
//! ([`FormatDescriptor::new`]) or from the `WAVEFORMATEX` of a source
//! track ([`FormatDescriptor::from_source`]), and everything downstream
//! (size arithmetic, header bytes, transfer block size) derives from it.

use crate::error::{Error, Result};
use crate::parser::Format;
use crate::{PCM_FLOAT_FORMAT_ID, WAVE_FORMAT_EXTENSIBLE, WAVE_FORMAT_PCM};

pub const MAX_CHANNELS: u32 = 32;
pub const MAX_SYNTHESIZED_SAMPLE_RATE: u32 = 192_000;
pub const SUPPORTED_BITS_PER_SAMPLE: [u32; 4] = [8, 16, 24, 32];

/// Canonical speaker masks indexed by channel count.
///
/// | Mask | Ch. | Speakers                         |
/// |-----:|----:|----------------------------------|
/// |    4 |   1 | FC                               |
/// |    3 |   2 | FL FR                            |
/// |  259 |   3 | FL FR BC                         |
/// |   51 |   4 | FL FR BL BR                      |
/// |   55 |   5 | FL FR FC BL BR                   |
/// |   63 |   6 | FL FR FC LF BL BR                |
/// |  319 |   7 | FL FR FC LF BL BR BC             |
/// |  255 |   8 | FL FR FC LF BL BR FLC FRC        |
const DEFAULT_CHANNEL_MASKS: [u32; 9] = [0, 0x4, 0x3, 0x103, 0x33, 0x37, 0x3F, 0x13F, 0xFF];

/// Which sample rates a descriptor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimit {
    /// Synthesized output, capped at [`MAX_SYNTHESIZED_SAMPLE_RATE`].
    Synthesized,
    /// Rate taken from container metadata, trusted as is.
    Source,
}

/// Raw, unvalidated format values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatRequest {
    pub channels: u32,
    pub sample_rate: u32,
    /// `None` picks 32 for float samples and 16 otherwise.
    pub bits_per_sample: Option<u32>,
    pub float: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    channel_count: u32,
    sample_rate: u32,
    bits_per_sample: u32,
    is_float: bool,
    channel_mask: Option<u32>,
}

impl FormatDescriptor {
    /// Validates `request`, reporting the first offending field.
    pub fn new(request: FormatRequest, limit: RateLimit) -> Result<Self> {
        let FormatRequest {
            channels,
            sample_rate,
            bits_per_sample,
            float,
        } = request;

        if channels == 0 || channels > MAX_CHANNELS {
            return Err(Error::invalid_format(
                "channel count",
                format!("{channels} is outside 1..={MAX_CHANNELS}"),
            ));
        }

        if sample_rate == 0 {
            return Err(Error::invalid_format("sample rate", "must be at least 1 Hz"));
        }
        if limit == RateLimit::Synthesized && sample_rate > MAX_SYNTHESIZED_SAMPLE_RATE {
            return Err(Error::invalid_format(
                "sample rate",
                format!("{sample_rate} Hz exceeds {MAX_SYNTHESIZED_SAMPLE_RATE} Hz"),
            ));
        }

        if let Some(bits) = bits_per_sample {
            if !SUPPORTED_BITS_PER_SAMPLE.contains(&bits) {
                return Err(Error::invalid_format(
                    "bits per sample",
                    format!("{bits} is not one of 8, 16, 24 or 32"),
                ));
            }
        }

        let bits_per_sample = match (float, bits_per_sample) {
            (true, Some(bits)) if bits != 32 => {
                return Err(Error::ConflictingOptions(format!(
                    "floating-point samples are always 32 bits, {bits} bits requested"
                )))
            }
            (true, _) => 32,
            (false, bits) => bits.unwrap_or(16),
        };

        let format = Self {
            channel_count: channels,
            sample_rate,
            bits_per_sample,
            is_float: float,
            channel_mask: None,
        };

        if u32::try_from(format.byte_rate_wide()).is_err() {
            return Err(Error::invalid_format(
                "sample rate",
                format!("{sample_rate} Hz overflows the 32-bit byte rate field"),
            ));
        }

        Ok(format)
    }

    /// Builds a descriptor from a source track's `WAVEFORMATEX`.
    ///
    /// Only integer PCM and IEEE float are accepted, and the declared
    /// block alignment has to match the channel layout.
    pub fn from_source(format: &Format) -> Result<Self> {
        let float = match format.sample_format_tag() {
            WAVE_FORMAT_PCM => false,
            PCM_FLOAT_FORMAT_ID => true,
            tag => {
                return Err(Error::invalid_format(
                    "format tag",
                    format!("{tag:#06x} is not integer PCM or IEEE float"),
                ))
            }
        };

        let descriptor = Self::new(
            FormatRequest {
                channels: u32::from(format.channels),
                sample_rate: format.samples_per_sec,
                bits_per_sample: Some(u32::from(format.bits_per_sample)),
                float,
            },
            RateLimit::Source,
        )?;

        if u32::from(format.block_align) != descriptor.block_align() {
            return Err(Error::invalid_format(
                "block align",
                format!(
                    "source declares {} bytes, {} channels of {} bits need {}",
                    format.block_align,
                    descriptor.channel_count,
                    descriptor.bits_per_sample,
                    descriptor.block_align()
                ),
            ));
        }

        Ok(descriptor)
    }

    /// Requests an extensible header.
    ///
    /// An explicit mask must name exactly one speaker position per
    /// channel; without one the canonical default for the channel count
    /// is used.
    pub fn with_channel_mask(self, mask: Option<u32>) -> Result<Self> {
        let mask = match mask {
            Some(mask) if mask.count_ones() != self.channel_count => {
                return Err(Error::InvalidChannelMask {
                    mask,
                    channels: self.channel_count,
                })
            }
            Some(mask) => mask,
            None => default_channel_mask(self.channel_count),
        };

        Ok(Self {
            channel_mask: Some(mask),
            ..self
        })
    }

    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bits_per_sample(&self) -> u32 {
        self.bits_per_sample
    }

    pub fn is_float(&self) -> bool {
        self.is_float
    }

    pub fn channel_mask(&self) -> Option<u32> {
        self.channel_mask
    }

    /// Bytes in one frame holding a sample for every channel.
    pub fn block_align(&self) -> u32 {
        self.channel_count * self.bits_per_sample / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.block_align() * self.sample_rate
    }

    fn byte_rate_wide(&self) -> u64 {
        u64::from(self.block_align()) * u64::from(self.sample_rate)
    }

    /// Tag of the sample encoding itself: PCM or IEEE float.
    pub fn sample_format_tag(&self) -> u16 {
        if self.is_float {
            PCM_FLOAT_FORMAT_ID
        } else {
            WAVE_FORMAT_PCM
        }
    }

    /// Tag written to the `fmt ` chunk.
    pub fn format_tag(&self) -> u16 {
        if self.channel_mask.is_some() {
            WAVE_FORMAT_EXTENSIBLE
        } else {
            self.sample_format_tag()
        }
    }
}

pub fn default_channel_mask(channels: u32) -> u32 {
    match DEFAULT_CHANNEL_MASKS.get(channels as usize) {
        Some(&mask) => mask,
        None if channels >= 32 => u32::MAX,
        None => (1 << channels) - 1,
    }
}
