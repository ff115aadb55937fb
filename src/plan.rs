//! Size arithmetic for the RIFF and `data` chunk length fields.
//!
//! Both length fields are 32 bits wide. A payload that does not fit still
//! gets written, but the declared sizes are clamped to the largest whole
//! number of sample frames that does fit.

use tracing::warn;

use crate::format::FormatDescriptor;

/// Largest value a RIFF chunk length can hold.
pub const MAX_CHUNK_SIZE: u64 = 0xFFFF_FFFF;

/// Shape of the header in front of the samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    /// No header at all, samples only.
    Raw,
    /// 16-byte `fmt ` chunk (`WAVEFORMAT` + `wBitsPerSample`).
    Canonical,
    /// 40-byte `fmt ` chunk (`WAVEFORMATEXTENSIBLE`).
    Extensible,
}

impl HeaderLayout {
    /// WAV layout matching the descriptor: extensible when it carries a
    /// channel mask.
    pub fn for_format(format: &FormatDescriptor) -> Self {
        if format.channel_mask().is_some() {
            HeaderLayout::Extensible
        } else {
            HeaderLayout::Canonical
        }
    }

    /// Length of the `fmt ` chunk payload.
    pub const fn fmt_chunk_size(self) -> u32 {
        match self {
            HeaderLayout::Raw => 0,
            HeaderLayout::Canonical => 16,
            HeaderLayout::Extensible => 40,
        }
    }

    /// Header bytes counted by the RIFF length field: the `WAVE` tag, the
    /// whole `fmt ` chunk and the `data` chunk header.
    pub const fn header_size(self) -> u32 {
        match self {
            HeaderLayout::Raw => 0,
            _ => 4 + 8 + self.fmt_chunk_size() + 8,
        }
    }

    /// Bytes written before the first sample.
    pub const fn encoded_len(self) -> usize {
        match self {
            HeaderLayout::Raw => 0,
            _ => 8 + self.header_size() as usize,
        }
    }
}

/// What an oversized payload does to the actual output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OversizePolicy {
    /// The clamped size is authoritative: fewer bytes get produced.
    ClampPayload,
    /// Only the header is clamped; every payload byte is still written.
    ClampHeaderOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    pub total_payload_bytes: u64,
    pub header_size: u32,
    pub declared_riff_size: u32,
    pub declared_data_size: u32,
    pub truncated: bool,
}

impl TransferPlan {
    pub fn new(payload: u64, block_align: u32, layout: HeaderLayout, policy: OversizePolicy) -> Self {
        if layout == HeaderLayout::Raw {
            return Self {
                total_payload_bytes: payload,
                header_size: 0,
                declared_riff_size: 0,
                declared_data_size: 0,
                truncated: false,
            };
        }

        let header_size = layout.header_size();
        let limit = MAX_CHUNK_SIZE - u64::from(header_size);

        if payload <= limit {
            return Self {
                total_payload_bytes: payload,
                header_size,
                declared_riff_size: (payload + u64::from(header_size)) as u32,
                declared_data_size: payload as u32,
                truncated: false,
            };
        }

        let block_align = u64::from(block_align.max(1));
        let clamped = limit / block_align * block_align;

        warn!(
            "WAV file will be larger than 4 GB ({payload} bytes of samples); \
             size fields are clamped to {clamped} bytes and the file is non-standard"
        );

        Self {
            total_payload_bytes: match policy {
                OversizePolicy::ClampPayload => clamped,
                OversizePolicy::ClampHeaderOnly => payload,
            },
            header_size,
            declared_riff_size: (clamped + u64::from(header_size)) as u32,
            declared_data_size: clamped as u32,
            truncated: true,
        }
    }

    /// Total bytes the sink receives.
    pub fn file_size(&self) -> u64 {
        let header = if self.header_size == 0 {
            0
        } else {
            u64::from(self.header_size) + 8
        };
        header + self.total_payload_bytes
    }
}
