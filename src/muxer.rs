use std::io::Write;

use crate::format::FormatDescriptor;
use crate::plan::{HeaderLayout, TransferPlan};

/// `KSDATAFORMAT_SUBTYPE_*` GUID bytes following the leading format tag.
const SUBFORMAT_GUID_TAIL: [u8; 14] = [
    0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

// cbSize of WAVEFORMATEXTENSIBLE
const EXTENSIBLE_CB_SIZE: u16 = 22;

/// Writes the RIFF, `fmt ` and `data` chunk headers for a planned transfer.
///
/// All sizes are known up front, so the header is written once and never
/// patched, which keeps non-seekable sinks such as pipes usable.
#[derive(Debug, Clone, PartialEq)]
pub struct WavMuxer {
    format: FormatDescriptor,
    plan: TransferPlan,
}

impl WavMuxer {
    pub fn new(format: FormatDescriptor, plan: TransferPlan) -> Self {
        Self { format, plan }
    }

    pub fn layout(&self) -> HeaderLayout {
        HeaderLayout::for_format(&self.format)
    }

    /// The header bytes, little-endian field by field.
    pub fn header(&self) -> Vec<u8> {
        let layout = self.layout();
        let format = &self.format;

        let mut buf = Vec::with_capacity(layout.encoded_len());
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&self.plan.declared_riff_size.to_le_bytes());
        buf.extend_from_slice(b"WAVEfmt ");
        buf.extend_from_slice(&layout.fmt_chunk_size().to_le_bytes());
        buf.extend_from_slice(&format.format_tag().to_le_bytes());
        buf.extend_from_slice(&(format.channel_count() as u16).to_le_bytes());
        buf.extend_from_slice(&format.sample_rate().to_le_bytes());
        buf.extend_from_slice(&format.byte_rate().to_le_bytes());
        buf.extend_from_slice(&(format.block_align() as u16).to_le_bytes());
        buf.extend_from_slice(&(format.bits_per_sample() as u16).to_le_bytes());
        // The canonical form never carries cbSize.
        if let Some(mask) = format.channel_mask() {
            buf.extend_from_slice(&EXTENSIBLE_CB_SIZE.to_le_bytes());
            buf.extend_from_slice(&(format.bits_per_sample() as u16).to_le_bytes());
            buf.extend_from_slice(&mask.to_le_bytes());
            buf.extend_from_slice(&format.sample_format_tag().to_le_bytes());
            buf.extend_from_slice(&SUBFORMAT_GUID_TAIL);
        }
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&self.plan.declared_data_size.to_le_bytes());

        debug_assert_eq!(buf.len(), layout.encoded_len());
        buf
    }

    pub fn write_header<W: Write + ?Sized>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_all(&self.header())
    }
}
