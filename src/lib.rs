//! Silent WAV synthesis and PCM track extraction
//!
//! Two pipelines share one WAV writing core:
//!
//! - [`silence`] synthesizes a zero-filled PCM stream of a requested
//!   duration and format.
//! - [`extract`] pulls the first integer-PCM or IEEE-float audio track out
//!   of an AVI container ([`avi::AviReader`]) and re-wraps it as WAV, or
//!   emits the bare samples.
//!
//! To better understand the WAV format, read the
//! <a href="http://www-mmsp.ece.mcgill.ca/Documents/AudioFormats/WAVE/WAVE.html" target="_blank">WAV Specification</a>.

pub mod avi;
pub mod error;
pub mod extract;
pub mod format;
pub mod muxer;
pub mod parser;
pub mod plan;
pub mod silence;
pub mod sink;
pub mod source;
pub mod transfer;

pub use error::{Error, Result};

pub const WAVE_FORMAT_PCM: u16 = 0x0001;
// A special case for floating-point audio
pub const PCM_FLOAT_FORMAT_ID: u16 = 0x0003;
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

static WAV_CODEC_REGISTER: &[(u16, &str)] = &[
    (0x0000, "unknown"),
    (WAVE_FORMAT_PCM, "pcm"),
    (0x0002, "ms-adpcm"),
    (PCM_FLOAT_FORMAT_ID, "pcm"),
    (0x0011, "ima-adpcm-ms"),
    (0x0050, "mp2"),
    (0x0055, "mp3"),
    (0x0061, "adpcm-dk4"),
    (0x0062, "adpcm-dk3"),
    (0x00ff, "aac"),
    (0x0401, "imc"),
    (0x0402, "iac"),
    (0x0500, "on2avc-500"),
    (0x0501, "on2avc-501"),
    (0x2000, "ac3"),
    (0x2001, "dts"),
    (WAVE_FORMAT_EXTENSIBLE, "extensible"),
];

pub fn find_codec_from_wav_twocc(tcc: u16) -> Option<&'static str> {
    WAV_CODEC_REGISTER
        .iter()
        .find(|(twocc, _)| *twocc == tcc)
        .map(|(_, name)| *name)
}
