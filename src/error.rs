//! Error types shared by both pipelines.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A format field is out of range or unsupported.
    #[error("invalid {field}: {reason}")]
    InvalidFormat { field: &'static str, reason: String },

    /// Two requested options cannot be combined.
    #[error("conflicting options: {0}")]
    ConflictingOptions(String),

    /// The channel mask does not have exactly one bit per channel.
    #[error("invalid channel mask {mask:#x}: {} speaker positions for {channels} channels", mask.count_ones())]
    InvalidChannelMask { mask: u32, channels: u32 },

    #[error("could not open source \"{}\"", path.display())]
    SourceOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not find a PCM audio track")]
    NoCompatibleAudioTrack,

    #[error("failed to create/open {target}")]
    SinkOpenFailed {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Fewer bytes or samples reached the sink than were planned.
    #[error("writing failed: {written} of {expected} {unit} written")]
    WriteIncomplete {
        expected: u64,
        written: u64,
        unit: &'static str,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid_format(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidFormat {
            field,
            reason: reason.into(),
        }
    }
}
