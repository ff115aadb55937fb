//! The demuxer side of extraction.
//!
//! [`AudioSource`] is everything the extraction pipeline needs from a
//! container: stream enumeration, the `WAVEFORMATEX` of a track and random
//! access sample reads. Streams are described with the rust-av
//! [`Stream`] type; `duration` is the sample count in `timebase` units.

use std::io;
use std::sync::Arc;

use av_data::{
    audiosample::{ChannelMap, Soniton},
    params::{AudioInfo, CodecParams, MediaKind},
    rational::Rational64,
};
use av_format::stream::Stream;
use tracing::debug;

use crate::parser::Format;
use crate::{find_codec_from_wav_twocc, PCM_FLOAT_FORMAT_ID, WAVE_FORMAT_PCM};

pub trait AudioSource {
    fn stream_count(&self) -> usize;

    fn stream_info(&self, index: usize) -> Option<&Stream>;

    /// The `WAVEFORMATEX` of an audio stream.
    fn read_format(&self, index: usize) -> Option<&Format>;

    /// Reads up to `count` samples starting at sample `start` into `buf`
    /// and returns how many were read. Reads past the end of the stream
    /// come back short.
    fn read_samples(
        &mut self,
        index: usize,
        start: u64,
        count: u64,
        buf: &mut [u8],
    ) -> io::Result<u64>;
}

pub fn is_audio(stream: &Stream) -> bool {
    matches!(stream.params.kind, Some(MediaKind::Audio(_)))
}

/// Index of the first audio stream holding integer PCM or IEEE float.
pub fn find_pcm_track<S: AudioSource + ?Sized>(source: &S) -> Option<usize> {
    (0..source.stream_count()).find(|&index| {
        let Some(stream) = source.stream_info(index) else {
            return false;
        };
        if !is_audio(stream) {
            return false;
        }
        match source.read_format(index) {
            Some(format)
                if matches!(
                    format.sample_format_tag(),
                    WAVE_FORMAT_PCM | PCM_FLOAT_FORMAT_ID
                ) =>
            {
                true
            }
            Some(format) => {
                debug!(
                    "skipping audio track {index}: {} ({:#06x})",
                    find_codec_from_wav_twocc(format.sample_format_tag()).unwrap_or("unknown"),
                    format.sample_format_tag()
                );
                false
            }
            None => false,
        }
    })
}

/// Length of a stream in seconds.
pub fn duration_secs(stream: &Stream) -> f64 {
    let samples = stream.duration.unwrap_or(0) as f64;
    samples * *stream.timebase.numer() as f64 / *stream.timebase.denom() as f64
}

fn soniton(format: &Format) -> Soniton {
    let bits = format.bits_per_sample as u8;
    match format.sample_format_tag() {
        PCM_FLOAT_FORMAT_ID => Soniton::new(bits, false, false, false, true, false),
        WAVE_FORMAT_PCM if bits == 8 => Soniton::new(8, false, false, false, false, false),
        _ => Soniton::new(bits, false, false, false, false, true),
    }
}

pub(crate) fn audio_stream(
    index: usize,
    format: &Format,
    timebase: Rational64,
    sample_count: u64,
) -> Stream {
    let audio_info = AudioInfo {
        rate: format.samples_per_sec as usize,
        map: Some(ChannelMap::default_map(format.channels as usize)),
        format: Some(Arc::new(soniton(format))),
    };
    let codec = find_codec_from_wav_twocc(format.sample_format_tag()).unwrap_or("unknown");
    Stream {
        id: index as _,
        index: index as _,
        start: None,
        duration: Some(sample_count),
        timebase,
        params: CodecParams {
            extradata: format.edata.clone(),
            bit_rate: (u64::from(format.avg_bytes_per_sec) * 8) as _,
            delay: 0,
            convergence_window: 0,
            codec_id: Some(codec.to_owned()),
            kind: Some(MediaKind::Audio(audio_info)),
        },
        user_private: None,
    }
}

/// A stream this crate does not decode, tagged with its container codec id.
pub(crate) fn opaque_stream(index: usize, codec_id: String, timebase: Rational64, length: u64) -> Stream {
    Stream {
        id: index as _,
        index: index as _,
        start: None,
        duration: Some(length),
        timebase,
        params: CodecParams {
            extradata: None,
            bit_rate: 0,
            delay: 0,
            convergence_window: 0,
            codec_id: Some(codec_id),
            kind: None,
        },
        user_private: None,
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory [`AudioSource`] used by the pipeline tests.

    use super::*;

    pub(crate) enum Payload {
        Bytes(Vec<u8>),
        /// `n` samples that are never materialized; the buffer is left as is.
        Virtual(u64),
    }

    pub(crate) struct Track {
        pub format: Format,
        pub payload: Payload,
    }

    #[derive(Default)]
    pub(crate) struct MemorySource {
        streams: Vec<Stream>,
        tracks: Vec<Option<Track>>,
        /// Caps every read, to exercise short reads.
        pub max_per_read: Option<u64>,
        /// Reads starting at or past this sample fail.
        pub fail_from: Option<u64>,
        pub requests: Vec<(u64, u64)>,
    }

    pub(crate) fn pcm(channels: u16, rate: u32, bits: u16, tag: u16) -> Format {
        let block_align = channels * bits / 8;
        Format {
            format_tag: tag,
            channels,
            samples_per_sec: rate,
            avg_bytes_per_sec: u32::from(block_align) * rate,
            block_align,
            bits_per_sample: bits,
            edata: None,
        }
    }

    impl MemorySource {
        pub(crate) fn push_video(&mut self) {
            let index = self.streams.len();
            self.streams.push(opaque_stream(
                index,
                "vids".to_owned(),
                Rational64::new(1, 25),
                250,
            ));
            self.tracks.push(None);
        }

        pub(crate) fn push_audio(&mut self, format: Format, payload: Payload) {
            let index = self.streams.len();
            let samples = match &payload {
                Payload::Bytes(data) => data.len() as u64 / u64::from(format.block_align),
                Payload::Virtual(samples) => *samples,
            };
            let timebase = Rational64::new(1, i64::from(format.samples_per_sec));
            self.streams.push(audio_stream(index, &format, timebase, samples));
            self.tracks.push(Some(Track { format, payload }));
        }
    }

    impl AudioSource for MemorySource {
        fn stream_count(&self) -> usize {
            self.streams.len()
        }

        fn stream_info(&self, index: usize) -> Option<&Stream> {
            self.streams.get(index)
        }

        fn read_format(&self, index: usize) -> Option<&Format> {
            self.tracks.get(index)?.as_ref().map(|track| &track.format)
        }

        fn read_samples(
            &mut self,
            index: usize,
            start: u64,
            count: u64,
            buf: &mut [u8],
        ) -> io::Result<u64> {
            self.requests.push((start, count));
            if self.fail_from.is_some_and(|from| start >= from) {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "broken chunk"));
            }
            let track = self.tracks[index].as_ref().expect("audio track");
            let block_align = u64::from(track.format.block_align);
            let total = match &track.payload {
                Payload::Bytes(data) => data.len() as u64 / block_align,
                Payload::Virtual(samples) => *samples,
            };
            let count = count
                .min(total.saturating_sub(start))
                .min(buf.len() as u64 / block_align)
                .min(self.max_per_read.unwrap_or(u64::MAX));
            if let Payload::Bytes(data) = &track.payload {
                let from = (start * block_align) as usize;
                let len = (count * block_align) as usize;
                buf[..len].copy_from_slice(&data[from..from + len]);
            }
            Ok(count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::{pcm, MemorySource, Payload};
    use super::*;

    #[test]
    fn lowest_pcm_track_wins() {
        let mut source = MemorySource::default();
        source.push_video();
        source.push_audio(pcm(2, 44_100, 16, 0x0055), Payload::Virtual(10));
        source.push_audio(pcm(2, 44_100, 16, PCM_FLOAT_FORMAT_ID), Payload::Virtual(10));
        source.push_audio(pcm(2, 44_100, 16, WAVE_FORMAT_PCM), Payload::Virtual(10));
        assert_eq!(find_pcm_track(&source), Some(2));
    }

    #[test]
    fn no_pcm_track() {
        let mut source = MemorySource::default();
        source.push_video();
        source.push_audio(pcm(2, 44_100, 16, 0x0002), Payload::Virtual(10));
        assert_eq!(find_pcm_track(&source), None);
        assert!(!is_audio(source.stream_info(0).unwrap()));
        assert!(is_audio(source.stream_info(1).unwrap()));
    }

    #[test]
    fn stream_duration() {
        let mut source = MemorySource::default();
        source.push_audio(pcm(2, 48_000, 16, WAVE_FORMAT_PCM), Payload::Virtual(72_000));
        let stream = source.stream_info(0).unwrap();
        assert_eq!(stream.duration, Some(72_000));
        assert!((duration_secs(stream) - 1.5).abs() < 1e-9);
        assert_eq!(stream.params.codec_id.as_deref(), Some("pcm"));
    }
}
