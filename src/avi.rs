//! AVI 1.0 demuxer.
//!
//! Only what sample extraction needs: the `hdrl` stream headers and
//! formats, plus an index of every data chunk in `movi` so samples can be
//! read at any position. OpenDML `AVIX` continuation RIFFs are ignored.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use av_data::rational::Rational64;
use av_format::{common::GlobalInfo, stream::Stream};
use nom::{
    bytes::complete::take,
    combinator::map,
    number::complete::{le_u16, le_u32},
    sequence::tuple,
    IResult,
};
use tracing::debug;

use crate::error::{Error, Result};
use crate::parser::{self, chunk, custom_error, format_body, padded_size, read_chunks_type, riff_header, Format};
use crate::source::{audio_stream, opaque_stream, AudioSource};

/// `AVISTREAMHEADER`, without the frame rectangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    pub fcc_type: [u8; 4],
    pub handler: [u8; 4],
    pub flags: u32,
    pub priority: u16,
    pub language: u16,
    pub initial_frames: u32,
    pub scale: u32,
    pub rate: u32,
    pub start: u32,
    pub length: u32,
    pub suggested_buffer_size: u32,
    pub quality: u32,
    pub sample_size: u32,
}

impl StreamHeader {
    pub fn is_audio(&self) -> bool {
        &self.fcc_type == b"auds"
    }
}

fn fourcc(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

fn stream_header(input: &[u8]) -> IResult<&[u8], StreamHeader, parser::Error> {
    map(
        tuple((
            take(4usize),
            take(4usize),
            le_u32,
            le_u16,
            le_u16,
            le_u32,
            le_u32,
            le_u32,
            le_u32,
            le_u32,
            le_u32,
            le_u32,
            le_u32,
        )),
        |t| StreamHeader {
            fcc_type: fourcc(t.0),
            handler: fourcc(t.1),
            flags: t.2,
            priority: t.3,
            language: t.4,
            initial_frames: t.5,
            scale: t.6,
            rate: t.7,
            start: t.8,
            length: t.9,
            suggested_buffer_size: t.10,
            quality: t.11,
            sample_size: t.12,
        },
    )(input)
}

type ParseResult<'a, T> = std::result::Result<T, nom::Err<parser::Error<'a>>>;

// One `strl` list: `strh`, `strf` and anything else we skip.
fn stream_list(mut input: &[u8]) -> ParseResult<'_, (StreamHeader, Option<Format>)> {
    let mut header = None;
    let mut strf = None;
    while input.len() >= 8 {
        let (rest, (id, body)) = chunk(input)?;
        match id {
            b"strh" => header = Some(stream_header(body)?.1),
            b"strf" => strf = Some(body),
            _ => {}
        }
        input = rest;
    }
    let header = header.ok_or(nom::Err::Error(custom_error(input, 200)))?;
    let format = if header.is_audio() {
        strf.and_then(|body| format_body(body.len())(body).ok().map(|(_, format)| format))
    } else {
        None
    };
    Ok((header, format))
}

fn header_list(mut input: &[u8]) -> ParseResult<'_, Vec<(StreamHeader, Option<Format>)>> {
    let mut streams = Vec::new();
    while input.len() >= 8 {
        let (rest, (id, body)) = chunk(input)?;
        if id == b"LIST" && body.starts_with(b"strl") {
            streams.push(stream_list(&body[4..])?);
        }
        input = rest;
    }
    Ok(streams)
}

/// Stream number encoded in the first two characters of a `movi` chunk id.
fn stream_number(id: &[u8]) -> Option<usize> {
    match id {
        [a @ b'0'..=b'9', b @ b'0'..=b'9', ..] => Some(usize::from(a - b'0') * 10 + usize::from(b - b'0')),
        _ => None,
    }
}

fn invalid_data(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_owned())
}

fn read_chunk_header<R: Read>(reader: &mut R) -> io::Result<([u8; 4], u32)> {
    let mut buf = [0; 8];
    reader.read_exact(&mut buf)?;
    let (_, (id, size)) = read_chunks_type(&buf).map_err(|_| invalid_data("bad chunk header"))?;
    Ok((fourcc(id), size))
}

#[derive(Debug, Clone, Copy)]
struct DataChunk {
    // file offset of the chunk body
    offset: u64,
    // byte position of the body within the stream
    start: u64,
    len: u64,
}

#[derive(Debug, Clone)]
struct Track {
    header: StreamHeader,
    format: Option<Format>,
    chunks: Vec<DataChunk>,
    bytes: u64,
}

impl Track {
    fn push(&mut self, offset: u64, len: u64) {
        self.chunks.push(DataChunk {
            offset,
            start: self.bytes,
            len,
        });
        self.bytes += len;
    }

    fn timebase(&self) -> Rational64 {
        match (&self.header, &self.format) {
            (header, _) if header.scale > 0 && header.rate > 0 => {
                Rational64::new(i64::from(header.scale), i64::from(header.rate))
            }
            (_, Some(format)) if format.samples_per_sec > 0 => {
                Rational64::new(1, i64::from(format.samples_per_sec))
            }
            _ => Rational64::new(1, 1),
        }
    }

    // dwLength counts units of dwSampleSize bytes; convert to frames.
    fn sample_count(&self) -> u64 {
        let length = u64::from(self.header.length);
        match &self.format {
            Some(format) if format.block_align > 0 => {
                let block_align = u64::from(format.block_align);
                match u64::from(self.header.sample_size) {
                    0 => length,
                    size if size == block_align => length,
                    size => length * size / block_align,
                }
            }
            _ => length,
        }
    }

    fn stream(&self, index: usize) -> Stream {
        match &self.format {
            Some(format) => audio_stream(index, format, self.timebase(), self.sample_count()),
            None => opaque_stream(
                index,
                String::from_utf8_lossy(&self.header.fcc_type).into_owned(),
                self.timebase(),
                u64::from(self.header.length),
            ),
        }
    }
}

pub struct AviReader<R> {
    reader: R,
    info: GlobalInfo,
    tracks: Vec<Track>,
}

impl AviReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        File::open(path)
            .map(BufReader::new)
            .and_then(Self::new)
            .map_err(|source| Error::SourceOpenFailed {
                path: path.to_owned(),
                source,
            })
    }
}

impl<R: Read + Seek> AviReader<R> {
    pub fn new(mut reader: R) -> io::Result<Self> {
        let mut head = [0; 12];
        reader.read_exact(&mut head)?;
        let (_, riff_size) =
            riff_header(b"AVI ")(&head[..]).map_err(|_| invalid_data("not an AVI file"))?;

        let file_end = reader.seek(SeekFrom::End(0))?;
        let end = (8 + u64::from(riff_size)).min(file_end);

        let mut tracks = None;
        let mut movi = None;
        let mut pos = 12;
        while pos + 8 <= end {
            reader.seek(SeekFrom::Start(pos))?;
            let (id, size) = read_chunk_header(&mut reader)?;
            let body = pos + 8;
            if &id == b"LIST" && size >= 4 {
                let mut list_type = [0; 4];
                reader.read_exact(&mut list_type)?;
                match &list_type {
                    b"hdrl" if tracks.is_none() => {
                        let mut buf = vec![0; size as usize - 4];
                        reader.read_exact(&mut buf)?;
                        let streams =
                            header_list(&buf).map_err(|_| invalid_data("malformed hdrl list"))?;
                        tracks = Some(
                            streams
                                .into_iter()
                                .map(|(header, format)| Track {
                                    header,
                                    format,
                                    chunks: Vec::new(),
                                    bytes: 0,
                                })
                                .collect::<Vec<_>>(),
                        );
                    }
                    b"movi" if movi.is_none() => {
                        movi = Some((body + 4, (body + u64::from(size)).min(end)));
                    }
                    _ => {}
                }
            }
            pos = body + padded_size(size);
        }

        let mut tracks = tracks.ok_or_else(|| invalid_data("no hdrl list"))?;
        let (movi_start, movi_end) = movi.ok_or_else(|| invalid_data("no movi list"))?;
        index_movi(&mut reader, movi_start, movi_end, &mut tracks)?;

        let mut info = GlobalInfo {
            duration: None,
            timebase: None,
            streams: Vec::new(),
        };
        for (index, track) in tracks.iter().enumerate() {
            debug!(
                "stream {index}: {} {} chunks, {} bytes",
                String::from_utf8_lossy(&track.header.fcc_type),
                track.chunks.len(),
                track.bytes
            );
            info.add_stream(track.stream(index));
        }

        Ok(Self {
            reader,
            info,
            tracks,
        })
    }

    pub fn info(&self) -> &GlobalInfo {
        &self.info
    }

    pub fn stream_header(&self, index: usize) -> Option<&StreamHeader> {
        self.tracks.get(index).map(|track| &track.header)
    }
}

// Records the position of every audio chunk in `movi`, descending into
// `rec ` lists.
fn index_movi<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    tracks: &mut [Track],
) -> io::Result<()> {
    let mut pos = start;
    while pos + 8 <= end {
        reader.seek(SeekFrom::Start(pos))?;
        let (id, size) = read_chunk_header(reader)?;
        if &id == b"LIST" {
            pos += 12;
            continue;
        }
        let body = pos + 8;
        if let Some(track) = stream_number(&id).and_then(|n| tracks.get_mut(n)) {
            if track.format.is_some() {
                track.push(body, u64::from(size).min(end - body));
            }
        }
        pos = body + padded_size(size);
    }
    Ok(())
}

impl<R: Read + Seek> AudioSource for AviReader<R> {
    fn stream_count(&self) -> usize {
        self.info.streams.len()
    }

    fn stream_info(&self, index: usize) -> Option<&Stream> {
        self.info.streams.get(index)
    }

    fn read_format(&self, index: usize) -> Option<&Format> {
        self.tracks.get(index)?.format.as_ref()
    }

    fn read_samples(
        &mut self,
        index: usize,
        start: u64,
        count: u64,
        buf: &mut [u8],
    ) -> io::Result<u64> {
        let track = self
            .tracks
            .get(index)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no such stream"))?;
        let block_align = match &track.format {
            Some(format) if format.block_align > 0 => u64::from(format.block_align),
            _ => return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a PCM stream")),
        };

        let wanted = count.min(buf.len() as u64 / block_align) * block_align;
        let mut pos = start.saturating_mul(block_align);
        let end = pos.saturating_add(wanted).min(track.bytes);
        let mut next = track
            .chunks
            .partition_point(|chunk| chunk.start + chunk.len <= pos);
        let mut filled = 0;

        while pos < end {
            let Some(chunk) = track.chunks.get(next) else {
                break;
            };
            let within = pos - chunk.start;
            let len = (chunk.len - within).min(end - pos) as usize;
            let read = self
                .reader
                .seek(SeekFrom::Start(chunk.offset + within))
                .and_then(|_| self.reader.read_exact(&mut buf[filled..filled + len]));
            if let Err(err) = read {
                if filled == 0 {
                    return Err(err);
                }
                break;
            }
            filled += len;
            pos += len as u64;
            next += 1;
        }

        Ok(filled as u64 / block_align)
    }
}
