use nom::{
    bytes::complete::{tag, take},
    combinator::{map, verify},
    number::complete::{le_u16, le_u32},
    sequence::{pair, tuple},
    Err, IResult, Offset,
};

use crate::WAVE_FORMAT_EXTENSIBLE;

const WAVEFORMAT: usize = 16;
const WAVEFORMATEX: usize = 18;
// wFormatTag, nChannels, nSamplesPerSec, nAvgBytesPerSec, nBlockAlign
const WAVEFORMAT_MIN: usize = 14;

#[derive(Debug, PartialEq)]
pub struct Error<'a> {
    pub input: &'a [u8],
    pub kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Nom(nom::error::ErrorKind),
    Custom(u8),
}

impl<'a> nom::error::ParseError<&'a [u8]> for Error<'a> {
    fn from_error_kind(input: &'a [u8], kind: nom::error::ErrorKind) -> Self {
        Error {
            input,
            kind: ErrorKind::Nom(kind),
        }
    }

    fn append(_input: &'a [u8], _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

pub(crate) fn custom_error(input: &[u8], code: u8) -> Error {
    Error {
        input,
        kind: ErrorKind::Custom(code),
    }
}

/// `RIFF` length followed by the expected form type (`WAVE`, `AVI `).
pub(crate) fn riff_header<'a>(
    form: &'static [u8],
) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], u32, Error<'a>> {
    move |input| map(tuple((tag(b"RIFF"), le_u32, tag(form))), |(_, size, _)| size)(input)
}

/// The `fmt ` chunk payload, `WAVEFORMATEX` and its extensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Format {
    pub format_tag: u16,
    pub channels: u16,
    pub samples_per_sec: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub edata: Option<Vec<u8>>,
}

impl Format {
    /// Tag of the sample encoding, resolved through the sub-format GUID
    /// of `WAVEFORMATEXTENSIBLE`.
    pub fn sample_format_tag(&self) -> u16 {
        match (self.format_tag, self.edata.as_deref()) {
            (WAVE_FORMAT_EXTENSIBLE, Some(edata)) if edata.len() >= 22 => {
                u16::from_le_bytes([edata[6], edata[7]])
            }
            (tag, _) => tag,
        }
    }

    pub fn channel_mask(&self) -> Option<u32> {
        match (self.format_tag, self.edata.as_deref()) {
            (WAVE_FORMAT_EXTENSIBLE, Some(edata)) if edata.len() >= 6 => {
                Some(u32::from_le_bytes([edata[2], edata[3], edata[4], edata[5]]))
            }
            _ => None,
        }
    }
}

fn extradata(chunk_size: usize) -> impl Fn(&[u8]) -> IResult<&[u8], Option<Vec<u8>>, Error> {
    move |input| {
        if chunk_size < WAVEFORMATEX {
            return Ok((input, None));
        }
        let (i, size) = le_u16::<_, Error>(input)?;
        if usize::from(size) > chunk_size - WAVEFORMATEX {
            return Err(Err::Error(custom_error(input, 100)));
        }
        map(take(size), |data: &[u8]| {
            (!data.is_empty()).then(|| data.to_owned())
        })(i)
    }
}

fn bits_per_sample(chunk_size: usize) -> impl Fn(&[u8]) -> IResult<&[u8], u16, Error> {
    move |input| {
        if chunk_size >= WAVEFORMAT {
            le_u16(input)
        } else {
            Ok((input, 8))
        }
    }
}

/// A `WAVEFORMATEX` occupying a chunk body of `chunk_size` bytes, as found
/// in a WAV `fmt ` chunk or an AVI `strf` chunk. Trailing bytes inside the
/// chunk are consumed.
pub(crate) fn format_body(chunk_size: usize) -> impl Fn(&[u8]) -> IResult<&[u8], Format, Error> {
    move |input| {
        if chunk_size < WAVEFORMAT_MIN {
            return Err(Err::Error(custom_error(input, 101)));
        }
        let (i, format) = map(
            tuple((
                le_u16,
                le_u16,
                le_u32,
                le_u32,
                le_u16,
                bits_per_sample(chunk_size),
                extradata(chunk_size),
            )),
            |t| Format {
                format_tag: t.0,
                channels: t.1,
                samples_per_sec: t.2,
                avg_bytes_per_sec: t.3,
                block_align: t.4,
                bits_per_sample: t.5,
                edata: t.6,
            },
        )(input)?;
        let (i, _) = take::<_, _, Error>(chunk_size.saturating_sub(input.offset(i)))(i)?;
        Ok((i, format))
    }
}

fn parse_fmt(input: &[u8]) -> IResult<&[u8], Format, Error> {
    verify(read_chunks_type, |t| t.0 == b"fmt ")(input).and_then(|(i, (_, chunk_size))| {
        let (i, format) = format_body(chunk_size as usize)(i)?;
        Ok((skip_pad(i, chunk_size), format))
    })
}

pub(crate) fn parse_header_fmt(input: &[u8]) -> IResult<&[u8], (u32, Format), Error> {
    pair(riff_header(b"WAVE"), parse_fmt)(input)
}

/// Everything in front of the first sample of a WAV file.
#[derive(Debug, Clone, PartialEq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub format: Format,
    pub data_size: u32,
}

/// Parses up to the start of the `data` chunk payload, skipping any chunk
/// in between.
pub fn parse_wav_header(input: &[u8]) -> IResult<&[u8], WavHeader, Error> {
    let (mut i, (riff_size, format)) = parse_header_fmt(input)?;
    loop {
        let (inp, (ctype, csize)) = read_chunks_type(i)?;
        if ctype == b"data" {
            return Ok((
                inp,
                WavHeader {
                    riff_size,
                    format,
                    data_size: csize,
                },
            ));
        }
        i = skip_chunk(inp, padded_size(csize) as usize)?.0;
    }
}

pub(crate) fn skip_chunk(input: &[u8], chunk_size: usize) -> IResult<&[u8], &[u8], Error> {
    take(chunk_size)(input)
}

pub(crate) fn get_data(input: &[u8], data_size: usize) -> IResult<&[u8], &[u8], Error> {
    take(data_size)(input)
}

pub(crate) fn read_chunks_type(input: &[u8]) -> IResult<&[u8], (&[u8], u32), Error> {
    pair(take(4usize), le_u32)(input)
}

/// A whole chunk: its id and body. The pad byte after an odd-sized body
/// is skipped when present.
pub(crate) fn chunk(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8]), Error> {
    let (i, (id, size)) = read_chunks_type(input)?;
    let (i, body) = get_data(i, size as usize)?;
    Ok((skip_pad(i, size), (id, body)))
}

/// Chunk bodies are word aligned.
pub(crate) const fn padded_size(size: u32) -> u64 {
    size as u64 + (size & 1) as u64
}

fn skip_pad(input: &[u8], size: u32) -> &[u8] {
    if size % 2 == 1 && !input.is_empty() {
        &input[1..]
    } else {
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PCM_FLOAT_FORMAT_ID, WAVE_FORMAT_PCM};

    fn le16(v: u16) -> [u8; 2] {
        v.to_le_bytes()
    }

    fn le32(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    fn fmt_chunk(size: u32, tail: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&le32(size));
        buf.extend_from_slice(&le16(WAVE_FORMAT_PCM));
        buf.extend_from_slice(&le16(2));
        buf.extend_from_slice(&le32(44_100));
        buf.extend_from_slice(&le32(176_400));
        buf.extend_from_slice(&le16(4));
        buf.extend_from_slice(&le16(16));
        buf.extend_from_slice(tail);
        buf
    }

    fn wav(fmt: &[u8], extra: &[u8], data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&le32((4 + fmt.len() + extra.len() + 8 + data.len()) as u32));
        buf.extend_from_slice(b"WAVE");
        buf.extend_from_slice(fmt);
        buf.extend_from_slice(extra);
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&le32(data.len() as u32));
        buf.extend_from_slice(data);
        buf
    }

    #[test]
    fn canonical_fmt() {
        let file = wav(&fmt_chunk(16, &[]), &[], &[1, 2, 3, 4]);
        let (rest, header) = parse_wav_header(&file).unwrap();
        assert_eq!(rest, &[1, 2, 3, 4]);
        assert_eq!(header.riff_size as usize, file.len() - 8);
        assert_eq!(header.data_size, 4);
        assert_eq!(
            header.format,
            Format {
                format_tag: WAVE_FORMAT_PCM,
                channels: 2,
                samples_per_sec: 44_100,
                avg_bytes_per_sec: 176_400,
                block_align: 4,
                bits_per_sample: 16,
                edata: None,
            }
        );
    }

    #[test]
    fn empty_cb_size_and_foreign_chunks() {
        let mut list = Vec::new();
        list.extend_from_slice(b"LIST");
        list.extend_from_slice(&le32(5));
        list.extend_from_slice(b"INFOx\0");
        let file = wav(&fmt_chunk(18, &le16(0)), &list, &[0; 8]);
        let (rest, header) = parse_wav_header(&file).unwrap();
        assert_eq!(rest.len(), 8);
        assert_eq!(header.format.edata, None);
        assert_eq!(header.data_size, 8);
    }

    #[test]
    fn extensible_fmt() {
        let mut tail = Vec::new();
        tail.extend_from_slice(&le16(22));
        tail.extend_from_slice(&le16(32));
        tail.extend_from_slice(&le32(0x3F));
        tail.extend_from_slice(&le16(PCM_FLOAT_FORMAT_ID));
        tail.extend_from_slice(&[
            0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
        ]);
        let mut fmt = fmt_chunk(40, &tail);
        fmt[8..10].copy_from_slice(&le16(WAVE_FORMAT_EXTENSIBLE));

        let (_, header) = parse_wav_header(&wav(&fmt, &[], &[])).unwrap();
        assert_eq!(header.format.format_tag, WAVE_FORMAT_EXTENSIBLE);
        assert_eq!(header.format.sample_format_tag(), PCM_FLOAT_FORMAT_ID);
        assert_eq!(header.format.channel_mask(), Some(0x3F));
    }

    #[test]
    fn oversized_cb_size() {
        let file = wav(&fmt_chunk(18, &le16(4)), &[], &[]);
        assert!(parse_wav_header(&file).is_err());
    }

    #[test]
    fn rejects_other_forms() {
        let mut file = wav(&fmt_chunk(16, &[]), &[], &[]);
        file[8..12].copy_from_slice(b"AVI ");
        assert!(parse_wav_header(&file).is_err());
    }

    #[test]
    fn odd_chunks_are_padded() {
        let mut input = Vec::new();
        input.extend_from_slice(b"strn");
        input.extend_from_slice(&le32(3));
        input.extend_from_slice(b"ab\0\0");
        input.extend_from_slice(b"next");
        let (rest, (id, body)) = chunk(&input).unwrap();
        assert_eq!(id, b"strn");
        assert_eq!(body, b"ab\0");
        assert_eq!(rest, b"next");
        assert_eq!(padded_size(3), 4);
        assert_eq!(padded_size(4), 4);
    }
}
