//! RIFF/WAVE header parsing (mono, 16-bit, PCM only)

use std::io::{self, Read, Seek, SeekFrom};
use thiserror::Error;

pub const FORMAT_PCM: u16 = 1;

/// Bytes of the `fmt ` payload we actually read.
const FMT_BODY_LEN: u32 = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub num_channels: u16,
    pub bits_per_sample: u16,
    /// Byte offset of the first PCM sample.
    pub data_offset: u32,
    /// Declared length of the PCM data in bytes.
    pub data_size: u32,
}

#[derive(Debug, Error)]
pub enum WavError {
    #[error("not a RIFF file")]
    NotRiff,
    #[error("RIFF form is not WAVE")]
    NotWave,
    #[error("`fmt ` chunk too short ({0} B)")]
    ShortFormatChunk(u32),
    #[error(
        "unsupported format: tag {format_tag}, {channels} ch, {bits_per_sample} bit (need mono 16-bit PCM)"
    )]
    UnsupportedFormat {
        format_tag: u16,
        channels: u16,
        bits_per_sample: u16,
    },
    #[error("missing `{0}` chunk")]
    MissingChunk(&'static str),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl WavError {
    /// Bad container magic, as opposed to a WAVE file we can't play.
    pub fn is_malformed_container(&self) -> bool {
        matches!(self, WavError::NotRiff | WavError::NotWave)
    }
}

/// Reads the header from the start of `src`.
///
/// Scanning stops at the first `data` chunk, so a `fmt ` chunk placed after
/// it is never seen and the file is rejected. On success the stream sits at
/// `data_offset`.
pub fn parse<R: Read + Seek>(src: &mut R) -> Result<WavInfo, WavError> {
    let mut info = WavInfo::default();
    src.seek(SeekFrom::Start(0))?;

    if read_tag(src)? != Some(*b"RIFF") {
        return Err(WavError::NotRiff);
    }
    read_u32(src)?; // file size, not checked
    if read_tag(src)? != Some(*b"WAVE") {
        return Err(WavError::NotWave);
    }

    let mut got_fmt = false;
    let mut got_data = false;

    while let Some(id) = read_tag(src)? {
        let Some(size) = read_array::<4, _>(src)?.map(u32::from_le_bytes) else {
            break;
        };

        match &id {
            b"fmt " => {
                if size < FMT_BODY_LEN {
                    return Err(WavError::ShortFormatChunk(size));
                }
                let format_tag = read_u16(src)?;
                info.num_channels = read_u16(src)?;
                info.sample_rate = read_u32(src)?;
                read_u32(src)?; // byte rate
                read_u16(src)?; // block align
                info.bits_per_sample = read_u16(src)?;

                if size > FMT_BODY_LEN {
                    skip(src, size - FMT_BODY_LEN)?;
                }

                if format_tag != FORMAT_PCM || info.bits_per_sample != 16 || info.num_channels != 1
                {
                    return Err(WavError::UnsupportedFormat {
                        format_tag,
                        channels: info.num_channels,
                        bits_per_sample: info.bits_per_sample,
                    });
                }
                got_fmt = true;
            }
            b"data" => {
                info.data_offset = position(src)?;
                info.data_size = size;
                got_data = true;
                break;
            }
            _ => skip(src, size)?,
        }

        // chunks are padded to even length
        if size & 1 == 1 {
            skip(src, 1)?;
        }
    }

    if !got_fmt {
        return Err(WavError::MissingChunk("fmt "));
    }
    if !got_data {
        return Err(WavError::MissingChunk("data"));
    }
    Ok(info)
}

/// `None` when the stream ends before `N` bytes.
fn read_array<const N: usize, R: Read>(src: &mut R) -> io::Result<Option<[u8; N]>> {
    let mut buf = [0u8; N];
    match src.read_exact(&mut buf) {
        Ok(()) => Ok(Some(buf)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

fn read_tag<R: Read>(src: &mut R) -> io::Result<Option<[u8; 4]>> {
    read_array::<4, _>(src)
}

// truncated fields read as zero and fail the format check
fn read_u16<R: Read>(src: &mut R) -> io::Result<u16> {
    Ok(read_array::<2, _>(src)?.map_or(0, u16::from_le_bytes))
}

fn read_u32<R: Read>(src: &mut R) -> io::Result<u32> {
    Ok(read_array::<4, _>(src)?.map_or(0, u32::from_le_bytes))
}

fn skip<S: Seek>(src: &mut S, bytes: u32) -> io::Result<()> {
    src.seek(SeekFrom::Current(i64::from(bytes)))?;
    Ok(())
}

fn position<S: Seek>(src: &mut S) -> io::Result<u32> {
    let pos = src.stream_position()?;
    u32::try_from(pos).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "offset past 4 GiB"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{chunk, pcm_to_wav, WavWriter};
    use std::io::Cursor;

    fn parse_bytes(bytes: Vec<u8>) -> Result<WavInfo, WavError> {
        parse(&mut Cursor::new(bytes))
    }

    #[test]
    fn canonical_header() {
        let samples = [0i16, 1, -1, i16::MAX];
        let info = parse_bytes(pcm_to_wav(&samples, 22_050)).unwrap();
        assert_eq!(
            info,
            WavInfo {
                sample_rate: 22_050,
                num_channels: 1,
                bits_per_sample: 16,
                data_offset: 44,
                data_size: 8,
            }
        );
    }

    #[test]
    fn stream_left_at_data_start() {
        let mut src = Cursor::new(pcm_to_wav(&[0x1234], 8_000));
        let info = parse(&mut src).unwrap();
        assert_eq!(src.position(), u64::from(info.data_offset));
    }

    #[test]
    fn extended_fmt_and_unknown_chunks_are_skipped() {
        let bytes = WavWriter::new(16_000)
            .fmt_extra(&[0xAA, 0xBB])
            .chunk(b"LIST", &[1, 2, 3]) // odd size, padded
            .data(&[5, 6])
            .build();
        let info = parse_bytes(bytes).unwrap();
        // 12 RIFF + (8 + 18) fmt + (8 + 3 + 1) LIST + 8 data header
        assert_eq!(info.data_offset, 58);
        assert_eq!(info.data_size, 2);
        assert_eq!(info.sample_rate, 16_000);
    }

    #[test]
    fn odd_sized_fmt_chunk_is_padded() {
        let bytes = WavWriter::new(8_000).fmt_extra(&[0]).data(&[7]).build();
        let info = parse_bytes(bytes).unwrap();
        assert_eq!(info.data_offset, 12 + 8 + 17 + 1 + 8);
    }

    #[test]
    fn form_magic_is_not_riff() {
        let mut bytes = pcm_to_wav(&[0; 4], 8_000);
        bytes[..4].copy_from_slice(b"FORM");
        let err = parse_bytes(bytes).unwrap_err();
        assert!(matches!(err, WavError::NotRiff));
        assert!(err.is_malformed_container());
    }

    #[test]
    fn empty_source_is_not_riff() {
        assert!(matches!(parse_bytes(Vec::new()), Err(WavError::NotRiff)));
    }

    #[test]
    fn riff_without_wave_form() {
        let mut bytes = pcm_to_wav(&[0; 4], 8_000);
        bytes[8..12].copy_from_slice(b"AVI ");
        let err = parse_bytes(bytes).unwrap_err();
        assert!(matches!(err, WavError::NotWave));
        assert!(err.is_malformed_container());
    }

    #[test]
    fn stereo_rejected_even_with_data() {
        let bytes = WavWriter::new(44_100).channels(2).data(&[0; 8]).build();
        let err = parse_bytes(bytes).unwrap_err();
        assert!(matches!(
            err,
            WavError::UnsupportedFormat { channels: 2, .. }
        ));
        assert!(!err.is_malformed_container());
    }

    #[test]
    fn non_pcm_and_8_bit_rejected() {
        let float = WavWriter::new(8_000).format_tag(3).data(&[0; 4]).build();
        assert!(matches!(
            parse_bytes(float),
            Err(WavError::UnsupportedFormat { format_tag: 3, .. })
        ));

        let eight_bit = WavWriter::new(8_000).bits(8).data(&[0; 4]).build();
        assert!(matches!(
            parse_bytes(eight_bit),
            Err(WavError::UnsupportedFormat { bits_per_sample: 8, .. })
        ));
    }

    #[test]
    fn data_before_fmt_fails() {
        let mut bytes = b"RIFF\0\0\0\0WAVE".to_vec();
        bytes.extend(chunk(b"data", &[0; 4]));
        bytes.extend(WavWriter::new(8_000).fmt_chunk());
        assert!(matches!(
            parse_bytes(bytes),
            Err(WavError::MissingChunk("fmt "))
        ));
    }

    #[test]
    fn missing_data_chunk() {
        let mut bytes = b"RIFF\0\0\0\0WAVE".to_vec();
        bytes.extend(WavWriter::new(8_000).fmt_chunk());
        assert!(matches!(
            parse_bytes(bytes),
            Err(WavError::MissingChunk("data"))
        ));
    }

    #[test]
    fn chunks_after_data_are_ignored() {
        let mut bytes = pcm_to_wav(&[1, 2], 8_000);
        // a stereo fmt after data would fail if it were scanned
        bytes.extend(WavWriter::new(8_000).channels(2).fmt_chunk());
        assert_eq!(parse_bytes(bytes).unwrap().data_size, 4);
    }

    #[test]
    fn short_fmt_chunk() {
        let mut bytes = b"RIFF\0\0\0\0WAVE".to_vec();
        bytes.extend(chunk(b"fmt ", &[1, 0, 1, 0]));
        bytes.extend(chunk(b"data", &[0; 2]));
        assert!(matches!(
            parse_bytes(bytes),
            Err(WavError::ShortFormatChunk(4))
        ));
    }

    #[test]
    fn truncated_fmt_fails_format_check() {
        let mut bytes = b"RIFF\0\0\0\0WAVEfmt ".to_vec();
        bytes.extend(16u32.to_le_bytes());
        bytes.extend(1u16.to_le_bytes()); // tag only, then EOF
        assert!(matches!(
            parse_bytes(bytes),
            Err(WavError::UnsupportedFormat { channels: 0, .. })
        ));
    }
}
