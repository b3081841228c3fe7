use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;

use bytes::BytesMut;
use tracing::{debug, warn};

use crate::framing;
use crate::header::FlvHeader;
use crate::tag::{FlvTag, FlvTagType};

/// Reads FLV files back, tag by tag.
pub struct FlvParser;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrevTagSizeMode {
    /// Ignore `PreviousTagSize` values (fastest, most tolerant).
    #[default]
    Ignore,
    /// Log mismatches but continue parsing.
    Warn,
    /// Treat any mismatch as an error.
    Strict,
}

impl FlvParser {
    pub fn parse_header<R: Read>(reader: &mut R) -> io::Result<FlvHeader> {
        FlvHeader::parse(reader)
    }

    /// Parses every tag after the header, calling `on_tag` with the tag and
    /// the file offset of its header. Returns the number of tags.
    ///
    /// `reader` must be positioned at `PreviousTagSize0`, i.e. right after
    /// the file header, and `current_position` must be that offset.
    pub fn parse_tags<R, F>(
        reader: &mut R,
        mut on_tag: F,
        mut current_position: u64,
        mode: PrevTagSizeMode,
    ) -> io::Result<u32>
    where
        R: Read,
        F: FnMut(&FlvTag, u64),
    {
        let mut tags_count = 0;
        let mut expected_prev_tag_size = 0u32;

        loop {
            let mut prev_tag_buffer = [0u8; framing::PREV_TAG_SIZE_FIELD_SIZE];
            if !read_exact_or_eof(reader, &mut prev_tag_buffer)? {
                if mode == PrevTagSizeMode::Strict && tags_count > 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "missing PreviousTagSize after last tag",
                    ));
                }
                break;
            }

            let prev_tag_size = framing::parse_prev_tag_size(prev_tag_buffer);
            if prev_tag_size != expected_prev_tag_size {
                match mode {
                    PrevTagSizeMode::Ignore => {}
                    PrevTagSizeMode::Warn => {
                        warn!(
                            expected = expected_prev_tag_size,
                            got = prev_tag_size,
                            position = current_position,
                            "PreviousTagSize mismatch"
                        );
                    }
                    PrevTagSizeMode::Strict => {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!(
                                "PreviousTagSize mismatch at {current_position} (expected {expected_prev_tag_size}, got {prev_tag_size})"
                            ),
                        ));
                    }
                }
            }
            current_position += framing::PREV_TAG_SIZE_FIELD_SIZE as u64;

            let Some(tag) = Self::parse_tag(reader)? else {
                break;
            };

            tags_count += 1;
            on_tag(&tag, current_position);
            expected_prev_tag_size = tag.size() as u32;
            current_position += tag.size() as u64;
        }

        Ok(tags_count)
    }

    /// Parses a whole file held in memory.
    pub fn parse_bytes(data: &[u8], mode: PrevTagSizeMode) -> io::Result<(FlvHeader, Vec<FlvTag>)> {
        let mut reader = Cursor::new(data);
        let header = Self::parse_header(&mut reader)?;

        let mut tags = Vec::new();
        Self::parse_tags(
            &mut reader,
            |tag, _| tags.push(tag.clone()),
            header.data_offset as u64,
            mode,
        )?;

        Ok((header, tags))
    }

    /// Parses a file from disk, calling `on_tag` for each tag.
    pub fn parse_file<F>(file_path: &Path, mode: PrevTagSizeMode, on_tag: F) -> io::Result<FlvHeader>
    where
        F: FnMut(&FlvTag, u64),
    {
        let mut reader = BufReader::new(File::open(file_path)?);
        let header = Self::parse_header(&mut reader)?;

        let tags_count = Self::parse_tags(&mut reader, on_tag, header.data_offset as u64, mode)?;
        debug!(path = %file_path.display(), tags_count, "parsed FLV file");

        Ok(header)
    }

    /// Parses a single tag. Returns `None` at a clean end of input.
    pub fn parse_tag<R: Read>(reader: &mut R) -> io::Result<Option<FlvTag>> {
        let mut header_bytes = [0u8; framing::TAG_HEADER_SIZE];
        if !read_exact_or_eof(reader, &mut header_bytes)? {
            return Ok(None);
        }
        let header = framing::parse_tag_header_bytes(header_bytes);

        let mut tag_buffer = BytesMut::with_capacity(framing::TAG_HEADER_SIZE + header.data_size as usize);
        tag_buffer.extend_from_slice(&header_bytes);
        tag_buffer.resize(framing::TAG_HEADER_SIZE + header.data_size as usize, 0);
        reader.read_exact(&mut tag_buffer[framing::TAG_HEADER_SIZE..])?;

        if let FlvTagType::Unknown(value) = header.tag_type {
            debug!(tag_type = value, "unknown tag type");
        }

        FlvTag::demux(&mut Cursor::new(tag_buffer.freeze())).map(Some)
    }
}

/// Fills `buf`, or returns `false` if the input ends before its first byte.
/// Ending part way through is an `UnexpectedEof` error.
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("truncated FLV field: {filled} of {} bytes", buf.len()),
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
