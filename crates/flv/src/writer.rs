use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::audio::{AacPacketType, AudioTagHeader};
use crate::error::FlvError;
use crate::framing::{self, MAX_TAG_DATA_SIZE, TAG_HEADER_SIZE};
use crate::header::FlvHeader;
use crate::tag::FlvTagType;
use crate::video::{AvcPacketType, VideoFrameType, VideoTagHeader};

/// Position of a framed tag inside the writer's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpan {
    /// Offset of the tag header.
    pub start: usize,
    /// Offset of the first body byte.
    pub body_start: usize,
    /// Total bytes written: header, body and `PreviousTagSize`.
    pub len: usize,
}

/// Frames complete FLV tags into one contiguous buffer.
///
/// Every tag is followed by its `PreviousTagSize`. A tag whose body turns out
/// too large is removed from the buffer again, so the buffer only ever holds
/// whole tags.
#[derive(Debug, Default)]
pub struct FlvTagWriter {
    buf: BytesMut,
}

impl FlvTagWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The framed bytes so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Takes the framed bytes, leaving the writer empty.
    pub fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Writes the file header and `PreviousTagSize0`.
    pub fn write_file_header(&mut self, header: &FlvHeader) {
        self.buf.put_slice(&framing::encode_header_bytes(header));
    }

    /// Frames one tag whose body is produced by `body`.
    pub fn write_tag_with<F>(
        &mut self,
        tag_type: FlvTagType,
        timestamp_ms: u32,
        body: F,
    ) -> Result<TagSpan, FlvError>
    where
        F: FnOnce(&mut BytesMut) -> Result<(), FlvError>,
    {
        let start = self.buf.len();
        self.buf.put_bytes(0, TAG_HEADER_SIZE);
        let body_start = self.buf.len();

        if let Err(err) = body(&mut self.buf) {
            self.buf.truncate(start);
            return Err(err);
        }

        let data_size = self.buf.len() - body_start;
        if data_size > MAX_TAG_DATA_SIZE as usize {
            self.buf.truncate(start);
            return Err(FlvError::TagTooLarge { size: data_size });
        }

        let header = framing::encode_tag_header_bytes(tag_type, data_size as u32, timestamp_ms)?;
        self.buf[start..body_start].copy_from_slice(&header);
        self.buf
            .put_slice(&framing::encode_prev_tag_size_bytes((TAG_HEADER_SIZE + data_size) as u32));

        trace!(%tag_type, timestamp_ms, data_size, "framed tag");

        Ok(TagSpan {
            start,
            body_start,
            len: self.buf.len() - start,
        })
    }

    /// Frames a tag from a ready body.
    pub fn write_tag(
        &mut self,
        tag_type: FlvTagType,
        timestamp_ms: u32,
        body: &[u8],
    ) -> Result<TagSpan, FlvError> {
        self.write_tag_with(tag_type, timestamp_ms, |buf| {
            buf.put_slice(body);
            Ok(())
        })
    }

    /// Frames the AVC sequence header carrying a serialized configuration record.
    pub fn write_avc_sequence_header(
        &mut self,
        timestamp_ms: u32,
        record: &[u8],
    ) -> Result<TagSpan, FlvError> {
        let header =
            VideoTagHeader::avc(VideoFrameType::KeyFrame, AvcPacketType::SequenceHeader, 0)?;
        self.write_tag_with(FlvTagType::Video, timestamp_ms, |buf| {
            header.encode(buf);
            buf.put_slice(record);
            Ok(())
        })
    }

    /// Frames an AVC access unit; `payload` writes the length-prefixed NAL units.
    pub fn write_avc_nalu<F>(
        &mut self,
        timestamp_ms: u32,
        key_frame: bool,
        composition_time: i32,
        payload: F,
    ) -> Result<TagSpan, FlvError>
    where
        F: FnOnce(&mut BytesMut),
    {
        let frame_type = if key_frame {
            VideoFrameType::KeyFrame
        } else {
            VideoFrameType::InterFrame
        };
        let header = VideoTagHeader::avc(frame_type, AvcPacketType::Nalu, composition_time)?;
        self.write_tag_with(FlvTagType::Video, timestamp_ms, |buf| {
            header.encode(buf);
            payload(buf);
            Ok(())
        })
    }

    /// Frames the AAC sequence header carrying an `AudioSpecificConfig`.
    pub fn write_aac_sequence_header(
        &mut self,
        timestamp_ms: u32,
        config: &[u8],
    ) -> Result<TagSpan, FlvError> {
        self.write_aac(timestamp_ms, AacPacketType::SequenceHeader, config)
    }

    /// Frames one raw AAC frame.
    pub fn write_aac_raw(&mut self, timestamp_ms: u32, frame: &[u8]) -> Result<TagSpan, FlvError> {
        self.write_aac(timestamp_ms, AacPacketType::Raw, frame)
    }

    fn write_aac(
        &mut self,
        timestamp_ms: u32,
        packet_type: AacPacketType,
        payload: &[u8],
    ) -> Result<TagSpan, FlvError> {
        let header = AudioTagHeader::aac(packet_type);
        self.write_tag_with(FlvTagType::Audio, timestamp_ms, |buf| {
            header.encode(buf);
            buf.put_slice(payload);
            Ok(())
        })
    }
}
