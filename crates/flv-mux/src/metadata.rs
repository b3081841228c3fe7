//! The `onMetaData` script tag.
//!
//! Written once at prepare time with what the options describe. `duration`
//! and `filesize` start at zero and are patched in place on finalize when
//! the sink supports it.

use std::borrow::Cow;

use amf0::{Amf0Property, Amf0Value};
use flv::script::{EncodedMetadata, encode_metadata, number_patch};
use flv::{FlvTagType, FlvTagWriter};

use crate::error::Result;
use crate::options::MuxerOptions;

/// FLV codec id of AVC.
const VIDEO_CODEC_ID_AVC: f64 = 7.0;
/// FLV sound format of AAC.
const AUDIO_CODEC_ID_AAC: f64 = 10.0;

pub(crate) const ENCODER: &str = concat!("flv-mux/", env!("CARGO_PKG_VERSION"));

/// Absolute stream offsets of the patchable metadata values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MetadataOffsets {
    pub(crate) duration: Option<u64>,
    pub(crate) filesize: Option<u64>,
}

impl MetadataOffsets {
    /// The `(offset, bytes)` patches for the final values.
    pub(crate) fn patches(&self, duration_secs: f64, filesize: u64) -> Vec<(u64, [u8; 8])> {
        let mut patches = Vec::with_capacity(2);
        if let Some(offset) = self.duration {
            patches.push((offset, number_patch(duration_secs)));
        }
        if let Some(offset) = self.filesize {
            patches.push((offset, number_patch(filesize as f64)));
        }
        patches
    }
}

fn number(key: &'static str, value: f64) -> Amf0Property<'static> {
    (Cow::Borrowed(key), Amf0Value::Number(value))
}

/// The metadata properties, in the order players usually see them.
pub(crate) fn properties(options: &MuxerOptions) -> Vec<Amf0Property<'static>> {
    let mut props = vec![number("duration", 0.0)];

    if let Some(video) = options.video() {
        props.push(number("width", f64::from(video.width)));
        props.push(number("height", f64::from(video.height)));
        props.push(number("videodatarate", f64::from(video.bit_rate) / 1000.0));
        props.push(number("framerate", f64::from(video.frame_rate)));
        props.push(number("videocodecid", VIDEO_CODEC_ID_AVC));
    }

    if let Some(audio) = options.audio() {
        props.push(number("audiodatarate", f64::from(audio.bit_rate) / 1000.0));
        props.push(number("audiosamplerate", f64::from(audio.sample_rate)));
        props.push(number("audiosamplesize", 16.0));
        props.push((Cow::Borrowed("stereo"), Amf0Value::Boolean(audio.channels > 1)));
        props.push(number("audiocodecid", AUDIO_CODEC_ID_AAC));
    }

    props.push((Cow::Borrowed("encoder"), Amf0Value::String(Cow::Borrowed(ENCODER))));
    props.push(number("filesize", 0.0));
    props
}

/// Frames the metadata tag into `writer` and returns where the patchable
/// numbers landed, as absolute offsets given the writer starts at
/// `stream_offset`.
pub(crate) fn write_metadata_tag(
    writer: &mut FlvTagWriter,
    options: &MuxerOptions,
    stream_offset: u64,
) -> Result<MetadataOffsets> {
    let props = properties(options);
    let encoded: EncodedMetadata = encode_metadata(&props)?;

    let span = writer.write_tag(FlvTagType::ScriptData, 0, &encoded.body)?;
    let absolute = |relative: usize| stream_offset + (span.body_start + relative) as u64;

    Ok(MetadataOffsets {
        duration: encoded.number_offset(&props, "duration").map(absolute),
        filesize: encoded.number_offset(&props, "filesize").map(absolute),
    })
}
