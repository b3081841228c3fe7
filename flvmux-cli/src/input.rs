//! Splits elementary stream files into access units and stamps them.

use aac::{AdtsFrameIter, AdtsHeader, SAMPLES_PER_FRAME};
use flv_mux::TrackKind;
use h264::{AnnexBNalIter, NalUnit, NalUnitType};

use crate::error::{AppError, Result};

/// One access unit ready for the muxer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample<'a> {
    pub track: TrackKind,
    pub timestamp_ms: u64,
    pub data: &'a [u8],
}

/// Returns `true` when `nal` opens a new access unit after a slice.
fn starts_access_unit(nal: &NalUnit<'_>) -> bool {
    match nal.nal_type() {
        NalUnitType::AccessUnitDelimiter
        | NalUnitType::Sei
        | NalUnitType::Sps
        | NalUnitType::Pps => true,
        // first_mb_in_slice == 0 is a single set bit in ue(v)
        ty if ty.is_slice() => nal.data().get(1).is_some_and(|b| b & 0x80 != 0),
        _ => false,
    }
}

/// Groups the NAL units of an Annex-B stream into access units. Each unit
/// is a slice of `data` starting at a start code.
pub fn split_annex_b(data: &[u8]) -> Result<Vec<&[u8]>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut bounds = Vec::new();
    let mut has_slice = false;
    for nal in AnnexBNalIter::new(data) {
        let nal = nal.map_err(|e| AppError::InvalidInput(format!("H.264 stream: {e}")))?;
        if bounds.is_empty() {
            bounds.push(0);
        } else if has_slice && starts_access_unit(&nal) {
            // every unit is preceded by at least `00 00 01`
            bounds.push(nal.offset().saturating_sub(3));
            has_slice = false;
        }
        has_slice |= nal.nal_type().is_slice();
    }
    bounds.push(data.len());

    Ok(bounds.windows(2).map(|w| &data[w[0]..w[1]]).collect())
}

/// Whole ADTS frames of an AAC stream, headers included.
#[derive(Debug, Default)]
pub struct AdtsStream<'a> {
    pub frames: Vec<&'a [u8]>,
    pub first_header: Option<AdtsHeader>,
}

pub fn split_adts(data: &[u8]) -> Result<AdtsStream<'_>> {
    let mut stream = AdtsStream::default();
    for frame in AdtsFrameIter::new(data) {
        let frame = frame.map_err(|e| AppError::InvalidInput(format!("ADTS stream: {e}")))?;
        let end = frame.offset + frame.header.frame_length as usize;
        stream.frames.push(&data[frame.offset..end]);
        stream.first_header.get_or_insert(frame.header);
    }
    Ok(stream)
}

/// Stamps video units at `fps` and audio frames at 1024 samples each, then
/// interleaves them by timestamp, video first on ties.
pub fn schedule<'a>(
    video: &[&'a [u8]],
    fps: u32,
    audio: &[&'a [u8]],
    sample_rate: u32,
) -> Vec<Sample<'a>> {
    let fps = u64::from(fps.max(1));
    let sample_rate = u64::from(sample_rate.max(1));

    let video = video.iter().copied().enumerate().map(|(i, data)| Sample {
        track: TrackKind::Video,
        timestamp_ms: i as u64 * 1000 / fps,
        data,
    });
    let audio = audio.iter().copied().enumerate().map(|(i, data)| Sample {
        track: TrackKind::Audio,
        timestamp_ms: i as u64 * u64::from(SAMPLES_PER_FRAME) * 1000 / sample_rate,
        data,
    });

    let mut samples: Vec<_> = video.chain(audio).collect();
    samples.sort_by_key(|s| (s.timestamp_ms, s.track == TrackKind::Audio));
    samples
}
