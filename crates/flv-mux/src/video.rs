//! Video track: parameter-set capture, the configuration record and AVC tags.
//!
//! The record comes from either an explicit header or the SPS/PPS seen in
//! the bitstream. It is written once, before the first video data tag;
//! parameter sets arriving later stay in the data tags.

use std::io;

use bytes::Bytes;
use flv::FlvTagWriter;
use flv::framing::{PREV_TAG_SIZE_FIELD_SIZE, TAG_HEADER_SIZE};
use h264::{AVCDecoderConfigurationRecord, AnnexBNalIter, NalUnit, NalUnitType, write_length_prefixed};
use tracing::{debug, warn};

use crate::error::{MuxError, Result};
use crate::options::VideoTrackConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderSource {
    Pending,
    /// Parameter sets captured from access units.
    Bitstream,
    /// Supplied through `write_video_header`.
    Explicit,
}

/// Track changes to apply once the framed bytes reached the sink.
#[derive(Debug, Default)]
pub(crate) struct VideoUpdate {
    sps: Option<Bytes>,
    pps: Option<Bytes>,
    written_record: Option<AVCDecoderConfigurationRecord>,
    timestamp_ms: Option<u32>,
    payload_bytes: u64,
}

impl VideoUpdate {
    pub(crate) fn wrote_config(&self) -> bool {
        self.written_record.is_some()
    }

    pub(crate) fn wrote_data(&self) -> bool {
        self.timestamp_ms.is_some()
    }

    pub(crate) fn payload_bytes(&self) -> u64 {
        self.payload_bytes
    }
}

/// One access unit split into NAL units and classified.
#[derive(Debug)]
pub(crate) struct VideoUnit<'a> {
    nals: Vec<NalUnit<'a>>,
    has_parameter_sets: bool,
    has_slice: bool,
    key_frame: bool,
    pub(crate) update: VideoUpdate,
}

impl VideoUnit<'_> {
    /// Only parameter sets (and possibly SEI or delimiters), no picture.
    pub(crate) fn is_parameter_sets_only(&self) -> bool {
        self.has_parameter_sets && !self.has_slice
    }

    pub(crate) fn is_key_frame(&self) -> bool {
        self.key_frame
    }
}

#[derive(Debug)]
pub(crate) struct VideoTrack {
    pub(crate) config: VideoTrackConfig,
    source: HeaderSource,
    sps: Option<Bytes>,
    pps: Option<Bytes>,
    explicit_record: Option<AVCDecoderConfigurationRecord>,
    /// The record carried by the sequence header tag, once written.
    record: Option<AVCDecoderConfigurationRecord>,
    last_timestamp_ms: Option<u32>,
}

impl VideoTrack {
    pub(crate) fn new(config: VideoTrackConfig) -> Self {
        Self {
            config,
            source: HeaderSource::Pending,
            sps: None,
            pps: None,
            explicit_record: None,
            record: None,
            last_timestamp_ms: None,
        }
    }

    pub(crate) fn config_written(&self) -> bool {
        self.record.is_some()
    }

    pub(crate) fn record(&self) -> Option<&AVCDecoderConfigurationRecord> {
        self.record.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn last_timestamp_ms(&self) -> Option<u32> {
        self.last_timestamp_ms
    }

    /// Whether an explicit header may still be supplied: nothing captured
    /// from the bitstream, no earlier header, no sequence header written.
    pub(crate) fn accepts_header(&self) -> bool {
        self.source == HeaderSource::Pending && self.record.is_none()
    }

    /// Takes parameter sets supplied out of band, as Annex-B SPS/PPS units or
    /// as a serialized configuration record (first byte 1).
    pub(crate) fn set_header(&mut self, data: &[u8]) -> Result<()> {
        let record = if data.first() == Some(&1) {
            let parsed =
                AVCDecoderConfigurationRecord::parse(&mut io::Cursor::new(Bytes::copy_from_slice(data)))
                    .map_err(|e| MuxError::malformed(format!("invalid configuration record: {e}")))?;
            // data tags always carry 4-byte NAL lengths
            AVCDecoderConfigurationRecord::from_parameter_sets(parsed.sps, parsed.pps)?
        } else {
            let nals = collect_nals(data)?;
            AVCDecoderConfigurationRecord::from_parameter_sets(
                parameter_sets(&nals, NalUnitType::Sps),
                parameter_sets(&nals, NalUnitType::Pps),
            )?
        };

        debug!(
            profile = record.profile_indication,
            level = record.level_indication,
            sps = record.sps.len(),
            pps = record.pps.len(),
            "explicit video header"
        );
        self.source = HeaderSource::Explicit;
        self.explicit_record = Some(record);
        Ok(())
    }

    /// Splits an Annex-B access unit into NAL units and classifies it.
    ///
    /// Parameter sets are captured into the returned update unless the
    /// record is already fixed, by an explicit header or by the written
    /// sequence header.
    pub(crate) fn inspect<'a>(&self, data: &'a [u8], timestamp_ms: u32) -> Result<VideoUnit<'a>> {
        let nals = collect_nals(data)?;

        let mut update = VideoUpdate::default();
        let mut has_parameter_sets = false;
        let mut has_slice = false;
        let mut key_frame = false;
        for nal in &nals {
            let nal_type = nal.nal_type();
            match nal_type {
                NalUnitType::Sps => update.sps = Some(nal.to_bytes()),
                NalUnitType::Pps => update.pps = Some(nal.to_bytes()),
                _ => {}
            }
            has_parameter_sets |= nal_type.is_parameter_set();
            has_slice |= nal_type.is_slice();
            key_frame |= nal_type.is_keyframe();
        }

        if let Some(record) = &self.record {
            warn_on_changed_sets(record, &update);
        }
        if self.source == HeaderSource::Explicit || self.record.is_some() {
            update.sps = None;
            update.pps = None;
        }

        if !has_slice && !has_parameter_sets {
            return Err(MuxError::malformed("access unit carries no slice data"));
        }

        if has_slice
            && let Some(last) = self.last_timestamp_ms
            && timestamp_ms < last
        {
            return Err(MuxError::malformed(format!(
                "video timestamp {timestamp_ms} ms goes back from {last} ms"
            )));
        }

        Ok(VideoUnit {
            nals,
            has_parameter_sets,
            has_slice,
            key_frame,
            update,
        })
    }

    /// Whether the sequence header could be framed now from what was
    /// captured or supplied, without waiting for another access unit.
    pub(crate) fn record_available(&self) -> bool {
        self.record.is_none()
            && (self.explicit_record.is_some() || (self.sps.is_some() && self.pps.is_some()))
    }

    /// Frames the sequence header ahead of the first data tag of `unit`,
    /// using its parameter sets when none were captured before.
    pub(crate) fn frame_config(
        &self,
        writer: &mut FlvTagWriter,
        timestamp_ms: u32,
        unit: &mut VideoUnit<'_>,
    ) -> Result<()> {
        let record = self.pending_record(Some(&unit.update))?;
        self.write_record(writer, timestamp_ms, &record)?;
        unit.update.written_record = Some(record);
        Ok(())
    }

    /// Frames the sequence header from earlier captures alone.
    pub(crate) fn frame_captured_config(
        &self,
        writer: &mut FlvTagWriter,
        timestamp_ms: u32,
    ) -> Result<VideoUpdate> {
        let record = self.pending_record(None)?;
        self.write_record(writer, timestamp_ms, &record)?;
        Ok(VideoUpdate {
            written_record: Some(record),
            ..VideoUpdate::default()
        })
    }

    fn write_record(
        &self,
        writer: &mut FlvTagWriter,
        timestamp_ms: u32,
        record: &AVCDecoderConfigurationRecord,
    ) -> Result<()> {
        let mut body = Vec::with_capacity(record.size() as usize);
        record
            .build(&mut body)
            .map_err(|e| MuxError::malformed(format!("cannot serialize configuration record: {e}")))?;
        writer.write_avc_sequence_header(timestamp_ms, &body)?;

        debug!(
            profile = record.profile_indication,
            level = record.level_indication,
            timestamp_ms,
            "framed AVC sequence header"
        );
        Ok(())
    }

    /// Frames the data tag of `unit`, its NAL units with 4-byte lengths.
    ///
    /// The sequence header must have been framed already, and the first data
    /// tag of the track must be a keyframe.
    pub(crate) fn frame_data(
        &self,
        writer: &mut FlvTagWriter,
        unit: &mut VideoUnit<'_>,
        timestamp_ms: u32,
        composition_time: i32,
    ) -> Result<()> {
        if self.record.is_none() && unit.update.written_record.is_none() {
            return Err(MuxError::malformed(
                "missing parameter sets before first keyframe",
            ));
        }
        if self.last_timestamp_ms.is_none() && !unit.key_frame {
            return Err(MuxError::malformed(
                "first video access unit is not a keyframe",
            ));
        }

        let span = writer.write_avc_nalu(timestamp_ms, unit.key_frame, composition_time, |buf| {
            write_length_prefixed(&unit.nals, buf);
        })?;
        unit.update.timestamp_ms = Some(timestamp_ms);
        unit.update.payload_bytes = (span.len - TAG_HEADER_SIZE - PREV_TAG_SIZE_FIELD_SIZE) as u64;
        Ok(())
    }

    /// The record due in the sequence header: the explicit one, or one built
    /// from the latest captured SPS and PPS.
    fn pending_record(&self, update: Option<&VideoUpdate>) -> Result<AVCDecoderConfigurationRecord> {
        if let Some(record) = &self.explicit_record {
            return Ok(record.clone());
        }

        let sps = update.and_then(|u| u.sps.as_ref()).or(self.sps.as_ref());
        let pps = update.and_then(|u| u.pps.as_ref()).or(self.pps.as_ref());
        let (Some(sps), Some(pps)) = (sps, pps) else {
            return Err(MuxError::malformed(
                "missing parameter sets before first keyframe",
            ));
        };
        Ok(AVCDecoderConfigurationRecord::from_parameter_sets(
            vec![sps.clone()],
            vec![pps.clone()],
        )?)
    }

    pub(crate) fn commit(&mut self, update: VideoUpdate) {
        if let Some(sps) = update.sps {
            debug!(len = sps.len(), "captured SPS");
            self.sps = Some(sps);
            self.source = HeaderSource::Bitstream;
        }
        if let Some(pps) = update.pps {
            debug!(len = pps.len(), "captured PPS");
            self.pps = Some(pps);
            self.source = HeaderSource::Bitstream;
        }
        if let Some(record) = update.written_record {
            self.explicit_record = None;
            self.record = Some(record);
        }
        if let Some(timestamp_ms) = update.timestamp_ms {
            self.last_timestamp_ms = Some(timestamp_ms);
        }
    }
}

fn collect_nals(data: &[u8]) -> Result<Vec<NalUnit<'_>>> {
    Ok(AnnexBNalIter::new(data).collect::<std::result::Result<Vec<_>, _>>()?)
}

fn parameter_sets(nals: &[NalUnit<'_>], nal_type: NalUnitType) -> Vec<Bytes> {
    nals.iter()
        .filter(|nal| nal.nal_type() == nal_type)
        .map(NalUnit::to_bytes)
        .collect()
}

fn warn_on_changed_sets(record: &AVCDecoderConfigurationRecord, update: &VideoUpdate) {
    let changed = update.sps.as_ref().is_some_and(|sps| !record.sps.contains(sps))
        || update.pps.as_ref().is_some_and(|pps| !record.pps.contains(pps));
    if changed {
        warn!("in-band parameter sets differ from the written configuration record, keeping the first");
    }
}
