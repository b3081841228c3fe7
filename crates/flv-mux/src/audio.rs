//! Audio track: the AudioSpecificConfig and AAC tags.
//!
//! The config defaults to the one described by the options and can be
//! replaced once by an explicit header. ADTS input is stripped to raw frames,
//! one tag per frame.

use aac::{AdtsFrameIter, AdtsHeader, AudioSpecificConfig, SAMPLES_PER_FRAME};
use flv::FlvTagWriter;
use tracing::debug;

use crate::error::{MuxError, Result};
use crate::options::AudioTrackConfig;

#[derive(Debug, Default)]
pub(crate) struct AudioUpdate {
    config_written: bool,
    timestamp_ms: Option<u32>,
    frames: u64,
    payload_bytes: u64,
}

impl AudioUpdate {
    pub(crate) fn wrote_config(&self) -> bool {
        self.config_written
    }

    /// Timestamp of the last data tag framed, if any.
    pub(crate) fn last_timestamp_ms(&self) -> Option<u32> {
        self.timestamp_ms
    }

    pub(crate) fn frames(&self) -> u64 {
        self.frames
    }

    pub(crate) fn payload_bytes(&self) -> u64 {
        self.payload_bytes
    }
}

#[derive(Debug)]
pub(crate) struct AudioTrack {
    pub(crate) config: AudioTrackConfig,
    asc: AudioSpecificConfig,
    /// Bytes of the sequence header body after the packet type.
    asc_bytes: Vec<u8>,
    explicit: bool,
    config_written: bool,
    last_timestamp_ms: Option<u32>,
}

impl AudioTrack {
    pub(crate) fn new(config: AudioTrackConfig) -> Result<Self> {
        let asc = AudioSpecificConfig::new(config.object_type, config.sample_rate, config.channels)?;
        Ok(Self {
            config,
            asc,
            asc_bytes: asc.to_bytes().to_vec(),
            explicit: false,
            config_written: false,
            last_timestamp_ms: None,
        })
    }

    pub(crate) fn config_written(&self) -> bool {
        self.config_written
    }

    pub(crate) fn audio_specific_config(&self) -> &[u8] {
        &self.asc_bytes
    }

    #[cfg(test)]
    pub(crate) fn last_timestamp_ms(&self) -> Option<u32> {
        self.last_timestamp_ms
    }

    pub(crate) fn accepts_header(&self) -> bool {
        !self.explicit && !self.config_written
    }

    /// Takes an explicit AudioSpecificConfig. It is stored verbatim, so
    /// extension bytes survive, but must describe the configured stream.
    pub(crate) fn set_header(&mut self, data: &[u8]) -> Result<()> {
        let asc = AudioSpecificConfig::parse(data)?;
        self.check_matches(asc.audio_object_type.into(), asc.sample_rate(), asc.channel_configuration)?;

        debug!(
            sample_rate = asc.sample_rate(),
            channels = asc.channel_configuration,
            len = data.len(),
            "explicit audio header"
        );
        self.asc = asc;
        self.asc_bytes = data.to_vec();
        self.explicit = true;
        Ok(())
    }

    fn check_matches(&self, object_type: u8, sample_rate: u32, channels: u8) -> Result<()> {
        let expected_object_type = u8::from(self.config.object_type);
        if object_type != expected_object_type
            || sample_rate != self.config.sample_rate
            || channels != self.config.channels
        {
            return Err(MuxError::unsupported(format!(
                "AAC stream (object type {object_type}, {sample_rate} Hz, {channels} ch) does not match the configured track (object type {expected_object_type}, {} Hz, {} ch)",
                self.config.sample_rate, self.config.channels
            )));
        }
        Ok(())
    }

    /// Frames the sequence header carrying the AudioSpecificConfig.
    pub(crate) fn frame_config(
        &self,
        writer: &mut FlvTagWriter,
        timestamp_ms: u32,
        update: &mut AudioUpdate,
    ) -> Result<()> {
        writer.write_aac_sequence_header(timestamp_ms, &self.asc_bytes)?;
        debug!(
            sample_rate = self.asc.sample_rate(),
            channels = self.asc.channel_configuration,
            timestamp_ms,
            "framed AAC sequence header"
        );
        update.config_written = true;
        Ok(())
    }

    /// Frames the AAC data of one access unit.
    ///
    /// ADTS buffers may hold several frames; frame `i` is stamped
    /// `timestamp_ms + i * 1024 * 1000 / sample_rate`. Anything else is
    /// taken as one raw frame.
    pub(crate) fn frame_data(
        &self,
        writer: &mut FlvTagWriter,
        data: &[u8],
        timestamp_ms: u32,
        update: &mut AudioUpdate,
    ) -> Result<()> {
        if data.is_empty() {
            return Err(MuxError::malformed("empty audio access unit"));
        }
        if let Some(last) = self.last_timestamp_ms
            && timestamp_ms < last
        {
            return Err(MuxError::malformed(format!(
                "audio timestamp {timestamp_ms} ms goes back from {last} ms"
            )));
        }
        if !self.config_written && !update.config_written {
            return Err(MuxError::malformed("audio data before its sequence header"));
        }

        if !AdtsHeader::is_adts(data) {
            writer.write_aac_raw(timestamp_ms, data)?;
            update.timestamp_ms = Some(timestamp_ms);
            update.frames = 1;
            update.payload_bytes = data.len() as u64;
            return Ok(());
        }

        let sample_rate = u64::from(self.asc.sample_rate());
        for (index, frame) in AdtsFrameIter::new(data).enumerate() {
            let frame = frame?;
            let header = &frame.header;
            self.check_matches(
                header.audio_object_type().into(),
                header.sample_rate().unwrap_or(0),
                header.channel_configuration,
            )?;
            if frame.payload.is_empty() {
                return Err(MuxError::malformed(format!(
                    "ADTS frame at offset {} carries no data",
                    frame.offset
                )));
            }

            let offset = index as u64 * u64::from(SAMPLES_PER_FRAME) * 1000 / sample_rate;
            let frame_timestamp = u32::try_from(u64::from(timestamp_ms) + offset).map_err(|_| {
                MuxError::malformed("audio timestamp exceeds the 32-bit millisecond range")
            })?;

            writer.write_aac_raw(frame_timestamp, frame.payload)?;
            update.timestamp_ms = Some(frame_timestamp);
            update.frames += 1;
            update.payload_bytes += frame.payload.len() as u64;
        }

        if update.frames > 1 {
            debug!(frames = update.frames, timestamp_ms, "split ADTS buffer");
        }
        Ok(())
    }

    pub(crate) fn commit(&mut self, update: AudioUpdate) {
        if update.config_written {
            self.config_written = true;
        }
        if let Some(timestamp_ms) = update.timestamp_ms {
            self.last_timestamp_ms = Some(timestamp_ms);
        }
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use aac::AudioObjectType;

    use super::*;

    fn track(sample_rate: u32, channels: u8) -> AudioTrack {
        AudioTrack::new(AudioTrackConfig {
            sample_rate,
            channels,
            bit_rate: 128_000,
            object_type: AudioObjectType::AacLowComplexity,
        })
        .unwrap()
    }

    fn adts_frame(sample_rate: u32, channels: u8, payload: &[u8]) -> Vec<u8> {
        let asc = AudioSpecificConfig::new(AudioObjectType::AacLowComplexity, sample_rate, channels).unwrap();
        let mut out = Vec::new();
        AdtsHeader::for_payload(&asc, payload.len())
            .unwrap()
            .build(&mut out)
            .unwrap();
        out.extend_from_slice(payload);
        out
    }

    /// Frames `data` the way the format context does, config first when due.
    fn write(track: &mut AudioTrack, data: &[u8], ts: u32) -> Result<(AudioUpdate, Vec<u8>)> {
        let mut writer = FlvTagWriter::new();
        let mut update = AudioUpdate::default();
        if !track.config_written() {
            track.frame_config(&mut writer, ts, &mut update)?;
        }
        track.frame_data(&mut writer, data, ts, &mut update)?;
        Ok((update, writer.take().to_vec()))
    }

    fn parse(tags: &[u8]) -> Vec<flv::FlvTag> {
        let file = [&[b'F', b'L', b'V', 1, 4, 0, 0, 0, 9, 0, 0, 0, 0][..], tags].concat();
        flv::FlvParser::parse_bytes(&file, flv::PrevTagSizeMode::Strict)
            .unwrap()
            .1
    }

    #[test]
    fn test_default_config_from_options() {
        let track = track(44_100, 2);
        assert_eq!(track.audio_specific_config(), &[0x12, 0x10]);
        assert!(track.accepts_header());
    }

    #[test]
    fn test_raw_frame_after_sequence_header() {
        let mut track = track(44_100, 1);
        let (update, out) = write(&mut track, &[0x21, 0x00, 0x49], 0).unwrap();
        assert!(update.wrote_config());
        track.commit(update);

        let tags = parse(&out);
        assert_eq!(tags.len(), 2);
        assert_eq!(&tags[0].data[..], &[0xAF, 0x00, 0x12, 0x08]);
        assert_eq!(&tags[1].data[..], &[0xAF, 0x01, 0x21, 0x00, 0x49]);
        assert!(track.config_written());
        assert!(!track.accepts_header());

        let (update, out) = write(&mut track, &[0x21], 23).unwrap();
        assert!(!update.wrote_config());
        assert_eq!(out.len(), 11 + 3 + 4);
    }

    #[test]
    fn test_adts_buffer_splits_into_frames() {
        let mut track = track(48_000, 1);
        let mut data = adts_frame(48_000, 1, &[0x21, 0x10]);
        data.extend(adts_frame(48_000, 1, &[0x21, 0x20, 0x30]));
        data.extend(adts_frame(48_000, 1, &[0x21]));

        let (update, out) = write(&mut track, &data, 1000).unwrap();
        assert_eq!(update.frames(), 3);
        assert_eq!(update.payload_bytes(), 6);
        track.commit(update);
        // 1024 samples at 48 kHz are 21.33 ms
        assert_eq!(track.last_timestamp_ms(), Some(1042));

        let tags = parse(&out);
        let timestamps: Vec<_> = tags.iter().map(|t| t.timestamp_ms).collect();
        assert_eq!(timestamps, vec![1000, 1000, 1021, 1042]);
        assert_eq!(&tags[2].data[..], &[0xAF, 0x01, 0x21, 0x20, 0x30]);
    }

    #[test]
    fn test_adts_mismatch_is_unsupported() {
        let mut track = track(44_100, 1);
        let err = write(&mut track, &adts_frame(48_000, 1, &[0x21]), 0).unwrap_err();
        assert!(matches!(err, MuxError::UnsupportedFormat(_)));

        let err = write(&mut track, &adts_frame(44_100, 2, &[0x21]), 0).unwrap_err();
        assert!(matches!(err, MuxError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_truncated_adts_is_malformed() {
        let mut track = track(44_100, 1);
        let mut data = adts_frame(44_100, 1, &[0x21, 0x10, 0x20]);
        data.truncate(data.len() - 1);

        let err = write(&mut track, &data, 0).unwrap_err();
        assert!(matches!(err, MuxError::MalformedAccessUnit(_)));
    }

    #[test]
    fn test_explicit_header() {
        let mut track = track(44_100, 2);
        // stored verbatim, extension byte included
        track.set_header(&[0x12, 0x10, 0x56]).unwrap();
        assert_eq!(track.audio_specific_config(), &[0x12, 0x10, 0x56]);
        assert!(!track.accepts_header());

        let mut other = self::track(44_100, 2);
        assert!(matches!(
            other.set_header(&[0x11, 0x90]),
            Err(MuxError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            other.set_header(&[0x12]),
            Err(MuxError::MalformedAccessUnit(_))
        ));
        assert!(other.accepts_header());
    }

    #[test]
    fn test_data_checks() {
        let mut track = track(44_100, 1);
        let (update, _) = write(&mut track, &[0x21], 50).unwrap();
        track.commit(update);
        assert_eq!(track.last_timestamp_ms(), Some(50));

        assert!(matches!(
            write(&mut track, &[0x21], 49),
            Err(MuxError::MalformedAccessUnit(_))
        ));
        assert!(matches!(
            write(&mut track, &[], 60),
            Err(MuxError::MalformedAccessUnit(_))
        ));

        let fresh = self::track(44_100, 1);
        let mut writer = FlvTagWriter::new();
        assert!(
            fresh
                .frame_data(&mut writer, &[0x21], 0, &mut AudioUpdate::default())
                .is_err()
        );
    }
}
