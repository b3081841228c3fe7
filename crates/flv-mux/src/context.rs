//! The format context: the muxer state machine.
//!
//! ```text
//! Unconfigured --set_options--> Unconfigured
//! Unconfigured --prepare------> Prepared
//! Prepared/Muxing --write_*---> Muxing
//! Prepared/Muxing --finalize--> Finalized
//! any --sink I/O error--------> Failed
//! ```
//!
//! Every call frames its tags into one buffer and hands it to the sink in a
//! single write. Track state is only updated after that write succeeded, so
//! a rejected access unit leaves no trace in the output or in the context.

use std::fmt;
use std::io;

use flv::{FlvHeader, FlvTagWriter};
use h264::AVCDecoderConfigurationRecord;
use tracing::{debug, error, info, trace};

use crate::access_unit::{AccessUnit, TrackKind};
use crate::audio::{AudioTrack, AudioUpdate};
use crate::error::{MuxError, Result};
use crate::metadata::{self, MetadataOffsets};
use crate::options::MuxerOptions;
use crate::sink::OutputSink;
use crate::video::{VideoTrack, VideoUpdate};

/// Largest composition time offset an AVC tag can carry (SI24).
const MAX_COMPOSITION_TIME: i64 = 0x7F_FFFF;

/// Timestamp of sequence headers written together ahead of the first data
/// tag, so neither track's header lands after its own first frame.
const STREAM_START_MS: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MuxerState {
    /// Options may still change; nothing written.
    Unconfigured,
    /// Header and metadata written, no access unit yet.
    Prepared,
    Muxing,
    /// Terminal. The output is complete.
    Finalized,
    /// Terminal. The sink failed; every call returns that error.
    Failed,
}

impl fmt::Display for MuxerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconfigured => "unconfigured",
            Self::Prepared => "prepared",
            Self::Muxing => "muxing",
            Self::Finalized => "finalized",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Counters of one track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackStats {
    pub config_written: bool,
    /// Data tags written.
    pub frames: u64,
    pub key_frames: u64,
    /// Codec payload bytes in data tags, tag and packet headers excluded.
    pub payload_bytes: u64,
    pub first_timestamp_ms: Option<u32>,
    pub last_timestamp_ms: Option<u32>,
}

impl TrackStats {
    fn record_frames(&mut self, frames: u64, payload_bytes: u64, first_ms: u32, last_ms: u32) {
        self.frames += frames;
        self.payload_bytes += payload_bytes;
        if self.first_timestamp_ms.is_none() {
            self.first_timestamp_ms = Some(first_ms);
        }
        self.last_timestamp_ms = Some(last_ms);
    }
}

/// What a context has written so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MuxerStats {
    /// Bytes handed to the sink, file header included.
    pub bytes_written: u64,
    /// Tags written, metadata and sequence headers included.
    pub tags_written: u64,
    pub video: TrackStats,
    pub audio: TrackStats,
}

impl MuxerStats {
    /// The largest data tag timestamp over both tracks.
    pub fn duration_ms(&self) -> u32 {
        self.video
            .last_timestamp_ms
            .into_iter()
            .chain(self.audio.last_timestamp_ms)
            .max()
            .unwrap_or(0)
    }
}

/// Muxes H.264 and AAC access units into an FLV byte stream.
///
/// The context owns its sink from [`prepare`](Self::prepare) on. Calls take
/// `&mut self`; callers feeding it from several encoder threads serialize
/// them behind a lock.
#[derive(Debug)]
pub struct FormatContext<S> {
    options: MuxerOptions,
    state: MuxerState,
    sink: Option<S>,
    video: Option<VideoTrack>,
    audio: Option<AudioTrack>,
    metadata: MetadataOffsets,
    stats: MuxerStats,
    failure: Option<MuxError>,
}

impl<S: OutputSink> Default for FormatContext<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: OutputSink> FormatContext<S> {
    /// A context with default options.
    pub fn new() -> Self {
        Self {
            options: MuxerOptions::default(),
            state: MuxerState::Unconfigured,
            sink: None,
            video: None,
            audio: None,
            metadata: MetadataOffsets::default(),
            stats: MuxerStats::default(),
            failure: None,
        }
    }

    pub fn with_options(options: MuxerOptions) -> Result<Self> {
        let mut context = Self::new();
        context.set_options(options)?;
        Ok(context)
    }

    pub fn state(&self) -> MuxerState {
        self.state
    }

    pub fn options(&self) -> &MuxerOptions {
        &self.options
    }

    pub fn stats(&self) -> &MuxerStats {
        &self.stats
    }

    pub fn sink(&self) -> Option<&S> {
        self.sink.as_ref()
    }

    /// The configuration record written in the video sequence header.
    pub fn video_config_record(&self) -> Option<&AVCDecoderConfigurationRecord> {
        self.video.as_ref().and_then(VideoTrack::record)
    }

    /// The AudioSpecificConfig the audio sequence header carries, or will carry.
    pub fn audio_specific_config(&self) -> Option<&[u8]> {
        self.audio.as_ref().map(AudioTrack::audio_specific_config)
    }

    /// Gives the sink back, e.g. to read an in-memory output.
    pub fn into_sink(self) -> Option<S> {
        self.sink
    }

    /// Replaces the options. Only allowed before [`prepare`](Self::prepare);
    /// the last call wins.
    pub fn set_options(&mut self, options: MuxerOptions) -> Result<()> {
        self.check_failed()?;
        self.require_state("set_options", &[MuxerState::Unconfigured])?;
        options.validate()?;

        debug!(?options, "options set");
        self.options = options;
        Ok(())
    }

    /// Writes the FLV header and the `onMetaData` tag to `sink`.
    pub fn prepare(&mut self, sink: S) -> Result<()> {
        self.check_failed()?;
        self.require_state("prepare", &[MuxerState::Unconfigured])?;
        self.options.validate()?;

        let video = self.options.video().map(VideoTrack::new);
        let audio = self.options.audio().map(AudioTrack::new).transpose()?;

        let mut writer = FlvTagWriter::new();
        writer.write_file_header(&FlvHeader::new(audio.is_some(), video.is_some()));
        let metadata = metadata::write_metadata_tag(&mut writer, &self.options, 0)?;

        self.sink = Some(sink);
        self.emit(&writer)?;

        self.video = video;
        self.audio = audio;
        self.metadata = metadata;
        self.stats.tags_written += 1;
        self.state = MuxerState::Prepared;
        self.log_format();
        Ok(())
    }

    /// Supplies the video parameter sets out of band: Annex-B SPS and PPS
    /// units, or a serialized `AVCDecoderConfigurationRecord`.
    ///
    /// Only allowed once, before the video track captured parameter sets
    /// from the bitstream and before its sequence header went out.
    pub fn write_video_header(&mut self, data: &[u8]) -> Result<()> {
        const OPERATION: &str = "write_video_header";
        self.check_failed()?;
        self.require_state(OPERATION, &[MuxerState::Prepared, MuxerState::Muxing])?;

        let state = self.state;
        let video = self
            .video
            .as_mut()
            .filter(|video| video.accepts_header())
            .ok_or(MuxError::InvalidState {
                operation: OPERATION,
                state,
            })?;
        video.set_header(data)
    }

    /// Supplies the AudioSpecificConfig out of band. It must agree with the
    /// options and is only accepted before the audio sequence header.
    pub fn write_audio_header(&mut self, data: &[u8]) -> Result<()> {
        const OPERATION: &str = "write_audio_header";
        self.check_failed()?;
        self.require_state(OPERATION, &[MuxerState::Prepared, MuxerState::Muxing])?;

        let state = self.state;
        let audio = self
            .audio
            .as_mut()
            .filter(|audio| audio.accepts_header())
            .ok_or(MuxError::InvalidState {
                operation: OPERATION,
                state,
            })?;
        audio.set_header(data)
    }

    /// Muxes one access unit.
    ///
    /// The first data tag of the stream is preceded by the sequence headers
    /// of every track whose configuration is known at that point, video
    /// first, all stamped at the start of the stream. A track configured
    /// later gets its sequence header right before its own first data tag,
    /// with that tag's timestamp.
    pub fn write_access_unit(&mut self, unit: AccessUnit<'_>) -> Result<()> {
        self.check_failed()?;
        self.require_state(
            "write_access_unit",
            &[MuxerState::Prepared, MuxerState::Muxing],
        )?;

        let enabled = match unit.track {
            TrackKind::Video => self.video.is_some(),
            TrackKind::Audio => self.audio.is_some(),
        };
        if !enabled {
            return Err(MuxError::InvalidState {
                operation: match unit.track {
                    TrackKind::Video => "write_access_unit on the disabled video track",
                    TrackKind::Audio => "write_access_unit on the disabled audio track",
                },
                state: self.state,
            });
        }

        if unit.is_codec_config() {
            self.write_codec_config(unit.track, unit.data)?;
            self.state = MuxerState::Muxing;
            return Ok(());
        }

        let (timestamp_ms, composition_time) = self.timing(&unit)?;
        match unit.track {
            TrackKind::Video => self.write_video(unit.data, timestamp_ms, composition_time)?,
            TrackKind::Audio => self.write_audio(unit.data, timestamp_ms)?,
        }
        self.state = MuxerState::Muxing;
        Ok(())
    }

    /// Patches `duration` and `filesize` when the sink can seek back, then
    /// flushes. Calling it again is a no-op.
    pub fn finalize(&mut self) -> Result<()> {
        self.check_failed()?;
        if self.state == MuxerState::Finalized {
            return Ok(());
        }
        self.require_state("finalize", &[MuxerState::Prepared, MuxerState::Muxing])?;

        let duration_ms = self.stats.duration_ms();
        let filesize = self.stats.bytes_written;
        let patches = self
            .metadata
            .patches(f64::from(duration_ms) / 1000.0, filesize);

        let result = match self.sink.as_mut() {
            Some(sink) => patch_and_flush(sink, &patches),
            None => Ok(false),
        };
        let patched = result.map_err(|err| self.fail(err))?;
        if !patched {
            debug!("sink cannot patch, leaving duration and filesize unset");
        }

        self.state = MuxerState::Finalized;
        info!(
            duration_ms,
            filesize,
            video_frames = self.stats.video.frames,
            audio_frames = self.stats.audio.frames,
            "finalized FLV output"
        );
        Ok(())
    }

    fn write_codec_config(&mut self, track: TrackKind, data: &[u8]) -> Result<()> {
        let accepted = match track {
            TrackKind::Video => self.video.as_ref().is_some_and(VideoTrack::accepts_header),
            TrackKind::Audio => self.audio.as_ref().is_some_and(AudioTrack::accepts_header),
        };
        if !accepted {
            debug!(%track, len = data.len(), "ignoring repeated codec configuration");
            return Ok(());
        }

        match track {
            TrackKind::Video => self.write_video_header(data),
            TrackKind::Audio => self.write_audio_header(data),
        }
    }

    fn write_video(&mut self, data: &[u8], timestamp_ms: u32, composition_time: i32) -> Result<()> {
        let Some(video) = self.video.as_ref() else {
            return Ok(());
        };

        let mut unit = video.inspect(data, timestamp_ms)?;
        if unit.is_parameter_sets_only() {
            trace!(timestamp_ms, "video access unit carries parameter sets only");
            if let Some(video) = self.video.as_mut() {
                video.commit(unit.update);
            }
            return Ok(());
        }

        let mut writer = FlvTagWriter::new();
        let mut audio_update = None;
        if !video.config_written() {
            let grouped = !self.any_config_written();
            let config_ms = if grouped { STREAM_START_MS } else { timestamp_ms };
            video.frame_config(&mut writer, config_ms, &mut unit)?;
            if grouped && let Some(audio) = self.audio.as_ref() {
                let mut update = AudioUpdate::default();
                audio.frame_config(&mut writer, config_ms, &mut update)?;
                audio_update = Some(update);
            }
        }
        video.frame_data(&mut writer, &mut unit, timestamp_ms, composition_time)?;
        let key_frame = unit.is_key_frame();

        self.emit(&writer)?;
        self.commit_video(unit.update, key_frame, timestamp_ms);
        if let Some(update) = audio_update {
            self.commit_audio(update, timestamp_ms);
        }
        Ok(())
    }

    fn write_audio(&mut self, data: &[u8], timestamp_ms: u32) -> Result<()> {
        let Some(audio) = self.audio.as_ref() else {
            return Ok(());
        };

        let mut writer = FlvTagWriter::new();
        let mut update = AudioUpdate::default();
        let mut video_update = None;
        if !audio.config_written() {
            let grouped = !self.any_config_written();
            let config_ms = if grouped { STREAM_START_MS } else { timestamp_ms };
            if grouped
                && let Some(video) = self.video.as_ref()
                && video.record_available()
            {
                video_update = Some(video.frame_captured_config(&mut writer, config_ms)?);
            }
            audio.frame_config(&mut writer, config_ms, &mut update)?;
        }
        audio.frame_data(&mut writer, data, timestamp_ms, &mut update)?;

        self.emit(&writer)?;
        if let Some(video_update) = video_update {
            self.commit_video(video_update, false, timestamp_ms);
        }
        self.commit_audio(update, timestamp_ms);
        Ok(())
    }

    fn commit_video(&mut self, update: VideoUpdate, key_frame: bool, timestamp_ms: u32) {
        let stats = &mut self.stats.video;
        if update.wrote_config() {
            stats.config_written = true;
            self.stats.tags_written += 1;
        }
        if update.wrote_data() {
            stats.record_frames(1, update.payload_bytes(), timestamp_ms, timestamp_ms);
            stats.key_frames += u64::from(key_frame);
            self.stats.tags_written += 1;
        }
        if let Some(video) = self.video.as_mut() {
            video.commit(update);
        }
    }

    fn commit_audio(&mut self, update: AudioUpdate, timestamp_ms: u32) {
        let stats = &mut self.stats.audio;
        if update.wrote_config() {
            stats.config_written = true;
            self.stats.tags_written += 1;
        }
        if let Some(last_ms) = update.last_timestamp_ms() {
            stats.record_frames(update.frames(), update.payload_bytes(), timestamp_ms, last_ms);
            self.stats.tags_written += update.frames();
        }
        if let Some(audio) = self.audio.as_mut() {
            audio.commit(update);
        }
    }

    fn any_config_written(&self) -> bool {
        self.video.as_ref().is_some_and(VideoTrack::config_written)
            || self.audio.as_ref().is_some_and(AudioTrack::config_written)
    }

    /// Tag timestamp (the decode time) and composition offset, in ms.
    fn timing(&self, unit: &AccessUnit<'_>) -> Result<(u32, i32)> {
        let unit_of_time = self.options.timestamp_unit;
        let pts = unit_of_time.to_millis(unit.pts);
        let dts = unit.dts.map_or(pts, |dts| unit_of_time.to_millis(dts));

        let timestamp_ms = u32::try_from(dts).map_err(|_| {
            MuxError::malformed(format!("timestamp {dts} ms exceeds the 32-bit FLV range"))
        })?;

        let offset = pts as i64 - dts as i64;
        if !(0..=MAX_COMPOSITION_TIME).contains(&offset) {
            return Err(MuxError::malformed(format!(
                "composition time offset {offset} ms out of range (pts {pts}, dts {dts})"
            )));
        }
        Ok((timestamp_ms, offset as i32))
    }

    fn emit(&mut self, writer: &FlvTagWriter) -> Result<()> {
        let bytes = writer.as_bytes();
        let result = match self.sink.as_mut() {
            Some(sink) => sink.write_all(bytes),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "no output sink")),
        };
        result.map_err(|err| self.fail(err))?;

        self.stats.bytes_written += bytes.len() as u64;
        trace!(len = bytes.len(), total = self.stats.bytes_written, "wrote to sink");
        Ok(())
    }

    /// Moves to `Failed`, keeping the error for every later call.
    fn fail(&mut self, err: io::Error) -> MuxError {
        let err = MuxError::from(err);
        error!(error = %err, state = %self.state, "output sink failed");
        self.state = MuxerState::Failed;
        self.failure = Some(err.clone());
        err
    }

    fn check_failed(&self) -> Result<()> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn require_state(&self, operation: &'static str, allowed: &[MuxerState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(MuxError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn log_format(&self) {
        info!(
            format = %self.options.container_format_name,
            bytes = self.stats.bytes_written,
            "prepared output"
        );
        if let Some(video) = &self.video {
            let config = video.config;
            info!(
                codec = "h264",
                width = config.width,
                height = config.height,
                frame_rate = config.frame_rate,
                bit_rate = config.bit_rate,
                "video track"
            );
        }
        if let Some(audio) = &self.audio {
            let config = audio.config;
            info!(
                codec = "aac",
                sample_rate = config.sample_rate,
                channels = config.channels,
                bit_rate = config.bit_rate,
                object_type = u8::from(config.object_type),
                "audio track"
            );
        }
    }
}

/// Applies the metadata patches, then flushes. Returns whether the sink
/// supported patching.
fn patch_and_flush<S: OutputSink>(sink: &mut S, patches: &[(u64, [u8; 8])]) -> io::Result<bool> {
    let mut patched = true;
    for (offset, bytes) in patches {
        if !sink.patch(*offset, bytes)? {
            patched = false;
            break;
        }
    }
    sink.flush()?;
    Ok(patched)
}
