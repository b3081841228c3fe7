use std::fs;
use std::io;
use std::path::Path;

use aac::{AdtsHeader, AudioSpecificConfig};
use flv::{FlvParser, FlvTag, PrevTagSizeMode};
use flv_mux::{AccessUnit, FileSink, FormatContext, MuxerOptions, MuxerStats, TrackKind};
use h264::AVCDecoderConfigurationRecord;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cli::MuxArgs;
use crate::error::{AppError, Result};
use crate::input::{self, AdtsStream};

/// Outcome of a `mux` run.
#[derive(Debug, Clone, Copy)]
pub struct MuxReport {
    pub stats: MuxerStats,
    /// Access units the muxer rejected as malformed.
    pub skipped: u64,
}

/// Builds the muxer options. Command line flags win over the ADTS headers,
/// which win over the configuration file.
pub fn resolve_options(args: &MuxArgs, adts: Option<&AdtsHeader>) -> Result<MuxerOptions> {
    let mut options: MuxerOptions = match &args.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => MuxerOptions::default(),
    };

    options.video_enabled = args.video.is_some();
    options.audio_enabled = args.audio.is_some();
    if !options.video_enabled && !options.audio_enabled {
        return Err(AppError::InvalidInput(
            "at least one of --video or --audio is required".to_string(),
        ));
    }

    if let Some(header) = adts {
        if let Some(sample_rate) = header.sample_rate() {
            options.audio_sample_rate = sample_rate;
        }
        // 0 defers to a program config element
        if header.channel_configuration != 0 {
            options.audio_channel_count = header.channel_configuration;
        }
        options.audio_object_type = u8::from(header.audio_object_type());
    }

    if let Some(width) = args.width {
        options.video_width = width;
    }
    if let Some(height) = args.height {
        options.video_height = height;
    }
    if let Some(fps) = args.fps {
        options.video_frame_rate = fps;
    }
    if let Some(bit_rate) = args.video_bitrate {
        options.video_bit_rate = bit_rate;
    }
    if let Some(sample_rate) = args.sample_rate {
        options.audio_sample_rate = sample_rate;
    }
    if let Some(channels) = args.channels {
        options.audio_channel_count = channels;
    }
    if let Some(bit_rate) = args.audio_bitrate {
        options.audio_bit_rate = bit_rate;
    }

    options.validate()?;
    Ok(options)
}

/// Muxes the input streams into `args.output`.
///
/// Units the muxer rejects as malformed are logged and skipped; a sink
/// failure aborts the run.
pub fn mux(args: &MuxArgs) -> Result<MuxReport> {
    let video_data = args.video.as_deref().map(fs::read).transpose()?;
    let audio_data = args.audio.as_deref().map(fs::read).transpose()?;

    let video_units = match &video_data {
        Some(data) => input::split_annex_b(data)?,
        None => Vec::new(),
    };
    let audio_stream = match &audio_data {
        Some(data) => input::split_adts(data)?,
        None => AdtsStream::default(),
    };

    let options = resolve_options(args, audio_stream.first_header.as_ref())?;
    let samples = input::schedule(
        &video_units,
        options.video_frame_rate,
        &audio_stream.frames,
        options.audio_sample_rate,
    );
    info!(
        video_units = video_units.len(),
        audio_frames = audio_stream.frames.len(),
        output = %args.output.display(),
        "muxing"
    );

    let mut muxer = FormatContext::with_options(options)?;
    muxer.prepare(FileSink::create(&args.output)?)?;

    let mut skipped = 0;
    for sample in samples {
        let unit = match sample.track {
            TrackKind::Video => AccessUnit::video(sample.data, sample.timestamp_ms),
            TrackKind::Audio => AccessUnit::audio(sample.data, sample.timestamp_ms),
        };
        match muxer.write_access_unit(unit) {
            Ok(()) => {}
            Err(err) if !err.is_fatal() => {
                warn!(
                    track = %sample.track,
                    timestamp_ms = sample.timestamp_ms,
                    error = %err,
                    "skipping access unit"
                );
                skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    muxer.finalize()?;
    Ok(MuxReport {
        stats: *muxer.stats(),
        skipped,
    })
}

/// Summary of an FLV file.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct InspectReport {
    pub has_video: bool,
    pub has_audio: bool,
    pub tags: u64,
    pub script_tags: u64,
    pub video_tags: u64,
    pub audio_tags: u64,
    pub key_frames: u64,
    pub last_timestamp_ms: u32,
    /// `duration` from `onMetaData`, in seconds.
    pub duration: Option<f64>,
    /// `filesize` from `onMetaData`, in bytes.
    pub filesize: Option<f64>,
    pub avc_profile: Option<u8>,
    pub avc_level: Option<u8>,
    pub aac_sample_rate: Option<u32>,
    pub aac_channels: Option<u8>,
}

impl InspectReport {
    fn record(&mut self, tag: &FlvTag) -> Result<()> {
        self.tags += 1;
        self.last_timestamp_ms = self.last_timestamp_ms.max(tag.timestamp_ms);

        if tag.is_script_tag() {
            self.script_tags += 1;
            let script = tag
                .decode_script()
                .map_err(|e| AppError::InvalidInput(format!("script tag: {e}")))?;
            if script.name == "onMetaData" {
                self.duration = script.number("duration");
                self.filesize = script.number("filesize");
            }
        } else if tag.is_video_tag() {
            self.video_tags += 1;
            if tag.is_video_sequence_header() {
                if tag.data.len() < 5 {
                    return Err(AppError::InvalidInput("truncated video sequence header".into()));
                }
                let record =
                    AVCDecoderConfigurationRecord::parse(&mut io::Cursor::new(tag.data.slice(5..)))?;
                self.avc_profile = Some(record.profile_indication);
                self.avc_level = Some(record.level_indication);
            } else if tag.is_key_frame() {
                self.key_frames += 1;
            }
        } else {
            self.audio_tags += 1;
            if tag.is_audio_sequence_header() {
                let config = AudioSpecificConfig::parse(tag.data.get(2..).unwrap_or_default())
                    .map_err(|e| AppError::InvalidInput(format!("audio sequence header: {e}")))?;
                self.aac_sample_rate = Some(config.sample_rate());
                self.aac_channels = Some(config.channel_configuration);
            }
        }
        Ok(())
    }
}

/// Reads `path` end to end, checking every `PreviousTagSize`.
pub fn inspect(path: &Path) -> Result<InspectReport> {
    let mut report = InspectReport::default();
    let mut failure = None;

    let header = FlvParser::parse_file(path, PrevTagSizeMode::Strict, |tag, offset| {
        debug!(
            offset,
            tag_type = %tag.tag_type,
            timestamp_ms = tag.timestamp_ms,
            size = tag.data.len(),
            "tag"
        );
        if let Err(err) = report.record(tag) {
            failure.get_or_insert(err);
        }
    })?;

    if let Some(err) = failure {
        return Err(err);
    }
    report.has_video = header.has_video;
    report.has_audio = header.has_audio;
    Ok(report)
}
