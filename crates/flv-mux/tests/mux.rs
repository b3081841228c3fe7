use std::io;
use std::sync::Arc;

use bytes::Bytes;
use flv::script::ScriptData;
use flv::{FlvHeader, FlvParser, FlvTag, PrevTagSizeMode};
use flv_mux::{
    AccessUnit, AccessUnitFlags, FileSink, FormatContext, MuxError, MuxerOptions, MuxerState,
    OutputSink, SeekableSink, TimestampUnit, TrackKind, WriteSink,
};
use h264::AVCDecoderConfigurationRecord;

const SPS: &[u8] = &[0x67, 0x64, 0x00, 0x1F, 0xAC, 0xD9, 0x40, 0x50, 0x05, 0xBB, 0x01, 0x10];
const PPS: &[u8] = &[0x68, 0xEB, 0xE3, 0xCB, 0x22, 0xC0];
const IDR: &[u8] = &[0x65, 0x88, 0x84, 0x00, 0x33];
const P_SLICE: &[u8] = &[0x41, 0x9A, 0x02];
const AAC_FRAME: &[u8] = &[0x21, 0x00, 0x49, 0x90, 0x02, 0x19];

fn annex_b(nals: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nals {
        out.extend_from_slice(&[0, 0, 0, 1]);
        out.extend_from_slice(nal);
    }
    out
}

fn options_1280x720() -> MuxerOptions {
    MuxerOptions {
        video_width: 1280,
        video_height: 720,
        video_frame_rate: 30,
        audio_sample_rate: 44_100,
        audio_channel_count: 1,
        ..MuxerOptions::default()
    }
}

fn prepared(options: MuxerOptions) -> FormatContext<Vec<u8>> {
    let mut muxer = FormatContext::with_options(options).unwrap();
    muxer.prepare(Vec::new()).unwrap();
    muxer
}

fn parse(output: &[u8]) -> (FlvHeader, Vec<FlvTag>) {
    FlvParser::parse_bytes(output, PrevTagSizeMode::Strict).unwrap()
}

fn metadata(tag: &FlvTag) -> ScriptData {
    assert!(tag.is_script_tag());
    tag.decode_script().unwrap()
}

/// Describes each tag as (kind, timestamp) for order assertions.
fn layout(tags: &[FlvTag]) -> Vec<(&'static str, u32)> {
    tags.iter()
        .map(|tag| {
            let kind = if tag.is_script_tag() {
                "script"
            } else if tag.is_video_sequence_header() {
                "video-config"
            } else if tag.is_audio_sequence_header() {
                "audio-config"
            } else if tag.is_video_tag() && tag.is_key_frame() {
                "video-key"
            } else if tag.is_video_tag() {
                "video"
            } else {
                "audio"
            };
            (kind, tag.timestamp_ms)
        })
        .collect()
}

#[test]
fn test_first_access_units_layout() {
    let mut muxer = prepared(options_1280x720());
    assert_eq!(muxer.state(), MuxerState::Prepared);

    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 0))
        .unwrap();
    muxer.write_access_unit(AccessUnit::audio(AAC_FRAME, 0)).unwrap();
    assert_eq!(muxer.state(), MuxerState::Muxing);
    muxer.finalize().unwrap();
    assert_eq!(muxer.state(), MuxerState::Finalized);

    let output = muxer.into_sink().unwrap();
    assert_eq!(&output[..3], b"FLV");
    assert_eq!(output[3], 1);
    assert_eq!(output[4], 0x05);
    assert_eq!(&output[5..9], &[0, 0, 0, 9]);

    let (header, tags) = parse(&output);
    assert!(header.has_audio && header.has_video);
    assert_eq!(
        layout(&tags),
        vec![
            ("script", 0),
            ("video-config", 0),
            ("audio-config", 0),
            ("video-key", 0),
            ("audio", 0),
        ]
    );

    assert_eq!(&tags[2].data[..], &[0xAF, 0x00, 0x12, 0x08]);
    assert_eq!(&tags[4].data[2..], AAC_FRAME);

    let script = metadata(&tags[0]);
    assert_eq!(script.name, "onMetaData");
    assert_eq!(script.number("width"), Some(1280.0));
    assert_eq!(script.number("height"), Some(720.0));
    assert_eq!(script.number("framerate"), Some(30.0));
    assert_eq!(script.number("audiosamplerate"), Some(44_100.0));
    assert_eq!(script.number("videocodecid"), Some(7.0));
    assert_eq!(script.number("audiocodecid"), Some(10.0));
}

#[test]
fn test_tag_sizes_add_up() {
    let mut muxer = prepared(MuxerOptions::default());
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 0))
        .unwrap();
    for i in 1..10u64 {
        muxer
            .write_access_unit(AccessUnit::video(&annex_b(&[P_SLICE]), i * 33))
            .unwrap();
        muxer
            .write_access_unit(AccessUnit::audio(AAC_FRAME, i * 23))
            .unwrap();
    }
    muxer.finalize().unwrap();

    let stats = *muxer.stats();
    let output = muxer.into_sink().unwrap();
    let (_, tags) = parse(&output);

    let tags_len: usize = tags.iter().map(|tag| tag.size() + 4).sum();
    assert_eq!(9 + 4 + tags_len, output.len());
    assert_eq!(stats.bytes_written, output.len() as u64);
    assert_eq!(stats.tags_written, tags.len() as u64);
    assert_eq!(stats.video.frames, 10);
    assert_eq!(stats.video.key_frames, 1);
    assert_eq!(stats.audio.frames, 9);
    assert_eq!(stats.duration_ms(), 297);
}

#[test]
fn test_finalize_patches_metadata() {
    let mut muxer = prepared(MuxerOptions::default());
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 0))
        .unwrap();
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[P_SLICE]), 1500))
        .unwrap();
    muxer.finalize().unwrap();

    let output = muxer.into_sink().unwrap();
    let (_, tags) = parse(&output);
    let script = metadata(&tags[0]);
    assert_eq!(script.number("duration"), Some(1.5));
    assert_eq!(script.number("filesize"), Some(output.len() as f64));
}

#[test]
fn test_finalize_patches_after_existing_data() {
    let mut cursor = io::Cursor::new(b"leading bytes".to_vec());
    cursor.set_position(13);

    let mut muxer = FormatContext::with_options(MuxerOptions::default()).unwrap();
    muxer.prepare(SeekableSink::new(cursor)).unwrap();
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 0))
        .unwrap();
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[P_SLICE]), 2000))
        .unwrap();
    muxer.finalize().unwrap();

    let written = muxer.into_sink().unwrap().into_inner().into_inner();
    assert_eq!(&written[..13], b"leading bytes");
    let output = &written[13..];
    let (_, tags) = parse(output);
    let script = metadata(&tags[0]);
    assert_eq!(script.number("duration"), Some(2.0));
    assert_eq!(script.number("filesize"), Some(output.len() as f64));
}

#[test]
fn test_finalize_without_patch_support() {
    let mut muxer = FormatContext::with_options(MuxerOptions::default()).unwrap();
    muxer.prepare(WriteSink::new(Vec::new())).unwrap();
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 0))
        .unwrap();
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[P_SLICE]), 1500))
        .unwrap();
    muxer.finalize().unwrap();
    assert_eq!(muxer.state(), MuxerState::Finalized);

    let output = muxer.into_sink().unwrap().into_inner();
    let (_, tags) = parse(&output);
    assert_eq!(metadata(&tags[0]).number("duration"), Some(0.0));
    assert_eq!(metadata(&tags[0]).number("filesize"), Some(0.0));
}

#[test]
fn test_second_finalize_writes_nothing() {
    let mut muxer = prepared(MuxerOptions::default());
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 0))
        .unwrap();
    muxer.finalize().unwrap();
    let written = muxer.stats().bytes_written;
    let len = muxer.sink().unwrap().len();

    muxer.finalize().unwrap();
    assert_eq!(muxer.stats().bytes_written, written);
    assert_eq!(muxer.sink().unwrap().len(), len);

    assert!(matches!(
        muxer.write_access_unit(AccessUnit::video(&annex_b(&[P_SLICE]), 40)),
        Err(MuxError::InvalidState {
            state: MuxerState::Finalized,
            ..
        })
    ));
}

#[test]
fn test_finalize_right_after_prepare() {
    let mut muxer = prepared(MuxerOptions::default());
    muxer.finalize().unwrap();

    let output = muxer.into_sink().unwrap();
    let (_, tags) = parse(&output);
    assert_eq!(layout(&tags), vec![("script", 0)]);
}

#[test]
fn test_video_only_output() {
    let mut muxer = prepared(MuxerOptions::video_only());
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 0))
        .unwrap();
    assert!(matches!(
        muxer.write_access_unit(AccessUnit::audio(AAC_FRAME, 0)),
        Err(MuxError::InvalidState { .. })
    ));
    assert!(matches!(
        muxer.write_audio_header(&[0x12, 0x08]),
        Err(MuxError::InvalidState { .. })
    ));
    muxer.finalize().unwrap();

    let output = muxer.into_sink().unwrap();
    assert_eq!(output[4], 0x01);
    let (_, tags) = parse(&output);
    assert_eq!(
        layout(&tags),
        vec![("script", 0), ("video-config", 0), ("video-key", 0)]
    );

    let script = metadata(&tags[0]);
    assert!(script.number("width").is_some());
    assert!(script.number("audiocodecid").is_none());
}

#[test]
fn test_audio_only_output() {
    let mut muxer = prepared(MuxerOptions::audio_only());
    muxer.write_access_unit(AccessUnit::audio(AAC_FRAME, 0)).unwrap();
    muxer.write_access_unit(AccessUnit::audio(AAC_FRAME, 23)).unwrap();
    assert!(matches!(
        muxer.write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 0)),
        Err(MuxError::InvalidState { .. })
    ));
    muxer.finalize().unwrap();

    let output = muxer.into_sink().unwrap();
    assert_eq!(output[4], 0x04);
    let (_, tags) = parse(&output);
    assert_eq!(
        layout(&tags),
        vec![("script", 0), ("audio-config", 0), ("audio", 0), ("audio", 23)]
    );
    assert!(metadata(&tags[0]).number("width").is_none());
}

#[test]
fn test_configuration_record_round_trip() {
    let mut muxer = prepared(MuxerOptions::video_only());
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 0))
        .unwrap();
    let written = muxer.video_config_record().cloned().unwrap();

    let output = muxer.into_sink().unwrap();
    let (_, tags) = parse(&output);
    let body = tags[1].data.slice(5..);
    let record = AVCDecoderConfigurationRecord::parse(&mut io::Cursor::new(body)).unwrap();

    assert_eq!(record, written);
    assert_eq!(record.sps, vec![Bytes::from_static(SPS)]);
    assert_eq!(record.pps, vec![Bytes::from_static(PPS)]);
    assert_eq!(record.profile_indication, SPS[1]);
    assert_eq!(record.profile_compatibility, SPS[2]);
    assert_eq!(record.level_indication, SPS[3]);
    assert_eq!(record.length_size_minus_one, 3);

    // data tags carry 4-byte NAL lengths
    let data = &tags[2].data[5..];
    assert_eq!(&data[..4], &(SPS.len() as u32).to_be_bytes());
    assert_eq!(&data[4..4 + SPS.len()], SPS);
}

#[test]
fn test_malformed_unit_keeps_state() {
    let mut muxer = prepared(MuxerOptions::video_only());

    let err = muxer
        .write_access_unit(AccessUnit::video(IDR, 0))
        .unwrap_err();
    assert!(matches!(err, MuxError::MalformedAccessUnit(_)));
    assert!(!err.is_fatal());
    assert_eq!(muxer.state(), MuxerState::Prepared);

    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 0))
        .unwrap();
    let before = muxer.stats().bytes_written;

    let err = muxer
        .write_access_unit(AccessUnit::video(&[0x41, 0x9A, 0x02], 33))
        .unwrap_err();
    assert!(matches!(err, MuxError::MalformedAccessUnit(_)));
    assert_eq!(muxer.state(), MuxerState::Muxing);
    assert_eq!(muxer.stats().bytes_written, before);

    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[P_SLICE]), 33))
        .unwrap();
    muxer.finalize().unwrap();

    let (_, tags) = parse(&muxer.into_sink().unwrap());
    assert_eq!(tags.len(), 4);
}

#[test]
fn test_first_video_unit_requirements() {
    let mut muxer = prepared(MuxerOptions::video_only());

    let err = muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[IDR]), 0))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "malformed access unit: missing parameter sets before first keyframe"
    );

    let err = muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, P_SLICE]), 0))
        .unwrap_err();
    assert!(matches!(err, MuxError::MalformedAccessUnit(_)));

    assert_eq!(muxer.stats().tags_written, 1);
    assert_eq!(muxer.state(), MuxerState::Prepared);
}

#[test]
fn test_decreasing_timestamps_rejected() {
    let mut muxer = prepared(MuxerOptions::default());
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 100))
        .unwrap();
    muxer.write_access_unit(AccessUnit::audio(AAC_FRAME, 50)).unwrap();

    assert!(matches!(
        muxer.write_access_unit(AccessUnit::video(&annex_b(&[P_SLICE]), 99)),
        Err(MuxError::MalformedAccessUnit(_))
    ));
    assert!(matches!(
        muxer.write_access_unit(AccessUnit::audio(AAC_FRAME, 49)),
        Err(MuxError::MalformedAccessUnit(_))
    ));

    // tracks are independent
    muxer.write_access_unit(AccessUnit::audio(AAC_FRAME, 60)).unwrap();
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[P_SLICE]), 100))
        .unwrap();
}

#[test]
fn test_composition_time() {
    let mut muxer = prepared(MuxerOptions::video_only());
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 66).with_dts(0))
        .unwrap();
    assert!(matches!(
        muxer.write_access_unit(AccessUnit::video(&annex_b(&[P_SLICE]), 10).with_dts(33)),
        Err(MuxError::MalformedAccessUnit(_))
    ));

    let (_, tags) = parse(&muxer.into_sink().unwrap());
    assert_eq!(tags[2].timestamp_ms, 0);
    assert_eq!(&tags[2].data[..5], &[0x17, 0x01, 0, 0, 66]);
}

#[test]
fn test_microsecond_timestamps() {
    let options = MuxerOptions {
        timestamp_unit: TimestampUnit::Microseconds,
        ..MuxerOptions::default()
    };
    let mut muxer = prepared(options);
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 0))
        .unwrap();
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[P_SLICE]), 33_366))
        .unwrap();
    muxer
        .write_access_unit(AccessUnit::audio(AAC_FRAME, 46_439))
        .unwrap();

    let (_, tags) = parse(&muxer.into_sink().unwrap());
    let timestamps: Vec<_> = tags.iter().map(|t| t.timestamp_ms).collect();
    assert_eq!(timestamps, vec![0, 0, 0, 0, 33, 46]);
}

#[test]
fn test_timestamp_range() {
    let mut muxer = prepared(MuxerOptions::audio_only());
    assert!(matches!(
        muxer.write_access_unit(AccessUnit::audio(AAC_FRAME, u64::from(u32::MAX) + 1)),
        Err(MuxError::MalformedAccessUnit(_))
    ));
    muxer
        .write_access_unit(AccessUnit::audio(AAC_FRAME, u64::from(u32::MAX)))
        .unwrap();

    let (_, tags) = parse(&muxer.into_sink().unwrap());
    assert_eq!(tags[2].timestamp_ms, u32::MAX);
}

#[test]
fn test_adts_input() {
    let options = MuxerOptions {
        audio_sample_rate: 48_000,
        audio_channel_count: 2,
        ..MuxerOptions::audio_only()
    };
    let mut muxer = prepared(options);

    // two ADTS frames, AAC-LC 48 kHz stereo, 2 payload bytes each
    let adts = [
        0xFF, 0xF1, 0x4C, 0x80, 0x01, 0x3F, 0xFC, 0x21, 0x10, //
        0xFF, 0xF1, 0x4C, 0x80, 0x01, 0x3F, 0xFC, 0x21, 0x20,
    ];
    muxer.write_access_unit(AccessUnit::audio(&adts, 0)).unwrap();

    // 44.1 kHz frames do not match the track
    let other = [0xFF, 0xF1, 0x50, 0x80, 0x01, 0x3F, 0xFC, 0x21, 0x00];
    assert!(matches!(
        muxer.write_access_unit(AccessUnit::audio(&other, 100)),
        Err(MuxError::UnsupportedFormat(_))
    ));

    // the second frame packs two raw data blocks, so none of the unit is written
    let multi_block = [
        0xFF, 0xF1, 0x4C, 0x80, 0x01, 0x3F, 0xFC, 0x21, 0x30, //
        0xFF, 0xF1, 0x4C, 0x80, 0x01, 0x3F, 0xFD, 0x21, 0x40,
    ];
    assert!(matches!(
        muxer.write_access_unit(AccessUnit::audio(&multi_block, 100)),
        Err(MuxError::UnsupportedFormat(_))
    ));
    assert_eq!(muxer.state(), MuxerState::Muxing);

    let (_, tags) = parse(&muxer.into_sink().unwrap());
    assert_eq!(
        layout(&tags),
        vec![("script", 0), ("audio-config", 0), ("audio", 0), ("audio", 21)]
    );
    assert_eq!(&tags[1].data[2..], &[0x11, 0x90]);
    assert_eq!(&tags[2].data[..], &[0xAF, 0x01, 0x21, 0x10]);
    assert_eq!(&tags[3].data[..], &[0xAF, 0x01, 0x21, 0x20]);
}

#[test]
fn test_codec_config_buffers() {
    let mut muxer = prepared(MuxerOptions::default());

    let config = annex_b(&[SPS, PPS]);
    muxer
        .write_access_unit(
            AccessUnit::from_buffer(
                &config,
                0,
                config.len(),
                TrackKind::Video,
                AccessUnitFlags::CODEC_CONFIG,
                0,
            )
            .unwrap(),
        )
        .unwrap();
    muxer
        .write_access_unit(
            AccessUnit::audio(&[0x12, 0x08], 0).with_flags(AccessUnitFlags::CODEC_CONFIG),
        )
        .unwrap();
    assert_eq!(muxer.state(), MuxerState::Muxing);
    assert_eq!(muxer.stats().tags_written, 1);

    // repeated config buffers are ignored
    muxer
        .write_access_unit(
            AccessUnit::audio(&[0x12, 0x08], 0).with_flags(AccessUnitFlags::CODEC_CONFIG),
        )
        .unwrap();

    let mut buffer = vec![0xEE; 4];
    buffer.extend(annex_b(&[IDR]));
    let unit = AccessUnit::from_buffer(
        &buffer,
        4,
        buffer.len() - 4,
        TrackKind::Video,
        AccessUnitFlags::KEY_FRAME,
        0,
    )
    .unwrap();
    muxer.write_access_unit(unit).unwrap();
    muxer.write_access_unit(AccessUnit::audio(AAC_FRAME, 0)).unwrap();

    let (_, tags) = parse(&muxer.into_sink().unwrap());
    assert_eq!(
        layout(&tags),
        vec![
            ("script", 0),
            ("video-config", 0),
            ("audio-config", 0),
            ("video-key", 0),
            ("audio", 0),
        ]
    );
    // the data tag holds only the IDR slice
    let payload = &tags[3].data[5..];
    assert_eq!(&payload[..4], &(IDR.len() as u32).to_be_bytes());
    assert_eq!(&payload[4..], IDR);
}

#[test]
fn test_explicit_headers() {
    let mut muxer = prepared(MuxerOptions::default());
    muxer.write_video_header(&annex_b(&[SPS, PPS])).unwrap();
    assert!(matches!(
        muxer.write_video_header(&annex_b(&[SPS, PPS])),
        Err(MuxError::InvalidState { .. })
    ));

    assert!(matches!(
        muxer.write_audio_header(&[0x11, 0x90]),
        Err(MuxError::UnsupportedFormat(_))
    ));
    muxer.write_audio_header(&[0x12, 0x08]).unwrap();
    assert!(matches!(
        muxer.write_audio_header(&[0x12, 0x08]),
        Err(MuxError::InvalidState { .. })
    ));

    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[IDR]), 0))
        .unwrap();
    assert_eq!(muxer.audio_specific_config(), Some(&[0x12, 0x08][..]));
    assert_eq!(
        muxer.video_config_record().map(|r| r.sps.clone()),
        Some(vec![Bytes::from_static(SPS)])
    );
}

#[test]
fn test_explicit_header_after_capture() {
    let mut muxer = prepared(MuxerOptions::default());
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS]), 0))
        .unwrap();
    assert!(matches!(
        muxer.write_video_header(&annex_b(&[SPS, PPS])),
        Err(MuxError::InvalidState { .. })
    ));

    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[IDR]), 0))
        .unwrap();
    // the audio sequence header went out with the video one
    assert!(matches!(
        muxer.write_audio_header(&[0x12, 0x08]),
        Err(MuxError::InvalidState { .. })
    ));
}

#[test]
fn test_audio_before_video() {
    let mut muxer = prepared(MuxerOptions::default());
    muxer.write_access_unit(AccessUnit::audio(AAC_FRAME, 0)).unwrap();
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 10))
        .unwrap();

    let (_, tags) = parse(&muxer.into_sink().unwrap());
    assert_eq!(
        layout(&tags),
        vec![
            ("script", 0),
            ("audio-config", 0),
            ("audio", 0),
            ("video-config", 10),
            ("video-key", 10),
        ]
    );
}

#[test]
fn test_grouped_headers_precede_audio_data() {
    let mut muxer = prepared(MuxerOptions::default());
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 40))
        .unwrap();
    muxer.write_access_unit(AccessUnit::audio(AAC_FRAME, 0)).unwrap();
    muxer.finalize().unwrap();

    let (_, tags) = parse(&muxer.into_sink().unwrap());
    assert_eq!(
        layout(&tags),
        vec![
            ("script", 0),
            ("video-config", 0),
            ("audio-config", 0),
            ("video-key", 40),
            ("audio", 0),
        ]
    );
}

#[test]
fn test_grouped_headers_precede_video_data() {
    let mut muxer = prepared(MuxerOptions::default());
    muxer.write_video_header(&annex_b(&[SPS, PPS])).unwrap();
    muxer.write_access_unit(AccessUnit::audio(AAC_FRAME, 100)).unwrap();
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[IDR]), 0))
        .unwrap();
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[P_SLICE]), 33))
        .unwrap();

    let (_, tags) = parse(&muxer.into_sink().unwrap());
    assert_eq!(
        layout(&tags),
        vec![
            ("script", 0),
            ("video-config", 0),
            ("audio-config", 0),
            ("audio", 100),
            ("video-key", 0),
            ("video", 33),
        ]
    );

    // every track's sequence header is no later than its first frame
    for (config, data) in [("video-config", "video-key"), ("audio-config", "audio")] {
        let config_ms = layout(&tags).iter().find(|(k, _)| *k == config).map(|(_, ts)| *ts);
        let first_ms = layout(&tags).iter().find(|(k, _)| *k == data).map(|(_, ts)| *ts);
        assert!(config_ms.unwrap() <= first_ms.unwrap(), "{config} after {data}");
    }
}

#[test]
fn test_call_order() {
    let mut muxer: FormatContext<Vec<u8>> = FormatContext::new();
    assert_eq!(muxer.state(), MuxerState::Unconfigured);

    assert!(matches!(
        muxer.write_access_unit(AccessUnit::audio(AAC_FRAME, 0)),
        Err(MuxError::InvalidState {
            state: MuxerState::Unconfigured,
            ..
        })
    ));
    assert!(matches!(muxer.finalize(), Err(MuxError::InvalidState { .. })));
    assert!(matches!(
        muxer.write_video_header(&annex_b(&[SPS, PPS])),
        Err(MuxError::InvalidState { .. })
    ));

    assert!(matches!(
        muxer.set_options(MuxerOptions {
            audio_sample_rate: 12_345,
            ..MuxerOptions::default()
        }),
        Err(MuxError::UnsupportedFormat(_))
    ));
    muxer.set_options(MuxerOptions::video_only()).unwrap();
    muxer.set_options(options_1280x720()).unwrap();
    assert_eq!(muxer.options().video_width, 1280);

    muxer.prepare(Vec::new()).unwrap();
    assert!(matches!(
        muxer.prepare(Vec::new()),
        Err(MuxError::InvalidState {
            operation: "prepare",
            state: MuxerState::Prepared
        })
    ));
    assert!(matches!(
        muxer.set_options(MuxerOptions::default()),
        Err(MuxError::InvalidState { .. })
    ));
}

/// Accepts `limit` bytes, then fails every write.
struct FailingSink {
    written: Vec<u8>,
    limit: usize,
}

impl OutputSink for FailingSink {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.written.len() + buf.len() > self.limit {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"));
        }
        self.written.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_sink_failure_is_terminal() {
    let mut muxer = FormatContext::with_options(MuxerOptions::default()).unwrap();
    muxer
        .prepare(FailingSink {
            written: Vec::new(),
            limit: 1024,
        })
        .unwrap();

    let mut large_idr = IDR.to_vec();
    large_idr.resize(2048, 0x55);
    let err = muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, &large_idr]), 0))
        .unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(muxer.state(), MuxerState::Failed);
    let MuxError::SinkIo(first) = err else {
        panic!("expected a sink error");
    };
    assert_eq!(first.kind(), io::ErrorKind::BrokenPipe);

    let again = [
        muxer.write_access_unit(AccessUnit::audio(AAC_FRAME, 0)),
        muxer.write_video_header(&annex_b(&[SPS, PPS])),
        muxer.finalize(),
        muxer.set_options(MuxerOptions::default()),
    ];
    for result in again {
        let Err(MuxError::SinkIo(err)) = result else {
            panic!("expected the stored sink error");
        };
        assert!(Arc::ptr_eq(&err, &first));
    }

    let sink = muxer.into_sink().unwrap();
    let (_, tags) = parse(&sink.written);
    assert_eq!(tags.len(), 1);
}

#[test]
fn test_prepare_failure() {
    let mut muxer = FormatContext::with_options(MuxerOptions::default()).unwrap();
    let err = muxer
        .prepare(FailingSink {
            written: Vec::new(),
            limit: 8,
        })
        .unwrap_err();
    assert!(matches!(err, MuxError::SinkIo(_)));
    assert_eq!(muxer.state(), MuxerState::Failed);
    assert!(matches!(muxer.finalize(), Err(MuxError::SinkIo(_))));
}

#[test]
fn test_file_sink() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.flv");

    let mut muxer = FormatContext::with_options(MuxerOptions::default()).unwrap();
    muxer.prepare(FileSink::create(&path).unwrap()).unwrap();
    muxer
        .write_access_unit(AccessUnit::video(&annex_b(&[SPS, PPS, IDR]), 0))
        .unwrap();
    for i in 1..=30u64 {
        muxer
            .write_access_unit(AccessUnit::video(&annex_b(&[P_SLICE]), i * 33))
            .unwrap();
    }
    muxer.finalize().unwrap();
    drop(muxer);

    let mut tags = Vec::new();
    let header = FlvParser::parse_file(&path, PrevTagSizeMode::Strict, |tag, _| {
        tags.push(tag.clone())
    })
    .unwrap();
    assert!(header.has_video && header.has_audio);
    // metadata, both sequence headers and 31 frames
    assert_eq!(tags.len(), 34);

    let script = metadata(&tags[0]);
    assert_eq!(script.number("duration"), Some(0.99));
    assert_eq!(
        script.number("filesize"),
        Some(std::fs::metadata(&path).unwrap().len() as f64)
    );
}
