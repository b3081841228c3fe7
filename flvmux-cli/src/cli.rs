use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Flvmux - mux raw H.264 and AAC elementary streams into FLV files
#[derive(Parser, Debug)]
#[command(name = "flvmux", author, version, about, long_about = None)]
#[command(propagate_version = true, arg_required_else_help = true)]
pub struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mux an Annex-B H.264 stream and/or an ADTS AAC stream into FLV
    #[command(alias = "m")]
    Mux(MuxArgs),

    /// List the tags of an FLV file
    #[command(alias = "i")]
    Inspect {
        /// FLV file to read
        input: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct MuxArgs {
    /// Annex-B H.264 elementary stream
    #[arg(long)]
    pub video: Option<PathBuf>,

    /// ADTS AAC elementary stream
    #[arg(long)]
    pub audio: Option<PathBuf>,

    /// Output FLV file
    #[arg(short, long)]
    pub output: PathBuf,

    /// JSON muxer options, e.g. {"videoWidth": 1280, "videoHeight": 720}
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Video width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Video height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Video frame rate, also used to stamp the video access units
    #[arg(long)]
    pub fps: Option<u32>,

    /// Video bit rate in bits per second
    #[arg(long)]
    pub video_bitrate: Option<u32>,

    /// Audio sample rate in Hz (read from the ADTS headers by default)
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Audio channel count (read from the ADTS headers by default)
    #[arg(long)]
    pub channels: Option<u8>,

    /// Audio bit rate in bits per second
    #[arg(long)]
    pub audio_bitrate: Option<u32>,
}
