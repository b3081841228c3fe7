#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]

mod cli;
mod commands;
mod error;
mod input;

use std::process;

use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, Commands},
    commands::InspectReport,
    error::Result,
};

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args) {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Commands::Mux(mux_args) => {
            let report = commands::mux(&mux_args)?;
            let stats = report.stats;
            info!(
                output = %mux_args.output.display(),
                bytes = stats.bytes_written,
                tags = stats.tags_written,
                video_frames = stats.video.frames,
                audio_frames = stats.audio.frames,
                skipped = report.skipped,
                duration_ms = stats.duration_ms(),
                "done"
            );
        }
        Commands::Inspect { input, json } => {
            let report = commands::inspect(&input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
    }
    Ok(())
}

fn print_report(report: &InspectReport) {
    println!("video: {}  audio: {}", report.has_video, report.has_audio);
    println!(
        "tags: {} (script {}, video {}, audio {})",
        report.tags, report.script_tags, report.video_tags, report.audio_tags
    );
    println!("keyframes: {}", report.key_frames);
    println!("last timestamp: {} ms", report.last_timestamp_ms);
    if let Some(duration) = report.duration {
        println!("duration: {duration} s");
    }
    if let Some(filesize) = report.filesize {
        println!("filesize: {filesize} bytes");
    }
    if let (Some(profile), Some(level)) = (report.avc_profile, report.avc_level) {
        println!("h264: profile {profile}, level {level}");
    }
    if let (Some(rate), Some(channels)) = (report.aac_sample_rate, report.aac_channels) {
        println!("aac: {rate} Hz, {channels} channel(s)");
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
