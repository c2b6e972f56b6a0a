use clap::{Arg, ArgAction, CommandFactory, FromArgMatches, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::Result;
use crate::geometry::ViewportGeometry;
use crate::render::{sanitize_cutoff, RenderSettings, FRAME_BUDGET};
use crate::worker::WorkerSettings;

#[derive(Parser, Debug)]
#[command(name = "sense_file")]
#[command(about = "Render a file as a scannable preview with detail windows")]
#[command(disable_help_flag = true)]
pub struct Args {
    /// File to map (regular, non-empty)
    pub file: PathBuf,

    /// Enable wrapping at EOF
    #[arg(short = 'W', long)]
    pub wrap: bool,

    /// Preview window width
    #[arg(short = 'w', long, default_value_t = 128)]
    pub width: u32,

    /// Preview window height
    #[arg(short = 'h', long, default_value_t = 512)]
    pub height: u32,

    /// Histogram row-row comparison in preview, value (0.0 - 1.0) sets cutoff level
    #[arg(short = 'p', long = "pcomp", value_parser = parse_cutoff)]
    pub cutoff: Option<f32>,

    /// Use entire data range for the row comparison
    #[arg(short = 'd', long = "pdetail")]
    pub detailed: bool,

    /// Detail window side in pixels
    #[arg(short = 'b', long, default_value_t = 256)]
    pub base: usize,

    /// Bytes between two samples in a detail window
    #[arg(long, default_value_t = 1)]
    pub step: usize,

    /// Write the final preview as a PPM image (headless)
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Seek the detail window to this byte offset (headless, repeatable)
    #[arg(long = "seek")]
    pub seeks: Vec<u64>,
}

impl Args {
    /// `-h` is taken by `--height`, so help is only offered as `--help`.
    pub fn command_with_help() -> clap::Command {
        Self::command().arg(
            Arg::new("help")
                .long("help")
                .help("Print help")
                .action(ArgAction::Help),
        )
    }

    pub fn try_parse_with_help<I, T>(argv: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command_with_help().try_get_matches_from(argv)?;
        Self::from_arg_matches(&matches)
    }
}

/// Never fails: anything outside (0, 1] falls back to the default cutoff.
fn parse_cutoff(value: &str) -> std::result::Result<f32, String> {
    let parsed = leading_float(value).unwrap_or(f32::NAN);
    let cutoff = sanitize_cutoff(parsed);
    if cutoff != parsed {
        log::warn!("invalid cutoff {:?}, using {}", value, cutoff);
    }
    Ok(cutoff)
}

/// Longest prefix of `value` that reads as a number, so `0.5x` is 0.5.
fn leading_float(value: &str) -> Option<f32> {
    let value = value.trim_start();
    value
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .rev()
        .find_map(|end| value[..end].parse::<f32>().ok())
}

/// Validated startup configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub geometry: ViewportGeometry,
    pub render: RenderSettings,
    pub worker: WorkerSettings,
    pub base: usize,
    pub snapshot: Option<PathBuf>,
    pub seeks: Vec<u64>,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self> {
        let geometry = ViewportGeometry::new(args.width, args.height)?;

        Ok(Self {
            path: args.file,
            geometry,
            render: RenderSettings {
                cutoff: args.cutoff,
                detailed: args.detailed,
                frame_budget: FRAME_BUDGET,
            },
            worker: WorkerSettings {
                wrap: args.wrap,
                step: args.step.max(1),
            },
            base: args.base,
            snapshot: args.snapshot,
            seeks: args.seeks,
        })
    }

    /// Defaults for `path`, as if no options were given.
    #[cfg(test)]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            geometry: ViewportGeometry {
                width: 128,
                height: 512,
            },
            render: RenderSettings::default(),
            worker: WorkerSettings::default(),
            base: 256,
            snapshot: None,
            seeks: Vec::new(),
        }
    }
}
