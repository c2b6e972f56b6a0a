mod channel;
mod config;
mod coordinator;
mod dispatch;
mod error;
mod file_view;
mod geometry;
#[cfg(feature = "gui")]
mod gtk_host;
mod headless;
mod histogram;
mod host;
mod raster;
mod render;
mod tracker;
mod worker;

use std::process::ExitCode;
use std::sync::Arc;

use config::{Args, Config};
use coordinator::Coordinator;
use error::Result;
use file_view::FileView;
use headless::HeadlessHost;
use host::HostEvent;

fn main() -> ExitCode {
    // RUST_LOG=debug for seek and channel traffic
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = match Args::try_parse_with_help(std::env::args_os()) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sense_file: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = Config::from_args(args)?;
    let view = Arc::new(FileView::open(&config.path)?);

    log::info!(
        "mapped {} ({} bytes), preview {}x{}, {} bytes per pixel",
        config.path.display(),
        view.len(),
        config.geometry.width,
        config.geometry.height,
        config.geometry.step_size(view.len())
    );

    if run_interactive(&config, &view)? {
        return Ok(());
    }

    let script = seek_script(&config, view.len());
    let host = HeadlessHost::new(script).with_snapshot(config.snapshot.clone());
    let mut coordinator = Coordinator::new(host, view, &config)?;
    coordinator.run()?;
    coordinator.host().finish()
}

/// Runs the GTK host unless headless options were given.
#[cfg(feature = "gui")]
fn run_interactive(config: &Config, view: &Arc<FileView>) -> Result<bool> {
    if config.snapshot.is_some() || !config.seeks.is_empty() {
        return Ok(false);
    }
    let host = gtk_host::GtkHost::connect(&config.path)?;
    let mut coordinator = Coordinator::new(host, Arc::clone(view), config)?;
    coordinator.run()?;
    Ok(true)
}

#[cfg(not(feature = "gui"))]
fn run_interactive(_config: &Config, _view: &Arc<FileView>) -> Result<bool> {
    Ok(false)
}

/// Turns `--seek` offsets into clicks on the preview surface.
fn seek_script(config: &Config, len: u64) -> Vec<HostEvent> {
    let geometry = config.geometry;
    let mut script = Vec::new();

    for &offset in &config.seeks {
        let (col, row) = geometry.coord_of(offset, len);
        if row >= u64::from(geometry.height) {
            log::warn!("seek {:#x} lies outside the preview, skipped", offset);
            continue;
        }
        let (x, y) = (col as u32, row as u32);
        script.push(HostEvent::Pointer {
            x,
            y,
            pressed: true,
            clicks: 1,
        });
        script.push(HostEvent::Pointer {
            x,
            y,
            pressed: false,
            clicks: 1,
        });
    }
    script
}
