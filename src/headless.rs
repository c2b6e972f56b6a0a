use std::collections::VecDeque;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use image::RgbImage;

use crate::error::{Result, SenseError};
use crate::host::{DataChannel, DetailFrame, Host, HostEvent};
use crate::raster::Raster;

/// Heartbeats emitted once the script runs dry, giving workers time to
/// confirm their last seek before the host shuts down.
pub const SETTLE_TICKS: u32 = 4;
const DEFAULT_TICK: Duration = Duration::from_millis(50);

pub struct HeadlessHost {
    script: VecDeque<HostEvent>,
    settle_ticks: u32,
    tick: Duration,
    grant_resize: bool,
    snapshot: Option<PathBuf>,
    capture: bool,
    last_frame: Option<RgbImage>,
    presents: usize,
    resizes: Vec<(u32, u32)>,
    frames_tx: Sender<DetailFrame>,
    frames_rx: Receiver<DetailFrame>,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl HeadlessHost {
    pub fn new(script: Vec<HostEvent>) -> Self {
        let (frames_tx, frames_rx) = async_channel::unbounded();
        Self {
            script: script.into(),
            settle_ticks: SETTLE_TICKS,
            tick: DEFAULT_TICK,
            grant_resize: true,
            snapshot: None,
            capture: false,
            last_frame: None,
            presents: 0,
            resizes: Vec::new(),
            frames_tx,
            frames_rx,
        }
    }

    pub fn with_snapshot(mut self, path: Option<PathBuf>) -> Self {
        self.capture |= path.is_some();
        self.snapshot = path;
        self
    }

    #[cfg(test)]
    pub fn capture_frames(mut self) -> Self {
        self.capture = true;
        self
    }

    #[cfg(test)]
    pub fn with_settle(mut self, ticks: u32, tick: Duration) -> Self {
        self.settle_ticks = ticks;
        self.tick = tick;
        self
    }

    #[cfg(test)]
    pub fn deny_resize(mut self) -> Self {
        self.grant_resize = false;
        self
    }

    #[cfg(test)]
    pub fn presents(&self) -> usize {
        self.presents
    }

    #[cfg(test)]
    pub fn resizes(&self) -> &[(u32, u32)] {
        &self.resizes
    }

    #[cfg(test)]
    pub fn last_frame(&self) -> Option<&RgbImage> {
        self.last_frame.as_ref()
    }

    /// Detail frames published since the last call.
    pub fn drain_frames(&self) -> Vec<DetailFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.frames_rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Writes the last presented raster to the snapshot path, if any. The
    /// path's extension picks the format (`.png`, `.ppm`).
    pub fn finish(&self) -> Result<()> {
        let frames = self.drain_frames();
        log::info!(
            "{} presents, {} resizes, {} detail frames",
            self.presents,
            self.resizes.len(),
            frames.len()
        );

        let (Some(path), Some(frame)) = (&self.snapshot, &self.last_frame) else {
            return Ok(());
        };
        frame.save(path).map_err(|source| SenseError::Snapshot {
            path: path.clone(),
            source,
        })?;
        log::info!("wrote preview snapshot to {}", path.display());
        Ok(())
    }
}

impl Host for HeadlessHost {
    fn pump(&mut self, block: bool, events: &mut Vec<HostEvent>) -> bool {
        if !block {
            return true;
        }
        if let Some(event) = self.script.pop_front() {
            events.push(event);
            return true;
        }
        if self.settle_ticks > 0 {
            self.settle_ticks -= 1;
            thread::sleep(self.tick);
            events.push(HostEvent::Tick);
            return true;
        }
        false
    }

    fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.grant_resize {
            self.resizes.push((width, height));
        }
        self.grant_resize
    }

    fn present(&mut self, raster: &Raster) {
        self.presents += 1;
        if self.capture {
            self.last_frame = Some(raster.to_rgb_image());
        }
    }

    fn open_channel(&mut self, name: &str, base: usize) -> Result<Box<dyn DataChannel>> {
        if base == 0 {
            return Err(SenseError::ChannelRejected {
                name: name.to_string(),
            });
        }
        Ok(Box::new(LogChannel {
            name: name.to_string(),
            size: base * base,
            frames: self.frames_tx.clone(),
        }))
    }

    fn request_clock(&mut self, hz: u32) {
        log::debug!("headless host ignores {} Hz clock, ticks only while settling", hz);
    }
}

/// Logs every published frame and forwards it to the host.
struct LogChannel {
    name: String,
    size: usize,
    frames: Sender<DetailFrame>,
}

impl DataChannel for LogChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> usize {
        self.size
    }

    fn publish(&mut self, frame: &DetailFrame) -> Result<()> {
        log::info!(
            "{} (window {}): offset {:#x}, {} samples, {} distinct values, entropy {:.3} bits/byte",
            self.name,
            frame.window_id,
            frame.offset,
            frame.bytes.len(),
            frame.histogram.distinct(),
            frame.entropy
        );
        // host may already be gone during teardown
        let _ = self.frames.try_send(frame.clone());
        Ok(())
    }
}
