use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::channel::{SeekConfirmation, WorkerLink};
use crate::error::{Result, SenseError};
use crate::file_view::FileView;
use crate::histogram::Histogram;
use crate::host::{DataChannel, DetailFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Continue sampling from the start of the file past EOF.
    pub wrap: bool,
    /// Distance in bytes between two samples of the detail window.
    pub step: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self { wrap: false, step: 1 }
    }
}

pub struct WindowWorker {
    id: usize,
    view: Arc<FileView>,
    channel: Box<dyn DataChannel>,
    link: WorkerLink,
    settings: WorkerSettings,
}

impl WindowWorker {
    pub fn new(
        id: usize,
        view: Arc<FileView>,
        channel: Box<dyn DataChannel>,
        link: WorkerLink,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            id,
            view,
            channel,
            link,
            settings,
        }
    }

    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let id = self.id;
        thread::Builder::new()
            .name(format!("sense-window-{}", id))
            .spawn(move || self.run())
            .map_err(|source| SenseError::WorkerSpawn { id, source })
    }

    /// Serves requests until either end of the link goes away.
    pub fn run(mut self) {
        log::debug!(
            "window {} worker started on channel {}",
            self.id,
            self.channel.name()
        );

        while let Some(offset) = self.link.next_request() {
            let frame = self.sample(offset);
            let confirmation = SeekConfirmation {
                offset: frame.offset,
                byte_count: self.footprint(frame.offset),
            };

            if let Err(e) = self.channel.publish(&frame) {
                log::warn!("window {}: publishing frame failed: {}", self.id, e);
                break;
            }

            if !self.link.confirm(confirmation) {
                break;
            }
        }

        log::debug!("window {} worker exiting", self.id);
    }

    /// Where a request for `offset` actually lands.
    fn resolve(&self, offset: u64) -> u64 {
        let len = self.view.len();
        if self.settings.wrap {
            offset % len
        } else {
            offset.min(len - 1)
        }
    }

    /// File bytes covered by the window when positioned at `offset`.
    fn footprint(&self, offset: u64) -> usize {
        let span = self.channel.size().saturating_mul(self.settings.step.max(1));
        if self.settings.wrap {
            span
        } else {
            let available = self.view.len() - offset;
            span.min(usize::try_from(available).unwrap_or(usize::MAX))
        }
    }

    /// Resamples the region starting at `offset`.
    pub fn sample(&self, offset: u64) -> DetailFrame {
        let offset = self.resolve(offset);

        let bytes = self.view.sample(
            offset,
            self.channel.size(),
            self.settings.step,
            self.settings.wrap,
        );
        let histogram = Histogram::from_bytes(&bytes);
        let entropy = histogram.entropy();

        DetailFrame {
            window_id: self.id,
            offset,
            bytes,
            histogram,
            entropy,
        }
    }
}
