use std::sync::Arc;
use std::thread::JoinHandle;

use crate::channel::{window_link, SeekStatus, WindowLink, NOTIFY_CAPACITY, REQUEST_CAPACITY};
use crate::config::Config;
use crate::dispatch::{dispatch, Action};
use crate::error::{Result, SenseError};
use crate::file_view::FileView;
use crate::geometry::ViewportGeometry;
use crate::host::{Host, HostEvent};
use crate::raster::{Raster, OVERLAY_MASK};
use crate::render::{render, Pump, RenderSettings, ScanObserver, ScanOutcome};
use crate::tracker::RegionTracker;
use crate::worker::{WindowWorker, WorkerSettings};

const CLOCK_HZ: u32 = 1;

struct DetailWindow {
    id: usize,
    link: WindowLink,
    worker: Option<JoinHandle<()>>,
}

pub struct Coordinator<H: Host> {
    host: H,
    view: Arc<FileView>,
    name: String,
    raster: Raster,
    geometry: ViewportGeometry,
    render: RenderSettings,
    worker: WorkerSettings,
    base: usize,
    tracker: RegionTracker,
    windows: Vec<DetailWindow>,
    active: Option<usize>,
    next_id: usize,
}

#[derive(Debug, Default)]
struct Routed {
    resized: Option<ViewportGeometry>,
    spawns: Vec<u64>,
    shutdown: bool,
}

/// Routes host events while a scan holds the raster.
struct EventRouter<'a, H: Host> {
    host: &'a mut H,
    windows: &'a [DetailWindow],
    active: Option<usize>,
    geometry: ViewportGeometry,
    view_len: u64,
    events: Vec<HostEvent>,
    routed: Routed,
}

impl<'a, H: Host> EventRouter<'a, H> {
    fn route(&mut self, event: &HostEvent) {
        match dispatch(event, &self.geometry, self.view_len) {
            Action::Ignore => {}
            Action::Resize { width, height } => {
                let geometry = match ViewportGeometry::new(width, height) {
                    Ok(geometry) => geometry,
                    Err(e) => {
                        log::debug!("ignoring resize hint: {}", e);
                        return;
                    }
                };
                if self.host.resize(width, height) {
                    self.geometry = geometry;
                    self.routed.resized = Some(geometry);
                } else {
                    log::debug!("host rejected resize to {}x{}", width, height);
                }
            }
            Action::Seek { offset } => {
                let Some(window) = self.active_window() else {
                    return;
                };
                match window.link.request_seek(offset) {
                    SeekStatus::Queued => log::debug!("window {} seek to {:#x}", window.id, offset),
                    SeekStatus::Dropped => {
                        log::debug!("window {} busy, dropped seek to {:#x}", window.id, offset)
                    }
                    SeekStatus::Closed => log::debug!("window {} is gone", window.id),
                }
            }
            Action::Spawn { offset } => self.routed.spawns.push(offset),
            Action::Shutdown => self.routed.shutdown = true,
        }
    }

    fn route_all(&mut self, events: &[HostEvent]) {
        for event in events {
            self.route(event);
        }
    }

    fn active_window(&self) -> Option<&DetailWindow> {
        let id = self.active?;
        self.windows.iter().find(|w| w.id == id)
    }
}

impl<'a, H: Host> ScanObserver for EventRouter<'a, H> {
    fn pump(&mut self) -> Pump {
        let mut events = std::mem::take(&mut self.events);
        events.clear();
        let alive = self.host.pump(false, &mut events);
        self.route_all(&events);
        self.events = events;

        if !alive || self.routed.shutdown {
            Pump::Shutdown
        } else if self.routed.resized.is_some() {
            Pump::Restart
        } else {
            Pump::Continue
        }
    }

    fn present(&mut self, raster: &Raster) {
        self.host.present(raster);
    }
}

impl<H: Host> Coordinator<H> {
    pub fn new(mut host: H, view: Arc<FileView>, config: &Config) -> Result<Self> {
        let geometry = config.geometry;
        if !host.resize(geometry.width, geometry.height) {
            return Err(SenseError::HostRejected(format!(
                "preview surface {}x{}",
                geometry.width, geometry.height
            )));
        }
        host.request_clock(CLOCK_HZ);

        let name = config
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();

        Ok(Self {
            host,
            view,
            name,
            raster: Raster::new(geometry.width, geometry.height),
            geometry,
            render: config.render,
            worker: config.worker,
            base: config.base,
            tracker: RegionTracker::new(),
            windows: Vec::new(),
            active: None,
            next_id: 1,
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    #[cfg(test)]
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[cfg(test)]
    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    #[cfg(test)]
    pub fn geometry(&self) -> ViewportGeometry {
        self.geometry
    }

    #[cfg(test)]
    pub fn tracker(&self) -> &RegionTracker {
        &self.tracker
    }

    #[cfg(test)]
    pub fn active_window(&self) -> Option<usize> {
        self.active
    }

    /// Opens a detail window and its worker, seeded at `offset`. The new
    /// window becomes the target of subsequent seeks.
    pub fn spawn_window(&mut self, offset: u64) -> Result<usize> {
        let id = self.next_id;
        let channel_name = format!("{}:{}", self.name, id);
        let channel = self.host.open_channel(&channel_name, self.base)?;

        let (link, worker_link) = window_link(REQUEST_CAPACITY, NOTIFY_CAPACITY);
        let handle =
            WindowWorker::new(id, Arc::clone(&self.view), channel, worker_link, self.worker).spawn()?;

        self.next_id += 1;
        self.tracker.insert(id);
        link.request_seek(offset);
        self.windows.push(DetailWindow {
            id,
            link,
            worker: Some(handle),
        });
        self.active = Some(id);

        log::info!("opened detail window {} ({}) at {:#x}", id, channel_name, offset);
        Ok(id)
    }

    #[cfg(test)]
    pub fn request_seek(&self, offset: u64) -> SeekStatus {
        let Some(window) = self.active.and_then(|id| self.windows.iter().find(|w| w.id == id))
        else {
            return SeekStatus::Closed;
        };
        window.link.request_seek(offset)
    }

    /// Rebuilds the preview from scratch, keeping the host responsive.
    ///
    /// Returns false when the host asked for shutdown during the scan. A
    /// resize granted mid-scan abandons the scan and starts a new one against
    /// the new geometry.
    pub fn rebuild_preview(&mut self) -> bool {
        loop {
            let (outcome, routed) = {
                let mut router = EventRouter {
                    host: &mut self.host,
                    windows: &self.windows,
                    active: self.active,
                    geometry: self.geometry,
                    view_len: self.view.len(),
                    events: Vec::new(),
                    routed: Routed::default(),
                };
                let outcome = render(
                    &mut self.raster,
                    &self.geometry,
                    self.view.bytes(),
                    &self.render,
                    &mut router,
                );
                (outcome, router.routed)
            };

            if outcome != ScanOutcome::Shutdown {
                self.spawn_requested(&routed.spawns);
            }

            match outcome {
                ScanOutcome::Shutdown => return false,
                ScanOutcome::Restart => {
                    if let Some(geometry) = routed.resized {
                        self.apply_geometry(geometry);
                    }
                }
                ScanOutcome::Complete { rows } => {
                    if rows > 0 {
                        self.tracker
                            .redraw_latest(&mut self.raster, &self.geometry, self.view.len());
                        self.host.present(&self.raster);
                    }
                    return true;
                }
            }
        }
    }

    fn apply_geometry(&mut self, geometry: ViewportGeometry) {
        log::debug!("preview geometry now {}x{}", geometry.width, geometry.height);
        self.geometry = geometry;
        self.raster.resize(geometry.width, geometry.height);
        self.tracker.invalidate_all();
    }

    fn spawn_requested(&mut self, offsets: &[u64]) {
        for &offset in offsets {
            if let Err(e) = self.spawn_window(offset) {
                log::warn!("couldn't open detail window: {}", e);
            }
        }
    }

    fn route_events(&mut self, events: &[HostEvent]) -> Routed {
        let mut router = EventRouter {
            host: &mut self.host,
            windows: &self.windows,
            active: self.active,
            geometry: self.geometry,
            view_len: self.view.len(),
            events: Vec::new(),
            routed: Routed::default(),
        };
        router.route_all(events);
        router.routed
    }

    pub fn poll_windows(&mut self) -> bool {
        let mut dirty = false;
        let mut gone = Vec::new();
        let len = self.view.len();

        for window in &self.windows {
            if let Some(confirmation) = window.link.poll_latest() {
                let update = self.tracker.update(
                    window.id,
                    &mut self.raster,
                    confirmation.offset,
                    || confirmation.byte_count,
                    &self.geometry,
                    len,
                );
                dirty |= !update.is_noop();
            } else if window.link.is_disconnected() {
                gone.push(window.id);
            }
        }

        for id in gone {
            self.close_window(id);
            dirty = true;
        }
        dirty
    }

    pub fn handle_events(&mut self, events: &[HostEvent]) -> bool {
        let routed = self.route_events(events);
        if routed.shutdown {
            return false;
        }
        if let Some(geometry) = routed.resized {
            self.apply_geometry(geometry);
            if !self.rebuild_preview() {
                return false;
            }
        }
        self.spawn_requested(&routed.spawns);
        true
    }

    pub fn run(&mut self) -> Result<()> {
        self.spawn_window(0)?;

        if self.rebuild_preview() {
            let mut events = Vec::new();
            while self.host.pump(true, &mut events) {
                let keep_going = self.handle_events(&events);
                events.clear();
                if !keep_going {
                    break;
                }
                if self.poll_windows() {
                    self.host.present(&self.raster);
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    fn close_window(&mut self, id: usize) {
        let Some(index) = self.windows.iter().position(|w| w.id == id) else {
            return;
        };
        let mut window = self.windows.remove(index);
        window.link.close();
        drop(window.link);
        if let Some(handle) = window.worker.take() {
            if handle.join().is_err() {
                log::warn!("window {} worker panicked", id);
            }
        }

        if let Some(state) = self.tracker.remove(id) {
            if state.last_pixel_count > 0 {
                let (col, row) = state.last_coord;
                self.raster.apply_run(col, row, state.last_pixel_count as u64, |px| {
                    px & OVERLAY_MASK
                });
            }
        }
        if self.active == Some(id) {
            self.active = self.windows.last().map(|w| w.id);
        }
        log::info!("closed detail window {}", id);
    }

    pub fn shutdown(&mut self) {
        let ids: Vec<usize> = self.windows.iter().map(|w| w.id).collect();
        for id in ids {
            self.close_window(id);
        }
    }
}

impl<H: Host> Drop for Coordinator<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
