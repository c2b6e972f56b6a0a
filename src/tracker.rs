use crate::geometry::ViewportGeometry;
use crate::raster::{Raster, OVERLAY, OVERLAY_MASK};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowState {
    pub id: usize,
    pub last_offset: Option<u64>,
    pub last_byte_count: usize,
    pub last_pixel_count: usize,
    pub last_coord: (u64, u64),
}

impl WindowState {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            last_offset: None,
            last_byte_count: 0,
            last_pixel_count: 0,
            last_coord: (0, 0),
        }
    }

    pub fn invalidate(&mut self) {
        self.last_offset = None;
        self.last_byte_count = 0;
        self.last_pixel_count = 0;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionUpdate {
    pub cleared: usize,
    pub painted: usize,
}

impl RegionUpdate {
    pub fn is_noop(&self) -> bool {
        self.cleared == 0 && self.painted == 0
    }
}

#[derive(Debug, Default)]
pub struct RegionTracker {
    windows: Vec<WindowState>,
    /// Window id, offset and byte count of the last applied update.
    latest: Option<(usize, u64, usize)>,
}

impl RegionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: usize) {
        self.windows.push(WindowState::new(id));
    }

    pub fn remove(&mut self, id: usize) -> Option<WindowState> {
        let index = self.windows.iter().position(|w| w.id == id)?;
        if matches!(self.latest, Some((latest, _, _)) if latest == id) {
            self.latest = None;
        }
        Some(self.windows.remove(index))
    }

    #[cfg(test)]
    pub fn get(&self, id: usize) -> Option<&WindowState> {
        self.windows.iter().find(|w| w.id == id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn invalidate_all(&mut self) {
        for window in &mut self.windows {
            window.invalidate();
        }
    }

    pub fn update(
        &mut self,
        id: usize,
        raster: &mut Raster,
        new_offset: u64,
        byte_count: impl FnOnce() -> usize,
        geometry: &ViewportGeometry,
        view_len: u64,
    ) -> RegionUpdate {
        let Some(window) = self.windows.iter_mut().find(|w| w.id == id) else {
            return RegionUpdate::default();
        };
        let report = update(window, raster, new_offset, byte_count, geometry, view_len);
        self.latest = Some((id, new_offset, window.last_byte_count));
        report
    }

    /// Repaints the overlay of the most recently updated window after the
    /// raster underneath it was rebuilt, against the current geometry.
    pub fn redraw_latest(
        &mut self,
        raster: &mut Raster,
        geometry: &ViewportGeometry,
        view_len: u64,
    ) -> RegionUpdate {
        let Some((id, offset, byte_count)) = self.latest else {
            return RegionUpdate::default();
        };
        let Some(window) = self.windows.iter_mut().find(|w| w.id == id) else {
            return RegionUpdate::default();
        };
        window.last_offset = None;
        update(window, raster, offset, || byte_count, geometry, view_len)
    }
}

/// Only the old and new runs are touched; intensity underneath survives.
pub fn update(
    window: &mut WindowState,
    raster: &mut Raster,
    new_offset: u64,
    byte_count: impl FnOnce() -> usize,
    geometry: &ViewportGeometry,
    view_len: u64,
) -> RegionUpdate {
    if window.last_offset == Some(new_offset) {
        return RegionUpdate::default();
    }

    let mut report = RegionUpdate::default();

    if window.last_byte_count > 0 && window.last_pixel_count > 0 {
        let (col, row) = window.last_coord;
        report.cleared = raster.apply_run(col, row, window.last_pixel_count as u64, |px| {
            px & OVERLAY_MASK
        });
    }

    let count = byte_count();
    window.last_byte_count = count;
    window.last_pixel_count = 0;
    if count == 0 {
        window.last_offset = Some(new_offset);
        return report;
    }

    let (col, row) = geometry.coord_of(new_offset, view_len);
    let pixels = geometry.pixels_for(count as u64, view_len);

    report.painted = raster.apply_run(col, row, pixels, |px| px | OVERLAY);

    window.last_coord = (col, row);
    window.last_pixel_count = pixels as usize;
    window.last_offset = Some(new_offset);
    report
}
