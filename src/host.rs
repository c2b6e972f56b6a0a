use crate::error::Result;
use crate::histogram::Histogram;
use crate::raster::Raster;

/// Decoded input from the display host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    /// The host suggests new preview dimensions.
    Resize { width: u32, height: u32 },
    /// Button state change at surface-local coordinates.
    Pointer {
        x: u32,
        y: u32,
        pressed: bool,
        clicks: u8,
    },
    Motion { x: u32, y: u32 },
    /// Periodic heartbeat requested with [`Host::request_clock`].
    Tick,
    Close,
}

/// Finer-grained resample of one region, produced by a window worker.
#[derive(Debug, Clone)]
pub struct DetailFrame {
    pub window_id: usize,
    pub offset: u64,
    pub bytes: Vec<u8>,
    pub histogram: Histogram,
    pub entropy: f64,
}

/// Data conduit behind one detail window. Owned by that window's worker.
pub trait DataChannel: Send {
    fn name(&self) -> &str;

    /// Number of file bytes the window shows at once.
    fn size(&self) -> usize;

    fn publish(&mut self, frame: &DetailFrame) -> Result<()>;
}

pub trait Host {
    /// Drains pending host events into `events`. With `block` it waits for at
    /// least one. Returns false when the host wants the tool to shut down.
    fn pump(&mut self, block: bool, events: &mut Vec<HostEvent>) -> bool;

    /// Asks for new preview dimensions; true when granted.
    fn resize(&mut self, width: u32, height: u32) -> bool;

    /// Publishes the preview raster.
    fn present(&mut self, raster: &Raster);

    /// Opens the conduit for a new detail window whose side is `base` pixels.
    fn open_channel(&mut self, name: &str, base: usize) -> Result<Box<dyn DataChannel>>;

    /// Registers a periodic [`HostEvent::Tick`] at `hz`.
    fn request_clock(&mut self, hz: u32);
}
