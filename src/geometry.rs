use crate::error::{Result, SenseError};

/// Largest surface dimension the display host will hand out.
pub const MAX_DIMENSION: u32 = 8192;

/// Pixel dimensions of the preview surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportGeometry {
    pub width: u32,
    pub height: u32,
}

impl ViewportGeometry {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(SenseError::InvalidGeometry {
                width,
                height,
                max: MAX_DIMENSION,
            });
        }
        Ok(Self { width, height })
    }

    #[inline]
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Bytes represented by one pixel, never less than one.
    #[inline]
    pub fn step_size(&self, len: u64) -> u64 {
        (len / self.pixel_count()).max(1)
    }

    #[inline]
    pub fn bytes_per_row(&self, len: u64) -> u64 {
        self.step_size(len) * u64::from(self.width)
    }

    /// Byte offset under surface-local coordinate `(x, y)`.
    pub fn offset_at(&self, x: u32, y: u32, len: u64) -> u64 {
        u64::from(y) * self.bytes_per_row(len) + u64::from(x) * self.step_size(len)
    }

    /// `(col, row)` of the pixel holding `offset`.
    pub fn coord_of(&self, offset: u64, len: u64) -> (u64, u64) {
        let bpr = self.bytes_per_row(len);
        let row = offset / bpr;
        let col = (offset - row * bpr) / self.step_size(len);
        (col, row)
    }

    /// Number of pixels covered by a run of `byte_count` bytes.
    pub fn pixels_for(&self, byte_count: u64, len: u64) -> u64 {
        let bpr = self.bytes_per_row(len);
        let whole_rows = byte_count / bpr;
        let remainder = byte_count - whole_rows * bpr;
        whole_rows * u64::from(self.width) + remainder / self.step_size(len)
    }

    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }
}
