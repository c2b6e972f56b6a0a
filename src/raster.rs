use image::RgbImage;

pub type Pixel = u32;

/// Packs channels so that `to_le_bytes` yields `[r, g, b, a]`.
#[inline]
pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Pixel {
    (r as u32) | (g as u32) << 8 | (b as u32) << 16 | (a as u32) << 24
}

pub const CLEAR: Pixel = rgba(0x00, 0x00, 0x00, 0xff);
/// OR'd into rows that score below the similarity cutoff.
pub const BOUNDARY_TINT: Pixel = rgba(0xff, 0x00, 0x00, 0x00);
/// Line drawn just below the last scanned row while a scan is in progress.
pub const SCAN_EDGE: Pixel = rgba(0xff, 0x00, 0x00, 0xff);
/// OR'd over the region a detail window is looking at.
pub const OVERLAY: Pixel = rgba(0x88, 0x00, 0x88, 0x00);
/// Channels that survive an overlay reset (intensity and alpha).
pub const OVERLAY_MASK: Pixel = rgba(0x00, 0xff, 0x00, 0xff);

#[inline]
pub const fn intensity(value: u8) -> Pixel {
    rgba(0x00, value, 0x00, 0xff)
}

#[inline]
pub fn channels(pixel: Pixel) -> [u8; 4] {
    pixel.to_le_bytes()
}

pub struct Raster {
    width: u32,
    height: u32,
    pitch: usize,
    pixels: Vec<Pixel>,
}

impl Raster {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_pitch(width, height, width as usize)
    }

    /// Surface whose rows are `pitch` pixels apart; `pitch` is at least `width`.
    pub fn with_pitch(width: u32, height: u32, pitch: usize) -> Self {
        let pitch = pitch.max(width as usize);
        Self {
            width,
            height,
            pitch,
            pixels: vec![CLEAR; pitch * height as usize],
        }
    }

    /// Reallocates for new dimensions, keeping the current padding policy.
    pub fn resize(&mut self, width: u32, height: u32) {
        let padding = self.pitch - self.width as usize;
        *self = Self::with_pitch(width, height, width as usize + padding);
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fill(&mut self, pixel: Pixel) {
        self.pixels.fill(pixel);
    }

    #[cfg(test)]
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.pitch + x as usize)
        } else {
            None
        }
    }

    #[cfg(test)]
    pub fn get(&self, x: u32, y: u32) -> Option<Pixel> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    #[cfg(test)]
    pub fn set(&mut self, x: u32, y: u32, pixel: Pixel) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.pixels[i] = pixel;
                true
            }
            None => false,
        }
    }

    /// Visible pixels of one row, padding excluded.
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [Pixel]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.pitch;
        Some(&mut self.pixels[start..start + self.width as usize])
    }

    pub fn row(&self, y: u32) -> Option<&[Pixel]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.pitch;
        Some(&self.pixels[start..start + self.width as usize])
    }

    /// Applies `op` to `count` pixels in row-major order starting at
    /// `(col, row)`, skipping row padding and stopping at the surface end.
    /// Returns how many pixels were touched.
    pub fn apply_run(&mut self, col: u64, row: u64, count: u64, op: impl Fn(Pixel) -> Pixel) -> usize {
        let width = u64::from(self.width);
        let height = u64::from(self.height);
        if width == 0 || col >= width {
            return 0;
        }

        let mut touched = 0;
        let mut x = col;
        let mut y = row;
        let mut remaining = count;
        while remaining > 0 && y < height {
            let i = y as usize * self.pitch + x as usize;
            self.pixels[i] = op(self.pixels[i]);
            touched += 1;
            remaining -= 1;
            x += 1;
            if x == width {
                x = 0;
                y += 1;
            }
        }
        touched
    }

    /// Visible pixels as an RGB image, alpha and padding dropped.
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            if let Some(row) = self.row(y) {
                for &px in row {
                    let [r, g, b, _] = channels(px);
                    data.extend_from_slice(&[r, g, b]);
                }
            }
        }
        RgbImage::from_raw(self.width, self.height, data)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_packing() {
        assert_eq!(channels(rgba(1, 2, 3, 4)), [1, 2, 3, 4]);
        assert_eq!(channels(intensity(0x7f)), [0, 0x7f, 0, 0xff]);
    }

    #[test]
    fn test_overlay_mask_restores_intensity() {
        let px = intensity(0x42) | OVERLAY;
        assert_ne!(px, intensity(0x42));
        assert_eq!(px & OVERLAY_MASK, intensity(0x42));
        assert_eq!((intensity(0x42) | BOUNDARY_TINT) & OVERLAY_MASK, intensity(0x42));
    }

    #[test]
    fn test_bounds_checked_access() {
        let mut raster = Raster::new(4, 2);
        assert!(raster.set(3, 1, intensity(9)));
        assert!(!raster.set(4, 1, intensity(9)));
        assert_eq!(raster.get(3, 1), Some(intensity(9)));
        assert_eq!(raster.get(0, 5), None);
    }

    #[test]
    fn test_apply_run_wraps_rows_and_respects_pitch() {
        let mut raster = Raster::with_pitch(4, 3, 6);
        let touched = raster.apply_run(2, 0, 4, |px| px | OVERLAY);
        assert_eq!(touched, 4);
        assert_eq!(raster.get(1, 0), Some(CLEAR));
        assert_eq!(raster.get(2, 0), Some(CLEAR | OVERLAY));
        assert_eq!(raster.get(3, 0), Some(CLEAR | OVERLAY));
        assert_eq!(raster.get(0, 1), Some(CLEAR | OVERLAY));
        assert_eq!(raster.get(1, 1), Some(CLEAR | OVERLAY));
        assert_eq!(raster.get(2, 1), Some(CLEAR));
        // padding untouched
        assert_eq!(raster.pixels[4], CLEAR);
        assert_eq!(raster.pixels[5], CLEAR);
    }

    #[test]
    fn test_apply_run_stops_at_surface_end() {
        let mut raster = Raster::new(4, 2);
        assert_eq!(raster.apply_run(2, 1, 100, |px| px | OVERLAY), 2);
        assert_eq!(raster.apply_run(0, 7, 3, |px| px | OVERLAY), 0);
    }

    #[test]
    fn test_rgb_image_drops_alpha_and_padding() {
        let mut raster = Raster::with_pitch(3, 2, 5);
        raster.set(2, 1, intensity(0x40) | BOUNDARY_TINT);
        let image = raster.to_rgb_image();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1).0, [0xff, 0x40, 0x00]);
        assert_eq!(image.get_pixel(0, 0).0, [0x00, 0x00, 0x00]);
    }
}
