use std::time::{Duration, Instant};

use crate::geometry::ViewportGeometry;
use crate::histogram::{similarity, Histogram};
use crate::raster::{intensity, Raster, BOUNDARY_TINT, CLEAR, SCAN_EDGE};

/// Minimum time between partial presents while a scan is running.
pub const FRAME_BUDGET: Duration = Duration::from_millis(14);

pub const DEFAULT_CUTOFF: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// Rows scoring below this are tinted; `None` disables the comparison.
    pub cutoff: Option<f32>,
    /// Feed every byte of a cell into the row histogram, not just the first.
    pub detailed: bool,
    pub frame_budget: Duration,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            cutoff: None,
            detailed: false,
            frame_budget: FRAME_BUDGET,
        }
    }
}

pub fn sanitize_cutoff(value: f32) -> f32 {
    if !value.is_finite() || value <= 0.0 || value > 1.0 {
        DEFAULT_CUTOFF
    } else {
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pump {
    Continue,
    /// Geometry changed underneath the scan; start over.
    Restart,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Complete { rows: u32 },
    Restart,
    Shutdown,
}

pub trait ScanObserver {
    fn pump(&mut self) -> Pump;

    fn present(&mut self, raster: &Raster);
}

/// The observer is pumped before every row, so a shutdown seen while row `n`
/// is pending leaves rows `n..` untouched. `raster` must match `geometry`.
pub fn render(
    raster: &mut Raster,
    geometry: &ViewportGeometry,
    data: &[u8],
    settings: &RenderSettings,
    observer: &mut impl ScanObserver,
) -> ScanOutcome {
    let len = data.len();
    let step = geometry.step_size(len as u64) as usize;
    let width = geometry.width;
    let height = geometry.height.min(raster.height());
    let normalizer = if settings.detailed {
        (step * width as usize) as f32
    } else {
        width as f32
    };

    raster.fill(CLEAR);

    let mut current = Histogram::new();
    let mut previous = Histogram::new();
    let mut has_previous = false;
    let mut last_present = Instant::now();
    let mut pos = 0usize;
    let mut row = 0u32;

    while pos + step < len && row < height {
        match observer.pump() {
            Pump::Continue => {}
            Pump::Restart => return ScanOutcome::Restart,
            Pump::Shutdown => return ScanOutcome::Shutdown,
        }

        let Some(pixels) = raster.row_mut(row) else {
            break;
        };
        for px in pixels.iter_mut() {
            if pos >= len {
                break;
            }
            *px = intensity(data[pos]);
            if settings.cutoff.is_some() {
                if settings.detailed {
                    current.extend(&data[pos..(pos + step).min(len)]);
                } else {
                    current.add(data[pos]);
                }
            }
            pos += step;
        }

        if let Some(cutoff) = settings.cutoff {
            if has_previous && similarity(&current, &previous, normalizer) < cutoff {
                for px in pixels.iter_mut() {
                    *px |= BOUNDARY_TINT;
                }
            }
            std::mem::swap(&mut current, &mut previous);
            current.clear();
            has_previous = true;
        }

        if last_present.elapsed() > settings.frame_budget {
            if let Some(edge) = raster.row_mut(row + 1) {
                edge.fill(SCAN_EDGE);
            }
            observer.present(raster);
            last_present = Instant::now();
        }

        row += 1;
    }

    // the file ran out before the surface did: drop the last scan edge
    if let Some(edge) = raster.row_mut(row) {
        edge.fill(CLEAR);
    }

    ScanOutcome::Complete { rows: row }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::OVERLAY_MASK;

    /// Counts pump calls and stops at a chosen one.
    struct Scripted {
        calls: usize,
        stop_at: Option<(usize, Pump)>,
        presents: usize,
    }

    impl Scripted {
        fn running() -> Self {
            Self {
                calls: 0,
                stop_at: None,
                presents: 0,
            }
        }

        fn stopping(call: usize, pump: Pump) -> Self {
            Self {
                stop_at: Some((call, pump)),
                ..Self::running()
            }
        }
    }

    impl ScanObserver for Scripted {
        fn pump(&mut self) -> Pump {
            self.calls += 1;
            match self.stop_at {
                Some((call, pump)) if call == self.calls => pump,
                _ => Pump::Continue,
            }
        }

        fn present(&mut self, _raster: &Raster) {
            self.presents += 1;
        }
    }

    fn settings(cutoff: Option<f32>) -> RenderSettings {
        RenderSettings {
            cutoff,
            frame_budget: Duration::from_secs(3600),
            ..RenderSettings::default()
        }
    }

    fn row_is_tinted(raster: &Raster, y: u32) -> bool {
        raster
            .row(y)
            .unwrap()
            .iter()
            .all(|&px| px & BOUNDARY_TINT == BOUNDARY_TINT)
    }

    #[test]
    fn test_writes_intensity_per_step() {
        let data: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
        let geometry = ViewportGeometry::new(32, 32).unwrap();
        let mut raster = Raster::new(32, 32);
        let mut observer = Scripted::running();

        let outcome = render(&mut raster, &geometry, &data, &settings(None), &mut observer);
        assert_eq!(outcome, ScanOutcome::Complete { rows: 32 });
        assert_eq!(observer.calls, 32);
        assert_eq!(raster.get(16, 1), Some(intensity(48)));
        assert_eq!(raster.get(31, 31), Some(intensity((1023 % 251) as u8)));
    }

    #[test]
    fn test_samples_first_byte_of_each_cell() {
        let data: Vec<u8> = (0..64u32).map(|i| i as u8).collect();
        let geometry = ViewportGeometry::new(4, 4).unwrap();
        let mut raster = Raster::new(4, 4);

        render(&mut raster, &geometry, &data, &settings(None), &mut Scripted::running());
        // step 4
        assert_eq!(raster.get(1, 0), Some(intensity(4)));
        assert_eq!(raster.get(2, 3), Some(intensity(56)));
    }

    #[test]
    fn test_identical_distribution_not_tinted() {
        let mut data = Vec::new();
        data.extend((0..32u8).collect::<Vec<_>>());
        data.extend((0..32u8).rev().collect::<Vec<_>>());
        data.extend([7u8; 32]);
        let geometry = ViewportGeometry::new(32, 3).unwrap();
        let mut raster = Raster::new(32, 3);

        render(&mut raster, &geometry, &data, &settings(Some(0.9)), &mut Scripted::running());
        assert!(!row_is_tinted(&raster, 0));
        assert!(!row_is_tinted(&raster, 1));
        assert!(row_is_tinted(&raster, 2));
    }

    #[test]
    fn test_zero_to_ff_boundary_tinted() {
        let mut data = vec![0x00u8; 64];
        data.extend([0xFFu8; 64]);
        let geometry = ViewportGeometry::new(32, 4).unwrap();
        let mut raster = Raster::new(32, 4);

        render(&mut raster, &geometry, &data, &settings(Some(0.9)), &mut Scripted::running());
        assert!(!row_is_tinted(&raster, 0));
        assert!(!row_is_tinted(&raster, 1));
        assert!(row_is_tinted(&raster, 2));
        assert!(!row_is_tinted(&raster, 3));
        // tint keeps the intensity underneath
        assert_eq!(raster.get(0, 2).unwrap() & OVERLAY_MASK, intensity(0xFF));
    }

    #[test]
    fn test_no_tint_without_cutoff() {
        let mut data = vec![0x00u8; 64];
        data.extend([0xFFu8; 64]);
        let geometry = ViewportGeometry::new(32, 4).unwrap();
        let mut raster = Raster::new(32, 4);

        render(&mut raster, &geometry, &data, &settings(None), &mut Scripted::running());
        assert!((0..4).all(|y| !row_is_tinted(&raster, y)));
    }

    #[test]
    fn test_detailed_mode_sees_whole_cell() {
        // first byte of every 4-byte cell is zero; the rest changes at row 2
        let mut data = Vec::new();
        for row in 0..4 {
            for _ in 0..8 {
                let fill = if row < 2 { 0x11 } else { 0xEE };
                data.extend([0x00, fill, fill, fill]);
            }
        }
        let geometry = ViewportGeometry::new(8, 4).unwrap();

        let mut sampled = Raster::new(8, 4);
        render(&mut sampled, &geometry, &data, &settings(Some(0.9)), &mut Scripted::running());
        assert!(!row_is_tinted(&sampled, 2));

        let mut detailed = Raster::new(8, 4);
        let detailed_settings = RenderSettings {
            detailed: true,
            ..settings(Some(0.9))
        };
        render(&mut detailed, &geometry, &data, &detailed_settings, &mut Scripted::running());
        assert!(row_is_tinted(&detailed, 2));
    }

    #[test]
    fn test_shutdown_on_third_row_stops_scan() {
        let data = vec![0x80u8; 400];
        let geometry = ViewportGeometry::new(4, 100).unwrap();
        let mut raster = Raster::new(4, 100);
        let mut observer = Scripted::stopping(3, Pump::Shutdown);

        let outcome = render(&mut raster, &geometry, &data, &settings(None), &mut observer);
        assert_eq!(outcome, ScanOutcome::Shutdown);
        assert_eq!(observer.calls, 3);
        assert!(raster.row(0).unwrap().iter().all(|&px| px == intensity(0x80)));
        assert!(raster.row(1).unwrap().iter().all(|&px| px == intensity(0x80)));
        assert!((2..100).all(|y| raster.row(y).unwrap().iter().all(|&px| px == CLEAR)));
    }

    #[test]
    fn test_restart_is_reported() {
        let data = vec![1u8; 400];
        let geometry = ViewportGeometry::new(4, 100).unwrap();
        let mut raster = Raster::new(4, 100);
        let mut observer = Scripted::stopping(10, Pump::Restart);

        let outcome = render(&mut raster, &geometry, &data, &settings(None), &mut observer);
        assert_eq!(outcome, ScanOutcome::Restart);
    }

    #[test]
    fn test_presents_with_scan_edge_when_budget_elapses() {
        let data = vec![1u8; 400];
        let geometry = ViewportGeometry::new(4, 100).unwrap();
        let mut raster = Raster::new(4, 100);
        let mut observer = Scripted::running();
        let eager = RenderSettings {
            frame_budget: Duration::ZERO,
            ..RenderSettings::default()
        };

        render(&mut raster, &geometry, &data, &eager, &mut observer);
        assert!(observer.presents > 0);
    }

    #[test]
    fn test_tiny_file_draws_nothing() {
        let geometry = ViewportGeometry::new(4, 4).unwrap();
        let mut raster = Raster::new(4, 4);
        let outcome = render(&mut raster, &geometry, &[9], &settings(None), &mut Scripted::running());
        assert_eq!(outcome, ScanOutcome::Complete { rows: 0 });
    }

    #[test]
    fn test_sanitize_cutoff() {
        assert_eq!(sanitize_cutoff(0.5), 0.5);
        assert_eq!(sanitize_cutoff(1.0), 1.0);
        assert_eq!(sanitize_cutoff(0.0), DEFAULT_CUTOFF);
        assert_eq!(sanitize_cutoff(1.5), DEFAULT_CUTOFF);
        assert_eq!(sanitize_cutoff(f32::NAN), DEFAULT_CUTOFF);
        assert_eq!(sanitize_cutoff(f32::INFINITY), DEFAULT_CUTOFF);
    }

    #[test]
    fn test_no_scan_edge_left_below_short_file() {
        let geometry = ViewportGeometry::new(8, 16).unwrap();
        let mut raster = Raster::new(8, 16);
        let data = vec![0x30u8; 64];
        let settings = RenderSettings {
            frame_budget: Duration::ZERO,
            ..RenderSettings::default()
        };
        let mut observer = Scripted::running();

        let outcome = render(&mut raster, &geometry, &data, &settings, &mut observer);
        assert_eq!(outcome, ScanOutcome::Complete { rows: 8 });
        assert!(observer.presents > 0);
        assert!(raster.row(8).unwrap().iter().all(|&px| px == CLEAR));
        assert!(raster.row(7).unwrap().iter().all(|&px| px == intensity(0x30)));
    }
}
