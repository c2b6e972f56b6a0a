//! Byte-value histograms and the row-to-row similarity metric used to flag
//! probable structure boundaries in the preview.

/// Added to every bucket before normalising so empty rows stay finite.
pub const EPSILON: f32 = 0.000_000_1;

/// Occurrence count for each of the 256 byte values.
#[derive(Clone, PartialEq, Eq)]
pub struct Histogram {
    counts: [u64; 256],
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Histogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Histogram")
            .field("total", &self.total())
            .finish()
    }
}

impl Histogram {
    pub const fn new() -> Self {
        Self { counts: [0; 256] }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        let mut histogram = Self::new();
        histogram.extend(data);
        histogram
    }

    #[inline]
    pub fn add(&mut self, byte: u8) {
        self.counts[byte as usize] += 1;
    }

    pub fn extend(&mut self, data: &[u8]) {
        for &byte in data {
            self.add(byte);
        }
    }

    pub fn clear(&mut self) {
        self.counts = [0; 256];
    }

    #[cfg(test)]
    pub fn count(&self, byte: u8) -> u64 {
        self.counts[byte as usize]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// Number of byte values seen at least once.
    pub fn distinct(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Shannon entropy in bits per byte (0.0 - 8.0).
    pub fn entropy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let total = total as f64;
        self.counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / total;
                -p * p.log2()
            })
            .sum()
    }
}

/// Bhattacharyya-style similarity between two rows.
///
/// `normalizer` is the number of samples that produced a row. Returns 1.0 for
/// statistically identical rows and trends towards 0.0 across a boundary.
pub fn similarity(current: &Histogram, previous: &Histogram, normalizer: f32) -> f32 {
    let mut bcf = 0.0f32;
    let mut sum_cur = 0.0f32;

    for (&a, &b) in current.counts.iter().zip(previous.counts.iter()) {
        let n_cur = (a as f32 + EPSILON) / normalizer;
        let n_prev = (b as f32 + EPSILON) / normalizer;
        bcf += (n_cur * n_prev).sqrt();
        sum_cur += n_cur;
    }

    // floating drift can push the coefficient past the sample mass
    let rnd = sum_cur.round();
    let bcf = bcf.min(rnd);
    1.0 - (rnd - bcf).sqrt()
}
