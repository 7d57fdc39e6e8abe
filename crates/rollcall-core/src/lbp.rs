//! Local-binary-pattern feature extraction.
//!
//! The LBPH-equivalent half of recognition: a face crop is resampled to a
//! canonical square, each pixel is encoded as an 8-bit LBP code from its
//! 3x3 neighborhood, and codes are histogrammed over a grid of cells.
//! Each cell histogram is normalized to unit sum, so distances between
//! feature vectors are independent of face-crop resolution.

use crate::types::Frame;

const LBP_BINS: usize = 256;

/// Grid LBP histogram extractor.
pub struct LbpExtractor {
    /// Side length the face crop is resampled to before encoding.
    face_size: usize,
    /// Cells per axis; the feature vector holds grid*grid histograms.
    grid: usize,
}

impl Default for LbpExtractor {
    fn default() -> Self {
        Self {
            face_size: 128,
            grid: 8,
        }
    }
}

impl LbpExtractor {
    pub fn new(face_size: usize, grid: usize) -> Self {
        assert!(face_size > 0 && grid > 0 && face_size >= grid);
        Self { face_size, grid }
    }

    /// Length of the feature vectors this extractor produces.
    pub fn feature_len(&self) -> usize {
        self.grid * self.grid * LBP_BINS
    }

    /// Extract a normalized grid-histogram feature vector from a face crop.
    ///
    /// Deterministic: the same crop always yields the same features.
    pub fn extract(&self, face: &Frame) -> Vec<f32> {
        let n = self.face_size;
        let gray = resample(face, n);
        let codes = lbp_codes(&gray, n);

        let cell = n / self.grid;
        let mut features = vec![0f32; self.feature_len()];
        for y in 0..n {
            for x in 0..n {
                let cy = (y / cell).min(self.grid - 1);
                let cx = (x / cell).min(self.grid - 1);
                let bin = codes[y * n + x] as usize;
                features[(cy * self.grid + cx) * LBP_BINS + bin] += 1.0;
            }
        }

        // Unit-sum per cell
        for hist in features.chunks_mut(LBP_BINS) {
            let sum: f32 = hist.iter().sum();
            if sum > 0.0 {
                for v in hist.iter_mut() {
                    *v /= sum;
                }
            }
        }
        features
    }
}

/// Nearest-neighbor resample of a frame to a size x size square.
fn resample(frame: &Frame, size: usize) -> Vec<u8> {
    if frame.width == 0 || frame.height == 0 || frame.data.is_empty() {
        return vec![0; size * size];
    }
    let mut out = Vec::with_capacity(size * size);
    for y in 0..size {
        let sy = (y * frame.height as usize / size).min(frame.height as usize - 1);
        for x in 0..size {
            let sx = (x * frame.width as usize / size).min(frame.width as usize - 1);
            out.push(frame.data[sy * frame.width as usize + sx]);
        }
    }
    out
}

/// Compute the 8-bit LBP code of every pixel in an n x n grayscale image.
///
/// Neighbors are read clockwise from the top-left; a bit is set when the
/// neighbor is >= the center pixel. Border neighbors are edge-clamped so
/// every pixel gets a code.
fn lbp_codes(gray: &[u8], n: usize) -> Vec<u8> {
    const OFFSETS: [(i32, i32); 8] = [
        (-1, -1),
        (-1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
        (1, 0),
        (1, -1),
        (0, -1),
    ];

    let last = (n - 1) as i32;
    let mut codes = Vec::with_capacity(n * n);
    for y in 0..n as i32 {
        for x in 0..n as i32 {
            let center = gray[(y * n as i32 + x) as usize];
            let mut code = 0u8;
            for (bit, (dy, dx)) in OFFSETS.iter().enumerate() {
                let ny = (y + dy).clamp(0, last);
                let nx = (x + dx).clamp(0, last);
                if gray[(ny * n as i32 + nx) as usize] >= center {
                    code |= 1 << bit;
                }
            }
            codes.push(code);
        }
    }
    codes
}
