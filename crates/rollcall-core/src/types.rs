use serde::{Deserialize, Serialize};

/// Database row id of a registered user.
pub type UserId = i64;

/// A captured grayscale frame.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Extract the region under a bounding box as a new frame.
    ///
    /// The box is clamped to the frame borders; a box entirely outside
    /// the frame yields an empty crop.
    pub fn crop(&self, region: &BoundingBox) -> Frame {
        let x0 = region.x.min(self.width);
        let y0 = region.y.min(self.height);
        let x1 = region.x.saturating_add(region.width).min(self.width);
        let y1 = region.y.saturating_add(region.height).min(self.height);

        let w = x1 - x0;
        let h = y1 - y0;
        let mut data = Vec::with_capacity((w * h) as usize);
        for y in y0..y1 {
            let row = (y * self.width + x0) as usize;
            data.extend_from_slice(&self.data[row..row + w as usize]);
        }
        Frame::new(data, w, h)
    }
}

/// Bounding box for a detected face, in pixel coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One face observed in a frame, as produced by a recognition adapter.
#[derive(Debug, Clone)]
pub struct Observation {
    pub bounding_box: BoundingBox,
    /// The nearest registered user, if any template exists to compare against.
    pub candidate: Option<UserId>,
    /// Distance-like score on a 0–100 scale. **Lower is a stronger match**;
    /// 0 means identical features, 100 fully disjoint histograms.
    pub confidence: f32,
}

/// A stored face template for one registered user: the mean of that
/// user's enrolled sample feature vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceTemplate {
    pub user_id: UserId,
    pub features: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_interior() {
        // 4x4 frame with row-major values 0..16
        let frame = Frame::new((0..16).collect(), 4, 4);
        let crop = frame.crop(&BoundingBox {
            x: 1,
            y: 1,
            width: 2,
            height: 2,
        });
        assert_eq!(crop.width, 2);
        assert_eq!(crop.height, 2);
        assert_eq!(crop.data, vec![5, 6, 9, 10]);
    }

    #[test]
    fn test_crop_clamped_to_border() {
        let frame = Frame::new(vec![1; 16], 4, 4);
        let crop = frame.crop(&BoundingBox {
            x: 2,
            y: 2,
            width: 10,
            height: 10,
        });
        assert_eq!(crop.width, 2);
        assert_eq!(crop.height, 2);
    }

    #[test]
    fn test_crop_outside_is_empty() {
        let frame = Frame::new(vec![0; 16], 4, 4);
        let crop = frame.crop(&BoundingBox {
            x: 8,
            y: 8,
            width: 2,
            height: 2,
        });
        assert_eq!(crop.width, 0);
        assert_eq!(crop.height, 0);
        assert!(crop.data.is_empty());
    }
}
