//! Frame sources and detectors for a local, camera-less deployment.
//!
//! Frames come from image files on disk; a directory of stills stands in
//! for a webcam feed. Detection assumes pre-cropped face images, which is
//! what registration photos and most webcam snapshot tools produce.

use std::path::{Path, PathBuf};

use rollcall_core::{BoundingBox, FaceDetector, Frame, FrameSource, RecognitionError};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Reads image files from a directory in name order, one frame each.
#[derive(Debug)]
pub struct ImageDirSource {
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageDirSource {
    pub fn open(dir: &Path) -> Result<Self, RecognitionError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| RecognitionError::Source(format!("{}: {e}", dir.display())))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| {
                        let ext = ext.to_ascii_lowercase();
                        IMAGE_EXTENSIONS.iter().any(|&known| known == ext)
                    })
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        tracing::debug!(dir = %dir.display(), frames = files.len(), "opened image directory source");
        Ok(Self { files, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, RecognitionError> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        let gray = image::open(path)
            .map_err(|e| RecognitionError::Source(format!("{}: {e}", path.display())))?
            .to_luma8();
        let (width, height) = gray.dimensions();
        Ok(Some(Frame::new(gray.into_raw(), width, height)))
    }
}

/// Treats the whole frame as one face. Suitable for pre-cropped stills;
/// swap in a real detector for raw webcam frames.
pub struct FullFrameDetector;

impl FaceDetector for FullFrameDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, RecognitionError> {
        if frame.width == 0 || frame.height == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![BoundingBox {
            x: 0,
            y: 0,
            width: frame.width,
            height: frame.height,
        }])
    }
}
