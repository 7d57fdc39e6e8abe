//! Recognition adapter — the seam between frame capture, face detection,
//! and the decision engine.
//!
//! Detection and frame capture are external collaborators behind traits;
//! [`TemplateRecognizer`] composes them with the LBP extractor and matcher
//! into the fixed-shape `(candidate, confidence)` observations the decision
//! engine consumes.

use thiserror::Error;

use crate::lbp::LbpExtractor;
use crate::matcher::{ChiSquareMatcher, Matcher};
use crate::types::{BoundingBox, FaceTemplate, Frame, Observation};

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("frame source: {0}")]
    Source(String),
    #[error("detector: {0}")]
    Detector(String),
}

/// Face detection collaborator: frame in, zero or more face boxes out.
pub trait FaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, RecognitionError>;
}

/// Supplies frames to a recognition session. `Ok(None)` ends the session;
/// this is the external stop signal.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, RecognitionError>;
}

/// Produces identity observations from a frame.
pub trait RecognitionAdapter {
    fn detect_and_identify(&mut self, frame: &Frame) -> Result<Vec<Observation>, RecognitionError>;
}

/// LBPH-style recognizer: detect faces, extract grid LBP features, match
/// each against the enrolled template gallery.
pub struct TemplateRecognizer<D> {
    detector: D,
    extractor: LbpExtractor,
    matcher: ChiSquareMatcher,
    gallery: Vec<FaceTemplate>,
}

impl<D: FaceDetector> TemplateRecognizer<D> {
    pub fn new(detector: D, gallery: Vec<FaceTemplate>) -> Self {
        Self {
            detector,
            extractor: LbpExtractor::default(),
            matcher: ChiSquareMatcher,
            gallery,
        }
    }

    pub fn gallery_len(&self) -> usize {
        self.gallery.len()
    }
}

impl<D: FaceDetector> RecognitionAdapter for TemplateRecognizer<D> {
    fn detect_and_identify(&mut self, frame: &Frame) -> Result<Vec<Observation>, RecognitionError> {
        let faces = self.detector.detect(frame)?;
        let mut observations = Vec::with_capacity(faces.len());
        for bounding_box in faces {
            let probe = self.extractor.extract(&frame.crop(&bounding_box));
            let observation = match self.matcher.nearest(&probe, &self.gallery) {
                Some(id) => Observation {
                    bounding_box,
                    candidate: Some(id.user_id),
                    confidence: id.confidence,
                },
                None => Observation {
                    bounding_box,
                    candidate: None,
                    confidence: 100.0,
                },
            };
            observations.push(observation);
        }
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Treats the whole frame as a single face.
    struct WholeFrame;

    impl FaceDetector for WholeFrame {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, RecognitionError> {
            Ok(vec![BoundingBox {
                x: 0,
                y: 0,
                width: frame.width,
                height: frame.height,
            }])
        }
    }

    fn checkerboard(invert: bool) -> Frame {
        let data = (0..64u32)
            .flat_map(|y| {
                (0..64u32).map(move |x| {
                    let on = (x / 8 + y / 8) % 2 == 0;
                    if on != invert {
                        255u8
                    } else {
                        0u8
                    }
                })
            })
            .collect();
        Frame::new(data, 64, 64)
    }

    #[test]
    fn test_identifies_enrolled_face() {
        let frame = checkerboard(false);
        let extractor = LbpExtractor::default();
        let gallery = vec![FaceTemplate {
            user_id: 42,
            features: extractor.extract(&frame),
        }];

        let mut recognizer = TemplateRecognizer::new(WholeFrame, gallery);
        let observations = recognizer.detect_and_identify(&frame).unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].candidate, Some(42));
        assert!(observations[0].confidence < 1.0);
    }

    #[test]
    fn test_empty_gallery_yields_no_candidate() {
        let mut recognizer = TemplateRecognizer::new(WholeFrame, vec![]);
        let observations = recognizer.detect_and_identify(&checkerboard(false)).unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].candidate, None);
        assert_eq!(observations[0].confidence, 100.0);
    }

    #[test]
    fn test_nearest_of_two_users() {
        let mine = checkerboard(false);
        let other = checkerboard(true);
        let extractor = LbpExtractor::default();
        let gallery = vec![
            FaceTemplate {
                user_id: 1,
                features: extractor.extract(&other),
            },
            FaceTemplate {
                user_id: 2,
                features: extractor.extract(&mine),
            },
        ];

        let mut recognizer = TemplateRecognizer::new(WholeFrame, gallery);
        let observations = recognizer.detect_and_identify(&mine).unwrap();
        assert_eq!(observations[0].candidate, Some(2));
    }
}
