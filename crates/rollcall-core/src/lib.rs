//! rollcall-core — face recognition types and the attendance decision engine.
//!
//! Recognition is an LBPH-style pipeline: grid local-binary-pattern
//! histograms matched against per-user templates by chi-square distance.
//! The decision engine gates identifications by a distance-like confidence
//! score and marks attendance at most once per user per day.

pub mod decision;
pub mod lbp;
pub mod matcher;
pub mod recognize;
pub mod types;

pub use decision::{
    Clock, Decision, DecisionEngine, Ledger, MarkOutcome, SessionCache, SystemClock,
};
pub use lbp::LbpExtractor;
pub use matcher::{ChiSquareMatcher, Identification, Matcher};
pub use recognize::{
    FaceDetector, FrameSource, RecognitionAdapter, RecognitionError, TemplateRecognizer,
};
pub use types::{BoundingBox, FaceTemplate, Frame, Observation, UserId};
