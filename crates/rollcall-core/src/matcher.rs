//! Template matching by chi-square histogram distance.

use crate::types::{FaceTemplate, UserId};

const HISTOGRAM_BINS: usize = 256;

/// The nearest gallery template to a probe, with its distance-like score.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub user_id: UserId,
    /// 0–100 scale, lower is a stronger match.
    pub confidence: f32,
}

/// Strategy for finding the nearest enrolled template to a probe vector.
pub trait Matcher {
    /// Returns `None` when the gallery holds no comparable template.
    fn nearest(&self, probe: &[f32], gallery: &[FaceTemplate]) -> Option<Identification>;
}

/// Chi-square distance over grid LBP histograms.
///
/// Distances are rescaled to 0–100: unit-sum cell histograms bound the raw
/// chi-square at 2 per cell, so identical features score 0 and fully
/// disjoint histograms score 100.
pub struct ChiSquareMatcher;

impl Matcher for ChiSquareMatcher {
    fn nearest(&self, probe: &[f32], gallery: &[FaceTemplate]) -> Option<Identification> {
        if probe.is_empty() {
            return None;
        }
        let cells = (probe.len() / HISTOGRAM_BINS).max(1);
        let scale = 100.0 / (2.0 * cells as f32);

        let mut best: Option<Identification> = None;
        for template in gallery {
            // Templates from a different extractor geometry are not comparable.
            if template.features.len() != probe.len() {
                tracing::warn!(
                    user_id = template.user_id,
                    expected = probe.len(),
                    actual = template.features.len(),
                    "skipping template with mismatched feature length"
                );
                continue;
            }
            let confidence = chi_square(probe, &template.features) * scale;
            let is_better = best
                .as_ref()
                .map(|b| confidence < b.confidence)
                .unwrap_or(true);
            if is_better {
                best = Some(Identification {
                    user_id: template.user_id,
                    confidence,
                });
            }
        }
        best
    }
}

/// Chi-square distance between two histograms of equal length.
pub fn chi_square(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let sum = x + y;
            if sum > 0.0 {
                (x - y) * (x - y) / sum
            } else {
                0.0
            }
        })
        .sum()
}
