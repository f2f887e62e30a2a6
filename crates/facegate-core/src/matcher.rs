//! Nearest-reference matching over labeled embeddings.

use thiserror::Error;

use crate::types::{Embedding, LabeledDescriptor, MatchLabel, MatchResult};

/// Distance beyond which the nearest reference is still "nobody we know".
///
/// This is the matcher's own separability cutoff, a property of the
/// embedding space. It is deliberately a separate constant from the
/// operator-facing acceptance threshold and is not user-tunable.
pub const DEFAULT_DISTANCE_CUTOFF: f32 = 0.6;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MatchError {
    #[error("no reference descriptors cached")]
    EmptyCache,
}

/// Finds the nearest labeled reference by Euclidean distance.
pub struct NearestMatcher {
    distance_cutoff: f32,
}

impl Default for NearestMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_DISTANCE_CUTOFF)
    }
}

impl NearestMatcher {
    pub fn new(distance_cutoff: f32) -> Self {
        Self { distance_cutoff }
    }

    pub fn distance_cutoff(&self) -> f32 {
        self.distance_cutoff
    }

    /// Match one probe embedding against the full reference set.
    ///
    /// Every reference is compared; the minimum distance wins. Exactly
    /// equal minima resolve to the first reference in iteration order.
    /// A nearest reference beyond the cutoff yields `MatchLabel::Unknown`
    /// with the distance still reported.
    ///
    /// Fails with [`MatchError::EmptyCache`] when there are no references;
    /// callers must treat every probe as unknown in that case rather than
    /// calling in.
    pub fn find_best(
        &self,
        probe: &Embedding,
        references: &[LabeledDescriptor],
    ) -> Result<MatchResult, MatchError> {
        let mut best: Option<(usize, f32)> = None;

        for (i, reference) in references.iter().enumerate() {
            let distance = probe.euclidean_distance(&reference.embedding);
            // Strict < keeps the first-inserted reference on exact ties.
            let is_better = match best {
                None => true,
                Some((_, best_distance)) => distance < best_distance,
            };
            if is_better {
                best = Some((i, distance));
            }
        }

        let (idx, distance) = best.ok_or(MatchError::EmptyCache)?;

        let label = if distance > self.distance_cutoff {
            MatchLabel::Unknown
        } else {
            MatchLabel::Known(references[idx].label.clone())
        };

        Ok(MatchResult { label, distance })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs() -> Vec<LabeledDescriptor> {
        vec![
            LabeledDescriptor::new("alice", Embedding::new(vec![1.0, 0.0, 0.0])),
            LabeledDescriptor::new("bob", Embedding::new(vec![0.0, 1.0, 0.0])),
        ]
    }

    #[test]
    fn test_nearest_reference_wins() {
        let matcher = NearestMatcher::default();
        let probe = Embedding::new(vec![0.9, 0.0, 0.0]);

        let result = matcher.find_best(&probe, &refs()).unwrap();
        assert_eq!(result.label, MatchLabel::Known("alice".into()));
        assert!((result.distance - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_beyond_cutoff_is_unknown() {
        let matcher = NearestMatcher::default();
        // Equidistant from both references, ~1.89 away from each.
        let probe = Embedding::new(vec![0.0, 0.0, 1.6]);

        let result = matcher.find_best(&probe, &refs()).unwrap();
        assert_eq!(result.label, MatchLabel::Unknown);
        assert!(result.distance > DEFAULT_DISTANCE_CUTOFF);
    }

    #[test]
    fn test_empty_reference_set_errors() {
        let matcher = NearestMatcher::default();
        let probe = Embedding::new(vec![1.0, 0.0, 0.0]);

        assert_eq!(
            matcher.find_best(&probe, &[]).unwrap_err(),
            MatchError::EmptyCache
        );
    }

    #[test]
    fn test_exact_tie_first_inserted_wins() {
        let matcher = NearestMatcher::default();
        // Equidistant (sqrt(0.5)) from both unit-axis references.
        let references = vec![
            LabeledDescriptor::new("first", Embedding::new(vec![1.0, 0.0])),
            LabeledDescriptor::new("second", Embedding::new(vec![0.0, 1.0])),
        ];
        let probe = Embedding::new(vec![0.5, 0.5]);

        let result = matcher.find_best(&probe, &references).unwrap();
        assert_eq!(result.label, MatchLabel::Known("first".into()));
    }

    #[test]
    fn test_all_references_compared() {
        // Best match is the last entry; earlier entries must not shadow it.
        let matcher = NearestMatcher::default();
        let references = vec![
            LabeledDescriptor::new("decoy1", Embedding::new(vec![0.0, 1.0, 0.0])),
            LabeledDescriptor::new("decoy2", Embedding::new(vec![0.0, 0.0, 1.0])),
            LabeledDescriptor::new("match", Embedding::new(vec![1.0, 0.0, 0.0])),
        ];
        let probe = Embedding::new(vec![1.0, 0.0, 0.0]);

        let result = matcher.find_best(&probe, &references).unwrap();
        assert_eq!(result.label, MatchLabel::Known("match".into()));
        assert!(result.distance.abs() < 1e-6);
    }

    #[test]
    fn test_cutoff_boundary_still_known() {
        // Distance exactly at the cutoff keeps the label; only beyond loses it.
        let matcher = NearestMatcher::new(0.5);
        let references = vec![LabeledDescriptor::new(
            "edge",
            Embedding::new(vec![0.5, 0.0]),
        )];
        let probe = Embedding::new(vec![0.0, 0.0]);

        let result = matcher.find_best(&probe, &references).unwrap();
        assert_eq!(result.label, MatchLabel::Known("edge".into()));
    }
}
