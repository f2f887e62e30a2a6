//! Threshold gate: turns a match result into an accept/reject decision.

use crate::types::{Classification, MatchLabel, MatchResult, Outcome};

/// Lower bound of the operator-adjustable acceptance threshold.
///
/// Below this the gate is "too permissive" to mean anything; above
/// [`MAX_THRESHOLD`] it is "too strict". Out-of-range values are clamped
/// so those operator-facing semantics stay meaningful.
pub const MIN_THRESHOLD: f32 = 0.3;
/// Upper bound of the operator-adjustable acceptance threshold.
pub const MAX_THRESHOLD: f32 = 0.9;

/// Clamp an operator-supplied threshold into `[0.3, 0.9]`.
///
/// Never rejects: out-of-range input is pulled to the nearest bound, and
/// NaN falls to the lower bound.
pub fn clamp_threshold(value: f32) -> f32 {
    if value.is_nan() {
        return MIN_THRESHOLD;
    }
    value.clamp(MIN_THRESHOLD, MAX_THRESHOLD)
}

/// Classify a match result under the given acceptance threshold.
///
/// Pure and total: an unknown match rejects outright; a known match
/// rejects when `1 - distance` falls below the threshold (label retained
/// for diagnostics) and accepts otherwise. Exact equality accepts.
pub fn classify(result: &MatchResult, threshold: f32) -> Classification {
    let similarity = result.similarity();

    match &result.label {
        MatchLabel::Unknown => Classification {
            outcome: Outcome::RejectedUnknown,
            label: None,
            similarity,
        },
        MatchLabel::Known(label) if similarity < threshold => Classification {
            outcome: Outcome::RejectedLowSimilarity,
            label: Some(label.clone()),
            similarity,
        },
        MatchLabel::Known(label) => Classification {
            outcome: Outcome::Accepted,
            label: Some(label.clone()),
            similarity,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(distance: f32) -> MatchResult {
        MatchResult {
            label: MatchLabel::Known("alice".into()),
            distance,
        }
    }

    #[test]
    fn test_accepts_above_threshold() {
        let c = classify(&known(0.2), 0.7);
        assert_eq!(c.outcome, Outcome::Accepted);
        assert_eq!(c.label.as_deref(), Some("alice"));
        assert!((c.similarity - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_below_threshold_keeps_label() {
        let c = classify(&known(0.2), 0.9);
        assert_eq!(c.outcome, Outcome::RejectedLowSimilarity);
        // Label retained for diagnostics, not as a positive match.
        assert_eq!(c.label.as_deref(), Some("alice"));
    }

    #[test]
    fn test_boundary_equality_accepts() {
        let c = classify(&known(0.3), 0.7);
        assert_eq!(c.outcome, Outcome::Accepted);
    }

    #[test]
    fn test_unknown_rejects_regardless_of_threshold() {
        let result = MatchResult {
            label: MatchLabel::Unknown,
            distance: 0.05,
        };
        for threshold in [MIN_THRESHOLD, 0.5, MAX_THRESHOLD] {
            let c = classify(&result, threshold);
            assert_eq!(c.outcome, Outcome::RejectedUnknown);
            assert_eq!(c.label, None);
        }
    }

    #[test]
    fn test_gate_is_monotone_in_threshold() {
        // Anything accepted at a stricter threshold is accepted at a looser one.
        let thresholds = [0.3, 0.4, 0.5, 0.6, 0.65, 0.7, 0.8, 0.9];
        for result in [known(0.1), known(0.35), known(0.6)] {
            for (i, &t1) in thresholds.iter().enumerate() {
                for &t2 in &thresholds[i + 1..] {
                    if classify(&result, t2).is_accepted() {
                        assert!(
                            classify(&result, t1).is_accepted(),
                            "accepted at {t2} but not at looser {t1}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_clamp_threshold_bounds() {
        assert_eq!(clamp_threshold(0.1), MIN_THRESHOLD);
        assert_eq!(clamp_threshold(1.5), MAX_THRESHOLD);
        assert_eq!(clamp_threshold(0.55), 0.55);
        assert_eq!(clamp_threshold(f32::NAN), MIN_THRESHOLD);
    }
}
