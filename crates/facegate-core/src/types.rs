use serde::{Deserialize, Serialize};

/// Bounding box for a detected face within a frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// Face embedding vector (typically 128-dimensional).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compute Euclidean distance between two embeddings.
    ///
    /// Embeddings are fixed-length vectors; comparing mismatched lengths
    /// is a caller bug (debug builds assert on it).
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        debug_assert_eq!(
            self.values.len(),
            other.values.len(),
            "embedding dimension mismatch"
        );
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One face returned by the embedding extractor: where it is, and what it
/// looks like.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub embedding: Embedding,
}

/// A labeled reference embedding against which probes are matched.
///
/// Immutable once cached; the cached set is replaced wholesale on refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledDescriptor {
    pub label: String,
    pub embedding: Embedding,
}

impl LabeledDescriptor {
    pub fn new(label: impl Into<String>, embedding: Embedding) -> Self {
        Self {
            label: label.into(),
            embedding,
        }
    }
}

/// Identity assigned by the matcher.
///
/// `Unknown` replaces the string sentinel some matchers use for "nobody",
/// so absence of a match is type-checked rather than string-compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchLabel {
    Known(String),
    Unknown,
}

/// Result of matching one probe embedding against the reference set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub label: MatchLabel,
    /// Euclidean distance to the nearest reference (>= 0).
    pub distance: f32,
}

impl MatchResult {
    /// Normalized confidence that the probe matches the nearest reference.
    ///
    /// Defined as `1 - distance`, clamped to `[0, 1]`.
    pub fn similarity(&self) -> f32 {
        (1.0 - self.distance).clamp(0.0, 1.0)
    }
}

/// Decision for one detection after thresholding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Known identity at or above the operator threshold.
    Accepted,
    /// The matcher could not assign any identity.
    RejectedUnknown,
    /// Nearest identity known, but similarity fell below the threshold.
    RejectedLowSimilarity,
}

/// Final per-detection decision: outcome, identity (where one exists), and
/// the similarity that drove the decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub outcome: Outcome,
    /// Identity label. Present for `Accepted` and `RejectedLowSimilarity`
    /// (retained for diagnostics); absent for `RejectedUnknown`.
    pub label: Option<String>,
    /// Similarity in `[0, 1]`.
    pub similarity: f32,
}

impl Classification {
    pub fn is_accepted(&self) -> bool {
        self.outcome == Outcome::Accepted
    }
}
