//! facegate-core — Face-matching decision logic.
//!
//! Pure nearest-reference matching over labeled face embeddings and the
//! threshold gate that turns match distances into accept/reject decisions.
//! No I/O, no async: detection, embedding extraction, and storage live in
//! collaborating crates.

pub mod gate;
pub mod matcher;
pub mod types;

pub use gate::{clamp_threshold, classify, MAX_THRESHOLD, MIN_THRESHOLD};
pub use matcher::{MatchError, NearestMatcher, DEFAULT_DISTANCE_CUTOFF};
pub use types::{
    BoundingBox, Classification, Detection, Embedding, LabeledDescriptor, MatchLabel, MatchResult,
    Outcome,
};
