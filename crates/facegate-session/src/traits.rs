//! Collaborator contracts consumed by the session engine.
//!
//! Detection, embedding extraction, identity storage, and recognition
//! notification are all external capabilities. The engine drives them
//! through these traits and owns none of their implementations (the
//! in-memory [`crate::store::MemoryStore`] exists for wiring and tests,
//! not durability).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use facegate_core::{Detection, Embedding, LabeledDescriptor};

/// One frame pulled from an acquired frame source, opaque to the engine
/// and passed through to the extractor.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("frame source unavailable: {0}")]
    Unavailable(String),
    #[error("frame capture failed: {0}")]
    CaptureFailed(String),
}

/// A video/frame device that can be acquired for a capture session.
///
/// Acquisition is scoped: the returned stream holds the device and
/// releases it on drop, so every exit path of a session gives it back.
pub trait FrameSource: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameStream>, SourceError>;
}

/// An acquired, exclusive handle on a frame source.
pub trait FrameStream: Send {
    fn pull_frame(&mut self) -> Result<Frame, SourceError>;
}

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("extractor failed: {0}")]
    Failed(String),
}

/// Face detection + embedding extraction capability.
pub trait EmbeddingExtractor: Send + Sync {
    /// True once the model set is loaded. The session skips ticks until then.
    fn is_ready(&self) -> bool;

    /// All faces in the frame, each with a bounding box and embedding.
    fn detect_all(&self, frame: &Frame) -> Result<Vec<Detection>, ExtractorError>;

    /// The single most prominent face, if any. Used for enrollment capture.
    fn detect_single(&self, frame: &Frame) -> Result<Option<Detection>, ExtractorError>;
}

/// A stored identity with its recognition bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceRecord {
    pub label: String,
    pub recognition_count: u64,
    pub last_seen: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("identity already registered: {0}")]
    DuplicateLabel(String),
    #[error("identity not found: {0}")]
    NotFound(String),
    #[error("label must not be empty")]
    EmptyLabel,
    #[error("embedding has {got} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// CRUD over registered identities.
pub trait RecordStore: Send + Sync {
    /// Every registered identity with its bookkeeping fields.
    fn list_all(&self) -> Result<Vec<FaceRecord>, StoreError>;

    /// The labeled reference embeddings, in registration order.
    fn get_descriptors(&self) -> Result<Vec<LabeledDescriptor>, StoreError>;

    /// Register a new identity. Labels are unique.
    fn register(&self, label: &str, embedding: Embedding) -> Result<(), StoreError>;

    /// Remove an identity by label.
    fn delete(&self, label: &str) -> Result<(), StoreError>;

    /// Bump the recognition counter and `last_seen` for a known identity.
    fn record_recognition(&self, label: &str) -> Result<FaceRecord, StoreError>;

    /// Identities ordered by `last_seen`, most recent first.
    fn history(&self) -> Result<Vec<FaceRecord>, StoreError>;
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("recognition sink failed: {0}")]
    Failed(String),
}

/// Best-effort notification of an accepted recognition.
///
/// The session logs and swallows failures; a broken sink never stops a
/// capture.
pub trait RecognitionSink: Send + Sync {
    fn notify_recognized(&self, label: &str) -> Result<(), SinkError>;
}
