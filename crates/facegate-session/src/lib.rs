//! facegate-session — The stateful half of the face-matching engine.
//!
//! Owns the descriptor cache, the capture session state machine with its
//! periodic recognition tick, and the collaborator contracts for frame
//! sources, embedding extractors, record stores, and recognition sinks.

pub mod cache;
pub mod session;
pub mod store;
pub mod traits;

pub use cache::{CacheError, DescriptorCache};
pub use session::{
    CaptureSession, SessionConfig, SessionError, Status, TickReport, TickSummary,
    DEFAULT_TICK_INTERVAL,
};
pub use store::{MemoryStore, StoreRecognitionSink};
pub use traits::{
    EmbeddingExtractor, ExtractorError, FaceRecord, Frame, FrameSource, FrameStream,
    RecognitionSink, RecordStore, SinkError, SourceError, StoreError,
};
