//! Capture session: owns a frame stream and a periodic recognition tick.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use facegate_core::{
    clamp_threshold, classify, Classification, MatchError, NearestMatcher, Outcome,
};

use crate::cache::DescriptorCache;
use crate::traits::{EmbeddingExtractor, FrameSource, FrameStream, RecognitionSink, SourceError};

/// Default tick period: one detect → match → classify → report cycle per
/// second.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("capture already streaming")]
    AlreadyStreaming,
    #[error("frame source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),
}

/// Capture lifecycle. `Streaming` never falls back to `Idle`: stopping
/// always lands in `Stopped`, and a fresh `start()` re-enters `Streaming`
/// from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Idle,
    Streaming,
    Stopped,
}

/// One-line description of a tick for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TickSummary {
    /// Zero faces in the frame.
    NoFace,
    /// Faces detected, none accepted.
    Unrecognized,
    /// Accepted labels with their similarities.
    Recognized(Vec<(String, f32)>),
}

impl fmt::Display for TickSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickSummary::NoFace => write!(f, "no face"),
            TickSummary::Unrecognized => write!(f, "face detected but not recognized"),
            TickSummary::Recognized(matches) => {
                write!(f, "recognized: ")?;
                for (i, (label, similarity)) in matches.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{label} ({:.0}%)", similarity * 100.0)?;
                }
                Ok(())
            }
        }
    }
}

/// Everything one tick produced, kept for display until the next tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub accepted: Vec<Classification>,
    pub rejected: Vec<Classification>,
    pub summary: TickSummary,
}

/// Session tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tick_interval: Duration,
    /// Initial acceptance threshold; clamped into the valid range.
    pub threshold: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            threshold: 0.6,
        }
    }
}

// State the tick loop shares with the session handle.
struct Shared {
    status: Mutex<Status>,
    threshold: Mutex<f32>,
    latest: Mutex<Option<TickReport>>,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// One capture attempt: exclusive owner of its frame stream handle and its
/// tick schedule. The two are a single scoped resource pair, acquired
/// together by [`start`](Self::start) and released together by
/// [`stop`](Self::stop).
pub struct CaptureSession {
    matcher: Arc<NearestMatcher>,
    cache: Arc<DescriptorCache>,
    extractor: Arc<dyn EmbeddingExtractor>,
    sink: Arc<dyn RecognitionSink>,
    tick_interval: Duration,
    shared: Arc<Shared>,
    worker: tokio::sync::Mutex<Option<Worker>>,
}

impl CaptureSession {
    pub fn new(
        matcher: NearestMatcher,
        cache: Arc<DescriptorCache>,
        extractor: Arc<dyn EmbeddingExtractor>,
        sink: Arc<dyn RecognitionSink>,
        config: SessionConfig,
    ) -> Self {
        Self {
            matcher: Arc::new(matcher),
            cache,
            extractor,
            sink,
            tick_interval: config.tick_interval,
            shared: Arc::new(Shared {
                status: Mutex::new(Status::Idle),
                threshold: Mutex::new(clamp_threshold(config.threshold)),
                latest: Mutex::new(None),
            }),
            worker: tokio::sync::Mutex::new(None),
        }
    }

    pub fn status(&self) -> Status {
        *self.shared.status.lock().expect("status lock poisoned")
    }

    /// Set the acceptance threshold, clamped into `[0.3, 0.9]`.
    ///
    /// Returns the effective value; the next tick sees it.
    pub fn set_threshold(&self, value: f32) -> f32 {
        let clamped = clamp_threshold(value);
        *self.shared.threshold.lock().expect("threshold lock poisoned") = clamped;
        tracing::debug!(requested = value, effective = clamped, "threshold updated");
        clamped
    }

    pub fn threshold(&self) -> f32 {
        *self.shared.threshold.lock().expect("threshold lock poisoned")
    }

    /// Classifications from the most recent tick, for display.
    pub fn latest_report(&self) -> Option<TickReport> {
        self.shared.latest.lock().expect("report lock poisoned").clone()
    }

    /// Acquire the frame source and begin ticking.
    ///
    /// Fails with [`SessionError::AlreadyStreaming`] if a tick schedule is
    /// already live (a second start must never create a second schedule),
    /// and with [`SessionError::SourceUnavailable`] if the source cannot be
    /// acquired, in which case the session stays in its prior state.
    pub async fn start(&self, source: &dyn FrameSource) -> Result<(), SessionError> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return Err(SessionError::AlreadyStreaming);
        }

        let stream = source.open()?;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(tick_loop(
            Arc::clone(&self.shared),
            stream,
            Arc::clone(&self.matcher),
            Arc::clone(&self.cache),
            Arc::clone(&self.extractor),
            Arc::clone(&self.sink),
            self.tick_interval,
            cancel.clone(),
        ));

        *self.shared.status.lock().expect("status lock poisoned") = Status::Streaming;
        *worker = Some(Worker { cancel, handle });
        tracing::info!(interval = ?self.tick_interval, "capture session streaming");
        Ok(())
    }

    /// Cancel the tick schedule and release the frame stream.
    ///
    /// Idempotent; safe to call from a task other than the one that called
    /// `start()`. When this returns, no further tick fires and the latest
    /// report is cleared.
    pub async fn stop(&self) {
        let mut worker = self.worker.lock().await;
        let Some(Worker { cancel, handle }) = worker.take() else {
            return;
        };

        cancel.cancel();
        if let Err(err) = handle.await {
            tracing::warn!(error = %err, "tick loop join failed");
        }

        *self.shared.status.lock().expect("status lock poisoned") = Status::Stopped;
        self.shared
            .latest
            .lock()
            .expect("report lock poisoned")
            .take();
        tracing::info!("capture session stopped");
    }
}

#[allow(clippy::too_many_arguments)]
async fn tick_loop(
    shared: Arc<Shared>,
    mut stream: Box<dyn FrameStream>,
    matcher: Arc<NearestMatcher>,
    cache: Arc<DescriptorCache>,
    extractor: Arc<dyn EmbeddingExtractor>,
    sink: Arc<dyn RecognitionSink>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);
    // A tick still finishing when the next is due causes a skip, never a
    // queued burst: no two ticks for one session may overlap.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("tick loop cancelled");
                break;
            }
            _ = ticker.tick() => {
                run_tick(&shared, stream.as_mut(), &matcher, &cache, &extractor, &sink);
            }
        }
    }
    // Dropping the stream here releases the frame source.
}

/// One detect → match → classify → report cycle.
///
/// All failures are local: a bad frame or extractor error ends this tick
/// with a log line and the session keeps running.
fn run_tick(
    shared: &Shared,
    stream: &mut dyn FrameStream,
    matcher: &NearestMatcher,
    cache: &DescriptorCache,
    extractor: &Arc<dyn EmbeddingExtractor>,
    sink: &Arc<dyn RecognitionSink>,
) {
    if !extractor.is_ready() || !cache.is_ready() {
        tracing::debug!(
            extractor_ready = extractor.is_ready(),
            cache_ready = cache.is_ready(),
            "tick skipped: not ready"
        );
        return;
    }

    let frame = match stream.pull_frame() {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(error = %err, "frame pull failed; tick dropped");
            return;
        }
    };

    let detections = match extractor.detect_all(&frame) {
        Ok(detections) => detections,
        Err(err) => {
            tracing::warn!(error = %err, seq = frame.sequence, "extractor failed; tick dropped");
            return;
        }
    };

    // One snapshot for the whole tick: a concurrent cache refresh never
    // changes results mid-flight.
    let references = cache.snapshot();
    let threshold = *shared.threshold.lock().expect("threshold lock poisoned");

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for detection in &detections {
        let classification = match matcher.find_best(&detection.embedding, &references) {
            Ok(result) => classify(&result, threshold),
            // The readiness check can race a refresh that emptied the
            // cache; treat the probe as unknown rather than erroring.
            Err(MatchError::EmptyCache) => Classification {
                outcome: Outcome::RejectedUnknown,
                label: None,
                similarity: 0.0,
            },
        };
        if classification.is_accepted() {
            accepted.push(classification);
        } else {
            rejected.push(classification);
        }
    }

    for classification in &accepted {
        if let Some(label) = classification.label.as_deref() {
            // Best-effort: a broken sink never stops the capture.
            if let Err(err) = sink.notify_recognized(label) {
                tracing::warn!(label, error = %err, "recognition sink failed");
            }
        }
    }

    let summary = if detections.is_empty() {
        TickSummary::NoFace
    } else if accepted.is_empty() {
        TickSummary::Unrecognized
    } else {
        TickSummary::Recognized(
            accepted
                .iter()
                .filter_map(|c| c.label.clone().map(|l| (l, c.similarity)))
                .collect(),
        )
    };

    tracing::debug!(
        seq = frame.sequence,
        detections = detections.len(),
        accepted = accepted.len(),
        rejected = rejected.len(),
        "tick complete"
    );

    *shared.latest.lock().expect("report lock poisoned") = Some(TickReport {
        accepted,
        rejected,
        summary,
    });
}
