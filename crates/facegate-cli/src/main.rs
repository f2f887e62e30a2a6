use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use facegate_core::{
    clamp_threshold, classify, BoundingBox, Classification, Detection, Embedding,
    LabeledDescriptor, MatchError, NearestMatcher, Outcome,
};
use facegate_session::{
    CaptureSession, DescriptorCache, EmbeddingExtractor, ExtractorError, Frame, FrameSource,
    FrameStream, MemoryStore, RecordStore, SessionConfig, SourceError, StoreRecognitionSink,
};

mod config;

#[derive(Parser)]
#[command(name = "facegate", about = "Facegate face-matching decision engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one embedding against a gallery
    Match {
        /// Gallery file: JSON array of labeled descriptors
        #[arg(short, long)]
        gallery: PathBuf,
        /// Probe file: JSON embedding ({"values": [...]})
        #[arg(short, long)]
        embedding: PathBuf,
        /// Acceptance threshold (defaults to FACEGATE_THRESHOLD or 0.6)
        #[arg(short, long)]
        threshold: Option<f32>,
    },
    /// Run a simulated capture session over a scripted scenario
    Watch {
        /// Gallery file: JSON array of labeled descriptors
        #[arg(short, long)]
        gallery: PathBuf,
        /// Scenario file: JSON array of frames, each an array of embeddings
        #[arg(short, long)]
        scenario: PathBuf,
        /// Acceptance threshold (defaults to FACEGATE_THRESHOLD or 0.6)
        #[arg(short, long)]
        threshold: Option<f32>,
        /// Tick period in milliseconds (defaults to FACEGATE_TICK_INTERVAL_MS or 1000)
        #[arg(short, long)]
        interval_ms: Option<u64>,
        /// Number of ticks to run (defaults to the scenario length)
        #[arg(long)]
        ticks: Option<usize>,
    },
    /// List the identities in a gallery file
    List {
        /// Gallery file: JSON array of labeled descriptors
        #[arg(short, long)]
        gallery: PathBuf,
    },
}

/// Replays a scripted scenario: frame N carries sequence N, and the
/// extractor hands back the N-th entry of the scenario (no faces once the
/// script runs out).
struct ReplaySource;

struct ReplayStream {
    sequence: u32,
}

impl FrameSource for ReplaySource {
    fn open(&self) -> Result<Box<dyn FrameStream>, SourceError> {
        Ok(Box::new(ReplayStream { sequence: 0 }))
    }
}

impl FrameStream for ReplayStream {
    fn pull_frame(&mut self) -> Result<Frame, SourceError> {
        self.sequence += 1;
        Ok(Frame {
            data: Vec::new(),
            width: 640,
            height: 480,
            sequence: self.sequence,
        })
    }
}

struct ReplayExtractor {
    frames: Vec<Vec<Embedding>>,
    served: AtomicUsize,
}

impl ReplayExtractor {
    fn new(frames: Vec<Vec<Embedding>>) -> Self {
        Self {
            frames,
            served: AtomicUsize::new(0),
        }
    }

    fn exhausted(&self) -> bool {
        self.served.load(Ordering::SeqCst) >= self.frames.len()
    }

    fn detections_for(&self, frame: &Frame) -> Vec<Detection> {
        let idx = frame.sequence.saturating_sub(1) as usize;
        self.served.fetch_max(idx + 1, Ordering::SeqCst);
        self.frames
            .get(idx)
            .map(|embeddings| {
                embeddings
                    .iter()
                    .map(|embedding| Detection {
                        bounding_box: BoundingBox {
                            x: 0.0,
                            y: 0.0,
                            width: 0.0,
                            height: 0.0,
                            confidence: 1.0,
                        },
                        embedding: embedding.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl EmbeddingExtractor for ReplayExtractor {
    fn is_ready(&self) -> bool {
        true
    }

    fn detect_all(&self, frame: &Frame) -> Result<Vec<Detection>, ExtractorError> {
        Ok(self.detections_for(frame))
    }

    fn detect_single(&self, frame: &Frame) -> Result<Option<Detection>, ExtractorError> {
        Ok(self.detections_for(frame).into_iter().next())
    }
}

fn load_gallery(path: &Path) -> Result<Vec<LabeledDescriptor>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read gallery {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse gallery {}", path.display()))
}

fn load_embedding(path: &Path) -> Result<Embedding> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read embedding {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse embedding {}", path.display()))
}

fn load_scenario(path: &Path) -> Result<Vec<Vec<Embedding>>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse scenario {}", path.display()))
}

fn run_match(gallery: &Path, embedding: &Path, threshold: f32) -> Result<()> {
    let references = load_gallery(gallery)?;
    let probe = load_embedding(embedding)?;
    let matcher = NearestMatcher::default();

    let classification = match matcher.find_best(&probe, &references) {
        Ok(result) => classify(&result, threshold),
        Err(MatchError::EmptyCache) => Classification {
            outcome: Outcome::RejectedUnknown,
            label: None,
            similarity: 0.0,
        },
    };

    println!("{}", serde_json::to_string_pretty(&classification)?);
    Ok(())
}

/// How many ticks a watch run executes: the operator's cap when given,
/// otherwise one tick per scripted frame.
fn planned_ticks(scenario_len: usize, cap: Option<usize>) -> usize {
    cap.unwrap_or(scenario_len)
}

async fn run_watch(
    gallery: &Path,
    scenario: &Path,
    threshold: f32,
    interval: Duration,
    ticks: Option<usize>,
) -> Result<()> {
    let references = load_gallery(gallery)?;
    let frames = load_scenario(scenario)?;
    let tick_count = planned_ticks(frames.len(), ticks);

    let store = Arc::new(MemoryStore::new());
    for descriptor in &references {
        store
            .register(&descriptor.label, descriptor.embedding.clone())
            .with_context(|| format!("bad gallery entry {:?}", descriptor.label))?;
    }

    let cache = Arc::new(DescriptorCache::new());
    cache
        .refresh(store.as_ref())
        .context("descriptor cache refresh failed")?;

    let extractor = Arc::new(ReplayExtractor::new(frames));
    let session = CaptureSession::new(
        NearestMatcher::default(),
        cache,
        extractor.clone(),
        Arc::new(StoreRecognitionSink::new(store.clone())),
        SessionConfig {
            tick_interval: interval,
            threshold,
        },
    );

    session
        .start(&ReplaySource)
        .await
        .context("failed to start capture session")?;

    // Small slack past each tick boundary so the report is in before we read.
    let slack = Duration::from_millis(20);
    for tick in 1..=tick_count {
        tokio::time::sleep(interval + slack).await;
        match session.latest_report() {
            Some(report) => println!("tick {tick}: {}", report.summary),
            None => println!("tick {tick}: (pending)"),
        }
        if extractor.exhausted() {
            break;
        }
    }

    session.stop().await;

    println!("\nrecognition history:");
    for record in store.history().context("history fetch failed")? {
        println!(
            "  {}: {} recognitions, last seen {}",
            record.label, record.recognition_count, record.last_seen
        );
    }
    Ok(())
}

fn run_list(gallery: &Path) -> Result<()> {
    let references = load_gallery(gallery)?;
    if references.is_empty() {
        println!("gallery is empty");
        return Ok(());
    }
    for descriptor in &references {
        println!(
            "{} ({} dims)",
            descriptor.label,
            descriptor.embedding.values.len()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let defaults = config::Config::from_env();

    match cli.command {
        Commands::Match {
            gallery,
            embedding,
            threshold,
        } => {
            let threshold = clamp_threshold(threshold.unwrap_or(defaults.threshold));
            run_match(&gallery, &embedding, threshold)?;
        }
        Commands::Watch {
            gallery,
            scenario,
            threshold,
            interval_ms,
            ticks,
        } => {
            let threshold = clamp_threshold(threshold.unwrap_or(defaults.threshold));
            let interval =
                Duration::from_millis(interval_ms.unwrap_or(defaults.tick_interval_ms));
            run_watch(&gallery, &scenario, threshold, interval, ticks).await?;
        }
        Commands::List { gallery } => {
            run_list(&gallery)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u32) -> Frame {
        Frame {
            data: Vec::new(),
            width: 640,
            height: 480,
            sequence,
        }
    }

    #[test]
    fn test_planned_ticks_cap_overrides_scenario_length() {
        assert_eq!(planned_ticks(4, None), 4);
        assert_eq!(planned_ticks(4, Some(2)), 2);
        assert_eq!(planned_ticks(4, Some(10)), 10);
    }

    #[test]
    fn test_replay_extractor_serves_script_then_nothing() {
        let extractor = ReplayExtractor::new(vec![
            vec![Embedding::new(vec![1.0, 0.0])],
            Vec::new(),
        ]);

        assert_eq!(extractor.detect_all(&frame(1)).unwrap().len(), 1);
        assert!(!extractor.exhausted());

        assert!(extractor.detect_all(&frame(2)).unwrap().is_empty());
        assert!(extractor.exhausted());

        // Past the end of the script: no faces, still exhausted.
        assert!(extractor.detect_all(&frame(3)).unwrap().is_empty());
        assert!(extractor.exhausted());
    }
}
