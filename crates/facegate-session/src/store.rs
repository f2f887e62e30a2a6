//! In-memory record store, used for wiring sessions and in tests.

use std::sync::{Arc, Mutex};

use chrono::Utc;

use facegate_core::{Embedding, LabeledDescriptor};

use crate::traits::{FaceRecord, RecognitionSink, RecordStore, SinkError, StoreError};

struct StoredFace {
    record: FaceRecord,
    embedding: Embedding,
}

/// Registration-ordered identity store behind a mutex.
///
/// Insertion order is preserved so the matcher's first-inserted tie-break
/// is deterministic.
#[derive(Default)]
pub struct MemoryStore {
    faces: Mutex<Vec<StoredFace>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn list_all(&self) -> Result<Vec<FaceRecord>, StoreError> {
        let faces = self.faces.lock().expect("store lock poisoned");
        Ok(faces.iter().map(|f| f.record.clone()).collect())
    }

    fn get_descriptors(&self) -> Result<Vec<LabeledDescriptor>, StoreError> {
        let faces = self.faces.lock().expect("store lock poisoned");
        Ok(faces
            .iter()
            .map(|f| LabeledDescriptor::new(f.record.label.clone(), f.embedding.clone()))
            .collect())
    }

    fn register(&self, label: &str, embedding: Embedding) -> Result<(), StoreError> {
        if label.trim().is_empty() {
            return Err(StoreError::EmptyLabel);
        }
        let mut faces = self.faces.lock().expect("store lock poisoned");
        if faces.iter().any(|f| f.record.label == label) {
            return Err(StoreError::DuplicateLabel(label.to_string()));
        }
        // All stored embeddings share one fixed length; the first
        // registration sets it.
        if let Some(first) = faces.first() {
            if first.embedding.len() != embedding.len() {
                return Err(StoreError::DimensionMismatch {
                    expected: first.embedding.len(),
                    got: embedding.len(),
                });
            }
        }
        let now = Utc::now();
        faces.push(StoredFace {
            record: FaceRecord {
                label: label.to_string(),
                recognition_count: 0,
                last_seen: now,
                registered_at: now,
            },
            embedding,
        });
        tracing::info!(label, "identity registered");
        Ok(())
    }

    fn delete(&self, label: &str) -> Result<(), StoreError> {
        let mut faces = self.faces.lock().expect("store lock poisoned");
        let before = faces.len();
        faces.retain(|f| f.record.label != label);
        if faces.len() == before {
            return Err(StoreError::NotFound(label.to_string()));
        }
        tracing::info!(label, "identity deleted");
        Ok(())
    }

    fn record_recognition(&self, label: &str) -> Result<FaceRecord, StoreError> {
        let mut faces = self.faces.lock().expect("store lock poisoned");
        let face = faces
            .iter_mut()
            .find(|f| f.record.label == label)
            .ok_or_else(|| StoreError::NotFound(label.to_string()))?;
        face.record.recognition_count += 1;
        face.record.last_seen = Utc::now();
        Ok(face.record.clone())
    }

    fn history(&self) -> Result<Vec<FaceRecord>, StoreError> {
        let mut records = self.list_all()?;
        records.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        Ok(records)
    }
}

/// Adapts a [`RecordStore`] into a [`RecognitionSink`]: each accepted
/// recognition bumps the identity's counter and `last_seen`.
pub struct StoreRecognitionSink {
    store: Arc<dyn RecordStore>,
}

impl StoreRecognitionSink {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

impl RecognitionSink for StoreRecognitionSink {
    fn notify_recognized(&self, label: &str) -> Result<(), SinkError> {
        self.store
            .record_recognition(label)
            .map(|record| {
                tracing::debug!(
                    label,
                    count = record.recognition_count,
                    "recognition recorded"
                );
            })
            .map_err(|err| SinkError::Failed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_rejects_duplicate_label() {
        let store = MemoryStore::new();
        store
            .register("alice", Embedding::new(vec![1.0, 0.0]))
            .unwrap();
        assert_eq!(
            store
                .register("alice", Embedding::new(vec![0.0, 1.0]))
                .unwrap_err(),
            StoreError::DuplicateLabel("alice".into())
        );
    }

    #[test]
    fn test_register_rejects_empty_label() {
        let store = MemoryStore::new();
        assert_eq!(
            store.register("  ", Embedding::new(vec![1.0])).unwrap_err(),
            StoreError::EmptyLabel
        );
    }

    #[test]
    fn test_register_rejects_mismatched_dimensions() {
        let store = MemoryStore::new();
        store
            .register("alice", Embedding::new(vec![1.0, 0.0, 0.0]))
            .unwrap();
        assert_eq!(
            store
                .register("bob", Embedding::new(vec![0.0, 1.0]))
                .unwrap_err(),
            StoreError::DimensionMismatch {
                expected: 3,
                got: 2
            }
        );
    }

    #[test]
    fn test_delete_missing_label_not_found() {
        let store = MemoryStore::new();
        assert_eq!(
            store.delete("ghost").unwrap_err(),
            StoreError::NotFound("ghost".into())
        );
    }

    #[test]
    fn test_record_recognition_bumps_counter_and_last_seen() {
        let store = MemoryStore::new();
        store
            .register("alice", Embedding::new(vec![1.0, 0.0]))
            .unwrap();
        let registered = store.list_all().unwrap()[0].clone();

        let first = store.record_recognition("alice").unwrap();
        let second = store.record_recognition("alice").unwrap();

        assert_eq!(first.recognition_count, 1);
        assert_eq!(second.recognition_count, 2);
        assert!(second.last_seen >= registered.registered_at);

        assert_eq!(
            store.record_recognition("ghost").unwrap_err(),
            StoreError::NotFound("ghost".into())
        );
    }

    #[test]
    fn test_descriptors_preserve_registration_order() {
        let store = MemoryStore::new();
        store
            .register("first", Embedding::new(vec![1.0, 0.0]))
            .unwrap();
        store
            .register("second", Embedding::new(vec![0.0, 1.0]))
            .unwrap();

        let descriptors = store.get_descriptors().unwrap();
        assert_eq!(descriptors[0].label, "first");
        assert_eq!(descriptors[1].label, "second");
    }

    #[test]
    fn test_history_sorted_most_recent_first() {
        let store = MemoryStore::new();
        store
            .register("alice", Embedding::new(vec![1.0, 0.0]))
            .unwrap();
        store
            .register("bob", Embedding::new(vec![0.0, 1.0]))
            .unwrap();

        store.record_recognition("alice").unwrap();

        let history = store.history().unwrap();
        assert_eq!(history[0].label, "alice");
        assert_eq!(history[1].label, "bob");
    }

    #[test]
    fn test_store_sink_records_and_reports_failures() {
        let store = Arc::new(MemoryStore::new());
        store
            .register("alice", Embedding::new(vec![1.0, 0.0]))
            .unwrap();

        let sink = StoreRecognitionSink::new(store.clone());
        sink.notify_recognized("alice").unwrap();
        assert_eq!(store.list_all().unwrap()[0].recognition_count, 1);

        assert!(sink.notify_recognized("ghost").is_err());
    }
}
