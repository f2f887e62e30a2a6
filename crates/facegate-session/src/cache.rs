//! Descriptor cache: the current reference set, swapped wholesale.

use std::sync::{Arc, RwLock};

use thiserror::Error;

use facegate_core::LabeledDescriptor;

use crate::traits::RecordStore;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("record store unreachable: {0}")]
    SourceUnavailable(String),
}

/// Holds the labeled reference embeddings the matcher runs against.
///
/// Refresh replaces the whole set atomically; readers take an `Arc`
/// snapshot and keep a consistent view for as long as they hold it, so a
/// refresh concurrent with an in-flight tick never changes that tick's
/// results.
#[derive(Default)]
pub struct DescriptorCache {
    descriptors: RwLock<Arc<Vec<LabeledDescriptor>>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the full reference set from the record store.
    ///
    /// On store failure the cache is cleared rather than left stale:
    /// recognizing against a deleted identity is worse than recognizing
    /// nothing. Returns the number of descriptors loaded.
    pub fn refresh(&self, store: &dyn RecordStore) -> Result<usize, CacheError> {
        match store.get_descriptors() {
            Ok(descriptors) => {
                let count = descriptors.len();
                *self.descriptors.write().expect("descriptor lock poisoned") =
                    Arc::new(descriptors);
                tracing::info!(count, "descriptor cache refreshed");
                Ok(count)
            }
            Err(err) => {
                self.clear();
                tracing::warn!(error = %err, "descriptor refresh failed; cache cleared");
                Err(CacheError::SourceUnavailable(err.to_string()))
            }
        }
    }

    /// Consistent view of the current reference set.
    pub fn snapshot(&self) -> Arc<Vec<LabeledDescriptor>> {
        Arc::clone(&self.descriptors.read().expect("descriptor lock poisoned"))
    }

    /// True once at least one reference descriptor is present.
    pub fn is_ready(&self) -> bool {
        !self.is_empty()
    }

    pub fn len(&self) -> usize {
        self.descriptors
            .read()
            .expect("descriptor lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        *self.descriptors.write().expect("descriptor lock poisoned") = Arc::new(Vec::new());
    }
}
