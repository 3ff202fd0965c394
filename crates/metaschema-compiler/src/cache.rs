//! Thread-safe cache of decoded documents

use crate::Result;
use dashmap::DashMap;
use metaschema_model::RawDocument;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

/// Decoded raw documents keyed by path, shared between concurrent compilations.
///
/// Only the decode result is shared. Every import edge still places its own
/// copy in the graph being built.
#[derive(Debug, Default)]
pub struct DocumentCache {
    documents: DashMap<PathBuf, Arc<RawDocument>>,
    hits: AtomicUsize,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<Arc<RawDocument>> {
        self.documents.get(path).map(|entry| Arc::clone(entry.value()))
    }

    /// Store a decoded document; an entry that won a concurrent race is kept
    pub fn insert(&self, path: impl Into<PathBuf>, document: RawDocument) -> Arc<RawDocument> {
        Arc::clone(
            self.documents
                .entry(path.into())
                .or_insert_with(|| Arc::new(document))
                .value(),
        )
    }

    /// Return the cached document for `path`, decoding it with `decode` on a miss.
    ///
    /// The map is not locked while `decode` runs.
    pub fn get_or_decode(
        &self,
        path: &Path,
        decode: impl FnOnce() -> Result<RawDocument>,
    ) -> Result<Arc<RawDocument>> {
        if let Some(cached) = self.get(path) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit for document: {}", path.display());
            return Ok(cached);
        }

        trace!("Cache miss for document: {}", path.display());
        let document = decode()?;
        Ok(self.insert(path, document))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.documents.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Lookups answered from the cache so far
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.documents.clear();
    }
}
