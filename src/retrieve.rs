//! Thresholded retrieval over the vector index.
//!
//! Wraps an [`Embedder`] and a [`VectorIndex`] behind one call that never
//! fails: embedding or search errors degrade to an empty hit list so the
//! pipeline can still answer from the user's document alone.

use crate::embedding::{embed_query, Embedder};
use crate::index::VectorIndex;
use crate::models::RetrievalResult;

pub struct Retriever<'a> {
    index: &'a VectorIndex,
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a VectorIndex, embedder: &'a dyn Embedder) -> Self {
        Self { index, embedder }
    }

    /// Embed `text` and return up to `top_k` index hits closer than
    /// `max_distance` (squared L2, lower is closer).
    ///
    /// Blank input, an empty index, embedding failures, and search
    /// failures all yield an empty vec. Failures are reported on stderr
    /// but never propagate.
    pub async fn retrieve(
        &self,
        text: &str,
        top_k: usize,
        max_distance: f32,
    ) -> Vec<RetrievalResult> {
        if text.trim().is_empty() || self.index.is_empty() {
            return vec![];
        }

        let query = match embed_query(self.embedder, text).await {
            Ok(q) => q,
            Err(e) => {
                eprintln!("Warning: query embedding failed: {}", e);
                return vec![];
            }
        };

        let mut hits = match self.index.search(&query, top_k) {
            Ok(h) => h,
            Err(e) => {
                eprintln!("Warning: index search failed: {}", e);
                return vec![];
            }
        };

        hits.retain(|h| h.score < max_distance);
        hits.truncate(top_k);
        hits
    }
}
