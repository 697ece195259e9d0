//! Core data models flowing through the clausewise pipeline.
//!
//! These types represent the clauses, indexed corpus entries, and pipeline
//! results that move between chunking, retrieval, and generation.

use serde::{Deserialize, Serialize};

/// One segmented unit of a document's text — the addressable granularity
/// for retrieval and explanation.
///
/// Ids are assigned monotonically within a single chunking run
/// (`section_<n>` for structural splits, `chunk_<n>` for the word-packing
/// fallback) and are not globally unique across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub id: String,
    pub text: String,
}

/// One reference-corpus clause that has been embedded and stored in the
/// vector index. Created during a knowledge-base build, never mutated,
/// removed only by a full rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub id: String,
    /// Display name of the source act/document, derived from its filename.
    pub act: String,
    /// Synthetic section label (`sec_<n>`).
    pub section: String,
    pub text: String,
    pub source: String,
    pub filename: String,
    pub chunk_id: String,
}

/// An [`IndexedEntry`] annotated with its distance to the current query.
/// Ephemeral; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    #[serde(flatten)]
    pub entry: IndexedEntry,
    /// Squared Euclidean distance to the query vector. Lower is closer.
    pub score: f32,
}

/// Successful pipeline response.
#[derive(Debug, Serialize)]
pub struct PipelineAnswer {
    pub answer: String,
    pub user_clause: Clause,
    pub kb_hits: Vec<RetrievalResult>,
    pub document_type: String,
    pub sources: Vec<String>,
    pub model_used: String,
}

/// Terminal rejection: bad input, non-legal document, or an internal error
/// absorbed into a user-facing message.
#[derive(Debug, Serialize)]
pub struct PipelineRejection {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Outcome of a single pipeline run. Serializes to either the
/// `{answer, user_clause, kb_hits, ...}` or the `{error, suggestion?}` shape.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PipelineOutcome {
    Answer(PipelineAnswer),
    Rejected(PipelineRejection),
}

impl PipelineOutcome {
    /// Convenience for callers and tests that only care about success.
    pub fn is_answer(&self) -> bool {
        matches!(self, PipelineOutcome::Answer(_))
    }
}
