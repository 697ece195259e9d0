//! Question answering over an uploaded document.
//!
//! [`RagPipeline`] ties the other modules together: classify the clauses
//! as legal material, pick the clause most relevant to the question,
//! retrieve supporting knowledge-base references, build the explanation
//! prompt, and generate the answer with bounded retry.
//!
//! The pipeline never returns `Err` to its caller. Rejections (non-legal
//! input, empty input) and internal failures all surface as a
//! [`PipelineOutcome::Rejected`] so the CLI and any future HTTP surface
//! can serialize one shape.

use anyhow::{bail, Result};

use crate::classify::is_legal_document;
use crate::config::Config;
use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::generate::{generate_with_retry, Generator, RetryPolicy};
use crate::index::VectorIndex;
use crate::models::{Clause, PipelineAnswer, PipelineOutcome, PipelineRejection, RetrievalResult};
use crate::retrieve::Retriever;

const NOT_LEGAL_ERROR: &str = "This document does not appear to be a legal or government \
     document. Clausewise is designed specifically for analyzing legal contracts, government \
     policies, regulations, and official documents.";

const NOT_LEGAL_SUGGESTION: &str = "Please upload a legal contract, government notification, \
     policy document, or official regulation for analysis.";

/// Characters of each reference shown in the prompt.
const KB_PREVIEW_CHARS: usize = 350;

const EXPLANATION_PROMPT: &str = r#"You are Clausewise, a legal document assistant that explains legal and government documents in plain English for ordinary citizens.

USER'S DOCUMENT:
{user_clause}

USER QUESTION:
{query}

REFERENCE MATERIAL:
{kb_info}

Explain the document in simple, everyday language. Avoid legal jargon; where a legal term is unavoidable, define it immediately. Structure your answer under exactly these headings:

**What this document is**
**What this means in simple English**
**Key points to understand**
**What you should know**
**Next steps**

Base the explanation on the user's document. Use the reference material only to add context about applicable laws and regulations."#;

pub struct RagPipeline<'a> {
    config: &'a Config,
    index: &'a VectorIndex,
    embedder: &'a dyn Embedder,
    generator: &'a dyn Generator,
}

impl<'a> RagPipeline<'a> {
    pub fn new(
        config: &'a Config,
        index: &'a VectorIndex,
        embedder: &'a dyn Embedder,
        generator: &'a dyn Generator,
    ) -> Self {
        Self {
            config,
            index,
            embedder,
            generator,
        }
    }

    /// Answer `query` against the document `clauses`.
    ///
    /// Internal errors are absorbed into a rejection; callers always get
    /// a serializable outcome.
    pub async fn run(&self, clauses: &[Clause], query: &str) -> PipelineOutcome {
        match self.run_inner(clauses, query).await {
            Ok(outcome) => outcome,
            Err(e) => PipelineOutcome::Rejected(PipelineRejection {
                error: format!("Error processing request: {}", e),
                suggestion: None,
            }),
        }
    }

    async fn run_inner(&self, clauses: &[Clause], query: &str) -> Result<PipelineOutcome> {
        if clauses.is_empty() {
            return Ok(reject("No document clauses provided"));
        }

        let usable: Vec<&Clause> = clauses
            .iter()
            .filter(|c| !c.text.trim().is_empty())
            .collect();
        if usable.is_empty() {
            return Ok(reject("No valid text found in document clauses"));
        }

        let full_text = usable
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if !is_legal_document(&full_text, self.config.classifier.min_keyword_hits) {
            return Ok(PipelineOutcome::Rejected(PipelineRejection {
                error: NOT_LEGAL_ERROR.to_string(),
                suggestion: Some(NOT_LEGAL_SUGGESTION.to_string()),
            }));
        }

        let clause_texts: Vec<String> = usable.iter().map(|c| c.text.clone()).collect();
        let clause_vecs = self.embedder.embed(&clause_texts).await?;
        if clause_vecs.len() != usable.len() {
            bail!(
                "Embedder returned {} vectors for {} clauses",
                clause_vecs.len(),
                usable.len()
            );
        }
        let query_vec = embed_query(self.embedder, query).await?;

        let best = best_clause_index(&clause_vecs, &query_vec);
        let user_clause = usable[best].clone();

        let retriever = Retriever::new(self.index, self.embedder);
        let kb_hits = retriever
            .retrieve(
                query,
                self.config.retrieval.top_k,
                self.config.retrieval.max_distance,
            )
            .await;

        let prompt = build_prompt(&user_clause.text, query, &kb_hits);
        let policy = RetryPolicy {
            max_attempts: self.config.generation.max_attempts,
        };
        let answer = generate_with_retry(self.generator, &prompt, policy).await;

        let sources = kb_hits
            .iter()
            .map(|h| format!("{} - {}", h.entry.act, h.entry.section))
            .collect();

        Ok(PipelineOutcome::Answer(PipelineAnswer {
            answer,
            user_clause,
            kb_hits,
            document_type: "legal".to_string(),
            sources,
            model_used: format!("{} - legal analysis", self.generator.model_name()),
        }))
    }
}

fn reject(error: &str) -> PipelineOutcome {
    PipelineOutcome::Rejected(PipelineRejection {
        error: error.to_string(),
        suggestion: None,
    })
}

/// Index of the clause most similar to the query by cosine similarity.
/// Ties keep the earliest clause; a single clause wins by default.
fn best_clause_index(clause_vecs: &[Vec<f32>], query_vec: &[f32]) -> usize {
    if clause_vecs.len() <= 1 {
        return 0;
    }

    let mut best = 0usize;
    let mut best_sim = cosine_similarity(&clause_vecs[0], query_vec);
    for (i, v) in clause_vecs.iter().enumerate().skip(1) {
        let sim = cosine_similarity(v, query_vec);
        if sim > best_sim {
            best = i;
            best_sim = sim;
        }
    }
    best
}

fn build_prompt(user_clause: &str, query: &str, kb_hits: &[RetrievalResult]) -> String {
    let kb_info = if kb_hits.is_empty() {
        "No specific legal references found in knowledge base.".to_string()
    } else {
        let mut info = String::new();
        for (i, hit) in kb_hits.iter().enumerate() {
            let preview: String = hit.entry.text.chars().take(KB_PREVIEW_CHARS).collect();
            info.push_str(&format!(
                "Reference {} ({}):\n{}...\n\n",
                i + 1,
                hit.entry.act,
                preview
            ));
        }
        info
    };

    EXPLANATION_PROMPT
        .replace("{user_clause}", user_clause)
        .replace("{query}", query)
        .replace("{kb_info}", &kb_info)
}
