//! Knowledge-base construction and status reporting.
//!
//! Walks the corpus folder, extracts and chunks each supported document,
//! embeds the chunks, and rebuilds the vector index from scratch. Broken
//! files are recorded in the build report rather than aborting the run,
//! so one bad PDF cannot block the rest of the corpus.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use walkdir::WalkDir;

use crate::chunk::chunk_into_clauses;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::extract::extract_text;
use crate::index::VectorIndex;
use crate::models::IndexedEntry;

/// File extensions picked up from the corpus folder.
pub const KB_EXTENSIONS: &[&str] = &["pdf", "docx", "txt", "md"];

#[derive(Debug, Serialize)]
pub struct ProcessedFile {
    pub file: String,
    pub chunks: usize,
}

/// Outcome of one corpus build. Per-file failures land in `errors`.
#[derive(Debug, Default, Serialize)]
pub struct BuildReport {
    pub processed_files: Vec<ProcessedFile>,
    pub total_chunks: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct KbStatus {
    pub kb_folder: String,
    pub corpus_files: usize,
    pub indexed_chunks: usize,
    pub embedding_model: String,
    pub llm_model: String,
}

/// Rebuild the index from the corpus folder and persist it.
///
/// The existing index contents are discarded first; a rebuild always
/// reflects exactly the current corpus.
pub async fn rebuild(
    config: &Config,
    index: &mut VectorIndex,
    embedder: &dyn Embedder,
) -> Result<BuildReport> {
    index.create();
    let report = build_into(config, index, embedder).await?;
    index.save()?;
    Ok(report)
}

async fn build_into(
    config: &Config,
    index: &mut VectorIndex,
    embedder: &dyn Embedder,
) -> Result<BuildReport> {
    let kb_dir = config.data.kb_dir();
    std::fs::create_dir_all(&kb_dir)
        .with_context(|| format!("Failed to create {}", kb_dir.display()))?;

    let mut report = BuildReport::default();

    for path in corpus_files(&kb_dir) {
        let display = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("<unnamed>")
            .to_string();

        match index_file(config, index, embedder, &path).await {
            Ok(0) => {
                report.errors.push(format!("{}: no text extracted", display));
            }
            Ok(chunks) => {
                report.total_chunks += chunks;
                report.processed_files.push(ProcessedFile {
                    file: display,
                    chunks,
                });
            }
            Err(e) => {
                report.errors.push(format!("{}: {}", display, e));
            }
        }
    }

    Ok(report)
}

/// Corpus files under `kb_dir` with a supported extension, in sorted
/// order so rebuilds are deterministic.
fn corpus_files(kb_dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = WalkDir::new(kb_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| KB_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// Extract, chunk, embed, and add one corpus file. Returns the number of
/// chunks indexed.
async fn index_file(
    config: &Config,
    index: &mut VectorIndex,
    embedder: &dyn Embedder,
    path: &Path,
) -> Result<usize> {
    let text = extract_text(path).map_err(|e| anyhow::anyhow!("{}", e))?;
    let clauses = chunk_into_clauses(&text, config.chunking.max_chars);
    if clauses.is_empty() {
        return Ok(0);
    }

    let act = act_name(path);
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unnamed>")
        .to_string();

    let texts: Vec<String> = clauses.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed(&texts).await?;

    let entries: Vec<IndexedEntry> = clauses
        .iter()
        .enumerate()
        .map(|(i, clause)| IndexedEntry {
            id: format!("{}_{}", act, i),
            act: act.clone(),
            section: format!("sec_{}", i),
            text: clause.text.clone(),
            source: "KB".to_string(),
            filename: filename.clone(),
            chunk_id: clause.id.clone(),
        })
        .collect();

    let count = entries.len();
    index.add(vectors, entries)?;
    Ok(count)
}

/// Human-readable act name from a corpus filename: strip the extension,
/// turn underscores into spaces, and title-case each word.
fn act_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Unknown");

    stem.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Summarize the corpus folder and the loaded index.
pub fn status(config: &Config, index: &VectorIndex) -> KbStatus {
    let kb_dir = config.data.kb_dir();
    let corpus_files = corpus_files(&kb_dir).len();

    KbStatus {
        kb_folder: kb_dir.display().to_string(),
        corpus_files,
        indexed_chunks: index.len(),
        embedding_model: config
            .embedding
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string()),
        llm_model: config.generation.model.clone(),
    }
}
