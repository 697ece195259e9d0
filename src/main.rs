//! # Clausewise CLI (`cw`)
//!
//! The `cw` binary drives the Clausewise pipeline: initializing local
//! storage, building the knowledge-base index, uploading documents, and
//! asking questions about them.
//!
//! ## Usage
//!
//! ```bash
//! cw --config ./config/cw.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cw init` | Create the SQLite database and data folders |
//! | `cw kb rebuild` | Rebuild the vector index from the corpus folder |
//! | `cw kb status` | Show corpus and index statistics |
//! | `cw upload <file>` | Extract, chunk, and store a document |
//! | `cw docs list` | List uploaded documents |
//! | `cw docs rm <id>` | Delete an uploaded document |
//! | `cw ask <doc-id> "<query>"` | Answer a question about a document |
//! | `cw retrieve "<text>"` | Query the knowledge base directly |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use clausewise::chunk::chunk_into_clauses;
use clausewise::config::{load_config, Config};
use clausewise::embedding::create_embedder;
use clausewise::extract::extract_text;
use clausewise::generate::create_generator;
use clausewise::index::VectorIndex;
use clausewise::kb;
use clausewise::rag::RagPipeline;
use clausewise::retrieve::Retriever;
use clausewise::store;

/// Clausewise CLI — explain legal and government documents in plain
/// English.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cw.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cw",
    about = "Clausewise — plain-English explanations of legal and government documents",
    version,
    long_about = "Clausewise chunks uploaded legal documents into clauses, verifies they are \
    legal/government material, retrieves supporting references from a local knowledge base of \
    acts and regulations, and generates plain-English explanations with an LLM."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/cw.toml`. Data locations, chunking,
    /// retrieval, embedding, and generation settings are read from this
    /// file.
    #[arg(long, global = true, default_value = "./config/cw.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize local storage.
    ///
    /// Creates the SQLite database, the knowledge-base corpus folder,
    /// and the uploads folder. Idempotent.
    Init,

    /// Manage the knowledge-base index.
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },

    /// Extract, chunk, and store a document for later questions.
    ///
    /// The file is copied into the uploads folder; re-uploading a file
    /// with identical text returns the existing document id.
    Upload {
        /// Path to a `.pdf`, `.docx`, `.txt`, or `.md` file.
        file: PathBuf,
    },

    /// Manage uploaded documents.
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Answer a question about an uploaded document.
    ///
    /// Prints the pipeline outcome as JSON: either an answer with its
    /// supporting references, or a rejection explaining why the document
    /// could not be analyzed.
    Ask {
        /// Document id returned by `cw upload`.
        doc_id: String,

        /// The question to answer.
        query: String,

        /// Override the number of knowledge-base references retrieved.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Query the knowledge base directly.
    ///
    /// Embeds the text and prints the nearest corpus chunks with their
    /// distances. Useful for inspecting index quality.
    Retrieve {
        /// Text to search the corpus for.
        text: String,
    },
}

/// Knowledge-base subcommands.
#[derive(Subcommand)]
enum KbAction {
    /// Rebuild the vector index from the corpus folder.
    ///
    /// Discards the existing index, re-extracts and re-embeds every
    /// supported file under the corpus folder, and persists the result.
    Rebuild,

    /// Show corpus and index statistics.
    Status,
}

/// Uploaded-document subcommands.
#[derive(Subcommand)]
enum DocsAction {
    /// List uploaded documents.
    List,

    /// Delete an uploaded document and its stored file.
    Rm {
        /// Document id returned by `cw upload`.
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&cfg).await?,
        Commands::Kb { action } => match action {
            KbAction::Rebuild => run_kb_rebuild(&cfg).await?,
            KbAction::Status => run_kb_status(&cfg)?,
        },
        Commands::Upload { file } => run_upload(&cfg, &file).await?,
        Commands::Docs { action } => match action {
            DocsAction::List => run_docs_list(&cfg).await?,
            DocsAction::Rm { id } => run_docs_rm(&cfg, &id).await?,
        },
        Commands::Ask {
            doc_id,
            query,
            top_k,
        } => run_ask(&cfg, &doc_id, &query, top_k).await?,
        Commands::Retrieve { text } => run_retrieve(&cfg, &text).await?,
    }

    Ok(())
}

async fn run_init(cfg: &Config) -> anyhow::Result<()> {
    let pool = store::connect(cfg).await?;
    store::init_schema(&pool).await?;
    std::fs::create_dir_all(cfg.data.kb_dir())?;
    std::fs::create_dir_all(cfg.data.uploads_dir())?;

    println!("Initialized.");
    println!("  database:   {}", cfg.data.db_path().display());
    println!("  kb folder:  {}", cfg.data.kb_dir().display());
    println!("  uploads:    {}", cfg.data.uploads_dir().display());
    Ok(())
}

async fn run_kb_rebuild(cfg: &Config) -> anyhow::Result<()> {
    let embedder = create_embedder(&cfg.embedding)?;
    let mut index = VectorIndex::new(cfg.embedding.dims(), cfg.data.index_path());

    let report = kb::rebuild(cfg, &mut index, embedder.as_ref()).await?;

    println!("Knowledge base rebuilt.");
    println!("  files indexed: {}", report.processed_files.len());
    println!("  total chunks:  {}", report.total_chunks);
    for f in &report.processed_files {
        println!("    {:<40} {} chunks", f.file, f.chunks);
    }
    if !report.errors.is_empty() {
        println!("  errors:");
        for e in &report.errors {
            println!("    {}", e);
        }
    }
    Ok(())
}

fn run_kb_status(cfg: &Config) -> anyhow::Result<()> {
    let index = VectorIndex::open(cfg.embedding.dims(), cfg.data.index_path());
    let st = kb::status(cfg, &index);

    println!("Knowledge base status:");
    println!("  corpus folder:   {}", st.kb_folder);
    println!("  corpus files:    {}", st.corpus_files);
    println!("  indexed chunks:  {}", st.indexed_chunks);
    println!("  embedding model: {}", st.embedding_model);
    println!("  llm model:       {}", st.llm_model);
    Ok(())
}

async fn run_upload(cfg: &Config, file: &PathBuf) -> anyhow::Result<()> {
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", file.display()))?;

    let text = extract_text(file).map_err(|e| anyhow::anyhow!("{}", e))?;
    if text.trim().is_empty() {
        anyhow::bail!("No text extracted from {}", file.display());
    }

    let clauses = chunk_into_clauses(&text, cfg.chunking.max_chars);

    let uploads = cfg.data.uploads_dir();
    std::fs::create_dir_all(&uploads)?;
    let stored = uploads.join(format!("user_{}_{}", uuid::Uuid::new_v4(), filename));
    std::fs::copy(file, &stored)?;

    let pool = store::connect(cfg).await?;
    store::init_schema(&pool).await?;
    let hash = store::text_hash(&text);
    let id = store::insert_doc(&pool, filename, &stored, &hash, &clauses).await?;

    println!("Uploaded {}", filename);
    println!("  id:      {}", id);
    println!("  clauses: {}", clauses.len());
    Ok(())
}

async fn run_docs_list(cfg: &Config) -> anyhow::Result<()> {
    let pool = store::connect(cfg).await?;
    store::init_schema(&pool).await?;
    let docs = store::list_docs(&pool).await?;

    if docs.is_empty() {
        println!("No uploaded documents.");
        return Ok(());
    }

    println!("{:<38} {:<30} CREATED", "ID", "FILENAME");
    for doc in docs {
        println!("{:<38} {:<30} {}", doc.id, doc.filename, doc.created_at);
    }
    Ok(())
}

async fn run_docs_rm(cfg: &Config, id: &str) -> anyhow::Result<()> {
    let pool = store::connect(cfg).await?;
    store::init_schema(&pool).await?;

    if store::delete_doc(&pool, id).await? {
        println!("Deleted {}", id);
    } else {
        anyhow::bail!("No document with id {}", id);
    }
    Ok(())
}

async fn run_ask(
    cfg: &Config,
    doc_id: &str,
    query: &str,
    top_k: Option<usize>,
) -> anyhow::Result<()> {
    let pool = store::connect(cfg).await?;
    store::init_schema(&pool).await?;

    let clauses = store::get_clauses(&pool, doc_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No document with id {}", doc_id))?;

    let mut cfg = cfg.clone();
    if let Some(k) = top_k {
        cfg.retrieval.top_k = k;
    }

    let index = VectorIndex::open(cfg.embedding.dims(), cfg.data.index_path());
    let embedder = create_embedder(&cfg.embedding)?;
    let generator = create_generator(&cfg.generation)?;

    let pipeline = RagPipeline::new(&cfg, &index, embedder.as_ref(), generator.as_ref());
    let outcome = pipeline.run(&clauses, query).await;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn run_retrieve(cfg: &Config, text: &str) -> anyhow::Result<()> {
    let index = VectorIndex::open(cfg.embedding.dims(), cfg.data.index_path());
    if index.is_empty() {
        println!("Index is empty. Run `cw kb rebuild` first.");
        return Ok(());
    }

    let embedder = create_embedder(&cfg.embedding)?;
    let retriever = Retriever::new(&index, embedder.as_ref());
    let hits = retriever
        .retrieve(text, cfg.retrieval.top_k, cfg.retrieval.max_distance)
        .await;

    if hits.is_empty() {
        println!("No matches within the distance ceiling.");
        return Ok(());
    }

    for hit in hits {
        println!(
            "{:.4}  {} ({})",
            hit.score, hit.entry.act, hit.entry.section
        );
        let preview: String = hit.entry.text.chars().take(160).collect();
        println!("        {}", preview.replace('\n', " "));
    }
    Ok(())
}
