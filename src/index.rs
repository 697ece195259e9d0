//! Flat vector index with file persistence.
//!
//! Stores embedding vectors alongside their [`IndexedEntry`] metadata and
//! answers nearest-neighbor queries by exhaustive squared-L2 scan. The
//! vector/metadata lists stay the same length at all times; bulk adds are
//! validated before any mutation so a bad batch leaves the index untouched.
//!
//! # On-Disk Format
//!
//! Vectors persist to the index path as a small binary file:
//!
//! ```text
//! [0..4)   magic  b"CWIX"
//! [4..8)   format version, u32 LE
//! [8..12)  dims,  u32 LE
//! [12..16) count, u32 LE
//! [16..)   count × dims little-endian f32 values
//! ```
//!
//! Metadata persists next to it as `<index>.meta.json`, a JSON array of
//! entries in vector order. A missing file opens as an empty index; a
//! corrupt or mismatched file is discarded with a warning rather than
//! aborting startup.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::models::{IndexedEntry, RetrievalResult};

const INDEX_MAGIC: &[u8; 4] = b"CWIX";
const INDEX_VERSION: u32 = 1;
const HEADER_LEN: usize = 16;

/// In-memory flat index over fixed-dimension vectors.
pub struct VectorIndex {
    dims: usize,
    path: PathBuf,
    vectors: Vec<Vec<f32>>,
    entries: Vec<IndexedEntry>,
}

impl VectorIndex {
    /// Create an empty index that will persist to `path`.
    pub fn new(dims: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            dims,
            path: path.into(),
            vectors: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Open the index at `path`, loading persisted vectors if present.
    ///
    /// A missing file yields an empty index. A corrupt file or one whose
    /// dimensionality does not match `dims` is discarded with a warning
    /// on stderr and replaced by an empty index.
    pub fn open(dims: usize, path: impl Into<PathBuf>) -> Self {
        let mut index = Self::new(dims, path);
        index.load();
        index
    }

    /// Drop all vectors and entries, keeping dims and path.
    pub fn create(&mut self) {
        self.vectors.clear();
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[IndexedEntry] {
        &self.entries
    }

    /// Append a batch of vectors with their metadata.
    ///
    /// The batch is validated in full before any mutation: vector and
    /// entry counts must match, and every vector must have the index
    /// dimensionality. On error the index is unchanged.
    pub fn add(&mut self, vectors: Vec<Vec<f32>>, entries: Vec<IndexedEntry>) -> Result<()> {
        if vectors.len() != entries.len() {
            bail!(
                "Vector/entry count mismatch: {} vectors, {} entries",
                vectors.len(),
                entries.len()
            );
        }
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != self.dims {
                bail!(
                    "Vector {} has {} dims, index expects {}",
                    i,
                    v.len(),
                    self.dims
                );
            }
        }

        self.vectors.extend(vectors);
        self.entries.extend(entries);
        Ok(())
    }

    /// Append a single vector with its metadata.
    pub fn add_single(&mut self, vector: Vec<f32>, entry: IndexedEntry) -> Result<()> {
        self.add(vec![vector], vec![entry])
    }

    /// Return the `top_k` entries nearest to `query` by squared L2
    /// distance, ascending. Lower scores mean closer matches. An empty
    /// index returns an empty vec.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        if self.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }
        if query.len() != self.dims {
            bail!(
                "Query has {} dims, index expects {}",
                query.len(),
                self.dims
            );
        }

        let mut hits: Vec<RetrievalResult> = self
            .vectors
            .iter()
            .zip(self.entries.iter())
            .map(|(v, entry)| RetrievalResult {
                entry: entry.clone(),
                score: squared_l2(query, v),
            })
            .collect();

        hits.sort_by(|a, b| a.score.total_cmp(&b.score));
        hits.truncate(top_k.min(hits.len()));
        Ok(hits)
    }

    /// Persist vectors and metadata to disk.
    ///
    /// Writes the binary vector file to the index path and the entry
    /// metadata as JSON next to it.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut bytes = Vec::with_capacity(HEADER_LEN + self.vectors.len() * self.dims * 4);
        bytes.extend_from_slice(INDEX_MAGIC);
        bytes.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dims as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.vectors.len() as u32).to_le_bytes());
        for v in &self.vectors {
            bytes.extend_from_slice(&vec_to_blob(v));
        }
        std::fs::write(&self.path, bytes)
            .with_context(|| format!("Failed to write index to {}", self.path.display()))?;

        let meta = serde_json::to_vec_pretty(&self.entries)?;
        let meta_path = self.meta_path();
        std::fs::write(&meta_path, meta)
            .with_context(|| format!("Failed to write index metadata to {}", meta_path.display()))?;

        Ok(())
    }

    fn meta_path(&self) -> PathBuf {
        let mut os: OsString = self.path.clone().into_os_string();
        os.push(".meta.json");
        PathBuf::from(os)
    }

    fn load(&mut self) {
        if !self.path.exists() {
            return;
        }
        if let Err(e) = self.try_load() {
            eprintln!(
                "Warning: discarding unreadable index at {}: {}",
                self.path.display(),
                e
            );
            self.create();
        }
    }

    fn try_load(&mut self) -> Result<()> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read index at {}", self.path.display()))?;

        if bytes.len() < HEADER_LEN {
            bail!("Index file truncated: {} bytes", bytes.len());
        }
        if &bytes[0..4] != INDEX_MAGIC {
            bail!("Bad index magic");
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != INDEX_VERSION {
            bail!("Unsupported index version {}", version);
        }
        let dims = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let count = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;

        if dims != self.dims {
            bail!("Index has {} dims, expected {}", dims, self.dims);
        }

        let row_bytes = dims * 4;
        let expected = HEADER_LEN + count * row_bytes;
        if bytes.len() != expected {
            bail!(
                "Index file size mismatch: {} bytes, expected {}",
                bytes.len(),
                expected
            );
        }

        let mut vectors = Vec::with_capacity(count);
        for row in bytes[HEADER_LEN..].chunks_exact(row_bytes) {
            vectors.push(blob_to_vec(row));
        }

        let meta_path = self.meta_path();
        let meta_bytes = std::fs::read(&meta_path)
            .with_context(|| format!("Failed to read index metadata at {}", meta_path.display()))?;
        let entries: Vec<IndexedEntry> =
            serde_json::from_slice(&meta_bytes).context("Failed to parse index metadata")?;

        if entries.len() != vectors.len() {
            bail!(
                "Index metadata count mismatch: {} entries, {} vectors",
                entries.len(),
                vectors.len()
            );
        }

        self.vectors = vectors;
        self.entries = entries;
        Ok(())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(id: &str) -> IndexedEntry {
        IndexedEntry {
            id: id.to_string(),
            act: "Test Act".to_string(),
            section: "sec_0".to_string(),
            text: format!("text for {}", id),
            source: "KB".to_string(),
            filename: "test_act.txt".to_string(),
            chunk_id: "section_0".to_string(),
        }
    }

    #[test]
    fn test_add_keeps_lists_aligned() {
        let mut index = VectorIndex::new(2, "unused.index");
        index
            .add(
                vec![vec![0.0, 0.0], vec![1.0, 1.0]],
                vec![entry("a"), entry("b")],
            )
            .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.entries().len(), 2);
    }

    #[test]
    fn test_add_count_mismatch_leaves_index_unchanged() {
        let mut index = VectorIndex::new(2, "unused.index");
        let err = index.add(vec![vec![0.0, 0.0]], vec![entry("a"), entry("b")]);
        assert!(err.is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_add_dim_mismatch_leaves_index_unchanged() {
        let mut index = VectorIndex::new(2, "unused.index");
        let err = index.add(
            vec![vec![0.0, 0.0], vec![1.0, 1.0, 1.0]],
            vec![entry("a"), entry("b")],
        );
        assert!(err.is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_search_empty_index() {
        let index = VectorIndex::new(2, "unused.index");
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_search_orders_by_distance() {
        let mut index = VectorIndex::new(2, "unused.index");
        index
            .add(
                vec![vec![10.0, 10.0], vec![0.1, 0.1], vec![5.0, 5.0]],
                vec![entry("far"), entry("near"), entry("mid")],
            )
            .unwrap();

        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(hits[0].entry.id, "near");
        assert_eq!(hits[1].entry.id, "mid");
        assert_eq!(hits[2].entry.id, "far");
        assert!(hits[0].score <= hits[1].score);
        assert!(hits[1].score <= hits[2].score);
    }

    #[test]
    fn test_search_top_k_larger_than_index() {
        let mut index = VectorIndex::new(2, "unused.index");
        index.add_single(vec![1.0, 0.0], entry("only")).unwrap();
        let hits = index.search(&[0.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_search_query_dim_mismatch() {
        let mut index = VectorIndex::new(2, "unused.index");
        index.add_single(vec![1.0, 0.0], entry("only")).unwrap();
        assert!(index.search(&[0.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kb.index");

        let mut index = VectorIndex::new(3, &path);
        index
            .add(
                vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
                vec![entry("a"), entry("b")],
            )
            .unwrap();
        index.save().unwrap();

        let restored = VectorIndex::open(3, &path);
        assert_eq!(restored.len(), 2);

        let before = index.search(&[1.0, 0.1, 0.0], 2).unwrap();
        let after = restored.search(&[1.0, 0.1, 0.0], 2).unwrap();
        assert_eq!(before.len(), after.len());
        for (x, y) in before.iter().zip(after.iter()) {
            assert_eq!(x.entry.id, y.entry.id);
            assert!((x.score - y.score).abs() < 1e-6);
        }
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let index = VectorIndex::open(3, dir.path().join("nope.index"));
        assert!(index.is_empty());
    }

    #[test]
    fn test_open_corrupt_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kb.index");
        std::fs::write(&path, b"not an index file").unwrap();

        let index = VectorIndex::open(3, &path);
        assert!(index.is_empty());
    }

    #[test]
    fn test_open_dims_mismatch_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kb.index");

        let mut index = VectorIndex::new(2, &path);
        index.add_single(vec![1.0, 2.0], entry("a")).unwrap();
        index.save().unwrap();

        let reopened = VectorIndex::open(3, &path);
        assert!(reopened.is_empty());
    }
}
