//! Collection dumps with integrity and compression
//!
//! Features:
//! - One file per collection and point in time: `<collection>-<millis>.dump[.zst]`
//! - SHA-256 integrity hash over the serialized documents
//! - Optional zstd compression
//! - Format versioning for forward compatibility
//! - Retention policy (keep last N dumps per collection)
//! - `Backup` service: dump on demand, restore everything on startup

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::store::{Document, DocumentStore, StoreError};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum DumpError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailure { expected: String, actual: String },

    #[error("Unsupported dump version: {0}")]
    UnsupportedVersion(u32),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("No dumps found for {0}")]
    NoDumps(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Dump task failed: {0}")]
    Task(String),
}

// ── Dump ────────────────────────────────────────────────────────────

/// Current dump format version.
pub const DUMP_VERSION: u32 = 1;

const DUMP_EXT: &str = "dump";
const DUMP_ZST_EXT: &str = "dump.zst";

/// All documents of one collection at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDump {
    pub version: u32,
    pub collection: String,
    /// Unix millisecond timestamp when the dump was taken.
    pub timestamp: i64,
    pub documents: Vec<Document>,
    /// SHA-256 hash of the serialized documents.
    pub checksum: String,
}

impl CollectionDump {
    /// Create a new dump with computed integrity hash.
    pub fn new(
        collection: impl Into<String>,
        timestamp: i64,
        documents: Vec<Document>,
    ) -> Result<Self, DumpError> {
        let checksum = compute_hash(&documents)?;
        Ok(Self {
            version: DUMP_VERSION,
            collection: collection.into(),
            timestamp,
            documents,
            checksum,
        })
    }

    /// Verify the dump's integrity hash.
    pub fn verify_integrity(&self) -> Result<(), DumpError> {
        let actual = compute_hash(&self.documents)?;
        if actual != self.checksum {
            return Err(DumpError::IntegrityFailure {
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }
}

fn compute_hash(documents: &[Document]) -> Result<String, DumpError> {
    let bytes =
        serde_json::to_vec(documents).map_err(|e| DumpError::Serialization(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

// ── Dump Writer ─────────────────────────────────────────────────────

/// Writes dumps to disk with optional zstd compression.
pub struct DumpWriter {
    dir: PathBuf,
    compress: bool,
}

impl DumpWriter {
    pub fn new(dir: impl Into<PathBuf>, compress: bool) -> Self {
        Self {
            dir: dir.into(),
            compress,
        }
    }

    /// Write a dump atomically: serialize → compress → write tmp → rename.
    pub fn write(&self, dump: &CollectionDump) -> Result<PathBuf, DumpError> {
        fs::create_dir_all(&self.dir)?;

        let data = serde_json::to_vec(dump).map_err(|e| DumpError::Serialization(e.to_string()))?;

        let (final_data, ext) = if self.compress {
            let compressed = zstd::encode_all(data.as_slice(), 3)
                .map_err(|e| DumpError::Compression(e.to_string()))?;
            (compressed, DUMP_ZST_EXT)
        } else {
            (data, DUMP_EXT)
        };

        let filename = format!("{}-{:013}.{}", dump.collection, dump.timestamp, ext);
        let path = self.dir.join(&filename);
        let tmp_path = self.dir.join(format!("{}.tmp", filename));

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&final_data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        Ok(path)
    }
}

// ── Dump Loader ─────────────────────────────────────────────────────

/// Loads dumps from disk, verifying version and integrity.
pub struct DumpLoader {
    dir: PathBuf,
}

impl DumpLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load a specific dump file.
    pub fn load(&self, path: &Path) -> Result<CollectionDump, DumpError> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let is_compressed = path.extension().map(|e| e == "zst").unwrap_or(false);

        let decompressed = if is_compressed {
            zstd::decode_all(data.as_slice()).map_err(|e| DumpError::Compression(e.to_string()))?
        } else {
            data
        };

        let dump: CollectionDump = serde_json::from_slice(&decompressed)
            .map_err(|e| DumpError::Serialization(e.to_string()))?;

        if dump.version > DUMP_VERSION {
            return Err(DumpError::UnsupportedVersion(dump.version));
        }
        dump.verify_integrity()?;

        Ok(dump)
    }

    /// Load the latest dump of a collection.
    pub fn load_latest(&self, collection: &str) -> Result<CollectionDump, DumpError> {
        let (_, path) = self
            .list_dumps(collection)?
            .pop()
            .ok_or_else(|| DumpError::NoDumps(collection.to_string()))?;
        self.load(&path)
    }

    /// Dumps of a collection as (timestamp, path) pairs, oldest first.
    pub fn list_dumps(&self, collection: &str) -> Result<Vec<(i64, PathBuf)>, DumpError> {
        let mut results: Vec<(i64, PathBuf)> = self
            .scan()?
            .into_iter()
            .filter(|(name, _, _)| name == collection)
            .map(|(_, timestamp, path)| (timestamp, path))
            .collect();
        results.sort_by_key(|(timestamp, _)| *timestamp);
        Ok(results)
    }

    /// Collections that have at least one dump.
    pub fn collections(&self) -> Result<BTreeSet<String>, DumpError> {
        Ok(self.scan()?.into_iter().map(|(name, _, _)| name).collect())
    }

    fn scan(&self) -> Result<Vec<(String, i64, PathBuf)>, DumpError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some((collection, timestamp)) = Self::parse_name(&name) {
                results.push((collection, timestamp, entry.path()));
            }
        }
        Ok(results)
    }

    fn parse_name(filename: &str) -> Option<(String, i64)> {
        let stem = filename
            .strip_suffix(&format!(".{DUMP_ZST_EXT}"))
            .or_else(|| filename.strip_suffix(&format!(".{DUMP_EXT}")))?;
        let (collection, timestamp) = stem.rsplit_once('-')?;
        Some((collection.to_string(), timestamp.parse().ok()?))
    }
}

// ── Retention Policy ────────────────────────────────────────────────

/// Policy for cleaning up old dumps.
#[derive(Debug, Clone)]
pub struct DumpRetention {
    /// Maximum number of dumps to retain per collection.
    pub keep: usize,
}

impl DumpRetention {
    pub fn new(keep: usize) -> Self {
        Self { keep }
    }

    /// Remove old dumps of a collection, keeping only the most recent `keep`.
    pub fn cleanup(&self, dir: &Path, collection: &str) -> Result<Vec<PathBuf>, DumpError> {
        let dumps = DumpLoader::new(dir).list_dumps(collection)?;

        let mut removed = Vec::new();
        if dumps.len() > self.keep {
            let to_remove = dumps.len() - self.keep;
            for (_, path) in dumps.iter().take(to_remove) {
                fs::remove_file(path)?;
                removed.push(path.clone());
            }
        }
        Ok(removed)
    }
}

// ── Backup Service ──────────────────────────────────────────────────

/// Anything that can save a collection somewhere safe.
#[async_trait]
pub trait CollectionBackup: Send + Sync {
    async fn backup(&self, collection: &str) -> Result<(), DumpError>;
}

/// Dumps collections of a document store into a directory and restores them.
pub struct Backup {
    store: Arc<dyn DocumentStore>,
    dir: PathBuf,
    retention: DumpRetention,
}

impl Backup {
    pub fn new(store: Arc<dyn DocumentStore>, dir: impl Into<PathBuf>, keep: usize) -> Self {
        Self {
            store,
            dir: dir.into(),
            retention: DumpRetention::new(keep),
        }
    }

    /// Dump one collection and apply the retention policy.
    pub async fn dump(&self, collection: &str) -> Result<PathBuf, DumpError> {
        let documents = self.store.collection(collection).await?;
        let dump = CollectionDump::new(collection, Utc::now().timestamp_millis(), documents)?;

        let writer = DumpWriter::new(&self.dir, true);
        let retention = self.retention.clone();
        let dir = self.dir.clone();
        let collection = collection.to_string();

        let path = tokio::task::spawn_blocking(move || {
            let path = writer.write(&dump)?;
            retention.cleanup(&dir, &collection)?;
            Ok::<_, DumpError>(path)
        })
        .await
        .map_err(|e| DumpError::Task(e.to_string()))??;

        info!(path = %path.display(), "collection dumped");
        Ok(path)
    }

    /// Dump every non-empty collection.
    pub async fn dump_all(&self) -> Result<usize, DumpError> {
        let collections = self.store.collections().await?;
        for collection in &collections {
            self.dump(collection).await?;
        }
        Ok(collections.len())
    }

    /// Restore the latest dump of every collection that is empty in the store.
    ///
    /// Returns the number of restored collections.
    pub async fn restore_all(&self) -> Result<usize, DumpError> {
        let dir = self.dir.clone();
        let dumps = tokio::task::spawn_blocking(move || {
            let loader = DumpLoader::new(dir);
            loader
                .collections()?
                .into_iter()
                .map(|collection| loader.load_latest(&collection))
                .collect::<Result<Vec<_>, DumpError>>()
        })
        .await
        .map_err(|e| DumpError::Task(e.to_string()))??;

        let mut restored = 0;
        for dump in dumps {
            if !self.store.collection(&dump.collection).await?.is_empty() {
                warn!(collection = %dump.collection, "collection not empty, restore skipped");
                continue;
            }
            info!(
                collection = %dump.collection,
                documents = dump.documents.len(),
                "collection restored"
            );
            self.store.restore(&dump.collection, dump.documents).await?;
            restored += 1;
        }
        Ok(restored)
    }
}

#[async_trait]
impl CollectionBackup for Backup {
    async fn backup(&self, collection: &str) -> Result<(), DumpError> {
        self.dump(collection).await.map(|_| ())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
