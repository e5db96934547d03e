use super::{validate_collection_name, Record, ScoredRecord, VectorStore};
use crate::embeddings::cosine_similarity;
use crate::error::RagError;
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const COLLECTION_EXTENSION: &str = "json";

/// On-disk layout of one collection file
#[derive(Debug, Serialize, Deserialize)]
struct StoredCollection {
    name: String,
    records: Vec<Record>,
}

/// Vector store keeping one JSON file per collection under a directory
pub struct LocalStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create store directory {}", root.display()))?;
        info!("Using local vector store at {}", root.display());

        Ok(LocalStore {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", collection, COLLECTION_EXTENSION))
    }

    async fn load(&self, collection: &str) -> Result<Option<StoredCollection>> {
        validate_collection_name(collection)?;
        let path = self.collection_path(collection);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read collection {}", path.display()))
            }
        };

        let stored: StoredCollection = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt collection file {}", path.display()))?;
        Ok(Some(stored))
    }

    async fn save(&self, stored: &StoredCollection) -> Result<()> {
        let path = self.collection_path(&stored.name);
        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string(stored)?;

        fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Every record of a collection, in insertion order
    pub async fn records(&self, collection: &str) -> Result<Vec<Record>> {
        self.load(collection)
            .await?
            .map(|stored| stored.records)
            .ok_or_else(|| RagError::CollectionNotFound(collection.to_string()).into())
    }
}

impl VectorStore for LocalStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .with_context(|| format!("Failed to list {}", self.root.display()))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(COLLECTION_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_collection_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        validate_collection_name(collection)?;
        Ok(fs::try_exists(self.collection_path(collection)).await?)
    }

    async fn existing_ids(&self, collection: &str) -> Result<HashSet<String>> {
        Ok(self
            .load(collection)
            .await?
            .map(|stored| stored.records.into_iter().map(|r| r.id).collect())
            .unwrap_or_default())
    }

    async fn create_collection(&self, collection: &str, _dimension: Option<usize>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.load(collection).await?.is_some() {
            return Ok(());
        }
        info!("Creating collection {}", collection);
        self.save(&StoredCollection {
            name: collection.to_string(),
            records: Vec::new(),
        })
        .await
    }

    async fn write(&self, collection: &str, records: Vec<Record>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let mut stored = match self.load(collection).await? {
            Some(stored) => stored,
            None => {
                info!("Creating collection {}", collection);
                StoredCollection {
                    name: collection.to_string(),
                    records: Vec::new(),
                }
            }
        };

        let written = records.len();
        for record in records {
            match stored.records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => stored.records.push(record),
            }
        }

        self.save(&stored).await?;
        debug!(
            "Wrote {} records to {} ({} total)",
            written,
            collection,
            stored.records.len()
        );
        Ok(written)
    }

    async fn query(&self, collection: &str, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        let stored = self
            .load(collection)
            .await?
            .ok_or_else(|| RagError::CollectionNotFound(collection.to_string()))?;

        let mut scored: Vec<ScoredRecord> = stored
            .records
            .into_iter()
            .map(|record| ScoredRecord {
                score: cosine_similarity(query, &record.embedding),
                id: record.id,
                text: record.text,
                metadata: record.metadata,
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        validate_collection_name(collection)?;
        let path = self.collection_path(collection);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RagError::CollectionNotFound(collection.to_string()).into())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }
}
