use crate::error::RagError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub mod local;
pub mod qdrant;

pub use local::LocalStore;
pub use qdrant::QdrantStore;

/// A stored passage: identifier, text, embedding and optional metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// A record returned by a similarity query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    /// Cosine similarity to the query, higher is closer
    pub score: f32,
}

/// Persists records per named collection and answers nearest-neighbour queries
#[allow(async_fn_in_trait)]
pub trait VectorStore {
    /// Names of all collections
    async fn list_collections(&self) -> Result<Vec<String>>;

    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// Identifiers already stored in `collection`; empty when it does not exist
    async fn existing_ids(&self, collection: &str) -> Result<HashSet<String>>;

    /// Create an empty collection unless it already exists.
    ///
    /// `dimension` is the vector length when known; stores that fix it at
    /// creation time fail without it.
    async fn create_collection(&self, collection: &str, dimension: Option<usize>) -> Result<()>;

    /// Add records, creating the collection on first write.
    ///
    /// A record whose id is already stored replaces the stored one, so repeating
    /// a write leaves the collection unchanged. Returns the number of records written.
    async fn write(&self, collection: &str, records: Vec<Record>) -> Result<usize>;

    /// The `k` records closest to `query`, nearest first.
    ///
    /// Fails with [`RagError::CollectionNotFound`] when the collection does not exist.
    async fn query(&self, collection: &str, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>>;

    /// Remove a whole collection
    async fn delete_collection(&self, collection: &str) -> Result<()>;
}

/// Reject names that are empty or could escape the store directory
pub fn validate_collection_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(RagError::InvalidCollectionName(name.to_string()).into())
    }
}

/// Store chosen at runtime from configuration
pub enum AnyStore {
    Local(LocalStore),
    Remote(QdrantStore),
}

impl VectorStore for AnyStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        match self {
            AnyStore::Local(store) => store.list_collections().await,
            AnyStore::Remote(store) => store.list_collections().await,
        }
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        match self {
            AnyStore::Local(store) => store.collection_exists(collection).await,
            AnyStore::Remote(store) => store.collection_exists(collection).await,
        }
    }

    async fn existing_ids(&self, collection: &str) -> Result<HashSet<String>> {
        match self {
            AnyStore::Local(store) => store.existing_ids(collection).await,
            AnyStore::Remote(store) => store.existing_ids(collection).await,
        }
    }

    async fn create_collection(&self, collection: &str, dimension: Option<usize>) -> Result<()> {
        match self {
            AnyStore::Local(store) => store.create_collection(collection, dimension).await,
            AnyStore::Remote(store) => store.create_collection(collection, dimension).await,
        }
    }

    async fn write(&self, collection: &str, records: Vec<Record>) -> Result<usize> {
        match self {
            AnyStore::Local(store) => store.write(collection, records).await,
            AnyStore::Remote(store) => store.write(collection, records).await,
        }
    }

    async fn query(&self, collection: &str, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        match self {
            AnyStore::Local(store) => store.query(collection, query, k).await,
            AnyStore::Remote(store) => store.query(collection, query, k).await,
        }
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        match self {
            AnyStore::Local(store) => store.delete_collection(collection).await,
            AnyStore::Remote(store) => store.delete_collection(collection).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_name_validation() {
        assert!(validate_collection_name("my_pdf_collection").is_ok());
        assert!(validate_collection_name("report-2024.v2").is_ok());
        for bad in ["", ".", "..", "../etc", "a/b", "with space"] {
            let err = validate_collection_name(bad).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<RagError>(),
                Some(RagError::InvalidCollectionName(_))
            ));
        }
    }
}
