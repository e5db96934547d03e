use crate::error::RagError;
use crate::store::{validate_collection_name, LocalStore, VectorStore};
use anyhow::{Context, Result};
use log::{info, warn};

/// Records uploaded per write call
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Target name used when none is given
pub fn default_target_name(source: &str) -> String {
    format!("{}_cloud", source)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub source: String,
    pub target: String,
    pub records: usize,
    pub batches: usize,
    /// Whether an existing target collection was deleted first
    pub replaced_existing: bool,
}

/// Copy every record of local collection `from` into `to` on `target`.
///
/// Ids, texts, embeddings and metadata are copied as stored. An existing target
/// collection is an error unless `overwrite` is set, in which case it is
/// deleted before the upload starts. The target collection exists afterwards
/// even when the source holds no records.
pub async fn migrate_collection<S: VectorStore>(
    source: &LocalStore,
    target: &S,
    from: &str,
    to: &str,
    overwrite: bool,
    batch_size: usize,
) -> Result<MigrationReport> {
    validate_collection_name(from)?;
    validate_collection_name(to)?;
    let batch_size = batch_size.max(1);

    let records = source
        .records(from)
        .await
        .with_context(|| format!("Failed to read local collection {}", from))?;
    info!("Read {} records from local collection {}", records.len(), from);

    let mut replaced_existing = false;
    if target.collection_exists(to).await? {
        if !overwrite {
            return Err(RagError::CollectionExists(to.to_string()).into());
        }
        warn!("Deleting existing target collection {}", to);
        target.delete_collection(to).await?;
        replaced_existing = true;
    }

    // Created up front so an empty source still yields the target
    let dimension = records.first().map(|r| r.embedding.len());
    target
        .create_collection(to, dimension)
        .await
        .with_context(|| format!("Failed to create target collection {}", to))?;

    let total_batches = records.len().div_ceil(batch_size);
    let mut uploaded = 0;
    for (batch_index, batch) in records.chunks(batch_size).enumerate() {
        info!("Uploading batch {}/{}", batch_index + 1, total_batches);
        uploaded += target
            .write(to, batch.to_vec())
            .await
            .with_context(|| format!("Failed to upload batch {}", batch_index + 1))?;
    }

    info!("Uploaded {} records to {}", uploaded, to);
    Ok(MigrationReport {
        source: from.to_string(),
        target: to.to_string(),
        records: uploaded,
        batches: total_batches,
        replaced_existing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_target_name() {
        assert_eq!(default_target_name("my_pdf_collection"), "my_pdf_collection_cloud");
    }
}
