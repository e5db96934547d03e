use super::{validate_collection_name, Record, ScoredRecord, VectorStore};
use crate::error::RagError;
use anyhow::{Context, Result};
use log::{debug, info};
use qdrant_client::qdrant::{
    point_id::PointIdOptions, CreateCollectionBuilder, Distance, PointStruct, ScrollPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Qdrant, QdrantError};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

const TEXT_KEY: &str = "text";
const RECORD_ID_KEY: &str = "record_id";
const METADATA_PREFIX: &str = "meta.";
const SCROLL_PAGE_SIZE: u32 = 256;

/// Remote vector store backed by a Qdrant endpoint
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Connect to `url`, optionally with an access token, and verify the endpoint answers
    pub async fn connect(url: &str, api_key: Option<&str>) -> Result<Self> {
        let config_builder = Qdrant::from_url(url);
        let config_builder = if let Some(api_key) = api_key {
            config_builder.api_key(api_key.to_string())
        } else {
            config_builder
        };

        let client = config_builder
            .build()
            .map_err(|e| RagError::Store(format!("failed to build client for {}: {}", url, e)))?;

        client
            .health_check()
            .await
            .map_err(|e| RagError::Store(format!("cannot reach {}: {}", url, e)))?;
        info!("Connected to remote vector store at {}", url);

        Ok(QdrantStore { client })
    }
}

/// Deterministic point id for a record id; Qdrant only accepts integers and UUIDs
pub fn point_id_for(record_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string()
}

fn store_error(e: QdrantError) -> RagError {
    RagError::Store(e.to_string())
}

fn record_payload(record: &Record) -> HashMap<String, Value> {
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert(TEXT_KEY.to_string(), Value::from(record.text.clone()));
    payload.insert(RECORD_ID_KEY.to_string(), Value::from(record.id.clone()));
    for (key, value) in &record.metadata {
        payload.insert(
            format!("{}{}", METADATA_PREFIX, key),
            Value::from(value.clone()),
        );
    }
    payload
}

fn payload_metadata(payload: &HashMap<String, Value>) -> BTreeMap<String, String> {
    payload
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(METADATA_PREFIX)?;
            Some((name.to_string(), value.as_str()?.to_string()))
        })
        .collect()
}

impl VectorStore for QdrantStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(store_error)?;
        let mut names: Vec<String> = response
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        validate_collection_name(collection)?;
        Ok(self
            .client
            .collection_exists(collection)
            .await
            .map_err(store_error)?)
    }

    async fn existing_ids(&self, collection: &str) -> Result<HashSet<String>> {
        if !self.collection_exists(collection).await? {
            return Ok(HashSet::new());
        }

        let mut ids = HashSet::new();
        let mut offset = None;
        loop {
            let mut request = ScrollPointsBuilder::new(collection)
                .limit(SCROLL_PAGE_SIZE)
                .with_payload(true)
                .with_vectors(false);
            if let Some(offset) = offset.take() {
                request = request.offset(offset);
            }

            let page = self
                .client
                .scroll(request)
                .await
                .map_err(store_error)
                .with_context(|| format!("Failed to scroll collection {}", collection))?;

            for point in page.result {
                if let Some(id) = point.payload.get(RECORD_ID_KEY).and_then(|v| v.as_str()) {
                    ids.insert(id.to_string());
                } else if let Some(PointIdOptions::Uuid(uuid)) =
                    point.id.and_then(|id| id.point_id_options)
                {
                    ids.insert(uuid);
                }
            }

            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        debug!("Collection {} holds {} ids", collection, ids.len());
        Ok(ids)
    }

    async fn create_collection(&self, collection: &str, dimension: Option<usize>) -> Result<()> {
        if self.collection_exists(collection).await? {
            return Ok(());
        }
        let dimension = dimension.ok_or_else(|| {
            RagError::Store(format!(
                "cannot create collection {} without a vector dimension",
                collection
            ))
        })?;

        let create_collection = CreateCollectionBuilder::new(collection)
            .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine));

        self.client
            .create_collection(create_collection)
            .await
            .map_err(store_error)
            .with_context(|| format!("Failed to create collection {}", collection))?;
        info!(
            "Created remote collection {} (dimension {})",
            collection, dimension
        );
        Ok(())
    }

    async fn write(&self, collection: &str, records: Vec<Record>) -> Result<usize> {
        validate_collection_name(collection)?;
        let Some(first) = records.first() else {
            return Ok(0);
        };

        self.create_collection(collection, Some(first.embedding.len()))
            .await?;

        let written = records.len();
        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|record| {
                let payload = record_payload(&record);
                PointStruct::new(point_id_for(&record.id), record.embedding, payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(store_error)
            .with_context(|| format!("Failed to upsert points in collection {}", collection))?;

        Ok(written)
    }

    async fn query(&self, collection: &str, query: &[f32], k: usize) -> Result<Vec<ScoredRecord>> {
        validate_collection_name(collection)?;

        let search_request =
            SearchPointsBuilder::new(collection, query.to_vec(), k as u64).with_payload(true);

        let search_response = match self.client.search_points(search_request).await {
            Ok(response) => response,
            Err(QdrantError::ResponseError { status })
                if status.code() == tonic::Code::NotFound =>
            {
                return Err(RagError::CollectionNotFound(collection.to_string()).into());
            }
            Err(e) => {
                return Err(store_error(e))
                    .with_context(|| format!("Failed to search collection {}", collection))
            }
        };

        let hits = search_response
            .result
            .into_iter()
            .filter_map(|scored_point| {
                let payload = scored_point.payload;
                let text = payload.get(TEXT_KEY)?.as_str()?.to_string();
                let id = payload
                    .get(RECORD_ID_KEY)
                    .and_then(|v| v.as_str())
                    .cloned()
                    .unwrap_or_default();
                Some(ScoredRecord {
                    id,
                    metadata: payload_metadata(&payload),
                    text,
                    score: scored_point.score,
                })
            })
            .collect();

        Ok(hits)
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        validate_collection_name(collection)?;
        self.client
            .delete_collection(collection)
            .await
            .map_err(store_error)
            .with_context(|| format!("Failed to delete collection {}", collection))?;
        Ok(())
    }
}
