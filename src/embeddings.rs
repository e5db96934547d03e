use crate::openai::OpenAiClient;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

/// Maps text to fixed-size vectors
#[allow(async_fn_in_trait)]
pub trait Embedder {
    /// Generate the embedding for a single text
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for several texts, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// Offline embedder: hashed bag of lowercase word tokens, L2 normalized.
///
/// Identical text always yields an identical vector, which makes it usable
/// without network access.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        HashingEmbedder {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut values = vec![0.0f32; self.dimensions];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            // Sign bit keeps unrelated tokens from only ever adding up
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            values[bucket] += sign;
        }

        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            values.iter_mut().for_each(|v| *v /= norm);
        }

        Embedding { values }
    }
}

impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.embed_text(text))
    }
}

/// Embedder chosen at runtime from configuration
pub enum AnyEmbedder {
    OpenAi(OpenAiClient),
    Hashing(HashingEmbedder),
}

impl Embedder for AnyEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        match self {
            AnyEmbedder::OpenAi(client) => client.embed(text).await,
            AnyEmbedder::Hashing(embedder) => embedder.embed(text).await,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        match self {
            AnyEmbedder::OpenAi(client) => client.embed_batch(texts).await,
            AnyEmbedder::Hashing(embedder) => embedder.embed_batch(texts).await,
        }
    }
}

/// Cosine similarity, 0.0 when either vector is all zeros or dimensions differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
