use crate::config::{ApiConfig, GenerationConfig};
use crate::embeddings::{Embedder, Embedding};
use crate::error::{GenerationError, RagError};
use crate::generation::AnswerGenerator;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for an OpenAI compatible API, used for embeddings and chat completions
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    embedding_model: String,
    generation: GenerationConfig,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new client. Fails when no API key is configured.
    pub fn new(
        api: &ApiConfig,
        embedding_model: &str,
        generation: GenerationConfig,
    ) -> Result<Self> {
        let api_key = api
            .api_key
            .clone()
            .ok_or(RagError::MissingCredential("OPENAI_API_KEY"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(generation.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(OpenAiClient {
            base_url: api.base_url.trim_end_matches('/').to_string(),
            api_key,
            embedding_model: embedding_model.to_string(),
            generation,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// POST a JSON body and decode the JSON response, classifying failures
    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, GenerationError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(self.api_key.trim())
            .json(body)
            .send()
            .await
            .map_err(|e| GenerationError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerationError::from_status(status.as_u16(), &error_text));
        }

        response.json::<R>().await.map_err(|e| GenerationError::Api {
            status: Some(status.as_u16()),
            message: format!("invalid response body: {}", e),
        })
    }

    async fn request_embeddings(&self, input: &[String]) -> Result<Vec<Embedding>> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input,
        };
        debug!("Requesting {} embeddings", input.len());

        let response: EmbeddingResponse = self
            .post_json("embeddings", &request)
            .await
            .context("Embedding request failed")?;

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        if data.len() != input.len() {
            anyhow::bail!(
                "Embedding API returned {} vectors for {} inputs",
                data.len(),
                input.len()
            );
        }

        Ok(data
            .into_iter()
            .map(|d| Embedding { values: d.embedding })
            .collect())
    }
}

impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut embeddings = self.request_embeddings(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBEDDING_BATCH_SIZE) {
            embeddings.extend(self.request_embeddings(batch).await?);
        }
        Ok(embeddings)
    }
}

impl AnswerGenerator for OpenAiClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.generation.model,
            temperature: self.generation.temperature,
            max_tokens: self.generation.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response: ChatResponse = self.post_json("chat/completions", &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Api {
                status: None,
                message: "No response generated".to_string(),
            })
    }
}

/// Inputs per embeddings request
const EMBEDDING_BATCH_SIZE: usize = 128;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize, Debug)]
struct AssistantMessage {
    content: Option<String>,
}
