use crate::chunking::split_into_chunks;
use crate::config::ChunkingConfig;
use crate::document::Document;
use crate::embeddings::Embedder;
use crate::error::{GenerationError, RagError};
use crate::generation::{AnswerGenerator, SYSTEM_INSTRUCTION};
use crate::ids::assign_ids;
use crate::prompt::compose_conversational_prompt;
use crate::session::{ChatTurn, Role, Session};
use crate::store::{validate_collection_name, Record, ScoredRecord, VectorStore};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;
use tokio::sync::Mutex;

/// Answer given when retrieval finds nothing; the model is not called
pub const NO_RESULTS_ANSWER: &str =
    "Sorry, I could not find relevant information in the uploaded documents for this question.";

/// Answer given when the model call fails
pub const FALLBACK_ANSWER: &str = "Sorry, I could not generate a response.";

/// Result of storing one document
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub collection: String,
    pub source_name: String,
    /// Number of passages written
    pub passages: usize,
    /// Identifiers assigned to the passages, in passage order
    pub ids: Vec<String>,
}

/// How an answer came about
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Generated,
    NoRelevantPassages,
    /// The model call failed; the reply carries the fallback answer
    GenerationFailed(GenerationError),
}

/// What the user sees after asking a question
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub answer: String,
    pub outcome: AnswerOutcome,
    /// Passages the answer was grounded on, nearest first
    pub sources: Vec<ScoredRecord>,
}

impl Reply {
    /// Distinct error message for failed generations
    pub fn error_message(&self) -> Option<String> {
        match &self.outcome {
            AnswerOutcome::GenerationFailed(e) => Some(e.user_message()),
            _ => None,
        }
    }
}

/// RAG (Retrieval-Augmented Generation) engine
pub struct RagEngine<E, S> {
    embedder: E,
    store: S,
    chunking: ChunkingConfig,
    top_k: usize,
    conversational: bool,
    // Held across "read existing ids, assign, write" so concurrent ingestions cannot collide
    write_lock: Mutex<()>,
}

impl<E: Embedder, S: VectorStore> RagEngine<E, S> {
    /// Create a new RAG engine
    pub fn new(embedder: E, store: S, chunking: ChunkingConfig, top_k: usize) -> Self {
        RagEngine {
            embedder,
            store,
            chunking,
            top_k: top_k.max(1),
            conversational: false,
            write_lock: Mutex::new(()),
        }
    }

    /// Send earlier turns of the session along with each question
    pub fn with_conversation(mut self, enabled: bool) -> Self {
        self.conversational = enabled;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Names of the collections available for chatting
    pub async fn collections(&self) -> Result<Vec<String>> {
        self.store.list_collections().await
    }

    /// Load a document, split, embed and store it, then make its collection current.
    pub async fn ingest_file<P: AsRef<Path>>(
        &self,
        session: &mut Session,
        path: P,
        collection: &str,
    ) -> Result<IngestReport> {
        validate_collection_name(collection)?;
        let document = Document::from_file(path.as_ref()).context("Failed to process document")?;
        info!("Document type: {}", document.mime_type);

        self.ingest_text(session, &document.content, &document.source_name, collection)
            .await
    }

    /// Split, embed and store already extracted text.
    ///
    /// All passages are embedded before anything is written, so a failure leaves
    /// the collection untouched.
    pub async fn ingest_text(
        &self,
        session: &mut Session,
        text: &str,
        source_name: &str,
        collection: &str,
    ) -> Result<IngestReport> {
        validate_collection_name(collection)?;

        let passages = split_into_chunks(text, &self.chunking);
        if passages.is_empty() {
            warn!("{} produced no passages", source_name);
            return Err(RagError::EmptyDocument(source_name.to_string()).into());
        }
        info!("Split {} into {} passages", source_name, passages.len());

        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .context("Failed to embed passages")?;
        if embeddings.len() != passages.len() {
            anyhow::bail!(
                "Embedder returned {} vectors for {} passages",
                embeddings.len(),
                passages.len()
            );
        }

        let _guard = self.write_lock.lock().await;
        let existing = self.store.existing_ids(collection).await?;
        let ids = assign_ids(collection, passages.len(), &existing);
        debug!(
            "Assigned {} ids in {} ({} already present)",
            ids.len(),
            collection,
            existing.len()
        );

        let records: Vec<Record> = passages
            .into_iter()
            .zip(embeddings)
            .zip(ids.iter())
            .map(|((passage, embedding), id)| {
                let mut metadata = BTreeMap::new();
                metadata.insert("source".to_string(), source_name.to_string());
                metadata.insert("chunk_index".to_string(), passage.index.to_string());
                metadata.insert(
                    "start_position".to_string(),
                    passage.start_position.to_string(),
                );
                Record {
                    id: id.clone(),
                    text: passage.text,
                    embedding: embedding.values,
                    metadata,
                }
            })
            .collect();

        let written = self
            .store
            .write(collection, records)
            .await
            .with_context(|| format!("Failed to store passages in {}", collection))?;
        info!("Stored {} passages in collection {}", written, collection);

        session.select_collection(collection);

        Ok(IngestReport {
            collection: collection.to_string(),
            source_name: source_name.to_string(),
            passages: written,
            ids,
        })
    }

    /// Top-k passages for a question
    pub async fn retrieve(&self, collection: &str, question: &str) -> Result<Vec<ScoredRecord>> {
        let question_embedding = self.embedder.embed(question).await?;
        self.store
            .query(collection, &question_embedding.values, self.top_k)
            .await
    }

    /// Answer a question against the session's current collection.
    ///
    /// Generation failures do not propagate: they are logged, reported on the
    /// reply and answered with [`FALLBACK_ANSWER`]. Retrieval failures are
    /// returned after a fallback turn is recorded, so the history stays intact.
    pub async fn ask<G: AnswerGenerator>(
        &self,
        generator: &G,
        session: &mut Session,
        question: &str,
    ) -> Result<Reply> {
        if question.trim().is_empty() {
            anyhow::bail!("Question must not be empty");
        }
        let collection = session
            .current_collection()
            .ok_or(RagError::NoActiveCollection)?
            .to_string();

        let earlier: Vec<ChatTurn> = if self.conversational {
            session.history().to_vec()
        } else {
            Vec::new()
        };
        session.push(Role::User, question);

        let hits = match self.retrieve(&collection, question).await {
            Ok(hits) => hits,
            Err(e) => {
                error!("Retrieval from {} failed: {:#}", collection, e);
                session.push(Role::Assistant, format!("Sorry, an error occurred: {}", e));
                return Err(e);
            }
        };

        if hits.is_empty() {
            info!("No relevant information found in {}", collection);
            session.push(Role::Assistant, NO_RESULTS_ANSWER);
            return Ok(Reply {
                answer: NO_RESULTS_ANSWER.to_string(),
                outcome: AnswerOutcome::NoRelevantPassages,
                sources: hits,
            });
        }

        let passages: Vec<&str> = hits.iter().map(|hit| hit.text.as_str()).collect();
        let prompt = compose_conversational_prompt(&earlier, question, &passages);
        debug!(
            "Prompt built from {} passages and {} earlier turns",
            passages.len(),
            earlier.len()
        );

        let generated = generator
            .generate(SYSTEM_INSTRUCTION, &prompt)
            .await
            .and_then(|answer| {
                if answer.trim().is_empty() {
                    Err(GenerationError::Api {
                        status: None,
                        message: "empty response".to_string(),
                    })
                } else {
                    Ok(answer)
                }
            });

        let (answer, outcome) = match generated {
            Ok(answer) => (answer, AnswerOutcome::Generated),
            Err(e) => {
                error!("{}", e.user_message());
                (
                    FALLBACK_ANSWER.to_string(),
                    AnswerOutcome::GenerationFailed(e),
                )
            }
        };

        session.push(Role::Assistant, answer.clone());
        Ok(Reply {
            answer,
            outcome,
            sources: hits,
        })
    }

    /// Interactive question loop; `exit` ends it.
    pub async fn run_query_loop<G, R, W>(
        &self,
        generator: &G,
        session: &mut Session,
        mut input: R,
        mut output: W,
    ) -> Result<()>
    where
        G: AnswerGenerator,
        R: BufRead,
        W: Write,
    {
        let collection = session
            .current_collection()
            .ok_or(RagError::NoActiveCollection)?
            .to_string();
        writeln!(
            output,
            "Ready to answer questions about {}. Type 'exit' to quit.",
            collection
        )?;

        let mut buffer = String::new();
        loop {
            write!(output, "\nYour question: ")?;
            output.flush()?;

            buffer.clear();
            if input.read_line(&mut buffer)? == 0 {
                break;
            }

            let question = buffer.trim();
            if question.is_empty() {
                continue;
            }
            if question.eq_ignore_ascii_case("exit") {
                writeln!(output, "Goodbye!")?;
                break;
            }

            match self.ask(generator, session, question).await {
                Ok(reply) => {
                    if let Some(message) = reply.error_message() {
                        writeln!(output, "\n{}", message)?;
                    }
                    writeln!(output, "\n{}", reply.answer)?;
                }
                // Errors are local to the question; keep the session going
                Err(e) => writeln!(output, "\nError: {:#}", e)?,
            }
        }

        Ok(())
    }
}
