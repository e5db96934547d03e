use thiserror::Error;

/// Failures that stop a single pipeline action.
///
/// Most code returns `anyhow::Result`; these variants travel inside it and
/// callers that care about the kind use `downcast_ref::<RagError>()`.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("missing credential: set {0} to continue")]
    MissingCredential(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid collection name '{0}': use ASCII letters, digits, '_', '-' or '.'")]
    InvalidCollectionName(String),

    #[error("no text could be extracted from {0}")]
    EmptyDocument(String),

    #[error("unsupported document format: {0}. Only text and PDF files are supported")]
    UnsupportedDocument(String),

    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("collection '{0}' already exists; pass --overwrite or choose another name")]
    CollectionExists(String),

    #[error("no collection selected; ingest a document or pick an existing collection")]
    NoActiveCollection,

    #[error("vector store error: {0}")]
    Store(String),
}

/// Failure kinds reported by the language-model API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("authentication failed")]
    Authentication,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("API error ({status:?}): {message}")]
    Api {
        status: Option<u16>,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),
}

impl GenerationError {
    /// Message shown to the person asking the question.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::Authentication => {
                "Authentication error: your API key may be wrong or expired.".to_string()
            }
            GenerationError::RateLimited => {
                "Rate limit error: too many requests, please try again later.".to_string()
            }
            GenerationError::Api {
                status: Some(status),
                message,
            } => format!("API error: {} - {}", status, message),
            GenerationError::Api {
                status: None,
                message,
            } => format!("API error: {}", message),
            GenerationError::Transport(message) => {
                format!("Could not reach the language model service: {}", message)
            }
        }
    }

    /// Classify a non-success HTTP status and its body.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => GenerationError::Authentication,
            429 => GenerationError::RateLimited,
            _ => GenerationError::Api {
                status: Some(status),
                message: api_error_message(body),
            },
        }
    }

    /// Classify a failed request that never produced a response.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Api {
                status: None,
                message: "request timed out".to_string(),
            }
        } else if let Some(status) = err.status() {
            GenerationError::from_status(status.as_u16(), "")
        } else {
            GenerationError::Transport(err.to_string())
        }
    }
}

/// Pull `error.message` out of an OpenAI style error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "Unknown error".to_string()
            } else {
                trimmed.to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            GenerationError::from_status(401, ""),
            GenerationError::Authentication
        );
        assert_eq!(
            GenerationError::from_status(403, ""),
            GenerationError::Authentication
        );
        assert_eq!(
            GenerationError::from_status(429, ""),
            GenerationError::RateLimited
        );
        assert_eq!(
            GenerationError::from_status(500, r#"{"error":{"message":"boom"}}"#),
            GenerationError::Api {
                status: Some(500),
                message: "boom".to_string()
            }
        );
    }

    #[test]
    fn test_auth_and_rate_limit_messages_differ() {
        let auth = GenerationError::Authentication.user_message();
        let rate = GenerationError::RateLimited.user_message();
        assert_ne!(auth, rate);
        assert!(auth.contains("Authentication"));
        assert!(rate.contains("Rate limit"));
    }

    #[test]
    fn test_every_failure_kind_has_its_own_message() {
        let messages = [
            GenerationError::Authentication.user_message(),
            GenerationError::RateLimited.user_message(),
            GenerationError::Api {
                status: None,
                message: "request timed out".to_string(),
            }
            .user_message(),
            GenerationError::Transport("connection refused".to_string()).user_message(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[tokio::test]
    async fn test_timeout_is_classified_as_api_error() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(50))
            .build()
            .unwrap();
        let err = client
            .post(format!("http://{}/chat/completions", addr))
            .send()
            .await
            .unwrap_err();

        assert!(matches!(
            GenerationError::from_reqwest(&err),
            GenerationError::Api { status: None, .. }
        ));
        server.abort();
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let err = reqwest::Client::new()
            .post(format!("http://{}/chat/completions", addr))
            .send()
            .await
            .unwrap_err();

        assert!(matches!(
            GenerationError::from_reqwest(&err),
            GenerationError::Transport(_)
        ));
    }

    #[test]
    fn test_api_message_falls_back_to_body() {
        let err = GenerationError::from_status(502, "bad gateway");
        assert_eq!(err.user_message(), "API error: 502 - bad gateway");
    }
}
