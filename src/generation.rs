use crate::error::GenerationError;

/// Fixed system instruction sent with every grounded prompt
pub const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant.";

/// Produces a single completion for a prompt
#[allow(async_fn_in_trait)]
pub trait AnswerGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerationError>;
}
