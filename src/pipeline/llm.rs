//! Quiz generation: send the composite image and a prompt to a vision
//! model through an [`LLMProvider`].
//!
//! The module is deliberately thin; prompt wording lives in
//! [`crate::prompts`]. There is no retry loop: a failed call surfaces as
//! [`QuizError::LlmApiError`] (or, through [`generate_questions_from_image`],
//! as a readable message) and the caller decides what to do.
//!
//! ## Message Layout
//!
//! A single user turn whose text is the prompt and whose one attachment is
//! the composite PNG. `OpenAIProvider::compatible` sends it as the usual
//! text + `image_url` content parts, which OpenAI, Ollama, vLLM, LM Studio
//! and LiteLLM all accept.

use crate::config::LlmConfig;
use crate::error::QuizError;
use crate::pipeline::encode::{encode_image_to_base64, png_image_data};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, OpenAIProvider};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Message returned by [`generate_questions_from_image`] when the image
/// cannot be read.
pub const IMAGE_UNAVAILABLE: &str = "Could not process the image.";

/// A provider bound to one configured endpoint and model.
pub struct QuizClient {
    provider: Arc<dyn LLMProvider>,
    max_tokens: u32,
    timeout: Duration,
}

impl QuizClient {
    /// Build a client from `config`.
    ///
    /// A pre-built [`LlmConfig::provider`] is used as-is. Otherwise an
    /// OpenAI-compatible provider is created for `base_url` and `model`,
    /// which needs an API key.
    pub fn new(config: &LlmConfig) -> Result<Self, QuizError> {
        let provider = match config.provider {
            Some(ref provider) => Arc::clone(provider),
            None => {
                let api_key = config
                    .api_key
                    .as_deref()
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| QuizError::ProviderNotConfigured {
                        hint: "Set OPENAI_API_KEY (or pass --api-key). Local servers such as Ollama accept any non-empty key.".into(),
                    })?;
                let provider = OpenAIProvider::compatible(api_key, config.api_base())
                    .with_model(config.model.as_str());
                Arc::new(provider) as Arc<dyn LLMProvider>
            }
        };

        Ok(Self {
            provider,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Ask the model for quiz questions about a base64 PNG.
    pub async fn generate(&self, image_b64: &str, prompt: &str) -> Result<String, QuizError> {
        let start = Instant::now();
        let messages = build_messages(image_b64, prompt);
        let options = build_options(self.max_tokens);
        info!(
            "Requesting quiz from {} (model {}, {} bytes image)",
            self.provider.name(),
            self.provider.model(),
            image_b64.len()
        );

        let call = self.provider.chat(&messages, Some(&options));
        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| QuizError::LlmApiError {
                message: format!("request timed out after {}s", self.timeout.as_secs()),
            })?
            .map_err(|e| QuizError::LlmApiError {
                message: e.to_string(),
            })?;

        if response.content.trim().is_empty() {
            return Err(QuizError::LlmApiError {
                message: "response contained no message content".into(),
            });
        }

        debug!(
            "Quiz response: {} chars, {} input / {} output tokens in {:?}",
            response.content.len(),
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

/// Generate quiz questions for the image at `image_path`.
///
/// Never fails: returns the generated text, [`IMAGE_UNAVAILABLE`] when the
/// image cannot be encoded, or a message describing the API error.
pub async fn generate_questions_from_image(
    config: &LlmConfig,
    image_path: &Path,
    prompt: &str,
) -> String {
    let Some(image_b64) = encode_image_to_base64(image_path) else {
        return IMAGE_UNAVAILABLE.to_string();
    };

    let result = match QuizClient::new(config) {
        Ok(client) => client.generate(&image_b64, prompt).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(text) => text,
        Err(e) => {
            warn!("Quiz generation failed: {}", e);
            format!("An error occurred while communicating with the API: {e}")
        }
    }
}

fn build_messages(image_b64: &str, prompt: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user_with_images(
        prompt,
        vec![png_image_data(image_b64)],
    )]
}

fn build_options(max_tokens: u32) -> CompletionOptions {
    CompletionOptions {
        max_tokens: Some(max_tokens as usize),
        ..Default::default()
    }
}
