use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::LLMError;
use crate::types::{BackendTarget, DispatchRequest};

use super::{TransportStrategy, bearer_header};

const DEFAULT_MAX_TOKENS: u64 = 512;
const DEFAULT_KEY_HEADER: &str = "Authorization";

/// Free-form prompt convention: `prompt` + `max_tokens` + `stream`.
///
/// The key is always sent as `Bearer <key>`; only the header name varies. A name set
/// on the [`BackendTarget`] wins over the one configured here.
///
/// # Examples
///
/// ```
/// use llm_dispatch::provider::{PromptStrategy, TransportStrategy};
/// use llm_dispatch::types::BackendTarget;
///
/// let strategy = PromptStrategy::new().with_api_key_header("x-api-key");
/// let headers = strategy.build_headers(&BackendTarget::new("https://x", "k", "qwen3"));
/// assert_eq!(headers.get("x-api-key"), Some(&"Bearer k".to_string()));
/// ```
#[derive(Debug, Clone)]
pub struct PromptStrategy {
    api_key_header: String,
}

impl PromptStrategy {
    pub fn new() -> Self {
        Self {
            api_key_header: DEFAULT_KEY_HEADER.to_string(),
        }
    }

    /// Overrides the header name that carries the key.
    pub fn with_api_key_header(mut self, header: impl Into<String>) -> Self {
        self.api_key_header = header.into();
        self
    }
}

impl Default for PromptStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportStrategy for PromptStrategy {
    fn name(&self) -> &'static str {
        "prompt"
    }

    fn build_headers(&self, target: &BackendTarget) -> HashMap<String, String> {
        let header = target
            .api_key_header
            .as_deref()
            .unwrap_or(self.api_key_header.as_str());
        bearer_header(header, &target.api_key)
    }

    fn build_body(
        &self,
        _target: &BackendTarget,
        request: &DispatchRequest,
    ) -> Result<Value, LLMError> {
        let prompt = request.prompt.as_ref().ok_or_else(|| {
            LLMError::invalid_config("prompt", "prompt-style backends require a prompt")
        })?;

        let mut body = Map::new();
        body.insert("prompt".to_string(), Value::String(prompt.clone()));
        body.insert(
            "max_tokens".to_string(),
            request
                .max_tokens()
                .cloned()
                .unwrap_or_else(|| Value::from(DEFAULT_MAX_TOKENS)),
        );
        body.insert("stream".to_string(), Value::Bool(request.stream));
        Ok(Value::Object(body))
    }
}
