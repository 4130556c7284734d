use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::LLMError;
use crate::types::{BackendTarget, DispatchRequest};

use super::TransportStrategy;

const DEFAULT_MAX_TOKENS: u64 = 300;

/// Claude text-completion convention: `prompt` + `max_tokens_to_sample` + `stream`.
///
/// The key travels in `x-api-key` without a Bearer prefix.
#[derive(Debug, Clone, Default)]
pub struct ClaudeStrategy;

impl ClaudeStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl TransportStrategy for ClaudeStrategy {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn build_headers(&self, target: &BackendTarget) -> HashMap<String, String> {
        HashMap::from([("x-api-key".to_string(), target.api_key.clone())])
    }

    fn build_body(
        &self,
        _target: &BackendTarget,
        request: &DispatchRequest,
    ) -> Result<Value, LLMError> {
        let prompt = request.prompt.as_ref().ok_or_else(|| {
            LLMError::invalid_config("prompt", "claude-style backends require a prompt")
        })?;

        let mut body = Map::new();
        body.insert("prompt".to_string(), Value::String(prompt.clone()));
        body.insert(
            "max_tokens_to_sample".to_string(),
            request
                .max_tokens()
                .cloned()
                .unwrap_or_else(|| Value::from(DEFAULT_MAX_TOKENS)),
        );
        body.insert("stream".to_string(), Value::Bool(request.stream));
        Ok(Value::Object(body))
    }
}
