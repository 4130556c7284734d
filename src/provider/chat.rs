use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::LLMError;
use crate::types::{BackendTarget, DispatchRequest};

use super::{TransportStrategy, bearer_header};

/// Chat-completions convention: `model` + `messages` + `stream`, Bearer auth.
#[derive(Debug, Clone, Default)]
pub struct ChatStrategy;

impl ChatStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl TransportStrategy for ChatStrategy {
    fn name(&self) -> &'static str {
        "chat"
    }

    fn build_headers(&self, target: &BackendTarget) -> HashMap<String, String> {
        bearer_header("Authorization", &target.api_key)
    }

    fn build_body(
        &self,
        target: &BackendTarget,
        request: &DispatchRequest,
    ) -> Result<Value, LLMError> {
        let messages = request.messages.as_ref().ok_or_else(|| {
            LLMError::invalid_config("messages", "chat-style backends require messages")
        })?;
        let messages = serde_json::to_value(messages).map_err(|err| LLMError::Validation {
            message: format!("failed to serialize messages: {err}"),
        })?;

        let mut body = Map::new();
        body.insert("model".to_string(), Value::String(target.model.clone()));
        body.insert("messages".to_string(), messages);
        body.insert("stream".to_string(), Value::Bool(request.stream));
        Ok(Value::Object(body))
    }
}
