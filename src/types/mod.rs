//! Shared data structures describing one logical call and its outcome.
//!
//! A [`DispatchRequest`] carries exactly one useful request shape (messages, prompt
//! or instances) plus loose parameters; a [`BackendTarget`] names where to send it;
//! a [`Response`] is either a complete JSON body or a lazy stream of [`Fragment`]s.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use futures_core::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LLMError;

/// Timeout applied when neither the request nor the target sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Role-tagged chat message, serialized verbatim into chat-style bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// One logical call, independent of the backend that will serve it.
///
/// `messages` always takes precedence when present. `Some(vec![])` counts as present.
///
/// # Examples
///
/// ```
/// use llm_dispatch::types::{ChatMessage, DispatchRequest};
/// use serde_json::json;
///
/// let request = DispatchRequest::messages(vec![ChatMessage::user("hi")])
///     .with_parameter("max_tokens", json!(64))
///     .streaming();
/// assert!(request.stream);
/// assert_eq!(request.max_tokens(), Some(&json!(64)));
/// assert!(request.has_shape());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchRequest {
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default)]
    pub prompt: Option<String>,
    /// Opaque instance payloads for batch-style backends.
    #[serde(default)]
    pub instances: Option<Vec<Value>>,
    /// Extra parameters such as `max_tokens`, forwarded untouched.
    #[serde(default)]
    pub parameters: Option<Map<String, Value>>,
    #[serde(default)]
    pub stream: bool,
    /// Overrides the target timeout for this call only.
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl DispatchRequest {
    /// Request carrying an ordered message sequence.
    pub fn messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages: Some(messages),
            ..Self::default()
        }
    }

    /// Request carrying a single free-text prompt.
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// Request carrying opaque batch instances.
    pub fn instances(instances: Vec<Value>) -> Self {
        Self {
            instances: Some(instances),
            ..Self::default()
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_instances(mut self, instances: Vec<Value>) -> Self {
        self.instances = Some(instances);
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Adds a single extra parameter, creating the map on first use.
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns `true` when at least one of messages, prompt or instances is set.
    pub fn has_shape(&self) -> bool {
        self.messages.is_some() || self.prompt.is_some() || self.instances.is_some()
    }

    /// Raw `parameters["max_tokens"]`, whatever its JSON type.
    pub fn max_tokens(&self) -> Option<&Value> {
        self.parameters
            .as_ref()
            .and_then(|params| params.get("max_tokens"))
    }
}

/// Where and as whom a call is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendTarget {
    pub endpoint: String,
    pub api_key: String,
    /// Model identifier; the only signal used to pick a strategy when no messages are given.
    pub model: String,
    /// Header name for prompt-style backends; `Authorization` when unset.
    #[serde(default)]
    pub api_key_header: Option<String>,
    #[serde(default)]
    pub timeout: Option<Duration>,
}

impl BackendTarget {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            api_key_header: None,
            timeout: None,
        }
    }

    pub fn with_api_key_header(mut self, header: impl Into<String>) -> Self {
        self.api_key_header = Some(header.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Request timeout wins over the target timeout, which wins over [`DEFAULT_TIMEOUT`].
    pub fn effective_timeout(&self, request: &DispatchRequest) -> Duration {
        request.timeout.or(self.timeout).unwrap_or(DEFAULT_TIMEOUT)
    }
}

/// One decoded streaming fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Fragment {
    /// Line that parsed as JSON.
    Json(Value),
    /// Line that was not valid JSON, passed through after prefix stripping.
    Raw(String),
}

impl Fragment {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Fragment::Json(value) => Some(value),
            Fragment::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Fragment::Raw(text) => Some(text),
            Fragment::Json(_) => None,
        }
    }
}

/// Lazy, single-pass sequence of fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment, LLMError>> + Send>>;

/// Outcome of a dispatched call.
pub enum Response {
    /// Whole decoded body, returned when streaming is off.
    Complete(Value),
    /// Incremental fragments, returned when streaming is on.
    Stream(FragmentStream),
}

impl Response {
    /// Unwraps the complete body.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::InvalidConfig`] when the call was made with `stream = true`.
    pub fn into_complete(self) -> Result<Value, LLMError> {
        match self {
            Response::Complete(value) => Ok(value),
            Response::Stream(_) => Err(LLMError::invalid_config(
                "stream",
                "response is a stream; the request had stream enabled",
            )),
        }
    }

    /// Unwraps the fragment stream.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::InvalidConfig`] when the call was made with `stream = false`.
    pub fn into_stream(self) -> Result<FragmentStream, LLMError> {
        match self {
            Response::Stream(stream) => Ok(stream),
            Response::Complete(_) => Err(LLMError::invalid_config(
                "stream",
                "response is complete; the request had stream disabled",
            )),
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Response::Stream(_))
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Complete(value) => f.debug_tuple("Complete").field(value).finish(),
            Response::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}
