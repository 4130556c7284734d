use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use serde_json::Value;

use crate::error::LLMError;
use crate::http::{HttpRequest, HttpResponse, HttpStreamResponse, HttpTransport};

/// Transport that records every request and answers with a canned status and body.
pub(crate) struct RecordingTransport {
    status: u16,
    headers: HashMap<String, String>,
    chunks: Vec<Vec<u8>>,
    body_error: Option<String>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingTransport {
    pub(crate) fn json(status: u16, body: Value) -> Arc<Self> {
        Self::raw(status, vec![body.to_string().into_bytes()])
    }

    pub(crate) fn raw(status: u16, chunks: Vec<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            status,
            headers: HashMap::new(),
            chunks,
            body_error: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Streamed body that yields `chunks` and then fails with a transport error.
    pub(crate) fn raw_then_error(
        status: u16,
        chunks: Vec<Vec<u8>>,
        message: &str,
    ) -> Arc<Self> {
        Arc::new(Self {
            status,
            headers: HashMap::new(),
            chunks,
            body_error: Some(message.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Body of the only recorded request, parsed as JSON.
    pub(crate) fn single_body(&self) -> Value {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        serde_json::from_slice(requests[0].body.as_deref().unwrap_or_default())
            .expect("request body should be JSON")
    }

    fn record(&self, request: HttpRequest) {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
        self.record(request);
        Ok(HttpResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: self.chunks.concat(),
        })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, LLMError> {
        self.record(request);
        let mut chunks: Vec<Result<Vec<u8>, LLMError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        if let Some(message) = &self.body_error {
            chunks.push(Err(LLMError::transport(message.clone())));
        }
        Ok(HttpStreamResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: Box::pin(stream::iter(chunks)),
        })
    }
}
