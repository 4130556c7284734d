use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LLMError;
use crate::http::{HttpTransport, post_json, post_json_stream};
use crate::stream::{collect_body_text, decode_body};
use crate::types::{BackendTarget, DispatchRequest, Response};

pub mod chat;
pub mod claude;
pub mod error;
pub mod instances;
pub mod prompt;

pub use chat::ChatStrategy;
pub use claude::ClaudeStrategy;
pub use instances::InstancesStrategy;
pub use prompt::PromptStrategy;

use self::error::parse_status_error;

/// Upper bound on the error body drained from a failed streamed call.
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

/// One backend convention: how to authenticate and how to shape the JSON body.
///
/// Implementations only describe headers and body; [`TransportStrategy::send`] is
/// shared so status handling and stream decoding cannot drift between backends.
#[async_trait]
pub trait TransportStrategy: Send + Sync {
    /// Short identifier used in logs and errors, such as `chat`.
    fn name(&self) -> &'static str;

    /// Headers for the target, excluding `Content-Type`.
    fn build_headers(&self, target: &BackendTarget) -> HashMap<String, String>;

    /// Builds the JSON body, or fails with a configuration error when a required
    /// field is missing. Never touches the network.
    fn build_body(
        &self,
        target: &BackendTarget,
        request: &DispatchRequest,
    ) -> Result<Value, LLMError>;

    /// Issues one POST to `target.endpoint` and decodes the result.
    ///
    /// # Errors
    ///
    /// Configuration errors from [`TransportStrategy::build_body`] are returned before
    /// the transport is used. Non-2xx statuses map to transport-class errors and are not
    /// retried.
    async fn send(
        &self,
        transport: &dyn HttpTransport,
        target: &BackendTarget,
        request: &DispatchRequest,
    ) -> Result<Response, LLMError> {
        let body = self.build_body(target, request)?;
        let headers = self.build_headers(target);
        let exchange = Exchange {
            provider: self.name(),
            endpoint: &target.endpoint,
            headers,
            timeout: target.effective_timeout(request),
        };
        exchange.run(transport, &body, request.stream).await
    }
}

/// Thread-safe strategy handle.
pub type DynStrategy = Arc<dyn TransportStrategy>;

/// Builds `Authorization: Bearer <key>` under the given header name.
pub(crate) fn bearer_header(name: &str, api_key: &str) -> HashMap<String, String> {
    HashMap::from([(name.to_string(), format!("Bearer {api_key}"))])
}

struct Exchange<'a> {
    provider: &'static str,
    endpoint: &'a str,
    headers: HashMap<String, String>,
    timeout: Duration,
}

impl Exchange<'_> {
    async fn run(
        self,
        transport: &dyn HttpTransport,
        body: &Value,
        stream: bool,
    ) -> Result<Response, LLMError> {
        tracing::debug!(
            provider = self.provider,
            endpoint = self.endpoint,
            stream,
            timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            "sending request"
        );

        if stream {
            let response =
                post_json_stream(transport, self.endpoint, self.headers, body, self.timeout)
                    .await?;
            if !response.is_success() {
                let text = match collect_body_text(response.body, MAX_ERROR_BODY_BYTES).await {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::debug!(
                            provider = self.provider,
                            status = response.status,
                            error = %err,
                            "failed to read error body"
                        );
                        String::new()
                    }
                };
                return Err(parse_status_error(
                    self.provider,
                    response.status,
                    &response.headers,
                    &text,
                ));
            }
            return Ok(Response::Stream(decode_body(response.body, self.provider)));
        }

        let response = post_json(transport, self.endpoint, self.headers, body, self.timeout).await?;
        if !response.is_success() {
            let text = String::from_utf8_lossy(&response.body);
            return Err(parse_status_error(
                self.provider,
                response.status,
                &response.headers,
                &text,
            ));
        }
        let value = serde_json::from_slice(&response.body).map_err(|err| {
            LLMError::provider(self.provider, format!("failed to parse response: {err}"))
        })?;
        Ok(Response::Complete(value))
    }
}
