use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use crate::error::LLMError;

/// Maps a non-2xx response to a transport-class [`LLMError`].
///
/// The message is taken from the usual JSON error envelopes when present and
/// falls back to the raw body.
pub(crate) fn parse_status_error(
    provider: &'static str,
    status: u16,
    headers: &HashMap<String, String>,
    body: &str,
) -> LLMError {
    let message = extract_error_message(body).unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            format!("{provider} returned an empty body")
        } else {
            trimmed.to_string()
        }
    });

    match status {
        401 | 403 => LLMError::Auth { message },
        429 => LLMError::RateLimit {
            message,
            retry_after: retry_after_from_headers(headers),
        },
        _ => LLMError::Status { status, message },
    }
}

/// Reads `{"error": {"message", "code"}}`, `{"error": "..."}` or `{"message": "..."}`.
fn extract_error_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    match parsed.get("error") {
        Some(Value::Object(error)) => {
            let message = error.get("message").and_then(Value::as_str)?;
            match error.get("code").and_then(Value::as_str) {
                Some(code) => Some(format!("{message} ({code})")),
                None => Some(message.to_string()),
            }
        }
        Some(Value::String(message)) => Some(message.clone()),
        _ => parsed
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Extracts the `Retry-After` header (in seconds) if present.
///
/// HTTP-date values are ignored because vendors primarily use the numeric form.
fn retry_after_from_headers(headers: &HashMap<String, String>) -> Option<Duration> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("retry-after"))
        .and_then(|(_, value)| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
