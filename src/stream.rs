use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use serde_json::Value;

use crate::error::LLMError;
use crate::http::HttpBodyStream;
use crate::types::{Fragment, FragmentStream};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// What a single body line turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Blank line, ignored.
    Skip,
    /// The `[DONE]` sentinel; nothing after it is yielded.
    Done,
    /// A decoded fragment.
    Fragment(Fragment),
}

/// Applies the line rule shared by every strategy.
///
/// Empty lines are skipped, a leading `data: ` is stripped, a `[DONE]` line ends
/// the stream, and anything that does not parse as JSON is passed through raw.
///
/// # Examples
///
/// ```
/// use llm_dispatch::stream::{decode_line, LineOutcome};
/// use llm_dispatch::types::Fragment;
/// use serde_json::json;
///
/// assert_eq!(decode_line(""), LineOutcome::Skip);
/// assert_eq!(decode_line("data: [DONE]"), LineOutcome::Done);
/// assert_eq!(
///     decode_line("data: {\"a\":1}"),
///     LineOutcome::Fragment(Fragment::Json(json!({"a": 1})))
/// );
/// assert_eq!(
///     decode_line("data: not-json"),
///     LineOutcome::Fragment(Fragment::Raw("not-json".to_string()))
/// );
/// ```
pub fn decode_line(line: &str) -> LineOutcome {
    if line.is_empty() {
        return LineOutcome::Skip;
    }
    let payload = line.strip_prefix(DATA_PREFIX).unwrap_or(line);
    if payload.trim() == DONE_SENTINEL {
        return LineOutcome::Done;
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => LineOutcome::Fragment(Fragment::Json(value)),
        Err(_) => LineOutcome::Fragment(Fragment::Raw(payload.to_string())),
    }
}

/// Wraps a raw body in a [`LineDecoder`] and boxes it as a [`FragmentStream`].
pub fn decode_body(body: HttpBodyStream, provider: &'static str) -> FragmentStream {
    Box::pin(LineDecoder::new(body, provider))
}

/// Drains at most `limit` bytes of a body into a string; used to read error
/// payloads of streamed calls.
pub(crate) async fn collect_body_text(
    mut body: HttpBodyStream,
    limit: usize,
) -> Result<String, LLMError> {
    let mut bytes = Vec::new();
    while bytes.len() < limit {
        match body.next().await {
            Some(chunk) => bytes.extend_from_slice(&chunk?),
            None => break,
        }
    }
    bytes.truncate(limit);
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Turns a chunked byte stream into [`Fragment`] values line by line.
pub struct LineDecoder {
    body: HttpBodyStream,
    buffer: Vec<u8>,
    pending: VecDeque<Fragment>,
    provider: &'static str,
    stream_closed: bool,
    finished: bool,
}

impl LineDecoder {
    pub fn new(body: HttpBodyStream, provider: &'static str) -> Self {
        Self {
            body,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            provider,
            stream_closed: false,
            finished: false,
        }
    }

    fn handle_line(&mut self, line: &[u8]) {
        if self.finished {
            return;
        }
        let text = String::from_utf8_lossy(line);
        match decode_line(&text) {
            LineOutcome::Skip => {}
            LineOutcome::Done => {
                tracing::trace!(provider = self.provider, "stream reached [DONE] sentinel");
                self.finished = true;
            }
            LineOutcome::Fragment(fragment) => self.pending.push_back(fragment),
        }
    }

    fn drain_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
        buffer.iter().position(|b| *b == b'\n').map(|pos| {
            let mut line: Vec<u8> = buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            line
        })
    }
}

impl Stream for LineDecoder {
    type Item = Result<Fragment, LLMError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(fragment) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(fragment)));
            }

            if this.finished {
                return Poll::Ready(None);
            }

            if this.stream_closed {
                if !this.buffer.is_empty() {
                    let mut line = std::mem::take(&mut this.buffer);
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    this.handle_line(&line);
                    continue;
                }
                this.finished = true;
                return Poll::Ready(None);
            }

            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.extend_from_slice(&bytes);
                    while let Some(line) = Self::drain_line(&mut this.buffer) {
                        this.handle_line(&line);
                        if this.finished {
                            this.buffer.clear();
                            break;
                        }
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    this.finished = true;
                    this.pending.clear();
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    this.stream_closed = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
