//! Waiting for the engine's terminal result message.

use std::fmt::Display;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::{Stream, StreamExt};
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::Message;

use readeval_core::error::{DecodeError, EvalError};

use crate::messages::EngineResponse;

pub const DEFAULT_RESULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Receives messages until one is terminal or the deadline passes.
///
/// Each receive is bounded by the poll interval, clamped to whatever is left
/// of the overall deadline, so the wait never overshoots the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultWaiter {
    overall: Duration,
    poll: Duration,
}

impl Default for ResultWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_RESULT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

impl ResultWaiter {
    pub fn new(overall: Duration, poll: Duration) -> Self {
        Self { overall, poll }
    }

    pub fn overall(&self) -> Duration {
        self.overall
    }

    pub fn poll(&self) -> Duration {
        self.poll
    }

    /// Wait for the terminal message and return its decoded markup.
    pub async fn wait<S, E>(&self, stream: &mut S) -> Result<String, EvalError>
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let deadline = Instant::now() + self.overall;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(EvalError::TimeoutFailure(self.overall));
            }

            let message = match timeout(self.poll.min(remaining), stream.next()).await {
                Err(_) => {
                    tracing::debug!(remaining_ms = remaining.as_millis() as u64, "still waiting for result");
                    continue;
                }
                Ok(None) => {
                    return Err(EvalError::TransportFailure(
                        "connection ended before a result arrived".into(),
                    ))
                }
                Ok(Some(Err(e))) => {
                    return Err(EvalError::TransportFailure(format!(
                        "receive failed while waiting for result: {e}"
                    )))
                }
                Ok(Some(Ok(message))) => message,
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        tracing::warn!("ignoring non-UTF-8 binary message");
                        continue;
                    }
                },
                Message::Close(frame) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "no reason given".into());
                    return Err(EvalError::TransportFailure(format!(
                        "engine closed the connection before a result: {reason}"
                    )));
                }
                _ => continue,
            };

            let response: EngineResponse = match serde_json::from_str(&text) {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring unparseable engine message");
                    continue;
                }
            };

            if response.is_error() {
                tracing::warn!(code = response.code, sid = %response.sid, message = %response.message, "engine returned an error");
                return Err(EvalError::EngineRejection {
                    code: response.code,
                    message: response.message,
                });
            }

            if response.is_terminal() {
                tracing::debug!(sid = %response.sid, "terminal result received");
                return decode_payload(response);
            }

            tracing::debug!(sid = %response.sid, "intermediate message");
        }
    }
}

fn decode_payload(response: EngineResponse) -> Result<String, EvalError> {
    let encoded = response
        .data
        .and_then(|d| d.data)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| EvalError::EngineRejection {
            code: response.code,
            message: "empty result".into(),
        })?;

    let bytes = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| DecodeError::Malformed(format!("result payload is not base64: {e}")))?;
    let markup = String::from_utf8(bytes)
        .map_err(|e| DecodeError::Malformed(format!("result payload is not UTF-8: {e}")))?;
    Ok(markup)
}
