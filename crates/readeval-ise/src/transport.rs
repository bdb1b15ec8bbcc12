//! One WebSocket evaluation session against the engine.
//!
//! A session moves strictly forward through its states:
//!
//! ```text
//! Disconnected → Connecting → ParametersSent → Streaming → AwaitingResult
//!              → Completed | Failed → Disconnected
//! ```
//!
//! Every operation checks the current state first; calling one out of order
//! is an `InvalidRequest` and leaves the socket untouched.

use std::fmt;
use std::sync::Once;

use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use readeval_core::error::EvalError;
use readeval_core::model::EvaluationRequest;

use crate::frame::FrameScheduler;
use crate::messages::ParameterFrame;
use crate::waiter::ResultWaiter;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Install ring as the process-wide TLS provider unless one is already set.
fn install_tls_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            tracing::debug!("TLS crypto provider already installed");
        }
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// Socket open, parameters not yet sent.
    Connecting,
    ParametersSent,
    Streaming,
    AwaitingResult,
    Completed,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::ParametersSent => "parameters_sent",
            SessionState::Streaming => "streaming",
            SessionState::AwaitingResult => "awaiting_result",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

pub struct TransportSession {
    socket: Option<WsStream>,
    state: SessionState,
    scheduler: FrameScheduler,
    waiter: ResultWaiter,
}

impl fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSession")
            .field("state", &self.state)
            .field("open", &self.socket.is_some())
            .field("scheduler", &self.scheduler)
            .field("waiter", &self.waiter)
            .finish()
    }
}

impl Default for TransportSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportSession {
    pub fn new() -> Self {
        Self {
            socket: None,
            state: SessionState::Disconnected,
            scheduler: FrameScheduler::default(),
            waiter: ResultWaiter::default(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: FrameScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_waiter(mut self, waiter: ResultWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn require(&self, expected: SessionState, operation: &str) -> Result<(), EvalError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(EvalError::InvalidRequest(format!(
                "cannot {operation} while session is {}",
                self.state
            )))
        }
    }

    fn settle<T>(&mut self, outcome: Result<T, EvalError>, next: SessionState) -> Result<T, EvalError> {
        self.state = if outcome.is_ok() { next } else { SessionState::Failed };
        outcome
    }

    fn socket(&mut self) -> Result<&mut WsStream, EvalError> {
        self.socket
            .as_mut()
            .ok_or_else(|| EvalError::TransportFailure("socket is not open".into()))
    }

    /// Open the socket. The URL must already carry the signed query.
    pub async fn connect(&mut self, url: &Url) -> Result<(), EvalError> {
        self.require(SessionState::Disconnected, "connect")?;
        self.state = SessionState::Connecting;

        if url.scheme() == "wss" {
            install_tls_provider();
        }
        tracing::debug!(host = url.host_str().unwrap_or_default(), "connecting to engine");
        match connect_async(url.as_str()).await {
            Ok((socket, _response)) => {
                self.socket = Some(socket);
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(EvalError::TransportFailure(format!("connect failed: {e}")))
            }
        }
    }

    /// Send the single session-opening control message.
    pub async fn send_parameters(&mut self, app_id: &str, request: &EvaluationRequest) -> Result<(), EvalError> {
        self.require(SessionState::Connecting, "send parameters")?;

        let outcome = async {
            let frame = ParameterFrame::new(app_id, request);
            let payload = serde_json::to_string(&frame)
                .map_err(|e| EvalError::TransportFailure(format!("failed to encode parameters: {e}")))?;
            self.socket()?
                .send(Message::Text(payload))
                .await
                .map_err(|e| EvalError::TransportFailure(format!("failed to send parameters: {e}")))
        }
        .await;

        self.settle(outcome, SessionState::ParametersSent)
    }

    /// Stream the recording as paced audio frames. Returns the frame count.
    pub async fn stream_audio<F>(&mut self, audio: &[u8], progress: F) -> Result<usize, EvalError>
    where
        F: FnMut(u8),
    {
        self.require(SessionState::ParametersSent, "stream audio")?;
        self.state = SessionState::Streaming;

        let scheduler = self.scheduler;
        let outcome = match self.socket() {
            Ok(socket) => scheduler.stream(socket, audio, progress).await,
            Err(e) => Err(e),
        };

        self.settle(outcome, SessionState::AwaitingResult)
    }

    /// Wait for the terminal message and return the decoded markup.
    pub async fn await_result(&mut self) -> Result<String, EvalError> {
        self.require(SessionState::AwaitingResult, "await result")?;

        let waiter = self.waiter;
        let outcome = match self.socket() {
            Ok(socket) => waiter.wait(socket).await,
            Err(e) => Err(e),
        };

        self.settle(outcome, SessionState::Completed)
    }

    /// Close the socket if it is open. Close errors are logged, not returned.
    pub async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close(None).await {
                tracing::debug!(error = %e, "error while closing engine socket");
            }
        }
        self.state = SessionState::Disconnected;
    }

    /// Run a whole exchange and close the socket on every path.
    pub async fn run<F>(
        &mut self,
        url: &Url,
        app_id: &str,
        request: &EvaluationRequest,
        audio: &[u8],
        progress: F,
    ) -> Result<String, EvalError>
    where
        F: FnMut(u8),
    {
        let outcome = self.exchange(url, app_id, request, audio, progress).await;
        self.close().await;
        outcome
    }

    async fn exchange<F>(
        &mut self,
        url: &Url,
        app_id: &str,
        request: &EvaluationRequest,
        audio: &[u8],
        progress: F,
    ) -> Result<String, EvalError>
    where
        F: FnMut(u8),
    {
        self.connect(url).await?;
        self.send_parameters(app_id, request).await?;
        self.stream_audio(audio, progress).await?;
        self.await_result().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn out_of_order_calls_are_rejected() {
        let mut session = TransportSession::new();
        let request = EvaluationRequest::syllables("的");

        let err = session.send_parameters("app", &request).await.unwrap_err();
        assert!(matches!(err, EvalError::InvalidRequest(_)));
        assert!(err.to_string().contains("disconnected"));

        let err = session.stream_audio(&[0u8; 16], |_| {}).await.unwrap_err();
        assert!(matches!(err, EvalError::InvalidRequest(_)));

        let err = session.await_result().await.unwrap_err();
        assert!(matches!(err, EvalError::InvalidRequest(_)));

        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn refused_connect_fails_and_closes() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse(&format!("ws://127.0.0.1:{port}/v2/open-ise")).unwrap();
        let mut session = TransportSession::new();
        let err = session
            .run(&url, "app", &EvaluationRequest::syllables("的"), &[0u8; 16], |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, EvalError::TransportFailure(_)));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn failed_tls_handshake_is_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            tokio::io::AsyncWriteExt::write_all(&mut stream, b"HTTP/1.1 400 Bad Request\r\n\r\n")
                .await
                .ok();
        });

        let url = Url::parse(&format!("wss://localhost:{port}/v2/open-ise")).unwrap();
        let mut session = TransportSession::new();
        let err = session
            .run(&url, "app", &EvaluationRequest::syllables("的"), &[0u8; 16], |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, EvalError::TransportFailure(_)), "{err}");
        assert_eq!(session.state(), SessionState::Disconnected);
        server.await.unwrap();
    }

    #[test]
    fn state_names() {
        assert_eq!(SessionState::AwaitingResult.to_string(), "awaiting_result");
        assert_eq!(SessionState::ParametersSent.to_string(), "parameters_sent");
    }
}
