//! Splitting audio into paced, flagged frames.

use std::fmt::Display;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::{Sink, SinkExt};
use tokio_tungstenite::tungstenite::Message;

use readeval_core::error::EvalError;

use crate::messages::{AudioFrame, AUS_CONTINUE, AUS_FIRST, AUS_LAST, STATUS_CONTINUE, STATUS_END};

/// 40 ms of 16 kHz 16-bit mono PCM.
pub const DEFAULT_FRAME_SIZE: usize = 1280;
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(40);

/// One chunk of the recording with its position flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub index: usize,
    pub chunk: &'a [u8],
    /// Outer flag: begin, continue or end of stream.
    pub aus: u8,
    /// Inner status: continue or last.
    pub status: u8,
}

impl Frame<'_> {
    pub fn to_message(&self) -> AudioFrame {
        AudioFrame::new(self.aus, self.status, STANDARD.encode(self.chunk))
    }
}

/// Cuts audio into fixed-size frames and sends them with a fixed delay
/// between consecutive frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameScheduler {
    frame_size: usize,
    interval: Duration,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_SIZE, DEFAULT_FRAME_INTERVAL)
    }
}

impl FrameScheduler {
    /// A zero frame size is treated as one byte.
    pub fn new(frame_size: usize, interval: Duration) -> Self {
        Self {
            frame_size: frame_size.max(1),
            interval,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn frame_count(&self, audio_len: usize) -> usize {
        audio_len.div_ceil(self.frame_size)
    }

    /// Frames in send order. A lone frame is flagged as the first frame on
    /// the outer flag and as the last one on the inner status.
    pub fn frames<'a>(&self, audio: &'a [u8]) -> impl Iterator<Item = Frame<'a>> + 'a {
        let last = self.frame_count(audio.len()).saturating_sub(1);
        audio
            .chunks(self.frame_size)
            .enumerate()
            .map(move |(index, chunk)| {
                let aus = if index == 0 {
                    AUS_FIRST
                } else if index == last {
                    AUS_LAST
                } else {
                    AUS_CONTINUE
                };
                let status = if index == last {
                    STATUS_END
                } else {
                    STATUS_CONTINUE
                };
                Frame {
                    index,
                    chunk,
                    aus,
                    status,
                }
            })
    }

    /// Send every frame to `sink`, reporting the percentage of bytes sent
    /// after each frame. Returns the number of frames sent.
    pub async fn stream<S, F>(
        &self,
        sink: &mut S,
        audio: &[u8],
        mut progress: F,
    ) -> Result<usize, EvalError>
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
        F: FnMut(u8),
    {
        if audio.is_empty() {
            return Err(EvalError::InvalidRequest("audio is empty".into()));
        }

        let total = audio.len();
        let count = self.frame_count(total);
        let mut sent = 0usize;

        for frame in self.frames(audio) {
            if frame.index > 0 {
                tokio::time::sleep(self.interval).await;
            }

            let payload = serde_json::to_string(&frame.to_message()).map_err(|e| {
                EvalError::TransportFailure(format!("failed to encode audio frame: {e}"))
            })?;
            sink.send(Message::Text(payload)).await.map_err(|e| {
                EvalError::TransportFailure(format!(
                    "failed to send audio frame {}/{count}: {e}",
                    frame.index + 1
                ))
            })?;

            sent += frame.chunk.len();
            progress(percent(sent, total));

            if frame.index % 25 == 0 || frame.status == STATUS_END {
                tracing::debug!(frame = frame.index + 1, frames = count, bytes = sent, "audio frame sent");
            }
        }

        Ok(count)
    }
}

fn percent(sent: usize, total: usize) -> u8 {
    (sent * 100 / total).min(100) as u8
}
