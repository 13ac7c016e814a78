//! Response body that tracks how a committed stream ends.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use streamgate_core::{ByteWindow, ChunkStream, FetchError, FileId};
use tracing::{debug, error};

/// Lifecycle of one streamed response.
///
/// A [`TrackedBody`] is built `Idle`, after lookup, range resolution and
/// priming have succeeded. Hyper polls a body only once the response head
/// is written, so the first poll moves it to `HeadersSent`. From there
/// errors can only cut the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    HeadersSent,
    Streaming,
    Completed,
    Aborted,
}

impl StreamPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamPhase::Completed | StreamPhase::Aborted)
    }
}

/// Chunk stream wrapper handed to hyper as the response body.
///
/// A backend error is passed through as a body error, which makes hyper
/// abort the connection rather than finish a short response. Dropping the
/// body before the end (client went away) drops the backend transfer.
pub struct TrackedBody {
    inner: ChunkStream,
    id: FileId,
    window: ByteWindow,
    phase: StreamPhase,
    bytes_sent: u64,
}

impl TrackedBody {
    pub fn new(inner: ChunkStream, id: FileId, window: ByteWindow) -> Self {
        Self {
            inner,
            id,
            window,
            phase: StreamPhase::Idle,
            bytes_sent: 0,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    fn complete(&mut self) {
        self.phase = StreamPhase::Completed;
        debug!(
            id = %self.id,
            window = %self.window,
            bytes_sent = self.bytes_sent,
            "Stream completed"
        );
    }
}

impl Stream for TrackedBody {
    type Item = Result<Bytes, FetchError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.phase {
            StreamPhase::Idle => this.phase = StreamPhase::HeadersSent,
            phase if phase.is_terminal() => return Poll::Ready(None),
            _ => {}
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes_sent += chunk.len() as u64;
                if this.bytes_sent >= this.window.len() {
                    this.complete();
                } else {
                    this.phase = StreamPhase::Streaming;
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.phase = StreamPhase::Aborted;
                error!(
                    id = %this.id,
                    window = %this.window,
                    bytes_sent = this.bytes_sent,
                    error = %e,
                    "Backend failed after headers were sent, closing connection"
                );
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.complete();
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        if self.phase == StreamPhase::Idle {
            debug!(id = %self.id, window = %self.window, "Response dropped before headers were sent");
        } else if !self.phase.is_terminal() {
            self.phase = StreamPhase::Aborted;
            debug!(
                id = %self.id,
                window = %self.window,
                bytes_sent = self.bytes_sent,
                expected = self.window.len(),
                "Client disconnected before stream completed"
            );
        }
    }
}
