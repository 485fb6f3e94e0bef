//! Incremental decoding of a judge progress stream.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio_util::codec::Decoder;

use super::{
    codec::{DataFrame, DataLineCodec},
    err::ClientError,
    model::ProgressEvent,
};
use crate::prelude::{CancellationToken, FutureCancelExt};

/// Where a [`ProgressReader`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Streaming,
    /// A terminal event was delivered.
    Completed,
    /// The source ended before any terminal event.
    Exhausted,
    Failed,
}

enum Read<T> {
    Chunk(T),
    End,
    IdleTimeout,
    Cancelled,
}

/// Owns a byte source and turns it into [`ProgressEvent`]s.
///
/// The source is dropped as soon as the reader leaves [`StreamState::Streaming`],
/// or when the reader itself is dropped, whichever happens first.
pub struct ProgressReader<S> {
    source: Option<S>,
    buf: BytesMut,
    codec: DataLineCodec,
    state: StreamState,
    idle_timeout: Option<Duration>,
    malformed: usize,
}

impl<S, E> ProgressReader<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<ClientError>,
{
    pub fn new(source: S) -> ProgressReader<S> {
        ProgressReader {
            source: Some(source),
            buf: BytesMut::new(),
            codec: DataLineCodec::new(),
            state: StreamState::Streaming,
            idle_timeout: None,
            malformed: 0,
        }
    }

    /// Discard event lines longer than `max` bytes instead of buffering them.
    pub fn max_line_length(mut self, max: usize) -> Self {
        self.codec = DataLineCodec::new_with_max_length(max);
        self
    }

    /// Fail with a transport error if no chunk arrives within `timeout`.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Number of event lines that were dropped because they could not be decoded.
    pub fn malformed_lines(&self) -> usize {
        self.malformed
    }

    /// Whether the byte source is still held.
    pub fn holds_source(&self) -> bool {
        self.source.is_some()
    }

    fn finish(&mut self, state: StreamState) {
        self.state = state;
        if self.source.take().is_some() {
            tracing::debug!(?state, "byte source released");
        }
        self.buf.clear();
    }

    /// Drop the source and refuse further reads.
    pub fn abort(&mut self) {
        if self.state == StreamState::Streaming {
            self.finish(StreamState::Failed);
        }
    }

    fn take_event(&mut self) -> Option<ProgressEvent> {
        // Decoding never returns an error; see `DataLineCodec::decode`.
        while let Ok(Some(frame)) = self.codec.decode(&mut self.buf) {
            match frame {
                DataFrame::Data(payload) => match serde_json::from_str::<ProgressEvent>(&payload)
                {
                    Ok(ev) => return Some(ev),
                    Err(e) => {
                        self.malformed += 1;
                        tracing::warn!("Failed to parse judge event `{}`: {}", payload, e);
                    }
                },
                DataFrame::Oversized(len) => {
                    self.malformed += 1;
                    tracing::warn!(
                        "Dropped a {} byte event line (limit {})",
                        len,
                        self.codec.max_length()
                    );
                }
            }
        }
        None
    }

    async fn read(&mut self, cancel: &CancellationToken) -> Read<Result<Bytes, E>> {
        let source = match self.source.as_mut() {
            Some(s) => s,
            None => return Read::End,
        };
        let idle_timeout = self.idle_timeout;
        let next = async move {
            match idle_timeout {
                Some(t) => tokio::time::timeout(t, source.next()).await.ok(),
                None => Some(source.next().await),
            }
        };
        match next.with_cancel(cancel.cancelled()).await {
            None => Read::Cancelled,
            Some(None) => Read::IdleTimeout,
            Some(Some(None)) => Read::End,
            Some(Some(Some(chunk))) => Read::Chunk(chunk),
        }
    }

    /// Read until the next well-formed event.
    ///
    /// Returns `Ok(None)` once the stream is over: either the terminal event
    /// was already returned or the source ran dry. A terminal event releases
    /// the source before it is returned, so it never triggers another read.
    pub async fn next_event(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<ProgressEvent>, ClientError> {
        loop {
            if self.state != StreamState::Streaming {
                return Ok(None);
            }

            if let Some(ev) = self.take_event() {
                if ev.finish {
                    self.finish(StreamState::Completed);
                }
                return Ok(Some(ev));
            }

            match self.read(cancel).await {
                Read::Chunk(Ok(bytes)) => {
                    tracing::trace!("received {} bytes", bytes.len());
                    self.buf.extend_from_slice(&bytes);
                }
                Read::Chunk(Err(e)) => {
                    self.finish(StreamState::Failed);
                    return Err(e.into());
                }
                Read::End => {
                    // Whatever is left has no newline, so it is never an event.
                    if !self.buf.is_empty() {
                        tracing::debug!("dropping {} trailing bytes", self.buf.len());
                    }
                    tracing::debug!("stream ended without a terminal event");
                    self.finish(StreamState::Exhausted);
                    return Ok(None);
                }
                Read::IdleTimeout => {
                    self.finish(StreamState::Failed);
                    return Err(ClientError::Transport(format!(
                        "no data received for {:?}",
                        self.idle_timeout.unwrap_or_default()
                    )));
                }
                Read::Cancelled => {
                    self.finish(StreamState::Failed);
                    return Err(ClientError::Cancelled);
                }
            }
        }
    }

    /// Feed every event to `on_progress` in stream order.
    ///
    /// Resolves to the terminal event, or `None` if the stream ran dry first.
    /// An error from `on_progress` stops the stream and is returned as
    /// [`ClientError::Callback`].
    pub async fn drive<F>(
        mut self,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<Option<ProgressEvent>, ClientError>
    where
        F: FnMut(&ProgressEvent) -> anyhow::Result<()>,
    {
        while let Some(ev) = self.next_event(cancel).await? {
            if let Err(e) = on_progress(&ev) {
                self.abort();
                return Err(ClientError::Callback(e));
            }
            if ev.finish {
                return Ok(Some(ev));
            }
        }
        Ok(None)
    }

    /// Turn the reader into a lazy, non-restartable sequence of events.
    ///
    /// The sequence ends right after the terminal event, after the source
    /// runs dry, or after the first error.
    pub fn into_stream(
        self,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<ProgressEvent, ClientError>> {
        futures::stream::unfold(Some((self, cancel)), |st| async move {
            let (mut reader, cancel) = st?;
            match reader.next_event(&cancel).await {
                Ok(Some(ev)) => Some((Ok(ev), Some((reader, cancel)))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
