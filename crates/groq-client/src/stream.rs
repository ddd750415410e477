use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::StreamExt as _;
use tokio::sync::{mpsc, watch};
use tracing::{Instrument as _, debug, warn};

use crate::completion::ChatCompletionResponse;
use crate::config::SentinelMatch;
use crate::errors::StreamError;

/// One decoded unit of a streamed completion.
#[derive(Clone, Debug, PartialEq)]
pub enum Fragment {
    /// A decoded completion chunk.
    Chunk(ChatCompletionResponse),
    /// A carried failure. See [`StreamError::is_recoverable`].
    Error(StreamError),
}

impl Fragment {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn into_result(self) -> Result<ChatCompletionResponse, StreamError> {
        match self {
            Self::Chunk(chunk) => Ok(chunk),
            Self::Error(err) => Err(err),
        }
    }
}

/// Handle used to request early termination of a stream.
///
/// Clones share one token. Cancelling is idempotent and returns promptly;
/// the connection is torn down by the stream task afterwards.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Requests cancellation.
    ///
    /// Returns `true` for the one call that flipped the token; every other
    /// call (earlier cancel, concurrent cancel) returns `false`.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Fragments of one streamed completion, in the order events arrived.
///
/// Yields `None` once the stream is closed: after the end-of-stream marker,
/// after a terminal error fragment, at the natural end of the response, or
/// as soon as the stream is cancelled (fragments still buffered at that
/// point are discarded). Dropping the stream tears the connection down.
pub struct FragmentStream {
    session_id: uuid::Uuid,
    rx: mpsc::Receiver<Fragment>,
    cancel: CancelHandle,
}

impl FragmentStream {
    /// Spawns the stream task over an established HTTP request.
    ///
    /// The request is sent from inside the task so cancellation can
    /// interrupt the connect.
    pub(crate) fn connect(
        request: reqwest::RequestBuilder,
        sentinel: SentinelMatch,
        capacity: usize,
    ) -> Self {
        Self::spawn(capacity, move |session| session.connect_and_pump(request, sentinel))
    }

    /// Spawns the stream task over an already-open body.
    #[cfg(test)]
    pub(crate) fn from_body<S, B, E>(body: S, sentinel: SentinelMatch, capacity: usize) -> Self
    where
        S: futures::Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Display + Send + 'static,
    {
        Self::spawn(capacity, move |mut session| async move {
            session.pump(body, sentinel).await
        })
    }

    fn spawn<F, Fut>(capacity: usize, task: F) -> Self
    where
        F: FnOnce(StreamSession) -> Fut,
        Fut: std::future::Future<Output = Close> + Send + 'static,
    {
        let session_id = uuid::Uuid::new_v4();
        let (tx, rx) = mpsc::channel(capacity);
        let (cancel, cancel_rx) = CancelHandle::new();
        let session = StreamSession { tx, cancel_rx };
        let span = tracing::debug_span!("groq_stream", session_id = %session_id);
        let fut = task(session);
        tokio::spawn(
            async move {
                let close = fut.await;
                debug!(reason = ?close, "stream closed");
            }
            .instrument(span),
        );
        Self {
            session_id,
            rx,
            cancel,
        }
    }

    /// Identifier used in this stream's log events.
    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    /// Returns a handle that can cancel this stream from anywhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Shorthand for `cancel_handle().cancel()`.
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    /// Waits for the next fragment; `None` once the stream is closed.
    pub async fn next_fragment(&mut self) -> Option<Fragment> {
        self.next().await
    }

    /// Drains the stream and returns every chunk, or the first error.
    pub async fn collect_chunks(mut self) -> Result<Vec<ChatCompletionResponse>, StreamError> {
        let mut chunks = Vec::new();
        while let Some(fragment) = self.next().await {
            match fragment {
                Fragment::Chunk(chunk) => chunks.push(chunk),
                Fragment::Error(err) => {
                    self.cancel();
                    return Err(err);
                }
            }
        }
        Ok(chunks)
    }

    /// Drains the stream and concatenates the text of every chunk.
    pub async fn collect_text(self) -> Result<String, StreamError> {
        let chunks = self.collect_chunks().await?;
        Ok(chunks.iter().map(ChatCompletionResponse::text).collect())
    }
}

impl futures::Stream for FragmentStream {
    type Item = Fragment;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Fragment>> {
        if self.cancel.is_cancelled() {
            self.rx.close();
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for FragmentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentStream")
            .field("session_id", &self.session_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Why a stream task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Close {
    Sentinel,
    EndOfStream,
    Cancelled,
    ConsumerGone,
    Failed,
}

/// State owned by the stream task. The task holds the only fragment
/// sender, so the stream closes exactly when the task returns.
struct StreamSession {
    tx: mpsc::Sender<Fragment>,
    cancel_rx: watch::Receiver<bool>,
}

enum Step {
    Continue,
    Stop(Close),
}

impl StreamSession {
    async fn connect_and_pump(mut self, request: reqwest::RequestBuilder, sentinel: SentinelMatch) -> Close {
        let sent = tokio::select! {
            biased;
            _ = cancelled(&mut self.cancel_rx) => return Close::Cancelled,
            _ = self.tx.closed() => return Close::ConsumerGone,
            sent = request.send() => sent,
        };
        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "stream connect failed");
                return self
                    .fail(StreamError::Transport {
                        message: format!("failed to connect to the server: {e}"),
                    })
                    .await;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel_rx) => return Close::Cancelled,
                text = response.text() => text.unwrap_or_else(|_| "<unreadable body>".to_string()),
            };
            warn!(status = status.as_u16(), "stream request rejected");
            return self
                .fail(StreamError::Status {
                    status: status.as_u16(),
                    body,
                })
                .await;
        }
        if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            let is_event_stream = content_type
                .to_str()
                .map(|v| v.trim_start().starts_with("text/event-stream"))
                .unwrap_or(false);
            if !is_event_stream {
                return self
                    .fail(StreamError::Protocol {
                        message: format!("unexpected content type {content_type:?}"),
                    })
                    .await;
            }
        }

        debug!(status = status.as_u16(), "stream connected");
        self.pump(response.bytes_stream(), sentinel).await
    }

    async fn pump<S, B, E>(&mut self, body: S, sentinel: SentinelMatch) -> Close
    where
        S: futures::Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let mut body = std::pin::pin!(body);
        let mut decoder = crate::sse::SseDecoder::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel_rx) => return Close::Cancelled,
                _ = self.tx.closed() => return Close::ConsumerGone,
                next = body.next() => next,
            };
            match next {
                Some(Ok(bytes)) => {
                    for event in decoder.push_chunk(bytes.as_ref()) {
                        if let Step::Stop(close) = self.handle_event(&event.data, sentinel).await {
                            return close;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "stream read failed");
                    return self
                        .fail(StreamError::Transport {
                            message: format!("failed to read event stream: {e}"),
                        })
                        .await;
                }
                None => {
                    if let Some(event) = decoder.finish()
                        && let Step::Stop(close) = self.handle_event(&event.data, sentinel).await
                    {
                        return close;
                    }
                    return Close::EndOfStream;
                }
            }
        }
    }

    async fn handle_event(&mut self, data: &str, sentinel: SentinelMatch) -> Step {
        if sentinel.is_sentinel(data) {
            return Step::Stop(Close::Sentinel);
        }
        let fragment = match serde_json::from_str::<ChatCompletionResponse>(data) {
            Ok(chunk) => Fragment::Chunk(chunk),
            Err(e) => {
                debug!(error = %e, "undecodable stream event");
                Fragment::Error(StreamError::Decode {
                    message: format!("failed to unmarshal response: {e}"),
                })
            }
        };
        match self.emit(fragment).await {
            Ok(()) => Step::Continue,
            Err(close) => Step::Stop(close),
        }
    }

    /// Sends one fragment, giving up if the stream is cancelled or dropped
    /// while waiting for buffer space.
    async fn emit(&mut self, fragment: Fragment) -> Result<(), Close> {
        tokio::select! {
            biased;
            _ = cancelled(&mut self.cancel_rx) => Err(Close::Cancelled),
            sent = self.tx.send(fragment) => sent.map_err(|_| Close::ConsumerGone),
        }
    }

    async fn fail(&mut self, err: StreamError) -> Close {
        match self.emit(Fragment::Error(err)).await {
            Ok(()) => Close::Failed,
            Err(close) => close,
        }
    }
}

/// Resolves once cancellation is requested or every handle is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|cancelled| *cancelled).await;
}
