pub mod codec;
pub mod config;
mod err;
pub mod model;
pub mod reader;

pub use self::err::*;
use self::{config::ClientConfig, model::*, reader::ProgressReader};
use crate::{
    prelude::{CancellationToken, FutureCancelExt},
    session::CredentialProvider,
};
use bytes::{Bytes, BytesMut};
use futures::{stream::BoxStream, Stream, StreamExt};
use reqwest::{header, StatusCode};
use std::sync::Arc;
use tracing::info_span;
use tracing_futures::Instrument;

/// Body of a successful response, as handed to the reader.
pub type ResponseStream = BoxStream<'static, reqwest::Result<Bytes>>;

/// Sends submissions to the judge and follows their result streams.
///
/// Holds no per-submission state; every call owns its own request, buffer and
/// byte source, so concurrent calls on one client are independent.
pub struct StreamingSubmissionClient {
    cfg: Arc<ClientConfig>,
    credentials: Arc<dyn CredentialProvider>,
    client: reqwest::Client,
}

impl StreamingSubmissionClient {
    pub fn new(
        cfg: Arc<ClientConfig>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = cfg.connect_timeout() {
            builder = builder.connect_timeout(t);
        }
        let client = builder.build()?;
        Ok(Self::with_http_client(cfg, credentials, client))
    }

    pub fn with_http_client(
        cfg: Arc<ClientConfig>,
        credentials: Arc<dyn CredentialProvider>,
        client: reqwest::Client,
    ) -> Self {
        StreamingSubmissionClient {
            cfg,
            credentials,
            client,
        }
    }

    pub fn cfg(&self) -> &ClientConfig {
        &self.cfg
    }

    /// Send the request and wait for the response headers.
    ///
    /// On success, returns a reader holding the response body. Non-success
    /// statuses are turned into [`ClientError::Validation`] (400) or
    /// [`ClientError::Transport`] (everything else).
    pub async fn open(
        &self,
        req: &SubmissionRequest,
        cancel: &CancellationToken,
    ) -> Result<ProgressReader<ResponseStream>, ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let endpoint = self.cfg.endpoint_for(req.kind());
        tracing::info!("Sending {} to {}", req.kind().name(), endpoint);

        let mut post = self.client.post(&endpoint).json(&req.body());
        if let Some(token) = self.credentials.authorization() {
            post = post.header(header::AUTHORIZATION, token);
        }

        let resp = post
            .send()
            .with_cancel(cancel.cancelled())
            .await
            .ok_or(ClientError::Cancelled)??;

        let status = resp.status();
        tracing::debug!("Response status: {}", status);
        if !status.is_success() {
            let body = self
                .read_error_body(resp.bytes_stream().boxed(), cancel)
                .await?;
            let err = ClientError::from_status(status, &body);
            tracing::warn!("Submission failed ({}): {}", status, err);
            return Err(err);
        }

        // These statuses never carry a body to stream from.
        if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
            return Err(ClientError::Transport(STREAM_UNAVAILABLE_MSG.into()));
        }

        Ok(ProgressReader::new(resp.bytes_stream().boxed())
            .max_line_length(self.cfg.max_line_bytes)
            .idle_timeout(self.cfg.idle_timeout()))
    }

    /// Collect the body of a failed response.
    ///
    /// Stops early when a read fails or no chunk arrives within the idle
    /// timeout; whatever arrived until then is returned.
    async fn read_error_body(
        &self,
        mut body: ResponseStream,
        cancel: &CancellationToken,
    ) -> Result<BytesMut, ClientError> {
        let idle_timeout = self.cfg.idle_timeout();
        let mut buf = BytesMut::new();
        loop {
            let next = async {
                match idle_timeout {
                    Some(t) => tokio::time::timeout(t, body.next()).await.ok(),
                    None => Some(body.next().await),
                }
            };
            match next
                .with_cancel(cancel.cancelled())
                .await
                .ok_or(ClientError::Cancelled)?
            {
                Some(Some(Ok(chunk))) => buf.extend_from_slice(&chunk),
                Some(Some(Err(e))) => {
                    tracing::warn!("Failed to read error body: {}", e);
                    break;
                }
                Some(None) => break,
                None => {
                    tracing::warn!(
                        "Error body stalled for {:?}; using {} bytes read so far",
                        idle_timeout.unwrap_or_default(),
                        buf.len()
                    );
                    break;
                }
            }
        }
        Ok(buf)
    }

    /// Submit and report every progress event to `on_progress`.
    ///
    /// Resolves to the terminal event, or `Ok(None)` if the judge closed the
    /// stream without one.
    pub async fn run<F>(
        &self,
        req: &SubmissionRequest,
        on_progress: F,
    ) -> Result<Option<ProgressEvent>, ClientError>
    where
        F: FnMut(&ProgressEvent) -> anyhow::Result<()>,
    {
        self.run_with_cancel(req, on_progress, &CancellationToken::new())
            .await
    }

    /// Same as [`run`](Self::run), but gives up at the next suspension point
    /// once `cancel` fires.
    pub async fn run_with_cancel<F>(
        &self,
        req: &SubmissionRequest,
        on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<Option<ProgressEvent>, ClientError>
    where
        F: FnMut(&ProgressEvent) -> anyhow::Result<()>,
    {
        let span = info_span!(
            "submission",
            kind = req.kind().name(),
            question = req.question_id(),
            language = req.language_id()
        );
        async move {
            let reader = self.open(req, cancel).await?;
            let res = reader.drive(on_progress, cancel).await;
            match &res {
                Ok(Some(ev)) => tracing::info!(
                    "Finished: {} ({}/{} accepted)",
                    ev.commit_result,
                    ev.accept_num,
                    ev.judge_case_num
                ),
                Ok(None) => tracing::warn!("Result stream closed without a final verdict"),
                Err(e) => tracing::warn!("Submission aborted: {}", e),
            }
            res
        }
        .instrument(span)
        .await
    }

    /// Submit and return the progress events as a lazy sequence.
    ///
    /// The sequence ends after the terminal event; request failures surface
    /// before any event is produced.
    pub async fn events(
        &self,
        req: &SubmissionRequest,
        cancel: CancellationToken,
    ) -> Result<impl Stream<Item = Result<ProgressEvent, ClientError>>, ClientError> {
        let reader = self.open(req, &cancel).await?;
        Ok(reader.into_stream(cancel))
    }
}
