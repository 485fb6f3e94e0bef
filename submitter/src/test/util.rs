use bytes::Bytes;
use futures::{stream::BoxStream, Stream, StreamExt};
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use std::{
    collections::VecDeque,
    convert::Infallible,
    net::SocketAddr,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    task::{Context, Poll},
    time::Duration,
};

use crate::client::{config::ClientConfig, model::ProgressEvent};

/// Format one `data: ` line for an event.
pub fn event_line(finish: bool, judged: u32, accepted: u32, code: i64) -> String {
    format!(
        "data: {{\"finish\":{},\"judgeCaseNum\":{},\"acceptNum\":{},\"commitResult\":{},\"consumeTime\":{},\"consumeMemory\":{}}}\n",
        finish,
        judged,
        accepted,
        code,
        judged * 10,
        1024 + judged
    )
}

pub fn event(finish: bool, judged: u32, accepted: u32, code: i64) -> ProgressEvent {
    ProgressEvent {
        finish,
        judge_case_num: judged,
        accept_num: accepted,
        commit_result: code.into(),
        consume_time: judged as u64 * 10,
        consume_memory: 1024 + judged as u64,
    }
}

pub fn chunked(body: &[u8], size: usize) -> Vec<Bytes> {
    body.chunks(size).map(Bytes::copy_from_slice).collect()
}

#[derive(Debug, Default)]
pub struct SourceStats {
    reads: AtomicUsize,
    releases: AtomicUsize,
}

impl SourceStats {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// A scripted byte source that counts how often it is polled and dropped.
pub struct FakeSource {
    chunks: VecDeque<Result<Bytes, std::io::Error>>,
    hang_at_end: bool,
    stats: Arc<SourceStats>,
}

impl FakeSource {
    pub fn new(chunks: Vec<Bytes>) -> (FakeSource, Arc<SourceStats>) {
        let stats = Arc::new(SourceStats::default());
        let src = FakeSource {
            chunks: chunks.into_iter().map(Ok).collect(),
            hang_at_end: false,
            stats: stats.clone(),
        };
        (src, stats)
    }

    pub fn from_strs(chunks: &[&str]) -> (FakeSource, Arc<SourceStats>) {
        Self::new(
            chunks
                .iter()
                .map(|c| Bytes::copy_from_slice(c.as_bytes()))
                .collect(),
        )
    }

    /// Yield an IO error once the scripted chunks run out.
    pub fn then_fail(mut self, msg: &str) -> Self {
        self.chunks.push_back(Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            msg.to_owned(),
        )));
        self
    }

    /// Never finish once the scripted chunks run out.
    pub fn then_hang(mut self) -> Self {
        self.hang_at_end = true;
        self
    }
}

impl Stream for FakeSource {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stats.reads.fetch_add(1, Ordering::SeqCst);
        match self.chunks.pop_front() {
            Some(c) => Poll::Ready(Some(c)),
            None if self.hang_at_end => Poll::Pending,
            None => Poll::Ready(None),
        }
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.stats.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: serde_json::Value,
}

/// What the mock judge answers to every request.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: StatusCode,
    pub chunks: Vec<Bytes>,
    pub chunk_delay: Option<Duration>,
    pub hang: bool,
}

impl MockResponse {
    pub fn stream(chunks: &[&str]) -> MockResponse {
        MockResponse {
            status: StatusCode::OK,
            chunks: chunks
                .iter()
                .map(|c| Bytes::copy_from_slice(c.as_bytes()))
                .collect(),
            chunk_delay: None,
            hang: false,
        }
    }

    pub fn status(status: u16, body: &str) -> MockResponse {
        MockResponse {
            status: StatusCode::from_u16(status).unwrap(),
            ..MockResponse::stream(&[body])
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    fn body(&self) -> Body {
        let delay = self.chunk_delay;
        let chunks = futures::stream::iter(self.chunks.clone()).then(move |c| async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            Ok::<_, std::io::Error>(c)
        });
        let stream: BoxStream<'static, Result<Bytes, std::io::Error>> = if self.hang {
            chunks.chain(futures::stream::pending()).boxed()
        } else {
            chunks.boxed()
        };
        Body::wrap_stream(stream)
    }
}

pub struct MockJudge {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockJudge {
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            host: self.addr.to_string(),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle(
    req: Request<Body>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    resp: Arc<MockResponse>,
) -> Result<Response<Body>, Infallible> {
    let (parts, body) = req.into_parts();
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    let authorization = header("authorization");
    let content_type = header("content-type");
    let path = parts.uri.path().to_owned();
    let body = hyper::body::to_bytes(body).await.unwrap();
    requests.lock().unwrap().push(RecordedRequest {
        path,
        authorization,
        content_type,
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    });

    let res = Response::builder()
        .status(resp.status)
        .header("content-type", "text/event-stream")
        .body(resp.body())
        .unwrap();
    Ok(res)
}

/// Start an in-process judge answering every request with `resp`.
pub fn serve(resp: MockResponse) -> MockJudge {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let resp = Arc::new(resp);
    let make = make_service_fn({
        let requests = requests.clone();
        move |_conn| {
            let requests = requests.clone();
            let resp = resp.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    handle(req, requests.clone(), resp.clone())
                }))
            }
        }
    });
    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make);
    let addr = server.local_addr();
    tokio::spawn(async move {
        if let Err(e) = server.await {
            tracing::error!("mock judge failed: {}", e);
        }
    });
    MockJudge { addr, requests }
}
