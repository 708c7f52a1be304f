use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tracing::debug;
use url::Url;

use common::{Error, Result, StreamConfig};

/// Why a connection attempt or an established stream stopped.
/// Every variant is transient: the ingestor backs off and reconnects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamFailure {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("provider answered HTTP {0}")]
    Status(u16),

    #[error("timed out waiting for the provider")]
    Timeout,

    #[error("read failed: {0}")]
    Read(String),

    #[error("stream ended")]
    Ended,
}

/// Parameters of one streaming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub ticker: String,
    /// Minutes of history the provider replays before realtime bars.
    pub barsback: u32,
    pub token: String,
}

/// Newline-delimited message stream of one open connection.
#[async_trait]
pub trait LineStream: Send {
    /// Next complete line. `Ok(None)` once the provider closed the stream.
    async fn next_line(&mut self) -> std::result::Result<Option<String>, StreamFailure>;
}

/// Opens bar streams. Production uses `HttpConnector`.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(
        &self,
        request: &StreamRequest,
    ) -> std::result::Result<Box<dyn LineStream>, StreamFailure>;
}

/// Bar stream over chunked HTTP.
pub struct HttpConnector {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(config: &StreamConfig) -> Result<Self> {
        let endpoint = format!(
            "{}/{}/",
            config.api_base_url.trim_end_matches('/'),
            config.barcharts_uri.trim_matches('/')
        );
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| Error::Config(format!("invalid API_BASE_URL '{}': {e}", config.api_base_url)))?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            timeout: config.request_timeout,
        })
    }

    /// `{base}/{uri}/{ticker}?interval=1&unit=minute&barsback=N`
    pub fn url_for(&self, ticker: &str, barsback: u32) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("endpoint {} cannot take a ticker path", self.endpoint)))?
            .pop_if_empty()
            .push(ticker);
        url.query_pairs_mut()
            .append_pair("interval", "1")
            .append_pair("unit", "minute")
            .append_pair("barsback", &barsback.to_string());
        Ok(url)
    }
}

#[async_trait]
impl StreamConnector for HttpConnector {
    async fn connect(
        &self,
        request: &StreamRequest,
    ) -> std::result::Result<Box<dyn LineStream>, StreamFailure> {
        let url = self
            .url_for(&request.ticker, request.barsback)
            .map_err(|e| StreamFailure::Connect(e.to_string()))?;
        debug!(ticker = %request.ticker, url = %url, "Requesting bar stream");

        let send = self.client.get(url).bearer_auth(&request.token).send();
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| StreamFailure::Timeout)?
            .map_err(|e| StreamFailure::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamFailure::Status(status.as_u16()));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();

        Ok(Box::new(HttpLineStream {
            body,
            pending: Vec::new(),
            lines: VecDeque::new(),
            read_timeout: self.timeout,
            ended: false,
        }))
    }
}

struct HttpLineStream {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    pending: Vec<u8>,
    lines: VecDeque<String>,
    read_timeout: Duration,
    ended: bool,
}

impl HttpLineStream {
    fn push_chunk(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        let mut start = 0;
        while let Some(pos) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            let raw = &self.pending[start..end];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            self.lines.push_back(String::from_utf8_lossy(raw).into_owned());
            start = end + 1;
        }
        self.pending.drain(..start);
    }
}

#[async_trait]
impl LineStream for HttpLineStream {
    async fn next_line(&mut self) -> std::result::Result<Option<String>, StreamFailure> {
        loop {
            if let Some(line) = self.lines.pop_front() {
                return Ok(Some(line));
            }
            if self.ended {
                return Ok(None);
            }

            match tokio::time::timeout(self.read_timeout, self.body.next()).await {
                Err(_) => return Err(StreamFailure::Timeout),
                Ok(Some(Ok(chunk))) => self.push_chunk(&chunk),
                Ok(Some(Err(e))) => return Err(StreamFailure::Read(e.to_string())),
                Ok(None) => {
                    self.ended = true;
                    // Unterminated last message.
                    if !self.pending.is_empty() {
                        let rest = std::mem::take(&mut self.pending);
                        self.lines
                            .push_back(String::from_utf8_lossy(&rest).into_owned());
                    }
                }
            }
        }
    }
}
