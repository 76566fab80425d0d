//! HTTP transport and line framing for streamed responses
//!
//! The decoder splits on raw bytes before any text decoding happens. A line
//! feed never occurs inside a multi-byte UTF-8 sequence, so a character split
//! across two network reads is reassembled before it is decoded.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::Client;

use crate::ai::VendorRequest;
use crate::error::ChatError;

/// Response body as it arrives from the network
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ChatError>>;

pub struct TransportResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drain the whole body as text (used for error envelopes)
    pub async fn text(mut self) -> Result<String, ChatError> {
        let mut bytes = Vec::new();
        while let Some(chunk) = self.body.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Sends a shaped vendor request and hands back the streaming body
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &VendorRequest) -> Result<TransportResponse, ChatError>;
}

#[derive(Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &VendorRequest) -> Result<TransportResponse, ChatError> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.json(&request.body).send().await?;
        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ChatError::from))
            .boxed();

        Ok(TransportResponse { status, body })
    }
}

/// Incremental newline framing with a pending partial-line buffer
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Flush an unterminated final record at end of stream
    pub fn finish(&mut self) -> Option<String> {
        let line = decode_line(&self.pending);
        self.pending.clear();
        if line.is_empty() {
            None
        } else {
            Some(line)
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Pull-based sequence of records read from a response body
pub struct RecordStream {
    body: ByteStream,
    decoder: LineDecoder,
    ready: VecDeque<String>,
    finished: bool,
}

impl RecordStream {
    pub fn new(body: ByteStream) -> Self {
        Self {
            body,
            decoder: LineDecoder::new(),
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Next complete record, `None` once the body is exhausted
    pub async fn next_record(&mut self) -> Result<Option<String>, ChatError> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Ok(Some(line));
            }
            if self.finished {
                return Ok(None);
            }

            match self.body.next().await {
                Some(Ok(chunk)) => self.ready.extend(self.decoder.push(&chunk)),
                Some(Err(err)) => {
                    self.finished = true;
                    return Err(err);
                }
                None => {
                    self.finished = true;
                    self.ready.extend(self.decoder.finish());
                }
            }
        }
    }
}
