//! Scripted transport shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use quickinterview_core::transport::{ByteStream, Transport, TransportResponse};
use quickinterview_core::{ChatError, VendorRequest};

pub enum Script {
    Chunks { status: u16, chunks: Vec<Vec<u8>> },
    Live(mpsc::UnboundedReceiver<Result<Vec<u8>, ChatError>>),
    /// Chunks followed by a read error
    Broken(Vec<Vec<u8>>),
    Fail(String),
}

impl Script {
    /// Complete SSE body, one record per line
    pub fn lines(lines: &[&str]) -> Self {
        Self::Chunks {
            status: 200,
            chunks: vec![sse(lines)],
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::Chunks {
            status,
            chunks: vec![body.as_bytes().to_vec()],
        }
    }

    /// Body fed chunk by chunk from the returned handle; dropping it ends the body
    pub fn live() -> (LiveBody, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (LiveBody { tx }, Self::Live(rx))
    }
}

pub struct LiveBody {
    tx: mpsc::UnboundedSender<Result<Vec<u8>, ChatError>>,
}

impl LiveBody {
    pub fn send(
        &self,
        chunk: Vec<u8>,
    ) -> Result<(), mpsc::error::SendError<Result<Vec<u8>, ChatError>>> {
        self.tx.send(Ok(chunk))
    }

    /// Fail the body with a read error
    pub fn fail(&self, message: &str) {
        let _ = self.tx.send(Err(ChatError::Network(message.to_string())));
    }
}

pub fn sse(lines: &[&str]) -> Vec<u8> {
    lines.iter().map(|l| format!("{}\n", l)).collect::<String>().into_bytes()
}

#[derive(Default)]
pub struct ScriptedTransport {
    calls: AtomicUsize,
    requests: Mutex<Vec<VendorRequest>>,
    scripts: Mutex<VecDeque<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().push_back(script);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<VendorRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &VendorRequest) -> Result<TransportResponse, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let script = self.scripts.lock().pop_front();
        match script {
            Some(Script::Chunks { status, chunks }) => {
                let chunks: Vec<Result<Vec<u8>, ChatError>> = chunks.into_iter().map(Ok).collect();
                Ok(TransportResponse {
                    status,
                    body: stream::iter(chunks).boxed(),
                })
            }
            Some(Script::Live(rx)) => {
                let body: ByteStream = stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })
                .boxed();
                Ok(TransportResponse { status: 200, body })
            }
            Some(Script::Broken(chunks)) => {
                let mut items: Vec<Result<Vec<u8>, ChatError>> =
                    chunks.into_iter().map(Ok).collect();
                items.push(Err(ChatError::Network("connection reset".to_string())));
                Ok(TransportResponse {
                    status: 200,
                    body: stream::iter(items).boxed(),
                })
            }
            Some(Script::Fail(message)) => Err(ChatError::Network(message)),
            None => Err(ChatError::Network("no scripted response".to_string())),
        }
    }
}
