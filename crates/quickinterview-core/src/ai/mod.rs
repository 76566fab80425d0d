//! Vendor adapters
//!
//! Each adapter owns two contracts for its backend: shaping the role-tagged
//! history into a streaming request, and pulling the text delta (if any) out
//! of one server-sent-event record. All three vendors frame events as
//! `data: <json>` lines.

pub mod claude;
pub mod gemini;
pub mod openai;

pub use claude::ClaudeAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAIAdapter;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::ChatError;
use crate::state::ChatMessage;

pub(crate) const TEMPERATURE: f64 = 0.7;
pub(crate) const MAX_OUTPUT_TOKENS: u32 = 2048;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// A fully shaped HTTP request, ready for a [`crate::transport::Transport`]
#[derive(Debug, Clone)]
pub struct VendorRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

impl VendorRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub trait VendorAdapter: Send + Sync {
    /// Human-readable vendor name used in error messages
    fn name(&self) -> &'static str;

    fn default_model(&self) -> &'static str;

    fn build_request(
        &self,
        history: &[ChatMessage],
        credential: &str,
        model: &str,
    ) -> Result<VendorRequest, ChatError>;

    /// Text carried by one record, or `None` for sentinels, metadata and noise
    fn extract_delta(&self, record: &str) -> Option<String>;

    /// Message for a non-success response body
    fn error_message(&self, body: &str) -> String {
        envelope_message(body)
            .unwrap_or_else(|| format!("Failed to get response from {}", self.name()))
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

fn envelope_message(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    envelope
        .error?
        .message
        .filter(|message| !message.trim().is_empty())
}

/// JSON payload of a `data: ` record. The `[DONE]` sentinel is only
/// recognized when `skip_done` is set.
pub(crate) fn sse_payload(record: &str, skip_done: bool) -> Option<&str> {
    if record.trim().is_empty() {
        return None;
    }
    let payload = record.strip_prefix(DATA_PREFIX)?;
    if skip_done && payload.trim() == DONE_SENTINEL {
        return None;
    }
    Some(payload)
}

/// Parse a record's payload, treating malformed JSON as noise
pub(crate) fn parse_payload<T: DeserializeOwned>(payload: &str) -> Option<T> {
    match serde_json::from_str(payload) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::trace!(error = %err, "skipping undecodable stream record");
            None
        }
    }
}

/// First system message in the history, if any
pub(crate) fn system_prompt(history: &[ChatMessage]) -> Option<&str> {
    history
        .iter()
        .find(|m| m.role == crate::state::ChatRole::System)
        .map(|m| m.content.as_str())
}
