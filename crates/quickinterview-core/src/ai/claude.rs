use serde::{Deserialize, Serialize};

use super::{
    parse_payload, sse_payload, system_prompt, VendorAdapter, VendorRequest, MAX_OUTPUT_TOKENS,
    TEMPERATURE,
};
use crate::error::ChatError;
use crate::prompt::DEFAULT_COACH_PROMPT;
use crate::state::{ChatMessage, ChatRole};

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const CONTENT_BLOCK_DELTA: &str = "content_block_delta";

#[derive(Serialize)]
struct ClaudeMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    messages: Vec<ClaudeMessage>,
    system: String,
    max_tokens: u32,
    temperature: f64,
    stream: bool,
}

#[derive(Deserialize)]
struct ClaudeEvent {
    #[serde(rename = "type")]
    kind: Option<String>,
    delta: Option<ClaudeDelta>,
}

#[derive(Deserialize)]
struct ClaudeDelta {
    text: Option<String>,
}

/// Anthropic messages API with `stream: true`
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeAdapter;

impl VendorAdapter for ClaudeAdapter {
    fn name(&self) -> &'static str {
        "Claude"
    }

    fn default_model(&self) -> &'static str {
        "claude-3-5-sonnet-20241022"
    }

    fn build_request(
        &self,
        history: &[ChatMessage],
        credential: &str,
        model: &str,
    ) -> Result<VendorRequest, ChatError> {
        let request = ClaudeRequest {
            model: model.to_string(),
            messages: history
                .iter()
                .filter(|m| m.role != ChatRole::System)
                .map(|m| ClaudeMessage {
                    role: if m.role == ChatRole::Assistant { "assistant" } else { "user" },
                    content: m.content.clone(),
                })
                .collect(),
            system: system_prompt(history)
                .unwrap_or(DEFAULT_COACH_PROMPT)
                .to_string(),
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: TEMPERATURE,
            stream: true,
        };

        Ok(VendorRequest {
            url: CLAUDE_API_URL.to_string(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("x-api-key".to_string(), credential.to_string()),
                ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
            ],
            body: serde_json::to_value(&request)?,
        })
    }

    fn extract_delta(&self, record: &str) -> Option<String> {
        // Claude ends with a `message_stop` event rather than a [DONE] sentinel
        let event: ClaudeEvent = parse_payload(sse_payload(record, false)?)?;
        if event.kind.as_deref() != Some(CONTENT_BLOCK_DELTA) {
            return None;
        }
        event.delta?.text.filter(|text| !text.is_empty())
    }
}
