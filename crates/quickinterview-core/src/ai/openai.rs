use serde::{Deserialize, Serialize};

use super::{parse_payload, sse_payload, VendorAdapter, VendorRequest, MAX_OUTPUT_TOKENS, TEMPERATURE};
use crate::error::ChatError;
use crate::state::ChatMessage;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    delta: Option<OpenAIDelta>,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIChunk {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

/// OpenAI chat completions with `stream: true`
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAIAdapter;

impl VendorAdapter for OpenAIAdapter {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    fn default_model(&self) -> &'static str {
        "gpt-4o-mini"
    }

    fn build_request(
        &self,
        history: &[ChatMessage],
        credential: &str,
        model: &str,
    ) -> Result<VendorRequest, ChatError> {
        // Roles pass through unchanged, system turns stay in place
        let request = OpenAIRequest {
            model: model.to_string(),
            messages: history
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: TEMPERATURE,
            max_tokens: MAX_OUTPUT_TOKENS,
            stream: true,
        };

        Ok(VendorRequest {
            url: OPENAI_API_URL.to_string(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), format!("Bearer {}", credential)),
            ],
            body: serde_json::to_value(&request)?,
        })
    }

    fn extract_delta(&self, record: &str) -> Option<String> {
        let chunk: OpenAIChunk = parse_payload(sse_payload(record, true)?)?;
        chunk
            .choices
            .into_iter()
            .next()?
            .delta?
            .content
            .filter(|content| !content.is_empty())
    }
}
