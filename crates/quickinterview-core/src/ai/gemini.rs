use serde::{Deserialize, Serialize};

use super::{
    parse_payload, sse_payload, system_prompt, VendorAdapter, VendorRequest, MAX_OUTPUT_TOKENS,
    TEMPERATURE,
};
use crate::error::ChatError;
use crate::state::{ChatMessage, ChatRole};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_k: u32,
    top_p: f64,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiInstruction>,
}

#[derive(Deserialize)]
struct GeminiChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

/// Google Gemini `streamGenerateContent` with SSE framing
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiAdapter;

impl VendorAdapter for GeminiAdapter {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    fn default_model(&self) -> &'static str {
        "gemini-2.5-flash"
    }

    fn build_request(
        &self,
        history: &[ChatMessage],
        credential: &str,
        model: &str,
    ) -> Result<VendorRequest, ChatError> {
        let contents = history
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| GeminiContent {
                role: if m.role == ChatRole::Assistant { "model" } else { "user" },
                parts: vec![GeminiPart {
                    text: m.content.clone(),
                }],
            })
            .collect();

        let request = GeminiRequest {
            contents,
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                top_k: 40,
                top_p: 0.95,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
            system_instruction: system_prompt(history).map(|text| GeminiInstruction {
                parts: vec![GeminiPart {
                    text: text.to_string(),
                }],
            }),
        };

        Ok(VendorRequest {
            url: format!(
                "{}/{}:streamGenerateContent?key={}&alt=sse",
                GEMINI_API_URL, model, credential
            ),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: serde_json::to_value(&request)?,
        })
    }

    fn extract_delta(&self, record: &str) -> Option<String> {
        let chunk: GeminiChunk = parse_payload(sse_payload(record, true)?)?;
        chunk
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|text| !text.is_empty())
    }
}
