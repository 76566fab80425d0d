use std::fmt;
use std::str::FromStr;

use crate::ai::{ClaudeAdapter, GeminiAdapter, OpenAIAdapter, VendorAdapter};
use crate::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAI,
    Claude,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAI => "openai",
            Provider::Claude => "claude",
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::Gemini, Provider::OpenAI, Provider::Claude]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini (Google)",
            Provider::OpenAI => "ChatGPT (OpenAI)",
            Provider::Claude => "Claude (Anthropic)",
        }
    }

    /// Environment variable that overrides the stored API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Claude => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        self.adapter().default_model()
    }

    pub fn models(&self) -> Vec<String> {
        let models: &[&str] = match self {
            Provider::Gemini => &["gemini-2.5-flash", "gemini-2.5-pro", "gemini-2.0-flash-exp"],
            Provider::OpenAI => &["gpt-4o-mini", "gpt-4o", "gpt-4-turbo", "gpt-3.5-turbo"],
            Provider::Claude => &[
                "claude-3-5-sonnet-20241022",
                "claude-sonnet-4-20250514",
                "claude-3-5-haiku-20241022",
            ],
        };
        models.iter().map(|m| m.to_string()).collect()
    }

    /// Request shaping and delta extraction for this vendor
    pub fn adapter(&self) -> &'static dyn VendorAdapter {
        match self {
            Provider::Gemini => &GeminiAdapter,
            Provider::OpenAI => &OpenAIAdapter,
            Provider::Claude => &ClaudeAdapter,
        }
    }
}

impl FromStr for Provider {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAI),
            "claude" => Ok(Provider::Claude),
            _ => Err(ChatError::UnsupportedProvider(s.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
