use thiserror::Error;

/// Errors surfaced by the streaming layer and the chat controller.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("API key is not configured. Please add it in settings")]
    MissingCredential,

    #[error("Unsupported AI provider: {0}")]
    UnsupportedProvider(String),

    /// Non-success HTTP status; `message` comes from the vendor's error envelope
    #[error("{message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No response received from AI")]
    EmptyResponse,

    #[error("Failed to build request: {0}")]
    Request(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ChatError {
    /// Configuration errors are raised before any network call is attempted
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingCredential | Self::UnsupportedProvider(_))
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
