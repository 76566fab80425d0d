//! Provider-agnostic streaming entry point
//!
//! Resolves the configured provider, sends the shaped request and exposes the
//! response as one sequence of text deltas, whatever the vendor's wire shape.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::ai::VendorAdapter;
use crate::error::ChatError;
use crate::provider::Provider;
use crate::state::ChatMessage;
use crate::transport::{HttpTransport, RecordStream, Transport};

/// Per-call provider selection and credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Provider identifier as stored in settings, e.g. `"openai"`
    pub provider: String,
    pub credential: String,
    pub model: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            credential: credential.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn has_credential(&self) -> bool {
        !self.credential.trim().is_empty()
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Arc::new(HttpTransport::new()))
    }
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Start a generation and return its delta sequence.
    ///
    /// Fails before touching the network for an unknown provider. A
    /// non-success status fails the whole call with the vendor's message.
    pub async fn stream(
        &self,
        history: &[ChatMessage],
        config: &ProviderConfig,
    ) -> Result<DeltaStream, ChatError> {
        let provider: Provider = config.provider.parse()?;
        let adapter = provider.adapter();
        let model = config
            .model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| adapter.default_model());

        let request = adapter.build_request(history, &config.credential, model)?;
        debug!(provider = %provider, model, turns = history.len(), "starting stream");

        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            let status = response.status;
            let body = response.text().await.unwrap_or_default();
            let message = adapter.error_message(&body);
            warn!(provider = %provider, status, %message, "provider rejected request");
            return Err(ChatError::Api {
                provider: adapter.name(),
                status,
                message,
            });
        }

        Ok(DeltaStream {
            adapter,
            records: RecordStream::new(response.body),
        })
    }
}

/// Forward-only sequence of text deltas for one generation
pub struct DeltaStream {
    adapter: &'static dyn VendorAdapter,
    records: RecordStream,
}

impl DeltaStream {
    /// `Ok(Some(delta))` for the next fragment, `Ok(None)` when the transport
    /// closes cleanly. Records without text are skipped.
    pub async fn next_delta(&mut self) -> Result<Option<String>, ChatError> {
        while let Some(record) = self.records.next_record().await? {
            if let Some(delta) = self.adapter.extract_delta(&record) {
                return Ok(Some(delta));
            }
        }
        Ok(None)
    }

    /// Drain the rest of the stream into one string
    pub async fn collect_text(mut self) -> Result<String, ChatError> {
        let mut text = String::new();
        while let Some(delta) = self.next_delta().await? {
            text.push_str(&delta);
        }
        Ok(text)
    }
}
