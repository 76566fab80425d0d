pub mod ai;
pub mod chat;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod prompt;
pub mod provider;
pub mod speech;
pub mod state;
pub mod store;
pub mod transport;

// Re-export main types for convenience
pub use ai::{ClaudeAdapter, GeminiAdapter, OpenAIAdapter, VendorAdapter, VendorRequest};
pub use chat::{ChatController, ChatEvent, SubmitOutcome};
pub use config::Config;
pub use dispatcher::{DeltaStream, Dispatcher, ProviderConfig};
pub use error::ChatError;
pub use provider::Provider;
pub use speech::{correct_transcript, SpeechCapture, TranscriptBuffer};
pub use state::{ChatMessage, ChatRole, ChatSession};
pub use store::{JsonSessionStore, MemorySessionStore, SessionStore};
pub use transport::{HttpTransport, LineDecoder, RecordStream, Transport, TransportResponse};
