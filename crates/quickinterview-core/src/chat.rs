//! Conversation accumulator
//!
//! Folds a delta sequence into the trailing assistant message of the current
//! session and reports progress to the UI as [`ChatEvent`]s.
//!
//! Only one generation runs at a time. The in-flight marker lives in the
//! controller's state, is set by `submit` once the utterance has been
//! validated, and is cleared by a guard on every exit path. Detaching clears
//! it at once and wakes the running generation so it stops pulling.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use crate::dispatcher::{Dispatcher, ProviderConfig};
use crate::error::ChatError;
use crate::prompt::INTERVIEW_COACH_PROMPT;
use crate::state::{ChatMessage, ChatRole, ChatSession};
use crate::store::SessionStore;

/// Progress notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    SessionCreated {
        session_id: String,
    },
    MessageAdded {
        session_id: String,
        message: ChatMessage,
    },
    /// `content` is the full text accumulated so far
    Delta {
        session_id: String,
        message_id: String,
        delta: String,
        content: String,
    },
    Completed {
        session_id: String,
        message_id: String,
        content: String,
    },
    Failed {
        session_id: String,
        message_id: String,
        error: String,
    },
    Cancelled {
        session_id: String,
        message_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input or a generation already in flight; nothing was created
    Ignored,
    Completed(ChatMessage),
    /// Detached mid-stream; the message keeps what had arrived
    Cancelled(ChatMessage),
}

struct InFlight {
    session_id: String,
    message_id: String,
    cancel: Arc<Notify>,
}

#[derive(Default)]
struct ChatState {
    sessions: Vec<ChatSession>,
    current: Option<String>,
    in_flight: Option<InFlight>,
}

impl ChatState {
    fn session(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    fn session_mut(&mut self, id: &str) -> Option<&mut ChatSession> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    fn message(&self, session_id: &str, message_id: &str) -> Option<ChatMessage> {
        self.session(session_id)?
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
    }

    fn set_content(&mut self, session_id: &str, message_id: &str, content: &str) {
        if let Some(session) = self.session_mut(session_id) {
            session.set_content(message_id, content);
        }
    }

    /// Whether the generation streaming into `message_id` still holds the gate
    fn owns(&self, message_id: &str) -> bool {
        self.in_flight
            .as_ref()
            .map_or(false, |g| g.message_id == message_id)
    }

    /// Release the gate and stop the running generation from touching its
    /// message again
    fn detach(&mut self) -> bool {
        match self.in_flight.take() {
            Some(generation) => {
                generation.cancel.notify_one();
                true
            }
            None => false,
        }
    }

    fn detach_if_in(&mut self, session_id: &str) {
        let affected = self
            .in_flight
            .as_ref()
            .map_or(false, |g| g.session_id == session_id);
        if affected {
            self.detach();
        }
    }
}

struct InFlightGuard<'a> {
    state: &'a Mutex<ChatState>,
    message_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        // A detached generation no longer owns the gate
        if state.owns(&self.message_id) {
            state.in_flight = None;
        }
    }
}

enum Generation {
    Finished(String),
    Detached,
}

pub struct ChatController {
    dispatcher: Dispatcher,
    store: Arc<dyn SessionStore>,
    system_prompt: String,
    state: Mutex<ChatState>,
    events: mpsc::UnboundedSender<ChatEvent>,
}

impl ChatController {
    /// Load stored sessions and return the controller with its event receiver
    pub fn new(
        dispatcher: Dispatcher,
        store: Arc<dyn SessionStore>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ChatEvent>), ChatError> {
        let sessions = store.list()?;
        let current = store
            .current()?
            .filter(|id| sessions.iter().any(|s| &s.id == id));
        let (events, rx) = mpsc::unbounded_channel();

        let controller = Self {
            dispatcher,
            store,
            system_prompt: INTERVIEW_COACH_PROMPT.to_string(),
            state: Mutex::new(ChatState {
                sessions,
                current,
                in_flight: None,
            }),
            events,
        };
        Ok((controller, rx))
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn sessions(&self) -> Vec<ChatSession> {
        self.state.lock().sessions.clone()
    }

    pub fn current_session_id(&self) -> Option<String> {
        self.state.lock().current.clone()
    }

    pub fn current_session(&self) -> Option<ChatSession> {
        let state = self.state.lock();
        let id = state.current.as_deref()?;
        state.session(id).cloned()
    }

    pub fn is_generating(&self) -> bool {
        self.state.lock().in_flight.is_some()
    }

    /// Detach the in-flight generation, if any. Returns whether one was running.
    pub fn cancel_generation(&self) -> bool {
        let detached = self.state.lock().detach();
        if detached {
            debug!("generation detached");
        }
        detached
    }

    /// Deselect the current session; the next submit starts a new one
    pub fn new_session(&self) {
        {
            let mut state = self.state.lock();
            state.detach();
            state.current = None;
        }
        self.persist_current(None);
    }

    pub fn select_session(&self, session_id: &str) -> bool {
        {
            let mut state = self.state.lock();
            if state.session(session_id).is_none() {
                return false;
            }
            if state.current.as_deref() != Some(session_id) {
                state.detach();
            }
            state.current = Some(session_id.to_string());
        }
        self.persist_current(Some(session_id));
        true
    }

    pub fn delete_session(&self, session_id: &str) -> bool {
        let was_current = {
            let mut state = self.state.lock();
            let before = state.sessions.len();
            state.detach_if_in(session_id);
            state.sessions.retain(|s| s.id != session_id);
            if state.sessions.len() == before {
                return false;
            }
            let was_current = state.current.as_deref() == Some(session_id);
            if was_current {
                state.current = None;
            }
            was_current
        };

        if let Err(err) = self.store.delete(session_id) {
            warn!(session_id, error = %err, "failed to delete stored session");
        }
        if was_current {
            self.persist_current(None);
        }
        true
    }

    /// Remove a message from the current session. The message being streamed
    /// into cannot be removed.
    pub fn delete_message(&self, message_id: &str) -> bool {
        let session_id = {
            let mut state = self.state.lock();
            if state.owns(message_id) {
                return false;
            }
            let Some(session_id) = state.current.clone() else {
                return false;
            };
            let removed = state
                .session_mut(&session_id)
                .map_or(false, |s| s.remove_message(message_id));
            if !removed {
                return false;
            }
            session_id
        };
        self.persist(&session_id);
        true
    }

    /// Send one utterance and stream the answer into a new assistant message.
    ///
    /// Blank input and calls made while a generation is in flight return
    /// [`SubmitOutcome::Ignored`] without creating anything. On failure the
    /// assistant message content becomes `Error: <message>` and the error is
    /// returned.
    pub async fn submit(
        &self,
        utterance: &str,
        config: &ProviderConfig,
    ) -> Result<SubmitOutcome, ChatError> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Ok(SubmitOutcome::Ignored);
        }

        let cancel = Arc::new(Notify::new());
        let (session_id, created, user_message, placeholder, history) = {
            let mut state = self.state.lock();
            if state.in_flight.is_some() {
                debug!("generation already in flight, ignoring submit");
                return Ok(SubmitOutcome::Ignored);
            }
            if !config.has_credential() {
                return Err(ChatError::MissingCredential);
            }

            let (session_id, created) = match state.current.clone() {
                Some(id) if state.session(&id).is_some() => (id, false),
                _ => {
                    let session = ChatSession::new(utterance);
                    let id = session.id.clone();
                    state.sessions.push(session);
                    state.current = Some(id.clone());
                    (id, true)
                }
            };

            let user_message = ChatMessage::user(utterance);
            let placeholder = ChatMessage::assistant("");
            let mut history = vec![ChatMessage::system(self.system_prompt.as_str())];

            let Some(session) = state.session_mut(&session_id) else {
                return Err(ChatError::Storage(anyhow::anyhow!(
                    "session {} disappeared",
                    session_id
                )));
            };
            session.push(user_message.clone());
            // A detached generation may not have cleared its empty placeholder yet
            history.extend(
                session
                    .messages
                    .iter()
                    .filter(|m| !(m.role == ChatRole::Assistant && m.content.is_empty()))
                    .cloned(),
            );
            session.push(placeholder.clone());

            state.in_flight = Some(InFlight {
                session_id: session_id.clone(),
                message_id: placeholder.id.clone(),
                cancel: cancel.clone(),
            });
            (session_id, created, user_message, placeholder, history)
        };
        let guard = InFlightGuard {
            state: &self.state,
            message_id: placeholder.id.clone(),
        };

        if created {
            self.emit(ChatEvent::SessionCreated {
                session_id: session_id.clone(),
            });
            self.persist_current(Some(&session_id));
        }
        self.emit(ChatEvent::MessageAdded {
            session_id: session_id.clone(),
            message: user_message,
        });
        self.emit(ChatEvent::MessageAdded {
            session_id: session_id.clone(),
            message: placeholder.clone(),
        });
        self.persist(&session_id);

        let message_id = placeholder.id;
        let result = self
            .run_generation(&session_id, &message_id, &history, config, &cancel)
            .await;

        let detached = !self.state.lock().owns(&message_id);
        let result = match result {
            Err(err) if detached => {
                debug!(session_id = %session_id, error = %err, "detached generation ended with an error");
                Ok(Generation::Detached)
            }
            other => other,
        };

        let (outcome, event) = {
            let mut state = self.state.lock();
            match result {
                Ok(Generation::Finished(content)) => {
                    let message = state
                        .message(&session_id, &message_id)
                        .unwrap_or_else(|| ChatMessage::assistant(content.clone()));
                    let event = ChatEvent::Completed {
                        session_id: session_id.clone(),
                        message_id: message_id.clone(),
                        content,
                    };
                    (Ok(SubmitOutcome::Completed(message)), event)
                }
                Ok(Generation::Detached) => {
                    let message = state
                        .message(&session_id, &message_id)
                        .unwrap_or_else(|| ChatMessage::assistant(""));
                    if message.content.is_empty() {
                        if let Some(session) = state.session_mut(&session_id) {
                            session.remove_message(&message_id);
                        }
                    }
                    let event = ChatEvent::Cancelled {
                        session_id: session_id.clone(),
                        message_id: message_id.clone(),
                    };
                    (Ok(SubmitOutcome::Cancelled(message)), event)
                }
                Err(err) => {
                    warn!(session_id = %session_id, error = %err, "generation failed");
                    state.set_content(&session_id, &message_id, &format!("Error: {}", err));
                    let event = ChatEvent::Failed {
                        session_id: session_id.clone(),
                        message_id: message_id.clone(),
                        error: err.to_string(),
                    };
                    (Err(err), event)
                }
            }
        };
        drop(guard);

        self.persist(&session_id);
        self.emit(event);
        outcome
    }

    async fn run_generation(
        &self,
        session_id: &str,
        message_id: &str,
        history: &[ChatMessage],
        config: &ProviderConfig,
        cancel: &Notify,
    ) -> Result<Generation, ChatError> {
        let cancelled = cancel.notified();
        tokio::pin!(cancelled);

        let mut stream = tokio::select! {
            stream = self.dispatcher.stream(history, config) => stream?,
            _ = &mut cancelled => return Ok(Generation::Detached),
        };
        let mut content = String::new();

        loop {
            let delta = tokio::select! {
                delta = stream.next_delta() => delta?,
                _ = &mut cancelled => return Ok(Generation::Detached),
            };
            let Some(delta) = delta else {
                break;
            };

            content.push_str(&delta);
            let detached = {
                let mut state = self.state.lock();
                if state.owns(message_id) {
                    state.set_content(session_id, message_id, &content);
                    false
                } else {
                    true
                }
            };
            if detached {
                return Ok(Generation::Detached);
            }

            self.emit(ChatEvent::Delta {
                session_id: session_id.to_string(),
                message_id: message_id.to_string(),
                delta,
                content: content.clone(),
            });
        }

        if !self.state.lock().owns(message_id) {
            return Ok(Generation::Detached);
        }
        if content.trim().is_empty() {
            return Err(ChatError::EmptyResponse);
        }
        debug!(session_id, chars = content.len(), "generation complete");
        Ok(Generation::Finished(content))
    }

    fn emit(&self, event: ChatEvent) {
        // No receiver just means nobody is rendering
        let _ = self.events.send(event);
    }

    fn persist(&self, session_id: &str) {
        let snapshot = self.state.lock().session(session_id).cloned();
        if let Some(session) = snapshot {
            if let Err(err) = self.store.put(&session) {
                warn!(session_id, error = %err, "failed to persist session");
            }
        }
    }

    fn persist_current(&self, session_id: Option<&str>) {
        if let Err(err) = self.store.set_current(session_id) {
            warn!(error = %err, "failed to persist current session");
        }
    }
}
