mod common;

use std::sync::Arc;

use common::{sse, Script, ScriptedTransport};
use quickinterview_core::{
    ChatController, ChatError, ChatEvent, ChatRole, Dispatcher, MemorySessionStore,
    ProviderConfig, SessionStore, SubmitOutcome,
};
use tokio::sync::mpsc::UnboundedReceiver;

const CLOSURE_ANSWER: &[&str] = &[
    r#"data: {"choices":[{"delta":{"content":"A "}}]}"#,
    r#"data: {"choices":[{"delta":{"content":"closure."}}]}"#,
    "data: [DONE]",
];

struct Harness {
    transport: Arc<ScriptedTransport>,
    store: Arc<MemorySessionStore>,
    controller: ChatController,
    events: UnboundedReceiver<ChatEvent>,
}

fn harness() -> Harness {
    let transport = Arc::new(ScriptedTransport::new());
    let store = Arc::new(MemorySessionStore::new());
    let (controller, events) =
        ChatController::new(Dispatcher::new(transport.clone()), store.clone()).unwrap();
    Harness {
        transport,
        store,
        controller: controller.with_system_prompt("You are a coach."),
        events,
    }
}

fn openai() -> ProviderConfig {
    ProviderConfig::new("openai", "sk-test")
}

fn drain(events: &mut UnboundedReceiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn test_submit_streams_into_assistant_message() {
    let mut h = harness();
    h.transport.push(Script::lines(CLOSURE_ANSWER));

    let outcome = h.controller.submit("What is a closure?", &openai()).await.unwrap();
    let SubmitOutcome::Completed(message) = outcome else {
        panic!("expected completion");
    };
    assert_eq!(message.role, ChatRole::Assistant);
    assert_eq!(message.content, "A closure.");

    let session = h.controller.current_session().unwrap();
    assert_eq!(session.title, "What is a closure?");
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].role, ChatRole::User);
    assert_eq!(session.messages[1].content, "A closure.");
    assert!(!h.controller.is_generating());

    // system prompt first, then the user turn; the placeholder is not sent
    let requests = h.transport.requests();
    let body = &requests[0].body;
    let sent = body["messages"].as_array().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["role"], "system");
    assert_eq!(sent[0]["content"], "You are a coach.");
    assert_eq!(sent[1]["content"], "What is a closure?");

    let deltas: Vec<String> = drain(&mut h.events)
        .into_iter()
        .filter_map(|event| match event {
            ChatEvent::Delta { content, .. } => Some(content),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, vec!["A ", "A closure."]);

    let stored = h.store.get(&session.id).unwrap().unwrap();
    assert_eq!(stored.messages[1].content, "A closure.");
    assert_eq!(h.store.current().unwrap(), Some(session.id));
}

#[tokio::test]
async fn test_blank_input_is_ignored() {
    let mut h = harness();

    let outcome = h.controller.submit("   \n\t", &openai()).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Ignored);
    assert!(h.controller.sessions().is_empty());
    assert_eq!(h.transport.calls(), 0);
    assert!(drain(&mut h.events).is_empty());
}

#[tokio::test]
async fn test_missing_credential_fails_fast() {
    let h = harness();

    let err = h
        .controller
        .submit("What is a closure?", &ProviderConfig::new("openai", "  "))
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::MissingCredential));
    assert!(err.is_configuration());
    assert!(h.controller.sessions().is_empty());
    assert_eq!(h.transport.calls(), 0);
    assert!(!h.controller.is_generating());
}

#[tokio::test]
async fn test_empty_stream_is_a_failure() {
    let mut h = harness();
    h.transport.push(Script::lines(&["data: [DONE]"]));

    let err = h.controller.submit("Hello?", &openai()).await.unwrap_err();
    assert!(matches!(err, ChatError::EmptyResponse));

    let session = h.controller.current_session().unwrap();
    assert_eq!(
        session.messages[1].content,
        "Error: No response received from AI"
    );

    let events = drain(&mut h.events);
    assert!(matches!(
        events.last(),
        Some(ChatEvent::Failed { error, .. }) if error == "No response received from AI"
    ));
}

#[tokio::test]
async fn test_api_error_replaces_placeholder() {
    let h = harness();
    h.transport.push(Script::status(
        401,
        r#"{"error":{"message":"Incorrect API key provided"}}"#,
    ));

    let err = h.controller.submit("Hi", &openai()).await.unwrap_err();
    assert_eq!(err.to_string(), "Incorrect API key provided");

    let session = h.controller.current_session().unwrap();
    assert_eq!(session.messages[1].content, "Error: Incorrect API key provided");
    assert!(!h.controller.is_generating());
}

#[tokio::test]
async fn test_mid_stream_failure_overwrites_partial_text() {
    let mut h = harness();
    h.transport.push(Script::Broken(vec![sse(&[
        r#"data: {"choices":[{"delta":{"content":"Partial"}}]}"#,
    ])]));

    let err = h.controller.submit("Hi", &openai()).await.unwrap_err();
    assert!(matches!(err, ChatError::Network(_)));

    let session = h.controller.current_session().unwrap();
    assert_eq!(
        session.messages[1].content,
        "Error: Network error: connection reset"
    );
    let saw_partial = drain(&mut h.events).iter().any(|event| {
        matches!(event, ChatEvent::Delta { content, .. } if content == "Partial")
    });
    assert!(saw_partial);
}

#[tokio::test]
async fn test_connection_failure_surfaces() {
    let h = harness();
    h.transport.push(Script::Fail("connection refused".to_string()));

    let err = h.controller.submit("Hi", &openai()).await.unwrap_err();
    assert_eq!(err.to_string(), "Network error: connection refused");
    assert!(!h.controller.is_generating());
}

#[tokio::test]
async fn test_second_submit_while_in_flight_is_ignored() {
    let mut h = harness();
    let (tx, script) = Script::live();
    h.transport.push(script);
    let controller = &h.controller;
    let events = &mut h.events;

    let config = openai();
    let first = controller.submit("What is a closure?", &config);
    let second = async {
        // first has set the in-flight marker and is waiting on the body
        assert!(controller.is_generating());
        tx.send(sse(&CLOSURE_ANSWER[..1])).unwrap();
        loop {
            if let Some(ChatEvent::Delta { .. }) = events.recv().await {
                break;
            }
        }

        let outcome = controller.submit("Another question", &openai()).await;

        tx.send(sse(&CLOSURE_ANSWER[1..])).unwrap();
        drop(tx);
        outcome
    };

    let (first, second) = tokio::join!(first, second);
    assert_eq!(second.unwrap(), SubmitOutcome::Ignored);
    assert!(matches!(first.unwrap(), SubmitOutcome::Completed(ref m) if m.content == "A closure."));
    assert_eq!(h.transport.calls(), 1);

    let session = h.controller.current_session().unwrap();
    assert_eq!(session.messages.len(), 2);
}

#[tokio::test]
async fn test_cancel_stops_mutation() {
    let mut h = harness();
    let (tx, script) = Script::live();
    h.transport.push(script);
    let controller = &h.controller;
    let events = &mut h.events;

    let config = openai();
    let first = controller.submit("What is a closure?", &config);
    let canceller = async {
        tx.send(sse(&CLOSURE_ANSWER[..1])).unwrap();
        loop {
            if let Some(ChatEvent::Delta { .. }) = events.recv().await {
                break;
            }
        }
        assert!(controller.cancel_generation());
        tx.send(sse(&CLOSURE_ANSWER[1..])).unwrap();
        drop(tx);
    };

    let (outcome, ()) = tokio::join!(first, canceller);
    let SubmitOutcome::Cancelled(message) = outcome.unwrap() else {
        panic!("expected cancellation");
    };
    assert_eq!(message.content, "A ");

    let session = h.controller.current_session().unwrap();
    assert_eq!(session.messages[1].content, "A ");
    assert!(!h.controller.is_generating());
    assert!(!h.controller.cancel_generation());
}

#[tokio::test]
async fn test_new_session_detaches_running_generation() {
    let mut h = harness();
    let (tx, script) = Script::live();
    h.transport.push(script);
    let controller = &h.controller;
    let events = &mut h.events;

    let config = openai();
    let first = controller.submit("Explain promises", &config);
    let switcher = async {
        tx.send(sse(&CLOSURE_ANSWER[..1])).unwrap();
        loop {
            if let Some(ChatEvent::Delta { .. }) = events.recv().await {
                break;
            }
        }
        controller.new_session();
        drop(tx);
    };

    let (outcome, ()) = tokio::join!(first, switcher);
    assert!(matches!(outcome.unwrap(), SubmitOutcome::Cancelled(_)));
    assert!(h.controller.current_session_id().is_none());

    let sessions = h.controller.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].messages[1].content, "A ");
}

#[tokio::test]
async fn test_submit_right_after_new_session_starts_a_generation() {
    let mut h = harness();
    let (body, script) = Script::live();
    h.transport.push(script);
    h.transport.push(Script::lines(CLOSURE_ANSWER));
    let controller = &h.controller;
    let events = &mut h.events;

    let config = openai();
    let first = controller.submit("Explain promises", &config);
    let second = async {
        body.send(sse(&CLOSURE_ANSWER[..1])).unwrap();
        loop {
            if let Some(ChatEvent::Delta { .. }) = events.recv().await {
                break;
            }
        }
        // the first body stays open and idle from here on
        controller.new_session();
        assert!(!controller.is_generating());
        controller.submit("What is a closure?", &config).await
    };

    let (first, second) = tokio::join!(first, second);
    let SubmitOutcome::Cancelled(cancelled) = first.unwrap() else {
        panic!("expected cancellation");
    };
    assert_eq!(cancelled.content, "A ");
    assert!(matches!(second.unwrap(), SubmitOutcome::Completed(ref m) if m.content == "A closure."));
    assert_eq!(h.transport.calls(), 2);
    assert_eq!(h.controller.sessions().len(), 2);
    assert!(!h.controller.is_generating());
    drop(body);
}

#[tokio::test]
async fn test_cancel_before_first_delta_drops_placeholder() {
    let h = harness();
    let (_body, script) = Script::live();
    h.transport.push(script);
    h.transport.push(Script::lines(&[
        r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Sure."}}"#,
    ]));
    let controller = &h.controller;

    let config = ProviderConfig::new("claude", "sk-ant");
    let first = controller.submit("Explain promises", &config);
    let canceller = async {
        assert!(controller.is_generating());
        assert!(controller.cancel_generation());
    };

    let (outcome, ()) = tokio::join!(first, canceller);
    let SubmitOutcome::Cancelled(message) = outcome.unwrap() else {
        panic!("expected cancellation");
    };
    assert!(message.content.is_empty());

    let session = h.controller.current_session().unwrap();
    assert_eq!(session.messages.len(), 1);
    assert_eq!(session.messages[0].role, ChatRole::User);
    let stored = h.store.get(&session.id).unwrap().unwrap();
    assert_eq!(stored.messages.len(), 1);

    h.controller.submit("Give an example", &config).await.unwrap();
    let requests = h.transport.requests();
    let sent = requests[1].body["messages"].as_array().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["content"], "Explain promises");
    assert_eq!(sent[1]["content"], "Give an example");
}

#[tokio::test]
async fn test_failure_after_cancel_reports_cancelled() {
    let mut h = harness();
    let (body, script) = Script::live();
    h.transport.push(script);
    let controller = &h.controller;
    let events = &mut h.events;

    let config = openai();
    let first = controller.submit("What is a closure?", &config);
    let canceller = async {
        body.send(sse(&CLOSURE_ANSWER[..1])).unwrap();
        loop {
            if let Some(ChatEvent::Delta { .. }) = events.recv().await {
                break;
            }
        }
        assert!(controller.cancel_generation());
        body.fail("connection reset");
    };

    let (outcome, ()) = tokio::join!(first, canceller);
    let SubmitOutcome::Cancelled(message) = outcome.unwrap() else {
        panic!("expected cancellation");
    };
    assert_eq!(message.content, "A ");

    let session = h.controller.current_session().unwrap();
    assert_eq!(session.messages[1].content, "A ");
    let events = drain(&mut h.events);
    assert!(!events.iter().any(|e| matches!(e, ChatEvent::Failed { .. })));
    assert!(matches!(events.last(), Some(ChatEvent::Cancelled { .. })));
}

#[tokio::test]
async fn test_follow_up_reuses_session_history() {
    let h = harness();
    h.transport.push(Script::lines(CLOSURE_ANSWER));
    h.transport.push(Script::lines(&[
        r#"data: {"choices":[{"delta":{"content":"Sure."}}]}"#,
    ]));

    h.controller.submit("What is a closure?", &openai()).await.unwrap();
    h.controller.submit("Give an example", &openai()).await.unwrap();

    assert_eq!(h.controller.sessions().len(), 1);
    let sent = h.transport.requests()[1].body["messages"].clone();
    let sent = sent.as_array().unwrap();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[2]["role"], "assistant");
    assert_eq!(sent[2]["content"], "A closure.");
    assert_eq!(sent[3]["content"], "Give an example");

    h.controller.new_session();
    h.transport.push(Script::lines(CLOSURE_ANSWER));
    h.controller.submit("Fresh start", &openai()).await.unwrap();
    assert_eq!(h.controller.sessions().len(), 2);
}

#[tokio::test]
async fn test_session_management() {
    let h = harness();
    h.transport.push(Script::lines(CLOSURE_ANSWER));
    h.controller.submit("What is a closure?", &openai()).await.unwrap();

    let session = h.controller.current_session().unwrap();
    let user_id = session.messages[0].id.clone();
    assert!(h.controller.delete_message(&user_id));
    assert!(!h.controller.delete_message(&user_id));
    assert_eq!(h.store.get(&session.id).unwrap().unwrap().messages.len(), 1);

    h.controller.new_session();
    assert!(h.controller.select_session(&session.id));
    assert!(!h.controller.select_session("missing"));

    assert!(h.controller.delete_session(&session.id));
    assert!(h.controller.sessions().is_empty());
    assert!(h.controller.current_session_id().is_none());
    assert!(h.store.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_sessions_reload_from_store() {
    let h = harness();
    h.transport.push(Script::lines(CLOSURE_ANSWER));
    h.controller.submit("What is a closure?", &openai()).await.unwrap();

    let (reloaded, _events) =
        ChatController::new(Dispatcher::new(h.transport.clone()), h.store.clone()).unwrap();
    let session = reloaded.current_session().unwrap();
    assert_eq!(session.messages[1].content, "A closure.");
}
