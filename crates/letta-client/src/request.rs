//! Outbound request assembly.

use letta_protocol::{Message, Role};
use serde::Serialize;

/// Fallback sent when nothing usable is left after normalization.
pub const DEFAULT_MESSAGE: &str = "Hello";

/// What the caller wants to say, plus optional context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub system_prompt: Option<String>,
    pub history: Vec<Message>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            system_prompt: None,
            history: Vec::new(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// System prompt, history, then the new message, in that order.
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);

        if let Some(system_prompt) = self.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            messages.push(Message::system(system_prompt));
        }

        messages.extend(self.history.iter().cloned());

        // Empty message falls through to the history or the default.
        if !self.message.is_empty() {
            messages.push(Message::user(self.message.clone()));
        }

        messages
    }
}

/// JSON body posted to the stream endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StreamPayload {
    pub messages: Vec<Message>,
    pub stream_steps: bool,
    pub stream_tokens: bool,
}

/// Normalize roles for the agent.
///
/// Only `user`, `system` and `assistant` survive; everything that is not
/// `system` is sent as `user`. Never returns an empty list.
pub fn normalize_messages(messages: &[Message]) -> Vec<Message> {
    let mut normalized: Vec<Message> = messages
        .iter()
        .filter(|msg| msg.role.is_known())
        .map(|msg| {
            let role = match msg.role {
                Role::System => Role::System,
                _ => Role::User,
            };
            Message::new(role, msg.content.clone())
        })
        .collect();

    if normalized.is_empty() {
        normalized.push(Message::user(DEFAULT_MESSAGE));
    }

    normalized
}

/// Build the wire payload.
///
/// The agent keeps conversation state server-side, so only the most recent
/// normalized message is sent.
pub fn build_payload(messages: &[Message]) -> StreamPayload {
    let normalized = normalize_messages(messages);
    let last = normalized
        .into_iter()
        .last()
        .unwrap_or_else(|| Message::user(DEFAULT_MESSAGE));

    StreamPayload {
        messages: vec![last],
        stream_steps: true,
        stream_tokens: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_order() {
        let request = ChatRequest::new("C")
            .with_system_prompt("be brief")
            .with_history(vec![Message::user("A"), Message::assistant("B")]);

        let messages = request.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], Message::system("be brief"));
        assert_eq!(messages[1], Message::user("A"));
        assert_eq!(messages[2], Message::assistant("B"));
        assert_eq!(messages[3], Message::user("C"));
    }

    #[test]
    fn empty_system_prompt_is_skipped() {
        let request = ChatRequest::new("hi").with_system_prompt("");
        assert_eq!(request.messages(), vec![Message::user("hi")]);
    }

    #[test]
    fn normalize_rewrites_assistant_to_user() {
        let normalized = normalize_messages(&[
            Message::system("rules"),
            Message::assistant("earlier reply"),
            Message::user("question"),
        ]);
        assert_eq!(
            normalized,
            vec![
                Message::system("rules"),
                Message::user("earlier reply"),
                Message::user("question"),
            ]
        );
    }

    #[test]
    fn normalize_drops_unknown_roles() {
        let normalized = normalize_messages(&[
            Message::user("keep"),
            Message::new("tool", "drop me"),
            Message::new("function", "drop me too"),
        ]);
        assert_eq!(normalized, vec![Message::user("keep")]);
    }

    #[test]
    fn normalize_falls_back_to_hello() {
        assert_eq!(normalize_messages(&[]), vec![Message::user("Hello")]);
        assert_eq!(
            normalize_messages(&[Message::new("tool", "x")]),
            vec![Message::user("Hello")]
        );
    }

    #[test]
    fn empty_call_sends_default_message() {
        let payload = build_payload(&ChatRequest::new("").messages());
        assert_eq!(payload.messages, vec![Message::user("Hello")]);
    }

    #[test]
    fn payload_keeps_only_last_message() {
        let request = ChatRequest::new("C")
            .with_history(vec![Message::user("A"), Message::assistant("B")]);
        let payload = build_payload(&request.messages());

        assert_eq!(payload.messages, vec![Message::user("C")]);
    }

    #[test]
    fn empty_message_resends_last_history_entry_as_user() {
        let request = ChatRequest::new("")
            .with_history(vec![Message::user("A"), Message::assistant("B")]);
        let payload = build_payload(&request.messages());

        assert_eq!(payload.messages, vec![Message::user("B")]);
    }

    #[test]
    fn trailing_system_message_stays_system() {
        let payload = build_payload(&[Message::user("A"), Message::system("S")]);
        assert_eq!(payload.messages, vec![Message::system("S")]);
    }

    #[test]
    fn payload_json_shape() {
        let payload = build_payload(&ChatRequest::new("What is Rust?").messages());
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            json!({
                "messages": [{"role": "user", "content": "What is Rust?"}],
                "stream_steps": true,
                "stream_tokens": true
            })
        );
    }
}
