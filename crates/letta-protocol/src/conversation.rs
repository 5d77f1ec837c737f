//! Conversation types sent to the agent.

use serde::{Deserialize, Serialize};

/// Role in a conversation.
///
/// Serialized as a plain lowercase string. Roles the agent does not
/// understand are kept as [`Role::Other`] so that callers can pass raw
/// history through and let the request builder decide what to drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    System,
    Assistant,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::System => "system",
            Role::Assistant => "assistant",
            Role::Other(other) => other,
        }
    }

    /// True for the three roles the agent accepts.
    pub fn is_known(&self) -> bool {
        !matches!(self, Role::Other(_))
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => Role::User,
            "system" => Role::System,
            "assistant" => Role::Assistant,
            _ => Role::Other(value),
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::from(value.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<Role>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_helpers() {
        let user = Message::user("hello");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "hello");

        let system = Message::system("be brief");
        assert_eq!(system.role, Role::System);

        let assistant = Message::assistant("hi there");
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.content, "hi there");
    }

    #[test]
    fn role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn unknown_role_is_preserved() {
        let msg: Message = serde_json::from_str(r#"{"role":"tool","content":"x"}"#).unwrap();
        assert_eq!(msg.role, Role::Other("tool".to_string()));
        assert!(!msg.role.is_known());

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
    }

    #[test]
    fn missing_content_defaults_to_empty() {
        let msg: Message = serde_json::from_str(r#"{"role":"user"}"#).unwrap();
        assert_eq!(msg, Message::user(""));
    }

    #[test]
    fn role_from_str() {
        assert_eq!(Role::from("system"), Role::System);
        assert_eq!(Role::from("assistant"), Role::Assistant);
        assert_eq!(Role::from("function").as_str(), "function");
        assert!(Role::from("user").is_known());
    }
}
