//! Inbound request shape.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One message in a chat-style conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// `"system"`, `"user"`, or `"assistant"`.
    pub role: String,
    /// Message body.
    pub content: String,
}

/// A tagged value for the free-form metadata bag carried on a request.
///
/// Kept as a closed, typed variant rather than `serde_json::Value` so the
/// router boundary never has to guess at shape; the plugin-facing interface
/// (spec.md §9) converts to `serde_json::Value` only at that narrower seam.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    /// A string value.
    Text(String),
    /// A numeric value.
    Number(f64),
    /// A boolean flag.
    Flag(bool),
}

/// Input to the router. One call, one lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRequest {
    /// Opaque caller API key. Never logged or persisted in the clear; see
    /// [`crate::hash_api_key`].
    pub api_key: String,
    /// Requested model identifier. `"auto"` triggers routing; any concrete
    /// `"provider:model"` bypasses the tiers entirely (spec.md §4.11 step 1).
    pub model: String,
    /// Raw content, when the caller didn't send a chat-message list.
    pub content: Option<String>,
    /// Ordered chat messages, when the caller sent a conversation.
    pub messages: Option<Vec<ChatMessage>>,
    /// Free-form request metadata.
    #[serde(default)]
    pub metadata: HashMap<String, MetadataValue>,
}

impl RoutingRequest {
    /// Extracts the query string the classifier tiers will see: the raw
    /// `content` if present, otherwise the concatenation of the last `k`
    /// user-role messages (spec.md §4.11 step 2).
    pub fn extract_query(&self, last_k: usize) -> String {
        if let Some(content) = &self.content {
            return content.clone();
        }
        let Some(messages) = &self.messages else {
            return String::new();
        };
        messages
            .iter()
            .rev()
            .filter(|m| m.role == "user")
            .take(last_k)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// True when the request should bypass classification entirely.
    pub fn is_bypass(&self) -> bool {
        self.model != "auto"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn req(content: Option<&str>, messages: Option<Vec<ChatMessage>>) -> RoutingRequest {
        RoutingRequest {
            api_key: "k".into(),
            model: "auto".into(),
            content: content.map(String::from),
            messages,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn extract_query_prefers_content() {
        let r = req(Some("hello"), None);
        assert_eq!(r.extract_query(3), "hello");
    }

    #[test]
    fn extract_query_joins_last_k_user_messages_in_order() {
        let msgs = vec![
            ChatMessage { role: "user".into(), content: "one".into() },
            ChatMessage { role: "assistant".into(), content: "reply".into() },
            ChatMessage { role: "user".into(), content: "two".into() },
            ChatMessage { role: "user".into(), content: "three".into() },
        ];
        let r = req(None, Some(msgs));
        assert_eq!(r.extract_query(2), "two\nthree");
    }

    #[test]
    fn bypass_detection() {
        let mut r = req(Some("hi"), None);
        assert!(!r.is_bypass());
        r.model = "openai:gpt-4".into();
        assert!(r.is_bypass());
    }
}
