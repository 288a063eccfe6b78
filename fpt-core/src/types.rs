// Core type definitions for fpt

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Message format sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Message {
            role,
            content: content.into(),
        }
    }
}

/// Which side of the conversation a turn belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    /// User-authored, stored blockquoted
    Prompt,
    /// Model-authored, stored as-is
    Response,
}

/// Structural state of a transcript file, computed fresh on every read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No thread yet: a single freestanding prompt (or nothing at all)
    Plain,
    ValidEndsWithPrompt,
    ValidEndsWithResponse,
    /// Prompts and responses do not alternate
    InvalidOrdering,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Classification::Plain => "plain",
            Classification::ValidEndsWithPrompt => "valid_ends_with_prompt",
            Classification::ValidEndsWithResponse => "valid_ends_with_response",
            Classification::InvalidOrdering => "invalid_ordering",
        };
        f.write_str(name)
    }
}

/// Model selection flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelTier {
    #[default]
    Standard,
    Advanced,
}

/// Token counts reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct TokenUsage {
    #[serde(rename = "prompt_tokens")]
    pub prompt: u64,
    #[serde(rename = "completion_tokens")]
    pub completion: u64,
    #[serde(rename = "total_tokens")]
    pub total: u64,
}

/// A finished model call
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub usage: TokenUsage,
    pub elapsed: Duration,
}

impl Completion {
    /// Cost in cents, given a price in dollars per 1000 tokens
    pub fn cost_cents(&self, price_per_1k: f64) -> f64 {
        self.usage.total as f64 * price_per_1k / 10.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = Message::new(Role::Assistant, "hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_cost_cents() {
        let completion = Completion {
            text: String::new(),
            model: "gpt-4".to_string(),
            usage: TokenUsage {
                prompt: 600,
                completion: 400,
                total: 1000,
            },
            elapsed: Duration::from_secs(1),
        };
        // 1000 tokens at $0.03 per 1k is 3 cents
        assert!((completion.cost_cents(0.03) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_classification_display() {
        assert_eq!(
            Classification::ValidEndsWithPrompt.to_string(),
            "valid_ends_with_prompt"
        );
        assert_eq!(Classification::InvalidOrdering.to_string(), "invalid_ordering");
    }
}
