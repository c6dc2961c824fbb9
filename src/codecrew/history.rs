//! Append-only conversation record shared by every participant in a group
//! chat.
//!
//! The history is the single source of truth for "what has been said": user
//! input, participant turns, everything, in one total order. Adapters read
//! it to build provider requests, selectors and evaluators read it to make
//! decisions, and only the owning `GroupChat` ever appends to it.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::client_wrapper::Role;

/// A single entry in the shared conversation history.
#[derive(Clone, Debug)]
pub struct ChatMessage {
    /// When the message was recorded.
    pub timestamp: DateTime<Utc>,
    /// Role the message plays in the conversation.
    pub role: Role,
    /// Name of the participant that authored the message; `None` for
    /// external user input.
    pub author: Option<String>,
    /// Message content, shared cheaply between history and callers.
    pub content: Arc<str>,
    /// Position in the history, assigned on append.
    pub ordinal: usize,
}

impl ChatMessage {
    /// External user input; carries no author name.
    pub fn user(content: &str) -> Self {
        ChatMessage {
            timestamp: Utc::now(),
            role: Role::User,
            author: None,
            content: Arc::from(content),
            ordinal: 0,
        }
    }

    /// A turn produced by a named participant.
    pub fn from_participant(name: &str, content: &str) -> Self {
        ChatMessage {
            timestamp: Utc::now(),
            role: Role::Assistant,
            author: Some(name.to_string()),
            content: Arc::from(content),
            ordinal: 0,
        }
    }
}

/// Ordered, append-only record of a conversation.
///
/// Messages are never edited or removed individually; the only way to shrink
/// the history is [`ChatHistory::clear`], which wipes it entirely (a chat
/// reset).
#[derive(Default)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn new() -> Self {
        ChatHistory::default()
    }

    /// Append a message, stamping its ordinal with its final position.
    pub fn push(&mut self, mut message: ChatMessage) {
        message.ordinal = self.messages.len();
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Author of the most recent message, if it was a participant turn.
    /// Returns `None` right after user input, which is what lets selectors
    /// treat "fresh input" and "empty history" the same way.
    pub fn last_author(&self) -> Option<&str> {
        self.messages
            .last()
            .and_then(|m| m.author.as_deref())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every message. Used by chat reset.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Plain-text rendering of the conversation, one line per message, used
    /// as judge-prompt context by model-based selectors and evaluators.
    pub fn transcript(&self) -> String {
        let mut lines = Vec::with_capacity(self.messages.len());
        for message in &self.messages {
            let speaker = message.author.as_deref().unwrap_or("user");
            lines.push(format!("{}: {}", speaker, message.content));
        }
        lines.join("\n")
    }
}
