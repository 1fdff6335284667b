//! Session state and partial updates.

use super::{Message, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Placeholder returned for fields a stage reads but nobody has written.
pub const NOT_AVAILABLE: &str = "not available";

/// Names of the recognized session fields.
pub mod fields {
    /// The original source text. Written once by the seed.
    pub const CODE: &str = "code";
    /// Output of the dependency stage.
    pub const DEPENDENCY_ANALYSIS: &str = "dependency_analysis";
    /// Output of the context stage.
    pub const CONTEXT_ANALYSIS: &str = "context_analysis";
    /// Reserved for branching. Never written.
    pub const NEXT: &str = "next";
}

/// The state threaded through one workflow run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    fields: BTreeMap<String, Value>,
    #[serde(default)]
    messages: Vec<Message>,
}

impl SessionState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the initial state for a run: `code` is set and the source is
    /// recorded as the first user message.
    #[must_use]
    pub fn seed(code: impl Into<String>) -> Self {
        let code = code.into();
        let mut state = Self::new();
        state
            .fields
            .insert(fields::CODE.to_string(), Value::String(code.clone()));
        state.messages.push(Message::user(code));
        state
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns a field value when it is a string.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Returns a string field, or [`NOT_AVAILABLE`] if it is missing.
    #[must_use]
    pub fn get_or_default(&self, field: &str) -> &str {
        self.get_str(field).unwrap_or(NOT_AVAILABLE)
    }

    /// Returns true if the field is present.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns the names of all present fields, sorted.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Returns the message history.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Appends a message to the history.
    pub fn append_message(&mut self, role: Role, text: impl Into<String>) {
        self.messages.push(Message::new(role, text));
    }

    /// Returns the most recent message.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Returns the last message appended after the seed message.
    ///
    /// The seed message is the caller's input, not a result, so a state
    /// holding only the seed has no terminal message.
    #[must_use]
    pub fn terminal_message(&self) -> Option<&Message> {
        self.messages
            .split_first()
            .and_then(|(_, rest)| rest.last())
    }

    /// Merges an update into this state and returns the result.
    ///
    /// Fields are last-write-wins; messages are appended in order. Nothing is
    /// removed.
    #[must_use]
    pub fn merge(mut self, update: StateUpdate) -> Self {
        self.fields.extend(update.fields);
        self.messages.extend(update.messages);
        self
    }
}

/// A partial update produced by a stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    #[serde(default)]
    fields: BTreeMap<String, Value>,
    #[serde(default)]
    messages: Vec<Message>,
}

impl StateUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Appends a message.
    #[must_use]
    pub fn append(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Returns a field value set by this update.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns the messages appended by this update.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns true if the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.messages.is_empty()
    }
}
