//! Types exchanged with the host

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable identity the host uses to register and display a predictor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictorIdentity {
    /// Unique id of the predictor
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Display description
    pub description: String,
}

impl PredictorIdentity {
    /// Create an identity, generating a random id when none is given.
    pub fn new(name: impl Into<String>, description: impl Into<String>, id: Option<Uuid>) -> Self {
        Self {
            id: id.unwrap_or_else(Uuid::new_v4),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Kind of host asking for suggestions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    /// An interactive terminal line editor
    #[default]
    Terminal,
    /// An editor integration
    Editor,
}

/// Metadata about the host client issuing the query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionClient {
    /// Client name
    pub name: String,
    /// Client kind
    pub kind: ClientKind,
}

impl PredictionClient {
    /// Create a client description.
    pub fn new(name: impl Into<String>, kind: ClientKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// The input line being completed and its surroundings
///
/// Opaque to the predictor itself: it is handed to the script as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionContext {
    /// Raw text of the current input line
    pub input: String,
    /// Cursor offset in bytes within `input`
    pub cursor: usize,
    /// Previously accepted command lines, oldest first
    #[serde(default)]
    pub history: Vec<String>,
}

impl PredictionContext {
    /// Context for `input` with the cursor at the end of the line.
    pub fn new(input: impl Into<String>) -> Self {
        let input = input.into();
        Self {
            cursor: input.len(),
            input,
            history: Vec::new(),
        }
    }

    /// Set the cursor position.
    pub fn with_cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor;
        self
    }

    /// Set the command history.
    pub fn with_history(mut self, history: Vec<String>) -> Self {
        self.history = history;
        self
    }
}

/// One suggestion shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Full suggested command line
    pub text: String,
    /// Optional tooltip shown next to the suggestion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

impl Suggestion {
    /// Suggestion without a tooltip.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tooltip: None,
        }
    }

    /// Suggestion with a tooltip.
    pub fn with_tooltip(text: impl Into<String>, tooltip: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tooltip: Some(tooltip.into()),
        }
    }
}

/// Ordered suggestions for a single query; order is display order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionPackage {
    /// Suggestions in display order
    pub suggestions: Vec<Suggestion>,
}

impl SuggestionPackage {
    /// Package with the given suggestions.
    pub fn new(suggestions: Vec<Suggestion>) -> Self {
        Self { suggestions }
    }

    /// Package with no suggestions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the package holds no suggestions.
    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }

    /// Number of suggestions.
    pub fn len(&self) -> usize {
        self.suggestions.len()
    }
}

/// Kinds of feedback a host may offer to send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    /// A command line was accepted by the user
    CommandLineAccepted,
    /// A command line finished executing
    CommandLineExecuted,
    /// A suggestion was accepted
    SuggestionAccepted,
    /// Suggestions were displayed
    SuggestionDisplayed,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_generates_id() {
        let a = PredictorIdentity::new("a", "first", None);
        let b = PredictorIdentity::new("b", "second", None);
        assert_ne!(a.id, b.id);

        let id = Uuid::new_v4();
        let c = PredictorIdentity::new("c", "third", Some(id));
        assert_eq!(c.id, id);
    }

    #[test]
    fn test_context_cursor_defaults_to_end() {
        let context = PredictionContext::new("git ch");
        assert_eq!(context.cursor, 6);
        assert!(context.history.is_empty());
    }

    #[test]
    fn test_suggestion_without_tooltip_omits_field() {
        let json = serde_json::to_string(&Suggestion::new("ls -la")).unwrap();
        assert_eq!(json, r#"{"text":"ls -la"}"#);
    }
}
