use serde::{Deserialize, Serialize};

// ──────────────────── Conversation Types ────────────────────

/// Who produced a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Uppercase label used when formatting history into prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }
}

/// A single turn in a conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Format messages as `ROLE: content` lines for prompt assembly.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|msg| format!("{}: {}", msg.role.label(), msg.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Persisted state of one conversation thread: the running summary plus the
/// unsummarized tail of recent messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadState {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

// ──────────────────── Memory Types ────────────────────

/// A durable key-value fact about a user, shared across that user's threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryFact {
    pub user_id: String,
    pub key: String,
    pub value: String,
}

/// Fact keys the extraction prompt asks for. Extraction may return other keys;
/// they are stored as-is rather than rejected.
pub const KNOWN_FACT_KEYS: &[&str] = &[
    "name",
    "preferred_language",
    "profession",
    "interests",
    "goals",
    "location",
];

// ──────────────────── Document Types ────────────────────

/// Registry entry for an uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub doc_id: String,
    pub user_id: String,
    pub thread_id: String,
    pub filename: String,
    pub chunk_count: usize,
    /// Unix millis.
    pub created_at: i64,
}
