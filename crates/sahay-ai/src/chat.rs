//! Chat model collaborator: generation, summarization, fact extraction.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use sahay_types::{Message, render_transcript};

/// The three chat-model operations the conversation pipeline depends on.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate an answer to `question` grounded in the assembled `context`
    /// (user memory, conversation summary, recent history, document passages).
    async fn generate_answer(&self, context: &str, question: &str) -> Result<String>;

    /// Fold `old_messages` (chronological order) into `summary`, returning a
    /// new summary that supersedes the old one.
    async fn summarize(&self, summary: &str, old_messages: &[Message]) -> Result<String>;

    /// Extract durable user facts from a message. Never fails: malformed
    /// model output degrades to an empty map.
    async fn extract_facts(&self, message: &str) -> HashMap<String, String>;
}

/// Gemini `generateContent` client.
pub struct GeminiChat {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiChat {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    /// Construct from the `GEMINI_API_KEY` env var.
    pub fn from_env(model: String) -> Option<Self> {
        std::env::var("GEMINI_API_KEY")
            .ok()
            .map(|key| Self::new(key, model))
    }

    async fn generate(
        &self,
        prompt: &str,
        generation_config: Option<serde_json::Value>,
    ) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );

        let mut body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        if let Some(config) = generation_config {
            body["generationConfig"] = config;
        }

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let json: serde_json::Value = resp.json().await?;

        if !status.is_success() {
            let msg = json
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error");
            return Err(anyhow::anyhow!("Chat model error: {msg}"));
        }

        json.get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Chat model returned no text"))
    }
}

#[async_trait]
impl ChatModel for GeminiChat {
    async fn generate_answer(&self, context: &str, question: &str) -> Result<String> {
        let prompt = format!(
            "You are an intelligent and personalized AI assistant.\n\
             \n\
             Guidelines:\n\
             - Use structured user memory if relevant.\n\
             - Use document context strictly when answering document-related questions.\n\
             - If no document context is available, rely on conversation and memory.\n\
             - Answer completely and clearly.\n\
             - Never cut responses midway.\n\
             \n\
             {context}\n\
             \n\
             Question:\n\
             {question}\n"
        );

        self.generate(
            &prompt,
            Some(serde_json::json!({
                "temperature": 0.2,
                "topP": 0.9,
                "maxOutputTokens": 8000,
            })),
        )
        .await
    }

    async fn summarize(&self, summary: &str, old_messages: &[Message]) -> Result<String> {
        let prompt = format!(
            "You are a conversation summarizer.\n\
             \n\
             Previous summary:\n\
             {summary}\n\
             \n\
             New conversation:\n\
             {}\n\
             \n\
             Create an updated concise summary preserving important context.\n",
            render_transcript(old_messages)
        );

        self.generate(&prompt, None).await
    }

    async fn extract_facts(&self, message: &str) -> HashMap<String, String> {
        let prompt = format!(
            "You are a memory extraction engine.\n\
             \n\
             Extract permanent user facts from the message.\n\
             \n\
             Rules:\n\
             - Only extract factual, long-term information.\n\
             - Ignore temporary statements.\n\
             - Return ONLY valid JSON.\n\
             - If nothing important, return empty JSON {{}}.\n\
             \n\
             Possible fields:\n\
             - name\n\
             - preferred_language\n\
             - profession\n\
             - interests\n\
             - goals\n\
             - location\n\
             \n\
             Message:\n\
             {message}\n"
        );

        match self.generate(&prompt, None).await {
            Ok(text) => facts_from_json(&text),
            Err(e) => {
                tracing::warn!("Fact extraction failed: {e}");
                HashMap::new()
            }
        }
    }
}

/// Parse the extraction model's output into fact key-values. Tolerates
/// markdown code fences; anything unparseable degrades to an empty map.
/// Non-string values (lists of interests, etc.) are flattened to strings.
pub fn facts_from_json(text: &str) -> HashMap<String, String> {
    let cleaned = strip_code_fences(text.trim());

    let parsed: serde_json::Value = match serde_json::from_str(cleaned) {
        Ok(v) => v,
        Err(_) => return HashMap::new(),
    };

    let Some(object) = parsed.as_object() else {
        return HashMap::new();
    };

    let mut facts = HashMap::new();
    for (key, value) in object {
        let rendered = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_string(),
        };
        if !rendered.is_empty() {
            facts.insert(key.clone(), rendered);
        }
    }
    facts
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the fence line
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
