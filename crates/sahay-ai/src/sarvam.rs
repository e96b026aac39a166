//! Translation and speech-to-text collaborators (Sarvam REST API).

use anyhow::Result;
use async_trait::async_trait;
use reqwest::multipart;

/// Maximum characters sent to the translate endpoint in one request.
const MAX_TRANSLATE_CHARS: usize = 4000;

/// Result of a translation call.
#[derive(Debug, Clone)]
pub struct Translation {
    pub text: String,
    /// Detected source language code, when the provider reports one.
    pub source_language: Option<String>,
}

impl Translation {
    /// Identity translation used when the provider is unavailable.
    pub fn unchanged(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_language: None,
        }
    }
}

/// Best-effort translation to English. Implementations must not fail: on any
/// provider error the input text is returned unchanged.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate a short text (a question) to English.
    async fn translate_to_english(&self, text: &str) -> Translation;

    /// Translate a full document to English, batching long inputs.
    async fn translate_document(&self, text: &str) -> Translation;
}

/// Audio transcription.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<String>;
}

/// Client for the Sarvam translation and speech-to-text endpoints.
pub struct SarvamClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl SarvamClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Construct from the `SARVAM_API_KEY` env var.
    pub fn from_env(base_url: String) -> Option<Self> {
        std::env::var("SARVAM_API_KEY")
            .ok()
            .map(|key| Self::new(base_url, key))
    }

    async fn translate_once(&self, text: &str) -> Result<Translation> {
        let body = serde_json::json!({
            "source_language": "auto",
            "target_language": "en",
            "text": text,
        });

        let resp = self
            .client
            .post(format!("{}/translate", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let json: serde_json::Value = resp.json().await?;

        if !status.is_success() {
            let msg = json
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("Unknown error");
            return Err(anyhow::anyhow!("Translate error: {msg}"));
        }

        let translated = json
            .get("translated_text")
            .and_then(|t| t.as_str())
            .ok_or_else(|| anyhow::anyhow!("Translate response missing translated_text"))?;
        let source_language = json
            .get("source_language_code")
            .and_then(|l| l.as_str())
            .map(str::to_string);

        Ok(Translation {
            text: translated.to_string(),
            source_language,
        })
    }
}

#[async_trait]
impl Translator for SarvamClient {
    async fn translate_to_english(&self, text: &str) -> Translation {
        match self.translate_once(text).await {
            Ok(translation) => translation,
            Err(e) => {
                tracing::warn!("Translation failed, using original text: {e}");
                Translation::unchanged(text)
            }
        }
    }

    async fn translate_document(&self, text: &str) -> Translation {
        let mut parts = Vec::new();
        let mut source_language = None;

        for batch in split_batches(text, MAX_TRANSLATE_CHARS) {
            let translation = self.translate_to_english(&batch).await;
            if source_language.is_none() {
                source_language = translation.source_language;
            }
            parts.push(translation.text);
        }

        Translation {
            text: parts.join("\n"),
            source_language,
        }
    }
}

#[async_trait]
impl SpeechToText for SarvamClient {
    async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<String> {
        let part = multipart::Part::bytes(audio)
            .file_name(format!("audio.{}", audio_extension(mime_type)))
            .mime_str(mime_type)?;
        let form = multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(format!("{}/speech-to-text", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        let json: serde_json::Value = resp.json().await?;

        if !status.is_success() {
            let msg = json
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("Unknown error");
            return Err(anyhow::anyhow!("Speech-to-text error: {msg}"));
        }

        json.get("transcript")
            .or_else(|| json.get("text"))
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Speech-to-text response missing transcript"))
    }
}

/// Split text into batches of at most `max_chars` characters, on character
/// boundaries.
fn split_batches(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|window| window.iter().collect())
        .collect()
}

fn audio_extension(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" => "m4a",
        "audio/webm" => "webm",
        "audio/flac" => "flac",
        _ => "ogg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_batches_short_text() {
        let batches = split_batches("hello", 4000);
        assert_eq!(batches, vec!["hello".to_string()]);
    }

    #[test]
    fn test_split_batches_exact_boundaries() {
        let text = "ab".repeat(4000); // 8000 chars
        let batches = split_batches(&text, 4000);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].chars().count(), 4000);
        assert_eq!(batches.concat(), text);
    }

    #[test]
    fn test_split_batches_multibyte() {
        let text = "नमस्ते".repeat(1000); // 6000 chars, multibyte
        let batches = split_batches(&text, 4000);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches.concat(), text);
    }

    #[test]
    fn test_split_batches_empty() {
        assert!(split_batches("", 4000).is_empty());
    }

    #[test]
    fn test_audio_extension_fallback() {
        assert_eq!(audio_extension("audio/wav"), "wav");
        assert_eq!(audio_extension("application/octet-stream"), "ogg");
    }
}
