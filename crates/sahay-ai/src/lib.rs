//! sahay-ai: External AI collaborators behind trait boundaries.
//!
//! Provides:
//! - `ChatModel`: answer generation, conversation summarization, and
//!   structured fact extraction (Gemini REST implementation)
//! - `Translator`: best-effort translation to English with batched document
//!   support (Sarvam REST implementation)
//! - `SpeechToText`: audio transcription (Sarvam REST implementation)
//!
//! Failure policy: translation falls back to the input text and fact
//! extraction falls back to an empty map; neither ever surfaces an error to
//! the caller. Generation and transcription return errors, since there is no
//! useful fallback value for them.

pub mod chat;
pub mod sarvam;

pub use chat::{ChatModel, GeminiChat};
pub use sarvam::{SarvamClient, SpeechToText, Translation, Translator};
