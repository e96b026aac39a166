//! Document ingestion: extract → translate → chunk → embed → store.

use std::sync::Arc;

use sahay_retrieval::chunking::chunk_text;
use sahay_retrieval::embeddings::EmbeddingProvider;
use sahay_retrieval::store::VectorStore;

use sahay_ai::Translator;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("No extractable text in document")]
    EmptyDocument,
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("Embedding failed: {0}")]
    Embedding(String),
    #[error(transparent)]
    Store(#[from] sahay_retrieval::store::RetrievalError),
}

/// Extracts plain text from an uploaded document.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, filename: &str, data: &[u8]) -> Result<String, IngestError>;
}

/// Extractor for UTF-8 text uploads (.txt, .md and friends). Binary formats
/// are rejected with an explicit unsupported-format error.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, filename: &str, data: &[u8]) -> Result<String, IngestError> {
        match std::str::from_utf8(data) {
            Ok(text) => Ok(text.to_string()),
            Err(_) => Err(IngestError::UnsupportedFormat(filename.to_string())),
        }
    }
}

/// Result of a completed ingestion.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestOutcome {
    pub doc_id: String,
    pub filename: String,
    pub detected_language: Option<String>,
    pub translated: bool,
    pub chunks_added: usize,
}

/// Whether the document can skip translation. Non-ASCII content goes through
/// the translator, which auto-detects the source language.
fn is_plain_english(text: &str) -> bool {
    text.is_ascii()
}

/// Run the full ingestion pipeline for one uploaded document.
pub async fn ingest_document(
    vectors: &VectorStore,
    translator: &Arc<dyn Translator>,
    embeddings: &Arc<dyn EmbeddingProvider>,
    extractor: &Arc<dyn TextExtractor>,
    user_id: &str,
    thread_id: &str,
    filename: &str,
    data: &[u8],
) -> Result<IngestOutcome, IngestError> {
    let raw_text = extractor.extract(filename, data)?;
    if raw_text.trim().is_empty() {
        return Err(IngestError::EmptyDocument);
    }

    let (english_text, detected_language, translated) = if is_plain_english(&raw_text) {
        (raw_text, None, false)
    } else {
        tracing::info!("Translating document {filename} to English");
        let translation = translator.translate_document(&raw_text).await;
        let translated = translation.text != raw_text;
        (translation.text, translation.source_language, translated)
    };

    let chunks = chunk_text(&english_text);
    if chunks.is_empty() {
        return Err(IngestError::EmptyDocument);
    }

    let vectors_batch = embeddings
        .embed_batch(&chunks)
        .await
        .map_err(|e| IngestError::Embedding(e.to_string()))?;

    let doc_id = uuid::Uuid::new_v4().to_string();
    vectors
        .add_document(user_id, thread_id, &doc_id, &vectors_batch, &chunks, filename)
        .await?;

    tracing::info!(
        "Ingested {filename} as {doc_id} ({} chunks) into {user_id}/{thread_id}",
        chunks.len()
    );

    Ok(IngestOutcome {
        doc_id,
        filename: filename.to_string(),
        detected_language,
        translated,
        chunks_added: chunks.len(),
    })
}
