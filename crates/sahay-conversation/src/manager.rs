//! Turn pipeline and per-thread serialization.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use sahay_ai::{ChatModel, Translator};
use sahay_retrieval::embeddings::EmbeddingProvider;
use sahay_retrieval::store::{DEFAULT_TOP_K, VectorStore};
use sahay_storage::ThreadStore;
use sahay_types::{MemoryFact, Message};

use crate::prompt::build_context;
use crate::state::{MAX_RECENT_MESSAGES, overflow_block};

/// Per-thread async locks. A turn holds its thread's lock for the whole
/// load-mutate-persist cycle, so concurrent asks against one thread cannot
/// overwrite each other's state; different threads proceed independently.
struct ThreadLocks {
    inner: std::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ThreadLocks {
    fn new() -> Self {
        Self {
            inner: std::sync::Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, user_id: &str, thread_id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().expect("thread lock map poisoned");
            map.entry(format!("{user_id}\u{1f}{thread_id}"))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Result of one completed turn.
#[derive(Debug, Clone)]
pub struct AskOutcome {
    pub answer: String,
    /// The user's memory facts as they were when the prompt was assembled.
    pub memory_used: Vec<MemoryFact>,
}

/// Drives the conversation state machine for every thread.
pub struct ConversationManager {
    threads: Arc<ThreadStore>,
    vectors: Arc<VectorStore>,
    chat: Arc<dyn ChatModel>,
    translator: Arc<dyn Translator>,
    embeddings: Arc<dyn EmbeddingProvider>,
    locks: ThreadLocks,
}

impl ConversationManager {
    pub fn new(
        threads: Arc<ThreadStore>,
        vectors: Arc<VectorStore>,
        chat: Arc<dyn ChatModel>,
        translator: Arc<dyn Translator>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            threads,
            vectors,
            chat,
            translator,
            embeddings,
            locks: ThreadLocks::new(),
        }
    }

    /// Run one conversation turn.
    ///
    /// The stored user message keeps the original-language text for display;
    /// retrieval and generation use the translated English form. Collaborator
    /// failures degrade (original text, no facts, skipped compaction, empty
    /// document context); only answer generation errors surface, and in that
    /// case no state is persisted for the turn.
    pub async fn ask(
        &self,
        user_id: &str,
        thread_id: &str,
        question: &str,
        doc_id: Option<&str>,
    ) -> Result<AskOutcome> {
        let _guard = self.locks.acquire(user_id, thread_id).await;

        let english = self.translator.translate_to_english(question).await;

        let mut state = self.threads.load_thread(user_id, thread_id).await?;
        state.messages.push(Message::user(question));

        // Durable facts come from the original question, not the translation
        let facts = self.chat.extract_facts(question).await;
        for (key, value) in &facts {
            if !value.is_empty() {
                self.threads.save_memory(user_id, key, value).await?;
            }
        }

        if let Some(old) = overflow_block(&state.messages) {
            let old = old.to_vec();
            match self.chat.summarize(&state.summary, &old).await {
                Ok(new_summary) => {
                    state.summary = new_summary;
                    let evicted = state.messages.len() - MAX_RECENT_MESSAGES;
                    state.messages.drain(..evicted);
                }
                Err(e) => {
                    // Nothing is dropped; the trigger re-fires next turn
                    tracing::warn!("Summarization failed, keeping full tail: {e}");
                }
            }
        }

        let document_context = match self.embeddings.embed_query(&english.text).await {
            Ok(query) => {
                let hits = self
                    .vectors
                    .search(user_id, thread_id, &query, doc_id, DEFAULT_TOP_K)
                    .await?;
                hits.iter()
                    .map(|hit| hit.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            Err(e) => {
                tracing::warn!("Query embedding failed, answering without document context: {e}");
                String::new()
            }
        };

        let memory_used = self.threads.load_all_memory(user_id).await?;
        let context = build_context(&memory_used, &state.summary, &state.messages, &document_context);
        let answer = self.chat.generate_answer(&context, &english.text).await?;

        state.messages.push(Message::assistant(answer.clone()));
        self.threads.save_thread(user_id, thread_id, &state).await?;

        Ok(AskOutcome {
            answer,
            memory_used,
        })
    }
}
