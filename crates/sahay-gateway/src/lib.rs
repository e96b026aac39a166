//! sahay-gateway: HTTP service for document upload and multilingual
//! question answering.
//!
//! Routes:
//! - `POST /upload` — ingest a document into a thread's vector partition
//! - `POST /ask` — run one conversation turn
//! - `POST /voice-ask` — transcribe audio, then run one conversation turn
//! - `POST /search` — raw retrieval over a thread's partition
//! - `GET /threads/{user_id}` — list a user's threads
//! - `GET /threads/{user_id}/{thread_id}` — thread summary + messages
//! - `GET /documents/{user_id}` — uploaded document registry
//! - `GET /health` — status + version

pub mod handlers;
pub mod ingest;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tracing::info;

use sahay_ai::{ChatModel, GeminiChat, SarvamClient, SpeechToText, Translator};
use sahay_config::SahayConfig;
use sahay_conversation::ConversationManager;
use sahay_retrieval::embeddings::{EmbeddingProvider, HttpEmbedding};
use sahay_retrieval::store::VectorStore;
use sahay_storage::ThreadStore;

use ingest::{PlainTextExtractor, TextExtractor};

/// Shared gateway state.
pub struct AppState {
    pub threads: Arc<ThreadStore>,
    pub vectors: Arc<VectorStore>,
    pub manager: Arc<ConversationManager>,
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub translator: Arc<dyn Translator>,
    pub speech: Arc<dyn SpeechToText>,
    pub extractor: Arc<dyn TextExtractor>,
}

/// Build the axum router over the shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/upload", post(handlers::upload))
        .route("/ask", post(handlers::ask))
        .route("/voice-ask", post(handlers::voice_ask))
        .route("/search", post(handlers::search))
        .route("/threads/{user_id}", get(handlers::list_threads))
        .route("/threads/{user_id}/{thread_id}", get(handlers::get_thread))
        .route("/documents/{user_id}", get(handlers::list_documents))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Start the gateway server.
///
/// Opens the stores under the configured data directory, wires the provider
/// clients from environment API keys, and serves until shutdown.
pub async fn start_server(
    config: SahayConfig,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let port = port_override.unwrap_or(config.gateway.port);
    let host = config.gateway.host.clone();

    let data_dir = match &config.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            dir.clone()
        }
        None => sahay_config::ensure_config_dir()?,
    };

    let threads = Arc::new(ThreadStore::open(&data_dir.join("threads.db"))?);
    let vectors = Arc::new(VectorStore::open(
        &data_dir.join("vectors.db"),
        config.embedding.dimensions,
    )?);

    let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(
        HttpEmbedding::from_env(
            config.embedding.endpoint.clone(),
            config.embedding.model.clone(),
            config.embedding.dimensions,
        )
        .ok_or("EMBEDDING_API_KEY (or OPENAI_API_KEY) not set")?,
    );
    let chat: Arc<dyn ChatModel> = Arc::new(
        GeminiChat::from_env(config.chat.model.clone()).ok_or("GEMINI_API_KEY not set")?,
    );
    let sarvam = Arc::new(
        SarvamClient::from_env(config.translation.base_url.clone())
            .ok_or("SARVAM_API_KEY not set")?,
    );
    let translator: Arc<dyn Translator> = sarvam.clone();
    let speech: Arc<dyn SpeechToText> = sarvam;

    let manager = Arc::new(ConversationManager::new(
        threads.clone(),
        vectors.clone(),
        chat,
        translator.clone(),
        embeddings.clone(),
    ));

    let state = Arc::new(AppState {
        threads,
        vectors,
        manager,
        embeddings,
        translator,
        speech,
        extractor: Arc::new(PlainTextExtractor),
    });

    let app = router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("Gateway listening on {addr}");
    info!("  Data dir: {}", data_dir.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
