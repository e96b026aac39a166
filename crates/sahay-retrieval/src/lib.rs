//! sahay-retrieval: Per-thread vector storage and similarity search for
//! document question answering.
//!
//! Provides:
//! - SQLite-backed vector partitions scoped to `(user_id, thread_id)`
//! - Exact squared-L2 nearest-neighbor search with optional document filtering
//! - Size-tiered text chunking with overlap
//! - Embedding provider trait with an OpenAI-compatible HTTP implementation

pub mod chunking;
pub mod embeddings;
pub mod search;
pub mod store;
