//! sahay-conversation: The per-thread conversation state machine.
//!
//! Each turn runs a fixed pipeline under a per-thread lock: translate the
//! question, append it to the rolling message tail, extract durable facts,
//! fold overflow into the running summary, retrieve document passages,
//! generate an answer, and persist the updated state as one atomic row
//! replace. Threads are isolated: turns on different threads run in
//! parallel, turns on the same thread are strictly ordered.

pub mod manager;
pub mod prompt;
pub mod state;

pub use manager::{AskOutcome, ConversationManager};
pub use state::MAX_RECENT_MESSAGES;
