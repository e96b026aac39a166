//! Context assembly for answer generation.

use sahay_types::{MemoryFact, Message, render_transcript};

/// Assemble the generation context: user memory, running summary, recent
/// history, and retrieved document passages, as labeled sections.
pub fn build_context(
    memory: &[MemoryFact],
    summary: &str,
    messages: &[Message],
    document_context: &str,
) -> String {
    let memory_text = memory
        .iter()
        .map(|fact| format!("{}: {}", fact.key, fact.value))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "User Memory:\n{memory_text}\n\n\
         Conversation Summary:\n{summary}\n\n\
         Recent Conversation:\n{history}\n\n\
         Document Context:\n{document_context}",
        history = render_transcript(messages),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_in_order() {
        let memory = vec![MemoryFact {
            user_id: "u1".into(),
            key: "name".into(),
            value: "Asha".into(),
        }];
        let messages = vec![Message::user("what is the subsidy?")];
        let context = build_context(&memory, "intro chat", &messages, "The subsidy is 50%.");

        let memory_at = context.find("name: Asha").unwrap();
        let summary_at = context.find("intro chat").unwrap();
        let history_at = context.find("USER: what is the subsidy?").unwrap();
        let docs_at = context.find("The subsidy is 50%.").unwrap();
        assert!(memory_at < summary_at);
        assert!(summary_at < history_at);
        assert!(history_at < docs_at);
    }

    #[test]
    fn test_empty_sections_still_labeled() {
        let context = build_context(&[], "", &[], "");
        assert!(context.contains("User Memory:"));
        assert!(context.contains("Conversation Summary:"));
        assert!(context.contains("Recent Conversation:"));
        assert!(context.contains("Document Context:"));
    }
}
