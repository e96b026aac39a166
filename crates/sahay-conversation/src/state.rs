//! Rolling-tail compaction policy.

use sahay_types::Message;

/// Number of recent messages retained verbatim in a thread's tail. Anything
/// older is folded into the summary.
pub const MAX_RECENT_MESSAGES: usize = 6;

/// The oldest contiguous block that must be folded into the summary, if the
/// tail has outgrown the limit. Returned in chronological order; `None` when
/// the tail is within bounds.
pub fn overflow_block(messages: &[Message]) -> Option<&[Message]> {
    if messages.len() > MAX_RECENT_MESSAGES {
        Some(&messages[..messages.len() - MAX_RECENT_MESSAGES])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> Vec<Message> {
        (0..n).map(|i| Message::user(format!("m{i}"))).collect()
    }

    #[test]
    fn test_no_overflow_at_or_below_limit() {
        assert!(overflow_block(&numbered(0)).is_none());
        assert!(overflow_block(&numbered(MAX_RECENT_MESSAGES)).is_none());
    }

    #[test]
    fn test_overflow_is_oldest_block() {
        let messages = numbered(9);
        let old = overflow_block(&messages).unwrap();
        assert_eq!(old.len(), 3);
        assert_eq!(old[0].content, "m0");
        assert_eq!(old[2].content, "m2");
    }

    #[test]
    fn test_retained_tail_is_exactly_the_limit() {
        let messages = numbered(15);
        let old = overflow_block(&messages).unwrap();
        assert_eq!(messages.len() - old.len(), MAX_RECENT_MESSAGES);
    }
}
