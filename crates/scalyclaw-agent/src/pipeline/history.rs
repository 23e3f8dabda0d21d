//! Token-budget-aware history trimming (spec.md §4.7 step 4).
//!
//! Character-per-token approximation avoids a tokenizer dependency for a
//! figure that is only ever used to decide how much history to keep, not for
//! billing — real usage comes back from the provider response.

use scalyclaw_core::types::{Message, MessageRole};

/// Characters-per-token approximation used across the orchestrator, per
/// spec.md §4.7 ("characters-per-token approximation ≈ 3.5"). The
/// orchestrator round loop recalibrates its own working estimate from real
/// token counts after round one; this constant is only the cold-start value.
pub(crate) const CHARS_PER_TOKEN: f64 = 3.5;

/// Reserved fraction of the context window held back for the system prompt,
/// tool definitions, and the model's own output.
pub(crate) const RESERVED_FRACTION: f64 = 0.4;

/// Best-known context window (tokens) for a model id. Falls back to a
/// conservative default for anything unrecognized.
pub fn context_window_for(model: &str) -> u32 {
    let m = model.to_ascii_lowercase();
    if m.contains("claude") {
        200_000
    } else if m.contains("gpt-4o") || m.contains("gpt-4.1") || m.contains("o1") || m.contains("o3") {
        128_000
    } else if m.contains("gemini") {
        1_000_000
    } else if m.contains("llama-3.1") || m.contains("llama-3.3") {
        128_000
    } else {
        32_000
    }
}

/// Character budget available for conversation history, derived from the
/// model's context window minus the reserved fraction.
pub fn history_char_budget(model: &str) -> usize {
    let window_tokens = context_window_for(model) as f64;
    let available_tokens = window_tokens * (1.0 - RESERVED_FRACTION);
    (available_tokens * CHARS_PER_TOKEN) as usize
}

/// Trim `messages` from the oldest end until the remaining total content
/// length fits `budget_chars`, without splitting an assistant-with-tool-calls
/// / tool-result group: if the cut would start mid-group (a `Tool` message at
/// the new head), the cut point walks back to the group's owning message.
///
/// `messages` must be ordered oldest-first (as returned by
/// `MemoryManager::get_channel_messages`).
pub fn trim_to_budget(messages: &[Message], budget_chars: usize) -> Vec<Message> {
    if messages.is_empty() {
        return Vec::new();
    }

    let mut total = 0usize;
    let mut start = messages.len();
    for (i, m) in messages.iter().enumerate().rev() {
        let len = m.content.len();
        if start != messages.len() && total + len > budget_chars {
            break;
        }
        total += len;
        start = i;
    }

    while start > 0 && messages[start].role == MessageRole::Tool {
        start -= 1;
    }

    messages[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn msg(role: MessageRole, content: &str) -> Message {
        Message {
            id: 0,
            channel: "test".to_string(),
            role,
            content: content.to_string(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn keeps_everything_within_budget() {
        let msgs = vec![msg(MessageRole::User, "hi"), msg(MessageRole::Assistant, "hello")];
        let trimmed = trim_to_budget(&msgs, 1000);
        assert_eq!(trimmed.len(), 2);
    }

    #[test]
    fn trims_oldest_first() {
        let msgs = vec![
            msg(MessageRole::User, "aaaaaaaaaa"),
            msg(MessageRole::Assistant, "bbbbbbbbbb"),
            msg(MessageRole::User, "cccccccccc"),
        ];
        let trimmed = trim_to_budget(&msgs, 15);
        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed[0].content, "cccccccccc");
    }

    #[test]
    fn never_leaves_an_orphan_tool_result_at_head() {
        let msgs = vec![
            msg(MessageRole::User, "earlier turn padding text"),
            msg(MessageRole::Assistant, "calling a tool"),
            msg(MessageRole::Tool, "tool result payload"),
            msg(MessageRole::User, "latest question"),
        ];
        // budget tight enough to want to cut right before the tool message
        let trimmed = trim_to_budget(&msgs, 40);
        assert_ne!(trimmed[0].role, MessageRole::Tool);
    }

    #[test]
    fn always_keeps_at_least_the_newest_message() {
        let msgs = vec![msg(MessageRole::User, &"x".repeat(10_000))];
        let trimmed = trim_to_budget(&msgs, 1);
        assert_eq!(trimmed.len(), 1);
    }
}
