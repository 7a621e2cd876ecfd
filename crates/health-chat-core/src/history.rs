//! Conversation history window for prompts.

use crate::models::Message;

/// Default word budget for the history window.
pub const DEFAULT_HISTORY_TOKENS: usize = 500;

/// How many recent messages the chat flow considers.
pub const HISTORY_MESSAGE_LIMIT: usize = 10;

/// Render the most recent messages that fit in `max_tokens`.
///
/// `messages` must be newest first. Tokens are approximated by whitespace
/// separated words. Walking stops at the first message that would overflow the
/// budget, so older messages never leapfrog a newer one that did not fit. The
/// result is chronological, one message per line.
pub fn conversation_history(messages: &[Message], max_tokens: usize) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut total_tokens = 0;

    for message in messages {
        let tokens = message.text.split_whitespace().count();
        if total_tokens + tokens > max_tokens {
            break;
        }
        kept.push(&message.text);
        total_tokens += tokens;
    }

    let mut conversation = String::new();
    for text in kept.iter().rev() {
        conversation.push_str(text);
        conversation.push('\n');
    }
    conversation
}
