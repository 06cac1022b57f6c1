//! Prompt assembly for the flat generate endpoint, plus the optional
//! shared context file read once at startup.

use std::path::Path;

use anyhow::{Context, Result};

use crate::session::{ChatMessage, ChatRole};

pub async fn load_context_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read context file {}", path.display()))
}

/// Fold the shared context, the conversation so far, and the current
/// question into one prompt string for the generate endpoint. The chat
/// endpoint sends structured messages instead (see `ai::openai`).
pub fn build_prompt(context: Option<&str>, messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();

    if let Some(context) = context {
        let context = context.trim();
        if !context.is_empty() {
            prompt.push_str(context);
            prompt.push_str("\n\n");
        }
    }

    if messages.len() > 1 {
        prompt.push_str("Conversation so far:\n");
        for msg in &messages[..messages.len() - 1] {
            match msg.role {
                ChatRole::User => prompt.push_str(&format!("User: {}\n", msg.content)),
                ChatRole::Assistant => prompt.push_str(&format!("Assistant: {}\n", msg.content)),
            }
        }
        prompt.push('\n');
    }

    if let Some(last) = messages.last() {
        prompt.push_str(&last.content);
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: ChatRole, content: &str) -> ChatMessage {
        ChatMessage {
            role,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_single_turn_without_context_is_the_bare_question() {
        let messages = [turn(ChatRole::User, "what is rust?")];
        assert_eq!(build_prompt(None, &messages), "what is rust?");
    }

    #[test]
    fn test_context_comes_first() {
        let messages = [turn(ChatRole::User, "hello")];
        let prompt = build_prompt(Some("You answer briefly.\n"), &messages);
        assert_eq!(prompt, "You answer briefly.\n\nhello");
    }

    #[test]
    fn test_transcript_precedes_current_question() {
        let messages = [
            turn(ChatRole::User, "first question"),
            turn(ChatRole::Assistant, "first answer"),
            turn(ChatRole::User, "second question"),
        ];
        let prompt = build_prompt(None, &messages);

        let history_at = prompt.find("Conversation so far:").unwrap();
        let first_q_at = prompt.find("User: first question").unwrap();
        let first_a_at = prompt.find("Assistant: first answer").unwrap();
        assert!(history_at < first_q_at && first_q_at < first_a_at);
        assert!(prompt.ends_with("second question"));
        // the current question is not duplicated into the transcript
        assert_eq!(prompt.matches("second question").count(), 1);
    }

    #[test]
    fn test_blank_context_is_dropped() {
        let messages = [turn(ChatRole::User, "hi")];
        assert_eq!(build_prompt(Some("   \n"), &messages), "hi");
    }
}
