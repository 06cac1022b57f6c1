use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::session::{ChatMessage, ChatRole};

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    url: String,
    api_key: String,
}

impl OpenAIClient {
    pub fn new(url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Send the conversation to the chat-completions endpoint and return
    /// the first choice's text. The optional shared context goes in as a
    /// leading system message.
    pub async fn chat(
        &self,
        model: &str,
        context: Option<&str>,
        history: &[ChatMessage],
    ) -> Result<String> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: wire_messages(context, history),
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error {}: {}", status, text));
        }

        let chat_response: ChatResponse = response.json().await?;
        chat_response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("chat response contained no choices"))
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gpt-4o".to_string(),
            "gpt-4o-mini".to_string(),
            "gpt-4-turbo".to_string(),
            "gpt-3.5-turbo".to_string(),
        ]
    }
}

fn wire_messages(context: Option<&str>, history: &[ChatMessage]) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if let Some(context) = context {
        let context = context.trim();
        if !context.is_empty() {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: context.to_string(),
            });
        }
    }
    for msg in history {
        messages.push(WireMessage {
            role: match msg.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            }
            .to_string(),
            content: msg.content.clone(),
        });
    }
    messages
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
    fn test_wire_messages_lead_with_system_context() {
        let history = [
            turn(ChatRole::User, "hi"),
            turn(ChatRole::Assistant, "hello"),
            turn(ChatRole::User, "how are you?"),
        ];
        let messages = wire_messages(Some("You are terse."), &history);

        let pairs: Vec<(&str, &str)> = messages
            .iter()
            .map(|m| (m.role.as_str(), m.content.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("system", "You are terse."),
                ("user", "hi"),
                ("assistant", "hello"),
                ("user", "how are you?"),
            ]
        );
    }

    #[test]
    fn test_wire_messages_skip_blank_context() {
        let history = [turn(ChatRole::User, "hi")];
        let messages = wire_messages(Some("  \n"), &history);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
    }

    #[test]
    fn test_response_text_comes_from_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"first"}},{"message":{"role":"assistant","content":"second"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices.first().unwrap().message.content, "first");
    }

    #[test]
    fn test_empty_choices_parse_but_carry_no_text() {
        let body = r#"{"choices":[]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices.first().is_none());
    }
}
