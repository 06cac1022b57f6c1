use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
}

/// One line of the newline-delimited generate response. The final object
/// carries `done: true` and usually an empty `response`.
#[derive(Deserialize, Default)]
#[serde(default)]
struct GenerateChunk {
    response: String,
    done: bool,
}

#[derive(Deserialize)]
struct TagsModel {
    name: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagsModel>,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    /// Send one prompt and return the complete response text. The server
    /// streams newline-delimited JSON fragments; the whole body is read
    /// first and the fragments concatenated, so the caller always gets the
    /// full text in one piece.
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = GenerateRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Ollama request failed with status: {}. Make sure Ollama is running with: ollama serve",
                response.status()
            ));
        }

        let body = response.text().await?;
        collect_response(&body)
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to list models: {}", response.status()));
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|model| model.name).collect())
    }
}

/// Concatenate the `response` fragments of a newline-delimited generate
/// body, stopping at the object marked `done`.
fn collect_response(body: &str) -> Result<String> {
    let mut text = String::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let chunk: GenerateChunk = serde_json::from_str(line)
            .map_err(|err| anyhow!("malformed generate response line: {err}"))?;
        text.push_str(&chunk.response);
        if chunk.done {
            break;
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_response_concatenates_fragments_in_order() {
        let body = concat!(
            "{\"response\":\"Hel\",\"done\":false}\n",
            "{\"response\":\"lo \",\"done\":false}\n",
            "{\"response\":\"world\",\"done\":false}\n",
            "{\"response\":\"\",\"done\":true}\n",
        );
        assert_eq!(collect_response(body).unwrap(), "Hello world");
    }

    #[test]
    fn test_collect_response_stops_at_done() {
        let body = concat!(
            "{\"response\":\"kept\",\"done\":true}\n",
            "{\"response\":\" dropped\",\"done\":false}\n",
        );
        assert_eq!(collect_response(body).unwrap(), "kept");
    }

    #[test]
    fn test_collect_response_skips_blank_lines() {
        let body = "{\"response\":\"a\"}\n\n  \n{\"response\":\"b\",\"done\":true}";
        assert_eq!(collect_response(body).unwrap(), "ab");
    }

    #[test]
    fn test_collect_response_tolerates_extra_fields_and_missing_response() {
        // the final stats object has no meaningful response field
        let body = concat!(
            "{\"model\":\"llama3.2\",\"response\":\"hi\",\"done\":false}\n",
            "{\"model\":\"llama3.2\",\"done\":true,\"total_duration\":12345}\n",
        );
        assert_eq!(collect_response(body).unwrap(), "hi");
    }

    #[test]
    fn test_collect_response_errors_on_malformed_line() {
        let body = "{\"response\":\"ok\",\"done\":false}\nnot json\n";
        assert!(collect_response(body).is_err());
    }

    #[test]
    fn test_collect_response_empty_body_is_empty_text() {
        assert_eq!(collect_response("").unwrap(), "");
    }
}
