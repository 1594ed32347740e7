//! Chat-completions client for OpenAI-compatible endpoints.
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{AnswerGenerator, GenerationError, build_context_text};
use crate::config::{ChatConfig, Config};
use crate::error::RagError;
use crate::retriever::RetrievedItem;

const SYSTEM_PROMPT: &str = "You are an assistant that answers questions using the user's own documents.\n\
Base your answer only on the context excerpts provided below.\n\
If the context does not contain the information, do not guess: say clearly that the documents do not mention it.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Builds the user turn: the question followed by the context block.
fn user_prompt(question: &str, items: &[RetrievedItem]) -> String {
    format!(
        "Question:\n{question}\n\nContext:\n{}",
        build_context_text(items)
    )
}

pub struct OpenAiChat {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(
        api_base: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("docrag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenerationError::Request(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn from_config(cfg: &ChatConfig) -> Result<Self, RagError> {
        let api_key = Config::api_key(&cfg.api_key_env)?;
        Ok(Self::new(
            &cfg.api_base,
            &api_key,
            &cfg.model,
            Duration::from_secs(cfg.timeout_secs),
        )?)
    }
}

impl AnswerGenerator for OpenAiChat {
    fn generate(
        &self,
        question: &str,
        items: &[RetrievedItem],
    ) -> Result<String, GenerationError> {
        let prompt = user_prompt(question, items);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: resp.text().unwrap_or_default(),
            });
        }

        let body: ChatResponse = resp
            .json()
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        // A missing message body is an empty answer, not an error
        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ChunkMetadata;

    #[test]
    fn test_user_prompt_layout() {
        let items = vec![RetrievedItem {
            content: "Refunds take 30 days.".into(),
            metadata: ChunkMetadata {
                document_id: "refunds".into(),
                document_title: "refunds".into(),
                chunk_index: 1,
            },
            score: 0.8,
        }];
        assert_eq!(
            user_prompt("How long do refunds take?", &items),
            "Question:\nHow long do refunds take?\n\nContext:\n# refunds (chunk 1)\nRefunds take 30 days."
        );
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "gpt-4.1-mini",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "s",
                },
                ChatMessage {
                    role: "user",
                    content: "u",
                },
            ],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-4.1-mini");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "u");
    }

    #[test]
    fn test_response_null_content() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#)
                .unwrap();
        assert!(body.choices[0].message.content.is_none());
    }
}
