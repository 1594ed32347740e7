//! Answer synthesis on top of retrieved chunks.
//!
//! The generator itself is an external language model; this module only
//! formats its input and shapes the response handed to callers.
pub mod openai;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::error::Result;
use crate::retriever::{RetrievedItem, Retriever};

/// Returned when retrieval finds nothing; the generator is not called.
pub const NO_MATCH_ANSWER: &str =
    "No information related to the question could be found in the available documents.";

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Produces a free-text answer from a question and its context chunks.
pub trait AnswerGenerator: Send + Sync {
    fn generate(
        &self,
        question: &str,
        items: &[RetrievedItem],
    ) -> std::result::Result<String, GenerationError>;
}

/// A source reference returned next to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub document_id: String,
    pub document_title: String,
    pub snippet: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub references: Vec<Reference>,
}

/// Formats retrieved chunks as the context block of the prompt.
#[must_use]
pub fn build_context_text(items: &[RetrievedItem]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "# {} (chunk {})\n{}",
                item.metadata.document_title, item.metadata.chunk_index, item.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// First `max_chars` characters of `text`.
#[must_use]
pub fn snippet(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Retrieve, then generate; falls back to [`NO_MATCH_ANSWER`] on no hits.
pub fn ask(
    retriever: &Retriever,
    generator: &dyn AnswerGenerator,
    question: &str,
    snippet_chars: usize,
) -> Result<AskResponse> {
    let items = retriever.retrieve(question)?;

    if items.is_empty() {
        info!("No chunks matched; returning fallback answer");
        return Ok(AskResponse {
            answer: NO_MATCH_ANSWER.to_string(),
            references: Vec::new(),
        });
    }

    let answer = generator.generate(question, &items)?;

    let references = items
        .iter()
        .map(|item| Reference {
            document_id: item.metadata.document_id.clone(),
            document_title: item.metadata.document_title.clone(),
            snippet: snippet(&item.content, snippet_chars),
            score: item.score,
        })
        .collect();

    Ok(AskResponse { answer, references })
}
