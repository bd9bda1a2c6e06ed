//! Grounded answer generation.

use std::sync::Arc;
use std::time::Duration;

use super::retriever::Retriever;
use super::types::{Answer, RetrievedMatch};
use crate::core::errors::RagError;
use crate::llm::{bounded, ChatModel};

pub const INSUFFICIENT_INFORMATION_ANSWER: &str =
    "I don't have enough information to answer this question.";

/// Source excerpt length in characters.
const EXCERPT_CHARS: usize = 100;

pub struct AnswerComposer {
    retriever: Retriever,
    chat: Arc<dyn ChatModel>,
    call_timeout: Duration,
}

impl AnswerComposer {
    pub fn new(retriever: Retriever, chat: Arc<dyn ChatModel>, call_timeout: Duration) -> Self {
        Self {
            retriever,
            chat,
            call_timeout,
        }
    }

    /// Answers `question` from at most `max_results` retrieved segments.
    ///
    /// Errors from the embedder or the chat model are returned as-is; there is
    /// no degraded fallback answer.
    pub async fn answer(&self, question: &str, max_results: usize) -> Result<Answer, RagError> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidInput("Question must not be empty".to_string()));
        }

        let matches = self.retriever.retrieve(question, max_results).await?;
        if matches.is_empty() {
            tracing::info!("No relevant segments found; returning canned answer");
            return Ok(Answer {
                text: INSUFFICIENT_INFORMATION_ANSWER.to_string(),
                sources: Vec::new(),
                confidence: 0.0,
            });
        }

        let prompt = build_prompt(question, &matches);
        let text = bounded(
            "chat completion",
            self.call_timeout,
            self.chat.complete(&prompt),
        )
        .await?;

        let sources = matches
            .iter()
            .map(|m| excerpt(&m.segment_text))
            .collect();
        let confidence = mean_score(&matches);

        tracing::info!(
            "Answered question from {} segments with confidence {:.3}",
            matches.len(),
            confidence
        );

        Ok(Answer {
            text,
            sources,
            confidence,
        })
    }
}

fn build_prompt(question: &str, matches: &[RetrievedMatch]) -> String {
    let context = matches
        .iter()
        .map(|m| m.segment_text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a helpful AI assistant for IntelliDesk.\n\
         Answer the following question based only on the provided context.\n\
         If the context doesn't contain enough information, say so clearly.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         \n\
         Answer:\n"
    )
}

fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn mean_score(matches: &[RetrievedMatch]) -> f64 {
    if matches.is_empty() {
        return 0.0;
    }
    matches.iter().map(|m| m.similarity_score).sum::<f64>() / matches.len() as f64
}
