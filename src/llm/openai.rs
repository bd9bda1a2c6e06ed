use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};

use super::provider::{ChatModel, Embedder};
use super::types::{
    ChatCompletionResponse, ChatMessage, ChatRequest, EmbeddingRequest, EmbeddingResponse,
};
use crate::core::config::settings::ModelSettings;
use crate::core::errors::RagError;

const EMBED_OPERATION: &str = "embedding";
const CHAT_OPERATION: &str = "chat completion";

/// Client for any server exposing the OpenAI `/v1/embeddings` and
/// `/v1/chat/completions` endpoints.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    embedding_model: String,
    timeout: Duration,
    client: Client,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        chat_model: &str,
        embedding_model: &str,
        timeout: Duration,
    ) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RagError::downstream("http client setup", err))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            chat_model: chat_model.to_string(),
            embedding_model: embedding_model.to_string(),
            timeout,
            client,
        })
    }

    pub fn from_settings(settings: &ModelSettings) -> Result<Self, RagError> {
        Self::new(
            &settings.base_url,
            settings.api_key.clone(),
            &settings.chat_model,
            &settings.embedding_model,
            settings.request_timeout(),
        )
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let request = self.client.post(url);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn transport_error(&self, operation: &str, err: reqwest::Error) -> RagError {
        if err.is_timeout() {
            RagError::DownstreamTimeout {
                operation: operation.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            RagError::downstream(operation, err)
        }
    }

    async fn send_json<B, R>(&self, operation: &str, path: &str, body: &B) -> Result<R, RagError>
    where
        B: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let res = self
            .post(path)
            .json(body)
            .send()
            .await
            .map_err(|err| self.transport_error(operation, err))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::downstream(
                operation,
                format!("HTTP {}: {}", status, text.trim()),
            ));
        }

        res.json::<R>()
            .await
            .map_err(|err| self.transport_error(operation, err))
    }
}

#[async_trait]
impl Embedder for OpenAiCompatibleClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let body = EmbeddingRequest {
            model: &self.embedding_model,
            input: vec![text],
        };

        let payload: EmbeddingResponse = self
            .send_json(EMBED_OPERATION, "/v1/embeddings", &body)
            .await?;

        let embedding = payload
            .data
            .into_iter()
            .min_by_key(|item| item.index)
            .map(|item| item.embedding)
            .unwrap_or_default();

        if embedding.is_empty() {
            return Err(RagError::downstream(
                EMBED_OPERATION,
                "response contained no embedding",
            ));
        }

        Ok(embedding)
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleClient {
    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        let request = ChatRequest::new(&self.chat_model, vec![ChatMessage::user(prompt)]);

        let payload: ChatCompletionResponse = self
            .send_json(CHAT_OPERATION, "/v1/chat/completions", &request)
            .await?;

        payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| RagError::downstream(CHAT_OPERATION, "response contained no choices"))
    }
}
