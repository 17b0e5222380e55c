use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, Result};

/// A hosted text-generation model.
#[async_trait]
pub trait TextGeneration: Send + Sync {
    async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String>;
}

/// A hosted sentence-embedding model. Returns one vector per input.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    inputs: &'a [String],
}

/// Client for the HuggingFace-style inference API. One bearer token covers
/// both the generation and the embedding model.
pub struct InferenceClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    llm_model: String,
    embedding_model: String,
    temperature: f32,
}

impl InferenceClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("foresight/", env!("CARGO_PKG_VERSION")))
            .build()?;

        if config.api_token.is_none() {
            tracing::warn!("No API token configured; inference requests will likely be rejected");
        }

        Ok(Self {
            client,
            base_url: config.inference_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
            llm_model: config.llm_model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.llm_model
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<reqwest::Response> {
        let mut request = self.client.post(url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::Llm(format!("API error ({status}): {error_text}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl TextGeneration for InferenceClient {
    async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String> {
        let url = format!("{}/models/{}", self.base_url, self.llm_model);
        let request = GenerationRequest {
            inputs: prompt,
            parameters: GenerationParameters {
                max_new_tokens,
                temperature: self.temperature,
                return_full_text: false,
            },
        };

        let generations: Vec<Generation> = self.post(&url, &request).await?.json().await?;
        first_generation(generations)
    }
}

#[async_trait]
impl Embedder for InferenceClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!(
            "{}/pipeline/feature-extraction/{}",
            self.base_url, self.embedding_model
        );
        let vectors: Vec<Vec<f32>> = self
            .post(&url, &EmbeddingRequest { inputs: texts })
            .await?
            .json()
            .await?;

        if vectors.len() != texts.len() {
            return Err(AppError::Llm(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

fn first_generation(generations: Vec<Generation>) -> Result<String> {
    generations
        .into_iter()
        .next()
        .map(|g| g.generated_text.trim().to_string())
        .ok_or_else(|| AppError::Llm("empty completion".into()))
}
