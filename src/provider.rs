//! Completion provider capability
//!
//! One `complete` operation behind a trait; two interchangeable vendor
//! back-ends (standard OpenAI and an Azure OpenAI gateway), selected once
//! at startup from the configuration. Both share a long-lived
//! `reqwest::Client` for connection pooling and a bounded request timeout.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{LedgerError, ProviderError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// External LLM text-completion capability.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run one completion and return the raw reply text.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> std::result::Result<String, ProviderError>;

    /// Whether the provider is usably configured (key present).
    fn ready(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// Pick the configured provider. Azure wins when both are configured;
/// neither configured is a startup error.
pub fn from_config(config: &Config) -> crate::Result<Arc<dyn CompletionProvider>> {
    if let (Some(key), Some(endpoint)) = (&config.azure_api_key, &config.azure_endpoint) {
        info!(deployment = %config.azure_deployment, "using Azure OpenAI provider");
        return Ok(Arc::new(AzureOpenAiProvider::new(
            key.clone(),
            endpoint.clone(),
            config.azure_deployment.clone(),
            config.azure_api_version.clone(),
        )));
    }

    if let Some(key) = &config.openai_api_key {
        info!(model = %config.openai_model, "using OpenAI provider");
        return Ok(Arc::new(OpenAiProvider::new(
            key.clone(),
            config.openai_model.clone(),
        )));
    }

    Err(LedgerError::Config(
        "set AZURE_OPENAI_API_KEY + AZURE_OPENAI_ENDPOINT or OPENAI_API_KEY".to_string(),
    ))
}

fn build_http_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(8)
        .build()
        .expect("Failed to build HTTP client")
}

//
// ================= Wire types (chat completions) =================
//

#[derive(Debug, Serialize)]
struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

fn build_request(
    model: Option<String>,
    system_prompt: &str,
    user_prompt: &str,
    temperature: f32,
    max_output_tokens: u32,
) -> ChatRequest {
    ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: system_prompt.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            },
        ],
        temperature,
        max_tokens: max_output_tokens,
    }
}

async fn extract_reply(response: reqwest::Response) -> std::result::Result<String, ProviderError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!(%status, "completion API error response: {}", body);
        return Err(ProviderError(format!("HTTP {}: {}", status, body)));
    }

    let parsed: ChatResponse = response.json().await.map_err(|e| {
        error!("failed to decode completion response: {}", e);
        ProviderError(format!("decode error: {}", e))
    })?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError("empty choices in completion response".to_string()))?;

    Ok(choice.message.content.trim().to_string())
}

//
// ================= OpenAI =================
//

/// Standard OpenAI chat-completions client.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: build_http_client(),
            api_key,
            model,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> std::result::Result<String, ProviderError> {
        if !self.ready() {
            return Err(ProviderError("OPENAI_API_KEY not configured".to_string()));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let request = build_request(
            Some(self.model.clone()),
            system_prompt,
            user_prompt,
            temperature,
            max_output_tokens,
        );

        info!(model = %self.model, "calling OpenAI chat completions");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("OpenAI request failed: {}", e);
                ProviderError(format!("request error: {}", e))
            })?;

        extract_reply(response).await
    }

    fn ready(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

//
// ================= Azure OpenAI =================
//

/// Enterprise-gateway variant: same chat-completions contract, addressed by
/// deployment name with an `api-key` header.
pub struct AzureOpenAiProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    deployment: String,
    api_version: String,
}

impl AzureOpenAiProvider {
    pub fn new(api_key: String, endpoint: String, deployment: String, api_version: String) -> Self {
        Self {
            client: build_http_client(),
            api_key,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment,
            api_version,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

#[async_trait]
impl CompletionProvider for AzureOpenAiProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> std::result::Result<String, ProviderError> {
        if !self.ready() {
            return Err(ProviderError(
                "AZURE_OPENAI_API_KEY not configured".to_string(),
            ));
        }

        // The deployment is addressed in the URL; no model field in the body.
        let request = build_request(None, system_prompt, user_prompt, temperature, max_output_tokens);

        info!(deployment = %self.deployment, "calling Azure OpenAI chat completions");

        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Azure OpenAI request failed: {}", e);
                ProviderError(format!("request error: {}", e))
            })?;

        extract_reply(response).await
    }

    fn ready(&self) -> bool {
        !self.api_key.is_empty() && !self.endpoint.is_empty()
    }

    fn name(&self) -> &'static str {
        "azure-openai"
    }
}

//
// ================= Scripted provider =================
//

/// Scripted provider for tests and offline development. Pops one canned
/// reply per call, in order.
pub struct MockProvider {
    replies: tokio::sync::Mutex<std::collections::VecDeque<std::result::Result<String, ProviderError>>>,
}

impl MockProvider {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = std::result::Result<String, ProviderError>>,
    {
        Self {
            replies: tokio::sync::Mutex::new(replies.into_iter().collect()),
        }
    }

    /// Single fixed successful reply.
    pub fn replying(reply: &str) -> Self {
        Self::new([Ok(reply.to_string())])
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _temperature: f32,
        _max_output_tokens: u32,
    ) -> std::result::Result<String, ProviderError> {
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError("mock provider exhausted".to_string())))
    }

    fn ready(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
