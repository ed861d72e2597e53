//! Inference provider abstraction
//!
//! One HTTP provider type parameterized by a wire format. Adding a provider
//! is a config entry, not a new client.

use crate::error::{ResolverError, Result};
use async_trait::async_trait;
use eraline_common::config::{resolve_api_key, ProviderProtocol, ProviderToml};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const TEMPERATURE: f64 = 0.1;
const MAX_OUTPUT_TOKENS: u32 = 2048;

/// Reasoning quality tier (informational; order comes from `priority`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningTier {
    High,
    Medium,
    Low,
}

impl ReasoningTier {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => ReasoningTier::High,
            "low" => ReasoningTier::Low,
            _ => ReasoningTier::Medium,
        }
    }
}

/// Static description of one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSpec {
    pub name: String,
    pub display_name: String,
    /// Lower runs first
    pub priority: u32,
    /// 0 = unlimited
    pub rate_limit_per_hour: u32,
    pub reasoning: ReasoningTier,
    pub enabled: bool,
}

impl ProviderSpec {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            priority,
            rate_limit_per_hour: 0,
            reasoning: ReasoningTier::Medium,
            enabled: true,
        }
    }

    pub fn from_toml(toml: &ProviderToml) -> Self {
        Self {
            name: toml.name.clone(),
            display_name: toml.display_name.clone(),
            priority: toml.priority,
            rate_limit_per_hour: toml.rate_limit_per_hour,
            reasoning: ReasoningTier::parse(&toml.reasoning),
            enabled: toml.enabled,
        }
    }
}

/// A free-text completion endpoint
///
/// `complete` returns the provider's raw text; rate limiting must surface as
/// `ResolverError::ProviderRateLimited`, everything else as `ResolverError::Provider`.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    fn spec(&self) -> &ProviderSpec;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Request/response shape of a provider API
pub trait WireFormat: Send + Sync {
    fn build_request(
        &self,
        client: &reqwest::Client,
        base_url: &str,
        model: &str,
        api_key: &str,
        prompt: &str,
    ) -> reqwest::RequestBuilder;

    /// Completion text inside a successful response body
    fn extract_text(&self, body: &Value) -> Option<String>;
}

/// OpenAI-style `/chat/completions` (DeepSeek, Groq)
pub struct ChatCompletions;

impl WireFormat for ChatCompletions {
    fn build_request(
        &self,
        client: &reqwest::Client,
        base_url: &str,
        model: &str,
        api_key: &str,
        prompt: &str,
    ) -> reqwest::RequestBuilder {
        client
            .post(format!("{}/chat/completions", base_url))
            .bearer_auth(api_key)
            .json(&json!({
                "model": model,
                "messages": [{"role": "user", "content": prompt}],
                "temperature": TEMPERATURE,
                "max_tokens": MAX_OUTPUT_TOKENS,
            }))
    }

    fn extract_text(&self, body: &Value) -> Option<String> {
        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Gemini-style `models/{model}:generateContent`
pub struct GenerateContent;

impl WireFormat for GenerateContent {
    fn build_request(
        &self,
        client: &reqwest::Client,
        base_url: &str,
        model: &str,
        api_key: &str,
        prompt: &str,
    ) -> reqwest::RequestBuilder {
        client
            .post(format!("{}/models/{}:generateContent", base_url, model))
            .query(&[("key", api_key)])
            .json(&json!({
                "contents": [{"parts": [{"text": prompt}]}],
                "generationConfig": {
                    "temperature": TEMPERATURE,
                    "maxOutputTokens": MAX_OUTPUT_TOKENS,
                },
            }))
    }

    fn extract_text(&self, body: &Value) -> Option<String> {
        body.pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

fn wire_format(protocol: ProviderProtocol) -> Box<dyn WireFormat> {
    match protocol {
        ProviderProtocol::ChatCompletions => Box::new(ChatCompletions),
        ProviderProtocol::GenerateContent => Box::new(GenerateContent),
    }
}

/// Provider reached over HTTP with a configurable wire format
pub struct HttpInferenceProvider {
    spec: ProviderSpec,
    http_client: reqwest::Client,
    format: Box<dyn WireFormat>,
    base_url: String,
    model: String,
    api_key: String,
}

impl HttpInferenceProvider {
    pub fn new(
        spec: ProviderSpec,
        format: Box<dyn WireFormat>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolverError::provider(&spec.name, e.to_string()))?;

        Ok(Self {
            spec,
            http_client,
            format,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }
}

#[async_trait]
impl InferenceProvider for HttpInferenceProvider {
    fn spec(&self) -> &ProviderSpec {
        &self.spec
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let name = self.spec.name.as_str();
        let response = self
            .format
            .build_request(
                &self.http_client,
                &self.base_url,
                &self.model,
                &self.api_key,
                prompt,
            )
            .send()
            .await
            .map_err(|e| ResolverError::provider(name, format!("request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(provider = name, "Provider returned 429");
            return Err(ResolverError::rate_limited(name));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(ResolverError::provider(
                name,
                format!("HTTP {}: {}", status, snippet),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ResolverError::provider(name, format!("invalid response body: {}", e)))?;

        let text = self
            .format
            .extract_text(&body)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ResolverError::provider(name, "empty completion"))?;

        debug!(provider = name, chars = text.len(), "Provider completion received");
        Ok(text)
    }
}

/// Instantiate the configured providers, sorted by priority
///
/// A provider without a usable API key is kept but disabled.
pub fn build_providers(
    providers: &[ProviderToml],
    timeout: Duration,
) -> Result<Vec<Arc<dyn InferenceProvider>>> {
    let mut built: Vec<Arc<dyn InferenceProvider>> = Vec::with_capacity(providers.len());

    for toml in providers {
        // Budgets and source tags are keyed by name
        if built.iter().any(|p| p.spec().name == toml.name) {
            return Err(ResolverError::Config(format!(
                "provider {} is configured twice",
                toml.name
            )));
        }
        let mut spec = ProviderSpec::from_toml(toml);
        let api_key = resolve_api_key(&toml.name, toml.api_key.as_deref());

        if spec.enabled && api_key.is_none() {
            warn!(provider = %toml.name, "No API key configured, disabling provider");
            spec.enabled = false;
        }

        let provider = HttpInferenceProvider::new(
            spec,
            wire_format(toml.protocol),
            toml.base_url.clone(),
            toml.model.clone(),
            api_key.unwrap_or_default(),
            timeout,
        )?;
        built.push(Arc::new(provider));
    }

    built.sort_by_key(|p| p.spec().priority);
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eraline_common::config::default_providers;
    use serial_test::serial;

    #[test]
    fn test_chat_completions_text() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "{\"startYear\": 1944}"}}]});
        assert_eq!(
            ChatCompletions.extract_text(&body).as_deref(),
            Some("{\"startYear\": 1944}")
        );
        assert!(ChatCompletions.extract_text(&json!({"choices": []})).is_none());
    }

    #[test]
    fn test_generate_content_text() {
        let body = json!({"candidates": [{"content": {"parts": [{"text": "LONG_AGO"}]}}]});
        assert_eq!(GenerateContent.extract_text(&body).as_deref(), Some("LONG_AGO"));
        assert!(GenerateContent.extract_text(&json!({})).is_none());
    }

    #[test]
    fn test_generate_content_request_shape() {
        let client = reqwest::Client::new();
        let request = GenerateContent
            .build_request(&client, "https://example.test/v1beta", "gemini-x", "k", "prompt")
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://example.test/v1beta/models/gemini-x:generateContent?key=k"
        );
    }

    #[test]
    #[serial]
    fn test_missing_key_disables_provider() {
        for p in ["deepseek", "gemini", "groq"] {
            std::env::remove_var(eraline_common::config::api_key_env_var(p));
        }
        std::env::set_var(eraline_common::config::api_key_env_var("gemini"), "test-key");

        let providers = build_providers(&default_providers(), Duration::from_secs(5)).unwrap();
        let enabled: Vec<&str> = providers
            .iter()
            .filter(|p| p.spec().enabled)
            .map(|p| p.spec().name.as_str())
            .collect();
        assert_eq!(enabled, vec!["gemini"]);
        assert_eq!(providers[0].spec().name, "deepseek");

        std::env::remove_var(eraline_common::config::api_key_env_var("gemini"));
    }

    #[test]
    #[serial]
    fn test_duplicate_provider_name_is_a_config_error() {
        let mut providers = default_providers();
        providers.push(providers[0].clone());

        let err = build_providers(&providers, Duration::from_secs(5)).err();
        assert!(matches!(err, Some(ResolverError::Config(_))));
    }
}
