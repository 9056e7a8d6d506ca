use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reforge_core::OracleError;

use super::{
    configuration_error, OpenAICompatibleClient, OracleRequest, OracleResponse, OracleResult,
    TokenStream, TransformationOracle,
};
use crate::config::{OracleSettings, ProviderSettings};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Clone)]
struct ProviderEntry {
    name: String,
    client: Arc<dyn TransformationOracle>,
    timeout: Option<Duration>,
}

impl ProviderEntry {
    fn http(client: OpenAICompatibleClient, timeout: Duration) -> Self {
        Self {
            name: client.name.clone(),
            client: Arc::new(client.with_timeout(timeout)),
            timeout: Some(timeout),
        }
    }

    /// Run one call against this provider, bounded by its own limit
    async fn bounded<T>(&self, call: impl Future<Output = OracleResult<T>>) -> OracleResult<T> {
        let Some(limit) = self.timeout else {
            return call.await;
        };
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(limit.as_secs())),
        }
    }
}

/// Ordered provider chain: the first provider that answers wins
#[derive(Debug, Clone)]
pub struct ProviderRouter {
    providers: Vec<ProviderEntry>,
}

impl ProviderRouter {
    /// Router over explicit clients, tried in order
    pub fn new(providers: Vec<Arc<dyn TransformationOracle>>) -> reforge_core::Result<Self> {
        if providers.is_empty() {
            return Err(configuration_error("No oracle providers configured."));
        }

        Ok(Self {
            providers: providers
                .into_iter()
                .map(|client| ProviderEntry {
                    name: client.name().to_string(),
                    client,
                    timeout: None,
                })
                .collect(),
        })
    }

    /// Bound every provider call, so one hung provider cannot starve the rest
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        for provider in &mut self.providers {
            provider.timeout = Some(timeout);
        }
        self
    }

    /// Build from the configured provider list, skipping duplicates
    pub fn from_settings(settings: &OracleSettings) -> reforge_core::Result<Self> {
        let mut providers = Vec::new();
        let mut seen = HashSet::new();
        let unique = settings
            .providers
            .iter()
            .map(|p| p.name.as_str())
            .collect::<HashSet<_>>()
            .len();
        let timeout = settings.provider_timeout(unique);

        for provider in &settings.providers {
            if !seen.insert(provider.name.clone()) {
                tracing::warn!("Duplicate oracle provider '{}' ignored", provider.name);
                continue;
            }
            let client = Self::build_client(provider, settings.max_tokens)?;
            providers.push(ProviderEntry::http(client, timeout));
        }

        if providers.is_empty() {
            return Err(configuration_error("No oracle providers configured."));
        }

        Ok(Self { providers })
    }

    /// Build from well-known environment variables
    pub fn from_env(settings: &OracleSettings) -> reforge_core::Result<Self> {
        Self::from_env_with(settings, |key| std::env::var(key).ok())
    }

    pub fn from_env_with(
        settings: &OracleSettings,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> reforge_core::Result<Self> {
        let mut clients = Vec::new();

        if let (Some(base_url), Some(model)) =
            (lookup("REFORGE_LLM_BASE_URL"), lookup("REFORGE_LLM_MODEL"))
        {
            let name = lookup("REFORGE_LLM_NAME").unwrap_or_else(|| "openai_compatible".to_string());
            let client =
                OpenAICompatibleClient::new(name, lookup("REFORGE_LLM_API_KEY"), base_url, model)
                    .with_max_tokens(settings.max_tokens);
            clients.push(client);
        }

        if let Some(api_key) = lookup("OPENROUTER_API_KEY") {
            let model = lookup("OPENROUTER_MODEL")
                .unwrap_or_else(|| "deepseek/deepseek-r1-0528:free".to_string());
            let client =
                OpenAICompatibleClient::new("openrouter", Some(api_key), OPENROUTER_BASE_URL, model)
                    .with_max_tokens(settings.max_tokens)
                    .with_header("X-Title", "Reforge");
            clients.push(client);
        }

        if let Some(api_key) = lookup("OPENAI_API_KEY") {
            let model = lookup("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
            let base_url = lookup("OPENAI_BASE_URL").unwrap_or_else(|| OPENAI_BASE_URL.to_string());
            let client = OpenAICompatibleClient::new("openai", Some(api_key), base_url, model)
                .with_max_tokens(settings.max_tokens);
            clients.push(client);
        }

        if clients.is_empty() {
            return Err(configuration_error(
                "No oracle providers found. Configure oracle.providers, or set REFORGE_LLM_BASE_URL + REFORGE_LLM_MODEL, OPENROUTER_API_KEY or OPENAI_API_KEY.",
            ));
        }

        let timeout = settings.provider_timeout(clients.len());
        Ok(Self {
            providers: clients
                .into_iter()
                .map(|client| ProviderEntry::http(client, timeout))
                .collect(),
        })
    }

    fn build_client(
        provider: &ProviderSettings,
        max_tokens: u32,
    ) -> reforge_core::Result<OpenAICompatibleClient> {
        if provider.base_url.trim().is_empty() || provider.model.trim().is_empty() {
            return Err(configuration_error(format!(
                "Provider '{}' needs both base_url and model",
                provider.name
            )));
        }

        let api_key = resolve_api_key(&provider.api_key, &provider.api_key_env);
        if api_key.is_none() {
            if let Some(env) = &provider.api_key_env {
                tracing::warn!(
                    "Provider '{}' expects an API key in {} but it is not set",
                    provider.name,
                    env
                );
            }
        }

        let mut client = OpenAICompatibleClient::new(
            provider.name.clone(),
            api_key,
            provider.base_url.clone(),
            provider.model.clone(),
        )
        .with_max_tokens(max_tokens);
        for (key, value) in &provider.headers {
            client = client.with_header(key.clone(), value.clone());
        }

        Ok(client)
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name.as_str()).collect()
    }

    /// Combine per-provider failures: all transport means the chain is unreachable
    fn combine_errors(errors: Vec<(String, OracleError)>) -> OracleError {
        if let Some((_, error)) = errors.iter().find(|(_, e)| !e.is_transport()) {
            return error.clone();
        }

        let detail = errors
            .iter()
            .map(|(name, e)| format!("{}: {}", name, e))
            .collect::<Vec<_>>()
            .join("; ");
        OracleError::Unreachable(format!("all providers failed ({})", detail))
    }
}

fn resolve_api_key(explicit: &Option<String>, env_hint: &Option<String>) -> Option<String> {
    if let Some(value) = explicit.clone() {
        return Some(value);
    }
    env_hint
        .as_ref()
        .and_then(|env_name| std::env::var(env_name).ok())
}

#[async_trait]
impl TransformationOracle for ProviderRouter {
    fn name(&self) -> &str {
        self.providers
            .first()
            .map(|p| p.name.as_str())
            .unwrap_or("router")
    }

    async fn complete(&self, request: &OracleRequest) -> OracleResult<OracleResponse> {
        let mut errors = Vec::new();

        for provider in &self.providers {
            match provider.bounded(provider.client.complete(request)).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    tracing::warn!("Oracle provider '{}' failed: {}", provider.name, err);
                    errors.push((provider.name.clone(), err));
                }
            }
        }

        Err(Self::combine_errors(errors))
    }

    async fn stream(&self, request: &OracleRequest) -> OracleResult<TokenStream> {
        let mut errors = Vec::new();

        for provider in &self.providers {
            match provider.bounded(provider.client.stream(request)).await {
                Ok(stream) => return Ok(stream),
                Err(err) => {
                    tracing::warn!("Oracle provider '{}' failed to stream: {}", provider.name, err);
                    errors.push((provider.name.clone(), err));
                }
            }
        }

        Err(Self::combine_errors(errors))
    }
}
