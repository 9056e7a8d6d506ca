//! Transformation Oracle
//!
//! The generative service that turns a role-tagged conversation into candidate target code.
//! Output is untrusted: it may be empty, chatty, fenced or simply wrong.
//!
//! [`OracleClient`] is the capability the engine actually holds. It is chosen once at startup:
//! either a remote provider chain or the deterministic placeholder fallback.

pub mod fallback;
pub mod openai_compatible;
pub mod router;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use reforge_core::{OracleError, ReforgeError, ResolvedOptions};

use crate::config::{OracleMode, OracleSettings};
pub use fallback::DeterministicFallback;
pub use openai_compatible::OpenAICompatibleClient;
pub use router::ProviderRouter;

/// Result of an oracle call
pub type OracleResult<T> = std::result::Result<T, OracleError>;

/// Ordered token stream terminated by [`StreamEvent::End`]
pub type TokenStream = Pin<Box<dyn Stream<Item = OracleResult<StreamEvent>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// One role-tagged text segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Sampling and model selection for one request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OracleOptions {
    pub temperature: f64,
    /// Concrete model; `None` leaves the choice to the provider
    pub model: Option<String>,
    pub model_hint: Option<String>,
    pub max_tokens: Option<u32>,
}

impl OracleOptions {
    /// Explicit model wins, then the hint table, then the provider default
    pub fn from_resolved(
        options: &ResolvedOptions,
        model_hints: &HashMap<String, String>,
        max_tokens: Option<u32>,
    ) -> Self {
        let model = options.model.clone().or_else(|| {
            options
                .model_hint
                .as_ref()
                .and_then(|hint| model_hints.get(hint).cloned())
        });

        Self {
            temperature: options.temperature,
            model,
            model_hint: options.model_hint.clone(),
            max_tokens,
        }
    }
}

/// Request handed to a [`TransformationOracle`]
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub messages: Vec<Message>,
    pub options: OracleOptions,
}

/// A single completed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResponse {
    pub content: String,
    pub model: String,
    pub provider: String,
}

/// Streaming event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Token(String),
    End,
}

/// Generative oracle contract
#[async_trait]
pub trait TransformationOracle: Send + Sync + fmt::Debug {
    /// Provider name used in logs and reports
    fn name(&self) -> &str;

    /// One request, one text blob
    async fn complete(&self, request: &OracleRequest) -> OracleResult<OracleResponse>;

    /// Streaming variant. The default wraps `complete` as a single token.
    async fn stream(&self, request: &OracleRequest) -> OracleResult<TokenStream> {
        let response = self.complete(request).await?;
        let events = vec![Ok(StreamEvent::Token(response.content)), Ok(StreamEvent::End)];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

/// Concatenate tokens up to the end marker
pub async fn collect_stream(mut stream: TokenStream) -> OracleResult<String> {
    let mut content = String::new();

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Token(token) => content.push_str(&token),
            StreamEvent::End => return Ok(content),
        }
    }

    Err(OracleError::Malformed(
        "stream closed without an end marker".to_string(),
    ))
}

/// Oracle capability selected once at startup
#[derive(Debug, Clone)]
pub enum OracleClient {
    /// A real generative service (usually a [`ProviderRouter`])
    Remote(Arc<dyn TransformationOracle>),
    /// No generative service: every file gets the marked placeholder
    DeterministicFallback(DeterministicFallback),
}

impl OracleClient {
    pub fn remote(oracle: impl TransformationOracle + 'static) -> Self {
        Self::Remote(Arc::new(oracle))
    }

    pub fn fallback() -> Self {
        Self::DeterministicFallback(DeterministicFallback::default())
    }

    /// Build from configuration; remote mode without providers falls back to the environment
    pub fn from_settings(settings: &OracleSettings) -> reforge_core::Result<Self> {
        match settings.mode {
            OracleMode::Fallback => {
                tracing::info!("Transformation oracle: deterministic fallback");
                Ok(Self::fallback())
            }
            OracleMode::Remote => {
                let router = if settings.providers.is_empty() {
                    ProviderRouter::from_env(settings)?
                } else {
                    ProviderRouter::from_settings(settings)?
                };
                tracing::info!(
                    "Transformation oracle: remote via {}",
                    router.provider_names().join(" -> ")
                );
                Ok(Self::remote(router))
            }
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Remote(oracle) => oracle.name(),
            Self::DeterministicFallback(_) => "deterministic-fallback",
        }
    }

    /// Fallback placeholder generator
    pub fn placeholder(&self) -> DeterministicFallback {
        match self {
            Self::Remote(_) => DeterministicFallback::default(),
            Self::DeterministicFallback(fallback) => fallback.clone(),
        }
    }

    /// Complete a request, optionally through the streaming interface
    pub async fn complete(&self, request: &OracleRequest, streaming: bool) -> OracleResult<String> {
        match self {
            Self::Remote(oracle) if streaming => collect_stream(oracle.stream(request).await?).await,
            Self::Remote(oracle) => oracle.complete(request).await.map(|r| r.content),
            Self::DeterministicFallback(_) => Err(OracleError::Unreachable(
                "remote oracle disabled by configuration".to_string(),
            )),
        }
    }
}

impl From<Arc<dyn TransformationOracle>> for OracleClient {
    fn from(oracle: Arc<dyn TransformationOracle>) -> Self {
        Self::Remote(oracle)
    }
}

pub(crate) fn configuration_error(message: impl Into<String>) -> ReforgeError {
    ReforgeError::Configuration(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct EchoOracle;

    #[async_trait]
    impl TransformationOracle for EchoOracle {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &OracleRequest) -> OracleResult<OracleResponse> {
            Ok(OracleResponse {
                content: request
                    .messages
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default(),
                model: request.options.model.clone().unwrap_or_default(),
                provider: "echo".to_string(),
            })
        }
    }

    fn request(text: &str) -> OracleRequest {
        OracleRequest {
            messages: vec![Message::system("convert"), Message::user(text)],
            options: OracleOptions::default(),
        }
    }

    #[test]
    fn test_model_selection_order() {
        let hints: HashMap<String, String> =
            [("fast".to_string(), "small-model".to_string())].into_iter().collect();

        let hinted = ResolvedOptions {
            model_hint: Some("fast".into()),
            ..Default::default()
        };
        assert_eq!(
            OracleOptions::from_resolved(&hinted, &hints, None).model.as_deref(),
            Some("small-model")
        );

        let explicit = ResolvedOptions {
            model: Some("big-model".into()),
            model_hint: Some("fast".into()),
            ..Default::default()
        };
        assert_eq!(
            OracleOptions::from_resolved(&explicit, &hints, None).model.as_deref(),
            Some("big-model")
        );

        let unknown_hint = ResolvedOptions {
            model_hint: Some("cheap".into()),
            ..Default::default()
        };
        assert_eq!(OracleOptions::from_resolved(&unknown_hint, &hints, None).model, None);
    }

    #[tokio::test]
    async fn test_collect_stream_until_end() {
        let events = vec![
            Ok(StreamEvent::Token("struct ".into())),
            Ok(StreamEvent::Token("A {}".into())),
            Ok(StreamEvent::End),
            Ok(StreamEvent::Token("ignored".into())),
        ];
        let content = collect_stream(Box::pin(futures::stream::iter(events)))
            .await
            .unwrap();
        assert_eq!(content, "struct A {}");
    }

    #[tokio::test]
    async fn test_collect_stream_requires_end_marker() {
        let events = vec![Ok(StreamEvent::Token("struct".into()))];
        let err = collect_stream(Box::pin(futures::stream::iter(events)))
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_default_stream_wraps_complete() {
        let client = OracleClient::remote(EchoOracle);
        let streamed = client.complete(&request("struct B {}"), true).await.unwrap();
        let direct = client.complete(&request("struct B {}"), false).await.unwrap();

        assert_eq!(streamed, "struct B {}");
        assert_eq!(streamed, direct);
        assert!(client.is_remote());
    }

    #[tokio::test]
    async fn test_fallback_client_reports_unreachable() {
        let client = OracleClient::fallback();
        let err = client.complete(&request("x"), false).await.unwrap_err();

        assert!(err.is_transport());
        assert_eq!(client.name(), "deterministic-fallback");
    }
}
