use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use reforge_core::OracleError;

use super::{OracleRequest, OracleResponse, OracleResult, StreamEvent, TokenStream, TransformationOracle};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Any `/chat/completions` endpoint speaking the OpenAI wire format
#[derive(Debug, Clone)]
pub struct OpenAICompatibleClient {
    pub name: String,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    headers: HashMap<String, String>,
    http_client: reqwest::Client,
}

impl OpenAICompatibleClient {
    pub fn new(
        name: impl Into<String>,
        api_key: Option<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_tokens: 4096,
            timeout: DEFAULT_TIMEOUT,
            headers: HashMap::new(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Limit for one request, connection through last byte
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body(&self, request: &OracleRequest, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: request
                .options
                .model
                .clone()
                .unwrap_or_else(|| self.model.clone()),
            messages: request
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: Some(request.options.max_tokens.unwrap_or(self.max_tokens)),
            temperature: Some(request.options.temperature),
            stream,
        }
    }

    async fn send(&self, request: &OracleRequest, stream: bool) -> OracleResult<reqwest::Response> {
        let body = self.build_body(request, stream);

        let mut builder = self
            .http_client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .timeout(self.timeout);

        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }

        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), error_text));
        }

        Ok(response)
    }
}

fn transport_error(error: reqwest::Error, limit: Duration) -> OracleError {
    if error.is_timeout() {
        OracleError::Timeout(limit.as_secs())
    } else {
        OracleError::Unreachable(error.to_string())
    }
}

/// Gateway-style statuses mean the service is down, not that it refused the request
fn status_error(status: u16, body: String) -> OracleError {
    match status {
        502..=504 => OracleError::Unreachable(format!("HTTP {}: {}", status, body)),
        _ => OracleError::Rejected { status, body },
    }
}

/// Parse one server-sent-event line. `Ok(None)` for comments, blank lines and other fields.
pub fn parse_sse_line(line: &str) -> OracleResult<Option<StreamEvent>> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };

    let data = data.trim();
    if data == "[DONE]" {
        return Ok(Some(StreamEvent::End));
    }
    if data.is_empty() {
        return Ok(None);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(data)
        .map_err(|e| OracleError::Malformed(format!("bad stream chunk: {}", e)))?;

    let token = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect::<String>();

    Ok((!token.is_empty()).then_some(StreamEvent::Token(token)))
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

struct SseState {
    response: reqwest::Response,
    buffer: Vec<u8>,
    pending: VecDeque<StreamEvent>,
    finished: bool,
    timeout: Duration,
}

impl SseState {
    /// Move every complete line out of the byte buffer
    fn drain_lines(&mut self) -> OracleResult<()> {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            if self.finished {
                break;
            }
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_sse_line(&line)? {
                self.finished = event == StreamEvent::End;
                self.pending.push_back(event);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TransformationOracle for OpenAICompatibleClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &OracleRequest) -> OracleResult<OracleResponse> {
        let response = self.send(request, false).await?;

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(format!("{}: {}", self.name, e)))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| OracleError::Malformed(format!("{}: no choices", self.name)))?;

        Ok(OracleResponse {
            content,
            model: completion.model.unwrap_or_else(|| self.model.clone()),
            provider: self.name.clone(),
        })
    }

    async fn stream(&self, request: &OracleRequest) -> OracleResult<TokenStream> {
        let response = self.send(request, true).await?;

        let state = SseState {
            response,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
            timeout: self.timeout,
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Some((Ok(event), state));
                }
                if state.finished {
                    return None;
                }

                match state.response.chunk().await {
                    Ok(Some(bytes)) => {
                        state.buffer.extend_from_slice(&bytes);
                        if let Err(e) = state.drain_lines() {
                            state.finished = true;
                            state.pending.clear();
                            return Some((Err(e), state));
                        }
                    }
                    Ok(None) => {
                        // Flush a final line that had no trailing newline
                        state.buffer.push(b'\n');
                        if let Err(e) = state.drain_lines() {
                            state.finished = true;
                            return Some((Err(e), state));
                        }
                        state.finished = true;
                    }
                    Err(e) => {
                        state.finished = true;
                        let err = transport_error(e, state.timeout);
                        return Some((Err(err), state));
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{Message, OracleOptions};

    #[test]
    fn test_parse_sse_tokens_and_end() {
        let token = parse_sse_line(r#"data: {"choices":[{"delta":{"content":"struct "}}]}"#).unwrap();
        assert_eq!(token, Some(StreamEvent::Token("struct ".into())));

        assert_eq!(parse_sse_line("data: [DONE]").unwrap(), Some(StreamEvent::End));
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), None);
        assert_eq!(parse_sse_line("").unwrap(), None);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(),
            None
        );
    }

    #[test]
    fn test_parse_sse_rejects_garbage() {
        let err = parse_sse_line("data: {not json").unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[test]
    fn test_request_body_uses_request_model_and_roles() {
        let client = OpenAICompatibleClient::new("local", None, "http://localhost:1234/v1/", "default-model")
            .with_max_tokens(512);
        let request = OracleRequest {
            messages: vec![Message::system("sys"), Message::user("hi"), Message::assistant("prev")],
            options: OracleOptions {
                temperature: 0.2,
                model: Some("override".into()),
                model_hint: None,
                max_tokens: None,
            },
        };

        let body = serde_json::to_value(client.build_body(&request, false)).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:1234/v1/chat/completions");
        assert_eq!(body["model"], "override");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["messages"][2]["role"], "assistant");
        assert!(body.get("stream").is_none());

        let streaming = serde_json::to_value(client.build_body(&request, true)).unwrap();
        assert_eq!(streaming["stream"], true);
    }

    #[test]
    fn test_status_mapping() {
        assert!(status_error(503, "down".into()).is_transport());
        assert!(matches!(
            status_error(401, "bad key".into()),
            OracleError::Rejected { status: 401, .. }
        ));
    }

    #[tokio::test]
    async fn test_timeout_reports_configured_limit() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // accept and never answer
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = OpenAICompatibleClient::new("silent", None, format!("http://{}/v1", addr), "m")
            .with_timeout(Duration::from_secs(1));
        let request = OracleRequest {
            messages: vec![Message::user("hi")],
            options: OracleOptions::default(),
        };

        let err = client.complete(&request).await.unwrap_err();
        assert_eq!(err, OracleError::Timeout(1));
        assert_eq!(err.to_string(), "Oracle timed out after 1s");
        server.abort();
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let client = OpenAICompatibleClient::new("nowhere", None, "http://127.0.0.1:9/v1", "m");
        let request = OracleRequest {
            messages: vec![Message::user("hi")],
            options: OracleOptions::default(),
        };

        let err = client.complete(&request).await.unwrap_err();
        assert!(err.is_transport());
    }
}
