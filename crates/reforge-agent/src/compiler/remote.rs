use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use reforge_core::{Language, OracleError, ValidationOutcome};

use super::CompilerOracle;
use crate::oracle::OracleResult;

/// Validation service reached over HTTP
#[derive(Debug, Clone)]
pub struct RemoteCompilerOracle {
    endpoint: String,
    timeout: Duration,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ValidateRequest<'a> {
    code: &'a str,
    shadow: &'a str,
    language: Language,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    success: bool,
    #[serde(default)]
    diagnostic: Option<String>,
}

impl RemoteCompilerOracle {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CompilerOracle for RemoteCompilerOracle {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn validate(
        &self,
        code: &str,
        shadow: &str,
        target: Language,
    ) -> OracleResult<ValidationOutcome> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&ValidateRequest {
                code,
                shadow,
                language: target,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(self.timeout.as_secs())
                } else {
                    OracleError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Unreachable(format!("HTTP {}: {}", status, body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let verdict: ValidateResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(format!("compiler response: {}", e)))?;

        let outcome = if verdict.success {
            ValidationOutcome::passed()
        } else {
            ValidationOutcome::failed(
                verdict
                    .diagnostic
                    .unwrap_or_else(|| "validation failed without a diagnostic".to_string()),
            )
        };

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(ValidateRequest {
            code: "struct A {}",
            shadow: "protocol View {}",
            language: Language::Swift,
        })
        .unwrap();
        assert_eq!(body["language"], "swift");
        assert_eq!(body["code"], "struct A {}");
    }

    #[test]
    fn test_response_without_diagnostic() {
        let verdict: ValidateResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(verdict.success);
        assert!(verdict.diagnostic.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let oracle = RemoteCompilerOracle::new("http://127.0.0.1:9/validate", Duration::from_secs(5));
        let err = oracle
            .validate("struct A {}", "", Language::Swift)
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }
}
