use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use reforge_core::{Language, OracleError, ValidationOutcome};
use reforge_sandbox::Sandbox;

use super::CompilerOracle;
use crate::config::CompilerSettings;
use crate::oracle::OracleResult;

/// Local toolchain run inside a throwaway sandbox
///
/// The candidate and the shadow definitions are written as sibling files; `{source}` and
/// `{shadow}` in the argument list are replaced by their file names.
#[derive(Debug, Clone)]
pub struct CommandCompilerOracle {
    command: Option<String>,
    args: Vec<String>,
    source_file_name: Option<String>,
    shadow_file_name: Option<String>,
    timeout: Duration,
}

struct Toolchain {
    command: String,
    args: Vec<String>,
    source_file_name: String,
    shadow_file_name: String,
}

impl CommandCompilerOracle {
    /// Per-language default toolchains
    pub fn new(timeout: Duration) -> Self {
        Self {
            command: None,
            args: Vec::new(),
            source_file_name: None,
            shadow_file_name: None,
            timeout,
        }
    }

    pub fn from_settings(settings: &CompilerSettings) -> Self {
        Self {
            command: settings.command.clone(),
            args: settings.args.clone(),
            source_file_name: settings.source_file_name.clone(),
            shadow_file_name: settings.shadow_file_name.clone(),
            timeout: settings.timeout(),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>, args: Vec<String>) -> Self {
        self.command = Some(command.into());
        self.args = args;
        self
    }

    pub fn with_file_names(mut self, source: impl Into<String>, shadow: impl Into<String>) -> Self {
        self.source_file_name = Some(source.into());
        self.shadow_file_name = Some(shadow.into());
        self
    }

    fn toolchain(&self, target: Language) -> Toolchain {
        let ext = target.extension();
        let source_file_name = self
            .source_file_name
            .clone()
            .unwrap_or_else(|| format!("Candidate.{}", ext));
        let shadow_file_name = self
            .shadow_file_name
            .clone()
            .unwrap_or_else(|| format!("Shadow.{}", ext));

        let (command, template) = match &self.command {
            Some(command) => (command.clone(), self.args.clone()),
            None => match target {
                Language::Swift => (
                    "swiftc".to_string(),
                    vec!["-parse".into(), "{shadow}".into(), "{source}".into()],
                ),
                _ => (
                    "kotlinc".to_string(),
                    vec!["{shadow}".into(), "{source}".into(), "-d".into(), "out".into()],
                ),
            },
        };

        let args = template
            .iter()
            .map(|arg| {
                arg.replace("{source}", &source_file_name)
                    .replace("{shadow}", &shadow_file_name)
            })
            .collect();

        Toolchain {
            command,
            args,
            source_file_name,
            shadow_file_name,
        }
    }
}

#[async_trait]
impl CompilerOracle for CommandCompilerOracle {
    fn name(&self) -> &str {
        self.command.as_deref().unwrap_or("toolchain")
    }

    async fn validate(
        &self,
        code: &str,
        shadow: &str,
        target: Language,
    ) -> OracleResult<ValidationOutcome> {
        let toolchain = self.toolchain(target);

        let sandbox = Sandbox::new()
            .map_err(|e| OracleError::Unreachable(format!("sandbox unavailable: {}", e)))?;
        sandbox
            .prepare(&[
                (PathBuf::from(&toolchain.source_file_name), code.to_string()),
                (PathBuf::from(&toolchain.shadow_file_name), shadow.to_string()),
            ])
            .map_err(|e| OracleError::Unreachable(format!("sandbox unavailable: {}", e)))?;

        tracing::debug!(
            "Validating with {} {}",
            toolchain.command,
            toolchain.args.join(" ")
        );

        let result = sandbox
            .run_with_timeout(&toolchain.command, &toolchain.args, self.timeout)
            .await
            .map_err(|e| {
                OracleError::Unreachable(format!("failed to run '{}': {}", toolchain.command, e))
            })?;

        if result.timed_out {
            return Err(OracleError::Timeout(self.timeout.as_secs()));
        }

        let outcome = if result.success {
            ValidationOutcome::passed()
        } else {
            let diagnostic = result.combined_output();
            ValidationOutcome::failed(if diagnostic.is_empty() {
                format!("'{}' exited with code {}", toolchain.command, result.exit_code)
            } else {
                diagnostic
            })
        };

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_toolchains() {
        let oracle = CommandCompilerOracle::new(Duration::from_secs(5));

        let swift = oracle.toolchain(Language::Swift);
        assert_eq!(swift.command, "swiftc");
        assert_eq!(swift.args, vec!["-parse", "Shadow.swift", "Candidate.swift"]);

        let kotlin = oracle.toolchain(Language::Kotlin);
        assert_eq!(kotlin.command, "kotlinc");
        assert_eq!(kotlin.args[..2], ["Shadow.kt".to_string(), "Candidate.kt".to_string()]);
    }

    #[tokio::test]
    async fn test_passing_command() {
        let oracle = CommandCompilerOracle::new(Duration::from_secs(10))
            .with_command("sh", vec!["-c".into(), "test -s {source} && test -s {shadow}".into()]);

        let outcome = oracle
            .validate("struct A {}", "protocol View {}", Language::Swift)
            .await
            .unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn test_failing_command_reports_diagnostic() {
        let oracle = CommandCompilerOracle::new(Duration::from_secs(10)).with_command(
            "sh",
            vec!["-c".into(), "echo \"{source}:1: error: expected '}'\" >&2; exit 1".into()],
        );

        let outcome = oracle
            .validate("struct A {", "", Language::Swift)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome
            .diagnostic
            .unwrap()
            .contains("Candidate.swift:1: error: expected"));
    }

    #[tokio::test]
    async fn test_missing_module_diagnostic_is_reported() {
        let oracle = CommandCompilerOracle::new(Duration::from_secs(10)).with_command(
            "sh",
            vec!["-c".into(), "echo \"error: no such module 'Alamofire'\" >&2; exit 1".into()],
        );

        let outcome = oracle
            .validate("import Alamofire", "", Language::Swift)
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(crate::compiler::is_module_only_diagnostic(&outcome.diagnostic.unwrap()));
    }

    #[tokio::test]
    async fn test_missing_toolchain_is_transport_error() {
        let oracle = CommandCompilerOracle::new(Duration::from_secs(5))
            .with_command("reforge-no-such-compiler", Vec::new());

        let err = oracle
            .validate("struct A {}", "", Language::Swift)
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_timeout() {
        let oracle = CommandCompilerOracle::new(Duration::from_millis(200))
            .with_command("sh", vec!["-c".into(), "sleep 5".into()]);

        let err = oracle
            .validate("struct A {}", "", Language::Swift)
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Timeout(_)));
    }
}
