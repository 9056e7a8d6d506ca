//! Compiler Oracle
//!
//! Checks a sanitized candidate against the target toolchain. Implementations must accept
//! arbitrary text: garbage in is a failed validation, never a panic.

pub mod command;
pub mod remote;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use reforge_core::rules::MODULE_NOT_FOUND;
use reforge_core::{Language, ValidationOutcome};

use crate::config::{CompilerMode, CompilerSettings};
use crate::oracle::OracleResult;
pub use command::CommandCompilerOracle;
pub use remote::RemoteCompilerOracle;

/// Syntax/type validation contract
#[async_trait]
pub trait CompilerOracle: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Validate `code` next to the `shadow` stub definitions
    async fn validate(
        &self,
        code: &str,
        shadow: &str,
        target: Language,
    ) -> OracleResult<ValidationOutcome>;
}

/// True when every error line only complains about an unresolvable external module
pub fn is_module_only_diagnostic(diagnostic: &str) -> bool {
    let lines: Vec<&str> = diagnostic
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let error_lines: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| l.to_ascii_lowercase().contains("error"))
        .collect();

    let relevant = if error_lines.is_empty() { lines } else { error_lines };
    !relevant.is_empty() && relevant.iter().all(|l| MODULE_NOT_FOUND.is_match(l))
}

/// Turn a module-only failure into a pass
pub fn tolerate_missing_modules(outcome: ValidationOutcome) -> ValidationOutcome {
    match &outcome.diagnostic {
        Some(diagnostic) if !outcome.success && is_module_only_diagnostic(diagnostic) => {
            tracing::debug!("Ignoring unresolved external modules: {}", diagnostic.trim());
            ValidationOutcome::passed()
        }
        _ => outcome,
    }
}

/// Validation disabled: any non-empty candidate passes
#[derive(Debug, Clone, Default)]
pub struct AcceptAllCompiler;

#[async_trait]
impl CompilerOracle for AcceptAllCompiler {
    fn name(&self) -> &str {
        "accept-all"
    }

    async fn validate(
        &self,
        code: &str,
        _shadow: &str,
        _target: Language,
    ) -> OracleResult<ValidationOutcome> {
        if code.trim().is_empty() {
            Ok(ValidationOutcome::failed("empty candidate"))
        } else {
            Ok(ValidationOutcome::passed())
        }
    }
}

/// Build the configured Compiler Oracle
pub fn compiler_from_settings(
    settings: &CompilerSettings,
) -> reforge_core::Result<Arc<dyn CompilerOracle>> {
    let compiler: Arc<dyn CompilerOracle> = match settings.mode {
        CompilerMode::Command => Arc::new(CommandCompilerOracle::from_settings(settings)),
        CompilerMode::Remote => {
            let endpoint = settings.endpoint.clone().ok_or_else(|| {
                crate::oracle::configuration_error("compiler.endpoint is required in remote mode")
            })?;
            Arc::new(RemoteCompilerOracle::new(endpoint, settings.timeout()))
        }
        CompilerMode::Disabled => Arc::new(AcceptAllCompiler),
    };

    tracing::info!("Compiler oracle: {}", compiler.name());
    Ok(compiler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_only_diagnostic() {
        assert!(is_module_only_diagnostic(
            "Candidate.swift:1:8: error: no such module 'Alamofire'\nimport Alamofire\n       ^"
        ));
        assert!(is_module_only_diagnostic(
            "error: unresolved reference: androidx\nerror: unresolved reference androidx"
        ));
        assert!(!is_module_only_diagnostic(
            "error: no such module 'Alamofire'\nerror: expected '}' in struct"
        ));
        assert!(!is_module_only_diagnostic(""));
        assert!(!is_module_only_diagnostic("warning: unused variable 'x'"));
    }

    #[test]
    fn test_tolerate_missing_modules() {
        let outcome = ValidationOutcome::failed("error: no such module 'Kingfisher'");
        assert!(tolerate_missing_modules(outcome).success);

        let outcome = ValidationOutcome::failed("error: expected expression");
        assert!(!tolerate_missing_modules(outcome).success);
    }

    #[test]
    fn test_accept_all_compiler() {
        let compiler = AcceptAllCompiler;
        let accepted = tokio_test::block_on(compiler.validate("struct A {}", "", Language::Swift));
        assert!(accepted.unwrap().success);

        let rejected = tokio_test::block_on(compiler.validate("  \n", "", Language::Swift));
        assert!(!rejected.unwrap().success);
    }

    #[test]
    fn test_compiler_from_settings() {
        let disabled = CompilerSettings {
            mode: CompilerMode::Disabled,
            ..Default::default()
        };
        assert_eq!(compiler_from_settings(&disabled).unwrap().name(), "accept-all");

        let remote_without_endpoint = CompilerSettings {
            mode: CompilerMode::Remote,
            ..Default::default()
        };
        assert!(compiler_from_settings(&remote_without_endpoint).is_err());
    }
}
