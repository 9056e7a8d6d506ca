//! Reforge configuration
//!
//! One JSON or TOML file (chosen by extension) with three sections, overlaid by `REFORGE_*`
//! environment variables. Every field has a default, so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use reforge_core::{
    Direction, ReforgeError, Result, ResultExt, TransformOptions, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_SEQUENTIAL_THRESHOLD,
};

/// Default parallel-lane concurrency
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReforgeConfig {
    pub oracle: OracleSettings,
    pub compiler: CompilerSettings,
    pub pipeline: PipelineSettings,
}

impl ReforgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_oracle(mut self, oracle: OracleSettings) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_compiler(mut self, compiler: CompilerSettings) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineSettings) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Load a JSON or TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;

        let config: Self = if is_toml(path) {
            toml::from_str(&content).map_err(|e| {
                ReforgeError::Configuration(format!("{}: {}", path.display(), e))
            })?
        } else {
            serde_json::from_str(&content)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save to a JSON or TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string_pretty(self)
                .map_err(|e| ReforgeError::Configuration(e.to_string()))?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Defaults overlaid by the process environment
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env()
    }

    /// File (when given) then environment overlay
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.apply_env()
    }

    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay `REFORGE_*` variables from an arbitrary lookup
    pub fn apply_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(mode) = lookup("REFORGE_ORACLE_MODE") {
            self.oracle.mode = match mode.to_ascii_lowercase().as_str() {
                "remote" => OracleMode::Remote,
                "fallback" => OracleMode::Fallback,
                other => {
                    return Err(ReforgeError::Configuration(format!(
                        "REFORGE_ORACLE_MODE: unknown mode '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(secs) = lookup("REFORGE_ORACLE_TIMEOUT_SECS") {
            self.oracle.timeout_secs = parse_env("REFORGE_ORACLE_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("REFORGE_PROVIDER_TIMEOUT_SECS") {
            self.oracle.provider_timeout_secs =
                Some(parse_env("REFORGE_PROVIDER_TIMEOUT_SECS", &secs)?);
        }
        if let Some(value) = lookup("REFORGE_STREAMING") {
            self.oracle.streaming = value == "1" || value.eq_ignore_ascii_case("true");
        }
        if let Some(mode) = lookup("REFORGE_COMPILER_MODE") {
            self.compiler.mode = match mode.to_ascii_lowercase().as_str() {
                "command" => CompilerMode::Command,
                "remote" => CompilerMode::Remote,
                "disabled" => CompilerMode::Disabled,
                other => {
                    return Err(ReforgeError::Configuration(format!(
                        "REFORGE_COMPILER_MODE: unknown mode '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(endpoint) = lookup("REFORGE_COMPILER_ENDPOINT") {
            self.compiler.endpoint = Some(endpoint);
        }
        if let Some(value) = lookup("REFORGE_MAX_ATTEMPTS") {
            self.pipeline.max_attempts = parse_env("REFORGE_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = lookup("REFORGE_SEQUENTIAL_THRESHOLD") {
            self.pipeline.sequential_threshold = parse_env("REFORGE_SEQUENTIAL_THRESHOLD", &value)?;
        }
        if let Some(value) = lookup("REFORGE_MAX_CONCURRENCY") {
            self.pipeline.max_concurrency = parse_env("REFORGE_MAX_CONCURRENCY", &value)?;
        }
        if let Some(value) = lookup("REFORGE_DIRECTION") {
            self.pipeline.defaults.direction = Some(value.parse::<Direction>()?);
        }
        if let Some(value) = lookup("REFORGE_MODEL") {
            self.pipeline.defaults.model = Some(value);
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_attempts == 0 {
            return Err(ReforgeError::Configuration(
                "pipeline.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.pipeline.max_concurrency == 0 {
            return Err(ReforgeError::Configuration(
                "pipeline.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.compiler.mode == CompilerMode::Remote && self.compiler.endpoint.is_none() {
            return Err(ReforgeError::Configuration(
                "compiler.endpoint is required when compiler.mode = remote".to_string(),
            ));
        }
        Ok(())
    }

    /// Pipeline defaults with the configured attempt bound filled in
    pub fn effective_defaults(&self) -> TransformOptions {
        let mut defaults = self.pipeline.defaults.clone();
        defaults.max_attempts = defaults.max_attempts.or(Some(self.pipeline.max_attempts));
        defaults
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false)
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ReforgeError::Configuration(format!("{}: invalid value '{}'", key, value)))
}

/// How the Transformation Oracle is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleMode {
    #[default]
    Remote,
    Fallback,
}

/// Transformation Oracle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub mode: OracleMode,
    /// Tried in order
    pub providers: Vec<ProviderSettings>,
    /// Model hint -> concrete model
    pub model_hints: HashMap<String, String>,
    pub timeout_secs: u64,
    /// Limit for a single provider call; unset splits `timeout_secs` across the providers
    pub provider_timeout_secs: Option<u64>,
    pub max_tokens: u32,
    pub streaming: bool,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            mode: OracleMode::Remote,
            providers: Vec::new(),
            model_hints: HashMap::new(),
            timeout_secs: 120,
            provider_timeout_secs: None,
            max_tokens: 4096,
            streaming: false,
        }
    }
}

impl OracleSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Per-provider limit, so a hung provider leaves time for the next one
    pub fn provider_timeout(&self, provider_count: usize) -> Duration {
        let secs = self
            .provider_timeout_secs
            .unwrap_or(self.timeout_secs / provider_count.max(1) as u64);
        Duration::from_secs(secs.max(1))
    }
}

/// One OpenAI-compatible endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    pub headers: HashMap<String, String>,
}

/// How candidates are validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompilerMode {
    /// Run a local toolchain in a sandbox
    #[default]
    Command,
    /// POST to a validation service
    Remote,
    /// Accept every non-empty candidate
    Disabled,
}

/// Compiler Oracle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    pub mode: CompilerMode,
    /// Overrides the per-language default toolchain
    pub command: Option<String>,
    /// `{source}` and `{shadow}` are replaced by the file names
    pub args: Vec<String>,
    pub source_file_name: Option<String>,
    pub shadow_file_name: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            mode: CompilerMode::Command,
            command: None,
            args: Vec::new(),
            source_file_name: None,
            shadow_file_name: None,
            endpoint: None,
            timeout_secs: 60,
        }
    }
}

impl CompilerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Orchestration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub max_attempts: u32,
    pub sequential_threshold: u32,
    pub max_concurrency: usize,
    /// Options applied when a call leaves a field unset
    pub defaults: TransformOptions,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            sequential_threshold: DEFAULT_SEQUENTIAL_THRESHOLD,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            defaults: TransformOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReforgeConfig::default();
        assert_eq!(config.oracle.mode, OracleMode::Remote);
        assert_eq!(config.oracle.timeout_secs, 120);
        assert_eq!(config.compiler.mode, CompilerMode::Command);
        assert_eq!(config.pipeline.max_attempts, 3);
        assert_eq!(config.pipeline.sequential_threshold, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reforge.json");
        std::fs::write(
            &path,
            r#"{"oracle":{"mode":"fallback"},"pipeline":{"max_concurrency":8,"defaults":{"preset":"swift-ui"}}}"#,
        )
        .unwrap();

        let config = ReforgeConfig::from_file(&path).unwrap();
        assert_eq!(config.oracle.mode, OracleMode::Fallback);
        assert_eq!(config.pipeline.max_concurrency, 8);
        assert_eq!(config.pipeline.max_attempts, 3);
        assert_eq!(
            config.pipeline.defaults.preset,
            Some(reforge_core::Preset::SwiftUi)
        );
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reforge.toml");
        let config = ReforgeConfig::default().with_oracle(OracleSettings {
            providers: vec![ProviderSettings {
                name: "local".into(),
                base_url: "http://localhost:11434/v1".into(),
                model: "qwen2.5-coder".into(),
                ..Default::default()
            }],
            ..Default::default()
        });

        config.to_file(&path).unwrap();
        let loaded = ReforgeConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_provider_timeout_splits_budget() {
        let mut oracle = OracleSettings::default();
        assert_eq!(oracle.provider_timeout(1), Duration::from_secs(120));
        assert_eq!(oracle.provider_timeout(3), Duration::from_secs(40));
        assert_eq!(oracle.provider_timeout(0), Duration::from_secs(120));

        oracle.timeout_secs = 1;
        assert_eq!(oracle.provider_timeout(4), Duration::from_secs(1));

        oracle.provider_timeout_secs = Some(15);
        assert_eq!(oracle.provider_timeout(4), Duration::from_secs(15));
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [
            ("REFORGE_ORACLE_MODE", "fallback"),
            ("REFORGE_MAX_ATTEMPTS", "5"),
            ("REFORGE_DIRECTION", "swift-to-kotlin"),
            ("REFORGE_COMPILER_MODE", "disabled"),
        ]
        .into_iter()
        .collect();

        let config = ReforgeConfig::default()
            .apply_env_with(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.oracle.mode, OracleMode::Fallback);
        assert_eq!(config.pipeline.max_attempts, 5);
        assert_eq!(config.compiler.mode, CompilerMode::Disabled);
        assert_eq!(
            config.effective_defaults().direction,
            Some(Direction::SwiftToKotlin)
        );
        assert_eq!(config.effective_defaults().max_attempts, Some(5));
    }

    #[test]
    fn test_invalid_env_is_rejected() {
        let result = ReforgeConfig::default().apply_env_with(|key| {
            (key == "REFORGE_MAX_CONCURRENCY").then(|| "many".to_string())
        });
        assert!(result.is_err());

        let result = ReforgeConfig::default()
            .apply_env_with(|key| (key == "REFORGE_MAX_ATTEMPTS").then(|| "0".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_remote_compiler_requires_endpoint() {
        let config = ReforgeConfig::default().with_compiler(CompilerSettings {
            mode: CompilerMode::Remote,
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }
}
