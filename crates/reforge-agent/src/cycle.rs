//! Transform Attempt Cycle
//!
//! Drives one file through `Pending -> Attempting -> Sanitizing -> Validating` until it is
//! verified or the attempt bound runs out. The two oracle calls are the only suspension points,
//! each under its own timeout. The shared manifest is written once, at the Verified transition.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reforge_core::rules::rule_set;
use reforge_core::{
    sanitize, Manifest, ManifestUpdate, OracleError, OrchestrationStats, ProjectContext,
    ResolvedOptions, SourceFile, TransformAttempt, TransformResult, ValidationOutcome,
};

use crate::compiler::{tolerate_missing_modules, CompilerOracle};
use crate::config::ReforgeConfig;
use crate::oracle::{OracleClient, OracleOptions, OracleResult};
use crate::prompt::Conversation;

/// Manifest handle shared by every cycle of a run
pub type SharedManifest = Arc<RwLock<Manifest>>;

/// Lifecycle of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleState {
    Pending,
    Attempting,
    Sanitizing,
    Validating,
    Retrying,
    Verified,
    Exhausted,
}

impl CycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CycleState::Verified | CycleState::Exhausted)
    }

    pub fn can_transition_to(self, next: CycleState) -> bool {
        use CycleState::*;
        matches!(
            (self, next),
            (Pending, Attempting)
                | (Attempting, Sanitizing)
                // oracle unreachable: placeholder
                | (Attempting, Exhausted)
                | (Sanitizing, Validating)
                | (Sanitizing, Retrying)
                | (Sanitizing, Exhausted)
                | (Validating, Verified)
                | (Validating, Retrying)
                | (Validating, Exhausted)
                | (Retrying, Attempting)
        )
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-run knobs the cycle needs besides the resolved options
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub oracle_timeout: Duration,
    pub compiler_timeout: Duration,
    pub max_tokens: Option<u32>,
    pub model_hints: HashMap<String, String>,
    pub streaming: bool,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            oracle_timeout: Duration::from_secs(120),
            compiler_timeout: Duration::from_secs(60),
            max_tokens: None,
            model_hints: HashMap::new(),
            streaming: false,
        }
    }
}

impl CycleSettings {
    pub fn from_config(config: &ReforgeConfig) -> Self {
        Self {
            oracle_timeout: config.oracle.timeout(),
            compiler_timeout: config.compiler.timeout(),
            max_tokens: Some(config.oracle.max_tokens),
            model_hints: config.oracle.model_hints.clone(),
            streaming: config.oracle.streaming,
        }
    }
}

/// Everything a cycle borrows from the run
#[derive(Debug, Clone)]
pub struct CycleEnv {
    pub oracle: OracleClient,
    pub compiler: Arc<dyn CompilerOracle>,
    pub context: Arc<ProjectContext>,
    pub manifest: SharedManifest,
    pub settings: Arc<CycleSettings>,
}

/// Counters for one finished cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub attempts: u32,
    pub verified: bool,
    pub exhausted: bool,
    pub placeholder: bool,
}

impl CycleStats {
    pub fn accumulate(&self, stats: &mut OrchestrationStats) {
        stats.total_attempts += u64::from(self.attempts);
        if self.verified {
            stats.verified += 1;
        }
        if self.placeholder {
            stats.placeholders += 1;
        } else if self.exhausted {
            stats.exhausted += 1;
        }
    }
}

/// Terminal record of one cycle
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub result: TransformResult,
    pub attempts: Vec<TransformAttempt>,
    pub final_state: CycleState,
    pub transitions: Vec<(CycleState, CycleState)>,
    pub manifest_update: Option<ManifestUpdate>,
}

impl CycleOutcome {
    pub fn stats(&self) -> CycleStats {
        CycleStats {
            attempts: self.result.attempts,
            verified: self.result.verified,
            exhausted: self.final_state == CycleState::Exhausted,
            placeholder: self.result.placeholder,
        }
    }
}

/// One file's attempt cycle
#[derive(Debug)]
pub struct AttemptCycle {
    file: SourceFile,
    options: ResolvedOptions,
    env: CycleEnv,
    state: CycleState,
    transitions: Vec<(CycleState, CycleState)>,
}

impl AttemptCycle {
    pub fn new(file: SourceFile, options: ResolvedOptions, env: CycleEnv) -> Self {
        Self {
            file,
            options,
            env,
            state: CycleState::Pending,
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    fn advance(&mut self, next: CycleState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!("{}: {} -> {}", self.file.path, self.state, next);
        self.transitions.push((self.state, next));
        self.state = next;
    }

    /// Run to a terminal state. `snapshot` is the manifest view used in the prompt.
    ///
    /// Transport failures of the Transformation Oracle end in the placeholder. Rejected or
    /// malformed oracle responses are returned as errors.
    pub async fn run(mut self, snapshot: Arc<Manifest>) -> Result<CycleOutcome, OracleError> {
        let direction = self.options.direction;
        let target = direction.target();
        let shadow = rule_set(direction).shadow;
        let output_path = self.file.output_path(direction);
        let max_attempts = self.options.max_attempts;

        let mut conversation =
            Conversation::for_file(&self.file, &self.options, &self.env.context, &snapshot);
        let oracle_options = OracleOptions::from_resolved(
            &self.options,
            &self.env.settings.model_hints,
            self.env.settings.max_tokens,
        );
        let mut attempts: Vec<TransformAttempt> = Vec::new();

        for attempt_number in 1..=max_attempts {
            self.advance(CycleState::Attempting);

            let raw_output = match self.call_oracle(&conversation, &oracle_options).await {
                Ok(raw) => raw,
                Err(err) if err.is_transport() => {
                    tracing::warn!(
                        "{}: transformation oracle unavailable ({}), writing placeholder",
                        self.file.path,
                        err
                    );
                    self.advance(CycleState::Exhausted);
                    return Ok(self.placeholder(attempt_number, attempts, &output_path, &err));
                }
                Err(err) => return Err(err),
            };

            self.advance(CycleState::Sanitizing);
            let sanitized_output = sanitize(&raw_output, direction);

            let validation = if raw_output.trim().is_empty() {
                ValidationOutcome::failed("The response was empty.")
            } else if sanitized_output.is_empty() {
                ValidationOutcome::failed(format!(
                    "The response contained no {} code. Answer with the code only.",
                    target
                ))
            } else {
                self.advance(CycleState::Validating);
                self.call_compiler(&sanitized_output, shadow).await?
            };

            let attempt = TransformAttempt {
                attempt_number,
                raw_output,
                sanitized_output,
                validation,
            };

            if attempt.validation.success {
                self.advance(CycleState::Verified);
                let update = self.env.manifest.write().record(
                    &self.file.content,
                    &attempt.sanitized_output,
                    &output_path,
                );
                if let ManifestUpdate::AlreadyMapped {
                    source,
                    existing,
                    proposed,
                } = &update
                {
                    tracing::debug!(
                        "{}: '{}' already maps to '{}', keeping it over '{}'",
                        self.file.path,
                        source,
                        existing,
                        proposed
                    );
                }

                let result = TransformResult {
                    path: self.file.path.clone(),
                    output_path,
                    content: attempt.sanitized_output.clone(),
                    verified: true,
                    attempts: attempt_number,
                    placeholder: false,
                    digest: self.file.digest(),
                };
                attempts.push(attempt);
                return Ok(self.finish(result, attempts, Some(update)));
            }

            tracing::debug!(
                "{}: attempt {}/{} failed: {}",
                self.file.path,
                attempt_number,
                max_attempts,
                attempt.validation.diagnostic.as_deref().unwrap_or("")
            );
            conversation.record_failure(&attempt);
            attempts.push(attempt);

            if attempt_number < max_attempts {
                self.advance(CycleState::Retrying);
            }
        }

        self.advance(CycleState::Exhausted);
        tracing::warn!(
            "{}: not verified after {} attempts",
            self.file.path,
            max_attempts
        );

        let content = attempts
            .iter()
            .rev()
            .map(|a| a.sanitized_output.as_str())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string();

        let result = TransformResult {
            path: self.file.path.clone(),
            output_path,
            content,
            verified: false,
            attempts: max_attempts,
            placeholder: false,
            digest: self.file.digest(),
        };
        Ok(self.finish(result, attempts, None))
    }

    async fn call_oracle(
        &self,
        conversation: &Conversation,
        options: &OracleOptions,
    ) -> OracleResult<String> {
        let limit = self.env.settings.oracle_timeout;
        let request = conversation.request(options.clone());

        match tokio::time::timeout(
            limit,
            self.env.oracle.complete(&request, self.env.settings.streaming),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(limit.as_secs())),
        }
    }

    /// Compiler outages become failed attempts; other compiler errors escape. Failures that only
    /// name unresolvable external modules pass, whichever oracle reported them.
    async fn call_compiler(&self, code: &str, shadow: &str) -> OracleResult<ValidationOutcome> {
        let limit = self.env.settings.compiler_timeout;
        let target = self.options.direction.target();

        let result = match tokio::time::timeout(
            limit,
            self.env.compiler.validate(code, shadow, target),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(limit.as_secs())),
        };

        match result {
            Ok(outcome) => Ok(tolerate_missing_modules(outcome)),
            Err(err) if err.is_transport() => {
                tracing::warn!("{}: compiler oracle unavailable: {}", self.file.path, err);
                Ok(ValidationOutcome::failed(format!(
                    "Compiler oracle unavailable: {}",
                    err
                )))
            }
            Err(err) => Err(err),
        }
    }

    fn placeholder(
        self,
        attempt_number: u32,
        attempts: Vec<TransformAttempt>,
        output_path: &str,
        err: &OracleError,
    ) -> CycleOutcome {
        let content = self.env.oracle.placeholder().render(
            &self.file,
            self.options.direction,
            &err.to_string(),
        );
        let result = TransformResult {
            path: self.file.path.clone(),
            output_path: output_path.to_string(),
            content,
            verified: false,
            attempts: attempt_number,
            placeholder: true,
            digest: self.file.digest(),
        };
        self.finish(result, attempts, None)
    }

    fn finish(
        self,
        result: TransformResult,
        attempts: Vec<TransformAttempt>,
        manifest_update: Option<ManifestUpdate>,
    ) -> CycleOutcome {
        CycleOutcome {
            result,
            attempts,
            final_state: self.state,
            transitions: self.transitions,
            manifest_update,
        }
    }
}
