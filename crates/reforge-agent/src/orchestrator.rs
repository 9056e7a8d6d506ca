//! Orchestrator - one conversion run over a batch of files
//!
//! ```text
//! files ──> ProjectContext::summarize ──> FileClassifier
//!                                            │
//!              ┌─────────────────────────────┴───────────────┐
//!              v                                             v
//!   sequential lane (input order,              parallel lane (JoinSet, bounded
//!   fresh manifest snapshot per file)          by a semaphore, one shared snapshot)
//!              └─────────────────────────────┬───────────────┘
//!                                            v
//!                               Global Synthesis Pass (once)
//!                                            v
//!                                       BatchResult
//! ```
//!
//! Every input file ends up either in `results` or in `errors`, never both and never neither.

use futures::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use reforge_core::types::now;
use reforge_core::{
    synthesize, BatchResult, FileClassifier, FileError, Manifest, OracleError,
    OrchestrationStats, ProjectContext, ReforgeError, ResolvedOptions, Result, SourceFile,
    TransformOptions, TransformResult, DEFAULT_SEQUENTIAL_THRESHOLD,
};

use crate::compiler::{compiler_from_settings, CompilerOracle};
use crate::config::{ReforgeConfig, DEFAULT_MAX_CONCURRENCY};
use crate::cycle::{AttemptCycle, CycleEnv, CycleOutcome, CycleSettings};
use crate::oracle::OracleClient;

/// What a cycle task hands back: a finished cycle, an escaped oracle error, or a panic
type CycleReport = std::thread::Result<std::result::Result<CycleOutcome, OracleError>>;

/// Drives a whole batch through both lanes and the synthesis pass
#[derive(Debug, Clone)]
pub struct Orchestrator {
    oracle: OracleClient,
    compiler: Arc<dyn CompilerOracle>,
    settings: Arc<CycleSettings>,
    defaults: TransformOptions,
    sequential_threshold: u32,
    max_concurrency: usize,
}

impl Orchestrator {
    pub fn new(oracle: OracleClient, compiler: Arc<dyn CompilerOracle>) -> Self {
        Self {
            oracle,
            compiler,
            settings: Arc::new(CycleSettings::default()),
            defaults: TransformOptions::default(),
            sequential_threshold: DEFAULT_SEQUENTIAL_THRESHOLD,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Build oracles and settings from configuration
    pub fn from_config(config: &ReforgeConfig) -> Result<Self> {
        config.validate()?;

        let oracle = OracleClient::from_settings(&config.oracle)?;
        let compiler = compiler_from_settings(&config.compiler)?;

        Ok(Self::new(oracle, compiler)
            .with_settings(CycleSettings::from_config(config))
            .with_defaults(config.effective_defaults())
            .with_sequential_threshold(config.pipeline.sequential_threshold)
            .with_max_concurrency(config.pipeline.max_concurrency))
    }

    pub fn with_settings(mut self, settings: CycleSettings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    /// Options used where a call leaves a field unset
    pub fn with_defaults(mut self, defaults: TransformOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_sequential_threshold(mut self, threshold: u32) -> Self {
        self.sequential_threshold = threshold;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn oracle(&self) -> &OracleClient {
        &self.oracle
    }

    /// Convert a batch. Only invalid options fail the whole call; per-file failures land in
    /// `BatchResult::errors`.
    pub async fn run(&self, files: Vec<SourceFile>, options: &TransformOptions) -> Result<BatchResult> {
        let run_id = Uuid::new_v4();
        let started_at = now();
        let resolved = options.merged_over(&self.defaults).resolve()?;

        tracing::info!(
            "Run {}: {} files, {} via {} (max {} attempts)",
            run_id,
            files.len(),
            resolved.direction,
            self.oracle.name(),
            resolved.max_attempts
        );

        let env = CycleEnv {
            oracle: self.oracle.clone(),
            compiler: self.compiler.clone(),
            context: Arc::new(ProjectContext::summarize(&files)),
            manifest: Arc::new(RwLock::new(Manifest::new())),
            settings: self.settings.clone(),
        };

        let classifier = FileClassifier::new(self.sequential_threshold);
        let (sequential, parallel): (Vec<_>, Vec<_>) = files
            .iter()
            .cloned()
            .enumerate()
            .partition(|(_, file)| classifier.is_sequential(file));

        let mut stats = OrchestrationStats {
            total_files: files.len(),
            sequential_files: sequential.len(),
            parallel_files: parallel.len(),
            ..Default::default()
        };
        let mut slots: Vec<Option<std::result::Result<TransformResult, FileError>>> =
            vec![None; files.len()];

        tracing::info!("Sequential lane: {} files", sequential.len());
        for (index, file) in sequential {
            let path = file.path.clone();
            let snapshot = Arc::new(env.manifest.read().clone());
            let report = run_isolated(file, resolved.clone(), env.clone(), snapshot).await;
            slots[index] = Some(settle(&path, report, &mut stats));
        }

        tracing::info!(
            "Parallel lane: {} files, concurrency {}",
            parallel.len(),
            self.max_concurrency
        );
        self.run_parallel(parallel, &resolved, &env, &mut slots, &mut stats)
            .await;

        let mut results = Vec::new();
        let mut errors = Vec::new();
        for (file, slot) in files.iter().zip(slots) {
            match slot {
                Some(Ok(result)) => results.push(result),
                Some(Err(error)) => errors.push(error),
                None => errors.push(task_failure(&file.path, "no outcome recorded")),
            }
        }
        stats.errors = errors.len();

        let manifest = env.manifest.read().clone();
        let synthesis = synthesize(&mut results, &manifest, resolved.direction);

        let finished_at = now();
        tracing::info!(
            "Run {} finished: {} verified, {} exhausted, {} placeholders, {} errors, {} renames",
            run_id,
            stats.verified,
            stats.exhausted,
            stats.placeholders,
            stats.errors,
            synthesis.renames_applied
        );

        Ok(BatchResult {
            run_id,
            success: errors.is_empty(),
            direction: resolved.direction,
            results,
            errors,
            manifest,
            stats,
            started_at,
            finished_at,
        })
    }

    async fn run_parallel(
        &self,
        files: Vec<(usize, SourceFile)>,
        resolved: &ResolvedOptions,
        env: &CycleEnv,
        slots: &mut [Option<std::result::Result<TransformResult, FileError>>],
        stats: &mut OrchestrationStats,
    ) {
        if files.is_empty() {
            return;
        }

        let snapshot = Arc::new(env.manifest.read().clone());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut pending: BTreeSet<usize> = BTreeSet::new();
        let mut paths = vec![String::new(); slots.len()];
        let mut join_set = JoinSet::new();

        for (index, file) in files {
            pending.insert(index);
            paths[index] = file.path.clone();

            let semaphore = semaphore.clone();
            let snapshot = snapshot.clone();
            let resolved = resolved.clone();
            let env = env.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, run_isolated(file, resolved, env, snapshot).await)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, report)) => {
                    pending.remove(&index);
                    slots[index] = Some(settle(&paths[index], report, stats));
                }
                Err(e) => tracing::warn!("Parallel task ended abnormally: {}", e),
            }
        }

        for index in pending {
            let path = &paths[index];
            tracing::warn!("{}: task ended without an outcome", path);
            slots[index] = Some(Err(task_failure(path, "task cancelled")));
        }
    }
}

/// Run one cycle, turning a panic into a value
async fn run_isolated(
    file: SourceFile,
    resolved: ResolvedOptions,
    env: CycleEnv,
    snapshot: Arc<Manifest>,
) -> CycleReport {
    AssertUnwindSafe(AttemptCycle::new(file, resolved, env).run(snapshot))
        .catch_unwind()
        .await
}

/// Map a cycle report to a result or an error entry
fn settle(
    path: &str,
    report: CycleReport,
    stats: &mut OrchestrationStats,
) -> std::result::Result<TransformResult, FileError> {
    match report {
        Ok(Ok(outcome)) => {
            outcome.stats().accumulate(stats);
            Ok(outcome.result)
        }
        Ok(Err(error)) => {
            tracing::warn!("{}: {}", path, error);
            Err(FileError {
                path: path.to_string(),
                error: ReforgeError::Oracle(error).to_string(),
            })
        }
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            tracing::warn!("{}: cycle panicked: {}", path, reason);
            Err(task_failure(path, &reason))
        }
    }
}

fn task_failure(path: &str, reason: &str) -> FileError {
    FileError {
        path: path.to_string(),
        error: ReforgeError::TaskFailed {
            path: path.to_string(),
            reason: reason.to_string(),
        }
        .to_string(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
