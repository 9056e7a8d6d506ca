//! Reforge Agent - oracles, attempt cycle and orchestration
//!
//! The async half of Reforge. [`Orchestrator::run`] takes a batch of [`SourceFile`]s and drives
//! each one through an [`AttemptCycle`]: ask the Transformation Oracle, sanitize, check with the
//! Compiler Oracle, repair with the diagnostic, and record verified names in the shared manifest.
//! After both lanes finish, the global synthesis pass makes every file agree on those names.
//!
//! # Example
//!
//! ```no_run
//! use reforge_agent::{ReforgeConfig, Orchestrator};
//! use reforge_core::{SourceFile, TransformOptions};
//!
//! # async fn demo() -> reforge_core::Result<()> {
//! let config = ReforgeConfig::load(None)?;
//! let orchestrator = Orchestrator::from_config(&config)?;
//!
//! let files = vec![SourceFile::new("User.kt", "data class User(val id: String)")];
//! let batch = orchestrator.run(files, &TransformOptions::default()).await?;
//! assert!(batch.accounts_for(1));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod compiler;
pub mod config;
pub mod cycle;
pub mod oracle;
pub mod orchestrator;
pub mod prompt;

pub use compiler::{
    compiler_from_settings, AcceptAllCompiler, CommandCompilerOracle, CompilerOracle,
    RemoteCompilerOracle,
};
pub use config::{
    CompilerMode, CompilerSettings, OracleMode, OracleSettings, PipelineSettings,
    ProviderSettings, ReforgeConfig,
};
pub use cycle::{
    AttemptCycle, CycleEnv, CycleOutcome, CycleSettings, CycleState, CycleStats, SharedManifest,
};
pub use oracle::{
    collect_stream, DeterministicFallback, Message, MessageRole, OpenAICompatibleClient,
    OracleClient, OracleOptions, OracleRequest, OracleResponse, OracleResult, ProviderRouter,
    StreamEvent, TokenStream, TransformationOracle,
};
pub use orchestrator::Orchestrator;
pub use prompt::Conversation;

pub use reforge_core::SourceFile;
