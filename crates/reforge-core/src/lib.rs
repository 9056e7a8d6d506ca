//! Reforge Core - the synchronous engine behind a multi-file code conversion run
//!
//! Reforge converts a whole project from one language/framework to another by delegating each
//! file to a Transformation Oracle and checking the result with a Compiler Oracle. This crate
//! holds the pure parts of that pipeline; the async attempt cycle and orchestrator live in
//! `reforge-agent`.
//!
//! # Architecture
//!
//! 1. **Context** (`context`): per-file structural signals aggregated into one project context
//! 2. **Classifier** (`classifier`): sequential vs. parallel lane scoring
//! 3. **Sanitizer** (`sanitizer`): untrusted oracle text reduced to a code-only candidate
//! 4. **Manifest** (`manifest`): append-only source-to-target naming record
//! 5. **Synthesis** (`synthesis`): the final whole-batch rename and normalization pass
//!
//! All patterns live in one versioned rule table (`rules`).
//!
//! # Quick Start
//!
//! ```
//! use reforge_core::{sanitize, Direction, FileClassifier, ProjectContext, SourceFile};
//!
//! let files = vec![
//!     SourceFile::new("UserViewModel.kt", "class UserViewModel { val state: StateFlow<Int> }"),
//!     SourceFile::new("Colors.kt", "object Colors"),
//! ];
//!
//! let context = ProjectContext::summarize(&files);
//! assert_eq!(context.file_count, 2);
//!
//! let lanes = FileClassifier::default().classify(&files);
//! assert_eq!(lanes.sequential.len(), 1);
//!
//! let code = sanitize("```swift\nstruct Colors {}\n```", Direction::KotlinToSwift);
//! assert_eq!(code, "struct Colors {}");
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod classifier;
pub mod context;
pub mod error;
pub mod manifest;
pub mod rules;
pub mod sanitizer;
pub mod synthesis;
pub mod types;

// Re-export commonly used types for convenience
pub use classifier::{ClassificationResult, FileClassifier, DEFAULT_SEQUENTIAL_THRESHOLD};
pub use context::{FileSummary, ProjectContext};
pub use error::{OracleError, ReforgeError, Result, ResultExt};
pub use manifest::{extract_declared_type, Manifest, ManifestUpdate};
pub use rules::RULESET_VERSION;
pub use sanitizer::sanitize;
pub use synthesis::{synthesize, synthesize_content, SynthesisReport};
pub use types::{
    BatchResult, Direction, FileError, Language, OrchestrationStats, Preset, ResolvedOptions,
    SourceFile, Timestamp, TransformAttempt, TransformOptions, TransformResult,
    ValidationOutcome, DEFAULT_MAX_ATTEMPTS, DEFAULT_TEMPERATURE,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_core_pipeline_without_oracles() {
        let files = vec![
            SourceFile::new("data/User.kt", "data class User(val id: String)"),
            SourceFile::new("ui/ProfileViewModel.kt", "class ProfileViewModel(val user: User)"),
        ];

        let lanes = FileClassifier::default().classify(&files);
        assert_eq!(lanes.total(), files.len());
        assert_eq!(lanes.sequential[0].path, "ui/ProfileViewModel.kt");

        let mut manifest = Manifest::new();
        let user_swift = sanitize(
            "```swift\nstruct UserModel { let id: String }\n```",
            Direction::KotlinToSwift,
        );
        manifest.record(&files[0].content, &user_swift, "data/User.swift");

        let profile_swift = sanitize(
            "Here you go:\nfinal class ProfileViewModel { let user: User }",
            Direction::KotlinToSwift,
        );
        let synthesized = synthesize_content(&profile_swift, &manifest, Direction::KotlinToSwift);

        assert_eq!(synthesized, "final class ProfileViewModel { let user: UserModel }");
    }
}
