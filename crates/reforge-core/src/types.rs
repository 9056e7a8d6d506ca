//! Core types for Reforge
//!
//! This module defines the fundamental types that flow through a conversion run:
//! - Source files and their languages
//! - Conversion direction, presets and options
//! - Per-attempt records and per-file results
//! - Timestamps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ReforgeError;
use crate::manifest::Manifest;

/// Default attempt bound for one file's cycle
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default sampling temperature for the Transformation Oracle
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// Timestamp type alias
pub type Timestamp = DateTime<Utc>;

/// Create a timestamp for the current moment
pub fn now() -> Timestamp {
    Utc::now()
}

/// Programming language of a source or target file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Kotlin,
    Java,
    Swift,
    Unknown,
}

impl Language {
    /// Detect language from file path
    pub fn from_path(path: &str) -> Self {
        let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();

        match ext.as_str() {
            "kt" | "kts" => Language::Kotlin,
            "java" => Language::Java,
            "swift" => Language::Swift,
            _ => Language::Unknown,
        }
    }

    /// Canonical file extension (without the dot)
    pub fn extension(self) -> &'static str {
        match self {
            Language::Kotlin => "kt",
            Language::Java => "java",
            Language::Swift => "swift",
            Language::Unknown => "txt",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::Kotlin => "Kotlin",
            Language::Java => "Java",
            Language::Swift => "Swift",
            Language::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Conversion direction; selects the target rule set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Android (Kotlin/Java) to iOS (Swift)
    KotlinToSwift,
    /// iOS (Swift) to Android (Kotlin)
    SwiftToKotlin,
}

impl Direction {
    pub fn target(self) -> Language {
        match self {
            Direction::KotlinToSwift => Language::Swift,
            Direction::SwiftToKotlin => Language::Kotlin,
        }
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::KotlinToSwift
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::KotlinToSwift => write!(f, "kotlin-to-swift"),
            Direction::SwiftToKotlin => write!(f, "swift-to-kotlin"),
        }
    }
}

impl FromStr for Direction {
    type Err = ReforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kotlin-to-swift" | "android-to-ios" | "kt2swift" => Ok(Direction::KotlinToSwift),
            "swift-to-kotlin" | "ios-to-android" | "swift2kt" => Ok(Direction::SwiftToKotlin),
            other => Err(ReforgeError::InvalidOptions(format!(
                "unknown direction '{}'",
                other
            ))),
        }
    }
}

/// Target-framework preset that shapes the system instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    Default,
    SwiftUi,
    UiKit,
    Compose,
    Views,
}

impl Preset {
    /// Framework guidance appended to the system instruction
    pub fn guidance(self) -> &'static str {
        match self {
            Preset::Default => "Use the idiomatic standard UI framework of the target platform.",
            Preset::SwiftUi => {
                "Target SwiftUI: views are structs conforming to View, observable state uses \
                 ObservableObject with @Published properties."
            }
            Preset::UiKit => {
                "Target UIKit: screens are UIViewController subclasses, navigation uses \
                 UINavigationController."
            }
            Preset::Compose => {
                "Target Jetpack Compose: screens are @Composable functions, state is exposed \
                 from a ViewModel through StateFlow."
            }
            Preset::Views => {
                "Target Android Views: screens are Activity or Fragment subclasses with \
                 ViewBinding."
            }
        }
    }
}

impl Default for Preset {
    fn default() -> Self {
        Preset::Default
    }
}

impl FromStr for Preset {
    type Err = ReforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Preset::Default),
            "swiftui" | "swift-ui" => Ok(Preset::SwiftUi),
            "uikit" | "ui-kit" => Ok(Preset::UiKit),
            "compose" => Ok(Preset::Compose),
            "views" => Ok(Preset::Views),
            other => Err(ReforgeError::InvalidOptions(format!("unknown preset '{}'", other))),
        }
    }
}

/// Caller-facing options record. Unset fields take documented defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<Preset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_hint: Option<String>,
}

impl TransformOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = Some(preset);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_model_hint(mut self, hint: impl Into<String>) -> Self {
        self.model_hint = Some(hint.into());
        self
    }

    /// Field-by-field merge: values set on `self` win over `defaults`.
    pub fn merged_over(&self, defaults: &TransformOptions) -> TransformOptions {
        TransformOptions {
            direction: self.direction.or(defaults.direction),
            preset: self.preset.or(defaults.preset),
            temperature: self.temperature.or(defaults.temperature),
            max_attempts: self.max_attempts.or(defaults.max_attempts),
            model: self.model.clone().or_else(|| defaults.model.clone()),
            model_hint: self.model_hint.clone().or_else(|| defaults.model_hint.clone()),
        }
    }

    /// Fill unset fields with defaults and validate ranges
    pub fn resolve(&self) -> crate::Result<ResolvedOptions> {
        let temperature = self.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ReforgeError::InvalidOptions(format!(
                "temperature must be in [0.0, 2.0], got {}",
                temperature
            )));
        }

        let max_attempts = self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(ReforgeError::InvalidOptions(
                "maxAttempts must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedOptions {
            direction: self.direction.unwrap_or_default(),
            preset: self.preset.unwrap_or_default(),
            temperature,
            max_attempts,
            model: self.model.clone(),
            model_hint: self.model_hint.clone(),
        })
    }
}

/// Options with every defaulted field filled in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOptions {
    pub direction: Direction,
    pub preset: Preset,
    pub temperature: f64,
    pub max_attempts: u32,
    pub model: Option<String>,
    pub model_hint: Option<String>,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        Self {
            direction: Direction::default(),
            preset: Preset::default(),
            temperature: DEFAULT_TEMPERATURE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            model: None,
            model_hint: None,
        }
    }
}

/// One input file. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub language: Language,
    pub content: String,
}

impl SourceFile {
    /// Create a source file, detecting its language from the extension
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            language: Language::from_path(&path),
            path,
            content: content.into(),
        }
    }

    /// BLAKE3 digest of the content, hex encoded
    pub fn digest(&self) -> String {
        blake3::hash(self.content.as_bytes()).to_hex().to_string()
    }

    /// Output path: same location, extension swapped for the target language
    pub fn output_path(&self, direction: Direction) -> String {
        let ext = direction.target().extension();
        let file_start = self.path.rfind('/').map(|i| i + 1).unwrap_or(0);

        match self.path[file_start..].rfind('.') {
            Some(dot) if dot > 0 => format!("{}.{}", &self.path[..file_start + dot], ext),
            _ => format!("{}.{}", self.path, ext),
        }
    }
}

/// Compiler Oracle verdict for one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl ValidationOutcome {
    pub fn passed() -> Self {
        Self {
            success: true,
            diagnostic: None,
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// One oracle round-trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformAttempt {
    pub attempt_number: u32,
    pub raw_output: String,
    pub sanitized_output: String,
    pub validation: ValidationOutcome,
}

/// Terminal artifact for one input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformResult {
    pub path: String,
    pub output_path: String,
    pub content: String,
    pub verified: bool,
    pub attempts: u32,
    /// Content is the deterministic placeholder, not oracle output
    #[serde(default)]
    pub placeholder: bool,
    /// Digest of the source content
    pub digest: String,
}

/// A file that ended outside the attempt cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub path: String,
    pub error: String,
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationStats {
    pub total_files: usize,
    pub sequential_files: usize,
    pub parallel_files: usize,
    pub verified: usize,
    pub exhausted: usize,
    pub placeholders: usize,
    pub errors: usize,
    pub total_attempts: u64,
}

/// Outcome of a whole batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub run_id: Uuid,
    /// True iff no file ended in `errors`
    pub success: bool,
    pub direction: Direction,
    pub results: Vec<TransformResult>,
    pub errors: Vec<FileError>,
    pub manifest: Manifest,
    pub stats: OrchestrationStats,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

impl BatchResult {
    /// Every input file is accounted for exactly once
    pub fn accounts_for(&self, input_count: usize) -> bool {
        self.results.len() + self.errors.len() == input_count
    }

    pub fn result_for(&self, path: &str) -> Option<&TransformResult> {
        self.results.iter().find(|r| r.path == path)
    }

    pub fn error_for(&self, path: &str) -> Option<&FileError> {
        self.errors.iter().find(|e| e.path == path)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::from_path("app/src/UserViewModel.kt"), Language::Kotlin);
        assert_eq!(Language::from_path("Sources/App/ContentView.swift"), Language::Swift);
        assert_eq!(Language::from_path("Legacy.JAVA"), Language::Java);
        assert_eq!(Language::from_path("README"), Language::Unknown);
    }

    #[test]
    fn test_output_path_swaps_extension() {
        let file = SourceFile::new("app/ui/UserViewModel.kt", "");
        assert_eq!(
            file.output_path(Direction::KotlinToSwift),
            "app/ui/UserViewModel.swift"
        );

        let file = SourceFile::new("Sources/ContentView.swift", "");
        assert_eq!(
            file.output_path(Direction::SwiftToKotlin),
            "Sources/ContentView.kt"
        );

        let file = SourceFile::new("scripts.d/Makefile", "");
        assert_eq!(
            file.output_path(Direction::KotlinToSwift),
            "scripts.d/Makefile.swift"
        );
    }

    #[test]
    fn test_options_merge_and_resolve() {
        let defaults = TransformOptions::new()
            .with_temperature(0.5)
            .with_model("base-model");
        let call = TransformOptions::new()
            .with_direction(Direction::SwiftToKotlin)
            .with_max_attempts(5);

        let merged = call.merged_over(&defaults);
        assert_eq!(merged.temperature, Some(0.5));
        assert_eq!(merged.model.as_deref(), Some("base-model"));

        let resolved = merged.resolve().unwrap();
        assert_eq!(resolved.direction, Direction::SwiftToKotlin);
        assert_eq!(resolved.max_attempts, 5);
        assert_eq!(resolved.preset, Preset::Default);
    }

    #[test]
    fn test_resolve_defaults() {
        let resolved = TransformOptions::default().resolve().unwrap();
        assert_eq!(resolved.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(resolved.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(resolved.direction, Direction::KotlinToSwift);
    }

    #[test]
    fn test_resolve_rejects_zero_attempts() {
        let err = TransformOptions::new().with_max_attempts(0).resolve();
        assert!(err.is_err());
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!(
            "android-to-ios".parse::<Direction>().unwrap(),
            Direction::KotlinToSwift
        );
        assert_eq!(
            "Swift-To-Kotlin".parse::<Direction>().unwrap(),
            Direction::SwiftToKotlin
        );
        assert!("cobol-to-rust".parse::<Direction>().is_err());
    }

    #[test]
    fn test_options_deserialize_camel_case() {
        let options: TransformOptions = serde_json::from_str(
            r#"{"direction":"swift-to-kotlin","maxAttempts":4,"modelHint":"fast"}"#,
        )
        .unwrap();
        assert_eq!(options.direction, Some(Direction::SwiftToKotlin));
        assert_eq!(options.max_attempts, Some(4));
        assert_eq!(options.model_hint.as_deref(), Some("fast"));
    }
}
