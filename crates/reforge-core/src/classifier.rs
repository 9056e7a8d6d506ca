//! File Classifier
//!
//! Scores each file from name and content signals and splits the project into a
//! sequential lane (files likely to define or depend on shared names) and a parallel lane
//! (self-contained files). This is a cost/consistency heuristic, not a dependency graph.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::rules::{CONTENT_KEYWORDS, PATH_KEYWORDS};
use crate::types::SourceFile;

/// Score at or above which a file goes to the sequential lane
pub const DEFAULT_SEQUENTIAL_THRESHOLD: u32 = 2;

const PATH_KEYWORD_WEIGHT: u32 = 2;
const CONTENT_KEYWORD_WEIGHT: u32 = 1;

/// Partition of the input files. Input order is preserved within each lane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub sequential: Vec<SourceFile>,
    pub parallel: Vec<SourceFile>,
    pub scores: BTreeMap<String, u32>,
}

impl ClassificationResult {
    pub fn total(&self) -> usize {
        self.sequential.len() + self.parallel.len()
    }
}

/// Keyword-scoring classifier
#[derive(Debug, Clone)]
pub struct FileClassifier {
    threshold: u32,
}

impl Default for FileClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SEQUENTIAL_THRESHOLD)
    }
}

impl FileClassifier {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// +2 per path keyword in the lowercase path, +1 per content keyword in the lowercase content
    pub fn score(&self, file: &SourceFile) -> u32 {
        let path = file.path.to_lowercase();
        let content = file.content.to_lowercase();

        let path_score = PATH_KEYWORDS
            .iter()
            .filter(|keyword| path.contains(*keyword))
            .count() as u32
            * PATH_KEYWORD_WEIGHT;

        let content_score = CONTENT_KEYWORDS
            .iter()
            .filter(|keyword| content.contains(*keyword))
            .count() as u32
            * CONTENT_KEYWORD_WEIGHT;

        path_score + content_score
    }

    pub fn is_sequential(&self, file: &SourceFile) -> bool {
        self.score(file) >= self.threshold
    }

    /// Place every file in exactly one lane
    pub fn classify(&self, files: &[SourceFile]) -> ClassificationResult {
        let mut result = ClassificationResult::default();

        for file in files {
            let score = self.score(file);
            result.scores.insert(file.path.clone(), score);

            if score >= self.threshold {
                result.sequential.push(file.clone());
            } else {
                result.parallel.push(file.clone());
            }
        }

        tracing::info!(
            "Classified {} files: {} sequential, {} parallel (threshold {})",
            files.len(),
            result.sequential.len(),
            result.parallel.len(),
            self.threshold
        );

        result
    }
}
