//! Manifest - the cross-file naming record of a run
//!
//! Maps source-declared type names to the target names chosen for them, plus every target name
//! defined so far and the output file that exports it. The manifest only grows: entries are
//! never removed or overwritten, and the first writer of a source name wins.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::rules::{first_capture, TYPE_DECLARATION};

/// Upper bound on the rendered snapshot handed to the oracle
const MAX_RENDERED_CHARS: usize = 4_000;

/// First type declared in `content`, if any
pub fn extract_declared_type(content: &str) -> Option<String> {
    TYPE_DECLARATION
        .captures(content)
        .and_then(|caps| first_capture(&caps))
}

/// What a `record` call changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestUpdate {
    /// A new `source -> target` mapping was added
    Mapped { source: String, target: String },
    /// The source name was already mapped; only the target definition was recorded
    AlreadyMapped {
        source: String,
        existing: String,
        proposed: String,
    },
    /// A target type was found but no source type to pair it with
    DefinitionOnly { target: String },
    /// The candidate declares no type
    Unchanged,
}

/// Cross-file symbol manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Source name -> target name, first writer wins
    pub symbol_map: BTreeMap<String, String>,
    /// Every target name seen in a verified output
    pub definitions: BTreeSet<String>,
    /// Target name -> output path of the file that defined it
    pub file_exports: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a verified file. Never removes or overwrites an existing entry.
    pub fn record(
        &mut self,
        source_content: &str,
        sanitized_output: &str,
        output_path: &str,
    ) -> ManifestUpdate {
        let Some(target) = extract_declared_type(sanitized_output) else {
            return ManifestUpdate::Unchanged;
        };

        self.definitions.insert(target.clone());
        self.file_exports
            .entry(target.clone())
            .or_insert_with(|| output_path.to_string());

        let Some(source) = extract_declared_type(source_content) else {
            return ManifestUpdate::DefinitionOnly { target };
        };

        match self.symbol_map.get(&source) {
            Some(existing) => ManifestUpdate::AlreadyMapped {
                source,
                existing: existing.clone(),
                proposed: target,
            },
            None => {
                self.symbol_map.insert(source.clone(), target.clone());
                ManifestUpdate::Mapped { source, target }
            }
        }
    }

    /// Target name for a source name
    pub fn target_for(&self, source: &str) -> Option<&str> {
        self.symbol_map.get(source).map(String::as_str)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.contains(name)
    }

    pub fn len(&self) -> usize {
        self.symbol_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbol_map.is_empty() && self.definitions.is_empty()
    }

    /// Mappings that the synthesis pass may apply: keys that differ from their value and are
    /// not themselves defined target names
    pub fn renames(&self) -> impl Iterator<Item = (&str, &str)> {
        self.symbol_map
            .iter()
            .filter(|(source, target)| source != target && !self.definitions.contains(*source))
            .map(|(source, target)| (source.as_str(), target.as_str()))
    }

    /// Mappings held back from synthesis because their source name is also a target name
    /// defined by another file; applying them would undo that file's definition
    pub fn conflicts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.symbol_map
            .iter()
            .filter(|(source, target)| source != target && self.definitions.contains(*source))
            .map(|(source, target)| (source.as_str(), target.as_str()))
    }

    /// Compact text block for oracle prompts
    pub fn render(&self) -> String {
        if self.is_empty() {
            return "No symbols mapped yet.".to_string();
        }

        let mut out = String::new();
        if !self.symbol_map.is_empty() {
            out.push_str("Established names (reuse these exactly):\n");
            for (source, target) in &self.symbol_map {
                out.push_str(&format!("- {} -> {}\n", source, target));
            }
        }

        let unmapped: Vec<&str> = self
            .definitions
            .iter()
            .filter(|name| !self.symbol_map.values().any(|v| v == *name))
            .map(String::as_str)
            .collect();
        if !unmapped.is_empty() {
            out.push_str(&format!("Other defined types: {}\n", unmapped.join(", ")));
        }

        if out.len() > MAX_RENDERED_CHARS {
            let mut cut = MAX_RENDERED_CHARS;
            while !out.is_char_boundary(cut) {
                cut -= 1;
            }
            out.truncate(cut);
            out.push_str("\n...");
        }

        out
    }
}
