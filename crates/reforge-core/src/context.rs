//! Project Context Summarizer
//!
//! Extracts per-file structural signals (declared types, functions, state identifiers and
//! categorical framework markers) and aggregates them into one [`ProjectContext`] that every
//! oracle request carries as disambiguating context.
//!
//! Summaries are pure functions of a single file's content: no file's summary depends on any
//! other file, and the aggregate is deterministic for a given input order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::rules::{
    first_capture, DEEP_LINK_VOCABULARY, FUNCTION_DECLARATION, NAVIGATION_VOCABULARY,
    PAYLOAD_KEY, PERSISTED_KEY, SERVICE_VOCABULARY, STATE_DECLARATION,
    STATE_MANAGEMENT_VOCABULARY, TYPE_DECLARATION,
};
use crate::types::SourceFile;

/// Upper bound on the rendered context handed to the oracle
const MAX_RENDERED_CHARS: usize = 6_000;

/// Signals extracted from one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    pub types: Vec<String>,
    pub functions: Vec<String>,
    pub state_identifiers: Vec<String>,
    pub navigation: Vec<String>,
    pub state_management: Vec<String>,
    pub service_bindings: Vec<String>,
    pub deep_links: Vec<String>,
    pub persisted_keys: Vec<String>,
    pub external_payload_keys: Vec<String>,
}

impl FileSummary {
    /// Summarize one file
    pub fn from_file(file: &SourceFile) -> Self {
        let content = &file.content;
        let lowered = content.to_lowercase();

        Self {
            path: file.path.clone(),
            types: unique_captures(&TYPE_DECLARATION, content),
            functions: unique_captures(&FUNCTION_DECLARATION, content),
            state_identifiers: unique_captures(&STATE_DECLARATION, content),
            navigation: vocabulary_hits(NAVIGATION_VOCABULARY, &lowered),
            state_management: vocabulary_hits(STATE_MANAGEMENT_VOCABULARY, &lowered),
            service_bindings: vocabulary_hits(SERVICE_VOCABULARY, &lowered),
            deep_links: vocabulary_hits(DEEP_LINK_VOCABULARY, &lowered),
            persisted_keys: unique_captures(&PERSISTED_KEY, content),
            external_payload_keys: unique_captures(&PAYLOAD_KEY, content),
        }
    }

    pub fn uses_navigation(&self) -> bool {
        !self.navigation.is_empty()
    }

    pub fn uses_state_management(&self) -> bool {
        !self.state_management.is_empty()
    }

    pub fn binds_services(&self) -> bool {
        !self.service_bindings.is_empty()
    }

    pub fn handles_deep_links(&self) -> bool {
        !self.deep_links.is_empty()
    }

    pub fn uses_persistence(&self) -> bool {
        !self.persisted_keys.is_empty()
    }
}

/// Project-wide context, built once per run and read-only thereafter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub file_count: usize,
    pub per_file: Vec<FileSummary>,
    /// Declared type name -> declaring file (first declaration wins)
    pub class_index: BTreeMap<String, String>,
    pub navigation_signals: BTreeSet<String>,
    pub state_usage_signals: BTreeSet<String>,
    pub service_signals: BTreeSet<String>,
    pub deep_link_signals: BTreeSet<String>,
    pub persisted_key_signals: BTreeSet<String>,
    pub external_payload_keys: BTreeSet<String>,
}

impl ProjectContext {
    /// Summarize every file and aggregate
    pub fn summarize(files: &[SourceFile]) -> Self {
        let per_file: Vec<FileSummary> = files.iter().map(FileSummary::from_file).collect();

        let mut context = ProjectContext {
            file_count: files.len(),
            ..Default::default()
        };

        for summary in &per_file {
            for name in &summary.types {
                context
                    .class_index
                    .entry(name.clone())
                    .or_insert_with(|| summary.path.clone());
            }
            context.navigation_signals.extend(summary.navigation.iter().cloned());
            context
                .state_usage_signals
                .extend(summary.state_management.iter().cloned());
            context
                .service_signals
                .extend(summary.service_bindings.iter().cloned());
            context.deep_link_signals.extend(summary.deep_links.iter().cloned());
            context
                .persisted_key_signals
                .extend(summary.persisted_keys.iter().cloned());
            context
                .external_payload_keys
                .extend(summary.external_payload_keys.iter().cloned());
        }

        context.per_file = per_file;

        tracing::debug!(
            "Project context: {} files, {} declared types",
            context.file_count,
            context.class_index.len()
        );

        context
    }

    /// Summary for one path, if the file was part of the run
    pub fn summary_for(&self, path: &str) -> Option<&FileSummary> {
        self.per_file.iter().find(|s| s.path == path)
    }

    /// Compact text block for oracle prompts
    pub fn render(&self) -> String {
        let mut out = format!("Project files: {}\n", self.file_count);

        if !self.class_index.is_empty() {
            out.push_str("Declared types:\n");
            for (name, path) in &self.class_index {
                out.push_str(&format!("- {} ({})\n", name, path));
            }
        }

        push_signal_line(&mut out, "Navigation", &self.navigation_signals);
        push_signal_line(&mut out, "State management", &self.state_usage_signals);
        push_signal_line(&mut out, "Services", &self.service_signals);
        push_signal_line(&mut out, "Deep links", &self.deep_link_signals);
        push_signal_line(&mut out, "Persisted keys", &self.persisted_key_signals);
        push_signal_line(&mut out, "External payload keys", &self.external_payload_keys);

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

fn push_signal_line(out: &mut String, label: &str, signals: &BTreeSet<String>) {
    if signals.is_empty() {
        return;
    }
    let joined: Vec<&str> = signals.iter().map(String::as_str).collect();
    out.push_str(&format!("{}: {}\n", label, joined.join(", ")));
}

fn unique_captures(pattern: &regex::Regex, content: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    pattern
        .captures_iter(content)
        .filter_map(|caps| first_capture(&caps))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

fn vocabulary_hits(vocabulary: &[&str], lowered: &str) -> Vec<String> {
    vocabulary
        .iter()
        .filter(|term| lowered.contains(*term))
        .map(|term| term.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view_model() -> SourceFile {
        SourceFile::new(
            "app/src/main/java/com/example/UserViewModel.kt",
            r#"
package com.example

class UserViewModel(private val repo: UserRepository) : ViewModel() {
    private val _state = MutableStateFlow(UserState())
    val state: StateFlow<UserState> = _state

    fun load(id: String) {
        val token = prefs.getString("auth_token", null)
        navController.navigate("profile/$id")
    }
}
"#,
        )
    }

    #[test]
    fn test_file_summary_extracts_structure() {
        let summary = FileSummary::from_file(&view_model());

        assert_eq!(summary.types, vec!["UserViewModel"]);
        assert_eq!(summary.functions, vec!["load"]);
        assert!(summary.state_identifiers.contains(&"_state".to_string()));
        assert!(summary.state_identifiers.contains(&"token".to_string()));
        assert!(summary.uses_navigation());
        assert!(summary.uses_state_management());
        assert_eq!(summary.persisted_keys, vec!["auth_token"]);
        assert!(!summary.binds_services());
        assert!(!summary.handles_deep_links());
    }

    #[test]
    fn test_summary_is_independent_of_other_files() {
        let alone = ProjectContext::summarize(&[view_model()]);
        let with_other = ProjectContext::summarize(&[
            SourceFile::new("Other.kt", "class Other { fun bindService() {} }"),
            view_model(),
        ]);

        assert_eq!(
            alone.summary_for(&view_model().path),
            with_other.summary_for(&view_model().path)
        );
        assert_eq!(with_other.file_count, 2);
    }

    #[test]
    fn test_class_index_first_declaration_wins() {
        let context = ProjectContext::summarize(&[
            SourceFile::new("a/User.kt", "data class User(val id: String)"),
            SourceFile::new("b/User.kt", "class User"),
        ]);

        assert_eq!(context.class_index.get("User").map(String::as_str), Some("a/User.kt"));
    }

    #[test]
    fn test_payload_and_deep_link_signals() {
        let context = ProjectContext::summarize(&[SourceFile::new(
            "MainActivity.kt",
            r#"override fun onNewIntent(intent: Intent) { val id = intent.getStringExtra("order_id") }"#,
        )]);

        assert!(context.deep_link_signals.contains("onnewintent"));
        assert!(context.external_payload_keys.contains("order_id"));
    }

    #[test]
    fn test_render_is_bounded() {
        let files: Vec<SourceFile> = (0..2_000)
            .map(|i| SourceFile::new(format!("Type{}.kt", i), format!("class Type{}", i)))
            .collect();
        let rendered = ProjectContext::summarize(&files).render();

        assert!(rendered.len() <= MAX_RENDERED_CHARS + 4);
        assert!(rendered.starts_with("Project files: 2000"));
    }
}
