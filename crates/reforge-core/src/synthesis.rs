//! Global Synthesis Pass
//!
//! Runs once, after every attempt cycle has terminated. Rewrites each result so that all files
//! agree on the manifest's names, then normalizes primitive-type spellings for the target.
//! Applying the pass to its own output changes nothing.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::manifest::Manifest;
use crate::rules::{apply_rules, rule_set, RuleAction, RuleSet};
use crate::types::{Direction, TransformResult};

/// What the pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisReport {
    pub files_changed: usize,
    pub renames_applied: usize,
}

/// Whole-word renamer built from a manifest snapshot
#[derive(Debug)]
pub struct Renamer {
    pattern: Option<Regex>,
    renames: HashMap<String, String>,
}

impl Renamer {
    pub fn new(manifest: &Manifest, rules: &RuleSet) -> Self {
        for (source, target) in manifest.conflicts() {
            let owner = manifest.file_exports.get(source).map(String::as_str).unwrap_or("?");
            tracing::warn!(
                "Not renaming {} -> {}: {} is also the target name defined by {}",
                source,
                target,
                source,
                owner
            );
        }

        let renames: HashMap<String, String> = manifest
            .renames()
            .filter(|(source, target)| {
                !is_primitive_spelling(rules, source) && !is_primitive_spelling(rules, target)
            })
            .map(|(source, target)| (source.to_string(), target.to_string()))
            .collect();

        if renames.is_empty() {
            return Self {
                pattern: None,
                renames,
            };
        }

        // Longest first so a key never shadows a longer key sharing its prefix
        let mut keys: Vec<&String> = renames.keys().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = keys
            .iter()
            .map(|key| regex::escape(key))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = match Regex::new(&format!(r"\b(?:{})\b", alternation)) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!("Skipping manifest renames, pattern rejected: {}", e);
                None
            }
        };

        Self { pattern, renames }
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_none()
    }

    /// Rename every whole-word manifest key, returning the new text and the count
    pub fn apply(&self, content: &str) -> (String, usize) {
        let Some(pattern) = &self.pattern else {
            return (content.to_string(), 0);
        };

        let mut count = 0;
        let renamed = pattern.replace_all(content, |caps: &Captures<'_>| {
            let key = &caps[0];
            match self.renames.get(key) {
                Some(target) => {
                    count += 1;
                    target.clone()
                }
                None => key.to_string(),
            }
        });

        (renamed.into_owned(), count)
    }
}

fn is_primitive_spelling(rules: &RuleSet, name: &str) -> bool {
    rules.primitives.iter().any(|rule| {
        rule.pattern.is_match(name) || matches!(rule.action, RuleAction::Replace(rep) if rep == name)
    })
}

/// Rewrite a single file's content
pub fn synthesize_content(content: &str, manifest: &Manifest, direction: Direction) -> String {
    let rules = rule_set(direction);
    let (renamed, _) = Renamer::new(manifest, rules).apply(content);
    apply_rules(&rules.primitives, &renamed)
}

/// Rewrite every result in place
pub fn synthesize(
    results: &mut [TransformResult],
    manifest: &Manifest,
    direction: Direction,
) -> SynthesisReport {
    let rules = rule_set(direction);
    let renamer = Renamer::new(manifest, rules);
    let mut report = SynthesisReport::default();

    // placeholders carry the untouched source
    for result in results.iter_mut().filter(|r| !r.placeholder) {
        let (renamed, count) = renamer.apply(&result.content);
        let normalized = apply_rules(&rules.primitives, &renamed);

        report.renames_applied += count;
        if normalized != result.content {
            report.files_changed += 1;
            result.content = normalized;
        }
    }

    tracing::info!(
        "Synthesis pass: {} files changed, {} renames applied",
        report.files_changed,
        report.renames_applied
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn result(path: &str, content: &str) -> TransformResult {
        TransformResult {
            path: path.to_string(),
            output_path: path.to_string(),
            content: content.to_string(),
            verified: true,
            attempts: 1,
            placeholder: false,
            digest: String::new(),
        }
    }

    fn user_manifest() -> Manifest {
        let mut manifest = Manifest::new();
        manifest.record(
            "data class User(val id: String)",
            "struct UserModel { let id: String }",
            "User.swift",
        );
        manifest
    }

    #[test]
    fn test_synthesis_converges_names() {
        let manifest = user_manifest();
        let mut results = vec![
            result("User.swift", "struct UserModel { let id: String }"),
            result(
                "Profile.swift",
                "struct Profile { let owner: User; let users: [User]; let userCount: Int }",
            ),
        ];

        let report = synthesize(&mut results, &manifest, Direction::KotlinToSwift);

        assert_eq!(
            results[1].content,
            "struct Profile { let owner: UserModel; let users: [UserModel]; let userCount: Int }"
        );
        assert_eq!(results[0].content, "struct UserModel { let id: String }");
        assert_eq!(report.files_changed, 1);
        assert_eq!(report.renames_applied, 2);
    }

    #[test]
    fn test_synthesis_is_idempotent() {
        let manifest = user_manifest();
        let mut results = vec![result("B.swift", "let a: User = User(); var flag: Boolean")];

        synthesize(&mut results, &manifest, Direction::KotlinToSwift);
        let once = results.clone();
        let report = synthesize(&mut results, &manifest, Direction::KotlinToSwift);

        assert_eq!(results, once);
        assert_eq!(report, SynthesisReport::default());
        assert_eq!(results[0].content, "let a: UserModel = UserModel(); var flag: Bool");
    }

    #[test]
    fn test_placeholders_are_left_alone() {
        let manifest = user_manifest();
        let mut placeholder = result("User.swift", "/*\ndata class User(val admin: Boolean)\n*/");
        placeholder.placeholder = true;
        let mut results = vec![placeholder.clone()];

        let report = synthesize(&mut results, &manifest, Direction::KotlinToSwift);
        assert_eq!(results[0], placeholder);
        assert_eq!(report.files_changed, 0);
    }

    #[test]
    fn test_primitive_normalization_per_direction() {
        let manifest = Manifest::new();
        assert_eq!(
            synthesize_content("fun f(x: Long): Unit", &manifest, Direction::KotlinToSwift),
            "fun f(x: Int64): Void"
        );
        assert_eq!(
            synthesize_content("val ok: Bool = true", &manifest, Direction::SwiftToKotlin),
            "val ok: Boolean = true"
        );
    }

    #[test]
    fn test_longer_keys_take_precedence() {
        let mut manifest = Manifest::new();
        manifest.record("class User", "struct UserModel {}", "a.swift");
        manifest.record("class UserSettings", "struct Preferences {}", "b.swift");

        let out = synthesize_content("User UserSettings", &manifest, Direction::KotlinToSwift);
        assert_eq!(out, "UserModel Preferences");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_synthesis_is_idempotent(
            names in proptest::collection::vec("[A-Z][a-z]{2,6}", 1..6),
            words in proptest::collection::vec("[A-Z][a-z]{2,6}|Boolean|Long|Unit", 0..20),
        ) {
            let mut manifest = Manifest::new();
            for name in &names {
                manifest.record(
                    &format!("class {}", name),
                    &format!("struct {}Impl {{}}", name),
                    "out.swift",
                );
            }

            let content = words.join(" ");
            let once = synthesize_content(&content, &manifest, Direction::KotlinToSwift);
            let twice = synthesize_content(&once, &manifest, Direction::KotlinToSwift);
            prop_assert_eq!(once, twice);
        }
    }
}
