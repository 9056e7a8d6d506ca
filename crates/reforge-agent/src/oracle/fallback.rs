//! Deterministic placeholder transformation
//!
//! Used whenever the remote oracle is disabled or unreachable. The output keeps the original
//! source verbatim inside a target-language block comment under a marker line, so a reviewer can
//! find every file that still needs a real conversion.

use reforge_core::{Direction, SourceFile};

/// Marker that opens every placeholder
pub const PLACEHOLDER_MARKER: &str = "REFORGE-PLACEHOLDER";

#[derive(Debug, Clone, Default)]
pub struct DeterministicFallback;

impl DeterministicFallback {
    /// Same inputs, same output
    pub fn render(&self, file: &SourceFile, direction: Direction, reason: &str) -> String {
        let target = direction.target();
        let body = file.content.replace("/*", "/ *").replace("*/", "* /");

        format!(
            "// {marker}: automatic conversion unavailable ({reason})\n\
             // Source: {path} ({source_lang} -> {target})\n\
             // Convert this file manually.\n\
             /*\n{body}\n*/\n",
            marker = PLACEHOLDER_MARKER,
            reason = reason,
            path = file.path,
            source_lang = file.language,
            target = target,
            body = body.trim_end(),
        )
    }

    pub fn is_placeholder(content: &str) -> bool {
        content.starts_with(&format!("// {}", PLACEHOLDER_MARKER))
    }
}
