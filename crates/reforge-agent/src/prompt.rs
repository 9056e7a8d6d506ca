//! Prompt conversation for one file
//!
//! Append-only list of role-tagged messages. The first two entries (instruction and file request)
//! are fixed; every failed attempt appends the raw answer plus a repair request carrying the
//! compiler diagnostic.

use reforge_core::{Manifest, ProjectContext, ResolvedOptions, SourceFile, TransformAttempt};

use crate::oracle::{Message, OracleOptions, OracleRequest};

#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Opening messages for `file`
    pub fn for_file(
        file: &SourceFile,
        options: &ResolvedOptions,
        context: &ProjectContext,
        manifest: &Manifest,
    ) -> Self {
        let target = options.direction.target();

        let system = format!(
            "You convert {source} source files into idiomatic {target}.\n\
             {guidance}\n\
             Keep every behavior of the original file. Reuse the established type names listed \
             below exactly. Answer with the complete {target} file only: no explanations, no \
             Markdown.",
            source = file.language,
            target = target,
            guidance = options.preset.guidance(),
        );

        let user = format!(
            "File: {path}\n```\n{content}\n```\n\n# Project context\n{context}\n\n# Symbol manifest\n{manifest}",
            path = file.path,
            content = file.content.trim_end(),
            context = context.render(),
            manifest = manifest.render(),
        );

        Self {
            messages: vec![Message::system(system), Message::user(user)],
        }
    }

    /// Append the failed answer and a repair request
    pub fn record_failure(&mut self, attempt: &TransformAttempt) {
        let diagnostic = attempt
            .validation
            .diagnostic
            .as_deref()
            .unwrap_or("the answer did not contain usable code");

        self.messages.push(Message::assistant(attempt.raw_output.clone()));
        self.messages.push(Message::user(format!(
            "Attempt {} failed validation:\n{}\n\nFix the problem and answer with the complete corrected file only.",
            attempt.attempt_number,
            diagnostic.trim()
        )));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn request(&self, options: OracleOptions) -> OracleRequest {
        OracleRequest {
            messages: self.messages.clone(),
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::MessageRole;
    use reforge_core::{Direction, Preset, ValidationOutcome};

    fn conversation() -> Conversation {
        let file = SourceFile::new("ui/HomeScreen.kt", "class HomeScreen");
        let context = ProjectContext::summarize(std::slice::from_ref(&file));
        let options = ResolvedOptions {
            direction: Direction::KotlinToSwift,
            preset: Preset::SwiftUi,
            ..Default::default()
        };
        Conversation::for_file(&file, &options, &context, &Manifest::new())
    }

    #[test]
    fn test_opening_messages() {
        let convo = conversation();
        let messages = convo.messages();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[0].content.contains("idiomatic Swift"));
        assert!(messages[0].content.contains("SwiftUI"));
        assert!(messages[1].content.starts_with("File: ui/HomeScreen.kt"));
        assert!(messages[1].content.contains("No symbols mapped yet."));
    }

    #[test]
    fn test_failures_append_in_order() {
        let mut convo = conversation();
        convo.record_failure(&TransformAttempt {
            attempt_number: 1,
            raw_output: "struct HomeScreen {".into(),
            sanitized_output: "struct HomeScreen {".into(),
            validation: ValidationOutcome::failed("error: expected '}'"),
        });

        let messages = convo.messages();
        assert_eq!(convo.len(), 4);
        assert_eq!(messages[2].role, MessageRole::Assistant);
        assert_eq!(messages[2].content, "struct HomeScreen {");
        assert_eq!(messages[3].role, MessageRole::User);
        assert!(messages[3].content.contains("expected '}'"));
    }
}
