//! Project ingestion and output writing

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use reforge_core::{BatchResult, Direction, Language, SourceFile};

/// Directories that never hold convertible sources
const SKIPPED_DIRS: &[&str] = &[
    "build",
    "out",
    "target",
    "node_modules",
    "Pods",
    "DerivedData",
    ".build",
    ".gradle",
    ".idea",
];

/// Name of the run report written next to the converted files
pub const REPORT_FILE: &str = "reforge-report.json";

fn is_skipped(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

/// Source languages converted in `direction`
pub fn source_languages(direction: Direction) -> &'static [Language] {
    match direction {
        Direction::KotlinToSwift => &[Language::Kotlin, Language::Java],
        Direction::SwiftToKotlin => &[Language::Swift],
    }
}

/// Read every file under `root` whose language is in `languages`, sorted by relative path
pub fn collect_sources(root: &Path, languages: &[Language]) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).into_iter().filter_entry(|e| !is_skipped(e)) {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        if !languages.contains(&Language::from_path(&relative)) {
            continue;
        }

        match std::fs::read_to_string(entry.path()) {
            Ok(content) => files.push(SourceFile::new(relative, content)),
            Err(e) => tracing::warn!("Skipping {}: {}", entry.path().display(), e),
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!("Collected {} source files from {}", files.len(), root.display());
    Ok(files)
}

/// Write every result under `out_dir` plus the JSON report; returns the report path
pub fn write_outputs(batch: &BatchResult, out_dir: &Path) -> Result<PathBuf> {
    for result in &batch.results {
        let target = out_dir.join(&result.output_path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(&target, &result.content)
            .with_context(|| format!("writing {}", target.display()))?;
    }

    std::fs::create_dir_all(out_dir)?;
    let report_path = out_dir.join(REPORT_FILE);
    std::fs::write(&report_path, serde_json::to_string_pretty(batch)?)
        .with_context(|| format!("writing {}", report_path.display()))?;

    Ok(report_path)
}
