//! E2E tests for the synchronous pipeline pieces: classification, sanitization, manifest and
//! synthesis working together over a small project.

use proptest::prelude::*;
use reforge_core::{
    sanitize, synthesize, Direction, FileClassifier, Manifest, ProjectContext, SourceFile,
    TransformResult,
};

fn project() -> Vec<SourceFile> {
    vec![
        SourceFile::new(
            "app/data/UserRepository.kt",
            "class UserRepository(private val api: Api) { suspend fun load(): User = api.user() }",
        ),
        SourceFile::new("app/data/User.kt", "data class User(val id: String, val admin: Boolean)"),
        SourceFile::new(
            "app/ui/UserViewModel.kt",
            "class UserViewModel : ViewModel() { val state: StateFlow<User?> = MutableStateFlow(null) }",
        ),
        SourceFile::new("app/ui/theme/Colors.kt", "object Colors { val primary = 0xFF6200EE }"),
    ]
}

#[test]
fn test_lanes_cover_every_file_once() {
    let files = project();
    let lanes = FileClassifier::default().classify(&files);

    let mut seen: Vec<&str> = lanes
        .sequential
        .iter()
        .chain(lanes.parallel.iter())
        .map(|f| f.path.as_str())
        .collect();
    seen.sort();
    let mut expected: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    expected.sort();

    assert_eq!(seen, expected);
    assert!(lanes.sequential.iter().any(|f| f.path.ends_with("UserViewModel.kt")));
    assert!(lanes.sequential.iter().any(|f| f.path.ends_with("UserRepository.kt")));
    assert!(lanes.parallel.iter().any(|f| f.path.ends_with("Colors.kt")));
}

#[test]
fn test_context_indexes_project_types() {
    let context = ProjectContext::summarize(&project());

    assert_eq!(context.file_count, 4);
    assert_eq!(
        context.class_index.get("User").map(String::as_str),
        Some("app/data/User.kt")
    );
    assert!(context.state_usage_signals.contains("stateflow"));
    assert!(context.render().contains("UserViewModel (app/ui/UserViewModel.kt)"));
}

#[test]
fn test_rerun_with_identical_responses_keeps_manifest() {
    let files = project();
    let responses = [
        "```swift\nfinal class UserRepository {}\n```",
        "Here it is:\nstruct UserModel: Codable { let id: String }",
        "```swift\nimport Combine\nfinal class UserViewModel: ObservableObject {}\n```",
        "enum Colors {}",
    ];

    let run = || {
        let mut manifest = Manifest::new();
        for (file, raw) in files.iter().zip(responses.iter()) {
            let code = sanitize(raw, Direction::KotlinToSwift);
            manifest.record(&file.content, &code, &file.output_path(Direction::KotlinToSwift));
        }
        manifest
    };

    let first = run();
    let mut replayed = first.clone();
    for (file, raw) in files.iter().zip(responses.iter()) {
        let code = sanitize(raw, Direction::KotlinToSwift);
        replayed.record(&file.content, &code, &file.output_path(Direction::KotlinToSwift));
    }

    assert_eq!(first, run());
    assert_eq!(first, replayed);
    assert_eq!(first.target_for("User"), Some("UserModel"));
}

#[test]
fn test_synthesis_after_all_results() {
    let mut manifest = Manifest::new();
    manifest.record(
        "data class User(val id: String)",
        "struct UserModel { let id: String }",
        "app/data/User.swift",
    );

    let mut results = vec![TransformResult {
        path: "app/ui/UserViewModel.kt".into(),
        output_path: "app/ui/UserViewModel.swift".into(),
        content: "final class UserViewModel { @Published var user: User?; var admin: Boolean = false }"
            .into(),
        verified: true,
        attempts: 1,
        placeholder: false,
        digest: String::new(),
    }];

    let report = synthesize(&mut results, &manifest, Direction::KotlinToSwift);

    assert_eq!(report.files_changed, 1);
    assert_eq!(
        results[0].content,
        "final class UserViewModel { @Published var user: UserModel?; var admin: Bool = false }"
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_classifier_is_total_and_deterministic(
        entries in proptest::collection::vec(("[A-Za-z/]{1,24}\\.kt", "[A-Za-z ]{0,60}"), 0..12)
    ) {
        let files: Vec<SourceFile> = entries
            .iter()
            .map(|(path, content)| SourceFile::new(path.clone(), content.clone()))
            .collect();
        let classifier = FileClassifier::default();

        let first = classifier.classify(&files);
        let second = classifier.classify(&files);

        prop_assert_eq!(first.total(), files.len());
        prop_assert_eq!(&first.sequential, &second.sequential);
        prop_assert_eq!(&first.parallel, &second.parallel);
        for file in &first.sequential {
            prop_assert!(classifier.score(file) >= classifier.threshold());
        }
        for file in &first.parallel {
            prop_assert!(classifier.score(file) < classifier.threshold());
        }
    }
}
