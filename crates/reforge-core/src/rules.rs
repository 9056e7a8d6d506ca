//! Rule Table - every pattern the engine matches against
//!
//! Extraction patterns, signal vocabularies, classifier keywords and the per-direction
//! sanitizer/synthesis rule sets live here so that the summarizer, classifier, sanitizer
//! and synthesis pass share one versioned source of truth.

use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;

use crate::types::Direction;

/// Bumped whenever a pattern or vocabulary below changes behavior
pub const RULESET_VERSION: &str = "1.2.0";

/// What a rule does with the text it matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// Delete the match
    Remove,
    /// Replace the match (capture references such as `$1` are expanded)
    Replace(&'static str),
}

/// One `{pattern, action}` entry
#[derive(Debug)]
pub struct Rule {
    pub name: &'static str,
    pub pattern: Regex,
    pub action: RuleAction,
}

impl Rule {
    fn remove(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
            action: RuleAction::Remove,
        }
    }

    fn replace(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
            action: RuleAction::Replace(replacement),
        }
    }

    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match self.action {
            RuleAction::Remove => self.pattern.replace_all(text, ""),
            RuleAction::Replace(replacement) => self.pattern.replace_all(text, replacement),
        }
    }
}

/// Apply an ordered list of rules
pub fn apply_rules(rules: &[Rule], text: &str) -> String {
    rules
        .iter()
        .fold(text.to_string(), |acc, rule| rule.apply(&acc).into_owned())
}

/// Target-specific rules for one conversion direction
#[derive(Debug)]
pub struct RuleSet {
    pub direction: Direction,
    /// Earliest match marks the start of real code
    pub code_anchor: Regex,
    /// Residual source-language lines, then residual keyword substitutions, in order
    pub cleanup: Vec<Rule>,
    /// Cross-language primitive-type spellings
    pub primitives: Vec<Rule>,
    /// Stub declarations handed to the Compiler Oracle next to every candidate
    pub shadow: &'static str,
}

/// Stub SwiftUI/Foundation symbols for a bare `swiftc -parse` style check
pub const SWIFT_SHADOW: &str = r#"// Shadow definitions: framework stubs for syntax-level validation.
protocol View {}
protocol ObservableObject: AnyObject {}
protocol Identifiable {}
struct Text: View { init(_ s: String) {} }
struct VStack<Content>: View { init(@ViewBuilder content: () -> Content) {} }
struct HStack<Content>: View { init(@ViewBuilder content: () -> Content) {} }
struct NavigationStack<Content>: View { init(@ViewBuilder content: () -> Content) {} }
struct Button<Label>: View { init(_ title: String, action: @escaping () -> Void) {} }
@resultBuilder struct ViewBuilder { static func buildBlock<C>(_ c: C...) -> C? { c.first } }
@propertyWrapper struct State<Value> { var wrappedValue: Value }
@propertyWrapper struct Published<Value> { var wrappedValue: Value }
@propertyWrapper struct StateObject<Value> { var wrappedValue: Value }
@propertyWrapper struct ObservedObject<Value> { var wrappedValue: Value }
@propertyWrapper struct EnvironmentObject<Value> { var wrappedValue: Value }
@propertyWrapper struct AppStorage<Value> { var wrappedValue: Value; init(wrappedValue: Value, _ key: String) { self.wrappedValue = wrappedValue } }
class UserDefaults { static let standard = UserDefaults() }
class URLSession { static let shared = URLSession() }
"#;

/// Stub Android/Jetpack symbols for a bare `kotlinc` style check
pub const KOTLIN_SHADOW: &str = r#"// Shadow definitions: framework stubs for syntax-level validation.
annotation class Composable
annotation class Inject
annotation class HiltViewModel
open class ViewModel
open class Activity
open class Fragment
open class Context
class Intent
class Bundle
interface StateFlow<T> { val value: T }
class MutableStateFlow<T>(override var value: T) : StateFlow<T>
open class LiveData<T>
class MutableLiveData<T> : LiveData<T>()
class SharedPreferences
object Modifier
fun <T> mutableStateOf(value: T): MutableStateFlow<T> = MutableStateFlow(value)
"#;

lazy_static! {
    /// Type declaration: keyword then a capitalized identifier
    pub static ref TYPE_DECLARATION: Regex =
        Regex::new(r"\b(?:class|struct|interface|protocol|enum|object|actor)\s+([A-Z][A-Za-z0-9_]*)").unwrap();

    /// Function declaration (`fun`, `func`), including Kotlin extension receivers
    pub static ref FUNCTION_DECLARATION: Regex = Regex::new(
        r"\b(?:fun|func)\s+(?:<[^>]*>\s*)?(?:[A-Za-z_][A-Za-z0-9_]*\.)?([A-Za-z_][A-Za-z0-9_]*)\s*[(<]"
    )
    .unwrap();

    /// State or variable declaration
    pub static ref STATE_DECLARATION: Regex =
        Regex::new(r"\b(?:val|var|let)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap();

    /// Persisted-storage key literals (SharedPreferences, DataStore, UserDefaults, AppStorage)
    pub static ref PERSISTED_KEY: Regex = Regex::new(
        r#"(?:(?:get|put)(?:String|Int|Boolean|Long|Float|StringSet)\(\s*"([^"]+)"|forKey:\s*"([^"]+)"|@AppStorage\(\s*"([^"]+)"|PreferencesKey\(\s*"([^"]+)"|getSharedPreferences\(\s*"([^"]+)")"#
    )
    .unwrap();

    /// External-payload key literals (intent extras, notification userInfo, query parameters)
    pub static ref PAYLOAD_KEY: Regex = Regex::new(
        r#"(?:putExtra\(\s*"([^"]+)"|get(?:String|Int|Boolean|Long|Parcelable|Serializable)Extra\(\s*"([^"]+)"|userInfo\??\[\s*"([^"]+)"\]|(?:getQueryParameter|queryParameter)\(\s*"([^"]+)"|URLQueryItem\(\s*name:\s*"([^"]+)")"#
    )
    .unwrap();

    /// Opening or closing code fence with its optional language tag
    pub static ref CODE_FENCE: Regex = Regex::new(r"```[A-Za-z0-9_+#.\-]*").unwrap();

    /// Diagnostic line that only complains about an unresolvable external module
    pub static ref MODULE_NOT_FOUND: Regex = Regex::new(
        r#"(?i)(?:no such module|module ['"]?[\w.]+['"]? not found|unresolved import|cannot find module|could not find module|unresolved reference:?\s*['"]?(?:android|androidx|kotlinx|dagger|hilt|retrofit|okhttp)\b)"#
    )
    .unwrap();

    /// First line of a tail that still reads as code: comments, attributes, declarations
    /// (modifiers included), statements and assignments
    pub static ref CODE_LIKE_LINE: Regex = Regex::new(
        r"^(?://|/\*|\*|@|#|(?:let|var|val|return|if|else|case|switch|guard|when|import|func|fun|private|public|internal|fileprivate|open|final|static|override|abstract|lateinit|const|typealias|class|object|struct|enum|protocol|interface|extension|actor|sealed|data)\b)|[{};)\]]$|^[A-Za-z_][\w.]*(?:\s*:\s*[\w<>?\[\], .]+)?\s*[-+*/]?=[^=]"
    )
    .unwrap();

    static ref KOTLIN_TO_SWIFT: RuleSet = RuleSet {
        direction: Direction::KotlinToSwift,
        code_anchor: Regex::new(
            r"(?m)^[ \t]*(?:import\s+\w|@testable\s+import\b|@main\b|@MainActor\b|@Observable\b|(?:(?:public|private|internal|fileprivate|open|final)\s+)*(?:struct|class|enum|protocol|extension|actor|typealias|func)\s+\w)"
        )
        .unwrap(),
        cleanup: vec![
            Rule::remove("package-line", r"(?m)^[ \t]*package\s+[\w.]+;?[ \t]*\r?\n?"),
            Rule::remove(
                "android-import",
                r"(?m)^[ \t]*import\s+(?:android|androidx|kotlinx?|java|javax|dagger)\.[\w.*]+[ \t]*\r?\n?",
            ),
            Rule::replace(
                "fun-keyword",
                r"(?m)^([ \t]*(?:(?:public|private|internal|open|override|suspend|inline|static|final)\s+)*)fun\s+",
                "${1}func ",
            ),
            Rule::replace(
                "val-keyword",
                r"(?m)^([ \t]*(?:(?:public|private|internal|open|override|lateinit|static|final)\s+)*)val\s+",
                "${1}let ",
            ),
            Rule::replace("null-literal", r"((?:[=!]=?|\breturn|[(,:?])\s*)null\b", "${1}nil"),
            Rule::replace("println-call", r"\bprintln\(", "print("),
            Rule::replace("this-receiver", r"\bthis\.", "self."),
            Rule::replace("force-unwrap", r"!!", "!"),
        ],
        primitives: vec![
            Rule::replace("boolean", r"\bBoolean\b", "Bool"),
            Rule::replace("unit", r"\bUnit\b", "Void"),
            Rule::replace("long", r"\bLong\b", "Int64"),
            Rule::replace("short", r"\bShort\b", "Int16"),
            Rule::replace("byte", r"\bByte\b", "Int8"),
            Rule::replace("char", r"\bChar\b", "Character"),
        ],
        shadow: SWIFT_SHADOW,
    };

    static ref SWIFT_TO_KOTLIN: RuleSet = RuleSet {
        direction: Direction::SwiftToKotlin,
        code_anchor: Regex::new(
            r"(?m)^[ \t]*(?:package\s+\w|import\s+\w|@(?:Composable|HiltViewModel|Inject|Serializable|Parcelize)\b|(?:(?:public|private|internal|open|abstract|sealed|data|enum|inline|value|annotation)\s+)*(?:class|interface|object|fun|typealias)\s+\w)"
        )
        .unwrap(),
        cleanup: vec![
            Rule::remove(
                "apple-import",
                r"(?m)^[ \t]*import\s+(?:SwiftUI|UIKit|Foundation|Combine|CoreData|Observation)[ \t]*\r?\n?",
            ),
            Rule::replace(
                "func-keyword",
                r"(?m)^([ \t]*(?:(?:public|private|internal|fileprivate|open|override|static|final|mutating)\s+)*)func\s+",
                "${1}fun ",
            ),
            Rule::replace("let-keyword", r"(?m)^([ \t]*(?:(?:private|public|internal)\s+)?)let\s+", "${1}val "),
            Rule::replace("nil-literal", r"((?:[=!]=?|\breturn|[(,:?])\s*)nil\b", "${1}null"),
            Rule::replace("self-receiver", r"\bself\.", "this."),
        ],
        primitives: vec![
            Rule::replace("bool", r"\bBool\b", "Boolean"),
            Rule::replace("void", r"\bVoid\b", "Unit"),
            Rule::replace("int64", r"\bInt64\b", "Long"),
            Rule::replace("int32", r"\bInt32\b", "Int"),
            Rule::replace("int16", r"\bInt16\b", "Short"),
            Rule::replace("int8", r"\bInt8\b", "Byte"),
            Rule::replace("character", r"\bCharacter\b", "Char"),
        ],
        shadow: KOTLIN_SHADOW,
    };
}

/// Rule set for a conversion direction
pub fn rule_set(direction: Direction) -> &'static RuleSet {
    match direction {
        Direction::KotlinToSwift => &KOTLIN_TO_SWIFT,
        Direction::SwiftToKotlin => &SWIFT_TO_KOTLIN,
    }
}

/// Navigation call vocabulary (lowercase substrings)
pub const NAVIGATION_VOCABULARY: &[&str] = &[
    "navcontroller",
    "navigate(",
    "navhost",
    "popbackstack",
    "startactivity",
    "fragmentmanager",
    "navigationstack",
    "navigationlink",
    "navigationview",
    "navigationdestination",
    "pushviewcontroller",
    "present(",
];

/// State-management framework vocabulary
pub const STATE_MANAGEMENT_VOCABULARY: &[&str] = &[
    "stateflow",
    "mutablestateflow",
    "livedata",
    "mutablestateof",
    "viewmodelscope",
    "collectasstate",
    "observableobject",
    "@published",
    "@state",
    "@observable",
    "@stateobject",
    "@environmentobject",
    "combine",
];

/// Service-binding call vocabulary
pub const SERVICE_VOCABULARY: &[&str] = &[
    "bindservice",
    "startservice",
    "startforegroundservice",
    "serviceconnection",
    "workmanager",
    "jobscheduler",
    "retrofit",
    "okhttp",
    "urlsession",
    "bgtaskscheduler",
];

/// Deep-link handler vocabulary
pub const DEEP_LINK_VOCABULARY: &[&str] = &[
    "deeplink",
    "deep_link",
    "navdeeplink",
    "onnewintent",
    "action_view",
    "uri.parse",
    "onopenurl",
    "handlesexternalevents",
    "continue useractivity",
    "open url:",
];

/// Path keywords worth +2 each
pub const PATH_KEYWORDS: &[&str] = &[
    "viewmodel",
    "repository",
    "manager",
    "service",
    "navigation",
    "navgraph",
    "router",
    "coordinator",
    "activity",
    "application",
    "appdelegate",
    "store",
    "module",
    "database",
];

/// Content keywords worth +1 each (matched case-insensitively)
pub const CONTENT_KEYWORDS: &[&str] = &[
    "stateflow",
    "livedata",
    "mutablestate",
    "viewmodel",
    "repository",
    "@inject",
    "@hiltviewmodel",
    "@module",
    "@singleton",
    "companion object",
    "navcontroller",
    "navhost",
    "startactivity",
    "sharedpreferences",
    "datastore",
    "@dao",
    "@database",
    "bindservice",
    "observableobject",
    "@published",
    "@environmentobject",
    "@main",
    "userdefaults",
    "navigationstack",
    "coredata",
    "suspend fun",
    "coroutinescope",
    "viewmodelscope",
];

/// First capture group that matched
pub fn first_capture(caps: &regex::Captures<'_>) -> Option<String> {
    caps.iter()
        .skip(1)
        .flatten()
        .next()
        .map(|m| m.as_str().to_string())
}
