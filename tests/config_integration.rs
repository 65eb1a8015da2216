//! Integration tests for patch-set configuration
//!
//! Tests parsing, validation, and compiling patch sets into sequences

use source_patcher::config::{
    load_from_path, load_from_str, ConfigError, Operation, Query, ValidationIssue,
};
use source_patcher::StepStatus;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_patch_set_basic() {
    let toml = r#"
[meta]
name = "test-patches"
description = "Test patch set"
target = "src/App.tsx"

[[steps]]
id = "step-1"
description = "rename the flag"

[steps.query]
type = "text"
search = "const flag = false;"

[steps.operation]
type = "replace"
text = "const flag = true;"
"#;

    let config = load_from_str(toml).expect("Failed to parse config");

    assert_eq!(config.meta.name, "test-patches");
    assert_eq!(config.meta.target.as_deref(), Some("src/App.tsx"));
    assert_eq!(config.steps.len(), 1);
    assert_eq!(config.steps[0].id, "step-1");
    assert!(!config.steps[0].optional);
    assert!(matches!(config.steps[0].query, Query::Text { .. }));
}

#[test]
fn test_load_regex_defaults() {
    let toml = r#"
[[steps]]
id = "drop-debug"

[steps.query]
type = "regex"
pattern = 'console\.debug\(.*\);\n'

[steps.operation]
type = "delete"
"#;

    let config = load_from_str(toml).unwrap();
    match &config.steps[0].query {
        Query::Regex {
            dot_all,
            multi_line,
            all,
            ..
        } => {
            assert!(!dot_all);
            assert!(!multi_line);
            assert!(all);
        }
        other => panic!("Expected regex query, got {:?}", other),
    }
    assert!(matches!(config.steps[0].operation, Operation::Delete));
}

#[test]
fn test_load_block_query() {
    let toml = r#"
[[steps]]
id = "drop-memo"
requires = ["const [ready, setReady]"]
optional = true

[steps.query]
type = "block"
start = "  const ready = useMemo("
trailing_newlines = 2

[steps.operation]
type = "delete"
"#;

    let config = load_from_str(toml).unwrap();
    let step = &config.steps[0];
    assert!(step.optional);
    assert_eq!(step.requires, vec!["const [ready, setReady]".to_string()]);
    assert!(matches!(
        step.query,
        Query::Block {
            trailing_newlines: 2,
            ..
        }
    ));
}

#[test]
fn test_unless_skips_step_once_marker_present() {
    let toml = r#"
[[steps]]
id = "wrap-call"
unless = ["guard();"]

[steps.query]
type = "text"
search = "call();"

[steps.operation]
type = "replace"
text = "guard();\ncall();"
"#;

    let config = load_from_str(toml).unwrap();
    assert_eq!(config.steps[0].unless, vec!["guard();".to_string()]);

    let sequence = config.sequence().unwrap();
    let once = sequence.run("call();".to_string());
    assert_eq!(once.buffer, "guard();\ncall();");

    let twice = sequence.run(once.buffer.clone());
    assert_eq!(twice.buffer, once.buffer);
    assert_eq!(twice.reports[0].status, StepStatus::AlreadyApplied);
}

#[test]
fn test_validation_rejects_empty_unless_entry() {
    let toml = r#"
[[steps]]
id = "s"
unless = [""]

[steps.query]
type = "text"
search = "a"

[steps.operation]
type = "delete"
"#;

    let err = load_from_str(toml).unwrap_err();
    assert!(err.to_string().contains("unless entries must not be empty"));
}

#[test]
fn test_validation_collects_all_issues() {
    let toml = r#"
[[steps]]
id = "dup"

[steps.query]
type = "text"
search = ""

[steps.operation]
type = "replace"
text = "x"
expand = true

[[steps]]
id = "dup"

[steps.query]
type = "regex"
pattern = "unclosed("

[steps.operation]
type = "delete"
"#;

    let err = load_from_str(toml).unwrap_err();
    let ConfigError::Validation { source, .. } = &err else {
        panic!("Expected validation error, got {err}");
    };

    assert!(source.issues.iter().any(|i| matches!(
        i,
        ValidationIssue::MissingField {
            field: "query.search",
            ..
        }
    )));
    assert!(source
        .issues
        .iter()
        .any(|i| matches!(i, ValidationIssue::InvalidCombo { .. })));
    assert!(source
        .issues
        .iter()
        .any(|i| matches!(i, ValidationIssue::DuplicateId(id) if id == "dup")));
    assert!(source
        .issues
        .iter()
        .any(|i| matches!(i, ValidationIssue::InvalidRegex { .. })));

    let message = err.to_string();
    assert!(message.contains("invalid patch set"));
    assert!(message.contains("used more than once"));
}

#[test]
fn test_validation_rejects_empty_step_list() {
    let err = load_from_str("[meta]\nname = \"empty\"\n").unwrap_err();
    assert!(err.to_string().contains("contains no steps"));
}

#[test]
fn test_unknown_query_type_is_parse_error() {
    let toml = r#"
[[steps]]
id = "bad"

[steps.query]
type = "ast-grep"
pattern = "fn $NAME()"

[steps.operation]
type = "delete"
"#;

    let err = load_from_str(toml).unwrap_err();
    assert!(matches!(err, ConfigError::Toml { .. }));
}

#[test]
fn test_load_from_path_and_run() {
    let dir = TempDir::new().unwrap();
    let patch_file = dir.path().join("flags.toml");
    fs::write(
        &patch_file,
        r#"
[meta]
name = "flags"

[[steps]]
id = "enable"

[steps.query]
type = "text"
search = "enabled: false"

[steps.operation]
type = "replace"
text = "enabled: true"

[[steps]]
id = "bump-retries"
requires = ["enabled: true"]

[steps.query]
type = "regex"
pattern = 'retries: (\d+)'
all = false

[steps.operation]
type = "replace"
text = "retries: 5 /* was $1 */"
expand = true
"#,
    )
    .unwrap();

    let config = load_from_path(&patch_file).unwrap();
    let sequence = config.sequence().unwrap();

    let output = sequence.run("{ enabled: false, retries: 2, retries: 3 }".to_string());
    assert_eq!(
        output.buffer,
        "{ enabled: true, retries: 5 /* was 2 */, retries: 3 }"
    );
    assert!(output
        .reports
        .iter()
        .all(|r| matches!(r.status, StepStatus::Applied { replacements: 1 })));
}
