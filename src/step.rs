use crate::block::{self, ScanError};
use regex::{NoExpand, Regex, RegexBuilder};
use std::fmt;
use thiserror::Error;

/// One edit in a patch sequence.
///
/// A step never fails: when its target is missing the buffer comes back
/// unchanged and the [`StepStatus`] says why.
#[derive(Debug, Clone)]
#[must_use = "Step does nothing until apply() is called"]
pub struct Step {
    pub id: String,
    pub kind: StepKind,
    /// Literals that must all be present before the step may edit.
    pub requires: Vec<String>,
    /// Literals that mark the edit as already made. Any one of them present
    /// skips the step as `AlreadyApplied`.
    pub unless: Vec<String>,
    /// Optional steps never count as misses.
    pub optional: bool,
}

#[derive(Debug, Clone)]
pub enum StepKind {
    /// Literal substring replacement, first occurrence only.
    Exact { search: String, replace: String },
    /// Regex substitution.
    Regex {
        regex: Regex,
        replace: String,
        /// Replace every match rather than the first.
        all: bool,
        /// Expand `$1` / `${name}` in `replace`.
        expand: bool,
    },
    /// Replace the delimiter-balanced block that begins at `start`.
    Block {
        start: String,
        replace: String,
        trailing_newlines: usize,
    },
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Exact { .. } => "text",
            StepKind::Regex { .. } => "regex",
            StepKind::Block { .. } => "block",
        }
    }

    /// Literal text the step looks for, if it has one.
    pub fn search_literal(&self) -> Option<&str> {
        match self {
            StepKind::Exact { search, .. } => Some(search),
            StepKind::Block { start, .. } => Some(start),
            StepKind::Regex { .. } => None,
        }
    }

    fn replacement(&self) -> &str {
        match self {
            StepKind::Exact { replace, .. }
            | StepKind::Regex { replace, .. }
            | StepKind::Block { replace, .. } => replace,
        }
    }
}

/// Options for building a regex step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegexFlags {
    pub dot_all: bool,
    pub multi_line: bool,
    pub all: bool,
    pub expand: bool,
}

#[derive(Error, Debug)]
pub enum StepError {
    #[error("invalid regex in step '{id}': {source}")]
    InvalidRegex {
        id: String,
        #[source]
        source: regex::Error,
    },
}

/// What a step did to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// The buffer was edited.
    Applied { replacements: usize },
    /// Target absent but the replacement is in place, or an `unless`
    /// literal was found.
    AlreadyApplied,
    /// Target absent and nothing indicates the edit already happened.
    NoMatch,
    /// A required literal was missing; the step did not run.
    Unmet { requirement: String },
    /// The block start was found but its delimiters do not balance.
    Unbalanced { offset: usize, reason: String },
}

impl StepStatus {
    pub fn changed(&self) -> bool {
        matches!(self, StepStatus::Applied { .. })
    }

    /// True when the step neither edited nor found its edit in place.
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            StepStatus::NoMatch | StepStatus::Unmet { .. } | StepStatus::Unbalanced { .. }
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Applied { replacements: 1 } => write!(f, "applied"),
            StepStatus::Applied { replacements } => {
                write!(f, "applied ({} replacements)", replacements)
            }
            StepStatus::AlreadyApplied => write!(f, "already applied"),
            StepStatus::NoMatch => write!(f, "pattern not found"),
            StepStatus::Unmet { requirement } => {
                write!(f, "precondition not met: {:?} missing", requirement)
            }
            StepStatus::Unbalanced { offset, reason } => {
                write!(f, "unbalanced block at byte {}: {}", offset, reason)
            }
        }
    }
}

/// Result of applying a step: the next buffer and what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "StepOutcome carries the transformed buffer"]
pub struct StepOutcome {
    pub buffer: String,
    pub status: StepStatus,
}

impl StepOutcome {
    fn unchanged(buffer: String, status: StepStatus) -> Self {
        Self { buffer, status }
    }
}

impl Step {
    pub fn exact(
        id: impl Into<String>,
        search: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self::with_kind(
            id,
            StepKind::Exact {
                search: search.into(),
                replace: replace.into(),
            },
        )
    }

    pub fn regex(
        id: impl Into<String>,
        pattern: &str,
        replace: impl Into<String>,
        flags: RegexFlags,
    ) -> Result<Self, StepError> {
        let id = id.into();
        let regex = RegexBuilder::new(pattern)
            .dot_matches_new_line(flags.dot_all)
            .multi_line(flags.multi_line)
            .build()
            .map_err(|source| StepError::InvalidRegex {
                id: id.clone(),
                source,
            })?;
        Ok(Self::with_kind(
            id,
            StepKind::Regex {
                regex,
                replace: replace.into(),
                all: flags.all,
                expand: flags.expand,
            },
        ))
    }

    pub fn block(
        id: impl Into<String>,
        start: impl Into<String>,
        replace: impl Into<String>,
        trailing_newlines: usize,
    ) -> Self {
        Self::with_kind(
            id,
            StepKind::Block {
                start: start.into(),
                replace: replace.into(),
                trailing_newlines,
            },
        )
    }

    fn with_kind(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            kind,
            requires: Vec::new(),
            unless: Vec::new(),
            optional: false,
        }
    }

    pub fn requires(mut self, literal: impl Into<String>) -> Self {
        self.requires.push(literal.into());
        self
    }

    pub fn unless(mut self, literal: impl Into<String>) -> Self {
        self.unless.push(literal.into());
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Apply this step, consuming the buffer and returning its successor.
    pub fn apply(&self, buffer: String) -> StepOutcome {
        if let Some(missing) = self.requires.iter().find(|r| !buffer.contains(r.as_str())) {
            return StepOutcome::unchanged(
                buffer,
                StepStatus::Unmet {
                    requirement: missing.clone(),
                },
            );
        }

        if self.unless.iter().any(|u| buffer.contains(u.as_str())) {
            return StepOutcome::unchanged(buffer, StepStatus::AlreadyApplied);
        }

        match &self.kind {
            StepKind::Exact { search, replace } => {
                if search.is_empty() {
                    return self.missed(buffer);
                }
                match buffer.find(search.as_str()) {
                    Some(start) => {
                        let buffer = splice(&buffer, start, start + search.len(), replace);
                        StepOutcome {
                            buffer,
                            status: StepStatus::Applied { replacements: 1 },
                        }
                    }
                    None => self.missed(buffer),
                }
            }
            StepKind::Regex {
                regex,
                replace,
                all,
                expand,
            } => {
                let found = regex.find_iter(&buffer).count();
                if found == 0 {
                    return self.missed(buffer);
                }
                let (limit, replacements) = if *all { (0, found) } else { (1, 1) };
                let next = if *expand {
                    regex.replacen(&buffer, limit, replace.as_str())
                } else {
                    regex.replacen(&buffer, limit, NoExpand(replace))
                };
                StepOutcome {
                    buffer: next.into_owned(),
                    status: StepStatus::Applied { replacements },
                }
            }
            StepKind::Block {
                start,
                replace,
                trailing_newlines,
            } => {
                let Some(begin) = buffer.find(start.as_str()).filter(|_| !start.is_empty()) else {
                    return self.missed(buffer);
                };
                match block::block_end(&buffer[begin..], *trailing_newlines) {
                    Ok(len) => {
                        let buffer = splice(&buffer, begin, begin + len, replace);
                        StepOutcome {
                            buffer,
                            status: StepStatus::Applied { replacements: 1 },
                        }
                    }
                    Err(err) => {
                        let offset = begin + err.offset().unwrap_or(0);
                        StepOutcome::unchanged(
                            buffer,
                            StepStatus::Unbalanced {
                                offset,
                                reason: scan_reason(&err),
                            },
                        )
                    }
                }
            }
        }
    }

    /// Classify a buffer the step did not match.
    ///
    /// A non-empty replacement already present means an earlier run landed
    /// the edit. A deletion whose target is gone is treated the same way.
    fn missed(&self, buffer: String) -> StepOutcome {
        let replace = self.kind.replacement();
        let status = if replace.is_empty() || buffer.contains(replace) {
            StepStatus::AlreadyApplied
        } else {
            StepStatus::NoMatch
        };
        StepOutcome::unchanged(buffer, status)
    }
}

fn scan_reason(err: &ScanError) -> String {
    match err {
        ScanError::NoOpening => "no opening delimiter after block start".to_string(),
        other => other.to_string(),
    }
}

fn splice(buffer: &str, start: usize, end: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(buffer.len() - (end - start) + replacement.len());
    out.push_str(&buffer[..start]);
    out.push_str(replacement);
    out.push_str(&buffer[end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_absent_is_identity() {
        let step = Step::exact("s", "not here", "x");
        let outcome = step.apply("const a = 1;\n".to_string());
        assert_eq!(outcome.buffer, "const a = 1;\n");
        assert_eq!(outcome.status, StepStatus::NoMatch);
    }

    #[test]
    fn test_exact_single_occurrence() {
        let step = Step::exact("s", "b = 2", "b = 3");
        let outcome = step.apply("a = 1;\nb = 2;\nc = 3;\n".to_string());
        assert_eq!(outcome.buffer, "a = 1;\nb = 3;\nc = 3;\n");
        assert!(outcome.status.changed());
    }

    #[test]
    fn test_exact_first_match_only() {
        let step = Step::exact("s", "foo", "bar");
        let outcome = step.apply("foo foo".to_string());
        assert_eq!(outcome.buffer, "bar foo");
        assert_eq!(outcome.status, StepStatus::Applied { replacements: 1 });
    }

    #[test]
    fn test_exact_already_applied() {
        let step = Step::exact("s", "old()", "fresh()");
        let outcome = step.apply("call fresh();".to_string());
        assert_eq!(outcome.buffer, "call fresh();");
        assert_eq!(outcome.status, StepStatus::AlreadyApplied);
    }

    #[test]
    fn test_exact_wrapping_replacement_edits_first_match() {
        let step = Step::exact("s", "foo", "foo!");
        let outcome = step.apply("foo! foo".to_string());
        assert_eq!(outcome.buffer, "foo!! foo");
        assert_eq!(outcome.status, StepStatus::Applied { replacements: 1 });

        let step = Step::exact("s", "b", "ab");
        assert_eq!(step.apply("b ab".to_string()).buffer, "ab ab");
    }

    #[test]
    fn test_unless_literal_blocks_reapplication() {
        let step = Step::exact("s", "tail()", "head();\ntail()").unless("head();");
        let once = step.apply("tail()".to_string());
        assert_eq!(once.buffer, "head();\ntail()");
        assert!(once.status.changed());

        let twice = step.apply(once.buffer);
        assert_eq!(twice.buffer, "head();\ntail()");
        assert_eq!(twice.status, StepStatus::AlreadyApplied);
    }

    #[test]
    fn test_requires_checked_before_unless() {
        let step = Step::exact("s", "a", "b").requires("gate").unless("done");
        let outcome = step.apply("a done".to_string());
        assert!(matches!(outcome.status, StepStatus::Unmet { .. }));
        assert_eq!(outcome.buffer, "a done");
    }

    #[test]
    fn test_exact_empty_search_never_matches() {
        let step = Step::exact("s", "", "x");
        let outcome = step.apply("abc".to_string());
        assert_eq!(outcome.buffer, "abc");
        assert_eq!(outcome.status, StepStatus::NoMatch);
    }

    #[test]
    fn test_regex_dot_all_block_removal() {
        let step = Step::regex(
            "drop-memo",
            r"  const memo = useMemo\(\(\) => \{[^}]+\}, \[a\]\);\n\n",
            "",
            RegexFlags {
                dot_all: true,
                all: true,
                ..Default::default()
            },
        )
        .unwrap();
        let input = "before\n  const memo = useMemo(() => {\n    return a;\n  }, [a]);\n\nafter\n";
        let outcome = step.apply(input.to_string());
        assert_eq!(outcome.buffer, "before\nafter\n");
        assert_eq!(outcome.status, StepStatus::Applied { replacements: 1 });
    }

    #[test]
    fn test_regex_first_vs_all() {
        let flags = RegexFlags::default();
        let first = Step::regex("s", r"\d+", "N", flags).unwrap();
        assert_eq!(first.apply("1 22 333".to_string()).buffer, "N 22 333");

        let all = Step::regex("s", r"\d+", "N", RegexFlags { all: true, ..flags }).unwrap();
        let outcome = all.apply("1 22 333".to_string());
        assert_eq!(outcome.buffer, "N N N");
        assert_eq!(outcome.status, StepStatus::Applied { replacements: 3 });
    }

    #[test]
    fn test_regex_replacement_is_literal_by_default() {
        let step = Step::regex("s", r"(\w+)", "$1-x", RegexFlags::default()).unwrap();
        assert_eq!(step.apply("word".to_string()).buffer, "$1-x");

        let expanding = Step::regex(
            "s",
            r"(\w+)",
            "${1}-x",
            RegexFlags {
                expand: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(expanding.apply("word".to_string()).buffer, "word-x");
    }

    #[test]
    fn test_regex_deletion_without_match_is_already_applied() {
        let step = Step::regex("s", r"gone\n", "", RegexFlags::default()).unwrap();
        let outcome = step.apply("kept\n".to_string());
        assert_eq!(outcome.buffer, "kept\n");
        assert_eq!(outcome.status, StepStatus::AlreadyApplied);
    }

    #[test]
    fn test_regex_invalid_pattern() {
        let result = Step::regex("bad", r"useMemo\(", "", RegexFlags::default());
        assert!(result.is_ok());
        let result = Step::regex("bad", r"useMemo(", "", RegexFlags::default());
        assert!(matches!(result, Err(StepError::InvalidRegex { .. })));
    }

    #[test]
    fn test_block_removes_nested_block() {
        let input = "  const a = 1;
  const memo = useMemo(() => {
    if (x) { return { y: '}' }; }
    return null;
  }, [x]);

  const b = 2;
";
        let step = Step::block("drop", "  const memo = useMemo(", "", 2);
        let outcome = step.apply(input.to_string());
        assert_eq!(outcome.buffer, "  const a = 1;\n  const b = 2;\n");
    }

    #[test]
    fn test_block_unbalanced_leaves_buffer() {
        let input = "const memo = useMemo(() => {\n  return 1;\n";
        let step = Step::block("drop", "const memo", "", 0);
        let outcome = step.apply(input.to_string());
        assert_eq!(outcome.buffer, input);
        assert!(matches!(outcome.status, StepStatus::Unbalanced { offset: 20, .. }));
    }

    #[test]
    fn test_requires_blocks_step() {
        let step = Step::exact("s", "a", "b").requires("marker");
        let outcome = step.apply("a".to_string());
        assert_eq!(outcome.buffer, "a");
        assert_eq!(
            outcome.status,
            StepStatus::Unmet {
                requirement: "marker".to_string()
            }
        );

        let outcome = step.apply("a marker".to_string());
        assert_eq!(outcome.buffer, "b marker");
    }

    #[test]
    fn test_status_display() {
        assert_eq!(StepStatus::Applied { replacements: 1 }.to_string(), "applied");
        assert!(StepStatus::NoMatch.to_string().contains("not found"));
        assert!(StepStatus::NoMatch.is_miss());
        assert!(!StepStatus::AlreadyApplied.is_miss());
    }
}
