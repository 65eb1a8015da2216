use crate::sequence::Sequence;
use crate::step::{RegexFlags, Step, StepError};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatchConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

impl PatchConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.steps.is_empty() {
            issues.push(ValidationIssue::EmptyStepList);
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    step_id: None,
                    field: "id",
                });
            } else if !seen.insert(step.id.as_str()) {
                issues.push(ValidationIssue::DuplicateId(step.id.clone()));
            }

            match &step.query {
                Query::Text { search } => {
                    if search.is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            step_id: Some(step.id.clone()),
                            field: "query.search",
                        });
                    }
                }
                Query::Regex { pattern, .. } => {
                    if pattern.is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            step_id: Some(step.id.clone()),
                            field: "query.pattern",
                        });
                    }
                }
                Query::Block { start, .. } => {
                    if start.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            step_id: Some(step.id.clone()),
                            field: "query.start",
                        });
                    }
                }
            }

            if let Operation::Replace { expand: true, .. } = &step.operation {
                if !matches!(step.query, Query::Regex { .. }) {
                    issues.push(ValidationIssue::InvalidCombo {
                        step_id: Some(step.id.clone()),
                        message: "expand requires a regex query".to_string(),
                    });
                }
            }

            if step.requires.iter().any(|r| r.is_empty()) {
                issues.push(ValidationIssue::InvalidCombo {
                    step_id: Some(step.id.clone()),
                    message: "requires entries must not be empty".to_string(),
                });
            }

            if step.unless.iter().any(|u| u.is_empty()) {
                issues.push(ValidationIssue::InvalidCombo {
                    step_id: Some(step.id.clone()),
                    message: "unless entries must not be empty".to_string(),
                });
            }

            // Compile regexes now so a bad pattern fails at load time
            if let Err(StepError::InvalidRegex { source, .. }) = step.to_step() {
                issues.push(ValidationIssue::InvalidRegex {
                    step_id: step.id.clone(),
                    message: source.to_string(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Compile the step definitions, in order, into a runnable sequence.
    pub fn sequence(&self) -> Result<Sequence, StepError> {
        self.steps.iter().map(StepDefinition::to_step).collect()
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// File the steps were written against.
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StepDefinition {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    /// Skip the step when any of these literals is present.
    #[serde(default)]
    pub unless: Vec<String>,
    #[serde(default)]
    pub optional: bool,
    pub query: Query,
    pub operation: Operation,
}

impl StepDefinition {
    pub fn to_step(&self) -> Result<Step, StepError> {
        let (replace, expand) = match &self.operation {
            Operation::Replace { text, expand } => (text.clone(), *expand),
            Operation::Delete => (String::new(), false),
        };

        let step = match &self.query {
            Query::Text { search } => Step::exact(&self.id, search, replace),
            Query::Regex {
                pattern,
                dot_all,
                multi_line,
                all,
            } => Step::regex(
                &self.id,
                pattern,
                replace,
                RegexFlags {
                    dot_all: *dot_all,
                    multi_line: *multi_line,
                    all: *all,
                    expand,
                },
            )?,
            Query::Block {
                start,
                trailing_newlines,
            } => Step::block(&self.id, start, replace, *trailing_newlines),
        };

        let step = self
            .requires
            .iter()
            .fold(step, |step, literal| step.requires(literal));
        Ok(self
            .unless
            .iter()
            .fold(step, |step, literal| step.unless(literal))
            .optional(self.optional))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Query {
    /// Exact string match, first occurrence
    Text { search: String },
    Regex {
        pattern: String,
        #[serde(default)]
        dot_all: bool,
        #[serde(default)]
        multi_line: bool,
        #[serde(default = "default_true")]
        all: bool,
    },
    /// Delimiter-balanced block beginning with `start`
    Block {
        start: String,
        #[serde(default)]
        trailing_newlines: usize,
    },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Operation {
    Replace {
        text: String,
        #[serde(default)]
        expand: bool,
    },
    Delete,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyStepList,
    MissingField {
        step_id: Option<String>,
        field: &'static str,
    },
    DuplicateId(String),
    InvalidRegex {
        step_id: String,
        message: String,
    },
    InvalidCombo {
        step_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyStepList => write!(f, "patch set contains no steps"),
            ValidationIssue::MissingField { step_id, field } => match step_id {
                Some(id) => write!(f, "step '{id}' missing required field '{field}'"),
                None => write!(f, "step missing required field '{field}'"),
            },
            ValidationIssue::DuplicateId(id) => write!(f, "step id '{id}' is used more than once"),
            ValidationIssue::InvalidRegex { step_id, message } => {
                write!(f, "step '{step_id}' has an invalid regex: {message}")
            }
            ValidationIssue::InvalidCombo { step_id, message } => match step_id {
                Some(id) => write!(f, "step '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid patch set configuration: {message}"),
            },
        }
    }
}
