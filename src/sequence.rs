//! Ordered application of steps over one buffer.
//!
//! Steps run strictly in insertion order and each one sees the buffer left
//! by its predecessor. Later steps may depend on text earlier steps insert;
//! those dependencies can be stated with [`Step::requires`].

use crate::diagnose::{explain_miss, NearMiss};
use crate::step::{Step, StepStatus};
use thiserror::Error;

/// An ordered list of steps. Insertion order is application order.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    steps: Vec<Step>,
}

/// Per-step outcome recorded during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub id: String,
    pub kind: &'static str,
    pub status: StepStatus,
    pub optional: bool,
    /// Closest line to the missing literal, located in the buffer this
    /// step received. Only set for `NoMatch`.
    pub hint: Option<NearMiss>,
}

impl StepReport {
    /// A miss on a step that is not optional.
    pub fn is_required_miss(&self) -> bool {
        !self.optional && self.status.is_miss()
    }
}

/// Final buffer plus one report per step.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "RunOutput carries the transformed buffer"]
pub struct RunOutput {
    pub buffer: String,
    pub reports: Vec<StepReport>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("{} of {total} steps did not apply: {}", .missed.len(), .missed.join(", "))]
    Incomplete { missed: Vec<String>, total: usize },
}

impl RunOutput {
    /// True when at least one step edited the buffer.
    pub fn changed(&self) -> bool {
        self.reports.iter().any(|r| r.status.changed())
    }

    pub fn applied(&self) -> usize {
        self.reports.iter().filter(|r| r.status.changed()).count()
    }

    pub fn misses(&self) -> impl Iterator<Item = &StepReport> {
        self.reports.iter().filter(|r| r.is_required_miss())
    }

    /// Fail when any non-optional step missed its target.
    pub fn ensure_complete(&self) -> Result<(), SequenceError> {
        let missed: Vec<String> = self.misses().map(|r| r.id.clone()).collect();
        if missed.is_empty() {
            Ok(())
        } else {
            Err(SequenceError::Incomplete {
                missed,
                total: self.reports.len(),
            })
        }
    }
}

impl Sequence {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn extend(&mut self, other: Sequence) {
        self.steps.extend(other.steps);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Thread `buffer` through every step in order.
    pub fn run(&self, buffer: String) -> RunOutput {
        let mut current = buffer;
        let mut reports = Vec::with_capacity(self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            let outcome = step.apply(current);
            current = outcome.buffer;

            match &outcome.status {
                StepStatus::Applied { replacements } => {
                    tracing::debug!(step = %step.id, index, replacements, "step applied");
                }
                StepStatus::AlreadyApplied => {
                    tracing::debug!(step = %step.id, index, "step already applied");
                }
                status => {
                    tracing::info!(step = %step.id, index, %status, "step made no change");
                }
            }

            // A miss leaves the buffer as the step saw it
            let hint = match outcome.status {
                StepStatus::NoMatch => explain_miss(step, &current),
                _ => None,
            };

            reports.push(StepReport {
                id: step.id.clone(),
                kind: step.kind.name(),
                status: outcome.status,
                optional: step.optional,
                hint,
            });
        }

        RunOutput {
            buffer: current,
            reports,
        }
    }
}

impl FromIterator<Step> for Sequence {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Apply `sequence` to `buffer` and return the final buffer.
pub fn apply(buffer: String, sequence: &Sequence) -> String {
    sequence.run(buffer).buffer
}
