//! Source Patcher: ordered textual patches over a single source file
//!
//! Reads one file into memory, threads it through an ordered [`Sequence`]
//! of [`Step`]s and writes the result back.
//!
//! # Architecture
//!
//! A step is one of three edits:
//!
//! - **text**: literal substring replacement, first occurrence only
//! - **regex**: regex substitution, first match or all matches
//! - **block**: replacement of a `()[]{}`-balanced block found by scanning,
//!   not by regex
//!
//! Steps never error. A step whose target is missing hands the buffer back
//! unchanged and reports a [`StepStatus`], so drift between a patch set and
//! the file it was written against shows up in the run report instead of
//! passing silently.
//!
//! # Example
//!
//! ```
//! use source_patcher::{Sequence, Step, StepStatus};
//!
//! let sequence = Sequence::new(vec![
//!     Step::exact(
//!         "add-state",
//!         "const [x] = useState(null);\n",
//!         "const [x] = useState(null);\nconst [loading] = useState(false);\n",
//!     ),
//! ]);
//!
//! let output = sequence.run("const [x] = useState(null);\n".to_string());
//! assert!(output.buffer.contains("loading"));
//! assert_eq!(output.reports[0].status, StepStatus::Applied { replacements: 1 });
//! ```

pub mod block;
pub mod buffer;
pub mod config;
pub mod diagnose;
pub mod sequence;
pub mod step;

// Re-exports
pub use buffer::{load, store, BufferError, WriteMode};
pub use config::{
    default_patch_set, load_from_path, load_from_str, ConfigError, PatchConfig, ValidationError,
};
pub use diagnose::{explain_miss, NearMiss};
pub use sequence::{apply, RunOutput, Sequence, SequenceError, StepReport};
pub use step::{RegexFlags, Step, StepError, StepKind, StepOutcome, StepStatus};
