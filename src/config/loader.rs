//! Reading patch sets from TOML text, files and directories.

use crate::config::builtin::default_patch_set;
use crate::config::schema::{PatchConfig, ValidationError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read patch set {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed patch set{}: {source}", origin(.path))]
    Toml {
        path: Option<PathBuf>,
        #[source]
        source: toml_edit::de::Error,
    },

    #[error("invalid patch set{}: {source}", origin(.path))]
    Validation {
        path: Option<PathBuf>,
        #[source]
        source: ValidationError,
    },

    #[error("no .toml patch sets found in {}", .dir.display())]
    Empty { dir: PathBuf },

    #[error("patch sets declare different targets: {}", .targets.join(", "))]
    ConflictingTargets { targets: Vec<String> },
}

fn origin(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" ({})", p.display()))
        .unwrap_or_default()
}

fn parse(input: &str, path: Option<&Path>) -> Result<PatchConfig, ConfigError> {
    let config: PatchConfig =
        toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml {
            path: path.map(Path::to_path_buf),
            source,
        })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation {
            path: path.map(Path::to_path_buf),
            source,
        })?;
    Ok(config)
}

pub fn load_from_str(input: &str) -> Result<PatchConfig, ConfigError> {
    parse(input, None)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(file = %path.display(), "loading patch set");
    parse(&contents, Some(path))
}

/// Load every `.toml` patch set directly inside `dir`, in file-name order.
pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<PatchConfig>, ConfigError> {
    let dir = dir.as_ref();
    let mut sets = Vec::new();

    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| ConfigError::Io {
            path: e.path().unwrap_or(dir).to_path_buf(),
            source: e.into(),
        })?;
        let path = entry.path();
        let is_toml = path.extension().and_then(|s| s.to_str()) == Some("toml");
        if entry.file_type().is_file() && is_toml {
            sets.push(load_from_path(path)?);
        }
    }

    if sets.is_empty() {
        return Err(ConfigError::Empty {
            dir: dir.to_path_buf(),
        });
    }
    Ok(sets)
}

/// Patch sets named by `path`: a file, a directory of files, or the
/// built-in set when `None`.
pub fn load_patch_sets(path: Option<&Path>) -> Result<Vec<PatchConfig>, ConfigError> {
    match path {
        None => Ok(vec![default_patch_set()?]),
        Some(dir) if dir.is_dir() => load_dir(dir),
        Some(file) => Ok(vec![load_from_path(file)?]),
    }
}

/// The single `meta.target` the patch sets agree on, if any declares one.
pub fn common_target(sets: &[PatchConfig]) -> Result<Option<&str>, ConfigError> {
    let mut targets: Vec<&str> = Vec::new();
    for target in sets.iter().filter_map(|set| set.meta.target.as_deref()) {
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    match targets.as_slice() {
        [] => Ok(None),
        [target] => Ok(Some(*target)),
        _ => Err(ConfigError::ConflictingTargets {
            targets: targets.iter().map(|t| t.to_string()).collect(),
        }),
    }
}
