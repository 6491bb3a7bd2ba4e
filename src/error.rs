//! Error types for phpfacts.
//!
//! Only a handful of conditions abort a scan: an unusable scan root, a broken
//! configuration file, or a worker pool that cannot be built. Everything that
//! goes wrong with an individual file is recorded as a [`FileWarning`] and the
//! scan carries on.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors that stop a scan before a facts model can be produced.
#[derive(Debug, Error)]
pub enum Error {
    #[error("scan root {path} is not readable: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scan root {0} is not a directory")]
    RootNotDirectory(PathBuf),

    #[error("cannot read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid exclusion glob {pattern:?}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong with a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    Unreadable,
    TooLarge,
    WalkError,
    NonUtf8,
    InvalidManifest,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WarningKind::Unreadable => "unreadable",
            WarningKind::TooLarge => "too_large",
            WarningKind::WalkError => "walk_error",
            WarningKind::NonUtf8 => "non_utf8",
            WarningKind::InvalidManifest => "invalid_manifest",
        };
        f.write_str(s)
    }
}

/// A recoverable, file-level problem. The file contributes no (or partial)
/// facts and the scan continues.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileWarning {
    pub path: String,
    pub kind: WarningKind,
    pub message: String,
}

impl FileWarning {
    pub fn new(path: impl Into<String>, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.path, self.kind, self.message)
    }
}
