//! File discovery and reading.
//!
//! The scanner walks the tree once, applies the ignore list, exclusion globs
//! and extension classes from [`ScanConfig`], and hands back candidates in
//! path order. Reading happens separately so it can run on the worker pool.

use std::fs;
use std::path::{Path, PathBuf};

use globset::GlobSet;
use serde::{Deserialize, Serialize};
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanConfig;
use crate::error::{Error, FileWarning, Result, WarningKind};

/// How a file participates in the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionClass {
    /// PHP code: symbols, routes, queries, usage signals.
    Source,
    /// Templates: queries and usage signals only.
    Template,
    /// Connection settings, `.env`, framework YAML.
    Config,
}

/// A file selected for analysis, not yet read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub rel_path: String,
    pub class: ExtensionClass,
}

/// Raw text of one candidate. Dropped once per-file extraction is done.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub rel_path: String,
    pub text: String,
    pub class: ExtensionClass,
    /// Invalid UTF-8 was replaced while decoding.
    pub lossy: bool,
}

impl SourceFile {
    /// Build an in-memory file, mostly useful for tests and embedding.
    pub fn from_text(rel_path: &str, text: &str, class: ExtensionClass) -> Self {
        Self {
            path: PathBuf::from(rel_path),
            rel_path: rel_path.to_string(),
            text: text.to_string(),
            class,
            lossy: false,
        }
    }

    /// File name without directories or extension (`index` for `public/index.php`).
    pub fn stem(&self) -> &str {
        let name = self.rel_path.rsplit('/').next().unwrap_or(&self.rel_path);
        name.split('.').next().unwrap_or(name)
    }
}

/// Candidates plus whatever went wrong while walking.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub candidates: Vec<Candidate>,
    pub warnings: Vec<FileWarning>,
}

/// Walks a project tree and selects the files to analyze.
pub struct FileScanner<'a> {
    root: PathBuf,
    config: &'a ScanConfig,
    excluded: GlobSet,
}

impl<'a> FileScanner<'a> {
    /// Validate the root and prepare the exclusion matcher.
    ///
    /// This is the only place a scan can fail outright.
    pub fn new<P: AsRef<Path>>(root: P, config: &'a ScanConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let metadata = fs::metadata(&root).map_err(|source| Error::RootUnreadable {
            path: root.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(Error::RootNotDirectory(root));
        }
        fs::read_dir(&root).map_err(|source| Error::RootUnreadable {
            path: root.clone(),
            source,
        })?;

        Ok(Self {
            excluded: config.exclusion_matcher()?,
            root,
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree and return candidates sorted by relative path.
    pub fn collect(&self) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        let max_bytes = self.config.max_file_size_bytes();

        for entry in walk(&self.root, self.config) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| relative_path(&self.root, p))
                        .unwrap_or_else(|| ".".to_string());
                    tracing::warn!(%path, error = %e, "skipping unreadable entry");
                    outcome
                        .warnings
                        .push(FileWarning::new(path, WarningKind::WalkError, e.to_string()));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let rel_path = relative_path(&self.root, entry.path());
            if self.excluded.is_match(&rel_path) {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            let Some(class) = self.config.classify(&name) else {
                continue;
            };

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size > max_bytes {
                tracing::warn!(path = %rel_path, size, "file exceeds size cap");
                outcome.warnings.push(FileWarning::new(
                    rel_path,
                    WarningKind::TooLarge,
                    format!("{} bytes exceeds the {} byte limit", size, max_bytes),
                ));
                continue;
            }

            outcome.candidates.push(Candidate {
                path: entry.path().to_path_buf(),
                rel_path,
                class,
            });
        }

        outcome.candidates.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        tracing::debug!(count = outcome.candidates.len(), "collected candidates");
        outcome
    }

    /// Read a candidate. Invalid UTF-8 is decoded lossily rather than rejected.
    pub fn read(&self, candidate: &Candidate) -> std::result::Result<SourceFile, FileWarning> {
        let bytes = fs::read(&candidate.path).map_err(|e| {
            FileWarning::new(&candidate.rel_path, WarningKind::Unreadable, e.to_string())
        })?;
        let (text, lossy) = match String::from_utf8(bytes) {
            Ok(text) => (text, false),
            Err(e) => (String::from_utf8_lossy(e.as_bytes()).into_owned(), true),
        };
        Ok(SourceFile {
            path: candidate.path.clone(),
            rel_path: candidate.rel_path.clone(),
            text,
            class: candidate.class,
            lossy,
        })
    }
}

/// Walk `root`, skipping hidden and ignored directories.
pub(crate) fn walk<'c>(
    root: &Path,
    config: &'c ScanConfig,
) -> impl Iterator<Item = walkdir::Result<DirEntry>> + 'c {
    let base = root.to_path_buf();
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |e| keep_entry(e, &base, config))
}

fn keep_entry(entry: &DirEntry, root: &Path, config: &ScanConfig) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return false;
    }
    !config.is_ignored(&relative_path(root, entry.path()))
}

/// Root-relative path with `/` separators; the root itself is `.`.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
