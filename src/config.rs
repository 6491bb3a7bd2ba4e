//! Scan configuration.
//!
//! A `phpfacts.yaml` file tunes which parts of a tree are analyzed. Every
//! field is optional; anything left out falls back to the built-in defaults.
//!
//! ```yaml
//! ignore: [vendor, node_modules, storage/framework]
//! excluded_paths: ["**/fixtures/**"]
//! max_file_size_kb: 512
//! jobs: 4
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scan::ExtensionClass;

/// Config file names looked up in the working directory.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["phpfacts.yaml", ".phpfacts.yaml"];

const DEFAULT_IGNORE: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "vendor",
    "node_modules",
    "bower_components",
    "cache",
    "logs",
    "tmp",
    "temp",
    "storage/framework",
    "bootstrap/cache",
];

const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["php", "inc", "php3", "php4", "php5", "phps"];
const DEFAULT_TEMPLATE_EXTENSIONS: &[&str] = &["phtml", "twig", "tpl"];
const DEFAULT_CONFIG_EXTENSIONS: &[&str] = &["env", "ini", "yaml", "yml", "json", "xml", "neon"];

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Settings that shape a scan.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Path fragments (directory names or `a/b` sub-paths) that are never entered.
    pub ignore: Vec<String>,
    /// Glob patterns matched against root-relative paths.
    pub excluded_paths: Vec<String>,
    pub source_extensions: Vec<String>,
    pub template_extensions: Vec<String>,
    pub config_extensions: Vec<String>,
    /// Files larger than this are skipped with a warning.
    pub max_file_size_kb: u64,
    /// Worker cap for per-file analysis; 0 means one worker per CPU.
    pub jobs: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ignore: owned(DEFAULT_IGNORE),
            excluded_paths: Vec::new(),
            source_extensions: owned(DEFAULT_SOURCE_EXTENSIONS),
            template_extensions: owned(DEFAULT_TEMPLATE_EXTENSIONS),
            config_extensions: owned(DEFAULT_CONFIG_EXTENSIONS),
            max_file_size_kb: 1024,
            jobs: 0,
        }
    }
}

impl ScanConfig {
    /// Parse a config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Load the explicit config if given, otherwise the first discovered one,
    /// otherwise the defaults. Returns the path the config came from.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => discover(),
        };
        match path {
            Some(p) => Ok((Self::load(&p)?, Some(p))),
            None => Ok((Self::default(), None)),
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_kb.saturating_mul(1024)
    }

    /// Whether a root-relative path runs through an ignored fragment.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        let padded = format!("/{}/", rel_path.trim_matches('/'));
        self.ignore.iter().any(|fragment| {
            let fragment = fragment.trim_matches('/');
            !fragment.is_empty() && padded.contains(&format!("/{}/", fragment))
        })
    }

    /// Compile `excluded_paths` into a single matcher.
    pub fn exclusion_matcher(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            let glob = Glob::new(pattern).map_err(|source| Error::Glob {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| Error::Glob {
            pattern: self.excluded_paths.join(", "),
            source,
        })
    }

    /// Decide which extension class a file belongs to, if any.
    pub fn classify(&self, file_name: &str) -> Option<ExtensionClass> {
        let name = file_name.to_lowercase();
        if name == ".env" || name.starts_with(".env.") {
            return Some(ExtensionClass::Config);
        }
        if name.ends_with(".blade.php") {
            return Some(ExtensionClass::Template);
        }
        let ext = name.rsplit_once('.').map(|(_, ext)| ext)?;
        let has = |list: &[String]| list.iter().any(|e| e.trim_start_matches('.') == ext);
        if has(&self.source_extensions) {
            Some(ExtensionClass::Source)
        } else if has(&self.template_extensions) {
            Some(ExtensionClass::Template)
        } else if has(&self.config_extensions) {
            Some(ExtensionClass::Config)
        } else {
            None
        }
    }
}

/// Look for a config file in the working directory, then in the user config dir.
pub fn discover() -> Option<PathBuf> {
    for name in DEFAULT_CONFIG_NAMES {
        let path = PathBuf::from(name);
        if path.is_file() {
            return Some(path);
        }
    }
    let dirs = directories::ProjectDirs::from("", "", "phpfacts")?;
    let user = dirs.config_dir().join("config.yaml");
    user.is_file().then_some(user)
}
