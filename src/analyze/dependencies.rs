//! Declared and inferred dependencies.
//!
//! `composer.json` at the scan root is the primary source. Usage idioms in
//! source files only add an `inferred` record when nothing declared already
//! provides the same capability.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer};

use super::mappings::{self, USAGE_PATTERNS};
use super::Scrubbed;
use crate::error::{FileWarning, WarningKind};
use crate::facts::{
    DependencyCategory, DependencyRecord, DependencySource, Evidence, EvidenceSource, Tier,
};
use crate::scan::{ExtensionClass, SourceFile};

pub const MANIFEST_NAME: &str = "composer.json";

/// Platform requirements that are not dependencies.
const PLATFORM_NAMES: &[&str] = &["php", "php-64bit", "composer-plugin-api", "composer-runtime-api"];

lazy_static! {
    static ref USAGE_REGEXES: Vec<(&'static str, Regex)> = USAGE_PATTERNS
        .iter()
        .map(|(ext, pattern)| (*ext, Regex::new(pattern).unwrap()))
        .collect();
}

/// The parts of `composer.json` that matter here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ComposerManifest {
    #[serde(default, deserialize_with = "lenient_map")]
    pub require: BTreeMap<String, String>,
    #[serde(default, rename = "require-dev", deserialize_with = "lenient_map")]
    pub require_dev: BTreeMap<String, String>,
}

/// Composer writes an empty `require` as `[]`; accept that and any other
/// non-object as empty.
fn lenient_map<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, String>, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(value
        .as_object()
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| (k.clone(), v.as_str().unwrap_or("*").to_string()))
                .collect()
        })
        .unwrap_or_default())
}

impl ComposerManifest {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Load `composer.json` from `root`. A missing manifest is `Ok(None)`;
    /// an unreadable or malformed one is a warning and treated as absent.
    pub fn from_root(root: &Path) -> Result<Option<Self>, FileWarning> {
        let path = root.join(MANIFEST_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .map_err(|e| FileWarning::new(MANIFEST_NAME, WarningKind::Unreadable, e.to_string()))?;
        Self::parse(&text)
            .map(Some)
            .map_err(|e| FileWarning::new(MANIFEST_NAME, WarningKind::InvalidManifest, e.to_string()))
    }
}

/// One usage of an extension idiom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSignal {
    pub extension: &'static str,
    pub evidence: Evidence,
}

/// Find extension idioms in a source or template file, one signal per
/// extension per line.
pub fn scan_usage(file: &SourceFile) -> Vec<UsageSignal> {
    if file.class == ExtensionClass::Config {
        return Vec::new();
    }
    let scrubbed = Scrubbed::new(&file.text);
    let text_lines: Vec<&str> = file.text.split('\n').collect();
    let mut signals = Vec::new();

    for (idx, line) in scrubbed.code.split('\n').enumerate() {
        for (ext, re) in USAGE_REGEXES.iter() {
            if re.is_match(line) {
                let context = text_lines.get(idx).copied().unwrap_or(line);
                signals.push(UsageSignal {
                    extension: *ext,
                    evidence: Evidence::new(&file.rel_path, idx + 1, context, EvidenceSource::Usage),
                });
            }
        }
    }
    signals
}

/// Build the deduplicated dependency list.
///
/// Order: `require` entries, then `require-dev` entries not already seen,
/// then inferred extensions, each group sorted by name.
pub fn map_dependencies(
    manifest: Option<&ComposerManifest>,
    signals: &[UsageSignal],
) -> Vec<DependencyRecord> {
    let mut records: Vec<DependencyRecord> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    if let Some(manifest) = manifest {
        let groups = [(&manifest.require, false), (&manifest.require_dev, true)];
        for (entries, dev) in groups {
            for (name, constraint) in entries {
                let key = name.to_lowercase();
                if PLATFORM_NAMES.contains(&key.as_str()) || !seen.insert(key) {
                    continue;
                }
                records.push(declared(name, constraint, dev));
            }
        }
    }

    let covered: BTreeSet<&str> = records
        .iter()
        .filter_map(|r| r.capability.as_deref())
        .collect();

    let mut by_extension: BTreeMap<&str, Vec<Evidence>> = BTreeMap::new();
    for signal in signals {
        by_extension
            .entry(signal.extension)
            .or_default()
            .push(signal.evidence.clone());
    }

    let mut inferred = Vec::new();
    for (ext, evidence) in by_extension {
        let name = format!("ext-{}", ext);
        if seen.contains(&name) {
            continue;
        }
        let mapping = mappings::lookup(&name);
        if let Some(m) = mapping {
            if covered.contains(m.capability) {
                tracing::debug!(extension = ext, capability = m.capability, "usage already covered");
                continue;
            }
        }
        let mut evidence = evidence;
        evidence.sort();
        inferred.push(DependencyRecord {
            declared_name: name,
            declared_version_constraint: None,
            target_equivalent: mapping.map(|m| m.target.to_string()),
            category: mapping.map_or(DependencyCategory::Util, |m| m.category),
            source: DependencySource::Inferred,
            capability: mapping.map(|m| m.capability.to_string()),
            migration_complexity: mapping.map_or(Tier::High, |m| m.complexity),
            evidence,
        });
    }
    records.extend(inferred);
    records
}

fn declared(name: &str, constraint: &str, dev: bool) -> DependencyRecord {
    let mapping = mappings::lookup(name);
    let category = if dev {
        DependencyCategory::Dev
    } else {
        mapping.map_or_else(|| mappings::infer_category(name), |m| m.category)
    };
    DependencyRecord {
        declared_name: name.to_string(),
        declared_version_constraint: Some(constraint.to_string()).filter(|c| !c.is_empty()),
        target_equivalent: mapping.map(|m| m.target.to_string()),
        category,
        source: DependencySource::Manifest,
        capability: mapping.map(|m| m.capability.to_string()),
        migration_complexity: mapping.map_or(Tier::High, |m| m.complexity),
        evidence: Vec::new(),
    }
}
