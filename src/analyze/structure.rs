//! Directory layout analysis.
//!
//! Runs once over the whole tree, independently of the per-file passes.
//! Each directory gets a purpose from its name; the set of purposes drives
//! the organization pattern, separation quality and architecture score.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;


use crate::config::ScanConfig;
use crate::error::Result;
use crate::facts::{
    DirectoryProfile, DirectoryPurpose, Framework, FrameworkFingerprint, OrganizationPattern,
    SeparationQuality, StructureProfile,
};
use crate::scan::{relative_path, walk, ExtensionClass};

/// Architecture score weights. Every term is monotonic in its signal.
pub mod weights {
    pub const BASE: f64 = 3.0;
    /// Per concern present: request handling, business logic, data access, presentation.
    pub const CONCERN: f64 = 1.5;
    pub const CONFIG_DIR: f64 = 0.5;
    pub const TESTS_DIR: f64 = 0.5;
    /// Per unknown-purpose directory holding several source files.
    pub const AMBIGUOUS_DIR: f64 = 0.5;
    /// Per entry point beyond the first.
    pub const EXTRA_ENTRY_POINT: f64 = 1.0;
    pub const AMBIGUOUS_MIN_SOURCE_FILES: usize = 3;
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 10.0;
}

/// Name tokens per purpose, in priority order. The first match becomes the
/// directory's purpose; any others are recorded as conflicts.
const PURPOSE_TOKENS: &[(DirectoryPurpose, &[&str])] = &[
    (
        DirectoryPurpose::Controllers,
        &["controller", "controllers", "ctrl", "handler", "handlers", "api", "rest", "endpoints"],
    ),
    (
        DirectoryPurpose::Models,
        &["model", "models", "entity", "entities", "domain", "dao"],
    ),
    (
        DirectoryPurpose::Views,
        &["view", "views", "template", "templates", "tpl", "layout", "layouts", "partials", "pages"],
    ),
    (
        DirectoryPurpose::Config,
        &["config", "configs", "configuration", "settings", "conf"],
    ),
    (
        DirectoryPurpose::Tests,
        &["test", "tests", "testing", "spec", "specs"],
    ),
    (
        DirectoryPurpose::Services,
        &["service", "services", "business", "jobs", "usecases"],
    ),
    (
        DirectoryPurpose::Repositories,
        &["repository", "repositories", "repo", "repos"],
    ),
    (
        DirectoryPurpose::Middleware,
        &["middleware", "middlewares", "filter", "filters"],
    ),
    (DirectoryPurpose::Routes, &["routes", "routing", "router"]),
    (
        DirectoryPurpose::Migrations,
        &["migration", "migrations", "migrate", "schema", "seeds", "seeders"],
    ),
    (DirectoryPurpose::Public, &["public", "www", "htdocs", "web"]),
    (
        DirectoryPurpose::Assets,
        &["asset", "assets", "static", "css", "js", "img", "images", "fonts"],
    ),
    (
        DirectoryPurpose::Library,
        &["lib", "libs", "library", "libraries", "core", "system"],
    ),
    (
        DirectoryPurpose::Utility,
        &["util", "utils", "utility", "utilities", "helper", "helpers", "includes", "inc", "common"],
    ),
    (
        DirectoryPurpose::Storage,
        &["storage", "upload", "uploads", "files", "media", "var"],
    ),
    (
        DirectoryPurpose::Docs,
        &["doc", "docs", "documentation", "guide"],
    ),
];

/// Layout indicators per framework, as lowercase root-relative paths.
const FINGERPRINTS: &[(Framework, &[&str])] = &[
    (
        Framework::Laravel,
        &["app", "app/http/controllers", "routes", "config", "database", "resources/views", "bootstrap", "artisan"],
    ),
    (
        Framework::Symfony,
        &["src", "src/controller", "config", "templates", "var", "public", "bin/console"],
    ),
    (
        Framework::CodeIgniter,
        &["application", "application/controllers", "application/models", "application/views", "application/config", "system", "spark"],
    ),
    (
        Framework::Slim,
        &["src", "public", "public/index.php", "app/routes.php", "app/settings.php", "app/dependencies.php"],
    ),
];

/// A fingerprint needs at least this many hits and half its indicators.
const MIN_FINGERPRINT_MATCHES: usize = 3;

const ROOT_ENTRY_FILES: &[&str] = &["index.php", "app.php", "bootstrap.php", "front.php"];
const PUBLIC_ENTRY_FILES: &[&str] = &["index.php", "app.php"];
const ROOT_CONFIG_FILES: &[&str] = &["config.php", "settings.php", "database.php"];

/// Inputs to the architecture score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreSignals {
    /// Distinct concerns present, 0 to 4.
    pub concerns: usize,
    pub has_config: bool,
    pub has_tests: bool,
    pub ambiguous_dirs: usize,
    pub entry_points: usize,
}

/// Weighted sum of layout signals, clamped to `[MIN, MAX]`.
///
/// Zero entry points is not penalized; only entry points beyond the first are.
pub fn architecture_score(signals: &ScoreSignals) -> f64 {
    let mut score = weights::BASE;
    score += weights::CONCERN * signals.concerns.min(4) as f64;
    if signals.has_config {
        score += weights::CONFIG_DIR;
    }
    if signals.has_tests {
        score += weights::TESTS_DIR;
    }
    score -= weights::AMBIGUOUS_DIR * signals.ambiguous_dirs as f64;
    score -= weights::EXTRA_ENTRY_POINT * signals.entry_points.saturating_sub(1) as f64;
    score.clamp(weights::MIN, weights::MAX)
}

/// Purposes a directory name matches, highest priority first.
pub fn purposes_for(name: &str) -> Vec<DirectoryPurpose> {
    let tokens = name_tokens(name);
    PURPOSE_TOKENS
        .iter()
        .filter(|(_, words)| tokens.iter().any(|t| words.contains(&t.as_str())))
        .map(|(purpose, _)| *purpose)
        .collect()
}

/// Split `view_helpers`, `public-html` and `ViewHelpers` into lowercase words.
fn name_tokens(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in name.chars() {
        if !ch.is_ascii_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        current.push(ch.to_ascii_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parent_of(rel: &str) -> &str {
    rel.rsplit_once('/').map_or(".", |(parent, _)| parent)
}

fn file_name(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}

/// Walk the tree and profile its layout.
///
/// Fails only when an exclusion glob does not compile.
pub fn analyze_structure(root: &Path, config: &ScanConfig) -> Result<StructureProfile> {
    let excluded = config.exclusion_matcher()?;

    let mut dirs: BTreeMap<String, DirectoryProfile> = BTreeMap::new();
    let mut files: Vec<(String, Option<ExtensionClass>)> = Vec::new();
    let mut parents: BTreeSet<String> = BTreeSet::new();

    for entry in walk(root, config).filter_map(|e| e.ok()) {
        let rel = relative_path(root, entry.path());
        if rel != "." && excluded.is_match(&rel) {
            continue;
        }
        if entry.file_type().is_dir() {
            if rel == "." {
                dirs.insert(rel.clone(), directory(rel, DirectoryPurpose::Unknown, Vec::new()));
                continue;
            }
            let parent = parent_of(&rel).to_string();
            let inherited = dirs
                .get(&parent)
                .map_or(DirectoryPurpose::Unknown, |d| d.inferred_purpose);
            let mut matched = purposes_for(file_name(&rel));
            let profile = if matched.is_empty() {
                directory(rel.clone(), inherited, Vec::new())
            } else {
                let purpose = matched.remove(0);
                directory(rel.clone(), purpose, matched)
            };
            parents.insert(parent);
            dirs.insert(rel, profile);
        } else if entry.file_type().is_file() {
            let class = config.classify(&entry.file_name().to_string_lossy());
            if let Some(dir) = dirs.get_mut(parent_of(&rel)) {
                dir.file_count += 1;
                if class == Some(ExtensionClass::Source) {
                    dir.source_file_count += 1;
                }
            }
            files.push((rel, class));
        }
    }

    let present: BTreeSet<DirectoryPurpose> = dirs
        .values()
        .map(|d| d.inferred_purpose)
        .filter(|p| *p != DirectoryPurpose::Unknown)
        .collect();
    let has = |p: DirectoryPurpose| present.contains(&p);
    let has_any = |ps: &[DirectoryPurpose]| ps.iter().any(|p| present.contains(p));

    let entry_points = find_entry_points(&dirs, &files);
    let config_files = find_config_files(&dirs, &files);

    use DirectoryPurpose::*;
    let concerns = [
        has_any(&[Controllers, Routes, Middleware]),
        has_any(&[Services, Library]),
        has_any(&[Models, Repositories, Migrations]),
        has_any(&[Views, Assets]),
    ]
    .iter()
    .filter(|c| **c)
    .count();

    let ambiguous_dirs = dirs
        .values()
        .filter(|d| {
            d.inferred_purpose == Unknown
                && d.source_file_count >= weights::AMBIGUOUS_MIN_SOURCE_FILES
        })
        .count();

    let signals = ScoreSignals {
        concerns,
        has_config: has(Config),
        has_tests: has(Tests),
        ambiguous_dirs,
        entry_points: entry_points.len(),
    };

    let mut paths: BTreeSet<String> = dirs.keys().map(|p| p.to_lowercase()).collect();
    paths.extend(files.iter().map(|(p, _)| p.to_lowercase()));
    let fingerprints = fingerprints(&paths);
    let framework = pick_framework(&fingerprints, has(Controllers) && has(Models));

    let leaves = dirs.keys().filter(|p| !parents.contains(*p)).count();
    let organization = organization_pattern(&present, leaves, dirs.len());
    let separation_quality = match [has(Controllers), has(Models), has(Views), has(Config)]
        .iter()
        .filter(|b| **b)
        .count()
    {
        4 => SeparationQuality::Excellent,
        3 => SeparationQuality::Good,
        2 => SeparationQuality::Fair,
        _ => SeparationQuality::Poor,
    };

    let architecture_score = architecture_score(&signals);
    tracing::debug!(
        score = architecture_score,
        framework = framework.as_str(),
        directories = dirs.len(),
        "structure analyzed"
    );

    Ok(StructureProfile {
        directories: dirs.into_values().collect(),
        architecture_score,
        framework,
        fingerprints,
        organization,
        separation_quality,
        entry_points,
        config_files,
    })
}

fn directory(
    path: String,
    inferred_purpose: DirectoryPurpose,
    conflicting_purposes: Vec<DirectoryPurpose>,
) -> DirectoryProfile {
    DirectoryProfile {
        path,
        inferred_purpose,
        file_count: 0,
        source_file_count: 0,
        conflicting_purposes,
    }
}

fn find_entry_points(
    dirs: &BTreeMap<String, DirectoryProfile>,
    files: &[(String, Option<ExtensionClass>)],
) -> Vec<String> {
    let mut found: Vec<String> = files
        .iter()
        .map(|(rel, _)| rel)
        .filter(|rel| {
            let parent = parent_of(rel);
            let name = file_name(rel).to_lowercase();
            if parent == "." {
                return ROOT_ENTRY_FILES.contains(&name.as_str());
            }
            PUBLIC_ENTRY_FILES.contains(&name.as_str())
                && dirs
                    .get(parent)
                    .map_or(false, |d| d.inferred_purpose == DirectoryPurpose::Public)
        })
        .cloned()
        .collect();
    found.sort();
    found
}

fn find_config_files(
    dirs: &BTreeMap<String, DirectoryProfile>,
    files: &[(String, Option<ExtensionClass>)],
) -> Vec<String> {
    let mut found: Vec<String> = files
        .iter()
        .filter(|(rel, class)| {
            let parent = parent_of(rel);
            let name = file_name(rel).to_lowercase();
            if parent == "." {
                return ROOT_CONFIG_FILES.contains(&name.as_str()) || name.starts_with(".env");
            }
            matches!(class, Some(ExtensionClass::Source) | Some(ExtensionClass::Config))
                && dirs
                    .get(parent)
                    .map_or(false, |d| d.inferred_purpose == DirectoryPurpose::Config)
        })
        .map(|(rel, _)| rel.clone())
        .collect();
    found.sort();
    found
}

fn fingerprints(paths: &BTreeSet<String>) -> Vec<FrameworkFingerprint> {
    FINGERPRINTS
        .iter()
        .map(|(framework, indicators)| FrameworkFingerprint {
            framework: *framework,
            matched: indicators.iter().filter(|i| paths.contains(**i)).count(),
            total: indicators.len(),
        })
        .collect()
}

/// Highest match ratio wins; earlier fingerprints win ties.
fn pick_framework(fingerprints: &[FrameworkFingerprint], mvc_dirs: bool) -> Framework {
    let mut best: Option<&FrameworkFingerprint> = None;
    for fp in fingerprints {
        if fp.matched < MIN_FINGERPRINT_MATCHES || fp.matched * 2 < fp.total {
            continue;
        }
        let better = match best {
            None => true,
            Some(b) => fp.matched * b.total > b.matched * fp.total,
        };
        if better {
            best = Some(fp);
        }
    }
    match best {
        Some(fp) => fp.framework,
        None if mvc_dirs => Framework::CustomMvc,
        None => Framework::Vanilla,
    }
}

fn organization_pattern(
    present: &BTreeSet<DirectoryPurpose>,
    leaves: usize,
    total_dirs: usize,
) -> OrganizationPattern {
    use DirectoryPurpose::*;
    let has = |p: DirectoryPurpose| present.contains(&p);

    if has(Controllers) && has(Models) && has(Views) {
        return OrganizationPattern::Mvc;
    }
    if has(Controllers) && has(Models) {
        return OrganizationPattern::MvcPartial;
    }
    if has(Services) && has(Repositories) {
        return OrganizationPattern::DomainDriven;
    }
    let layers = [Controllers, Services, Repositories, Models]
        .iter()
        .filter(|p| has(**p))
        .count();
    if layers >= 3 {
        return OrganizationPattern::Layered;
    }
    if present.len() > 8 {
        return OrganizationPattern::ComponentBased;
    }
    if leaves * 5 > total_dirs * 4 {
        return OrganizationPattern::Flat;
    }
    OrganizationPattern::Mixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree(files: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for rel in files {
            let path = temp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "<?php\n").unwrap();
        }
        temp
    }

    fn analyze(temp: &TempDir) -> StructureProfile {
        analyze_structure(temp.path(), &ScanConfig::default()).unwrap()
    }

    #[test]
    fn test_laravel_layout() {
        let temp = tree(&[
            "artisan",
            "app/Http/Controllers/UserController.php",
            "app/Http/Middleware/Authenticate.php",
            "app/Models/User.php",
            "bootstrap/app.php",
            "config/app.php",
            "config/database.php",
            "database/migrations/2024_01_01_create_users.php",
            "resources/views/welcome.blade.php",
            "routes/web.php",
            "public/index.php",
            "tests/Feature/UserTest.php",
        ]);
        let profile = analyze(&temp);

        assert_eq!(profile.framework, Framework::Laravel);
        assert_eq!(profile.organization, OrganizationPattern::Mvc);
        assert_eq!(profile.separation_quality, SeparationQuality::Excellent);
        assert_eq!(profile.entry_points, vec!["public/index.php"]);
        assert_eq!(profile.config_files, vec!["config/app.php", "config/database.php"]);
        // request, data access, presentation; no business-logic directory
        assert_eq!(profile.architecture_score, 3.0 + 3.0 * 1.5 + 0.5 + 0.5);

        let laravel = &profile.fingerprints[0];
        assert_eq!(laravel.matched, laravel.total);

        let feature = profile
            .directories
            .iter()
            .find(|d| d.path == "tests/Feature")
            .unwrap();
        assert_eq!(feature.inferred_purpose, DirectoryPurpose::Tests);
    }

    #[test]
    fn test_flat_tree_is_penalized() {
        let temp = tree(&["index.php", "admin.php", "login.php", "functions.php"]);
        let profile = analyze(&temp);

        assert_eq!(profile.directories.len(), 1);
        assert_eq!(profile.directories[0].path, ".");
        assert_eq!(profile.directories[0].source_file_count, 4);
        assert_eq!(profile.framework, Framework::Vanilla);
        assert_eq!(profile.organization, OrganizationPattern::Flat);
        assert_eq!(profile.separation_quality, SeparationQuality::Poor);
        assert_eq!(profile.architecture_score, 2.5);
    }

    #[test]
    fn test_extra_entry_points_cost() {
        let one = analyze(&tree(&["index.php"]));
        let three = analyze(&tree(&["index.php", "front.php", "public/index.php"]));
        assert_eq!(one.architecture_score, 3.0);
        assert_eq!(three.entry_points.len(), 3);
        assert_eq!(three.architecture_score, 1.0);
    }

    #[test]
    fn test_adding_separated_directory_never_lowers_score() {
        let base_files = ["index.php", "lib/db.php", "pages/home.php"];
        let before = analyze(&tree(&base_files)).architecture_score;

        for extra in ["controllers/Home.php", "services/Mailer.php", "models/User.php", "config/app.php", "tests/HomeTest.php"] {
            let mut files = base_files.to_vec();
            files.push(extra);
            let after = analyze(&tree(&files)).architecture_score;
            assert!(after >= before, "{} lowered the score: {} < {}", extra, after, before);
        }
    }

    #[test]
    fn test_score_is_monotonic_in_each_signal() {
        let base = ScoreSignals {
            concerns: 1,
            has_config: false,
            has_tests: false,
            ambiguous_dirs: 1,
            entry_points: 2,
        };
        let s = architecture_score(&base);
        assert!(architecture_score(&ScoreSignals { concerns: 2, ..base }) >= s);
        assert!(architecture_score(&ScoreSignals { has_config: true, ..base }) >= s);
        assert!(architecture_score(&ScoreSignals { has_tests: true, ..base }) >= s);
        assert!(architecture_score(&ScoreSignals { ambiguous_dirs: 2, ..base }) <= s);
        assert!(architecture_score(&ScoreSignals { entry_points: 3, ..base }) <= s);
        assert_eq!(architecture_score(&ScoreSignals { entry_points: 0, ..base }), architecture_score(&ScoreSignals { entry_points: 1, ..base }));
    }

    #[test]
    fn test_score_is_clamped() {
        let worst = ScoreSignals {
            ambiguous_dirs: 50,
            entry_points: 20,
            ..Default::default()
        };
        assert_eq!(architecture_score(&worst), 0.0);
        let best = ScoreSignals {
            concerns: 4,
            has_config: true,
            has_tests: true,
            ..Default::default()
        };
        assert_eq!(architecture_score(&best), 10.0);
    }

    #[test]
    fn test_conflicting_names_and_inheritance() {
        let temp = tree(&["view_helpers/forms/Input.php", "misc/stuff.php"]);
        let profile = analyze(&temp);

        let helpers = profile.directories.iter().find(|d| d.path == "view_helpers").unwrap();
        assert_eq!(helpers.inferred_purpose, DirectoryPurpose::Views);
        assert_eq!(helpers.conflicting_purposes, vec![DirectoryPurpose::Utility]);

        let forms = profile.directories.iter().find(|d| d.path == "view_helpers/forms").unwrap();
        assert_eq!(forms.inferred_purpose, DirectoryPurpose::Views);
        assert!(forms.conflicting_purposes.is_empty());

        let misc = profile.directories.iter().find(|d| d.path == "misc").unwrap();
        assert_eq!(misc.inferred_purpose, DirectoryPurpose::Unknown);
    }

    #[test]
    fn test_name_tokens() {
        assert_eq!(name_tokens("ViewHelpers"), vec!["view", "helpers"]);
        assert_eq!(name_tokens("public_html"), vec!["public", "html"]);
        assert_eq!(purposes_for("Controller"), vec![DirectoryPurpose::Controllers]);
        assert!(purposes_for("Http").is_empty());
    }

    #[test]
    fn test_codeigniter_fingerprint() {
        let temp = tree(&[
            "index.php",
            "application/controllers/Welcome.php",
            "application/models/User_model.php",
            "application/views/welcome.php",
            "application/config/routes.php",
            "system/core/CodeIgniter.php",
        ]);
        let profile = analyze(&temp);
        assert_eq!(profile.framework, Framework::CodeIgniter);
        assert_eq!(profile.config_files, vec!["application/config/routes.php"]);
    }

    #[test]
    fn test_exclusions_apply_and_bad_globs_fail() {
        let temp = tree(&["app/Models/User.php", "public/index.php"]);
        assert_eq!(analyze(&temp).entry_points, vec!["public/index.php"]);

        let config = ScanConfig {
            excluded_paths: vec!["public/**".to_string()],
            ..Default::default()
        };
        let profile = analyze_structure(temp.path(), &config).unwrap();
        assert!(profile.entry_points.is_empty());

        let broken = ScanConfig {
            excluded_paths: vec!["a[".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            analyze_structure(temp.path(), &broken),
            Err(crate::error::Error::Glob { .. })
        ));
    }
}
