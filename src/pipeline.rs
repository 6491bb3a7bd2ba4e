//! Pipeline runner that wires the scanner, analyzers and aggregator together.
//!
//! Per-file extraction runs on a rayon pool. Structure analysis and manifest
//! loading run alongside it on the same pool. Nothing is merged until every
//! branch has finished, and nothing is written anywhere.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::aggregate::{aggregate, AnalyzerOutputs};
use crate::analyze::{
    analyze_persistence, analyze_structure, detect_endpoints, extract_symbols, map_dependencies,
    scan_usage, ComposerManifest, PersistenceEvidence, UsageSignal,
};
use crate::config::ScanConfig;
use crate::error::{FileWarning, Result, WarningKind};
use crate::facts::{EndpointRecord, FactsModel, SymbolTable};
use crate::scan::{Candidate, ExtensionClass, FileScanner};

/// Everything extracted from one file. Built once, never mutated.
#[derive(Debug, Default)]
struct FileFacts {
    rel_path: String,
    read: bool,
    symbols: Option<SymbolTable>,
    endpoints: Vec<EndpointRecord>,
    persistence: PersistenceEvidence,
    usage: Vec<UsageSignal>,
    warnings: Vec<FileWarning>,
}

/// Runs a full scan of one tree.
pub struct Runner {
    root: PathBuf,
    config: ScanConfig,
    jobs: Option<usize>,
}

impl Runner {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config: ScanConfig::default(),
            jobs: None,
        }
    }

    pub fn config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the worker count from the config. 0 means one per CPU.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Scan the tree and build its facts model.
    ///
    /// Fails only when the root cannot be scanned at all or the worker pool
    /// cannot be built. Problems with individual files become warnings.
    pub fn run(&self) -> Result<FactsModel> {
        let scanner = FileScanner::new(&self.root, &self.config)?;
        let jobs = self.jobs.unwrap_or(self.config.jobs);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

        let outcome = scanner.collect();
        tracing::info!(
            root = %self.root.display(),
            candidates = outcome.candidates.len(),
            "scanning"
        );

        let (mut per_file, (structure, manifest)) = pool.install(|| {
            rayon::join(
                || {
                    outcome
                        .candidates
                        .par_iter()
                        .map(|c| analyze_file(&scanner, c))
                        .collect::<Vec<_>>()
                },
                || {
                    rayon::join(
                        || analyze_structure(&self.root, &self.config),
                        || ComposerManifest::from_root(&self.root),
                    )
                },
            )
        });
        per_file.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        let structure = structure?;

        let mut warnings = outcome.warnings;
        let manifest = match manifest {
            Ok(m) => m,
            Err(w) => {
                tracing::warn!(warning = %w, "ignoring composer manifest");
                warnings.push(w);
                None
            }
        };

        let mut outputs = AnalyzerOutputs {
            root: self.root.display().to_string(),
            structure,
            ..Default::default()
        };
        let mut evidence = PersistenceEvidence::default();
        let mut usage = Vec::new();
        for facts in per_file {
            if facts.read {
                outputs.files += 1;
            }
            outputs.symbols.extend(facts.symbols);
            outputs.endpoints.extend(facts.endpoints);
            evidence.merge(facts.persistence);
            usage.extend(facts.usage);
            warnings.extend(facts.warnings);
        }

        outputs.persistence = evidence.resolve();
        outputs.dependencies = map_dependencies(manifest.as_ref(), &usage);
        outputs.warnings = warnings;
        Ok(aggregate(outputs))
    }
}

/// Scan `root` with default settings.
pub fn scan<P: AsRef<Path>>(root: P) -> Result<FactsModel> {
    Runner::new(root).run()
}

fn analyze_file(scanner: &FileScanner<'_>, candidate: &Candidate) -> FileFacts {
    let file = match scanner.read(candidate) {
        Ok(file) => file,
        Err(warning) => {
            tracing::warn!(path = %candidate.rel_path, error = %warning.message, "unreadable file");
            return FileFacts {
                rel_path: candidate.rel_path.clone(),
                warnings: vec![warning],
                ..Default::default()
            };
        }
    };

    let mut warnings = Vec::new();
    if file.lossy {
        tracing::debug!(path = %file.rel_path, "decoded lossily");
        warnings.push(FileWarning::new(
            &file.rel_path,
            WarningKind::NonUtf8,
            "invalid UTF-8 sequences were replaced",
        ));
    }

    let (symbols, endpoints) = if file.class == ExtensionClass::Source {
        (Some(extract_symbols(&file)), detect_endpoints(&file))
    } else {
        (None, Vec::new())
    };

    FileFacts {
        rel_path: file.rel_path.clone(),
        read: true,
        symbols,
        endpoints,
        persistence: analyze_persistence(&file),
        usage: scan_usage(&file),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_runner_basic() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "routes/web.php",
            "<?php\nRoute::get('/users', [UserController::class, 'index']);\n",
        );
        write(
            temp.path(),
            "app/Http/Controllers/UserController.php",
            "<?php\nclass UserController {\n    public function index() { return User::all(); }\n}\n",
        );
        write(temp.path(), ".env", "DB_CONNECTION=mysql\n");

        let model = Runner::new(temp.path()).jobs(2).run().unwrap();
        assert_eq!(model.totals.files, 3);
        assert_eq!(model.totals.classes, 1);
        assert_eq!(model.endpoints.len(), 1);
        assert_eq!(model.endpoints[0].handler_reference, "UserController.index");
        assert_eq!(model.persistence.engine, crate::facts::Engine::Mysql);
        assert!(model.persistence.tables.iter().any(|t| t.name == "users"));
        // config files carry no symbol table
        assert_eq!(model.symbols.len(), 2);
    }

    #[test]
    fn test_worker_count_does_not_change_result() {
        let temp = TempDir::new().unwrap();
        for i in 0..12 {
            write(
                temp.path(),
                &format!("pages/page{}.php", i),
                &format!("<?php\nclass Page{} {{ function render() {{}} }}\n$r = mysql_query(\"SELECT * FROM t{}\");\n", i, i),
            );
        }
        let one = Runner::new(temp.path()).jobs(1).run().unwrap();
        let many = Runner::new(temp.path()).jobs(4).run().unwrap();
        assert_eq!(one, many);
    }

    #[test]
    fn test_invalid_manifest_is_a_warning() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "composer.json", "{ broken");
        write(temp.path(), "index.php", "<?php echo 'hi';\n");

        let model = scan(temp.path()).unwrap();
        assert!(model
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::InvalidManifest));
        assert!(model.dependencies.is_empty());
    }
}
