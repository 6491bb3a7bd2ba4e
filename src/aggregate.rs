//! Merge analyzer outputs into a [`FactsModel`].
//!
//! This is the single synchronization point of the pipeline. It is a pure
//! function over values the analyzers already produced: it never touches the
//! filesystem and it cannot fail. Empty inputs give a model full of zeros and
//! `unknown` tiers.

use std::collections::BTreeSet;

use crate::analyze::link_duplicates;
use crate::error::{FileWarning, WarningKind};
use crate::facts::{
    ClassKind, DependencyRecord, EndpointRecord, FactsModel, FeatureFlag, PersistenceProfile,
    ProjectTotals, QueryKind, StructureProfile, SummaryMetrics, SymbolTable, Tier, SCHEMA_VERSION,
};

/// Cutoffs used by the tier and risk rules.
pub mod thresholds {
    /// Inputs to the complexity band table.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Band {
        pub files: usize,
        pub endpoints: usize,
        pub tables: usize,
        pub dependencies: usize,
    }

    /// Checked first; ties go to the higher band.
    pub const HIGH_BAND: Band = Band {
        files: 100,
        endpoints: 50,
        tables: 20,
        dependencies: 30,
    };
    pub const MEDIUM_BAND: Band = Band {
        files: 30,
        endpoints: 15,
        tables: 8,
        dependencies: 10,
    };
    /// A band wins when at least this many of its four inputs are exceeded.
    pub const BAND_MAJORITY: usize = 2;

    pub const MANY_CLASSES: usize = 20;
    pub const MANY_FUNCTIONS: usize = 50;
    pub const MANY_METHODS_PER_CLASS: f64 = 10.0;
    pub const MANY_FEATURES: usize = 5;

    pub const READY_SCORE: f64 = 7.0;
    pub const READY_UNMAPPED_RATIO: f64 = 0.3;

    pub const POOR_ORGANIZATION_SCORE: f64 = 5.0;
    pub const MANY_ENDPOINTS: usize = 30;
    pub const HEAVY_RAW_SQL: usize = 20;
    pub const COMPLEX_RELATIONSHIPS: usize = 10;
}

pub const RISK_POOR_ORGANIZATION: &str = "poor project organization";
pub const RISK_DUPLICATE_ENDPOINTS: &str = "duplicated endpoints";
pub const RISK_UNMAPPED_DEPENDENCIES: &str = "unmapped dependencies requiring research";
pub const RISK_MANY_ENDPOINTS: &str = "large number of API endpoints";
pub const RISK_CODE_COMPLEXITY: &str = "high code complexity";
pub const RISK_RELATIONSHIPS: &str = "complex database relationships";
pub const RISK_RAW_SQL: &str = "heavy raw SQL usage";
pub const RISK_CONFLICTING_PURPOSES: &str = "conflicting directory purpose signals";
pub const RISK_UNCERTAIN_PARSES: &str = "uncertain parses";
pub const RISK_UNREADABLE_FILES: &str = "unreadable files";

/// Everything the analyzers produced for one tree.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerOutputs {
    pub root: String,
    /// Files that were read and analyzed.
    pub files: usize,
    pub symbols: Vec<SymbolTable>,
    pub endpoints: Vec<EndpointRecord>,
    pub persistence: PersistenceProfile,
    pub dependencies: Vec<DependencyRecord>,
    pub structure: StructureProfile,
    pub warnings: Vec<FileWarning>,
}

/// Build the facts model. Endpoint ids and duplicate links are assigned
/// here, in (file, line) order.
pub fn aggregate(outputs: AnalyzerOutputs) -> FactsModel {
    let AnalyzerOutputs {
        root,
        files,
        mut symbols,
        mut endpoints,
        persistence,
        dependencies,
        structure,
        mut warnings,
    } = outputs;

    symbols.sort_by(|a, b| a.file.cmp(&b.file));
    endpoints.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
    link_duplicates(&mut endpoints);
    warnings.sort();
    warnings.dedup();

    let totals = totals(files, &symbols, &endpoints, &persistence, &dependencies);
    let summary = summarize(&totals, &symbols, &persistence, &dependencies, &structure, &warnings);

    tracing::info!(
        files = totals.files,
        classes = totals.classes,
        endpoints = totals.endpoints,
        tables = totals.tables,
        complexity = summary.complexity_tier.as_str(),
        "aggregated facts"
    );

    FactsModel {
        schema_version: SCHEMA_VERSION,
        root,
        totals,
        summary,
        symbols,
        endpoints,
        persistence,
        dependencies,
        structure,
        warnings,
    }
}

fn totals(
    files: usize,
    symbols: &[SymbolTable],
    endpoints: &[EndpointRecord],
    persistence: &PersistenceProfile,
    dependencies: &[DependencyRecord],
) -> ProjectTotals {
    let classes = symbols.iter().flat_map(|s| &s.classes);
    let mut t = ProjectTotals {
        files,
        ..Default::default()
    };
    let mut class_like = 0usize;
    for class in classes {
        class_like += 1;
        match class.kind {
            ClassKind::Class | ClassKind::Enum => t.classes += 1,
            ClassKind::Interface => t.interfaces += 1,
            ClassKind::Trait => t.traits += 1,
        }
        t.methods += class.methods.len();
        t.max_methods_per_class = t.max_methods_per_class.max(class.methods.len());
    }
    if class_like > 0 {
        t.avg_methods_per_class = t.methods as f64 / class_like as f64;
    }
    t.functions = symbols.iter().map(|s| s.functions.len()).sum();
    t.endpoints = endpoints.len();
    t.duplicate_endpoints = endpoints.iter().filter(|e| e.duplicate_of.is_some()).count();
    t.tables = persistence.tables.len();
    t.dependencies = dependencies.len();
    t.unmapped_dependencies = dependencies.iter().filter(|d| !d.is_mapped()).count();
    if t.dependencies > 0 {
        t.unmapped_ratio = t.unmapped_dependencies as f64 / t.dependencies as f64;
    }
    t.features = symbols
        .iter()
        .flat_map(|s| s.features.iter().copied())
        .collect();
    t
}

/// Band table over (files, endpoints, tables, dependencies).
pub fn complexity_tier(totals: &ProjectTotals) -> Tier {
    if totals.files == 0 {
        return Tier::Unknown;
    }
    let exceeds = |band: &thresholds::Band| {
        [
            totals.files > band.files,
            totals.endpoints > band.endpoints,
            totals.tables > band.tables,
            totals.dependencies > band.dependencies,
        ]
        .iter()
        .filter(|hit| **hit)
        .count()
            >= thresholds::BAND_MAJORITY
    };
    if exceeds(&thresholds::HIGH_BAND) {
        Tier::High
    } else if exceeds(&thresholds::MEDIUM_BAND) {
        Tier::Medium
    } else {
        Tier::Low
    }
}

fn code_complexity(totals: &ProjectTotals) -> Tier {
    if totals.files == 0 {
        return Tier::Unknown;
    }
    let features = totals
        .features
        .iter()
        .filter(|f| **f != FeatureFlag::ParseUncertain)
        .count();
    let hits = [
        totals.classes > thresholds::MANY_CLASSES,
        totals.functions > thresholds::MANY_FUNCTIONS,
        totals.avg_methods_per_class > thresholds::MANY_METHODS_PER_CLASS,
        features > thresholds::MANY_FEATURES,
    ]
    .iter()
    .filter(|hit| **hit)
    .count();
    match hits {
        0 | 1 => Tier::Low,
        2 => Tier::Medium,
        _ => Tier::High,
    }
}

fn readiness_tier(score: f64, totals: &ProjectTotals, complexity: Tier) -> Tier {
    if totals.files == 0 {
        return Tier::Unknown;
    }
    let met = [
        score >= thresholds::READY_SCORE,
        totals.unmapped_ratio <= thresholds::READY_UNMAPPED_RATIO,
        complexity != Tier::High,
    ]
    .iter()
    .filter(|ok| **ok)
    .count();
    match met {
        3 => Tier::High,
        2 => Tier::Medium,
        _ => Tier::Low,
    }
}

/// Effort points from size, route count and how hard the mapped
/// dependencies are to replace.
fn estimated_effort(totals: &ProjectTotals, dependencies: &[DependencyRecord]) -> Tier {
    if totals.files == 0 {
        return Tier::Unknown;
    }
    let mut points = 0;
    points += match totals.files {
        f if f > thresholds::HIGH_BAND.files => 2,
        f if f > thresholds::MEDIUM_BAND.files => 1,
        _ => 0,
    };
    points += match totals.endpoints {
        e if e > thresholds::HIGH_BAND.endpoints => 2,
        e if e > thresholds::MEDIUM_BAND.endpoints => 1,
        _ => 0,
    };
    let hard = dependencies
        .iter()
        .filter(|d| d.migration_complexity == Tier::High)
        .count();
    points += match hard {
        0 => 0,
        1 | 2 => 1,
        _ => 2,
    };
    match points {
        0 | 1 => Tier::Low,
        2 | 3 => Tier::Medium,
        _ => Tier::High,
    }
}

fn summarize(
    totals: &ProjectTotals,
    symbols: &[SymbolTable],
    persistence: &PersistenceProfile,
    dependencies: &[DependencyRecord],
    structure: &StructureProfile,
    warnings: &[FileWarning],
) -> SummaryMetrics {
    let complexity_tier = complexity_tier(totals);
    let code_complexity = code_complexity(totals);
    let migration_readiness_tier =
        readiness_tier(structure.architecture_score, totals, complexity_tier);
    let estimated_effort = estimated_effort(totals, dependencies);

    let mut risks = BTreeSet::new();
    let mut flag = |cond: bool, risk: &str| {
        if cond {
            risks.insert(risk.to_string());
        }
    };

    flag(
        totals.files > 0 && structure.architecture_score < thresholds::POOR_ORGANIZATION_SCORE,
        RISK_POOR_ORGANIZATION,
    );
    flag(totals.duplicate_endpoints > 0, RISK_DUPLICATE_ENDPOINTS);
    flag(totals.unmapped_dependencies > 0, RISK_UNMAPPED_DEPENDENCIES);
    flag(totals.endpoints > thresholds::MANY_ENDPOINTS, RISK_MANY_ENDPOINTS);
    flag(code_complexity == Tier::High, RISK_CODE_COMPLEXITY);
    flag(
        persistence.relationships.len() > thresholds::COMPLEX_RELATIONSHIPS,
        RISK_RELATIONSHIPS,
    );
    flag(
        persistence.query_count(QueryKind::RawSql) > thresholds::HEAVY_RAW_SQL,
        RISK_RAW_SQL,
    );
    flag(
        structure
            .directories
            .iter()
            .any(|d| !d.conflicting_purposes.is_empty()),
        RISK_CONFLICTING_PURPOSES,
    );
    flag(
        symbols
            .iter()
            .any(|s| s.features.contains(&FeatureFlag::ParseUncertain)),
        RISK_UNCERTAIN_PARSES,
    );
    flag(
        warnings
            .iter()
            .any(|w| matches!(w.kind, WarningKind::Unreadable | WarningKind::WalkError)),
        RISK_UNREADABLE_FILES,
    );

    SummaryMetrics {
        complexity_tier,
        code_complexity,
        migration_readiness_tier,
        estimated_effort,
        risk_factors: risks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{
        ClassRecord, DependencyCategory, DependencySource, DirectoryProfile, DirectoryPurpose,
        HttpMethod, IdiomFamily, MethodRecord, ResponseFormat, TableRef, Visibility,
    };

    fn endpoint(file: &str, line: usize, pattern: &str) -> EndpointRecord {
        EndpointRecord {
            id: 0,
            http_method: HttpMethod::Get,
            url_pattern: pattern.to_string(),
            handler_reference: "Handler.run".to_string(),
            middleware: Vec::new(),
            declared_auth_requirement: false,
            parameters: Vec::new(),
            response_format: ResponseFormat::Html,
            family: IdiomFamily::Laravel,
            file: file.to_string(),
            line,
            duplicate_of: None,
        }
    }

    fn class(name: &str, methods: usize) -> ClassRecord {
        ClassRecord {
            name: name.to_string(),
            kind: ClassKind::Class,
            namespace: None,
            parent: None,
            interfaces: Vec::new(),
            is_abstract: false,
            is_final: false,
            methods: (0..methods)
                .map(|i| MethodRecord {
                    name: format!("m{}", i),
                    visibility: Visibility::Public,
                    is_static: false,
                    is_abstract: false,
                    parameters: Vec::new(),
                    return_type: None,
                    line: i + 2,
                })
                .collect(),
            properties: Vec::new(),
            constants: Vec::new(),
            line: 1,
        }
    }

    fn dependency(name: &str, mapped: bool) -> DependencyRecord {
        DependencyRecord {
            declared_name: name.to_string(),
            declared_version_constraint: None,
            target_equivalent: mapped.then(|| "x".to_string()),
            category: DependencyCategory::Util,
            source: DependencySource::Manifest,
            capability: None,
            migration_complexity: if mapped { Tier::Low } else { Tier::High },
            evidence: Vec::new(),
        }
    }

    #[test]
    fn test_empty_inputs_are_unknown() {
        let model = aggregate(AnalyzerOutputs::default());
        assert_eq!(model.schema_version, SCHEMA_VERSION);
        assert_eq!(model.totals, ProjectTotals::default());
        assert_eq!(model.summary.complexity_tier, Tier::Unknown);
        assert_eq!(model.summary.migration_readiness_tier, Tier::Unknown);
        assert_eq!(model.summary.estimated_effort, Tier::Unknown);
        assert!(model.summary.risk_factors.is_empty());
    }

    #[test]
    fn test_duplicates_linked_in_file_line_order() {
        let outputs = AnalyzerOutputs {
            files: 2,
            endpoints: vec![
                endpoint("routes/web.php", 9, "/items"),
                endpoint("legacy/items.php", 3, "/items"),
                endpoint("routes/web.php", 2, "/home"),
            ],
            ..Default::default()
        };
        let model = aggregate(outputs);
        let ids: Vec<_> = model.endpoints.iter().map(|e| (e.id, e.file.as_str(), e.line)).collect();
        assert_eq!(
            ids,
            vec![(0, "legacy/items.php", 3), (1, "routes/web.php", 2), (2, "routes/web.php", 9)]
        );
        assert_eq!(model.endpoints[2].duplicate_of, Some(0));
        assert_eq!(model.totals.duplicate_endpoints, 1);
        assert!(model.summary.risk_factors.contains(RISK_DUPLICATE_ENDPOINTS));
    }

    #[test]
    fn test_class_totals() {
        let mut table = SymbolTable::empty("app.php");
        table.classes = vec![class("A", 2), class("B", 6), class("C", 1)];
        let outputs = AnalyzerOutputs {
            files: 1,
            symbols: vec![table],
            ..Default::default()
        };
        let totals = aggregate(outputs).totals;
        assert_eq!(totals.classes, 3);
        assert_eq!(totals.methods, 9);
        assert_eq!(totals.avg_methods_per_class, 3.0);
        assert_eq!(totals.max_methods_per_class, 6);
    }

    #[test]
    fn test_complexity_band_majority() {
        let mut totals = ProjectTotals {
            files: 120,
            endpoints: 60,
            ..Default::default()
        };
        assert_eq!(complexity_tier(&totals), Tier::High);

        totals.endpoints = 20;
        assert_eq!(complexity_tier(&totals), Tier::Medium);

        totals.files = 31;
        totals.endpoints = 3;
        assert_eq!(complexity_tier(&totals), Tier::Low);

        totals.tables = 9;
        assert_eq!(complexity_tier(&totals), Tier::Medium);
    }

    #[test]
    fn test_readiness_and_unmapped_risk() {
        let structure = StructureProfile {
            architecture_score: 8.5,
            ..Default::default()
        };
        let ready = aggregate(AnalyzerOutputs {
            files: 10,
            dependencies: vec![dependency("a/a", true), dependency("b/b", true)],
            structure: structure.clone(),
            ..Default::default()
        });
        assert_eq!(ready.summary.migration_readiness_tier, Tier::High);
        assert!(ready.summary.risk_factors.is_empty());

        let unmapped = aggregate(AnalyzerOutputs {
            files: 10,
            dependencies: vec![dependency("a/a", true), dependency("c/c", false)],
            structure,
            ..Default::default()
        });
        assert_eq!(unmapped.totals.unmapped_ratio, 0.5);
        assert_eq!(unmapped.summary.migration_readiness_tier, Tier::Medium);
        assert!(unmapped.summary.risk_factors.contains(RISK_UNMAPPED_DEPENDENCIES));
    }

    #[test]
    fn test_structural_risks() {
        let mut symbols = SymbolTable::empty("broken.php");
        symbols.features.insert(FeatureFlag::ParseUncertain);
        let mut persistence = PersistenceProfile::default();
        persistence.query_style_counts.insert(QueryKind::RawSql, 25);
        persistence.tables.push(TableRef {
            name: "users".to_string(),
            evidence: Vec::new(),
        });

        let model = aggregate(AnalyzerOutputs {
            files: 3,
            symbols: vec![symbols],
            persistence,
            structure: StructureProfile {
                architecture_score: 2.0,
                directories: vec![DirectoryProfile {
                    path: "view_helpers".to_string(),
                    inferred_purpose: DirectoryPurpose::Views,
                    file_count: 1,
                    source_file_count: 1,
                    conflicting_purposes: vec![DirectoryPurpose::Utility],
                }],
                ..Default::default()
            },
            warnings: vec![FileWarning::new("locked.php", WarningKind::Unreadable, "permission denied")],
            ..Default::default()
        });

        let risks = &model.summary.risk_factors;
        for expected in [
            RISK_POOR_ORGANIZATION,
            RISK_RAW_SQL,
            RISK_CONFLICTING_PURPOSES,
            RISK_UNCERTAIN_PARSES,
            RISK_UNREADABLE_FILES,
        ] {
            assert!(risks.contains(expected), "missing {}", expected);
        }
        assert_eq!(model.totals.tables, 1);
    }
}
