//! The facts model: everything a scan learns about a project.
//!
//! All types here are plain values. They are produced by the analyzers,
//! merged once by the aggregator, and never mutated afterwards. Collections
//! are either ordered sequences with a deterministic order or `BTree*`
//! containers, so serializing the same tree twice yields identical JSON.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::FileWarning;

/// Bumped whenever a serialized field is renamed or removed.
pub const SCHEMA_VERSION: u32 = 1;

// =============================================================================
// Symbols
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Some(Visibility::Public),
            "protected" => Some(Visibility::Protected),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
    Enum,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRecord {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantRecord {
    pub name: String,
    pub value: String,
}

/// A class, interface, trait or enum declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub name: String,
    pub kind: ClassKind,
    pub namespace: Option<String>,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub is_abstract: bool,
    pub is_final: bool,
    /// In declaration order.
    pub methods: Vec<MethodRecord>,
    pub properties: Vec<PropertyRecord>,
    pub constants: Vec<ConstantRecord>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub path: String,
    pub alias: Option<String>,
}

/// Language features observed in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFlag {
    NullCoalescing,
    ReturnTypes,
    VoidReturn,
    NullableTypes,
    ShortArraySyntax,
    ArrowFunctions,
    MatchExpressions,
    Attributes,
    Namespaces,
    Traits,
    Enums,
    ReadonlyProperties,
    /// A declaration could not be recovered cleanly (unterminated block,
    /// duplicate name).
    ParseUncertain,
}

impl FeatureFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureFlag::NullCoalescing => "null_coalescing",
            FeatureFlag::ReturnTypes => "return_types",
            FeatureFlag::VoidReturn => "void_return",
            FeatureFlag::NullableTypes => "nullable_types",
            FeatureFlag::ShortArraySyntax => "short_array_syntax",
            FeatureFlag::ArrowFunctions => "arrow_functions",
            FeatureFlag::MatchExpressions => "match_expressions",
            FeatureFlag::Attributes => "attributes",
            FeatureFlag::Namespaces => "namespaces",
            FeatureFlag::Traits => "traits",
            FeatureFlag::Enums => "enums",
            FeatureFlag::ReadonlyProperties => "readonly_properties",
            FeatureFlag::ParseUncertain => "parse_uncertain",
        }
    }
}

/// Declarations recovered from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    pub file: String,
    pub namespace: Option<String>,
    pub imports: Vec<ImportRecord>,
    pub includes: Vec<String>,
    pub classes: Vec<ClassRecord>,
    pub functions: Vec<FunctionRecord>,
    /// Global constants from `define()`.
    pub constants: Vec<ConstantRecord>,
    pub features: BTreeSet<FeatureFlag>,
}

impl SymbolTable {
    pub fn empty(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Default::default()
        }
    }

    pub fn method_count(&self) -> usize {
        self.classes.iter().map(|c| c.methods.len()).sum()
    }

    pub fn has_declarations(&self) -> bool {
        !self.classes.is_empty() || !self.functions.is_empty() || !self.constants.is_empty()
    }
}

// =============================================================================
// Endpoints
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Other,
}

impl HttpMethod {
    /// Map a routing verb (`get`, `POST`, `any`, ...) onto a method.
    pub fn parse(verb: &str) -> Self {
        match verb.to_ascii_lowercase().as_str() {
            "get" => HttpMethod::Get,
            "post" => HttpMethod::Post,
            "put" => HttpMethod::Put,
            "patch" => HttpMethod::Patch,
            "delete" => HttpMethod::Delete,
            _ => HttpMethod::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which routing idiom produced an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdiomFamily {
    Laravel,
    Slim,
    CodeIgniter,
    Symfony,
    Generic,
}

impl IdiomFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdiomFamily::Laravel => "laravel",
            IdiomFamily::Slim => "slim",
            IdiomFamily::CodeIgniter => "codeigniter",
            IdiomFamily::Symfony => "symfony",
            IdiomFamily::Generic => "generic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Json,
    #[default]
    Html,
}

/// One recovered HTTP route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRecord {
    /// Position in the project-wide endpoint list; assigned at aggregation.
    pub id: usize,
    pub http_method: HttpMethod,
    /// Placeholder syntax is kept as written (`/users/{id}`, `posts/(:num)`).
    pub url_pattern: String,
    /// `Class.method`, a function name, or a file name.
    pub handler_reference: String,
    pub middleware: Vec<String>,
    pub declared_auth_requirement: bool,
    pub parameters: Vec<String>,
    pub response_format: ResponseFormat,
    pub family: IdiomFamily,
    pub file: String,
    pub line: usize,
    /// Set when an earlier record has the same method and pattern.
    pub duplicate_of: Option<usize>,
}

// =============================================================================
// Persistence
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Mysql,
    Postgres,
    Sqlite,
    Mongo,
    #[default]
    Unknown,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Mysql => "mysql",
            Engine::Postgres => "postgres",
            Engine::Sqlite => "sqlite",
            Engine::Mongo => "mongo",
            Engine::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrmFamily {
    Eloquent,
    Doctrine,
    Propel,
    ActiveRecord,
    #[default]
    None,
}

impl OrmFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrmFamily::Eloquent => "eloquent",
            OrmFamily::Doctrine => "doctrine",
            OrmFamily::Propel => "propel",
            OrmFamily::ActiveRecord => "active_record",
            OrmFamily::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    RawSql,
    Pdo,
    Mysqli,
    LegacyMysql,
    Eloquent,
    QueryBuilder,
    Doctrine,
    Mongo,
}

/// Which kind of evidence tier decided a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalTier {
    EnvFile,
    ConfigDefault,
    ConfigLiteral,
    SourceIdiom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    Query,
    Model,
    Migration,
    Usage,
}

/// A value's source location, kept to justify a classification.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Evidence {
    pub file: String,
    pub line: usize,
    pub context: String,
    pub source: EvidenceSource,
}

impl Evidence {
    const MAX_CONTEXT: usize = 120;

    pub fn new(file: &str, line: usize, context: &str, source: EvidenceSource) -> Self {
        let trimmed = context.trim();
        let context = match trimmed.char_indices().nth(Self::MAX_CONTEXT) {
            Some((idx, _)) => format!("{}...", &trimmed[..idx]),
            None => trimmed.to_string(),
        };
        Self {
            file: file.to_string(),
            line,
            context,
            source,
        }
    }
}

/// A referenced table with every place it was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub engine: Engine,
    pub host: Option<String>,
    pub port: Option<String>,
    pub database: Option<String>,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelRecord {
    pub name: String,
    pub table: String,
    pub base: String,
    pub file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    HasOne,
    HasMany,
    BelongsTo,
    BelongsToMany,
}

/// A declared ORM relationship. Cardinality is taken from the call, not verified.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub model: String,
    pub kind: RelationshipKind,
    pub target: String,
    pub file: String,
    pub line: usize,
}

/// Project-wide persistence picture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceProfile {
    pub engine: Engine,
    pub engine_basis: Option<SignalTier>,
    pub orm: OrmFamily,
    pub orm_basis: Option<SignalTier>,
    /// Sorted by name.
    pub tables: Vec<TableRef>,
    pub query_style_counts: BTreeMap<QueryKind, usize>,
    pub connections: Vec<ConnectionRecord>,
    pub models: Vec<ModelRecord>,
    pub relationships: Vec<RelationshipRecord>,
    pub migration_files: Vec<String>,
}

impl PersistenceProfile {
    pub fn query_count(&self, kind: QueryKind) -> usize {
        self.query_style_counts.get(&kind).copied().unwrap_or(0)
    }
}

// =============================================================================
// Dependencies
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyCategory {
    Web,
    Db,
    Auth,
    Util,
    Dev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencySource {
    Manifest,
    Inferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub declared_name: String,
    pub declared_version_constraint: Option<String>,
    /// `None` means no known equivalent.
    pub target_equivalent: Option<String>,
    pub category: DependencyCategory,
    pub source: DependencySource,
    pub capability: Option<String>,
    pub migration_complexity: Tier,
    /// Usage sites for inferred dependencies.
    pub evidence: Vec<Evidence>,
}

impl DependencyRecord {
    pub fn is_mapped(&self) -> bool {
        self.target_equivalent.is_some()
    }
}

// =============================================================================
// Structure
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryPurpose {
    Controllers,
    Models,
    Views,
    Config,
    Tests,
    Services,
    Repositories,
    Middleware,
    Routes,
    Migrations,
    Public,
    Assets,
    Library,
    Utility,
    Storage,
    Docs,
    Unknown,
}

impl DirectoryPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectoryPurpose::Controllers => "controllers",
            DirectoryPurpose::Models => "models",
            DirectoryPurpose::Views => "views",
            DirectoryPurpose::Config => "config",
            DirectoryPurpose::Tests => "tests",
            DirectoryPurpose::Services => "services",
            DirectoryPurpose::Repositories => "repositories",
            DirectoryPurpose::Middleware => "middleware",
            DirectoryPurpose::Routes => "routes",
            DirectoryPurpose::Migrations => "migrations",
            DirectoryPurpose::Public => "public",
            DirectoryPurpose::Assets => "assets",
            DirectoryPurpose::Library => "library",
            DirectoryPurpose::Utility => "utility",
            DirectoryPurpose::Storage => "storage",
            DirectoryPurpose::Docs => "docs",
            DirectoryPurpose::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryProfile {
    /// Root-relative; the root itself is `.`.
    pub path: String,
    pub inferred_purpose: DirectoryPurpose,
    /// Files directly inside this directory.
    pub file_count: usize,
    pub source_file_count: usize,
    /// Other purposes the directory name also matched.
    pub conflicting_purposes: Vec<DirectoryPurpose>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framework {
    Laravel,
    Symfony,
    #[serde(rename = "codeigniter")]
    CodeIgniter,
    Slim,
    CustomMvc,
    #[default]
    Vanilla,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Laravel => "laravel",
            Framework::Symfony => "symfony",
            Framework::CodeIgniter => "codeigniter",
            Framework::Slim => "slim",
            Framework::CustomMvc => "custom_mvc",
            Framework::Vanilla => "vanilla",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkFingerprint {
    pub framework: Framework,
    pub matched: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationPattern {
    Mvc,
    MvcPartial,
    DomainDriven,
    Layered,
    ComponentBased,
    #[default]
    Flat,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeparationQuality {
    #[default]
    Poor,
    Fair,
    Good,
    Excellent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureProfile {
    /// Sorted by path.
    pub directories: Vec<DirectoryProfile>,
    /// 0.0 to 10.0.
    pub architecture_score: f64,
    pub framework: Framework,
    pub fingerprints: Vec<FrameworkFingerprint>,
    pub organization: OrganizationPattern,
    pub separation_quality: SeparationQuality,
    pub entry_points: Vec<String>,
    pub config_files: Vec<String>,
}

// =============================================================================
// Summary
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Unknown,
    Low,
    Medium,
    High,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Unknown => "unknown",
            Tier::Low => "low",
            Tier::Medium => "medium",
            Tier::High => "high",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts flattened from the per-file results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectTotals {
    pub files: usize,
    pub classes: usize,
    pub interfaces: usize,
    pub traits: usize,
    pub functions: usize,
    pub methods: usize,
    pub avg_methods_per_class: f64,
    pub max_methods_per_class: usize,
    pub endpoints: usize,
    pub duplicate_endpoints: usize,
    pub tables: usize,
    pub dependencies: usize,
    pub unmapped_dependencies: usize,
    pub unmapped_ratio: f64,
    pub features: BTreeSet<FeatureFlag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub complexity_tier: Tier,
    pub code_complexity: Tier,
    pub migration_readiness_tier: Tier,
    pub estimated_effort: Tier,
    pub risk_factors: BTreeSet<String>,
}

/// The aggregated, read-only description of a scanned tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactsModel {
    pub schema_version: u32,
    pub root: String,
    pub totals: ProjectTotals,
    pub summary: SummaryMetrics,
    /// Sorted by file path.
    pub symbols: Vec<SymbolTable>,
    pub endpoints: Vec<EndpointRecord>,
    pub persistence: PersistenceProfile,
    pub dependencies: Vec<DependencyRecord>,
    pub structure: StructureProfile,
    pub warnings: Vec<FileWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_method_parse() {
        assert_eq!(HttpMethod::parse("get"), HttpMethod::Get);
        assert_eq!(HttpMethod::parse("POST"), HttpMethod::Post);
        assert_eq!(HttpMethod::parse("any"), HttpMethod::Other);
        assert_eq!(HttpMethod::parse("options"), HttpMethod::Other);
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&HttpMethod::Delete).unwrap(), "\"DELETE\"");
        assert_eq!(serde_json::to_string(&OrmFamily::ActiveRecord).unwrap(), "\"active_record\"");
        assert_eq!(serde_json::to_string(&IdiomFamily::CodeIgniter).unwrap(), "\"codeigniter\"");
        assert_eq!(serde_json::to_string(&QueryKind::RawSql).unwrap(), "\"raw_sql\"");
        assert_eq!(serde_json::to_string(&FeatureFlag::ParseUncertain).unwrap(), "\"parse_uncertain\"");
    }

    #[test]
    fn test_codeigniter_spelled_alike_everywhere() {
        let framework = serde_json::to_string(&Framework::CodeIgniter).unwrap();
        let family = serde_json::to_string(&IdiomFamily::CodeIgniter).unwrap();
        assert_eq!(framework, "\"codeigniter\"");
        assert_eq!(framework, family);
        assert_eq!(Framework::CodeIgniter.as_str(), IdiomFamily::CodeIgniter.as_str());
        assert_eq!(
            serde_json::from_str::<Framework>("\"codeigniter\"").unwrap(),
            Framework::CodeIgniter
        );
    }

    #[test]
    fn test_query_counts_serialize_as_object() {
        let mut profile = PersistenceProfile::default();
        profile.query_style_counts.insert(QueryKind::Pdo, 3);
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["query_style_counts"]["pdo"], 3);
        assert_eq!(json["engine"], "unknown");
        assert_eq!(json["orm"], "none");
    }

    #[test]
    fn test_evidence_context_is_trimmed_and_capped() {
        let long = format!("   {}   ", "x".repeat(300));
        let ev = Evidence::new("a.php", 3, &long, EvidenceSource::Query);
        assert!(ev.context.starts_with('x'));
        assert!(ev.context.ends_with("..."));
        assert_eq!(ev.context.chars().count(), 123);
    }

    #[test]
    fn test_tier_order() {
        assert!(Tier::High > Tier::Medium);
        assert!(Tier::Medium > Tier::Low);
        assert!(Tier::Low > Tier::Unknown);
    }
}
