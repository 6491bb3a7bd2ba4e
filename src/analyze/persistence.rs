//! Database engine, ORM, query style and table recovery.
//!
//! Each file contributes a [`PersistenceEvidence`] value. Values are merged
//! in path order and resolved exactly once into a [`PersistenceProfile`];
//! nothing is classified while evidence is still arriving.
//!
//! Engine and ORM votes are bucketed by [`SignalTier`]. Resolution walks
//! the tiers from most to least reliable (`.env`, config defaults, config
//! literals, in-source call idioms) and stops at the first tier whose top
//! vote is unique and reaches [`MIN_SIGNALS`]. A tie falls through to the
//! next tier; when every tier is silent or tied the result is
//! `unknown` / `none`.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use super::{LineIndex, Scrubbed};
use crate::facts::{
    ConnectionRecord, Engine, Evidence, EvidenceSource, ModelRecord, OrmFamily,
    PersistenceProfile, QueryKind, RelationshipKind, RelationshipRecord, SignalTier, TableRef,
};
use crate::scan::{ExtensionClass, SourceFile};

/// Minimum votes a classification needs before it is trusted.
pub const MIN_SIGNALS: usize = 1;

/// Directory names that hold schema migrations.
const MIGRATION_DIRS: &[&str] = &["migrations", "migrate"];

/// Static facade names that look like model calls but are not.
const NON_MODEL_FACADES: &[&str] = &[
    "App", "Arr", "Artisan", "Auth", "Broadcast", "Bus", "Cache", "Carbon", "Collection",
    "Config", "Cookie", "Crypt", "DB", "Event", "File", "Gate", "Hash", "Http", "Lang", "Log",
    "Mail", "Notification", "Password", "Queue", "Redirect", "Request", "Response", "Route",
    "Schema", "Session", "Storage", "Str", "URL", "Validator", "View",
];

/// Words that follow SQL keywords but are not table names.
const SQL_NOISE: &[&str] = &["select", "where", "set", "values", "dual", "as", "on", "the"];

lazy_static! {
    // config tiers
    static ref ENV_CONNECTION: Regex =
        Regex::new(r#"(?m)^\s*DB_CONNECTION\s*=\s*["']?(\w+)"#).unwrap();
    static ref ENV_DATABASE_URL: Regex =
        Regex::new(r#"(?m)^\s*DATABASE_URL\s*=\s*["']?(\w+)://"#).unwrap();
    static ref ENV_VALUE: Regex =
        Regex::new(r#"(?m)^\s*DB_(HOST|PORT|DATABASE)\s*=\s*["']?([^"'\s]*)"#).unwrap();
    static ref CONFIG_DEFAULT: Regex = Regex::new(
        r#"['"]default['"]\s*=>\s*(?:env\(\s*['"]DB_CONNECTION['"]\s*,\s*)?['"](\w+)['"]"#
    )
    .unwrap();
    static ref CONFIG_DRIVER: Regex = Regex::new(
        r#"(?m)['"](?:driver|dbdriver|type)['"]\s*=>\s*['"](\w+)['"]|^\s*(?:driver|dbdriver|db_type)\s*[:=]\s*['"]?(\w+)"#
    )
    .unwrap();
    static ref CONFIG_VALUE: Regex = Regex::new(
        r#"['"](host|hostname|port|database|dbname)['"]\s*=>\s*(?:env\(\s*['"]\w+['"]\s*,\s*)?(?:['"]([^'"]*)['"]|(\d+))"#
    )
    .unwrap();
    static ref DOCTRINE_CONFIG: Regex = Regex::new(r"(?m)^\s*doctrine\s*:|^\s*orm\s*:").unwrap();

    // literals that appear in both config and source
    static ref DSN: Regex = Regex::new(
        r#"['"](mysql|pgsql|sqlite):(?:host=([^;'"]+))?(?:;port=(\d+))?(?:;dbname=([^;'"]+))?"#
    )
    .unwrap();
    static ref MONGO_URI: Regex = Regex::new(r"mongodb(?:\+srv)?://").unwrap();

    // in-source engine idioms
    static ref MYSQL_CALL: Regex =
        Regex::new(r"\bmysqli_\w+\s*\(|\bnew\s+mysqli\b|\bmysql_\w+\s*\(").unwrap();
    static ref POSTGRES_CALL: Regex =
        Regex::new(r"\bpg_(?:connect|pconnect|query|prepare|execute|fetch_\w+)\s*\(").unwrap();
    static ref SQLITE_CALL: Regex = Regex::new(r"\bnew\s+SQLite3\b|\bsqlite_\w+\s*\(").unwrap();
    static ref MONGO_CALL: Regex = Regex::new(
        r"MongoDB\\Client|MongoDB\\Driver\\Manager|\bnew\s+MongoClient\b"
    )
    .unwrap();

    // ORM idioms
    static ref ELOQUENT_SIGNAL: Regex = Regex::new(
        r"Illuminate\\Database\\Eloquent|\bextends\s+(?:Model|Eloquent)\b|\bEloquent::"
    )
    .unwrap();
    static ref DOCTRINE_SIGNAL: Regex = Regex::new(
        r"\buse\s+Doctrine\\ORM|@ORM\\Entity|#\[ORM\\Entity|@Entity\b|\bEntityManager(?:Interface)?\b"
    )
    .unwrap();
    static ref PROPEL_SIGNAL: Regex =
        Regex::new(r"\buse\s+Propel\\|\bPropel::|\bextends\s+Base\w*Object\b").unwrap();
    static ref ACTIVE_RECORD_SIGNAL: Regex = Regex::new(
        r"\bextends\s+(?:CActiveRecord|ActiveRecord)\b|yii\\db\\ActiveRecord|\bfind_by_\w+\s*\("
    )
    .unwrap();

    // query styles
    static ref RAW_SQL: Regex = Regex::new(
        r"(?is)\b(?:SELECT\s.+?\sFROM|INSERT\s+INTO|UPDATE\s+`?\w+`?\s+SET|DELETE\s+FROM|CREATE\s+TABLE)\b"
    )
    .unwrap();
    static ref SQL_TABLE: Regex =
        Regex::new(r"(?i)\b(?:FROM|INTO|JOIN|UPDATE)\s+`?(\w+)`?").unwrap();
    static ref CREATE_TABLE: Regex =
        Regex::new(r"(?i)\bCREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?`?(\w+)`?").unwrap();
    static ref PDO_CALL: Regex = Regex::new(r"\bnew\s+PDO\s*\(|->prepare\s*\(|\bPDO::").unwrap();
    static ref QUERY_CALL: Regex = Regex::new(r"->query\s*\(").unwrap();
    static ref LEGACY_MYSQL: Regex = Regex::new(r"\bmysql_\w+\s*\(").unwrap();
    static ref MYSQLI: Regex = Regex::new(r"\bmysqli_\w+\s*\(|\bnew\s+mysqli\b").unwrap();
    static ref MODEL_CALL: Regex = Regex::new(
        r"\b([A-Z]\w*)::(?:where|whereIn|find|findOrFail|all|create|first|firstOrCreate|updateOrCreate|with|paginate|orderBy|latest)\s*\("
    )
    .unwrap();
    static ref DB_TABLE: Regex = Regex::new(r#"\bDB::table\s*\(\s*['"](\w+)['"]"#).unwrap();
    static ref DB_STATEMENT: Regex =
        Regex::new(r"\bDB::(?:select|insert|update|delete|statement)\s*\(").unwrap();
    static ref DOCTRINE_CALL: Regex = Regex::new(
        r"->getRepository\s*\(|->createQueryBuilder\s*\(|->createQuery\s*\(|->persist\s*\("
    )
    .unwrap();
    static ref MONGO_COLLECTION: Regex =
        Regex::new(r#"->selectCollection\s*\(\s*(?:['"]\w+['"]\s*,\s*)?['"](\w+)['"]"#).unwrap();
    static ref MONGO_OP: Regex = Regex::new(
        r"->(?:findOne|insertOne|insertMany|updateOne|updateMany|deleteOne|deleteMany|aggregate)\s*\("
    )
    .unwrap();

    // models and schema
    static ref MODEL_CLASS: Regex = Regex::new(
        r"\bclass\s+(\w+)\s+extends\s+\\?(?:[\w\\]*\\)?(Model|Eloquent|Authenticatable|ActiveRecord|CActiveRecord)\b"
    )
    .unwrap();
    static ref TABLE_PROPERTY: Regex =
        Regex::new(r#"\$table\s*=\s*['"](\w+)['"]"#).unwrap();
    static ref TABLE_NAME_METHOD: Regex = Regex::new(
        r#"function\s+tableName\s*\(\s*\)[^{]*\{\s*return\s*['"](?:\{\{%?)?(\w+)"#
    )
    .unwrap();
    static ref DOCTRINE_TABLE: Regex =
        Regex::new(r#"(?:@ORM\\Table|#\[ORM\\Table)\s*\(\s*name\s*[:=]\s*["'](\w+)["']"#).unwrap();
    static ref ANY_CLASS: Regex = Regex::new(r"\bclass\s+(\w+)").unwrap();
    static ref RELATION_CALL: Regex = Regex::new(
        r#"\$this->(hasOne|hasMany|belongsTo|belongsToMany)\s*\(\s*(?:\\?([\w\\]+)::class|['"]\\?([\w\\]+)['"])"#
    )
    .unwrap();
    static ref DOCTRINE_RELATION: Regex = Regex::new(
        r"(OneToOne|OneToMany|ManyToOne|ManyToMany)\s*\(\s*targetEntity\s*[:=]\s*\\?([\w\\]+?)(?:::class)?[,)\s]"
    )
    .unwrap();
    static ref SCHEMA_CREATE: Regex = Regex::new(
        r#"\bSchema::create\s*\(\s*['"](\w+)['"]|->createTable\s*\(\s*['"](\w+)['"]|\$this->table\s*\(\s*['"](\w+)['"]\s*\)"#
    )
    .unwrap();
}

/// Accumulated persistence signals. Merge freely, resolve once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistenceEvidence {
    engine_votes: BTreeMap<SignalTier, BTreeMap<Engine, usize>>,
    orm_votes: BTreeMap<SignalTier, BTreeMap<OrmFamily, usize>>,
    query_counts: BTreeMap<QueryKind, usize>,
    tables: BTreeMap<String, Vec<Evidence>>,
    connections: Vec<ConnectionRecord>,
    models: Vec<ModelRecord>,
    relationships: Vec<RelationshipRecord>,
    migration_files: Vec<String>,
}

impl PersistenceEvidence {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn vote_engine(&mut self, tier: SignalTier, engine: Engine) {
        *self
            .engine_votes
            .entry(tier)
            .or_default()
            .entry(engine)
            .or_default() += 1;
    }

    fn vote_orm(&mut self, tier: SignalTier, orm: OrmFamily, count: usize) {
        if count == 0 {
            return;
        }
        *self.orm_votes.entry(tier).or_default().entry(orm).or_default() += count;
    }

    fn count_query(&mut self, kind: QueryKind, count: usize) {
        if count > 0 {
            *self.query_counts.entry(kind).or_default() += count;
        }
    }

    fn add_table(&mut self, name: &str, evidence: Evidence) {
        let name = name.to_lowercase();
        if name.is_empty() || SQL_NOISE.contains(&name.as_str()) {
            return;
        }
        self.tables.entry(name).or_default().push(evidence);
    }

    /// Fold another file's evidence into this one. Table evidence is
    /// appended, never replaced.
    pub fn merge(&mut self, other: PersistenceEvidence) {
        for (tier, votes) in other.engine_votes {
            let bucket = self.engine_votes.entry(tier).or_default();
            for (engine, n) in votes {
                *bucket.entry(engine).or_default() += n;
            }
        }
        for (tier, votes) in other.orm_votes {
            let bucket = self.orm_votes.entry(tier).or_default();
            for (orm, n) in votes {
                *bucket.entry(orm).or_default() += n;
            }
        }
        for (kind, n) in other.query_counts {
            *self.query_counts.entry(kind).or_default() += n;
        }
        for (name, evidence) in other.tables {
            self.tables.entry(name).or_default().extend(evidence);
        }
        for conn in other.connections {
            if !self.connections.contains(&conn) {
                self.connections.push(conn);
            }
        }
        self.models.extend(other.models);
        self.relationships.extend(other.relationships);
        self.migration_files.extend(other.migration_files);
    }

    /// Classify engine and ORM and freeze the result.
    pub fn resolve(self) -> PersistenceProfile {
        let (engine, engine_basis) = resolve_tiers(&self.engine_votes).unwrap_or_default();
        let (orm, orm_basis) = resolve_tiers(&self.orm_votes).unwrap_or_default();

        let mut migration_files = self.migration_files;
        migration_files.sort();
        migration_files.dedup();

        PersistenceProfile {
            engine,
            engine_basis,
            orm,
            orm_basis,
            tables: self
                .tables
                .into_iter()
                .map(|(name, evidence)| TableRef { name, evidence })
                .collect(),
            query_style_counts: self.query_counts,
            connections: self.connections,
            models: self.models,
            relationships: self.relationships,
            migration_files,
        }
    }
}

/// First tier with a unique winner that clears the threshold.
fn resolve_tiers<T: Copy + Ord>(
    tiers: &BTreeMap<SignalTier, BTreeMap<T, usize>>,
) -> Option<(T, Option<SignalTier>)> {
    for (tier, votes) in tiers {
        let Some(best) = votes.values().copied().max() else {
            continue;
        };
        if best < MIN_SIGNALS {
            continue;
        }
        let mut leaders = votes.iter().filter(|(_, &n)| n == best);
        if let (Some((winner, _)), None) = (leaders.next(), leaders.next()) {
            return Some((*winner, Some(*tier)));
        }
        tracing::debug!(?tier, "tied persistence vote, falling through");
    }
    None
}

/// Map a driver or scheme name onto an engine.
pub fn parse_engine(name: &str) -> Option<Engine> {
    match name.to_ascii_lowercase().as_str() {
        "mysql" | "mysqli" | "mariadb" | "pdo_mysql" => Some(Engine::Mysql),
        "pgsql" | "postgres" | "postgresql" | "postgre" | "pdo_pgsql" => Some(Engine::Postgres),
        "sqlite" | "sqlite3" | "pdo_sqlite" => Some(Engine::Sqlite),
        "mongodb" | "mongo" => Some(Engine::Mongo),
        _ => None,
    }
}

/// Whether a file holds connection settings.
pub fn is_config_file(file: &SourceFile) -> bool {
    if file.class == ExtensionClass::Config {
        return true;
    }
    let lower = file.rel_path.to_lowercase();
    let name = lower.rsplit('/').next().unwrap_or(&lower);
    lower.starts_with("config/")
        || lower.contains("/config/")
        || name.contains("config")
        || name.contains("database")
        || name.starts_with("db.")
        || name.starts_with("db_")
}

fn is_migration_file(rel_path: &str) -> bool {
    rel_path
        .split('/')
        .any(|segment| MIGRATION_DIRS.contains(&segment.to_lowercase().as_str()))
}

/// Gather persistence evidence from one file.
pub fn analyze_persistence(file: &SourceFile) -> PersistenceEvidence {
    let mut ev = PersistenceEvidence::default();
    let scrubbed = Scrubbed::new(&file.text);
    if is_config_file(file) {
        config_signals(file, &scrubbed.text, &mut ev);
    }
    if file.class != ExtensionClass::Config {
        source_signals(file, &scrubbed, &mut ev);
    }
    for evidence in ev.tables.values_mut() {
        evidence.sort_by_key(|e| e.line);
    }
    ev
}

fn config_signals(file: &SourceFile, text: &str, ev: &mut PersistenceEvidence) {
    let name = file.rel_path.rsplit('/').next().unwrap_or(&file.rel_path);
    let is_env = name.starts_with(".env");
    let mut file_engine = None;

    if is_env {
        for caps in ENV_CONNECTION
            .captures_iter(text)
            .chain(ENV_DATABASE_URL.captures_iter(text))
        {
            if let Some(engine) = parse_engine(&caps[1]) {
                ev.vote_engine(SignalTier::EnvFile, engine);
                file_engine.get_or_insert(engine);
            }
        }
        let mut values = BTreeMap::new();
        for caps in ENV_VALUE.captures_iter(text) {
            values.insert(caps[1].to_lowercase(), caps[2].to_string());
        }
        push_connection(ev, file_engine, &values, &file.rel_path);
        return;
    }

    for caps in CONFIG_DEFAULT.captures_iter(text) {
        if let Some(engine) = parse_engine(&caps[1]) {
            ev.vote_engine(SignalTier::ConfigDefault, engine);
            file_engine.get_or_insert(engine);
        }
    }
    for caps in CONFIG_DRIVER.captures_iter(text) {
        let driver = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        if let Some(engine) = parse_engine(driver) {
            ev.vote_engine(SignalTier::ConfigLiteral, engine);
            file_engine.get_or_insert(engine);
        }
    }
    for caps in DSN.captures_iter(text) {
        if let Some(engine) = parse_engine(&caps[1]) {
            ev.vote_engine(SignalTier::ConfigLiteral, engine);
            file_engine.get_or_insert(engine);
        }
    }
    if MONGO_URI.is_match(text) {
        ev.vote_engine(SignalTier::ConfigLiteral, Engine::Mongo);
        file_engine.get_or_insert(Engine::Mongo);
    }
    if DOCTRINE_CONFIG.is_match(text) && text.contains("doctrine") {
        ev.vote_orm(SignalTier::ConfigLiteral, OrmFamily::Doctrine, 1);
    }

    let mut values = BTreeMap::new();
    for caps in CONFIG_VALUE.captures_iter(text) {
        let key = match &caps[1] {
            "hostname" => "host",
            "dbname" => "database",
            other => other,
        };
        let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        values.entry(key.to_string()).or_insert_with(|| value.to_string());
    }
    push_connection(ev, file_engine, &values, &file.rel_path);
}

fn push_connection(
    ev: &mut PersistenceEvidence,
    engine: Option<Engine>,
    values: &BTreeMap<String, String>,
    file: &str,
) {
    let get = |key: &str| values.get(key).filter(|v| !v.is_empty()).cloned();
    let record = ConnectionRecord {
        engine: engine.unwrap_or_default(),
        host: get("host"),
        port: get("port"),
        database: get("database"),
        file: file.to_string(),
    };
    if record.host.is_some() || record.database.is_some() {
        ev.connections.push(record);
    }
}

/// Raw SQL only counts inside string literals. Each literal holding SQL is
/// one query; a statement may span several lines of the literal.
fn sql_literals(path: &str, migration: bool, scrubbed: &Scrubbed, ev: &mut PersistenceEvidence) {
    let text = &scrubbed.text;
    let lines: Vec<&str> = text.split('\n').collect();
    let index = LineIndex::new(text);
    let evidence_at = |offset: usize, source| {
        let line_no = index.line_of(offset);
        let context = lines.get(line_no - 1).copied().unwrap_or("");
        Evidence::new(path, line_no, context, source)
    };

    for span in &scrubbed.strings {
        let Some(literal) = text.get(span.clone()) else {
            continue;
        };
        if !RAW_SQL.is_match(literal) {
            continue;
        }
        ev.count_query(QueryKind::RawSql, 1);
        let source = if migration || CREATE_TABLE.is_match(literal) {
            EvidenceSource::Migration
        } else {
            EvidenceSource::Query
        };
        for caps in SQL_TABLE.captures_iter(literal).chain(CREATE_TABLE.captures_iter(literal)) {
            if let Some(name) = caps.get(1) {
                ev.add_table(name.as_str(), evidence_at(span.start + name.start(), source));
            }
        }
    }
}

fn source_signals(file: &SourceFile, scrubbed: &Scrubbed, ev: &mut PersistenceEvidence) {
    let text = &scrubbed.text;
    let path = file.rel_path.as_str();
    let migration = is_migration_file(path);
    if migration {
        ev.migration_files.push(path.to_string());
    }

    // engine idioms
    for (re, engine) in [
        (&*MYSQL_CALL, Engine::Mysql),
        (&*POSTGRES_CALL, Engine::Postgres),
        (&*SQLITE_CALL, Engine::Sqlite),
        (&*MONGO_CALL, Engine::Mongo),
    ] {
        for _ in re.find_iter(text) {
            ev.vote_engine(SignalTier::SourceIdiom, engine);
        }
    }
    for caps in DSN.captures_iter(text) {
        if let Some(engine) = parse_engine(&caps[1]) {
            ev.vote_engine(SignalTier::SourceIdiom, engine);
            if let Some(host) = caps.get(2) {
                ev.connections.push(ConnectionRecord {
                    engine,
                    host: Some(host.as_str().to_string()),
                    port: caps.get(3).map(|m| m.as_str().to_string()),
                    database: caps.get(4).map(|m| m.as_str().to_string()),
                    file: path.to_string(),
                });
            }
        }
    }
    if MONGO_URI.is_match(text) {
        ev.vote_engine(SignalTier::SourceIdiom, Engine::Mongo);
    }

    // ORM idioms
    ev.vote_orm(SignalTier::SourceIdiom, OrmFamily::Eloquent, ELOQUENT_SIGNAL.find_iter(text).count());
    ev.vote_orm(SignalTier::SourceIdiom, OrmFamily::Doctrine, DOCTRINE_SIGNAL.find_iter(text).count());
    ev.vote_orm(SignalTier::SourceIdiom, OrmFamily::Propel, PROPEL_SIGNAL.find_iter(text).count());
    ev.vote_orm(
        SignalTier::SourceIdiom,
        OrmFamily::ActiveRecord,
        ACTIVE_RECORD_SIGNAL.find_iter(text).count(),
    );

    sql_literals(path, migration, scrubbed, ev);

    let uses_mysqli = MYSQLI.is_match(text);

    for (idx, line) in text.split('\n').enumerate() {
        let line_no = idx + 1;
        let evidence = |source| Evidence::new(path, line_no, line, source);

        ev.count_query(QueryKind::Pdo, PDO_CALL.find_iter(line).count());
        let query_calls = QUERY_CALL.find_iter(line).count();
        if uses_mysqli {
            ev.count_query(QueryKind::Mysqli, query_calls);
        } else {
            ev.count_query(QueryKind::Pdo, query_calls);
        }
        ev.count_query(QueryKind::Mysqli, MYSQLI.find_iter(line).count());
        ev.count_query(QueryKind::LegacyMysql, LEGACY_MYSQL.find_iter(line).count());
        ev.count_query(QueryKind::Doctrine, DOCTRINE_CALL.find_iter(line).count());
        ev.count_query(QueryKind::Mongo, MONGO_OP.find_iter(line).count());

        for caps in MODEL_CALL.captures_iter(line) {
            let model = &caps[1];
            if NON_MODEL_FACADES.contains(&model) {
                continue;
            }
            ev.count_query(QueryKind::Eloquent, 1);
            ev.add_table(&model_table(model), evidence(EvidenceSource::Query));
        }
        for caps in DB_TABLE.captures_iter(line) {
            ev.count_query(QueryKind::QueryBuilder, 1);
            ev.add_table(&caps[1], evidence(EvidenceSource::Query));
        }
        ev.count_query(QueryKind::QueryBuilder, DB_STATEMENT.find_iter(line).count());
        for caps in MONGO_COLLECTION.captures_iter(line) {
            ev.count_query(QueryKind::Mongo, 1);
            ev.add_table(&caps[1], evidence(EvidenceSource::Query));
        }
        for caps in SCHEMA_CREATE.captures_iter(line) {
            if let Some(name) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) {
                ev.add_table(name.as_str(), evidence(EvidenceSource::Migration));
            }
        }
        for caps in DOCTRINE_TABLE.captures_iter(line) {
            ev.add_table(&caps[1], evidence(EvidenceSource::Model));
        }
    }

    model_signals(file, text, ev);
}

/// Model classes and their relationships.
fn model_signals(file: &SourceFile, text: &str, ev: &mut PersistenceEvidence) {
    let path = file.rel_path.as_str();
    let explicit_table = TABLE_PROPERTY
        .captures(text)
        .or_else(|| TABLE_NAME_METHOD.captures(text))
        .or_else(|| DOCTRINE_TABLE.captures(text))
        .map(|c| c[1].to_lowercase());

    let mut owner: Option<String> = None;
    if let Some(caps) = MODEL_CLASS.captures(text) {
        let name = caps[1].to_string();
        let table = explicit_table.clone().unwrap_or_else(|| model_table(&name));
        let line = caps.get(0).map_or(1, |m| text[..m.start()].matches('\n').count() + 1);
        let context = text.split('\n').nth(line - 1).unwrap_or("");
        ev.add_table(&table, Evidence::new(path, line, context, EvidenceSource::Model));
        ev.models.push(ModelRecord {
            name: name.clone(),
            table,
            base: caps[2].to_string(),
            file: path.to_string(),
        });
        owner = Some(name);
    } else if text.contains("ORM\\Entity") {
        if let Some(caps) = ANY_CLASS.captures(text) {
            let name = caps[1].to_string();
            ev.models.push(ModelRecord {
                table: explicit_table.unwrap_or_else(|| model_table(&name)),
                name: name.clone(),
                base: "Entity".to_string(),
                file: path.to_string(),
            });
            owner = Some(name);
        }
    }

    let Some(model) = owner else { return };
    for (idx, line) in text.split('\n').enumerate() {
        for caps in RELATION_CALL.captures_iter(line) {
            let kind = match &caps[1] {
                "hasOne" => RelationshipKind::HasOne,
                "hasMany" => RelationshipKind::HasMany,
                "belongsTo" => RelationshipKind::BelongsTo,
                _ => RelationshipKind::BelongsToMany,
            };
            let target = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            push_relationship(ev, &model, kind, target, path, idx + 1);
        }
        for caps in DOCTRINE_RELATION.captures_iter(line) {
            let kind = match &caps[1] {
                "OneToOne" => RelationshipKind::HasOne,
                "OneToMany" => RelationshipKind::HasMany,
                "ManyToOne" => RelationshipKind::BelongsTo,
                _ => RelationshipKind::BelongsToMany,
            };
            push_relationship(ev, &model, kind, &caps[2], path, idx + 1);
        }
    }
}

fn push_relationship(
    ev: &mut PersistenceEvidence,
    model: &str,
    kind: RelationshipKind,
    target: &str,
    file: &str,
    line: usize,
) {
    let target = target.rsplit('\\').next().unwrap_or(target);
    if target.is_empty() {
        return;
    }
    ev.relationships.push(RelationshipRecord {
        model: model.to_string(),
        kind,
        target: target.to_string(),
        file: file.to_string(),
        line,
    });
}

/// Conventional table name for a model class: snake case, pluralized.
pub fn model_table(class_name: &str) -> String {
    let mut snake = String::new();
    for (i, ch) in class_name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                snake.push('_');
            }
            snake.extend(ch.to_lowercase());
        } else {
            snake.push(ch);
        }
    }
    pluralize(&snake)
}

fn pluralize(word: &str) -> String {
    let vowel_before_y = word
        .chars()
        .rev()
        .nth(1)
        .map_or(false, |c| "aeiou".contains(c));
    if word.ends_with('y') && !vowel_before_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "sh", "ch", "x", "z"].iter().any(|s| word.ends_with(s)) {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}
