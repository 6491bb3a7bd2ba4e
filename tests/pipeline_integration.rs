//! Integration tests for the full scan pipeline.
//!
//! The fixture trees under `testdata/` are scanned end to end; the smaller
//! scenarios are built in temp directories.

use std::fs;
use std::path::{Path, PathBuf};

use phpfacts::aggregate::{
    RISK_DUPLICATE_ENDPOINTS, RISK_POOR_ORGANIZATION, RISK_UNCERTAIN_PARSES,
    RISK_UNMAPPED_DEPENDENCIES,
};
use phpfacts::facts::{
    DependencySource, Engine, Framework, HttpMethod, OrmFamily, QueryKind, SignalTier, Tier,
};
use phpfacts::{scan, Error, Runner, ScanConfig, WarningKind};
use tempfile::TempDir;

fn testdata_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// `count` classes whose method counts follow `methods`.
fn classes_source(methods: &[usize]) -> String {
    let mut src = String::new();
    for (i, n) in methods.iter().enumerate() {
        src.push_str(&format!("class Widget{} {{\n", i));
        for m in 0..*n {
            src.push_str(&format!("    public function action{}() {{ return {}; }}\n", m, m));
        }
        src.push_str("}\n\n");
    }
    src
}

#[test]
fn test_laravel_fixture() {
    let model = scan(testdata_path("laravel_app")).expect("scan should succeed");

    assert_eq!(model.structure.framework, Framework::Laravel);
    assert_eq!(model.structure.entry_points, vec!["public/index.php"]);
    assert_eq!(model.structure.architecture_score, 8.5);

    // routes/api.php sorts before routes/web.php, so its GET /posts is the primary
    assert_eq!(model.totals.endpoints, 5);
    assert_eq!(model.totals.duplicate_endpoints, 1);
    let primary = &model.endpoints[0];
    assert_eq!(primary.file, "routes/api.php");
    assert_eq!(primary.url_pattern, "/posts");
    let duplicate = model
        .endpoints
        .iter()
        .find(|e| e.duplicate_of.is_some())
        .unwrap();
    assert_eq!(duplicate.file, "routes/web.php");
    assert_eq!(duplicate.duplicate_of, Some(primary.id));
    assert_eq!(duplicate.handler_reference, "PostController.index");

    let store = model
        .endpoints
        .iter()
        .find(|e| e.http_method == HttpMethod::Post)
        .unwrap();
    assert!(store.declared_auth_requirement);

    let p = &model.persistence;
    assert_eq!(p.engine, Engine::Postgres);
    assert_eq!(p.engine_basis, Some(SignalTier::EnvFile));
    assert_eq!(p.orm, OrmFamily::Eloquent);
    let tables: Vec<_> = p.tables.iter().map(|t| t.name.as_str()).collect();
    assert!(tables.contains(&"posts"));
    assert!(tables.contains(&"comments"));
    assert_eq!(p.models.len(), 2);
    assert_eq!(p.relationships.len(), 2);
    assert_eq!(
        p.migration_files,
        vec!["database/migrations/2024_01_01_000000_create_posts_table.php"]
    );

    let names: Vec<_> = model
        .dependencies
        .iter()
        .map(|d| d.declared_name.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["acme/billing-sdk", "guzzlehttp/guzzle", "laravel/framework", "phpunit/phpunit"]
    );
    assert!(model
        .dependencies
        .iter()
        .all(|d| d.source == DependencySource::Manifest));
    assert_eq!(model.totals.unmapped_dependencies, 1);

    assert_eq!(model.summary.complexity_tier, Tier::Low);
    assert_eq!(model.summary.migration_readiness_tier, Tier::High);
    assert!(model.summary.risk_factors.contains(RISK_DUPLICATE_ENDPOINTS));
    assert!(model.summary.risk_factors.contains(RISK_UNMAPPED_DEPENDENCIES));
    assert!(!model.summary.risk_factors.contains(RISK_POOR_ORGANIZATION));
    assert!(model.warnings.is_empty());
}

#[test]
fn test_legacy_fixture() {
    let model = scan(testdata_path("legacy_app")).expect("scan should succeed");

    assert_eq!(model.totals.files, 5);
    assert_eq!(model.totals.classes, 0);
    assert_eq!(model.totals.functions, 1);

    let p = &model.persistence;
    assert_eq!(p.engine, Engine::Mysql);
    assert_eq!(p.engine_basis, Some(SignalTier::SourceIdiom));
    assert_eq!(p.orm, OrmFamily::None);
    assert!(p.query_count(QueryKind::LegacyMysql) > 0);
    let tables: Vec<_> = p.tables.iter().map(|t| t.name.as_str()).collect();
    assert!(tables.contains(&"users"));
    assert!(tables.contains(&"products"));
    let users = p.tables.iter().find(|t| t.name == "users").unwrap();
    assert!(users.evidence.len() >= 2, "evidence accumulates across files");

    // lowercase statements spread over several lines, heredoc included
    let orders = p.tables.iter().find(|t| t.name == "orders").unwrap();
    assert_eq!(orders.evidence[0].file, "reports.php");
    assert_eq!(orders.evidence[0].line, 5);
    assert!(tables.contains(&"refunds"));
    assert!(users.evidence.iter().any(|e| e.file == "reports.php" && e.line == 6));
    assert_eq!(p.query_count(QueryKind::RawSql), 6);

    let posts: Vec<_> = model
        .endpoints
        .iter()
        .map(|e| (e.http_method, e.url_pattern.as_str()))
        .collect();
    assert_eq!(posts, vec![(HttpMethod::Post, "/admin"), (HttpMethod::Post, "/login")]);

    assert!(model
        .dependencies
        .iter()
        .any(|d| d.declared_name == "ext-session" && d.source == DependencySource::Inferred));

    assert_eq!(model.structure.framework, Framework::Vanilla);
    assert_eq!(model.structure.entry_points, vec!["index.php"]);
    assert!(model.summary.risk_factors.contains(RISK_POOR_ORGANIZATION));
}

#[test]
fn test_example_scenario() {
    let temp = TempDir::new().unwrap();
    let mut src = String::from("<?php\n\n");
    src.push_str(&classes_source(&[4, 4, 4, 4, 3, 3]));
    src.push_str("Route::get('/limit', 'LimitController@show');\n");
    src.push_str("Route::get('/limit', 'LimitController@legacy');\n");
    src.push_str("Route::get('/status', 'StatusController@show');\n");
    src.push_str("Route::get('/items', 'ItemController@index');\n");
    write(temp.path(), "legacy.php", &src);

    let model = scan(temp.path()).unwrap();

    assert_eq!(model.totals.classes, 6);
    assert_eq!(model.totals.methods, 22);
    assert_eq!(model.totals.endpoints, 4);
    assert!(model.endpoints.iter().all(|e| e.http_method == HttpMethod::Get));
    assert_eq!(model.summary.complexity_tier, Tier::Low);

    let linked: Vec<_> = model
        .endpoints
        .iter()
        .filter(|e| e.duplicate_of.is_some())
        .collect();
    assert_eq!(linked.len(), 1);
    let original = &model.endpoints[linked[0].duplicate_of.unwrap()];
    assert_eq!(original.url_pattern, "/limit");
    assert_eq!(linked[0].url_pattern, "/limit");
    assert!(original.duplicate_of.is_none());

    assert!(model.summary.risk_factors.contains(RISK_DUPLICATE_ENDPOINTS));
    assert!(model.summary.risk_factors.contains(RISK_POOR_ORGANIZATION));
}

#[test]
fn test_scan_is_idempotent() {
    let first = scan(testdata_path("laravel_app")).unwrap();
    let second = scan(testdata_path("laravel_app")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unknown_defaults_without_persistence_signals() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "hello.php", "<?php\nfunction greet($name) { return \"Hi $name\"; }\n");
    write(temp.path(), "README.txt", "SELECT * FROM nothing\n");

    let model = scan(temp.path()).unwrap();
    assert_eq!(model.totals.files, 1);
    assert_eq!(model.persistence.engine, Engine::Unknown);
    assert_eq!(model.persistence.orm, OrmFamily::None);
    assert!(model.persistence.engine_basis.is_none());
    assert!(model.persistence.tables.is_empty());
}

#[test]
fn test_empty_tree_yields_empty_model() {
    let temp = TempDir::new().unwrap();
    let model = scan(temp.path()).unwrap();

    assert_eq!(model.totals.files, 0);
    assert_eq!(model.summary.complexity_tier, Tier::Unknown);
    assert_eq!(model.summary.migration_readiness_tier, Tier::Unknown);
    assert!(model.summary.risk_factors.is_empty());
    assert!(model.endpoints.is_empty());
}

#[test]
fn test_duplicates_across_files() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "src/routes.php",
        "<?php\n$app->get('/items', function ($req, $res) { return $res; });\n",
    );
    write(
        temp.path(),
        "src/legacy_routes.php",
        "<?php\n$app->get('/items', 'ItemAction');\n$app->post('/items', 'CreateItemAction');\n",
    );

    let model = scan(temp.path()).unwrap();
    let items: Vec<_> = model
        .endpoints
        .iter()
        .filter(|e| e.http_method == HttpMethod::Get && e.url_pattern == "/items")
        .collect();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].file, "src/legacy_routes.php");
    assert_eq!(items[1].duplicate_of, Some(items[0].id));
    assert_eq!(model.totals.duplicate_endpoints, 1);
    assert!(model.summary.risk_factors.contains(RISK_DUPLICATE_ENDPOINTS));
}

#[test]
fn test_adding_separated_directory_never_lowers_score() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "index.php", "<?php\ninclude 'lib/functions.php';\n");
    write(temp.path(), "lib/functions.php", "<?php\nfunction f() {}\n");
    let before = scan(temp.path()).unwrap().structure.architecture_score;

    write(
        temp.path(),
        "models/User.php",
        "<?php\nclass User {\n    public function name() { return ''; }\n}\n",
    );
    let after = scan(temp.path()).unwrap().structure.architecture_score;
    assert!(after >= before, "{} < {}", after, before);
}

#[test]
fn test_malformed_files_do_not_abort() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "broken.php",
        "<?php\nclass Broken {\n    public function a() {\n        if ($x) {\n",
    );
    fs::write(temp.path().join("latin1.php"), b"<?php\n// caf\xe9\necho 'ok';\n").unwrap();
    write(temp.path(), "ok.php", "<?php\nfunction fine() {}\n");

    let model = scan(temp.path()).unwrap();
    assert_eq!(model.totals.files, 3);
    assert_eq!(model.totals.classes, 1);
    assert!(model.summary.risk_factors.contains(RISK_UNCERTAIN_PARSES));
    let lossy: Vec<_> = model
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::NonUtf8)
        .collect();
    assert_eq!(lossy.len(), 1);
    assert_eq!(lossy[0].path, "latin1.php");
}

#[test]
fn test_size_cap_and_exclusions() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "big.php", &format!("<?php\n{}", "// padding\n".repeat(300)));
    write(temp.path(), "fixtures/seed.php", "<?php\nclass Seed {}\n");
    write(temp.path(), "vendor/pkg/Lib.php", "<?php\nclass Lib {}\n");
    write(temp.path(), "app.php", "<?php\nclass App {}\n");

    let config = ScanConfig {
        excluded_paths: vec!["fixtures/**".to_string()],
        max_file_size_kb: 1,
        ..ScanConfig::default()
    };
    let model = Runner::new(temp.path()).config(config).run().unwrap();

    assert_eq!(model.totals.files, 1);
    assert_eq!(model.totals.classes, 1);
    assert!(model
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::TooLarge && w.path == "big.php"));
}

#[test]
fn test_missing_root_is_fatal() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nope");
    match scan(&missing) {
        Err(Error::RootUnreadable { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected RootUnreadable, got {:?}", other.map(|m| m.root)),
    }
}

#[test]
fn test_file_root_is_fatal() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "index.php", "<?php\n");
    let err = scan(temp.path().join("index.php")).unwrap_err();
    assert!(matches!(err, Error::RootNotDirectory(_)));
}
