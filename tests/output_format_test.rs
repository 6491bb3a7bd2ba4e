//! Tests for the JSON output format.
//!
//! Downstream consumers key on these field names, so the layout is pinned
//! here rather than left to whatever serde derives.

use std::path::PathBuf;

use phpfacts::facts::SCHEMA_VERSION;
use phpfacts::report;
use serde_json::Value;

fn testdata_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
}

/// Scan a fixture and return its JSON output parsed back into a value.
fn fixture_json(name: &str) -> Value {
    let model = phpfacts::scan(testdata_path(name)).expect("scan should succeed");
    let mut buf = Vec::new();
    report::write_json(&mut buf, &model).expect("json should serialize");
    serde_json::from_slice(&buf).expect("output should be valid JSON")
}

fn keys(value: &Value) -> Vec<&str> {
    value
        .as_object()
        .expect("expected an object")
        .keys()
        .map(|k| k.as_str())
        .collect()
}

#[test]
fn test_top_level_keys() {
    let json = fixture_json("laravel_app");
    let mut top = keys(&json);
    top.sort();
    assert_eq!(
        top,
        vec![
            "dependencies",
            "endpoints",
            "persistence",
            "root",
            "schema_version",
            "structure",
            "summary",
            "symbols",
            "totals",
            "warnings"
        ]
    );
    assert_eq!(json["schema_version"], SCHEMA_VERSION);
}

#[test]
fn test_summary_fields() {
    let json = fixture_json("laravel_app");
    let summary = &json["summary"];
    assert_eq!(summary["complexity_tier"], "low");
    assert_eq!(summary["migration_readiness_tier"], "high");
    assert!(summary["code_complexity"].is_string());
    assert!(summary["estimated_effort"].is_string());

    // a set serializes as a sorted array
    let risks: Vec<&str> = summary["risk_factors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r.as_str().unwrap())
        .collect();
    let mut sorted = risks.clone();
    sorted.sort();
    assert_eq!(risks, sorted);
    assert!(risks.contains(&"duplicated endpoints"));
}

#[test]
fn test_endpoint_fields() {
    let json = fixture_json("laravel_app");
    let endpoint = &json["endpoints"][0];
    for key in [
        "id",
        "http_method",
        "url_pattern",
        "handler_reference",
        "middleware",
        "declared_auth_requirement",
        "parameters",
        "response_format",
        "family",
        "file",
        "line",
        "duplicate_of",
    ] {
        assert!(endpoint.get(key).is_some(), "endpoint missing {}", key);
    }
    assert_eq!(endpoint["http_method"], "GET");
    assert_eq!(endpoint["family"], "laravel");
    assert!(endpoint["duplicate_of"].is_null());

    let linked = json["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| !e["duplicate_of"].is_null())
        .unwrap();
    assert_eq!(linked["duplicate_of"], endpoint["id"]);
}

#[test]
fn test_persistence_fields() {
    let json = fixture_json("laravel_app");
    let p = &json["persistence"];
    assert_eq!(p["engine"], "postgres");
    assert_eq!(p["engine_basis"], "env_file");
    assert_eq!(p["orm"], "eloquent");
    assert!(p["query_style_counts"].is_object());

    let table = &p["tables"][0];
    assert!(table["name"].is_string());
    let evidence = &table["evidence"][0];
    assert!(evidence["file"].is_string());
    assert!(evidence["line"].is_u64());
    assert!(evidence["context"].is_string());
}

#[test]
fn test_unknown_values_are_explicit() {
    let json = fixture_json("legacy_app");
    assert_eq!(json["persistence"]["orm"], "none");
    assert!(json["persistence"]["orm_basis"].is_null());
    assert_eq!(json["structure"]["framework"], "vanilla");

    let dep = json["dependencies"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["declared_name"] == "ext-session")
        .unwrap();
    assert_eq!(dep["source"], "inferred");
    assert!(dep["declared_version_constraint"].is_null());
    assert_eq!(dep["category"], "auth");
}

#[test]
fn test_output_is_stable_across_runs() {
    let first = serde_json::to_string(&fixture_json("legacy_app")).unwrap();
    let second = serde_json::to_string(&fixture_json("legacy_app")).unwrap();
    assert_eq!(first, second);
}
