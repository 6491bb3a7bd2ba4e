//! Output formatting for a facts model.
//!
//! Supports two output formats:
//! - Pretty: colored terminal summary for human readability
//! - JSON: the full model with stable snake_case keys

use std::io::Write;

use colored::*;
use serde::Serialize;

use crate::facts::{FactsModel, Tier};

/// Number of items listed per section before the rest are elided.
const LIST_LIMIT: usize = 10;

// =============================================================================
// JSON Format
// =============================================================================

/// Serialize the model as pretty-printed JSON.
pub fn to_json(model: &FactsModel) -> serde_json::Result<String> {
    serde_json::to_string_pretty(model)
}

/// Write the model as JSON followed by a newline.
pub fn write_json<W: Write>(mut out: W, model: &FactsModel) -> anyhow::Result<()> {
    let json = to_json(model)?;
    writeln!(out, "{}", json)?;
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Render the model's serde name, the same label JSON output uses.
fn label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => "-".to_string(),
    }
}

/// Write a colored human-readable summary to stdout.
pub fn write_pretty(model: &FactsModel) {
    // Header
    println!();
    print!("  ");
    print!("{}", "phpfacts".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Scanned:  ".dimmed());
    println!("{}", model.root);
    println!();

    write_summary(model);
    println!();

    write_totals(model);
    println!();

    if !model.endpoints.is_empty() {
        write_endpoints(model);
        println!();
    }

    write_persistence(model);
    println!();

    if !model.dependencies.is_empty() {
        write_dependencies(model);
        println!();
    }

    write_structure(model);
    println!();

    if !model.summary.risk_factors.is_empty() {
        println!("  {} ({}):", "Risk factors".bold(), model.summary.risk_factors.len());
        for risk in &model.summary.risk_factors {
            println!("    {} {}", "!".yellow(), risk);
        }
        println!();
    }

    if !model.warnings.is_empty() {
        println!("  {} ({}):", "Warnings".bold(), model.warnings.len());
        for w in model.warnings.iter().take(LIST_LIMIT) {
            println!("    {} {} {}", "WARN ".yellow(), w.path.blue(), w.message.dimmed());
        }
        write_elided(model.warnings.len());
        println!();
    }
}

fn write_summary(model: &FactsModel) {
    let s = &model.summary;
    print!("  Complexity: ");
    write_colored_tier(s.complexity_tier, false);
    print!("  Code: ");
    write_colored_tier(s.code_complexity, false);
    print!("  Effort: ");
    write_colored_tier(s.estimated_effort, false);
    print!("  Readiness: ");
    write_colored_tier(s.migration_readiness_tier, true);
    println!();
}

/// High readiness is good news; high complexity is not.
fn write_colored_tier(tier: Tier, higher_is_better: bool) {
    let text = tier.as_str();
    match (tier, higher_is_better) {
        (Tier::Unknown, _) => print!("{}", text.dimmed()),
        (Tier::Low, false) | (Tier::High, true) => print!("{}", text.green().bold()),
        (Tier::Medium, _) => print!("{}", text.yellow()),
        _ => print!("{}", text.red()),
    }
}

fn write_totals(model: &FactsModel) {
    let t = &model.totals;
    println!("  {}:", "Totals".bold());
    println!(
        "    files {}  classes {}  interfaces {}  traits {}  functions {}  methods {}",
        t.files, t.classes, t.interfaces, t.traits, t.functions, t.methods
    );
    println!(
        "    endpoints {} ({} duplicated)  tables {}  dependencies {} ({} unmapped)",
        t.endpoints, t.duplicate_endpoints, t.tables, t.dependencies, t.unmapped_dependencies
    );
    if !t.features.is_empty() {
        let features: Vec<&str> = t.features.iter().map(|f| f.as_str()).collect();
        println!("    {} {}", "features".dimmed(), features.join(", "));
    }
}

fn write_endpoints(model: &FactsModel) {
    println!("  {} ({}):", "Endpoints".bold(), model.endpoints.len());
    for e in model.endpoints.iter().take(LIST_LIMIT) {
        print!("    {:<7}", e.http_method.as_str().cyan());
        print!("{:<32}", e.url_pattern);
        print!("{}", e.handler_reference);
        if let Some(original) = e.duplicate_of {
            print!("  {}", format!("(duplicate of #{})", original).yellow());
        }
        println!();
        println!("           {}", format!("{}:{}", e.file, e.line).dimmed());
    }
    write_elided(model.endpoints.len());
}

fn write_persistence(model: &FactsModel) {
    let p = &model.persistence;
    println!("  {}:", "Persistence".bold());
    print!("    engine {}", p.engine.as_str().cyan());
    if let Some(basis) = p.engine_basis {
        print!(" {}", format!("({})", label(&basis)).dimmed());
    }
    print!("  orm {}", p.orm.as_str().cyan());
    if let Some(basis) = p.orm_basis {
        print!(" {}", format!("({})", label(&basis)).dimmed());
    }
    println!();

    if !p.query_style_counts.is_empty() {
        let counts: Vec<String> = p
            .query_style_counts
            .iter()
            .map(|(kind, n)| format!("{} {}", label(kind), n))
            .collect();
        println!("    {} {}", "queries".dimmed(), counts.join(", "));
    }
    if !p.tables.is_empty() {
        let names: Vec<&str> = p.tables.iter().take(LIST_LIMIT).map(|t| t.name.as_str()).collect();
        print!("    {} {}", "tables".dimmed(), names.join(", "));
        if p.tables.len() > LIST_LIMIT {
            print!("{}", format!(" (+{} more)", p.tables.len() - LIST_LIMIT).dimmed());
        }
        println!();
    }
    if !p.models.is_empty() || !p.migration_files.is_empty() {
        println!(
            "    {} {}  {} {}  {} {}",
            "models".dimmed(),
            p.models.len(),
            "relationships".dimmed(),
            p.relationships.len(),
            "migrations".dimmed(),
            p.migration_files.len()
        );
    }
}

fn write_dependencies(model: &FactsModel) {
    println!("  {} ({}):", "Dependencies".bold(), model.dependencies.len());
    for d in model.dependencies.iter().take(LIST_LIMIT) {
        print!("    {:<36}", d.declared_name);
        match &d.target_equivalent {
            Some(target) => print!("{:<16}", target.green()),
            None => print!("{:<16}", "unmapped".red()),
        }
        print!("{:<6}", label(&d.category).dimmed());
        if d.declared_version_constraint.is_none() {
            print!(" {}", label(&d.source).dimmed());
        }
        println!();
    }
    write_elided(model.dependencies.len());
}

fn write_structure(model: &FactsModel) {
    let s = &model.structure;
    println!("  {}:", "Structure".bold());
    print!("    framework {}", s.framework.as_str().cyan());
    print!("  organization {}", label(&s.organization));
    print!("  separation {}", label(&s.separation_quality));
    print!("  score ");
    write_colored_score(s.architecture_score);
    println!();
    if !s.entry_points.is_empty() {
        println!("    {} {}", "entry points".dimmed(), s.entry_points.join(", "));
    }
}

fn write_colored_score(score: f64) {
    let text = format!("{:.1}", score);
    match score {
        s if s >= 7.0 => print!("{}", text.green().bold()),
        s if s >= 5.0 => print!("{}", text.yellow()),
        _ => print!("{}", text.red()),
    }
}

fn write_elided(total: usize) {
    if total > LIST_LIMIT {
        println!("    {}", format!("... and {} more", total - LIST_LIMIT).dimmed());
    }
}
