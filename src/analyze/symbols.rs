//! Declaration recovery for PHP files.
//!
//! Class-like blocks are located by their header and closed by brace
//! matching on the scrubbed code, which resolves method ownership without a
//! parser. Anything that cannot be closed cleanly is still recorded, with
//! [`FeatureFlag::ParseUncertain`] set on the table.

use std::collections::{BTreeSet, HashSet};
use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

use super::{brace_delta, matching_brace, matching_paren, split_top_level, LineIndex, Scrubbed};
use crate::facts::{
    ClassKind, ClassRecord, ConstantRecord, FeatureFlag, FunctionRecord, ImportRecord,
    MethodRecord, PropertyRecord, SymbolTable, Visibility,
};
use crate::scan::SourceFile;

lazy_static! {
    static ref CLASS_HEADER: Regex = Regex::new(
        r"(?m)^[ \t]*((?:(?:abstract|final|readonly)\s+)*)(class|interface|trait|enum)\s+(\w+)(?:\s*:\s*\w+)?(?:\s+extends\s+([\w\\]+(?:\s*,\s*[\w\\]+)*))?(?:\s+implements\s+([\w\\,\s]+?))?\s*\{"
    )
    .unwrap();
    static ref METHOD: Regex = Regex::new(
        r"((?:\b(?:public|protected|private|static|abstract|final)\s+)*)function\s+&?(\w+)\s*\("
    )
    .unwrap();
    static ref FUNCTION: Regex = Regex::new(r"(?m)^[ \t]*function\s+&?(\w+)\s*\(").unwrap();
    static ref RETURN_TYPE: Regex = Regex::new(r"^\s*:\s*(\??[\w\\|]+)").unwrap();
    static ref PROPERTY: Regex = Regex::new(
        r"(?m)^[ \t]*((?:(?:public|protected|private|static|readonly|var)\s+)+)(?:\??[\w\\|]+\s+)?(\$\w+)\s*(?:=\s*([^;]+))?;"
    )
    .unwrap();
    static ref CLASS_CONST: Regex = Regex::new(
        r"(?m)^[ \t]*(?:(?:public|protected|private|final)\s+)*const\s+(\w+)\s*=\s*([^;]+);"
    )
    .unwrap();
    static ref NAMESPACE: Regex = Regex::new(r"(?m)^[ \t]*namespace\s+([\w\\]+)\s*[;{]").unwrap();
    static ref USE_IMPORT: Regex =
        Regex::new(r"(?m)^[ \t]*use\s+(?:function\s+|const\s+)?([\w\\]+)(?:\s+as\s+(\w+))?\s*;").unwrap();
    static ref INCLUDE: Regex =
        Regex::new(r#"\b(?:require|include)(?:_once)?\s*\(?\s*['"]([^'"]+)['"]"#).unwrap();
    static ref DEFINE: Regex =
        Regex::new(r#"\bdefine\s*\(\s*['"](\w+)['"]\s*,\s*([^)]+)\)"#).unwrap();

    static ref NULL_COALESCING: Regex = Regex::new(r"\?\?").unwrap();
    static ref TYPED_RETURN: Regex = Regex::new(r"\)\s*:\s*\??[\w\\]+").unwrap();
    static ref VOID_RETURN: Regex = Regex::new(r"\)\s*:\s*void\b").unwrap();
    static ref NULLABLE: Regex = Regex::new(r"(?:[(,]\s*|\)\s*:\s*)\?[A-Za-z_]").unwrap();
    static ref SHORT_ARRAY: Regex = Regex::new(r"(?:=|=>|\breturn|\(|,)\s*\[").unwrap();
    static ref ARROW_FN: Regex = Regex::new(r"\bfn\s*\(").unwrap();
    static ref MATCH_EXPR: Regex = Regex::new(r"\bmatch\s*\(").unwrap();
    static ref READONLY: Regex = Regex::new(r"\breadonly\s+").unwrap();
}

/// Recover declarations from a single file.
///
/// Never fails: a file without declarations yields an empty table.
pub fn extract_symbols(file: &SourceFile) -> SymbolTable {
    let scrubbed = Scrubbed::new(&file.text);
    let lines = LineIndex::new(&file.text);
    let mut table = SymbolTable::empty(&file.rel_path);

    table.namespace = NAMESPACE
        .captures(&scrubbed.code)
        .map(|c| c[1].to_string());

    let (classes, class_spans, uncertain) =
        extract_classes(&scrubbed, &lines, table.namespace.as_deref());
    table.classes = classes;
    if uncertain {
        table.features.insert(FeatureFlag::ParseUncertain);
    }

    let outside = |pos: usize| !class_spans.iter().any(|span| span.contains(&pos));

    table.imports = USE_IMPORT
        .captures_iter(&scrubbed.code)
        .filter(|c| outside(c.get(0).map_or(0, |m| m.start())))
        .map(|c| ImportRecord {
            path: c[1].trim_start_matches('\\').to_string(),
            alias: c.get(2).map(|m| m.as_str().to_string()),
        })
        .collect();

    table.includes = INCLUDE
        .captures_iter(&scrubbed.text)
        .map(|c| c[1].to_string())
        .collect();

    table.constants = DEFINE
        .captures_iter(&scrubbed.text)
        .map(|c| ConstantRecord {
            name: c[1].to_string(),
            value: c[2].trim().to_string(),
        })
        .collect();

    let mut seen_functions = HashSet::new();
    for caps in FUNCTION.captures_iter(&scrubbed.code) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        if !outside(whole.start) {
            continue;
        }
        let name = caps[1].to_string();
        if !seen_functions.insert(name.to_lowercase()) {
            table.features.insert(FeatureFlag::ParseUncertain);
            continue;
        }
        let (parameters, return_type) = signature(&scrubbed, whole.end - 1);
        table.functions.push(FunctionRecord {
            name,
            parameters,
            return_type,
            line: lines.line_of(whole.start),
        });
    }

    table.features.extend(detect_features(&scrubbed.code, &table));
    table
}

/// Find class-like blocks. Returns the records, their byte spans, and
/// whether any block was unterminated or duplicated.
fn extract_classes(
    scrubbed: &Scrubbed,
    lines: &LineIndex,
    namespace: Option<&str>,
) -> (Vec<ClassRecord>, Vec<Range<usize>>, bool) {
    let code = &scrubbed.code;
    let mut classes = Vec::new();
    let mut spans: Vec<Range<usize>> = Vec::new();
    let mut seen = HashSet::new();
    let mut uncertain = false;

    for caps in CLASS_HEADER.captures_iter(code) {
        let Some(whole) = caps.get(0) else { continue };
        if spans.iter().any(|s| s.contains(&whole.start())) {
            continue;
        }
        let open = whole.end() - 1;
        let close = match matching_brace(code, open) {
            Some(close) => close,
            None => {
                uncertain = true;
                code.len()
            }
        };
        spans.push(whole.start()..close);

        let name = caps[3].to_string();
        if !seen.insert(name.to_lowercase()) {
            uncertain = true;
            continue;
        }

        let modifiers = caps.get(1).map_or("", |m| m.as_str());
        let kind = match &caps[2] {
            "interface" => ClassKind::Interface,
            "trait" => ClassKind::Trait,
            "enum" => ClassKind::Enum,
            _ => ClassKind::Class,
        };
        let extends: Vec<String> = caps
            .get(4)
            .map(|m| split_names(m.as_str()))
            .unwrap_or_default();
        let mut interfaces: Vec<String> = caps
            .get(5)
            .map(|m| split_names(m.as_str()))
            .unwrap_or_default();
        // Interfaces extend other interfaces, not a parent class.
        let parent = if kind == ClassKind::Interface {
            interfaces.splice(0..0, extends);
            None
        } else {
            extends.into_iter().next()
        };

        let body = (open + 1)..close;
        let (methods, dup_methods) = extract_methods(scrubbed, lines, body.clone());
        uncertain |= dup_methods;

        classes.push(ClassRecord {
            name,
            kind,
            namespace: namespace.map(str::to_string),
            parent,
            interfaces,
            is_abstract: modifiers.contains("abstract"),
            is_final: modifiers.contains("final"),
            methods,
            properties: extract_properties(scrubbed, body.clone()),
            constants: extract_class_constants(scrubbed, body),
            line: lines.line_of(whole.start()),
        });
    }

    (classes, spans, uncertain)
}

fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().trim_start_matches('\\').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Methods declared directly in a class body, in declaration order.
fn extract_methods(
    scrubbed: &Scrubbed,
    lines: &LineIndex,
    body: Range<usize>,
) -> (Vec<MethodRecord>, bool) {
    let code = &scrubbed.code[body.clone()];
    let mut methods = Vec::new();
    let mut seen = HashSet::new();
    let mut duplicate = false;
    let mut depth = 0i32;
    let mut cursor = 0usize;

    for caps in METHOD.captures_iter(code) {
        let Some(whole) = caps.get(0) else { continue };
        depth += brace_delta(&code[cursor..whole.start()]);
        cursor = whole.start();
        if depth != 0 {
            continue;
        }

        let name = caps[2].to_string();
        if !seen.insert(name.to_lowercase()) {
            duplicate = true;
            continue;
        }
        let modifiers = caps.get(1).map_or("", |m| m.as_str());
        let visibility = modifiers
            .split_whitespace()
            .find_map(Visibility::parse)
            .unwrap_or_default();
        let (parameters, return_type) = signature(scrubbed, body.start + whole.end() - 1);

        methods.push(MethodRecord {
            name,
            visibility,
            is_static: modifiers.contains("static"),
            is_abstract: modifiers.contains("abstract"),
            parameters,
            return_type,
            line: lines.line_of(body.start + whole.start()),
        });
    }

    (methods, duplicate)
}

/// Parameters and return type for the parameter list opening at `open_paren`.
fn signature(scrubbed: &Scrubbed, open_paren: usize) -> (Vec<String>, Option<String>) {
    let Some(close) = matching_paren(&scrubbed.code, open_paren) else {
        return (Vec::new(), None);
    };
    let parameters = split_top_level(&scrubbed.text[open_paren + 1..close]);
    let return_type = RETURN_TYPE
        .captures(&scrubbed.code[close + 1..])
        .map(|c| c[1].to_string());
    (parameters, return_type)
}

/// Top-level positions of a class body, skipping method bodies.
fn at_class_level(code: &str, body: &Range<usize>, pos: usize) -> bool {
    brace_delta(&code[body.start..pos]) == 0
}

fn extract_properties(scrubbed: &Scrubbed, body: Range<usize>) -> Vec<PropertyRecord> {
    PROPERTY
        .captures_iter(&scrubbed.code[body.clone()])
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if !at_class_level(&scrubbed.code, &body, body.start + whole.start()) {
                return None;
            }
            let modifiers = caps.get(1).map_or("", |m| m.as_str());
            let default_value = caps.get(3).map(|m| {
                let range = (body.start + m.start())..(body.start + m.end());
                scrubbed.text[range].trim().to_string()
            });
            Some(PropertyRecord {
                name: caps[2].to_string(),
                visibility: modifiers
                    .split_whitespace()
                    .find_map(Visibility::parse)
                    .unwrap_or_default(),
                is_static: modifiers.contains("static"),
                default_value,
            })
        })
        .collect()
}

fn extract_class_constants(scrubbed: &Scrubbed, body: Range<usize>) -> Vec<ConstantRecord> {
    CLASS_CONST
        .captures_iter(&scrubbed.code[body.clone()])
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if !at_class_level(&scrubbed.code, &body, body.start + whole.start()) {
                return None;
            }
            let value = caps.get(2)?;
            let range = (body.start + value.start())..(body.start + value.end());
            Some(ConstantRecord {
                name: caps[1].to_string(),
                value: scrubbed.text[range].trim().to_string(),
            })
        })
        .collect()
}

fn detect_features(code: &str, table: &SymbolTable) -> BTreeSet<FeatureFlag> {
    let checks: [(FeatureFlag, &Regex); 8] = [
        (FeatureFlag::NullCoalescing, &NULL_COALESCING),
        (FeatureFlag::ReturnTypes, &TYPED_RETURN),
        (FeatureFlag::VoidReturn, &VOID_RETURN),
        (FeatureFlag::NullableTypes, &NULLABLE),
        (FeatureFlag::ShortArraySyntax, &SHORT_ARRAY),
        (FeatureFlag::ArrowFunctions, &ARROW_FN),
        (FeatureFlag::MatchExpressions, &MATCH_EXPR),
        (FeatureFlag::ReadonlyProperties, &READONLY),
    ];
    let mut flags: BTreeSet<FeatureFlag> = checks
        .iter()
        .filter(|(_, re)| re.is_match(code))
        .map(|(flag, _)| *flag)
        .collect();

    if code.contains("#[") {
        flags.insert(FeatureFlag::Attributes);
    }
    if table.namespace.is_some() {
        flags.insert(FeatureFlag::Namespaces);
    }
    if table.classes.iter().any(|c| c.kind == ClassKind::Trait) {
        flags.insert(FeatureFlag::Traits);
    }
    if table.classes.iter().any(|c| c.kind == ClassKind::Enum) {
        flags.insert(FeatureFlag::Enums);
    }
    flags
}
