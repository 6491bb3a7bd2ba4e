//! Heuristic analyzers.
//!
//! Nothing here builds an AST. Each analyzer works on text that has been
//! scrubbed by [`Scrubbed::new`], which blanks comments (and optionally
//! string contents) byte for byte so offsets and line numbers still line up
//! with the original file.

pub mod dependencies;
pub mod endpoints;
pub mod mappings;
pub mod persistence;
pub mod structure;
pub mod symbols;

pub use dependencies::{map_dependencies, scan_usage, ComposerManifest, UsageSignal};
pub use endpoints::{detect_endpoints, link_duplicates, IdiomMatcher, RouteMatch};
pub use persistence::{analyze_persistence, PersistenceEvidence};
pub use structure::analyze_structure;
pub use symbols::extract_symbols;

use std::ops::Range;

/// Two views of a PHP file with identical byte offsets.
#[derive(Debug, Clone)]
pub struct Scrubbed {
    /// Comments replaced by spaces; strings intact.
    pub text: String,
    /// Comments and string contents replaced by spaces; quotes kept.
    pub code: String,
    /// Byte ranges of string literal contents, heredoc and nowdoc bodies
    /// included, in source order.
    pub strings: Vec<Range<usize>>,
}

#[derive(Clone, Copy, PartialEq)]
enum LexState {
    Html,
    Code,
    Single,
    Double,
    LineComment,
    BlockComment,
}

impl Scrubbed {
    pub fn new(source: &str) -> Self {
        let bytes = source.as_bytes();
        let mut text = bytes.to_vec();
        let mut code = bytes.to_vec();
        let mut state = if source.contains("<?") {
            LexState::Html
        } else {
            LexState::Code
        };
        let mut strings = Vec::new();
        let mut string_start = 0;
        let mut i = 0;

        let blank = |buf: &mut Vec<u8>, idx: usize| {
            if buf[idx] != b'\n' {
                buf[idx] = b' ';
            }
        };

        while i < bytes.len() {
            let b = bytes[i];
            let next = bytes.get(i + 1).copied();
            match state {
                LexState::Html => {
                    if b == b'<' && next == Some(b'?') {
                        state = LexState::Code;
                        i += 2;
                        continue;
                    }
                    blank(&mut code, i);
                }
                LexState::Code => match b {
                    b'?' if next == Some(b'>') => {
                        state = LexState::Html;
                        i += 2;
                        continue;
                    }
                    b'\'' => {
                        state = LexState::Single;
                        string_start = i + 1;
                    }
                    b'"' => {
                        state = LexState::Double;
                        string_start = i + 1;
                    }
                    b'<' if bytes[i..].starts_with(b"<<<") => {
                        if let Some((body, end)) = heredoc_body(bytes, i) {
                            for j in body.clone() {
                                blank(&mut code, j);
                            }
                            strings.push(body);
                            i = end;
                            continue;
                        }
                    }
                    b'/' if next == Some(b'/') => {
                        state = LexState::LineComment;
                        continue;
                    }
                    b'#' if next != Some(b'[') => {
                        state = LexState::LineComment;
                        continue;
                    }
                    b'/' if next == Some(b'*') => {
                        blank(&mut text, i);
                        blank(&mut code, i);
                        blank(&mut text, i + 1);
                        blank(&mut code, i + 1);
                        state = LexState::BlockComment;
                        i += 2;
                        continue;
                    }
                    _ => {}
                },
                LexState::Single | LexState::Double => {
                    let quote = if state == LexState::Single { b'\'' } else { b'"' };
                    if b == b'\\' && i + 1 < bytes.len() {
                        blank(&mut code, i);
                        blank(&mut code, i + 1);
                        i += 2;
                        continue;
                    }
                    if b == quote {
                        strings.push(string_start..i);
                        state = LexState::Code;
                    } else {
                        blank(&mut code, i);
                    }
                }
                LexState::LineComment => {
                    if b == b'\n' {
                        state = LexState::Code;
                    } else if b == b'?' && next == Some(b'>') {
                        state = LexState::Html;
                        i += 2;
                        continue;
                    } else {
                        blank(&mut text, i);
                        blank(&mut code, i);
                    }
                }
                LexState::BlockComment => {
                    blank(&mut text, i);
                    blank(&mut code, i);
                    if b == b'*' && next == Some(b'/') {
                        blank(&mut text, i + 1);
                        blank(&mut code, i + 1);
                        state = LexState::Code;
                        i += 2;
                        continue;
                    }
                }
            }
            i += 1;
        }

        // Only ASCII delimiters open or close a region, so whole multi-byte
        // sequences are either kept or blanked.
        Self {
            text: String::from_utf8_lossy(&text).into_owned(),
            code: String::from_utf8_lossy(&code).into_owned(),
            strings,
        }
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Body range and resume offset of the heredoc or nowdoc opened at `start`.
/// The closing identifier may be indented. Unterminated bodies yield `None`.
fn heredoc_body(bytes: &[u8], start: usize) -> Option<(Range<usize>, usize)> {
    let skip_blanks = |mut i: usize| {
        while matches!(bytes.get(i), Some(b' ' | b'\t')) {
            i += 1;
        }
        i
    };
    let mut i = skip_blanks(start + 3);
    let quote = match bytes.get(i) {
        Some(&q) if q == b'\'' || q == b'"' => {
            i += 1;
            Some(q)
        }
        _ => None,
    };
    let name_start = i;
    while bytes.get(i).copied().map_or(false, is_ident_byte) {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let name = &bytes[name_start..i];
    if let Some(q) = quote {
        if bytes.get(i) != Some(&q) {
            return None;
        }
        i += 1;
    }
    if bytes.get(i) == Some(&b'\r') {
        i += 1;
    }
    if bytes.get(i) != Some(&b'\n') {
        return None;
    }

    let body_start = i + 1;
    let mut line_start = body_start;
    loop {
        let j = skip_blanks(line_start);
        if bytes[j..].starts_with(name)
            && !bytes.get(j + name.len()).copied().map_or(false, is_ident_byte)
        {
            let body_end = line_start.saturating_sub(1).max(body_start);
            return Some((body_start..body_end, j + name.len()));
        }
        let newline = bytes[line_start..].iter().position(|&b| b == b'\n')?;
        line_start += newline + 1;
    }
}

/// Maps byte offsets to 1-based line numbers.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }
}

/// Net change in brace depth across a stretch of scrubbed code.
pub(crate) fn brace_delta(segment: &str) -> i32 {
    segment.bytes().fold(0, |acc, b| match b {
        b'{' => acc + 1,
        b'}' => acc - 1,
        _ => acc,
    })
}

/// Offset of the brace closing the one at `open`, if the block is terminated.
pub(crate) fn matching_brace(code: &str, open: usize) -> Option<usize> {
    matching_delim(code, open, b'{', b'}')
}

pub(crate) fn matching_paren(code: &str, open: usize) -> Option<usize> {
    matching_delim(code, open, b'(', b')')
}

fn matching_delim(code: &str, open: usize, opener: u8, closer: u8) -> Option<usize> {
    let bytes = code.as_bytes();
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if b == opener {
            depth += 1;
        } else if b == closer {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Split on commas that are not nested in brackets.
pub(crate) fn split_top_level(list: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for ch in list.chars() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrub_keeps_offsets() {
        let src = "<?php // note\n$a = 'x//y'; # hash\n/* block\n more */ $b = \"q\";\n#[Attr]\n";
        let s = Scrubbed::new(src);
        assert_eq!(s.text.len(), src.len());
        assert_eq!(s.code.len(), src.len());
        assert_eq!(s.text.lines().count(), src.lines().count());
        assert!(!s.text.contains("note"));
        assert!(!s.text.contains("hash"));
        assert!(!s.text.contains("block"));
        assert!(s.text.contains("'x//y'"));
        assert!(s.code.contains("'    '"));
        assert!(s.code.contains("#[Attr]"));
    }

    #[test]
    fn test_scrub_skips_inline_html() {
        let src = "<p>Don't panic</p>\n<?php $a = 1; ?>\n<p>It's fine</p>\n<?php $b = 2;";
        let s = Scrubbed::new(src);
        assert!(s.code.contains("$a = 1;"));
        assert!(s.code.contains("$b = 2;"));
        assert!(!s.code.contains("panic"));
        assert!(s.text.contains("It's fine"));
    }

    #[test]
    fn test_scrub_handles_escapes() {
        let s = Scrubbed::new(r#"$a = "say \"hi\" // not a comment"; $b = 1;"#);
        assert!(s.text.contains("not a comment"));
        assert!(s.code.contains("$b = 1;"));
    }

    #[test]
    fn test_scrub_multibyte() {
        let src = "<?php $s = 'héllo'; // commentaire é\n";
        let s = Scrubbed::new(src);
        assert_eq!(s.code.len(), src.len());
        assert!(s.text.contains("héllo"));
    }

    #[test]
    fn test_scrub_records_string_spans() {
        let src = "<?php $a = 'one'; $b = \"t\\\"wo\";";
        let s = Scrubbed::new(src);
        let spans: Vec<&str> = s.strings.iter().map(|r| &s.text[r.clone()]).collect();
        assert_eq!(spans, vec!["one", "t\\\"wo"]);
    }

    #[test]
    fn test_scrub_blanks_heredoc_and_nowdoc_bodies() {
        let src = "<?php\n$a = <<<EOT\nRoute::get('/fake', 'X@y');\n    EOT;\n$b = <<<'SQL'\n  select * from users\n  SQL;\n$c = 1;\n";
        let s = Scrubbed::new(src);
        assert_eq!(s.code.len(), src.len());
        assert_eq!(s.code.lines().count(), src.lines().count());
        assert!(!s.code.contains("Route::get"));
        assert!(!s.code.contains("users"));
        assert!(s.code.contains("$c = 1;"));
        assert!(s.text.contains("Route::get('/fake'"));

        let bodies: Vec<&str> = s.strings.iter().map(|r| s.text[r.clone()].trim()).collect();
        assert_eq!(bodies, vec!["Route::get('/fake', 'X@y');", "select * from users"]);
    }

    #[test]
    fn test_scrub_unterminated_heredoc_stays_code() {
        let s = Scrubbed::new("<?php\n$a = <<<EOT\nno closer here\n");
        assert!(s.code.contains("no closer here"));
        assert!(s.strings.is_empty());
    }

    #[test]
    fn test_line_index() {
        let idx = LineIndex::new("a\nbc\n\nd");
        assert_eq!(idx.line_of(0), 1);
        assert_eq!(idx.line_of(2), 2);
        assert_eq!(idx.line_of(3), 2);
        assert_eq!(idx.line_of(5), 3);
        assert_eq!(idx.line_of(6), 4);
    }

    #[test]
    fn test_matching_brace() {
        let code = "class A { function b() { if (x) { } } }";
        let open = code.find('{').unwrap();
        assert_eq!(matching_brace(code, open), Some(code.len() - 1));
        assert_eq!(matching_brace("{ {", 0), None);
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("int $a, array $b = [1, 2],  $c = f(1,2)"),
            vec!["int $a", "array $b = [1, 2]", "$c = f(1,2)"]
        );
        assert!(split_top_level("  ").is_empty());
    }
}
