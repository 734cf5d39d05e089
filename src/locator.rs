//! Textual lookup of test declarations in source files.
//!
//! This is a per-line pattern match, not a parser: two tests on one line, or
//! declarations split across lines in unusual ways, will not be recognized.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::ecosystem::Ecosystem;

/// A test declaration found in a source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestDeclaration {
    /// Zero-based line index.
    pub line: usize,
    pub name: String,
}

struct PatternTable {
    javascript: Vec<Regex>,
    python: Vec<Regex>,
    java: Vec<Regex>,
    csharp: Vec<Regex>,
}

fn table() -> &'static PatternTable {
    static TABLE: OnceLock<PatternTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let compile = |patterns: &[&str]| -> Vec<Regex> {
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("static regex"))
                .collect()
        };
        PatternTable {
            javascript: compile(&[
                r#"\b(?:test|it)\s*\(\s*['"`]([^'"`]+)['"`]"#,
                r#"\b(?:test|it)\.(?:skip|only|fixme|fail|slow)\s*\(\s*['"`]([^'"`]+)['"`]"#,
            ]),
            python: compile(&[r"^\s*def\s+(test_\w+)", r"^\s*async\s+def\s+(test_\w+)"]),
            java: compile(&[
                r"@Test\b.*?\bvoid\s+(\w+)\s*\(",
                r"^\s*(?:public\s+|protected\s+|private\s+)?(?:static\s+)?void\s+(\w+)\s*\(\s*\)\s*(?:throws\s+[\w.,\s]+)?\{?\s*$",
            ]),
            csharp: compile(&[
                r"\[(?:Test|Fact|Theory|TestMethod)\].*?\b(?:void|Task)\s+(\w+)\s*\(",
                r"^\s*public\s+(?:async\s+)?(?:void|Task)\s+(\w+)\s*\(\s*\)",
            ]),
        }
    })
}

fn patterns(ecosystem: Ecosystem) -> &'static [Regex] {
    let table = table();
    match ecosystem {
        Ecosystem::JavaScript => &table.javascript,
        Ecosystem::Python => &table.python,
        Ecosystem::Java => &table.java,
        Ecosystem::CSharp => &table.csharp,
    }
}

fn match_line(line: &str, ecosystem: Ecosystem) -> Option<String> {
    patterns(ecosystem)
        .iter()
        .find_map(|re| re.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Name of the nearest test declared at or above `line` (zero-based).
pub fn locate_test(source: &str, ecosystem: Ecosystem, line: usize) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    if lines.is_empty() {
        return None;
    }
    let start = line.min(lines.len() - 1);
    lines[..=start]
        .iter()
        .rev()
        .find_map(|text| match_line(text, ecosystem))
}

/// Every recognized test declaration in the file, in source order.
pub fn find_tests(source: &str, ecosystem: Ecosystem) -> Vec<TestDeclaration> {
    source
        .lines()
        .enumerate()
        .filter_map(|(line, text)| {
            match_line(text, ecosystem).map(|name| TestDeclaration { line, name })
        })
        .collect()
}
