//! Parser for the linter's (eslint, stylish format) console output.
//!
//! A lint pass is a binary check: zero errors means the gate passes no
//! matter how many warnings were reported.

use std::sync::OnceLock;

use regex::Regex;

use super::ParsedOutput;
use crate::models::TestStats;
use crate::models::result::SuiteError;

struct Patterns {
    summary: Regex,
    finding: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        summary: Regex::new(r"[✖x]\s+(\d+)\s+problems?\s+\((\d+)\s+errors?,\s+(\d+)\s+warnings?\)")
            .unwrap(),
        // "  12:5  error  'beneficiary' is not defined  no-undef"
        finding: Regex::new(r"(?m)^\s+(\d+):(\d+)\s+error\s+(.+?)(?:\s\s+[\w@/-]+)?\s*$").unwrap(),
    })
}

pub fn parse(raw: &str, exit_code: Option<i32>) -> ParsedOutput {
    let p = patterns();
    let mut out = ParsedOutput::default();

    let errors = if let Some(caps) = p.summary.captures(raw) {
        out.is_complete = true;
        caps.get(2)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(0)
    } else if exit_code.is_some() {
        // No summary at all: eslint prints nothing when the tree is clean.
        out.is_complete = true;
        usize::from(exit_code != Some(0))
    } else {
        return out;
    };

    out.stats = TestStats::binary(errors == 0);
    if errors > 0 {
        out.errors = collect_findings(raw, p);
    }
    out
}

/// Walk the stylish output pairing each unindented file heading with the
/// indented `line:col error ...` entries beneath it.
fn collect_findings(raw: &str, p: &Patterns) -> Vec<SuiteError> {
    let mut findings = Vec::new();
    let mut current_file: Option<String> = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !line.starts_with(' ') && !line.starts_with('✖') {
            current_file = Some(trimmed.to_string());
            continue;
        }
        if let Some(caps) = p.finding.captures(line) {
            findings.push(SuiteError {
                file: current_file.clone(),
                line: caps.get(1).and_then(|m| m.as_str().parse().ok()),
                column: caps.get(2).and_then(|m| m.as_str().parse().ok()),
                message: caps.get(3).map_or(String::new(), |m| m.as_str().trim().to_string()),
            });
        }
    }
    findings
}
