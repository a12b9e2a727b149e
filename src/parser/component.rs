//! Parser for the browser component-test runner's (cypress, mocha
//! reporter) console output. Shared by both component partitions.

use std::sync::OnceLock;

use regex::Regex;

use super::ParsedOutput;
use crate::models::TestStats;
use crate::models::result::SuiteError;

struct Patterns {
    passing: Regex,
    failing: Regex,
    pending: Regex,
    passed_glyph: Regex,
    failed_glyph: Regex,
    failure_block: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        passing: Regex::new(r"(?m)^\s*(\d+)\s+passing\b").unwrap(),
        failing: Regex::new(r"(?m)^\s*(\d+)\s+failing\b").unwrap(),
        pending: Regex::new(r"(?m)^\s*(\d+)\s+(?:pending|skipped)\b").unwrap(),
        passed_glyph: Regex::new(r"(?m)^\s*[✓√]\s+(.+?)(?:\s+\(\d+m?s\))?\s*$").unwrap(),
        failed_glyph: Regex::new(r"(?m)^\s*[✗×✘]\s+(.+?)\s*$").unwrap(),
        // "  1) AssetForm
        //        rejects an empty beneficiary:
        //      AssertionError: expected the form to be invalid"
        failure_block: Regex::new(r"(?m)^\s*\d+\)\s+(.+)\r?\n\s+(.+?):?\r?\n\s+(.+)$").unwrap(),
    })
}

pub fn parse(raw: &str, exit_code: Option<i32>) -> ParsedOutput {
    let p = patterns();
    let mut out = ParsedOutput::default();

    let grab = |re: &Regex| {
        re.captures(raw)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok())
    };

    let passing = grab(&p.passing);
    let failing = grab(&p.failing);
    let pending = grab(&p.pending);

    if passing.is_some() || failing.is_some() {
        let passed = passing.unwrap_or(0);
        let failed = failing.unwrap_or(0);
        let skipped = pending.unwrap_or(0);
        out.stats = TestStats::new(passed + failed + skipped, passed, failed, skipped);
        out.is_complete = true;
    } else {
        // Still running: count the per-test glyphs printed so far.
        let passed = p.passed_glyph.find_iter(raw).count();
        let failed = p.failed_glyph.find_iter(raw).count();
        out.stats = TestStats::new(passed + failed, passed, failed, 0);
        out.is_complete = exit_code.is_some();
        out.current_test = p
            .passed_glyph
            .captures_iter(raw)
            .last()
            .and_then(|c| c.get(1).map(|m| m.as_str().trim().to_string()));
    }

    out.errors = collect_failures(raw, p);
    if exit_code.is_some() {
        out.is_complete = true;
    }
    out
}

/// Failure entries from the numbered summary blocks, falling back to the
/// inline ✗ glyph lines when the summary hasn't printed yet.
fn collect_failures(raw: &str, p: &Patterns) -> Vec<SuiteError> {
    let mut failures: Vec<SuiteError> = p
        .failure_block
        .captures_iter(raw)
        .map(|caps| {
            let suite = caps.get(1).map_or("", |m| m.as_str().trim());
            let test = caps.get(2).map_or("", |m| m.as_str().trim().trim_end_matches(':'));
            let detail = caps.get(3).map_or("", |m| m.as_str().trim());
            SuiteError::message(format!("{suite} > {test}: {detail}"))
        })
        .collect();

    if failures.is_empty() {
        failures = p
            .failed_glyph
            .captures_iter(raw)
            .filter_map(|caps| caps.get(1))
            .map(|m| SuiteError::message(m.as_str().trim()))
            .collect();
    }
    failures
}
