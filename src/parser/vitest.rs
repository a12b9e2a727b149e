//! Parser for the unit-test runner's (vitest) console output.
//!
//! Three strategies, in priority order: the final `Tests ...` summary line,
//! the file-level `Test Files ...` summary, and counting individual
//! pass/fail glyph lines while the run is still in flight.

use std::sync::OnceLock;

use regex::Regex;

use super::ParsedOutput;
use crate::models::TestStats;
use crate::models::result::SuiteError;

struct Patterns {
    tests_summary: Regex,
    files_summary: Regex,
    passed_glyph: Regex,
    failed_glyph: Regex,
    skipped_glyph: Regex,
    count_failed: Regex,
    count_passed: Regex,
    count_skipped: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        tests_summary: Regex::new(r"(?m)^\s*Tests\s+(.+?)\s*\((\d+)\)\s*$").unwrap(),
        files_summary: Regex::new(r"(?m)^\s*Test Files\s+(.+?)\s*\((\d+)\)\s*$").unwrap(),
        passed_glyph: Regex::new(r"(?m)^\s*[✓✔]\s+(.+?)(?:\s+\d+(?:\.\d+)?m?s)?\s*$").unwrap(),
        failed_glyph: Regex::new(r"(?m)^\s*[×✗✘]\s+(.+?)(?:\s+\d+(?:\.\d+)?m?s)?\s*$").unwrap(),
        skipped_glyph: Regex::new(r"(?m)^\s*[↓⤵-]\s+(.+?)\s*$").unwrap(),
        count_failed: Regex::new(r"(\d+)\s+failed").unwrap(),
        count_passed: Regex::new(r"(\d+)\s+passed").unwrap(),
        count_skipped: Regex::new(r"(\d+)\s+(?:skipped|todo)").unwrap(),
    })
}

pub fn parse(raw: &str, exit_code: Option<i32>) -> ParsedOutput {
    let p = patterns();
    let mut out = ParsedOutput::default();

    if let Some(caps) = p.tests_summary.captures(raw) {
        let segments = caps.get(1).map_or("", |m| m.as_str());
        let total = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        out.stats = summary_stats(segments, total);
        out.is_complete = true;
    } else if let Some(caps) = p.files_summary.captures(raw) {
        // File-granularity fallback; a later Tests line supersedes this.
        let segments = caps.get(1).map_or("", |m| m.as_str());
        let total = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        out.stats = summary_stats(segments, total);
        out.is_complete = true;
    } else {
        // Mid-run: count the per-test glyph lines seen so far.
        let passed = p.passed_glyph.find_iter(raw).count();
        let failed = p.failed_glyph.find_iter(raw).count();
        let skipped = p.skipped_glyph.find_iter(raw).count();
        out.stats = TestStats::new(passed + failed + skipped, passed, failed, skipped);
        out.is_complete = exit_code.is_some();
        out.current_test = last_glyph_name(raw, p);
    }

    for caps in p.failed_glyph.captures_iter(raw) {
        if let Some(name) = caps.get(1) {
            out.errors.push(SuiteError::message(name.as_str().trim()));
        }
    }

    if exit_code.is_some() {
        out.is_complete = true;
    }
    out
}

fn summary_stats(segments: &str, total: usize) -> TestStats {
    let p = patterns();
    let grab = |re: &Regex| {
        re.captures(segments)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(0)
    };
    TestStats::new(
        total,
        grab(&p.count_passed),
        grab(&p.count_failed),
        grab(&p.count_skipped),
    )
}

/// Name on the most recent glyph line, used as the "currently executing"
/// label. Vitest joins the path with " > "; the tail segments read best.
fn last_glyph_name(raw: &str, p: &Patterns) -> Option<String> {
    let last_passed = p.passed_glyph.captures_iter(raw).last();
    let last_failed = p.failed_glyph.captures_iter(raw).last();
    let name = match (&last_passed, &last_failed) {
        (Some(a), Some(b)) => {
            let (a, b) = (a.get(1)?, b.get(1)?);
            if a.start() > b.start() { a.as_str() } else { b.as_str() }
        }
        (Some(a), None) => a.get(1)?.as_str(),
        (None, Some(b)) => b.get(1)?.as_str(),
        (None, None) => return None,
    };
    Some(name.rsplit(" > ").next().unwrap_or(name).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_RUN: &str = "\
 RUN  v1.6.0 /app/server

 ✓ server/rules.test.ts > rules api > creates a rule 12ms
 ✓ server/rules.test.ts > rules api > lists rules for an estate 4ms
 × server/assets.test.ts > assets api > rejects an oversized document 31ms

 Test Files  1 failed | 5 passed (6)
      Tests  1 failed | 40 passed | 2 skipped (43)
   Start at  10:15:00
   Duration  2.51s
";

    #[test]
    fn test_summary_line_wins() {
        let parsed = parse(FULL_RUN, Some(1));
        assert!(parsed.is_complete);
        assert_eq!(parsed.stats.total, 43);
        assert_eq!(parsed.stats.passed, 40);
        assert_eq!(parsed.stats.failed, 1);
        assert_eq!(parsed.stats.skipped, 2);
    }

    #[test]
    fn test_file_summary_fallback() {
        let raw = " Test Files  2 failed | 4 passed (6)\n";
        let parsed = parse(raw, Some(1));
        assert!(parsed.is_complete);
        assert_eq!(parsed.stats.total, 6);
        assert_eq!(parsed.stats.passed, 4);
        assert_eq!(parsed.stats.failed, 2);
    }

    #[test]
    fn test_all_passing_summary() {
        let raw = " Tests  40 passed (40)\n";
        let parsed = parse(raw, Some(0));
        assert_eq!(parsed.stats.passed, 40);
        assert_eq!(parsed.stats.failed, 0);
        assert_eq!(parsed.stats.total, 40);
    }

    #[test]
    fn test_midrun_glyph_counting() {
        let raw = "\
 ✓ server/rules.test.ts > rules api > creates a rule 12ms
 ✓ server/rules.test.ts > rules api > lists rules for an estate 4ms
 × server/assets.test.ts > assets api > rejects an oversized document 31ms
";
        let parsed = parse(raw, None);
        assert!(!parsed.is_complete);
        assert_eq!(parsed.stats.passed, 2);
        assert_eq!(parsed.stats.failed, 1);
        assert_eq!(
            parsed.current_test.as_deref(),
            Some("rejects an oversized document")
        );
    }

    #[test]
    fn test_failed_glyphs_become_errors() {
        let parsed = parse(FULL_RUN, Some(1));
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].message.contains("rejects an oversized document"));
    }

    #[test]
    fn test_empty_output() {
        let parsed = parse("", None);
        assert!(!parsed.is_complete);
        assert_eq!(parsed.stats, TestStats::new(0, 0, 0, 0));
        assert!(parsed.current_test.is_none());
    }
}
