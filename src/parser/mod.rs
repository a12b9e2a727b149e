pub mod component;
pub mod eslint;
pub mod typecheck;
pub mod vitest;

use tracing::warn;

use crate::models::result::SuiteError;
use crate::models::{SuiteKind, TestStats};

/// Result of parsing a tool's accumulated output. Pure data; the runner
/// decides what to do with it.
#[derive(Debug, Clone, Default)]
pub struct ParsedOutput {
    pub stats: TestStats,
    pub is_complete: bool,
    pub current_test: Option<String>,
    pub errors: Vec<SuiteError>,
}

/// Parse raw tool output for the given suite kind. Never fails: malformed
/// or truncated output degrades to a zero-stats record so one bad chunk
/// can't take down the pipeline.
///
/// `expected_total` comes from the test counter. While the suite is still
/// running it supplies the denominator (raw output can't know the final
/// total yet); at completion it is reconciled against the parsed counts.
pub fn parse(
    raw: &str,
    kind: SuiteKind,
    exit_code: Option<i32>,
    expected_total: Option<usize>,
) -> ParsedOutput {
    let mut parsed = match kind {
        SuiteKind::UnitRunner => vitest::parse(raw, exit_code),
        SuiteKind::Lint => eslint::parse(raw, exit_code),
        SuiteKind::Typecheck => typecheck::parse(raw, exit_code),
        SuiteKind::Browser => component::parse(raw, exit_code),
    };

    match kind {
        SuiteKind::UnitRunner | SuiteKind::Browser => {
            reconcile(&mut parsed, expected_total, kind);
        }
        // Binary checks: progress is all-or-nothing.
        SuiteKind::Lint | SuiteKind::Typecheck => {
            if parsed.is_complete {
                parsed.stats.set_progress_complete();
            }
        }
    }
    parsed
}

/// Align parsed counts with the scanner's expected total.
///
/// Mid-run, the expected total replaces the tests-seen-so-far figure so the
/// progress fraction reflects true completion. At completion, a
/// disagreement is resolved in favor of the expected total for
/// `total`/`skipped` while the parsed `passed`/`failed` stay authoritative;
/// the override is logged loudly rather than silently absorbed.
fn reconcile(parsed: &mut ParsedOutput, expected_total: Option<usize>, kind: SuiteKind) {
    let stats = &mut parsed.stats;
    let executed = stats.executed();

    if !parsed.is_complete {
        if let Some(expected) = expected_total {
            stats.total = expected.max(executed + stats.skipped);
        }
        stats.recalc_pass_rate();
        stats.set_progress_partial();
        return;
    }

    if let Some(expected) = expected_total
        && expected != executed + stats.skipped
    {
        if expected >= executed {
            warn!(
                kind = ?kind,
                expected,
                parsed_total = executed + stats.skipped,
                passed = stats.passed,
                failed = stats.failed,
                "parsed totals disagree with scanned expectation; trusting the scan"
            );
            stats.total = expected;
            stats.skipped = expected - executed;
        } else {
            // More tests ran than the scan found; the parse is the only
            // consistent story left.
            warn!(
                kind = ?kind,
                expected,
                executed,
                "scan expected fewer tests than actually ran; keeping parsed totals"
            );
            stats.total = executed + stats.skipped;
        }
    } else {
        stats.total = executed + stats.skipped;
    }
    stats.recalc_pass_rate();
    stats.set_progress_complete();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_panics_on_garbage() {
        let garbage: &[&str] = &[
            "",
            "\u{0}\u{1}\u{2}binary\u{fffd}garbage",
            "Tests  not | a summary (",
            "✖ problems problems problems",
        ];
        for raw in garbage {
            for kind in [
                SuiteKind::UnitRunner,
                SuiteKind::Lint,
                SuiteKind::Typecheck,
                SuiteKind::Browser,
            ] {
                let parsed = parse(raw, kind, None, None);
                assert_eq!(parsed.stats.passed, 0);
                assert_eq!(parsed.stats.failed, 0);
            }
        }
    }

    #[test]
    fn test_totals_balance_after_reconciliation() {
        let raw = " Tests  2 failed | 40 passed (42)\n";
        let parsed = parse(raw, SuiteKind::UnitRunner, Some(1), Some(45));
        let stats = parsed.stats;
        assert_eq!(stats.total, 45);
        assert_eq!(stats.passed + stats.failed + stats.skipped, stats.total);
        assert_eq!(stats.skipped, 3);
    }

    #[test]
    fn test_scan_undercount_keeps_parsed_totals() {
        let raw = " Tests  42 passed (42)\n";
        let parsed = parse(raw, SuiteKind::UnitRunner, Some(0), Some(40));
        assert_eq!(parsed.stats.total, 42);
        assert_eq!(parsed.stats.skipped, 0);
    }

    #[test]
    fn test_partial_output_uses_expected_denominator() {
        let raw = "✓ server/rules.test.ts > creates a rule\n✓ server/rules.test.ts > lists rules\n";
        let parsed = parse(raw, SuiteKind::UnitRunner, None, Some(40));
        assert!(!parsed.is_complete);
        assert_eq!(parsed.stats.total, 40);
        assert_eq!(parsed.stats.passed, 2);
        assert!(parsed.stats.progress < 100.0);
    }

    #[test]
    fn test_monotone_counts_across_growing_chunks() {
        let chunks = [
            "✓ a > first\n",
            "✓ a > first\n✓ a > second\n",
            "✓ a > first\n✓ a > second\n× a > third\n",
        ];
        let mut last = 0;
        for chunk in chunks {
            let parsed = parse(chunk, SuiteKind::UnitRunner, None, Some(10));
            let executed = parsed.stats.executed();
            assert!(executed >= last);
            last = executed;
        }
    }
}
