//! Parser for the type-check/build (tsc) output.
//!
//! Pass/fail is keyed on the process exit code; on failure the structured
//! `file:line:col` diagnostics are extracted for the failure panel.

use std::sync::OnceLock;

use regex::Regex;

use super::ParsedOutput;
use crate::models::TestStats;
use crate::models::result::SuiteError;

struct Patterns {
    // "components/forms/AssetForm.tsx(12,5): error TS2339: Property ..."
    tsc_diag: Regex,
    // "components/forms/AssetForm.tsx:12:5 - error TS2339: Property ..."
    colon_diag: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        tsc_diag: Regex::new(r"(?m)^(.+?)\((\d+),(\d+)\):\s+error\s+(TS\d+:\s+.+)$").unwrap(),
        colon_diag: Regex::new(r"(?m)^(.+?):(\d+):(\d+)\s*[-–]?\s*(?:error\s+)?(TS\d+.+|error.+|[A-Z].+)$")
            .unwrap(),
    })
}

pub fn parse(raw: &str, exit_code: Option<i32>) -> ParsedOutput {
    let mut out = ParsedOutput::default();
    let Some(code) = exit_code else {
        return out;
    };

    out.is_complete = true;
    out.stats = TestStats::binary(code == 0);
    if code != 0 {
        out.errors = collect_diagnostics(raw);
        if out.errors.is_empty() && !raw.trim().is_empty() {
            // Compiler crashed or printed something unstructured; keep an
            // excerpt so the failure isn't reasonless.
            let excerpt: String = raw.trim().chars().take(200).collect();
            out.errors.push(SuiteError::message(excerpt));
        }
    }
    out
}

fn collect_diagnostics(raw: &str) -> Vec<SuiteError> {
    let p = patterns();
    let mut errors = Vec::new();

    for caps in p.tsc_diag.captures_iter(raw) {
        errors.push(diag_from_captures(&caps));
    }
    if errors.is_empty() {
        for caps in p.colon_diag.captures_iter(raw) {
            errors.push(diag_from_captures(&caps));
        }
    }
    errors
}

fn diag_from_captures(caps: &regex::Captures<'_>) -> SuiteError {
    SuiteError {
        file: caps.get(1).map(|m| m.as_str().trim().to_string()),
        line: caps.get(2).and_then(|m| m.as_str().parse().ok()),
        column: caps.get(3).and_then(|m| m.as_str().parse().ok()),
        message: caps.get(4).map_or(String::new(), |m| m.as_str().trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_on_zero_exit() {
        let parsed = parse("", Some(0));
        assert!(parsed.is_complete);
        assert_eq!(parsed.stats.passed, 1);
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn test_tsc_diagnostics_extracted() {
        let raw = "\
components/forms/AssetForm.tsx(12,5): error TS2339: Property 'beneficiary' does not exist on type 'AssetDraft'.
server/rules.ts(8,13): error TS2345: Argument of type 'string' is not assignable to parameter of type 'RuleId'.
";
        let parsed = parse(raw, Some(2));
        assert_eq!(parsed.stats.failed, 1);
        assert_eq!(parsed.errors.len(), 2);
        assert_eq!(
            parsed.errors[0].file.as_deref(),
            Some("components/forms/AssetForm.tsx")
        );
        assert_eq!(parsed.errors[0].line, Some(12));
        assert_eq!(parsed.errors[0].column, Some(5));
        assert!(parsed.errors[0].message.starts_with("TS2339"));
    }

    #[test]
    fn test_colon_form_diagnostics() {
        let raw = "components/dashboard/RuleCard.tsx:4:11 - error TS2554: Expected 2 arguments, but got 1.\n";
        let parsed = parse(raw, Some(1));
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].line, Some(4));
    }

    #[test]
    fn test_unstructured_failure_keeps_excerpt() {
        let parsed = parse("FATAL: JavaScript heap out of memory", Some(134));
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].message.contains("heap out of memory"));
    }

    #[test]
    fn test_running_process_is_incomplete() {
        let parsed = parse("checking...", None);
        assert!(!parsed.is_complete);
        assert_eq!(parsed.stats.total, 0);
    }
}
