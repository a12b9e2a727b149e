use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::ScanConfig;
use crate::models::{FamilyCounts, TestCounts};

/// Matches a test-declaration callsite: `it(...)`, `test(...)`, and their
/// modifier chains (`it.only(`, `test.each(...)`). `describe` blocks group
/// tests and are deliberately not counted. The leading character class
/// rejects property accesses like `suite.it(`.
struct DeclPatterns {
    test_call: Regex,
}

impl DeclPatterns {
    fn new() -> Self {
        Self {
            test_call: Regex::new(
                r"(?:^|[^.\w])(?:it|test)(?:\s*\.\s*(?:only|skip|todo|concurrent|sequential|fails|each))*\s*\(",
            )
            .unwrap(),
        }
    }
}

/// Statically scan the workspace's test tree and produce the authoritative
/// expected totals used as progress denominators. A single unreadable file
/// logs a warning and contributes zero; the scan always completes.
pub fn scan(workspace: &Path, config: &ScanConfig) -> TestCounts {
    let start = Instant::now();
    let patterns = DeclPatterns::new();

    let component_files = discover(workspace, &config.component_globs);
    let backend_files = discover(workspace, &config.backend_globs);

    let component_tests = count_family(workspace, &component_files, &patterns);
    let backend_tests = count_family(workspace, &backend_files, &patterns);

    let counts = TestCounts {
        total: component_tests.total + backend_tests.total,
        file_count: component_files.len() + backend_files.len(),
        component_tests,
        backend_tests,
        scan_duration_ms: start.elapsed().as_millis() as u64,
        timestamp: Utc::now(),
    };
    debug!(
        total = counts.total,
        files = counts.file_count,
        duration_ms = counts.scan_duration_ms,
        "test scan complete"
    );
    counts
}

/// Expand the configured glob patterns under the workspace root, skipping
/// anything inside node_modules. Paths are deduplicated and sorted so two
/// scans of the same tree produce identical breakdowns.
fn discover(workspace: &Path, globs: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for pattern in globs {
        let full = workspace.join(pattern).to_string_lossy().to_string();
        let Ok(entries) = glob::glob(&full) else {
            warn!(pattern = %pattern, "invalid scan glob, skipping");
            continue;
        };
        for entry in entries.flatten() {
            if !entry.to_string_lossy().contains("node_modules") && !files.contains(&entry) {
                files.push(entry);
            }
        }
    }
    files.sort();
    files
}

fn count_family(workspace: &Path, files: &[PathBuf], patterns: &DeclPatterns) -> FamilyCounts {
    let mut family = FamilyCounts::default();
    for file in files {
        let count = match std::fs::read_to_string(file) {
            Ok(source) => count_declarations(&source, patterns),
            Err(err) => {
                warn!(file = %file.display(), error = %err, "unreadable test file counted as zero");
                0
            }
        };
        let rel = file
            .strip_prefix(workspace)
            .unwrap_or(file)
            .to_string_lossy()
            .to_string();
        family.push(rel, count);
    }
    family
}

fn count_declarations(source: &str, patterns: &DeclPatterns) -> usize {
    let stripped = strip_literals(source);
    patterns.test_call.find_iter(&stripped).count()
}

/// Blank out comments and string/template literals so a test name like
/// `"it('nested')"` or commented-out code can't inflate the count. The
/// structure (lengths, newlines) is preserved.
fn strip_literals(source: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(char),
        Template,
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::BlockComment;
                }
                '\'' | '"' => {
                    out.push(' ');
                    state = State::Str(c);
                }
                '`' => {
                    out.push(' ');
                    state = State::Template;
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    out.push(' ');
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = State::Code;
                } else {
                    out.push(if c == '\n' { '\n' } else { ' ' });
                }
            }
            State::Str(quote) => {
                if c == '\\' {
                    chars.next();
                    out.push_str("  ");
                } else if c == quote {
                    out.push(' ');
                    state = State::Code;
                } else {
                    out.push(if c == '\n' { '\n' } else { ' ' });
                }
            }
            State::Template => {
                if c == '\\' {
                    chars.next();
                    out.push_str("  ");
                } else if c == '`' {
                    out.push(' ');
                    state = State::Code;
                } else {
                    out.push(if c == '\n' { '\n' } else { ' ' });
                }
            }
        }
    }
    out
}
