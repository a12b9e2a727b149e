use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::suite::SuiteId;

/// Test-declaration count for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCount {
    /// Workspace-relative path.
    pub path: String,
    pub count: usize,
}

/// Counts for one suite family, with the per-file breakdown retained for
/// diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyCounts {
    pub total: usize,
    pub files: Vec<FileCount>,
}

impl FamilyCounts {
    pub fn push(&mut self, path: String, count: usize) {
        self.total += count;
        self.files.push(FileCount { path, count });
    }

    /// Sum of counts for files under the given workspace-relative prefix.
    pub fn total_under(&self, prefix: &str) -> usize {
        self.files
            .iter()
            .filter(|f| f.path.starts_with(prefix))
            .map(|f| f.count)
            .sum()
    }
}

/// Scan result used as ground truth for progress-percentage denominators.
/// Produced once per run; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCounts {
    pub component_tests: FamilyCounts,
    pub backend_tests: FamilyCounts,
    pub total: usize,
    pub file_count: usize,
    pub scan_duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl TestCounts {
    /// Expected test total for a suite, when the scan can supply one.
    /// Gates are binary checks and carry no expectation. A component
    /// partition's expectation is the per-file sum under its spec root.
    pub fn expected_for(&self, suite: SuiteId) -> Option<usize> {
        match suite {
            SuiteId::Lint | SuiteId::Build => None,
            SuiteId::Backend => Some(self.backend_tests.total),
            SuiteId::ComponentForms => Some(self.component_tests.total_under("components/forms")),
            SuiteId::ComponentDashboard => {
                Some(self.component_tests.total_under("components/dashboard"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_counts() -> TestCounts {
        let mut component_tests = FamilyCounts::default();
        component_tests.push("components/forms/asset_form.cy.tsx".into(), 7);
        component_tests.push("components/dashboard/rule_card.cy.tsx".into(), 4);
        let mut backend_tests = FamilyCounts::default();
        backend_tests.push("server/rules.test.ts".into(), 12);
        TestCounts {
            total: component_tests.total + backend_tests.total,
            file_count: 3,
            component_tests,
            backend_tests,
            scan_duration_ms: 8,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_expected_for_partitions_by_prefix() {
        let counts = sample_counts();
        assert_eq!(counts.expected_for(SuiteId::ComponentForms), Some(7));
        assert_eq!(counts.expected_for(SuiteId::ComponentDashboard), Some(4));
        assert_eq!(counts.expected_for(SuiteId::Backend), Some(12));
        assert_eq!(counts.expected_for(SuiteId::Lint), None);
    }

    #[test]
    fn test_wire_shape_uses_camel_case() {
        let json = serde_json::to_value(sample_counts()).unwrap();
        assert!(json.get("componentTests").is_some());
        assert!(json.get("backendTests").is_some());
        assert!(json.get("scanDurationMs").is_some());
    }
}
