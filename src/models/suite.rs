use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The closed set of suites a run can execute. Quality gates come first and
/// are sequential; the three test suites fan out in parallel once both
/// gates pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuiteId {
    Lint,
    Build,
    Backend,
    ComponentForms,
    ComponentDashboard,
}

/// Which parsing strategy a suite's output goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteKind {
    Lint,
    Typecheck,
    UnitRunner,
    Browser,
}

impl SuiteId {
    pub const ALL: [SuiteId; 5] = [
        SuiteId::Lint,
        SuiteId::Build,
        SuiteId::Backend,
        SuiteId::ComponentForms,
        SuiteId::ComponentDashboard,
    ];

    pub const GATES: [SuiteId; 2] = [SuiteId::Lint, SuiteId::Build];

    pub const TEST_SUITES: [SuiteId; 3] = [
        SuiteId::Backend,
        SuiteId::ComponentForms,
        SuiteId::ComponentDashboard,
    ];

    pub fn kind(&self) -> SuiteKind {
        match self {
            SuiteId::Lint => SuiteKind::Lint,
            SuiteId::Build => SuiteKind::Typecheck,
            SuiteId::Backend => SuiteKind::UnitRunner,
            SuiteId::ComponentForms | SuiteId::ComponentDashboard => SuiteKind::Browser,
        }
    }

    pub fn is_gate(&self) -> bool {
        matches!(self, SuiteId::Lint | SuiteId::Build)
    }

    /// Relative share of the overall progress bar. Reflects expected
    /// duration, so a trivial gate can't dominate the displayed progress.
    pub fn weight(&self) -> f64 {
        match self {
            SuiteId::Lint => 0.05,
            SuiteId::Build => 0.10,
            SuiteId::Backend => 0.45,
            SuiteId::ComponentForms => 0.20,
            SuiteId::ComponentDashboard => 0.20,
        }
    }

    pub fn default_command(&self) -> &'static str {
        match self {
            SuiteId::Lint => "npx eslint . --format stylish",
            SuiteId::Build => "npx tsc --noEmit --pretty false",
            SuiteId::Backend => "npx vitest run --root server",
            SuiteId::ComponentForms => {
                "npx cypress run --component --spec components/forms/**/*.cy.tsx"
            }
            SuiteId::ComponentDashboard => {
                "npx cypress run --component --spec components/dashboard/**/*.cy.tsx"
            }
        }
    }

    /// Hard kill timer per suite; browser suites get longer.
    pub fn timeout(&self) -> Duration {
        match self.kind() {
            SuiteKind::Browser => Duration::from_secs(180),
            _ => Duration::from_secs(120),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SuiteId::Lint => "Lint",
            SuiteId::Build => "Build",
            SuiteId::Backend => "Backend tests",
            SuiteId::ComponentForms => "Component tests (forms)",
            SuiteId::ComponentDashboard => "Component tests (dashboard)",
        }
    }

    /// Wire/CLI name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteId::Lint => "lint",
            SuiteId::Build => "build",
            SuiteId::Backend => "backend",
            SuiteId::ComponentForms => "componentForms",
            SuiteId::ComponentDashboard => "componentDashboard",
        }
    }
}

impl fmt::Display for SuiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuiteId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lint" => Ok(SuiteId::Lint),
            "build" => Ok(SuiteId::Build),
            "backend" => Ok(SuiteId::Backend),
            "componentForms" | "component-forms" => Ok(SuiteId::ComponentForms),
            "componentDashboard" | "component-dashboard" => Ok(SuiteId::ComponentDashboard),
            other => Err(format!("unknown suite '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        let sum: f64 = SuiteId::ALL.iter().map(|s| s.weight()).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_serde_names_match_as_str() {
        for suite in SuiteId::ALL {
            let json = serde_json::to_string(&suite).unwrap();
            assert_eq!(json, format!("\"{}\"", suite.as_str()));
            let back: SuiteId = serde_json::from_str(&json).unwrap();
            assert_eq!(back, suite);
        }
    }

    #[test]
    fn test_from_str_accepts_kebab_aliases() {
        assert_eq!(
            "component-forms".parse::<SuiteId>().unwrap(),
            SuiteId::ComponentForms
        );
        assert!("unit".parse::<SuiteId>().is_err());
    }

    #[test]
    fn test_gate_partition_covers_all() {
        for suite in SuiteId::ALL {
            let in_gates = SuiteId::GATES.contains(&suite);
            let in_tests = SuiteId::TEST_SUITES.contains(&suite);
            assert!(in_gates != in_tests);
            assert_eq!(in_gates, suite.is_gate());
        }
    }
}
