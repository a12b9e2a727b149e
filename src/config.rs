use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::models::SuiteId;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub suites: SuitesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the SSE host binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:4477".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportsConfig {
    /// Directory (relative to the workspace) holding per-run JSON records
    /// and `latest.json`.
    #[serde(default = "default_reports_dir")]
    pub dir: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            dir: default_reports_dir(),
        }
    }
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from(".pulse/reports")
}

/// Controls which files the test counter scans.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Glob patterns (relative to workspace root) for browser component-test files.
    #[serde(default = "default_component_globs")]
    pub component_globs: Vec<String>,
    /// Glob patterns for backend unit-test files.
    #[serde(default = "default_backend_globs")]
    pub backend_globs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            component_globs: default_component_globs(),
            backend_globs: default_backend_globs(),
        }
    }
}

fn default_component_globs() -> Vec<String> {
    vec![
        "components/**/*.cy.ts".to_string(),
        "components/**/*.cy.tsx".to_string(),
    ]
}

fn default_backend_globs() -> Vec<String> {
    vec![
        "server/**/*.test.ts".to_string(),
        "server/**/*.spec.ts".to_string(),
    ]
}

/// Per-suite overrides for the command line and kill timer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuitesConfig {
    pub lint: Option<SuiteOverride>,
    pub build: Option<SuiteOverride>,
    pub backend: Option<SuiteOverride>,
    pub component_forms: Option<SuiteOverride>,
    pub component_dashboard: Option<SuiteOverride>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuiteOverride {
    pub command: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Load `pulse.toml` from the workspace root, falling back to defaults if absent or invalid.
    pub fn load(workspace: &Path) -> Self {
        let path = workspace.join("pulse.toml");
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        toml::from_str(&content).unwrap_or_default()
    }

    fn suite_override(&self, suite: SuiteId) -> Option<&SuiteOverride> {
        match suite {
            SuiteId::Lint => self.suites.lint.as_ref(),
            SuiteId::Build => self.suites.build.as_ref(),
            SuiteId::Backend => self.suites.backend.as_ref(),
            SuiteId::ComponentForms => self.suites.component_forms.as_ref(),
            SuiteId::ComponentDashboard => self.suites.component_dashboard.as_ref(),
        }
    }

    pub fn command_for(&self, suite: SuiteId) -> String {
        self.suite_override(suite)
            .and_then(|o| o.command.clone())
            .unwrap_or_else(|| suite.default_command().to_string())
    }

    pub fn timeout_for(&self, suite: SuiteId) -> Duration {
        self.suite_override(suite)
            .and_then(|o| o.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or_else(|| suite.timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path());
        assert_eq!(config.server.bind, "127.0.0.1:4477");
        assert_eq!(
            config.command_for(SuiteId::Backend),
            SuiteId::Backend.default_command()
        );
    }

    #[test]
    fn test_overrides_apply_per_suite() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("pulse.toml")).unwrap();
        writeln!(
            file,
            "[suites.backend]\ncommand = \"npx vitest run --root api\"\ntimeout_secs = 300\n"
        )
        .unwrap();

        let config = Config::load(dir.path());
        assert_eq!(config.command_for(SuiteId::Backend), "npx vitest run --root api");
        assert_eq!(config.timeout_for(SuiteId::Backend), Duration::from_secs(300));
        // Untouched suites keep their defaults.
        assert_eq!(config.timeout_for(SuiteId::ComponentForms), Duration::from_secs(180));
    }

    #[test]
    fn test_invalid_toml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pulse.toml"), "suites = [broken").unwrap();
        let config = Config::load(dir.path());
        assert_eq!(config.reports.dir, PathBuf::from(".pulse/reports"));
    }
}
