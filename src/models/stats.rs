use serde::{Deserialize, Serialize};

/// Normalized statistics shared by every suite kind.
///
/// `progress` is a 0–100 percentage and is monotonically non-decreasing
/// within a suite's lifetime (enforced where stats are applied, see
/// `SuiteResult::apply_stats`). `pass_rate` is derived, but stored so the
/// wire and persisted shapes carry it explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub pass_rate: f64,
    pub progress: f64,
}

impl TestStats {
    pub fn new(total: usize, passed: usize, failed: usize, skipped: usize) -> Self {
        let mut stats = Self {
            total,
            passed,
            failed,
            skipped,
            pass_rate: 0.0,
            progress: 0.0,
        };
        stats.recalc_pass_rate();
        stats
    }

    /// Stats for a binary pass/fail check (lint, typecheck): one entry,
    /// passed or failed.
    pub fn binary(passed: bool) -> Self {
        if passed {
            Self::new(1, 1, 0, 0)
        } else {
            Self::new(1, 0, 1, 0)
        }
    }

    pub fn executed(&self) -> usize {
        self.passed + self.failed
    }

    pub fn recalc_pass_rate(&mut self) {
        self.pass_rate = if self.total > 0 {
            (self.passed as f64 / self.total as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
    }

    /// Completion fraction against `total`, capped at 99 until the suite is
    /// actually done so a partial parse can't display a finished bar.
    pub fn set_progress_partial(&mut self) {
        if self.total == 0 {
            self.progress = 0.0;
            return;
        }
        let pct = (self.executed() + self.skipped) as f64 / self.total as f64 * 100.0;
        self.progress = pct.min(99.0);
    }

    pub fn set_progress_complete(&mut self) {
        self.progress = 100.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_rate_rounding() {
        let stats = TestStats::new(3, 2, 1, 0);
        assert_eq!(stats.pass_rate, 66.7);
    }

    #[test]
    fn test_pass_rate_zero_total() {
        let stats = TestStats::new(0, 0, 0, 0);
        assert_eq!(stats.pass_rate, 0.0);
    }

    #[test]
    fn test_partial_progress_capped_below_complete() {
        let mut stats = TestStats::new(10, 10, 0, 0);
        stats.set_progress_partial();
        assert_eq!(stats.progress, 99.0);

        stats.set_progress_complete();
        assert_eq!(stats.progress, 100.0);
    }

    #[test]
    fn test_binary_check_stats() {
        assert_eq!(TestStats::binary(true).passed, 1);
        assert_eq!(TestStats::binary(false).failed, 1);
        assert_eq!(TestStats::binary(false).pass_rate, 0.0);
    }

    #[test]
    fn test_camel_case_wire_shape() {
        let json = serde_json::to_value(TestStats::new(2, 1, 1, 0)).unwrap();
        assert!(json.get("passRate").is_some());
        assert!(json.get("pass_rate").is_none());
    }
}
