use serde::{Deserialize, Serialize};

/// Lifecycle of a single suite. Transitions only move forward:
/// `Pending -> Running -> (Completed | Failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl SuiteStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            SuiteStatus::Pending => "◌",
            SuiteStatus::Running => "⟳",
            SuiteStatus::Completed => "✔",
            SuiteStatus::Failed => "✘",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SuiteStatus::Completed | SuiteStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            SuiteStatus::Pending => 0,
            SuiteStatus::Running => 1,
            SuiteStatus::Completed => 2,
            SuiteStatus::Failed => 2,
        }
    }

    /// Apply `next` only if it doesn't move the lifecycle backward.
    /// A terminal status never changes again.
    pub fn advance(&mut self, next: SuiteStatus) {
        if self.is_terminal() {
            return;
        }
        if next.rank() >= self.rank() {
            *self = next;
        }
    }
}

/// Lifecycle of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_never_moves_backward() {
        let mut status = SuiteStatus::Running;
        status.advance(SuiteStatus::Pending);
        assert_eq!(status, SuiteStatus::Running);

        status.advance(SuiteStatus::Completed);
        assert_eq!(status, SuiteStatus::Completed);

        status.advance(SuiteStatus::Running);
        assert_eq!(status, SuiteStatus::Completed);
        status.advance(SuiteStatus::Failed);
        assert_eq!(status, SuiteStatus::Completed);
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&SuiteStatus::Completed).unwrap(),
            "\"completed\""
        );
        let parsed: SuiteStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, SuiteStatus::Failed);
    }
}
