use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::RunResults;
use super::stats::TestStats;
use super::suite::SuiteId;

/// Ephemeral progress event. Lives only on the wire between runner and
/// consumer; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveUpdate {
    pub suite: SuiteId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_test: Option<String>,
    pub stats: TestStats,
    pub overall: TestStats,
    pub timestamp: DateTime<Utc>,
    pub execution_id: String,
}

/// Every message kind that can appear on the event stream, discriminated
/// by the `type` field. Consumers skip anything that doesn't parse into a
/// known variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StreamMessage {
    ConnectionEstablished {
        execution_id: String,
        timestamp: DateTime<Utc>,
    },
    Heartbeat {
        timestamp: DateTime<Utc>,
    },
    TestProgress {
        #[serde(flatten)]
        update: LiveUpdate,
    },
    SuiteComplete {
        #[serde(flatten)]
        update: LiveUpdate,
    },
    Snapshot {
        results: RunResults,
    },
    StreamComplete {
        execution_id: String,
        timestamp: DateTime<Utc>,
    },
    StreamError {
        message: String,
    },
}

impl StreamMessage {
    /// The execution id carried by this message, for staleness fencing.
    /// Lifecycle messages without one are never fenced.
    pub fn execution_id(&self) -> Option<&str> {
        match self {
            StreamMessage::ConnectionEstablished { execution_id, .. }
            | StreamMessage::StreamComplete { execution_id, .. } => Some(execution_id),
            StreamMessage::TestProgress { update } | StreamMessage::SuiteComplete { update } => {
                Some(&update.execution_id)
            }
            StreamMessage::Snapshot { results } => Some(&results.execution_id),
            StreamMessage::Heartbeat { .. } | StreamMessage::StreamError { .. } => None,
        }
    }

    /// Critical messages bypass the consumer's debounce and apply
    /// immediately: their latency is user-visible.
    pub fn is_critical(&self) -> bool {
        !matches!(
            self,
            StreamMessage::TestProgress { .. } | StreamMessage::Heartbeat { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(execution_id: &str) -> LiveUpdate {
        LiveUpdate {
            suite: SuiteId::Backend,
            current_test: Some("distributes assets per rule".into()),
            stats: TestStats::new(42, 10, 0, 0),
            overall: TestStats::default(),
            timestamp: Utc::now(),
            execution_id: execution_id.into(),
        }
    }

    #[test]
    fn test_tagged_wire_shape() {
        let msg = StreamMessage::TestProgress {
            update: update("run-1"),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "test_progress");
        // Flattened update fields sit at the top level, like the original wire.
        assert_eq!(json["suite"], "backend");
        assert_eq!(json["executionId"], "run-1");
    }

    #[test]
    fn test_unknown_type_fails_to_parse() {
        let raw = r#"{"type":"telemetry_blob","payload":123}"#;
        assert!(serde_json::from_str::<StreamMessage>(raw).is_err());
    }

    #[test]
    fn test_lifecycle_messages_parse() {
        let raw = r#"{"type":"heartbeat","timestamp":"2026-08-05T10:15:00Z"}"#;
        let msg: StreamMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, StreamMessage::Heartbeat { .. }));
        assert!(msg.execution_id().is_none());

        let raw = r#"{"type":"stream_complete","executionId":"run-9","timestamp":"2026-08-05T10:15:01Z"}"#;
        let msg: StreamMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.execution_id(), Some("run-9"));
    }

    #[test]
    fn test_criticality_partition() {
        assert!(!StreamMessage::TestProgress { update: update("a") }.is_critical());
        assert!(!StreamMessage::Heartbeat { timestamp: Utc::now() }.is_critical());
        assert!(StreamMessage::SuiteComplete { update: update("a") }.is_critical());
        assert!(
            StreamMessage::StreamError {
                message: "boom".into()
            }
            .is_critical()
        );
    }
}
