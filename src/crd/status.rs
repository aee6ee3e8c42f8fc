//! # TerraformOutputs Status
//!
//! Status types for tracking synchronization state and conditions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Condition type maintained by the controller
pub const READY_CONDITION: &str = "Ready";

/// Outcome of the most recent synchronization pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum SyncPhase {
    Success,
    Failed,
    InProgress,
}

impl SyncPhase {
    /// Ready condition status derived from the phase
    #[must_use]
    pub fn ready_status(self) -> &'static str {
        match self {
            SyncPhase::Success => "True",
            SyncPhase::Failed => "False",
            SyncPhase::InProgress => "Unknown",
        }
    }

    /// Condition reason derived from the phase
    #[must_use]
    pub fn reason(self) -> &'static str {
        match self {
            SyncPhase::Success => "SyncSucceeded",
            SyncPhase::Failed => "SyncFailed",
            SyncPhase::InProgress => "Syncing",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncPhase::Success => "Success",
            SyncPhase::Failed => "Failed",
            SyncPhase::InProgress => "InProgress",
        };
        f.write_str(s)
    }
}

/// Status of the TerraformOutputs resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TerraformOutputsStatus {
    /// Time of the last successful sync (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<String>,
    /// Values: Success, Failed, InProgress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_status: Option<SyncPhase>,
    /// Human-readable description of the current state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Number of outputs found across all backends
    #[serde(default)]
    pub output_count: i32,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl TerraformOutputsStatus {
    /// Parsed `lastSyncTime`; unparseable values are treated as never synced
    #[must_use]
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// Set phase and message, keeping the Ready condition in step
    pub fn set_phase(&mut self, phase: SyncPhase, message: impl Into<String>, now: DateTime<Utc>) {
        let message = message.into();
        self.sync_status = Some(phase);
        self.message = Some(message.clone());
        self.set_ready_condition(phase, message, now);
    }

    fn set_ready_condition(&mut self, phase: SyncPhase, message: String, now: DateTime<Utc>) {
        let status = phase.ready_status();
        let existing = self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == READY_CONDITION);

        match existing {
            Some(condition) => {
                if condition.status != status {
                    condition.status = status.to_string();
                    condition.last_transition_time = Some(now.to_rfc3339());
                }
                condition.reason = Some(phase.reason().to_string());
                condition.message = Some(message);
            }
            None => self.conditions.push(Condition {
                r#type: READY_CONDITION.to_string(),
                status: status.to_string(),
                last_transition_time: Some(now.to_rfc3339()),
                reason: Some(phase.reason().to_string()),
                message: Some(message),
            }),
        }
    }

    /// The Ready condition, if recorded
    #[must_use]
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == READY_CONDITION)
    }
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_wire_format() {
        let status: TerraformOutputsStatus = serde_json::from_value(serde_json::json!({
            "lastSyncTime": "2024-05-01T10:00:00Z",
            "syncStatus": "InProgress",
            "outputCount": 3
        }))
        .unwrap();
        assert_eq!(status.sync_status, Some(SyncPhase::InProgress));
        assert_eq!(status.output_count, 3);
        assert!(status.last_sync().is_some());
        assert!(status.conditions.is_empty());
    }

    #[test]
    fn test_unparseable_last_sync_is_none() {
        let status = TerraformOutputsStatus {
            last_sync_time: Some("yesterday".to_string()),
            ..Default::default()
        };
        assert!(status.last_sync().is_none());
    }

    #[test]
    fn test_ready_transition_time_moves_only_on_flip() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(30);
        let t2 = t1 + Duration::seconds(30);
        let mut status = TerraformOutputsStatus::default();

        status.set_phase(SyncPhase::Success, "Successfully synced 2 outputs", t0);
        status.set_phase(SyncPhase::Success, "Successfully synced 3 outputs", t1);
        let ready = status.ready_condition().unwrap();
        assert_eq!(ready.status, "True");
        assert_eq!(ready.last_transition_time, Some(t0.to_rfc3339()));
        assert_eq!(ready.message.as_deref(), Some("Successfully synced 3 outputs"));

        status.set_phase(SyncPhase::Failed, "boom", t2);
        let ready = status.ready_condition().unwrap();
        assert_eq!(ready.status, "False");
        assert_eq!(ready.last_transition_time, Some(t2.to_rfc3339()));
        assert_eq!(status.conditions.len(), 1);
    }
}
