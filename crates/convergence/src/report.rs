//! Run report
//!
//! The report is the run's structured output for external collaborators
//! (persistence, handlers, indexing): the node's final attributes, the
//! per-resource outcomes in execution order, timing, and failure detail
//! when the run aborted.

use crate::provider::CurrentState;
use crate::resource::ResourceId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Terminal state of one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeState {
    /// Never reached (the run aborted earlier)
    Pending,
    /// A guard blocked the action
    Skipped,
    /// The provider ran and found nothing to do
    Unchanged,
    /// The provider changed the system
    Updated,
    /// The action raised
    Failed,
}

/// Final record for one resource
#[derive(Debug, Clone, Serialize)]
pub struct ResourceOutcome {
    pub resource: ResourceId,
    pub action: String,
    pub state: OutcomeState,
    /// On-host state loaded by the provider, when available; kept even
    /// when the action later failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The resource failed but was declared `ignore_failure`
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<String>,
}

/// Detail of the failure that aborted a run
#[derive(Debug, Clone, Serialize)]
pub struct FailureDetail {
    pub resource: ResourceId,
    pub action: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<String>,
}

/// Aggregated counts over a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Structured result of one convergence run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub node_name: String,
    /// Merged attribute snapshot at end of run
    pub attributes: BTreeMap<String, Value>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub resources: Vec<ResourceOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for outcome in &self.resources {
            match outcome.state {
                OutcomeState::Updated => summary.updated += 1,
                OutcomeState::Unchanged => summary.unchanged += 1,
                OutcomeState::Skipped => summary.skipped += 1,
                OutcomeState::Failed => summary.failed += 1,
                OutcomeState::Pending => {}
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_terminal_states() {
        let outcome = |state| ResourceOutcome {
            resource: ResourceId::new("file", "/tmp/x"),
            action: "create".to_string(),
            state,
            current: None,
            error: None,
            ignored: false,
            source_line: None,
        };
        let report = RunReport {
            node_name: "latte".to_string(),
            attributes: BTreeMap::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            elapsed_seconds: 0.0,
            resources: vec![
                outcome(OutcomeState::Updated),
                outcome(OutcomeState::Updated),
                outcome(OutcomeState::Unchanged),
                outcome(OutcomeState::Skipped),
                outcome(OutcomeState::Pending),
            ],
            failure: None,
        };

        let summary = report.summary();
        assert_eq!(summary.updated, 2);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert!(report.success());
    }
}
