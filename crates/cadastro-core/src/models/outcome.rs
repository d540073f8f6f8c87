//! Outcomes of the validation pipeline, rendered by the form layer.

use serde::{Deserialize, Serialize};

/// Result of the age-based document policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PolicyResult {
    /// Documents are sufficient
    Allowed,
    /// CPF absent but a justification was given (newborns only)
    RequiresJustification { reason: String },
    /// Submission must not proceed until the user corrects the form
    Blocked { reason: String },
}

impl PolicyResult {
    pub fn is_blocked(&self) -> bool {
        matches!(self, PolicyResult::Blocked { .. })
    }
}

/// Newborn update-window state (15 days from birth).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateWindow {
    pub is_newborn: bool,
    /// Days left in the window; zero or negative once it has closed
    pub days_remaining: i64,
    pub is_expired: bool,
}

/// How an alert affects submission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational banner
    Info,
    /// Advisory; the user may proceed after acknowledging it
    Warning,
    /// Submission is disabled
    Blocking,
}

/// What raised an alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PolicyBlocked,
    JustificationRecorded,
    PossibleDuplicate,
}

/// A user-facing alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    /// Matching stored patient, for duplicate alerts
    pub patient_id: Option<String>,
}

impl Alert {
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

/// Decision produced by the validation orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrchestrationResult {
    pub can_submit: bool,
    pub alerts: Vec<Alert>,
}

impl OrchestrationResult {
    /// Ids of stored patients flagged as possible duplicates, in alert order.
    pub fn duplicate_ids(&self) -> Vec<&str> {
        self.alerts
            .iter()
            .filter(|a| a.kind == AlertKind::PossibleDuplicate)
            .filter_map(|a| a.patient_id.as_deref())
            .collect()
    }

    pub fn has_duplicates(&self) -> bool {
        self.alerts
            .iter()
            .any(|a| a.kind == AlertKind::PossibleDuplicate)
    }
}
