//! Notification intents
//!
//! The engine constructs these during a transition and hands them to the
//! dispatcher after commit. Delivery and storage are someone else's job.

use serde::{Deserialize, Serialize};

/// What happened, from the recipient's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CaseSubmitted,
    CaseApproved,
    CaseReturned,
    InvestigatorAssigned,
    CaseEscalated,
    SubmittedToCourt,
    CourtAssignedBack,
    CaseClosed,
    CaseReopened,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::CaseSubmitted => "case_submitted",
            NotificationKind::CaseApproved => "case_approved",
            NotificationKind::CaseReturned => "case_returned",
            NotificationKind::InvestigatorAssigned => "investigator_assigned",
            NotificationKind::CaseEscalated => "case_escalated",
            NotificationKind::SubmittedToCourt => "submitted_to_court",
            NotificationKind::CourtAssignedBack => "court_assigned_back",
            NotificationKind::CaseClosed => "case_closed",
            NotificationKind::CaseReopened => "case_reopened",
        }
    }
}

/// Delivery urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// One notification addressed to one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub case_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
}

impl Notification {
    pub fn new(recipient: &str, case_id: &str, kind: NotificationKind, title: &str) -> Self {
        Self {
            recipient: recipient.to_string(),
            case_id: case_id.to_string(),
            kind,
            title: title.to_string(),
            message: String::new(),
            priority: NotificationPriority::Normal,
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = message.to_string();
        self
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let n = Notification::new("u-inv1", "c-1", NotificationKind::InvestigatorAssigned, "Assigned")
            .with_message("You have been assigned to case CR-20250101-0001")
            .with_priority(NotificationPriority::High);
        assert_eq!(n.recipient, "u-inv1");
        assert_eq!(n.kind, NotificationKind::InvestigatorAssigned);
        assert_eq!(n.priority, NotificationPriority::High);
        assert!(n.message.contains("CR-20250101-0001"));
    }
}
