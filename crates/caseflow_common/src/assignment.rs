//! Assignment records
//!
//! `CaseAssignment` binds an investigator to a case; `CourtAssignment`
//! binds the case to an investigator under a court-imposed deadline.
//! Rows are completed, never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an assignment row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Active => "active",
            AssignmentStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AssignmentStatus::Active),
            "completed" => Some(AssignmentStatus::Completed),
            _ => None,
        }
    }
}

/// Priority assigned by the station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl AssignmentPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentPriority::Low => "low",
            AssignmentPriority::Normal => "normal",
            AssignmentPriority::High => "high",
            AssignmentPriority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(AssignmentPriority::Low),
            "normal" => Some(AssignmentPriority::Normal),
            "high" => Some(AssignmentPriority::High),
            "urgent" => Some(AssignmentPriority::Urgent),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssignmentPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An investigator's assignment to a case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseAssignment {
    pub id: String,
    pub case_id: String,
    pub investigator_id: String,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub priority: AssignmentPriority,
    /// At most one active lead per case
    pub is_lead: bool,
    pub status: AssignmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CaseAssignment {
    pub fn new(case_id: &str, investigator_id: &str, assigned_by: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            case_id: case_id.to_string(),
            investigator_id: investigator_id.to_string(),
            assigned_by: assigned_by.to_string(),
            assigned_at: Utc::now(),
            deadline: None,
            priority: AssignmentPriority::Normal,
            is_lead: false,
            status: AssignmentStatus::Active,
            notes: None,
        }
    }
}

/// The court's work order on a case; at most one active per case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourtAssignment {
    pub id: String,
    pub case_id: String,
    pub assigned_to: String,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: AssignmentStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_assignment_is_active() {
        let a = CaseAssignment::new("c-1", "u-inv1", "u-adm1");
        assert_eq!(a.status, AssignmentStatus::Active);
        assert_eq!(a.priority, AssignmentPriority::Normal);
        assert!(!a.is_lead);
    }

    #[test]
    fn test_priority_round_trip() {
        for p in [
            AssignmentPriority::Low,
            AssignmentPriority::Normal,
            AssignmentPriority::High,
            AssignmentPriority::Urgent,
        ] {
            assert_eq!(AssignmentPriority::parse(p.as_str()), Some(p));
        }
        assert_eq!(AssignmentPriority::parse("critical"), None);
    }
}
