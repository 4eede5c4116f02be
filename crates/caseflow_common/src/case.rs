//! Case entity and the two status axes
//!
//! A case carries two independent status fields: the investigation axis
//! (`status`) and the court axis (`court_status`). Only the lifecycle
//! engine in caseflowd is allowed to move either one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Investigation Axis
// ============================================================================

/// Investigation-axis status of a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// OB intake recorded, not yet submitted for review
    Draft,
    /// Submitted to the station for review
    Submitted,
    /// Accepted by the station, awaiting investigator assignment
    UnderStationReview,
    /// Under active investigation
    Investigating,
    /// Investigation done, case marked for court
    Escalated,
    /// Under court review
    UnderReview,
    /// Closed (soft; reopen is the only way back)
    Closed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Draft => "draft",
            CaseStatus::Submitted => "submitted",
            CaseStatus::UnderStationReview => "under_station_review",
            CaseStatus::Investigating => "investigating",
            CaseStatus::Escalated => "escalated",
            CaseStatus::UnderReview => "under_review",
            CaseStatus::Closed => "closed",
        }
    }

    /// Parse from the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(CaseStatus::Draft),
            "submitted" => Some(CaseStatus::Submitted),
            "under_station_review" => Some(CaseStatus::UnderStationReview),
            "investigating" => Some(CaseStatus::Investigating),
            "escalated" => Some(CaseStatus::Escalated),
            "under_review" => Some(CaseStatus::UnderReview),
            "closed" => Some(CaseStatus::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Court Axis
// ============================================================================

/// Court-axis status, independent of the investigation axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourtStatus {
    /// Never submitted to court
    NotSent,
    /// First submission delivered to the court
    SentToCourt,
    /// Resubmitted after the court sent it back
    CourtReview,
    /// Court returned the case with a work order
    CourtAssignedBack,
    /// Disposed of by the court
    CourtClosed,
}

impl CourtStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourtStatus::NotSent => "not_sent",
            CourtStatus::SentToCourt => "sent_to_court",
            CourtStatus::CourtReview => "court_review",
            CourtStatus::CourtAssignedBack => "court_assigned_back",
            CourtStatus::CourtClosed => "court_closed",
        }
    }

    /// Parse from the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_sent" => Some(CourtStatus::NotSent),
            "sent_to_court" => Some(CourtStatus::SentToCourt),
            "court_review" => Some(CourtStatus::CourtReview),
            "court_assigned_back" => Some(CourtStatus::CourtAssignedBack),
            "court_closed" => Some(CourtStatus::CourtClosed),
            _ => None,
        }
    }

    /// Whether the case is currently with the court
    pub fn in_court(&self) -> bool {
        matches!(
            self,
            CourtStatus::SentToCourt | CourtStatus::CourtReview | CourtStatus::CourtAssignedBack
        )
    }
}

impl std::fmt::Display for CourtStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Case
// ============================================================================

/// The central case record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    /// Row identifier (uuid)
    pub id: String,
    /// Human-facing unique case number (CR-YYYYMMDD-NNNN)
    pub case_number: String,
    /// Owning organizational unit (station)
    pub org_unit_id: String,
    /// Short title for the record
    pub title: String,
    /// Narrative summary from OB intake
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Investigation-axis status
    pub status: CaseStatus,
    /// Court-axis status
    pub court_status: CourtStatus,
    /// OB officer who recorded the case
    pub created_by: String,
    /// Station admin who approved it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    /// Outcome code recorded at closure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_description: Option<String>,
    /// Deadline imposed by the court
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_notes: Option<String>,
    /// Reference to the court decision document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_decision_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_submitted_at: Option<DateTime<Utc>>,
    /// Times this case has been reopened after closure
    pub reopen_count: u32,
}

impl Case {
    /// Create a fresh draft case from OB intake
    pub fn new(org_unit_id: &str, title: &str, summary: Option<&str>, created_by: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            case_number: generate_case_number(),
            org_unit_id: org_unit_id.to_string(),
            title: title.to_string(),
            summary: summary.map(|s| s.to_string()),
            status: CaseStatus::Draft,
            court_status: CourtStatus::NotSent,
            created_by: created_by.to_string(),
            approved_by: None,
            created_at: Utc::now(),
            approved_at: None,
            closed_at: None,
            outcome_code: None,
            outcome_description: None,
            court_deadline: None,
            court_notes: None,
            court_decision_ref: None,
            court_submitted_at: None,
            reopen_count: 0,
        }
    }

    /// Current position on both axes
    pub fn status_pair(&self) -> (CaseStatus, CourtStatus) {
        (self.status, self.court_status)
    }
}

/// Generate a human-facing case number
pub fn generate_case_number() -> String {
    let now = Utc::now();
    format!("CR-{}-{:04}", now.format("%Y%m%d"), rand_suffix())
}

fn rand_suffix() -> u16 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 10000) as u16
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            CaseStatus::Draft,
            CaseStatus::Submitted,
            CaseStatus::UnderStationReview,
            CaseStatus::Investigating,
            CaseStatus::Escalated,
            CaseStatus::UnderReview,
            CaseStatus::Closed,
        ] {
            assert_eq!(CaseStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CaseStatus::parse("pending"), None);
    }

    #[test]
    fn test_court_status_round_trip() {
        for status in [
            CourtStatus::NotSent,
            CourtStatus::SentToCourt,
            CourtStatus::CourtReview,
            CourtStatus::CourtAssignedBack,
            CourtStatus::CourtClosed,
        ] {
            assert_eq!(CourtStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_in_court() {
        assert!(!CourtStatus::NotSent.in_court());
        assert!(CourtStatus::SentToCourt.in_court());
        assert!(CourtStatus::CourtAssignedBack.in_court());
        assert!(!CourtStatus::CourtClosed.in_court());
    }

    #[test]
    fn test_new_case_defaults() {
        let case = Case::new("station-01", "Stolen bicycle", Some("Reported at gate"), "u-ob1");
        assert_eq!(case.status, CaseStatus::Draft);
        assert_eq!(case.court_status, CourtStatus::NotSent);
        assert_eq!(case.reopen_count, 0);
        assert!(case.case_number.starts_with("CR-"));
        assert!(case.approved_by.is_none());
    }
}
