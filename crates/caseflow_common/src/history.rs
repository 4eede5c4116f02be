//! Append-only status history
//!
//! One row per accepted transition that moved either axis. Rows are never
//! updated or deleted; insertion order (the row id) is the ordering key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::Role;
use crate::case::{CaseStatus, CourtStatus};

/// One ledger row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseStatusEvent {
    pub id: i64,
    pub case_id: String,
    pub prev_status: CaseStatus,
    pub new_status: CaseStatus,
    pub prev_court_status: CourtStatus,
    pub new_court_status: CourtStatus,
    pub actor_id: String,
    pub actor_role: Role,
    pub reason: String,
    /// Structured context, e.g. the prior closure a reopen points back to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Check that a case's ledger reconstructs one unbroken path: each row
/// starts where its predecessor ended, the first row starts at `initial`,
/// and no row records a non-move.
pub fn verify_chain(events: &[CaseStatusEvent], initial: (CaseStatus, CourtStatus)) -> bool {
    let mut current = initial;
    for event in events {
        if (event.prev_status, event.prev_court_status) != current {
            return false;
        }
        let next = (event.new_status, event.new_court_status);
        if next == current {
            return false;
        }
        current = next;
    }
    true
}
